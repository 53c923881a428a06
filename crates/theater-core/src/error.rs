use thiserror::Error;

#[derive(Error, Debug)]
pub enum TheaterError {
    /// A (game, relative path) pair does not resolve under the active backend.
    #[error("File not found: {0}")]
    NotFound(String),

    #[error("No folder selected.")]
    NoFolderSelected,

    /// No viable folder access method exists in this environment.
    #[error("No supported folder access method: {0}")]
    Unsupported(String),

    #[error("Archive error: {0}")]
    Archive(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Store error: {0}")]
    Store(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<zip::result::ZipError> for TheaterError {
    fn from(e: zip::result::ZipError) -> Self {
        TheaterError::Archive(e.to_string())
    }
}

// Convenient crate-wide result type
pub type Result<T> = std::result::Result<T, TheaterError>;
