//! Virtual file source: one read/enumerate API over two access strategies.
//!
//! # Architecture
//!
//! ```text
//! caller  ->  TheaterFs (active root, pick/restore)  ->  FileSource
//!                                                         |- HandleBackend    (live directory capability)
//!                                                         '- FlatListBackend  (pre-enumerated file list)
//! ```
//!
//! `TheaterFs` owns at most one backend at a time and replaces it wholesale
//! on every pick, restore or clear. Backends never share indices.

pub mod flat;
pub mod handle;
pub mod path;
mod session;

use std::io;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, TheaterError};
use crate::host::{BoxFuture, ByteSource};

pub use flat::FlatListBackend;
pub use handle::HandleBackend;
pub use path::{Extensions, THEATER_EXTENSIONS};
pub use session::{PickOutcome, RestoreOutcome, RestoreReason, SourceMode, TheaterFs};

/// A game-named folder and the theater files under it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GameFolder {
    #[serde(rename = "gameName")]
    pub name: String,
    /// Relative paths, sorted ascending, unique.
    pub files: Vec<String>,
}

/// Identity of one file: the (game, relative path) pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileKey {
    pub game_name: String,
    pub relative_path: String,
}

impl FileKey {
    pub fn new(game_name: impl Into<String>, relative_path: impl Into<String>) -> Self {
        Self {
            game_name: game_name.into(),
            relative_path: relative_path.into(),
        }
    }
}

/// A file as listed: identity plus size and modification time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRecord {
    pub game_name: String,
    pub relative_path: String,
    pub size: u64,
    pub last_modified: Option<DateTime<Utc>>,
}

/// Leading bytes of a file together with its size and mtime.
#[derive(Debug, Clone)]
pub struct FilePrefix {
    pub bytes: Vec<u8>,
    pub size: u64,
    pub last_modified: Option<DateTime<Utc>>,
}

/// A file reachable for full backup, keyed by its path relative to the root.
#[derive(Clone)]
pub struct BackupEntry {
    pub path: String,
    pub source: Arc<dyn ByteSource>,
}

/// The contract both backends share.
pub trait FileSource: Send + Sync {
    /// Games sorted by name, each with its theater files sorted ascending.
    fn list_games(&self) -> BoxFuture<'_, Result<Vec<GameFolder>>>;

    /// Resolve a (game, relative path) pair to its bytes.
    fn open<'a>(
        &'a self,
        game_name: &'a str,
        relative_path: &'a str,
    ) -> BoxFuture<'a, Result<Arc<dyn ByteSource>>>;

    /// Every file under the root, extension filter ignored, in a
    /// deterministic order.
    fn backup_entries(&self) -> BoxFuture<'_, Result<Vec<BackupEntry>>>;

    /// Up to `max_bytes` leading bytes of a file. Negative counts read nothing.
    fn read_prefix<'a>(
        &'a self,
        game_name: &'a str,
        relative_path: &'a str,
        max_bytes: i64,
    ) -> BoxFuture<'a, Result<FilePrefix>> {
        Box::pin(async move {
            let file = self.open(game_name, relative_path).await?;
            let len = usize::try_from(max_bytes.max(0)).unwrap_or(usize::MAX);
            let bytes = file.read_range(0, len).await?;
            Ok(FilePrefix {
                bytes,
                size: file.size(),
                last_modified: file.last_modified(),
            })
        })
    }
}

/// Turn a host lookup failure into the not-found condition for a file.
/// Any other I/O failure passes through unchanged.
pub(crate) fn not_found_or_io(
    err: io::Error,
    game_name: &str,
    relative_path: &str,
) -> TheaterError {
    match err.kind() {
        io::ErrorKind::NotFound | io::ErrorKind::InvalidInput => {
            TheaterError::NotFound(path::entry_name(game_name, relative_path))
        }
        _ => TheaterError::Io(err),
    }
}
