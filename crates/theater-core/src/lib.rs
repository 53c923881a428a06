//! theater-core: replay folder browsing, metadata and export.
//!
//! Reads a user-chosen folder of per-game theater recordings, pulls a few
//! descriptive fields out of each file, and packages selected files (or the
//! whole folder) into a zip archive.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use theater_core::host::local::LocalPicker;
//! use theater_core::{CapabilityStore, Config, SqliteStore, TheaterFs, catalog, config};
//!
//! #[tokio::main]
//! async fn main() -> theater_core::Result<()> {
//!     let home = config::resolve_home(None)?;
//!     let cfg = Config::load(&home)?;
//!     let store = CapabilityStore::new(Arc::new(SqliteStore::new(config::handles_db_path(&home))));
//!     let picker = Arc::new(LocalPicker::directory("/path/to/UserContent"));
//!     let mut fs = TheaterFs::new(picker, store, cfg.extensions());
//!
//!     fs.pick_root().await?;
//!     let games = fs.list_games().await?;
//!     let rows = catalog::inspect_games(fs.source()?, &games, &cfg.inspect_options()).await;
//!     println!("{} replay(s)", rows.len());
//!     fs.flush().await;
//!     Ok(())
//! }
//! ```

pub mod archive;
pub mod capability;
pub mod catalog;
pub mod config;
pub mod error;
pub mod host;
pub mod metadata;
pub mod source;

pub use capability::{CapabilityStore, KeyValueStore, MemoryStore, SqliteStore};
pub use catalog::{FileRow, InspectOptions, Manifest, ManifestEntry, build_manifest};
pub use config::Config;
pub use error::{Result, TheaterError};
pub use metadata::{LayoutVariant, ReplayMetadata};
pub use source::{
    FileKey, FileRecord, FileSource, GameFolder, PickOutcome, RestoreOutcome, RestoreReason,
    SourceMode, TheaterFs,
};
