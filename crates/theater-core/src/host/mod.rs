//! Hosting-environment collaborators.
//!
//! The core never touches the platform directly. Whatever hosts it supplies
//! three things:
//!
//! ```text
//! FolderPicker     ->  how a root is acquired (live directory or flat file list)
//! DirectoryHandle  ->  a revocable grant on a directory tree
//! ByteSource       ->  one readable file: size, mtime, byte-range reads
//! ```
//!
//! `local` realizes all three on top of the OS filesystem; `memory` provides an
//! in-memory byte source for hosts that already hold file contents.
//!
//! # Dyn-compatibility
//!
//! Methods return `Pin<Box<dyn Future>>` instead of `impl Future` so that the
//! handle and picker can live behind `Arc<dyn ...>` and be swapped at runtime.

pub mod local;
pub mod memory;

use std::future::Future;
use std::io;
use std::pin::Pin;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::error::Result;

/// Boxed, Send future returned by every host method.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Current state of a grant on a directory handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    Granted,
    Denied,
    /// Not decided yet; asking may grant it.
    Prompt,
}

/// Kind of a directory entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
}

/// A single entry returned by a directory listing. Name and kind only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub kind: EntryKind,
}

/// One readable file as handed out by the host.
///
/// `size` and `last_modified` describe the file as it was when the source was
/// obtained, like a snapshot.
pub trait ByteSource: Send + Sync {
    fn size(&self) -> u64;

    fn last_modified(&self) -> Option<DateTime<Utc>>;

    /// Read up to `len` bytes starting at `offset`. Short reads happen only at
    /// end of file.
    fn read_range<'a>(&'a self, offset: u64, len: usize) -> BoxFuture<'a, io::Result<Vec<u8>>>;
}

/// A revocable grant on a directory tree.
///
/// Only the root handle is ever persisted, through its `token`. The token is
/// opaque to the core: the host that issued it is the only one that can turn
/// it back into a handle (see [`FolderPicker::resolve_capability`]).
pub trait DirectoryHandle: Send + Sync {
    /// Display name of the directory (last path component or equivalent).
    fn name(&self) -> &str;

    /// Opaque serialized form of this capability.
    fn token(&self) -> String;

    /// Check the current grant without prompting.
    fn query_permission(&self) -> BoxFuture<'_, Permission>;

    /// Ask for the grant. May prompt the user.
    fn request_permission(&self) -> BoxFuture<'_, Permission>;

    /// List immediate children in a stable order.
    fn entries(&self) -> BoxFuture<'_, io::Result<Vec<DirEntry>>>;

    /// Open a child directory by name. `NotFound` if it does not exist.
    fn directory<'a>(&'a self, name: &'a str)
    -> BoxFuture<'a, io::Result<Arc<dyn DirectoryHandle>>>;

    /// Open a child file by name. `NotFound` if it does not exist.
    fn file<'a>(&'a self, name: &'a str) -> BoxFuture<'a, io::Result<Arc<dyn ByteSource>>>;
}

/// A file from a flat selection, keyed by its path relative to the picked
/// folder (root folder name included, as hosts usually report it).
#[derive(Clone)]
pub struct PickedFile {
    pub relative_path: String,
    pub source: Arc<dyn ByteSource>,
}

impl std::fmt::Debug for PickedFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PickedFile")
            .field("relative_path", &self.relative_path)
            .field("size", &self.source.size())
            .finish()
    }
}

/// How the host acquires a root folder.
///
/// A host supports live directory handles, flat file lists, both, or neither.
/// When both are available the directory handle wins, because only it can be
/// persisted and restored.
pub trait FolderPicker: Send + Sync {
    fn supports_directory_handles(&self) -> bool;

    fn supports_file_list(&self) -> bool;

    /// Interactively pick a directory.
    fn pick_directory(&self) -> BoxFuture<'_, Result<Arc<dyn DirectoryHandle>>>;

    /// Interactively pick a folder, receiving every file under it.
    fn pick_file_list(&self) -> BoxFuture<'_, Result<Vec<PickedFile>>>;

    /// Turn a persisted token back into a handle. `None` if the token is not
    /// one this host understands.
    fn resolve_capability(&self, token: &str) -> Option<Arc<dyn DirectoryHandle>>;
}
