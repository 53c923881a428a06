//! Local filesystem host.
//!
//! A directory capability here is just a bookmarked absolute path: its token
//! is the path itself and the permission check is whether the directory can
//! still be opened. There is nobody to prompt, so requesting permission
//! re-checks instead.

use std::io::{self, ErrorKind, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncSeekExt};

use super::{
    BoxFuture, ByteSource, DirEntry, DirectoryHandle, EntryKind, FolderPicker, Permission,
    PickedFile,
};
use crate::error::{Result, TheaterError};
use crate::source::flat::SELECTED_FOLDER;
use crate::source::path;

/// A file on disk, with size and mtime captured when it was opened.
#[derive(Debug, Clone)]
pub struct LocalFile {
    path: PathBuf,
    size: u64,
    modified: Option<DateTime<Utc>>,
}

impl LocalFile {
    pub async fn open(path: PathBuf) -> io::Result<Self> {
        let meta = fs::metadata(&path).await?;
        if !meta.is_file() {
            return Err(io::Error::new(
                ErrorKind::NotFound,
                format!("not a file: {}", path.display()),
            ));
        }
        Ok(Self {
            size: meta.len(),
            modified: meta.modified().ok().map(DateTime::<Utc>::from),
            path,
        })
    }
}

impl ByteSource for LocalFile {
    fn size(&self) -> u64 {
        self.size
    }

    fn last_modified(&self) -> Option<DateTime<Utc>> {
        self.modified
    }

    fn read_range<'a>(&'a self, offset: u64, len: usize) -> BoxFuture<'a, io::Result<Vec<u8>>> {
        Box::pin(async move {
            let mut file = fs::File::open(&self.path).await?;
            file.seek(SeekFrom::Start(offset)).await?;
            let mut buf = Vec::with_capacity(len.min(1 << 20));
            file.take(len as u64).read_to_end(&mut buf).await?;
            Ok(buf)
        })
    }
}

/// A directory on disk, used as a capability.
#[derive(Debug, Clone)]
pub struct LocalDirectory {
    path: PathBuf,
    name: String,
}

impl LocalDirectory {
    pub fn new(path: PathBuf) -> Self {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Self { path, name }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Map a single child name to an OS path. Names are never allowed to
    /// climb out of or skip through this directory.
    fn child_path(&self, name: &str) -> io::Result<PathBuf> {
        if name.is_empty()
            || name == "."
            || name == ".."
            || name.contains(['/', '\\', '\0'])
        {
            return Err(io::Error::new(
                ErrorKind::InvalidInput,
                format!("invalid path segment: {:?}", name),
            ));
        }
        Ok(self.path.join(name))
    }

    async fn check_permission(&self) -> Permission {
        match fs::read_dir(&self.path).await {
            Ok(_) => Permission::Granted,
            Err(e) => {
                log::debug!("directory {} not readable: {}", self.path.display(), e);
                Permission::Denied
            }
        }
    }
}

impl DirectoryHandle for LocalDirectory {
    fn name(&self) -> &str {
        &self.name
    }

    fn token(&self) -> String {
        self.path.to_string_lossy().into_owned()
    }

    fn query_permission(&self) -> BoxFuture<'_, Permission> {
        Box::pin(self.check_permission())
    }

    fn request_permission(&self) -> BoxFuture<'_, Permission> {
        Box::pin(self.check_permission())
    }

    fn entries(&self) -> BoxFuture<'_, io::Result<Vec<DirEntry>>> {
        Box::pin(async move {
            let mut entries = Vec::new();
            let mut read_dir = fs::read_dir(&self.path).await?;
            while let Some(entry) = read_dir.next_entry().await? {
                // follow symlinks; dangling ones are skipped
                let meta = match fs::metadata(entry.path()).await {
                    Ok(meta) => meta,
                    Err(_) => continue,
                };
                let kind = if meta.is_dir() {
                    EntryKind::Directory
                } else {
                    EntryKind::File
                };
                entries.push(DirEntry {
                    name: entry.file_name().to_string_lossy().into_owned(),
                    kind,
                });
            }
            entries.sort_by(|a, b| a.name.cmp(&b.name));
            Ok(entries)
        })
    }

    fn directory<'a>(
        &'a self,
        name: &'a str,
    ) -> BoxFuture<'a, io::Result<Arc<dyn DirectoryHandle>>> {
        Box::pin(async move {
            let path = self.child_path(name)?;
            let meta = fs::metadata(&path).await?;
            if !meta.is_dir() {
                return Err(io::Error::new(
                    ErrorKind::NotFound,
                    format!("not a directory: {}", path.display()),
                ));
            }
            Ok(Arc::new(LocalDirectory::new(path)) as Arc<dyn DirectoryHandle>)
        })
    }

    fn file<'a>(&'a self, name: &'a str) -> BoxFuture<'a, io::Result<Arc<dyn ByteSource>>> {
        Box::pin(async move {
            let path = self.child_path(name)?;
            Ok(Arc::new(LocalFile::open(path).await?) as Arc<dyn ByteSource>)
        })
    }
}

#[derive(Debug, Clone)]
enum Selection {
    /// Nothing chosen up front; only restoration is possible.
    Nothing,
    Directory(PathBuf),
    /// Paths relative to `base`, as a host without directory handles would
    /// enumerate them.
    FileList { base: PathBuf, paths: Vec<String> },
}

/// Folder picker whose "interactive" choice is made up front, e.g. from
/// command-line arguments.
#[derive(Debug, Clone)]
pub struct LocalPicker {
    selection: Selection,
}

impl LocalPicker {
    /// A picker that can only restore a previously saved directory.
    pub fn restore_only() -> Self {
        Self {
            selection: Selection::Nothing,
        }
    }

    /// A picker that grants a live handle on `path`.
    pub fn directory(path: impl Into<PathBuf>) -> Self {
        Self {
            selection: Selection::Directory(path.into()),
        }
    }

    /// A picker that behaves like a host without directory handles: it hands
    /// over `paths` (relative to `base`) as a flat list.
    pub fn file_list(base: impl Into<PathBuf>, paths: Vec<String>) -> Self {
        Self {
            selection: Selection::FileList {
                base: base.into(),
                paths,
            },
        }
    }
}

impl FolderPicker for LocalPicker {
    fn supports_directory_handles(&self) -> bool {
        !matches!(self.selection, Selection::FileList { .. })
    }

    fn supports_file_list(&self) -> bool {
        matches!(self.selection, Selection::FileList { .. })
    }

    fn pick_directory(&self) -> BoxFuture<'_, Result<Arc<dyn DirectoryHandle>>> {
        Box::pin(async move {
            let Selection::Directory(path) = &self.selection else {
                return Err(TheaterError::NoFolderSelected);
            };
            let path = fs::canonicalize(path).await.map_err(|e| {
                TheaterError::NotFound(format!("{}: {}", path.display(), e))
            })?;
            if !fs::metadata(&path).await?.is_dir() {
                return Err(TheaterError::NotFound(format!(
                    "not a directory: {}",
                    path.display()
                )));
            }
            Ok(Arc::new(LocalDirectory::new(path)) as Arc<dyn DirectoryHandle>)
        })
    }

    fn pick_file_list(&self) -> BoxFuture<'_, Result<Vec<PickedFile>>> {
        Box::pin(async move {
            let Selection::FileList { base, paths } = &self.selection else {
                return Err(TheaterError::NoFolderSelected);
            };
            let root_name = base
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| SELECTED_FOLDER.to_string());

            let mut picked = Vec::with_capacity(paths.len());
            for raw in paths {
                let parts = path::segments(raw.trim());
                if parts.is_empty() {
                    continue;
                }
                if !parts.iter().all(|p| path::is_plain_segment(p)) {
                    return Err(TheaterError::NotFound(format!(
                        "{}: not inside {}",
                        raw,
                        base.display()
                    )));
                }
                let rel = parts.join("/");
                let file = LocalFile::open(base.join(&rel))
                    .await
                    .map_err(|e| TheaterError::NotFound(format!("{}: {}", rel, e)))?;
                picked.push(PickedFile {
                    relative_path: format!("{}/{}", root_name, rel),
                    source: Arc::new(file),
                });
            }
            Ok(picked)
        })
    }

    fn resolve_capability(&self, token: &str) -> Option<Arc<dyn DirectoryHandle>> {
        if token.trim().is_empty() {
            return None;
        }
        Some(Arc::new(LocalDirectory::new(PathBuf::from(token))))
    }
}
