//! Handle backend: walks a live directory capability on every call.
//!
//! Nothing is cached. `list_games` reflects the directory as it is when
//! called, and every read resolves its path segment by segment from the root.

use std::sync::Arc;

use super::path::{self, Extensions};
use super::{BackupEntry, FileSource, GameFolder, not_found_or_io};
use crate::error::{Result, TheaterError};
use crate::host::{BoxFuture, ByteSource, DirectoryHandle, EntryKind};

/// File source over a directory capability whose first-level subdirectories
/// are games.
pub struct HandleBackend {
    root: Arc<dyn DirectoryHandle>,
    extensions: Extensions,
}

impl HandleBackend {
    pub fn new(root: Arc<dyn DirectoryHandle>, extensions: Extensions) -> Self {
        Self { root, extensions }
    }
}

/// Collect the relative paths of matching files under `dir`, depth first.
fn walk_matching<'a>(
    dir: &'a dyn DirectoryHandle,
    prefix: &'a str,
    extensions: &'a Extensions,
    out: &'a mut Vec<String>,
) -> BoxFuture<'a, Result<()>> {
    Box::pin(async move {
        for entry in dir.entries().await? {
            let next = path::join(prefix, &entry.name);
            match entry.kind {
                EntryKind::File => {
                    if extensions.matches(&entry.name) {
                        out.push(next);
                    }
                }
                EntryKind::Directory => {
                    let child = dir.directory(&entry.name).await?;
                    walk_matching(child.as_ref(), &next, extensions, out).await?;
                }
            }
        }
        Ok(())
    })
}

/// Collect every file under `dir` with an open byte source, depth first.
fn walk_all<'a>(
    dir: &'a dyn DirectoryHandle,
    prefix: &'a str,
    out: &'a mut Vec<BackupEntry>,
) -> BoxFuture<'a, Result<()>> {
    Box::pin(async move {
        for entry in dir.entries().await? {
            let next = path::join(prefix, &entry.name);
            match entry.kind {
                EntryKind::File => {
                    let source = dir.file(&entry.name).await?;
                    out.push(BackupEntry { path: next, source });
                }
                EntryKind::Directory => {
                    let child = dir.directory(&entry.name).await?;
                    walk_all(child.as_ref(), &next, out).await?;
                }
            }
        }
        Ok(())
    })
}

impl FileSource for HandleBackend {
    fn list_games(&self) -> BoxFuture<'_, Result<Vec<GameFolder>>> {
        Box::pin(async move {
            let mut games = Vec::new();
            for entry in self.root.entries().await? {
                if entry.kind != EntryKind::Directory {
                    continue;
                }
                let game_dir = self.root.directory(&entry.name).await?;
                let mut files = Vec::new();
                walk_matching(game_dir.as_ref(), "", &self.extensions, &mut files).await?;
                files.sort();
                files.dedup();
                games.push(GameFolder {
                    name: entry.name,
                    files,
                });
            }
            games.sort_by(|a, b| a.name.cmp(&b.name));
            log::debug!(
                "indexed {} game folder(s) under {}",
                games.len(),
                self.root.name()
            );
            Ok(games)
        })
    }

    fn open<'a>(
        &'a self,
        game_name: &'a str,
        relative_path: &'a str,
    ) -> BoxFuture<'a, Result<Arc<dyn ByteSource>>> {
        Box::pin(async move {
            let parts = path::segments(relative_path);
            let Some((file_name, dirs)) = parts.split_last() else {
                return Err(TheaterError::NotFound(format!(
                    "bad file path: {:?}",
                    relative_path
                )));
            };

            let lookup = |e| not_found_or_io(e, game_name, relative_path);
            let mut dir = self.root.directory(game_name).await.map_err(lookup)?;
            for segment in dirs {
                dir = dir.directory(segment).await.map_err(lookup)?;
            }
            dir.file(file_name).await.map_err(lookup)
        })
    }

    fn backup_entries(&self) -> BoxFuture<'_, Result<Vec<BackupEntry>>> {
        Box::pin(async move {
            let mut entries = Vec::new();
            walk_all(self.root.as_ref(), "", &mut entries).await?;
            Ok(entries)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::local::LocalDirectory;
    use tempfile::TempDir;

    fn write(root: &std::path::Path, rel: &str, data: &[u8]) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, data).unwrap();
    }

    fn setup() -> (TempDir, HandleBackend) {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "Reach/Movie/b.mov", b"bbbb");
        write(dir.path(), "Reach/Movie/a.mov", b"aaaa");
        write(dir.path(), "Reach/Map/forge.blf", b"map");
        write(dir.path(), "Reach/readme.txt", b"skip");
        write(dir.path(), "Halo3/film/x.FILM", b"xx");
        write(dir.path(), "loose.mov", b"not in a game");
        std::fs::create_dir_all(dir.path().join("Empty")).unwrap();
        let root = Arc::new(LocalDirectory::new(dir.path().to_path_buf()));
        (dir, HandleBackend::new(root, Extensions::default()))
    }

    #[tokio::test]
    async fn test_list_games_sorted_and_filtered() {
        let (_dir, backend) = setup();
        let games = backend.list_games().await.unwrap();
        assert_eq!(
            games,
            vec![
                GameFolder {
                    name: "Empty".to_string(),
                    files: vec![]
                },
                GameFolder {
                    name: "Halo3".to_string(),
                    files: vec!["film/x.FILM".to_string()]
                },
                GameFolder {
                    name: "Reach".to_string(),
                    files: vec![
                        "Map/forge.blf".to_string(),
                        "Movie/a.mov".to_string(),
                        "Movie/b.mov".to_string(),
                    ]
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_list_games_reflects_changes() {
        let (dir, backend) = setup();
        let before = backend.list_games().await.unwrap();
        assert_eq!(before, backend.list_games().await.unwrap());

        write(dir.path(), "Reach/Movie/c.mov", b"c");
        let after = backend.list_games().await.unwrap();
        let reach = after.iter().find(|g| g.name == "Reach").unwrap();
        assert!(reach.files.contains(&"Movie/c.mov".to_string()));
    }

    #[tokio::test]
    async fn test_read_prefix_nested() {
        let (_dir, backend) = setup();
        let prefix = backend.read_prefix("Reach", "Movie/a.mov", 2).await.unwrap();
        assert_eq!(prefix.bytes, b"aa");
        assert_eq!(prefix.size, 4);
        assert!(prefix.last_modified.is_some());
    }

    #[tokio::test]
    async fn test_read_prefix_negative_reads_nothing() {
        let (_dir, backend) = setup();
        let prefix = backend.read_prefix("Reach", "Movie/a.mov", -5).await.unwrap();
        assert!(prefix.bytes.is_empty());
        assert_eq!(prefix.size, 4);
    }

    #[tokio::test]
    async fn test_every_listed_file_is_readable() {
        let (_dir, backend) = setup();
        for game in backend.list_games().await.unwrap() {
            for file in &game.files {
                let prefix = backend.read_prefix(&game.name, file, 16).await.unwrap();
                assert!(!prefix.bytes.is_empty());
            }
        }
    }

    #[tokio::test]
    async fn test_open_missing_segments_are_not_found() {
        let (_dir, backend) = setup();
        for (game, rel) in [
            ("Nope", "a.mov"),
            ("Reach", "Nope/a.mov"),
            ("Reach", "Movie/zzz.mov"),
            ("Reach", ""),
            ("Reach", "../loose.mov"),
        ] {
            let result = backend.open(game, rel).await;
            assert!(
                matches!(result, Err(TheaterError::NotFound(_))),
                "{game}/{rel}"
            );
        }
    }

    #[tokio::test]
    async fn test_backup_entries_walks_everything() {
        let (_dir, backend) = setup();
        let paths: Vec<String> = backend
            .backup_entries()
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.path)
            .collect();
        assert_eq!(
            paths,
            vec![
                "Halo3/film/x.FILM",
                "Reach/Map/forge.blf",
                "Reach/Movie/a.mov",
                "Reach/Movie/b.mov",
                "Reach/readme.txt",
                "loose.mov",
            ]
        );
    }
}
