//! Flat-list backend: a pre-enumerated file list indexed once at pick time.
//!
//! Hosts that cannot hand out a live directory handle supply every file under
//! the chosen folder along with its relative path instead. Three indices are
//! built from that list:
//!
//! - game -> sorted theater files (what `list_games` returns)
//! - (game, relative path) -> byte source, theater files only
//! - full relative path -> byte source, every file (full backup only)

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use super::path::{self, Extensions};
use super::{BackupEntry, FileKey, FileSource, GameFolder};
use crate::error::{Result, TheaterError};
use crate::host::{BoxFuture, ByteSource, PickedFile};

/// Root name reported when the list has no common first segment.
pub const SELECTED_FOLDER: &str = "selected-folder";

pub struct FlatListBackend {
    root_name: String,
    games: Vec<GameFolder>,
    files: HashMap<FileKey, Arc<dyn ByteSource>>,
    all_files: BTreeMap<String, Arc<dyn ByteSource>>,
}

impl FlatListBackend {
    /// Index a flat file list.
    ///
    /// If every path shares the same first segment it is taken as the picked
    /// folder's own name and stripped. Of what remains, the first segment is
    /// the game and the rest the relative path. Paths without both parts, or
    /// with `.` or `..` segments, are ignored.
    pub fn from_files(files: Vec<PickedFile>, extensions: &Extensions) -> Self {
        let split: Vec<(Vec<String>, Arc<dyn ByteSource>)> = files
            .into_iter()
            .map(|f| {
                let parts: Vec<String> = path::segments(&f.relative_path)
                    .into_iter()
                    .map(str::to_string)
                    .collect();
                (parts, f.source)
            })
            .filter(|(parts, _)| !parts.is_empty())
            .filter(|(parts, _)| {
                let plain = parts.iter().all(|p| path::is_plain_segment(p));
                if !plain {
                    log::debug!("skipping listed path {:?}", parts.join("/"));
                }
                plain
            })
            .collect();

        let root_name = common_root(split.iter().map(|(parts, _)| parts.as_slice()));
        let start = usize::from(root_name.is_some());

        let mut game_files: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        let mut index = HashMap::new();
        let mut all_files = BTreeMap::new();

        for (parts, source) in split {
            let parts = &parts[start..];
            if parts.len() < 2 {
                continue;
            }
            let game_name = &parts[0];
            let relative_path = parts[1..].join("/");
            all_files.insert(parts.join("/"), Arc::clone(&source));

            if !extensions.matches(&relative_path) {
                continue;
            }
            game_files
                .entry(game_name.clone())
                .or_default()
                .insert(relative_path.clone());
            index.insert(FileKey::new(game_name.clone(), relative_path), source);
        }

        let games: Vec<GameFolder> = game_files
            .into_iter()
            .map(|(name, files)| GameFolder {
                name,
                files: files.into_iter().collect(),
            })
            .collect();

        log::debug!(
            "flat list indexed: {} game(s), {} theater file(s), {} file(s) total",
            games.len(),
            index.len(),
            all_files.len()
        );

        Self {
            root_name: root_name.unwrap_or_else(|| SELECTED_FOLDER.to_string()),
            games,
            files: index,
            all_files,
        }
    }

    /// Name of the picked folder.
    pub fn root_name(&self) -> &str {
        &self.root_name
    }
}

/// The first segment shared by every path, if there is one.
fn common_root<'a>(mut paths: impl Iterator<Item = &'a [String]>) -> Option<String> {
    let first = paths.next()?.first()?.clone();
    paths
        .all(|parts| parts.first() == Some(&first))
        .then_some(first)
}

impl FileSource for FlatListBackend {
    fn list_games(&self) -> BoxFuture<'_, Result<Vec<GameFolder>>> {
        Box::pin(async move { Ok(self.games.clone()) })
    }

    fn open<'a>(
        &'a self,
        game_name: &'a str,
        relative_path: &'a str,
    ) -> BoxFuture<'a, Result<Arc<dyn ByteSource>>> {
        Box::pin(async move {
            let key = FileKey::new(game_name, relative_path);
            self.files.get(&key).cloned().ok_or_else(|| {
                TheaterError::NotFound(path::entry_name(game_name, relative_path))
            })
        })
    }

    fn backup_entries(&self) -> BoxFuture<'_, Result<Vec<BackupEntry>>> {
        Box::pin(async move {
            if self.all_files.is_empty() {
                return Err(TheaterError::NoFolderSelected);
            }
            Ok(self
                .all_files
                .iter()
                .map(|(path, source)| BackupEntry {
                    path: path.clone(),
                    source: Arc::clone(source),
                })
                .collect())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::memory::MemoryFile;

    fn picked(path: &str, data: &[u8]) -> PickedFile {
        PickedFile {
            relative_path: path.to_string(),
            source: Arc::new(MemoryFile::new(data.to_vec())),
        }
    }

    fn backend(paths: &[&str]) -> FlatListBackend {
        let files = paths.iter().map(|p| picked(p, p.as_bytes())).collect();
        FlatListBackend::from_files(files, &Extensions::default())
    }

    #[tokio::test]
    async fn test_common_root_is_stripped() {
        let backend = backend(&[
            "UserContent/Reach/Movie/b.mov",
            "UserContent/Reach/Movie/a.mov",
            "UserContent/Halo3/x.film",
            "UserContent/Reach/notes.txt",
        ]);
        assert_eq!(backend.root_name(), "UserContent");
        assert_eq!(
            backend.list_games().await.unwrap(),
            vec![
                GameFolder {
                    name: "Halo3".to_string(),
                    files: vec!["x.film".to_string()]
                },
                GameFolder {
                    name: "Reach".to_string(),
                    files: vec!["Movie/a.mov".to_string(), "Movie/b.mov".to_string()]
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_no_common_root_keeps_first_segment_as_game() {
        let backend = backend(&["Reach/a.mov", "Halo3/b.mov"]);
        assert_eq!(backend.root_name(), SELECTED_FOLDER);
        let games = backend.list_games().await.unwrap();
        assert_eq!(games.len(), 2);
        assert_eq!(games[0].name, "Halo3");
        assert_eq!(games[1].files, vec!["a.mov".to_string()]);
    }

    #[tokio::test]
    async fn test_backslashes_and_empty_segments_normalized() {
        let backend = backend(&["Root\\Reach\\\\Movie\\a.mov", "/Root/Reach/b.blf/"]);
        let games = backend.list_games().await.unwrap();
        assert_eq!(
            games[0].files,
            vec!["Movie/a.mov".to_string(), "b.blf".to_string()]
        );
        assert!(backend.open("Reach", "Movie/a.mov").await.is_ok());
    }

    #[tokio::test]
    async fn test_files_directly_under_root_are_ignored() {
        let backend = backend(&["Root/loose.mov", "Root/Reach/a.mov"]);
        let games = backend.list_games().await.unwrap();
        assert_eq!(games.len(), 1);
        assert_eq!(games[0].name, "Reach");
        assert!(backend.open("Root", "loose.mov").await.is_err());
    }

    #[tokio::test]
    async fn test_dot_segments_are_skipped() {
        let backend = backend(&[
            "Root/Reach/../../evil.mov",
            "Root/Reach/./a.mov",
            "Root/Reach/b.mov",
        ]);
        assert_eq!(backend.root_name(), "Root");
        let games = backend.list_games().await.unwrap();
        assert_eq!(
            games,
            vec![GameFolder {
                name: "Reach".to_string(),
                files: vec!["b.mov".to_string()]
            }]
        );
        assert!(backend.open("Reach", "../../evil.mov").await.is_err());
        let paths: Vec<String> = backend
            .backup_entries()
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.path)
            .collect();
        assert_eq!(paths, vec!["Reach/b.mov"]);
    }

    #[tokio::test]
    async fn test_duplicate_paths_listed_once() {
        let backend = backend(&["Root/Reach/a.mov", "Root/Reach/a.mov"]);
        let games = backend.list_games().await.unwrap();
        assert_eq!(games[0].files, vec!["a.mov".to_string()]);
    }

    #[tokio::test]
    async fn test_read_prefix_and_not_found() {
        let backend = backend(&["Root/Reach/Movie/a.mov", "Root/Reach/notes.txt"]);
        let prefix = backend
            .read_prefix("Reach", "Movie/a.mov", 4)
            .await
            .unwrap();
        assert_eq!(prefix.bytes, b"Root");
        assert_eq!(prefix.size, "Root/Reach/Movie/a.mov".len() as u64);

        // present in the list but not a theater file
        assert!(matches!(
            backend.read_prefix("Reach", "notes.txt", 4).await,
            Err(TheaterError::NotFound(_))
        ));
        assert!(matches!(
            backend.read_prefix("Reach", "missing.mov", 4).await,
            Err(TheaterError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_list_games_is_idempotent() {
        let backend = backend(&["Root/Reach/a.mov", "Root/Halo3/b.mov"]);
        let first = backend.list_games().await.unwrap();
        assert_eq!(first, backend.list_games().await.unwrap());
    }

    #[tokio::test]
    async fn test_backup_entries_include_every_file() {
        let backend = backend(&[
            "Root/Reach/notes.txt",
            "Root/Reach/a.mov",
            "Root/Halo3/cfg/settings.bin",
        ]);
        let paths: Vec<String> = backend
            .backup_entries()
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.path)
            .collect();
        assert_eq!(
            paths,
            vec!["Halo3/cfg/settings.bin", "Reach/a.mov", "Reach/notes.txt"]
        );
    }

    #[tokio::test]
    async fn test_backup_with_nothing_indexed_fails() {
        let backend = backend(&["Root/loose.mov"]);
        assert!(matches!(
            backend.backup_entries().await,
            Err(TheaterError::NoFolderSelected)
        ));
    }
}
