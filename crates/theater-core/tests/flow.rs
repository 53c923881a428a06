//! End-to-end flows over a real temporary replay folder.

use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use tempfile::TempDir;
use theater_core::host::local::LocalPicker;
use theater_core::metadata::{SESSION_OFFSET, TITLE_OFFSET};
use theater_core::{
    CapabilityStore, Config, FileKey, LayoutVariant, MemoryStore, RestoreOutcome, RestoreReason,
    SourceMode, SqliteStore, TheaterError, TheaterFs, build_manifest, catalog, config,
};

fn utf16(s: &str) -> Vec<u8> {
    s.encode_utf16().flat_map(|u| u.to_le_bytes()).collect()
}

/// A replay in the extended layout: the scenario path sits after the
/// legacy offset and is found by scanning.
fn replay(title: &str, session: &str) -> Vec<u8> {
    let mut buf = vec![0u8; 0x1000];
    let title = utf16(title);
    buf[TITLE_OFFSET..TITLE_OFFSET + title.len()].copy_from_slice(&title);
    buf[SESSION_OFFSET..SESSION_OFFSET + session.len()].copy_from_slice(session.as_bytes());
    let scenario = b"haloreach\\maps\\70_boneyard";
    buf[0x0A00..0x0A00 + scenario.len()].copy_from_slice(scenario);
    buf
}

fn write(root: &Path, rel: &str, data: &[u8]) {
    let path = root.join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, data).unwrap();
}

fn user_content() -> TempDir {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "Reach/Movie/boneyard.mov", &replay("Boneyard", "Me@Xbox@555"));
    write(dir.path(), "Reach/Movie/short.mov", b"truncated");
    write(dir.path(), "Reach/Map/forge.blf", b"map variant");
    write(dir.path(), "Reach/settings.cfg", b"not a replay");
    dir
}

fn zip_names(path: &Path) -> Vec<String> {
    let file = std::fs::File::open(path).unwrap();
    let mut zip = zip::ZipArchive::new(file).unwrap();
    (0..zip.len())
        .map(|i| zip.by_index(i).unwrap().name().to_string())
        .collect()
}

fn zip_entry(path: &Path, name: &str) -> Vec<u8> {
    let file = std::fs::File::open(path).unwrap();
    let mut zip = zip::ZipArchive::new(file).unwrap();
    let mut entry = zip.by_name(name).unwrap();
    let mut data = Vec::new();
    entry.read_to_end(&mut data).unwrap();
    data
}

#[tokio::test]
async fn pick_inspect_export() {
    let folder = user_content();
    let out = TempDir::new().unwrap();
    let caps = CapabilityStore::new(Arc::new(MemoryStore::new()));
    let mut fs = TheaterFs::new(
        Arc::new(LocalPicker::directory(folder.path())),
        caps,
        Config::default().extensions(),
    );

    fs.pick_root().await.unwrap();
    let games = fs.list_games().await.unwrap();
    assert_eq!(games.len(), 1);
    assert_eq!(
        games[0].files,
        vec!["Map/forge.blf", "Movie/boneyard.mov", "Movie/short.mov"]
    );

    let opts = Config::default().inspect_options();
    let rows = catalog::inspect_games(fs.source().unwrap(), &games, &opts).await;
    let boneyard = rows
        .iter()
        .find(|r| r.record.relative_path == "Movie/boneyard.mov")
        .unwrap();
    assert_eq!(boneyard.title.as_deref(), Some("Boneyard"));
    assert_eq!(boneyard.layout_variant, Some(LayoutVariant::Extended));
    assert_eq!(
        boneyard.scenario_path_or_ugc_url.as_deref(),
        Some("haloreach\\maps\\70_boneyard")
    );
    assert!(boneyard.session_time.is_some());

    let keys = vec![
        FileKey::new("Reach", "Movie/boneyard.mov"),
        FileKey::new("Reach", "Map/forge.blf"),
    ];
    let selected: Vec<_> = rows
        .into_iter()
        .filter(|r| keys.contains(&r.key()))
        .collect();
    let manifest = build_manifest(&selected, true);
    let archive = fs
        .build_selected_archive(&keys, &manifest.to_json().unwrap(), out.path(), None)
        .await
        .unwrap();
    fs.flush().await;

    assert_eq!(
        zip_names(&archive),
        vec!["Reach/Movie/boneyard.mov", "Reach/Map/forge.blf", "meta.json"]
    );
    assert_eq!(zip_entry(&archive, "Reach/Map/forge.blf"), b"map variant");

    let meta: serde_json::Value =
        serde_json::from_slice(&zip_entry(&archive, "meta.json")).unwrap();
    assert_eq!(meta["fileCount"], 2);
    assert_eq!(meta["stripPii"], true);
    let sessions: Vec<&str> = meta["files"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|f| f["sessionName"].as_str())
        .collect();
    assert_eq!(sessions, vec!["Me@Xbox@HALO@RUNS"]);
}

#[tokio::test]
async fn restore_across_sessions_with_sqlite_store() {
    let folder = user_content();
    let home = TempDir::new().unwrap();
    let db = config::handles_db_path(home.path());
    let extensions = Config::default().extensions();

    let mut first = TheaterFs::new(
        Arc::new(LocalPicker::directory(folder.path())),
        CapabilityStore::new(Arc::new(SqliteStore::new(db.clone()))),
        extensions.clone(),
    );
    first.pick_root().await.unwrap();
    first.flush().await;
    drop(first);

    let caps = CapabilityStore::new(Arc::new(SqliteStore::new(db.clone())));
    let mut second = TheaterFs::new(
        Arc::new(LocalPicker::restore_only()),
        caps,
        extensions.clone(),
    );
    let outcome = second.try_restore(true).await;
    assert!(outcome.is_restored(), "{:?}", outcome);
    assert_eq!(second.mode(), Some(SourceMode::Handle));
    assert_eq!(second.list_games().await.unwrap()[0].name, "Reach");

    second.clear_selection().await;
    let mut third = TheaterFs::new(
        Arc::new(LocalPicker::restore_only()),
        CapabilityStore::new(Arc::new(SqliteStore::new(db))),
        extensions,
    );
    assert_eq!(
        third.try_restore(true).await,
        RestoreOutcome::NotRestored {
            reason: RestoreReason::NoCapabilitySaved,
            folder_name: None
        }
    );
}

#[tokio::test]
async fn restore_of_vanished_folder_is_not_granted() {
    let folder = user_content();
    let caps = CapabilityStore::new(Arc::new(MemoryStore::new()));
    let mut fs = TheaterFs::new(
        Arc::new(LocalPicker::directory(folder.path())),
        caps,
        Config::default().extensions(),
    );
    fs.pick_root().await.unwrap();
    fs.flush().await;
    let name = fs.folder_name().unwrap().to_string();
    drop(folder);

    let outcome = fs.try_restore(true).await;
    assert_eq!(
        outcome,
        RestoreOutcome::NotRestored {
            reason: RestoreReason::PermissionNotGranted,
            folder_name: Some(name)
        }
    );
}

#[tokio::test]
async fn flat_list_flow_and_backup() {
    let folder = user_content();
    let out = TempDir::new().unwrap();
    let paths = vec![
        "Reach/Movie/boneyard.mov".to_string(),
        "Reach/Map/forge.blf".to_string(),
        "Reach/settings.cfg".to_string(),
    ];
    let mut fs = TheaterFs::new(
        Arc::new(LocalPicker::file_list(folder.path(), paths)),
        CapabilityStore::new(Arc::new(MemoryStore::new())),
        Config::default().extensions(),
    );

    let picked = fs.pick_root().await.unwrap();
    assert_eq!(picked.mode, SourceMode::FlatList);
    let games = fs.list_games().await.unwrap();
    assert_eq!(games[0].files, vec!["Map/forge.blf", "Movie/boneyard.mov"]);

    // not listed, so not reachable even though it exists on disk
    assert!(matches!(
        fs.read_prefix("Reach", "Movie/short.mov", 16).await,
        Err(TheaterError::NotFound(_))
    ));

    let backup = fs
        .build_full_backup_archive(out.path(), Some("all.zip"))
        .await
        .unwrap();
    assert_eq!(backup, out.path().join("all.zip"));
    assert_eq!(
        zip_names(&backup),
        vec![
            "Reach/Map/forge.blf",
            "Reach/Movie/boneyard.mov",
            "Reach/settings.cfg"
        ]
    );
}

#[tokio::test]
async fn backup_of_handle_walks_everything() {
    let folder = user_content();
    let out = TempDir::new().unwrap();
    let mut fs = TheaterFs::new(
        Arc::new(LocalPicker::directory(folder.path())),
        CapabilityStore::new(Arc::new(MemoryStore::new())),
        Config::default().extensions(),
    );
    fs.pick_root().await.unwrap();
    let backup = fs.build_full_backup_archive(out.path(), None).await.unwrap();
    fs.flush().await;
    assert_eq!(
        zip_names(&backup),
        vec![
            "Reach/Map/forge.blf",
            "Reach/Movie/boneyard.mov",
            "Reach/Movie/short.mov",
            "Reach/settings.cfg"
        ]
    );
}
