//! Catalog rows and the export manifest.
//!
//! A row is one listed file joined with whatever the metadata extractor could
//! read from its prefix. Rows are what a browser shows and what an export
//! manifest is built from.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::metadata::{self, LayoutVariant};
use crate::source::{FileKey, FileRecord, FileSource, GameFolder};

/// Per-inspection knobs, normally taken from config.
#[derive(Debug, Clone)]
pub struct InspectOptions {
    pub prefix_bytes: usize,
    pub pii_replacement: String,
}

impl Default for InspectOptions {
    fn default() -> Self {
        Self {
            prefix_bytes: metadata::RECOMMENDED_PREFIX_BYTES,
            pii_replacement: metadata::DEFAULT_PII_REPLACEMENT.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRow {
    #[serde(flatten)]
    pub record: FileRecord,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_name_safe: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scenario_path_or_ugc_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub player_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub layout_variant: Option<LayoutVariant>,
    /// Why the file could not be read, if it could not.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl FileRow {
    pub fn key(&self) -> FileKey {
        FileKey::new(&self.record.game_name, &self.record.relative_path)
    }

    fn failed(key: &FileKey, error: String) -> Self {
        Self {
            record: FileRecord {
                game_name: key.game_name.clone(),
                relative_path: key.relative_path.clone(),
                size: 0,
                last_modified: None,
            },
            title: None,
            session_name: None,
            session_name_safe: None,
            session_time: None,
            scenario_path_or_ugc_url: None,
            player_name: None,
            layout_variant: None,
            error: Some(error),
        }
    }
}

/// Inspect one file. A read failure lands in the row's `error` field.
pub async fn inspect_file(
    source: &dyn FileSource,
    key: &FileKey,
    opts: &InspectOptions,
) -> FileRow {
    let max_bytes = i64::try_from(opts.prefix_bytes).unwrap_or(i64::MAX);
    let prefix = match source
        .read_prefix(&key.game_name, &key.relative_path, max_bytes)
        .await
    {
        Ok(prefix) => prefix,
        Err(e) => {
            log::warn!(
                "could not read {}/{}: {}",
                key.game_name,
                key.relative_path,
                e
            );
            return FileRow::failed(key, e.to_string());
        }
    };

    let meta = metadata::extract(&prefix.bytes);
    let session_name_safe = meta
        .session_name
        .as_deref()
        .map(|s| metadata::strip_session_pii(s, &opts.pii_replacement));

    FileRow {
        record: FileRecord {
            game_name: key.game_name.clone(),
            relative_path: key.relative_path.clone(),
            size: prefix.size,
            last_modified: prefix.last_modified,
        },
        title: meta.title,
        session_name: meta.session_name,
        session_name_safe,
        session_time: prefix.last_modified,
        scenario_path_or_ugc_url: meta.scenario_path_or_url,
        player_name: meta.player_name,
        layout_variant: Some(meta.layout_variant),
        error: None,
    }
}

/// Inspect `keys` in order.
pub async fn inspect_entries(
    source: &dyn FileSource,
    keys: &[FileKey],
    opts: &InspectOptions,
) -> Vec<FileRow> {
    let mut rows = Vec::with_capacity(keys.len());
    for key in keys {
        rows.push(inspect_file(source, key, opts).await);
    }
    rows
}

/// Inspect every file of every game, in listing order.
pub async fn inspect_games(
    source: &dyn FileSource,
    games: &[GameFolder],
    opts: &InspectOptions,
) -> Vec<FileRow> {
    let keys: Vec<FileKey> = games
        .iter()
        .flat_map(|g| g.files.iter().map(|f| FileKey::new(&g.name, f)))
        .collect();
    inspect_entries(source, &keys, opts).await
}

/// The `meta.json` document stored alongside exported files.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    pub created_utc: DateTime<Utc>,
    pub strip_pii: bool,
    pub file_count: usize,
    pub files: Vec<ManifestEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestEntry {
    pub game_name: String,
    pub relative_path: String,
    pub size: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub player_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scenario_path_or_ugc_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Describe `rows` for export. With `strip_pii` the session names are the
/// stripped ones.
pub fn build_manifest(rows: &[FileRow], strip_pii: bool) -> Manifest {
    let files: Vec<ManifestEntry> = rows
        .iter()
        .map(|row| ManifestEntry {
            game_name: row.record.game_name.clone(),
            relative_path: row.record.relative_path.clone(),
            size: row.record.size,
            session_name: if strip_pii {
                row.session_name_safe.clone()
            } else {
                row.session_name.clone()
            },
            session_time: row.session_time,
            title: row.title.clone(),
            player_name: row.player_name.clone(),
            scenario_path_or_ugc_url: row.scenario_path_or_ugc_url.clone(),
            error: row.error.clone(),
        })
        .collect();

    Manifest {
        created_utc: Utc::now(),
        strip_pii,
        file_count: files.len(),
        files,
    }
}

impl Manifest {
    pub fn to_json(&self) -> crate::error::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
