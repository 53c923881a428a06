//! Zip archive building.
//!
//! Archives are always written uncompressed: replay files are already dense
//! and the point is a faithful copy. Files are streamed in fixed-size chunks
//! so a large film never has to fit in memory.
//!
//! Output goes to a temporary file next to the destination and is renamed
//! into place only once the archive is complete. A failed build leaves
//! nothing behind.

use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::{Result, TheaterError};
use crate::host::ByteSource;
use crate::source::path;
use crate::source::{FileKey, FileSource};

pub const DEFAULT_ARCHIVE_NAME: &str = "archive.zip";
pub const DEFAULT_BACKUP_NAME: &str = "backup.zip";
pub const MANIFEST_ENTRY: &str = "meta.json";

const CHUNK_SIZE: usize = 1 << 20;

/// Zip files above this size need zip64 records.
const ZIP64_THRESHOLD: u64 = u32::MAX as u64;

type Archive = ZipWriter<NamedTempFile>;

/// Build `<out_dir>/<archive_name>` holding `entries` in input order, each at
/// `gameName/relativePath`, followed by `meta.json`.
///
/// An empty `manifest_json` is written as `{}`. The first entry that cannot
/// be resolved aborts the whole build.
pub async fn build_selected_archive(
    source: &dyn FileSource,
    entries: &[FileKey],
    manifest_json: &str,
    out_dir: &Path,
    archive_name: Option<&str>,
) -> Result<PathBuf> {
    let dest = destination(out_dir, archive_name, DEFAULT_ARCHIVE_NAME)?;
    let mut zip = start_archive(out_dir)?;

    for key in entries {
        let file = source.open(&key.game_name, &key.relative_path).await?;
        let name = path::entry_name(&key.game_name, &key.relative_path);
        append_source(&mut zip, &name, file.as_ref()).await?;
    }

    let manifest = if manifest_json.is_empty() {
        "{}"
    } else {
        manifest_json
    };
    zip.start_file(MANIFEST_ENTRY, stored(manifest.len() as u64))?;
    zip.write_all(manifest.as_bytes())?;

    let written = finish_archive(zip, &dest)?;
    log::info!(
        "wrote {} with {} file(s) and {}",
        written.display(),
        entries.len(),
        MANIFEST_ENTRY
    );
    Ok(written)
}

/// Build `<out_dir>/<archive_name>` holding every file under the active root
/// at its path relative to that root.
pub async fn build_full_backup_archive(
    source: &dyn FileSource,
    out_dir: &Path,
    archive_name: Option<&str>,
) -> Result<PathBuf> {
    let dest = destination(out_dir, archive_name, DEFAULT_BACKUP_NAME)?;
    let entries = source.backup_entries().await?;
    if entries.is_empty() {
        return Err(TheaterError::NoFolderSelected);
    }

    let mut zip = start_archive(out_dir)?;
    for entry in &entries {
        append_source(&mut zip, &path::normalize(&entry.path), entry.source.as_ref()).await?;
    }

    let written = finish_archive(zip, &dest)?;
    log::info!("wrote backup {} with {} file(s)", written.display(), entries.len());
    Ok(written)
}

fn stored(size: u64) -> SimpleFileOptions {
    SimpleFileOptions::default()
        .compression_method(CompressionMethod::Stored)
        .large_file(size >= ZIP64_THRESHOLD)
}

/// Resolve the final archive path. Names must be a single path component.
fn destination(out_dir: &Path, archive_name: Option<&str>, default: &str) -> Result<PathBuf> {
    let name = archive_name
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .unwrap_or(default);
    if name == "." || name == ".." || name.contains(['/', '\\', '\0']) {
        return Err(TheaterError::Archive(format!(
            "invalid archive name: {:?}",
            name
        )));
    }
    Ok(out_dir.join(name))
}

fn start_archive(out_dir: &Path) -> Result<Archive> {
    std::fs::create_dir_all(out_dir)?;
    let tmp = NamedTempFile::new_in(out_dir)?;
    Ok(ZipWriter::new(tmp))
}

fn finish_archive(zip: Archive, dest: &Path) -> Result<PathBuf> {
    let tmp = zip.finish()?;
    tmp.persist(dest).map_err(|e| TheaterError::Io(e.error))?;
    Ok(dest.to_path_buf())
}

async fn append_source(zip: &mut Archive, name: &str, source: &dyn ByteSource) -> Result<()> {
    zip.start_file(name, stored(source.size()))?;
    let mut offset = 0u64;
    loop {
        let chunk = source.read_range(offset, CHUNK_SIZE).await?;
        if chunk.is_empty() {
            break;
        }
        zip.write_all(&chunk)?;
        offset += chunk.len() as u64;
        if chunk.len() < CHUNK_SIZE {
            break;
        }
    }
    Ok(())
}
