//! TheaterFs: the process-wide file source session.
//!
//! Owns the single active backend and switches it on pick, restore and clear.
//! Every switch first drops the previous backend entirely, so indices from
//! one pick never leak into the next. Methods that switch take `&mut self`,
//! which serializes picks.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use strum::{AsRefStr, Display};
use tokio::task::JoinHandle;

use super::flat::FlatListBackend;
use super::handle::HandleBackend;
use super::path::Extensions;
use super::{FileKey, FilePrefix, FileSource, GameFolder};
use crate::archive;
use crate::capability::CapabilityStore;
use crate::error::{Result, TheaterError};
use crate::host::{DirectoryHandle, FolderPicker, Permission};

/// Folder name reported for a saved capability that has no name of its own.
const SAVED_FOLDER: &str = "saved-folder";

/// Which backend is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display, AsRefStr)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum SourceMode {
    Handle,
    FlatList,
}

/// Result of a successful pick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PickOutcome {
    pub folder_name: String,
    pub mode: SourceMode,
}

/// Why a saved folder was not restored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display, AsRefStr)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum RestoreReason {
    NoCapabilitySaved,
    PermissionNotGranted,
    RestorationUnsupportedInThisEnvironment,
}

/// Result of a restoration attempt. Restoration never fails outright.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum RestoreOutcome {
    Restored {
        folder_name: String,
    },
    NotRestored {
        reason: RestoreReason,
        #[serde(skip_serializing_if = "Option::is_none")]
        folder_name: Option<String>,
    },
}

impl RestoreOutcome {
    pub fn is_restored(&self) -> bool {
        matches!(self, RestoreOutcome::Restored { .. })
    }

    fn not_restored(reason: RestoreReason, folder_name: Option<String>) -> Self {
        RestoreOutcome::NotRestored {
            reason,
            folder_name,
        }
    }
}

struct ActiveRoot {
    folder_name: String,
    mode: SourceMode,
    backend: Box<dyn FileSource>,
}

/// The file source session.
pub struct TheaterFs {
    picker: Arc<dyn FolderPicker>,
    capabilities: CapabilityStore,
    extensions: Extensions,
    active: Option<ActiveRoot>,
    pending_save: Option<JoinHandle<()>>,
}

impl TheaterFs {
    pub fn new(
        picker: Arc<dyn FolderPicker>,
        capabilities: CapabilityStore,
        extensions: Extensions,
    ) -> Self {
        Self {
            picker,
            capabilities,
            extensions,
            active: None,
            pending_save: None,
        }
    }

    /// Whether any folder access method exists in this environment.
    pub fn is_supported(&self) -> bool {
        self.picker.supports_directory_handles() || self.picker.supports_file_list()
    }

    /// Name of the active root folder.
    pub fn folder_name(&self) -> Option<&str> {
        self.active.as_ref().map(|a| a.folder_name.as_str())
    }

    pub fn mode(&self) -> Option<SourceMode> {
        self.active.as_ref().map(|a| a.mode)
    }

    /// The active backend.
    pub fn source(&self) -> Result<&dyn FileSource> {
        self.active
            .as_ref()
            .map(|a| a.backend.as_ref())
            .ok_or(TheaterError::NoFolderSelected)
    }

    /// Acquire a new root, replacing all prior state.
    ///
    /// A live directory handle is preferred. Its capability is saved in the
    /// background; call [`TheaterFs::flush`] to wait for that. A save still
    /// running from an earlier pick is awaited first, so the newest pick is
    /// always the one left in the store.
    pub async fn pick_root(&mut self) -> Result<PickOutcome> {
        self.active = None;
        self.flush().await;

        if self.picker.supports_directory_handles() {
            let root = self.picker.pick_directory().await?;
            let store = self.capabilities.clone();
            let saved = Arc::clone(&root);
            self.pending_save = Some(tokio::spawn(async move {
                store.save(saved.as_ref()).await;
            }));
            return Ok(self.activate_handle(root));
        }

        if self.picker.supports_file_list() {
            let files = self.picker.pick_file_list().await?;
            if files.is_empty() {
                return Err(TheaterError::NoFolderSelected);
            }
            let backend = FlatListBackend::from_files(files, &self.extensions);
            let folder_name = backend.root_name().to_string();
            log::info!("picked folder {} (flat list)", folder_name);
            self.active = Some(ActiveRoot {
                folder_name: folder_name.clone(),
                mode: SourceMode::FlatList,
                backend: Box::new(backend),
            });
            return Ok(PickOutcome {
                folder_name,
                mode: SourceMode::FlatList,
            });
        }

        Err(TheaterError::Unsupported(
            "no directory picker or file list input available".to_string(),
        ))
    }

    /// Try to reopen the previously saved folder.
    ///
    /// If the saved grant is not currently held and `auto_request` is set,
    /// permission is requested once.
    pub async fn try_restore(&mut self, auto_request: bool) -> RestoreOutcome {
        self.active = None;

        if !self.picker.supports_directory_handles() {
            return RestoreOutcome::not_restored(
                RestoreReason::RestorationUnsupportedInThisEnvironment,
                None,
            );
        }

        self.flush().await;
        let Some(token) = self.capabilities.load().await else {
            return RestoreOutcome::not_restored(RestoreReason::NoCapabilitySaved, None);
        };
        let Some(root) = self.picker.resolve_capability(&token) else {
            log::debug!("saved capability could not be resolved by this host");
            return RestoreOutcome::not_restored(RestoreReason::NoCapabilitySaved, None);
        };

        let mut permission = root.query_permission().await;
        if permission != Permission::Granted && auto_request {
            permission = root.request_permission().await;
        }

        if permission == Permission::Granted {
            let outcome = self.activate_handle(root);
            return RestoreOutcome::Restored {
                folder_name: outcome.folder_name,
            };
        }

        let folder_name = if root.name().is_empty() {
            SAVED_FOLDER.to_string()
        } else {
            root.name().to_string()
        };
        log::info!("saved folder {} not restored: permission not granted", folder_name);
        RestoreOutcome::not_restored(RestoreReason::PermissionNotGranted, Some(folder_name))
    }

    /// Drop the active root and forget the saved capability.
    pub async fn clear_selection(&mut self) {
        self.active = None;
        self.flush().await;
        self.capabilities.clear().await;
    }

    /// Wait for a background capability save to finish.
    pub async fn flush(&mut self) {
        if let Some(pending) = self.pending_save.take() {
            if let Err(e) = pending.await {
                log::debug!("capability save task failed: {}", e);
            }
        }
    }

    pub async fn list_games(&self) -> Result<Vec<GameFolder>> {
        self.source()?.list_games().await
    }

    pub async fn read_prefix(
        &self,
        game_name: &str,
        relative_path: &str,
        max_bytes: i64,
    ) -> Result<FilePrefix> {
        self.source()?
            .read_prefix(game_name, relative_path, max_bytes)
            .await
    }

    /// Export `entries` plus `manifest_json` as `meta.json` into
    /// `<out_dir>/<archive_name>`.
    pub async fn build_selected_archive(
        &self,
        entries: &[FileKey],
        manifest_json: &str,
        out_dir: &Path,
        archive_name: Option<&str>,
    ) -> Result<PathBuf> {
        archive::build_selected_archive(
            self.source()?,
            entries,
            manifest_json,
            out_dir,
            archive_name,
        )
        .await
    }

    /// Back up every file under the active root into `<out_dir>/<archive_name>`.
    pub async fn build_full_backup_archive(
        &self,
        out_dir: &Path,
        archive_name: Option<&str>,
    ) -> Result<PathBuf> {
        archive::build_full_backup_archive(self.source()?, out_dir, archive_name).await
    }

    fn activate_handle(&mut self, root: Arc<dyn DirectoryHandle>) -> PickOutcome {
        let folder_name = root.name().to_string();
        log::info!("using folder {} (directory handle)", folder_name);
        self.active = Some(ActiveRoot {
            folder_name: folder_name.clone(),
            mode: SourceMode::Handle,
            backend: Box::new(HandleBackend::new(root, self.extensions.clone())),
        });
        PickOutcome {
            folder_name,
            mode: SourceMode::Handle,
        }
    }
}
