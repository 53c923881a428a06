//! Persistent capability slot.
//!
//! Holds at most one directory capability per installation, under a fixed
//! key, so the chosen folder can be reopened without picking it again. Every
//! operation is best effort: the store failing must never block picking a
//! folder, so failures are logged and otherwise look exactly like "nothing
//! saved".

pub mod kv;

use std::sync::Arc;

use crate::host::DirectoryHandle;

pub use kv::{KeyValueStore, MemoryStore, SqliteStore};

/// The single slot every capability is saved under.
pub const CAPABILITY_KEY: &str = "userContent";

#[derive(Clone)]
pub struct CapabilityStore {
    store: Arc<dyn KeyValueStore>,
}

impl CapabilityStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Persist `capability`, replacing whatever was saved before.
    /// The outcome is advisory only and is not reported.
    pub async fn save(&self, capability: &dyn DirectoryHandle) {
        let store = Arc::clone(&self.store);
        let token = capability.token();
        match tokio::task::spawn_blocking(move || store.put(CAPABILITY_KEY, &token)).await {
            Ok(Ok(())) => log::debug!("saved folder capability for {}", capability.name()),
            Ok(Err(e)) => log::debug!("could not save folder capability: {}", e),
            Err(e) => log::debug!("capability save task failed: {}", e),
        }
    }

    /// The saved capability token, if any.
    pub async fn load(&self) -> Option<String> {
        let store = Arc::clone(&self.store);
        match tokio::task::spawn_blocking(move || store.get(CAPABILITY_KEY)).await {
            Ok(Ok(token)) => token,
            Ok(Err(e)) => {
                log::debug!("could not load folder capability: {}", e);
                None
            }
            Err(e) => {
                log::debug!("capability load task failed: {}", e);
                None
            }
        }
    }

    /// Forget the saved capability. Tolerates the store not existing.
    pub async fn clear(&self) {
        let store = Arc::clone(&self.store);
        match tokio::task::spawn_blocking(move || store.delete_store()).await {
            Ok(Ok(())) => log::debug!("cleared folder capability"),
            Ok(Err(e)) => log::debug!("could not clear folder capability: {}", e),
            Err(e) => log::debug!("capability clear task failed: {}", e),
        }
    }
}
