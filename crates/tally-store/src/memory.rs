//! Process-local poll record backend.
//!
//! Mirrors the `Dragonfly` backend's semantics (insert-if-absent,
//! version-checked swap, idempotent remove) behind a [`RwLock`]. Records
//! are kept as JSON text so reads exercise the same decode path as the
//! networked store. Used by tests and by the `memory` store setting.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::store::SwapOutcome;

#[derive(Debug, Clone)]
struct Entry {
    version: u64,
    body: String,
}

/// In-memory keyed store. Clones share the same map.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Arc<RwLock<HashMap<String, Entry>>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Write a new record unless `key` already exists.
    pub async fn insert(&self, key: &str, version: u64, body: &str) -> bool {
        let mut entries = self.entries.write().await;
        if entries.contains_key(key) {
            return false;
        }
        entries.insert(
            key.to_owned(),
            Entry {
                version,
                body: body.to_owned(),
            },
        );
        true
    }

    /// Read the record JSON under `key`.
    pub async fn load(&self, key: &str) -> Option<String> {
        self.entries.read().await.get(key).map(|e| e.body.clone())
    }

    /// Replace the record under `key` if its version equals `expected`.
    pub async fn swap(&self, key: &str, expected: u64, version: u64, body: &str) -> SwapOutcome {
        let mut entries = self.entries.write().await;
        let Some(entry) = entries.get_mut(key) else {
            return SwapOutcome::Missing;
        };
        if entry.version != expected {
            return SwapOutcome::Stale {
                stored: entry.version,
            };
        }
        entry.version = version;
        body.clone_into(&mut entry.body);
        SwapOutcome::Swapped
    }

    /// Delete the record under `key`.
    pub async fn remove(&self, key: &str) -> bool {
        self.entries.write().await.remove(key).is_some()
    }

    /// Overwrite the raw body under `key`, bypassing version checks.
    ///
    /// Lets tests plant corrupt records.
    pub async fn put_raw(&self, key: &str, version: u64, body: &str) {
        self.entries.write().await.insert(
            key.to_owned(),
            Entry {
                version,
                body: body.to_owned(),
            },
        );
    }

    /// Whether the store holds no records.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}
