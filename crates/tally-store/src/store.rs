//! Keyed record store abstraction.
//!
//! A poll record lives under one key together with its version. Backends
//! provide four primitives: insert-if-absent, load, version-checked swap,
//! and remove. [`PollStore`] dispatches to the configured backend.

use crate::dragonfly::DragonflyStore;
use crate::error::StoreError;
use crate::memory::MemoryStore;

/// Result of a version-checked swap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwapOutcome {
    /// The stored version matched and the record was replaced.
    Swapped,
    /// No record exists under the key.
    Missing,
    /// The stored version differs from the expected one.
    Stale {
        /// Version currently stored.
        stored: u64,
    },
}

/// A keyed store holding one versioned JSON record per poll.
#[derive(Clone)]
pub enum PollStore {
    /// `Dragonfly` (Redis-compatible) backend.
    Dragonfly(DragonflyStore),
    /// Process-local backend for tests and local development.
    Memory(MemoryStore),
}

impl PollStore {
    /// Store `body` under `key` unless the key already exists.
    ///
    /// Returns `false` when the key was already taken.
    pub async fn insert(&self, key: &str, version: u64, body: &str) -> Result<bool, StoreError> {
        match self {
            Self::Dragonfly(store) => store.insert(key, version, body).await,
            Self::Memory(store) => Ok(store.insert(key, version, body).await),
        }
    }

    /// Read the record body stored under `key`.
    pub async fn load(&self, key: &str) -> Result<Option<String>, StoreError> {
        match self {
            Self::Dragonfly(store) => store.load(key).await,
            Self::Memory(store) => Ok(store.load(key).await),
        }
    }

    /// Replace the record under `key` if its stored version is `expected`.
    pub async fn swap(
        &self,
        key: &str,
        expected: u64,
        version: u64,
        body: &str,
    ) -> Result<SwapOutcome, StoreError> {
        match self {
            Self::Dragonfly(store) => store.swap(key, expected, version, body).await,
            Self::Memory(store) => Ok(store.swap(key, expected, version, body).await),
        }
    }

    /// Delete the record under `key`. Returns whether a record was removed.
    pub async fn remove(&self, key: &str) -> Result<bool, StoreError> {
        match self {
            Self::Dragonfly(store) => store.remove(key).await,
            Self::Memory(store) => Ok(store.remove(key).await),
        }
    }

    /// Human-readable backend name for logging.
    pub const fn backend_name(&self) -> &'static str {
        match self {
            Self::Dragonfly(_) => "dragonfly",
            Self::Memory(_) => "memory",
        }
    }
}

impl From<DragonflyStore> for PollStore {
    fn from(store: DragonflyStore) -> Self {
        Self::Dragonfly(store)
    }
}

impl From<MemoryStore> for PollStore {
    fn from(store: MemoryStore) -> Self {
        Self::Memory(store)
    }
}
