//! Shared application state for the Axum handlers.

use tally_engine::VotingEngine;
use tally_store::{MemoryStore, PollRepository, PollStore};

/// State shared by every request handler.
#[derive(Clone)]
pub struct AppState {
    /// The voting rules over the configured store.
    pub engine: VotingEngine,
    /// Extra attempts a mutation gets after a write conflict.
    pub conflict_retries: u32,
}

impl AppState {
    /// Create state around an engine.
    pub const fn new(engine: VotingEngine, conflict_retries: u32) -> Self {
        Self {
            engine,
            conflict_retries,
        }
    }

    /// State backed by a fresh in-memory store.
    pub fn in_memory(conflict_retries: u32) -> Self {
        let repo = PollRepository::new(PollStore::from(MemoryStore::new()));
        Self::new(VotingEngine::new(repo), conflict_retries)
    }
}
