//! Data layer for Tally polls.
//!
//! A poll is persisted as one flat JSON record in a keyed store. This crate
//! maps polls to and from that record and provides the repository the
//! voting engine reads and writes through.
//!
//! # Architecture
//!
//! ```text
//! VotingEngine
//!     |
//!     +-- PollRepository  (CRUD, compare-and-swap replace)
//!             |
//!             +-- codec     (Poll <-> Record, strict decode)
//!             |
//!             +-- PollStore
//!                   |-- Dragonfly  (hash per poll, Lua scripts)
//!                   +-- Memory     (process-local map)
//! ```
//!
//! # Modules
//!
//! - [`codec`] -- Record layout, encode and strict decode
//! - [`store`] -- Backend dispatch and swap outcomes
//! - [`dragonfly`] -- `Dragonfly` (Redis-compatible) backend
//! - [`memory`] -- In-memory backend
//! - [`repository`] -- Poll CRUD keyed by id
//! - [`error`] -- Shared error types

pub mod codec;
pub mod dragonfly;
pub mod error;
pub mod memory;
pub mod repository;
pub mod store;

// Re-export primary types for convenience.
pub use codec::{DecodeError, Record};
pub use dragonfly::{DragonflyOptions, DragonflyStore};
pub use error::{RepositoryError, StoreError};
pub use memory::MemoryStore;
pub use repository::{PollRepository, poll_key};
pub use store::{PollStore, SwapOutcome};
