//! Shared type definitions for the Tally polling service.
//!
//! This crate is the single source of truth for the poll model used across
//! the workspace. Types defined here flow downstream to `TypeScript` via
//! `ts-rs` for API clients.
//!
//! # Modules
//!
//! - [`ids`] -- Typed wrappers for poll and user identifiers
//! - [`poll`] -- The [`Poll`] aggregate and embedded [`Vote`] records
//! - [`summary`] -- The read-only [`PollSummary`] results view

pub mod ids;
pub mod poll;
pub mod summary;

// Re-export all public types at crate root for convenience.
pub use ids::{PollId, UserId};
pub use poll::{INITIAL_VERSION, MIN_OPTIONS, Poll, PollStatus, Vote, now_whole_seconds};
pub use summary::{OptionTally, PollSummary};
