//! Voting engine for Tally.
//!
//! Enforces the poll lifecycle (open until its creator ends it, then
//! closed for good) and vote integrity (one vote per user per poll, only
//! for offered options, only while open). Persistence goes through
//! [`tally_store::PollRepository`]; this crate holds the rules only.
//!
//! # Modules
//!
//! - [`engine`] -- The [`VotingEngine`] operations
//! - [`validation`] -- Input normalization and checks
//! - [`error`] -- [`VotingError`] taxonomy

pub mod engine;
pub mod error;
pub mod validation;

pub use engine::VotingEngine;
pub use error::VotingError;
