//! Error types for the data layer.
//!
//! Backend failures surface as [`StoreError`], which wraps the underlying
//! [`fred`] errors. The repository lifts those into [`RepositoryError`]
//! together with the poll-level outcomes (missing record, version
//! conflict, corrupt record) that callers branch on.

use tally_types::PollId;

use crate::codec::DecodeError;

/// Errors raised by a store backend.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A `Dragonfly`/Redis operation failed.
    #[error("Dragonfly error: {0}")]
    Dragonfly(#[from] fred::error::Error),

    /// A script returned a status code the client does not understand.
    #[error("unexpected reply from store script: {0}")]
    UnexpectedReply(i64),

    /// The record under this key is at the maximum version and can no
    /// longer be replaced.
    #[error("record {0} has exhausted its version counter")]
    VersionExhausted(String),

    /// A configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Errors returned by [`PollRepository`](crate::PollRepository) operations.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    /// No record exists for the poll.
    #[error("poll {0} not found")]
    NotFound(PollId),

    /// A record with this id already exists.
    #[error("poll {0} already exists")]
    AlreadyExists(PollId),

    /// The stored record is malformed.
    #[error("poll {id} has a malformed record: {source}")]
    Decode {
        /// The poll whose record failed to decode.
        id: PollId,
        /// Why decoding failed.
        source: DecodeError,
    },

    /// The record changed since the caller read it.
    #[error("poll {id} was modified concurrently (expected version {expected}, found {found})")]
    Conflict {
        /// The contested poll.
        id: PollId,
        /// Version the caller read.
        expected: u64,
        /// Version currently stored.
        found: u64,
    },

    /// The backend could not be reached or rejected the operation.
    #[error("store unavailable: {0}")]
    StoreUnavailable(#[from] StoreError),
}
