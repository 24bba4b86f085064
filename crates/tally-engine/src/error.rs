//! Error types for the voting engine.
//!
//! Every rule the engine enforces has its own variant so transports can
//! map outcomes to status codes without string matching. Repository
//! failures are folded in through `From<RepositoryError>`.

use tally_store::{DecodeError, RepositoryError, StoreError};
use tally_types::{PollId, UserId};

/// Errors returned by [`VotingEngine`](crate::VotingEngine) operations.
#[derive(Debug, thiserror::Error)]
pub enum VotingError {
    /// Caller input is unusable (empty title, too few options, ...).
    #[error("validation failed: {0}")]
    Validation(String),

    /// The poll does not exist.
    #[error("poll {0} not found")]
    NotFound(PollId),

    /// The chosen option is not one of the poll's labels.
    #[error("option `{option}` is not available on poll {poll_id}")]
    InvalidOption {
        /// The poll voted on.
        poll_id: PollId,
        /// The rejected option.
        option: String,
    },

    /// The user has already voted on this poll.
    #[error("user {user_id} has already voted for `{existing}` on poll {poll_id}")]
    DuplicateVote {
        /// The poll voted on.
        poll_id: PollId,
        /// The repeat voter.
        user_id: UserId,
        /// The option the user voted for earlier.
        existing: String,
    },

    /// The poll is closed and accepts no more votes.
    #[error("poll {0} has ended")]
    PollEnded(PollId),

    /// The caller is not the poll's creator.
    #[error("user {user_id} is not the creator of poll {poll_id}")]
    Unauthorized {
        /// The poll acted on.
        poll_id: PollId,
        /// The rejected caller.
        user_id: UserId,
    },

    /// The poll was already ended.
    #[error("poll {0} has already ended")]
    AlreadyEnded(PollId),

    /// The stored record could not be decoded.
    #[error("poll {poll_id} is corrupt: {source}")]
    Decode {
        /// The poll whose record is malformed.
        poll_id: PollId,
        /// Why decoding failed.
        source: DecodeError,
    },

    /// The backing store could not complete the operation.
    #[error("store unavailable: {0}")]
    StoreUnavailable(StoreError),

    /// Another writer changed the poll first. The operation had no effect
    /// and may be retried from scratch.
    #[error("poll {0} was modified concurrently")]
    Conflict(PollId),
}

impl VotingError {
    /// Whether re-running the whole operation could succeed.
    pub const fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }
}

impl From<RepositoryError> for VotingError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound(id) => Self::NotFound(id),
            RepositoryError::Decode { id, source } => Self::Decode {
                poll_id: id,
                source,
            },
            RepositoryError::Conflict { id, .. } | RepositoryError::AlreadyExists(id) => {
                Self::Conflict(id)
            }
            RepositoryError::StoreUnavailable(source) => Self::StoreUnavailable(source),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repository_errors_map_to_engine_kinds() {
        let id = PollId::new("p1");

        let err = VotingError::from(RepositoryError::NotFound(id.clone()));
        assert!(matches!(err, VotingError::NotFound(ref p) if *p == id));

        let err = VotingError::from(RepositoryError::Conflict {
            id: id.clone(),
            expected: 1,
            found: 2,
        });
        assert!(err.is_conflict());

        let err = VotingError::from(RepositoryError::Decode {
            id: id.clone(),
            source: DecodeError::EmptyId,
        });
        assert!(matches!(err, VotingError::Decode { .. }));

        let err = VotingError::from(RepositoryError::StoreUnavailable(
            StoreError::UnexpectedReply(7),
        ));
        assert!(matches!(err, VotingError::StoreUnavailable(_)));
        assert!(!err.is_conflict());
    }
}
