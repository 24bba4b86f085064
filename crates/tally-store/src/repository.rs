//! Durable poll CRUD on top of a [`PollStore`].
//!
//! The repository owns key layout and the codec round trip. It enforces no
//! business rules: whether a vote or an end is legal is the engine's call.
//! The one guarantee it does add is that [`PollRepository::replace`] is a
//! compare-and-swap on the record version, so a write based on a stale read
//! fails with [`RepositoryError::Conflict`] instead of erasing the other
//! writer's change.

use tally_types::{Poll, PollId};

use crate::codec;
use crate::error::{RepositoryError, StoreError};
use crate::store::{PollStore, SwapOutcome};

/// Key prefix for poll records.
const KEY_PREFIX: &str = "poll:";

/// Store key for a poll.
pub fn poll_key(id: &PollId) -> String {
    format!("{KEY_PREFIX}{id}")
}

/// Poll persistence. Cloning is cheap and shares the backend.
#[derive(Clone)]
pub struct PollRepository {
    store: PollStore,
}

impl PollRepository {
    /// Create a repository over the given store.
    pub const fn new(store: PollStore) -> Self {
        Self { store }
    }

    /// Persist a new poll and return its id.
    ///
    /// An empty `poll.id` is replaced with a freshly generated one before
    /// writing. The record is stored at the poll's current version.
    pub async fn create(&self, poll: &mut Poll) -> Result<PollId, RepositoryError> {
        if poll.id.is_empty() {
            poll.id = PollId::generate();
        }
        let key = poll_key(&poll.id);
        let body = codec::encode_json(poll);

        let inserted = self
            .store
            .insert(&key, poll.version, &body)
            .await
            .inspect_err(|e| {
                tracing::error!(poll_id = %poll.id, error = %e, "Failed to create poll record");
            })?;
        if !inserted {
            return Err(RepositoryError::AlreadyExists(poll.id.clone()));
        }

        tracing::info!(
            poll_id = %poll.id,
            options = poll.options.len(),
            backend = self.store.backend_name(),
            "Poll record created"
        );
        Ok(poll.id.clone())
    }

    /// Load and decode a poll.
    pub async fn get(&self, id: &PollId) -> Result<Poll, RepositoryError> {
        let key = poll_key(id);
        let body = self
            .store
            .load(&key)
            .await
            .inspect_err(|e| {
                tracing::error!(poll_id = %id, error = %e, "Failed to load poll record");
            })?
            .ok_or_else(|| RepositoryError::NotFound(id.clone()))?;

        codec::decode_json(&body).map_err(|source| {
            tracing::error!(poll_id = %id, error = %source, "Stored poll record is malformed");
            RepositoryError::Decode {
                id: id.clone(),
                source,
            }
        })
    }

    /// Overwrite the stored record with `poll`, provided nobody else has
    /// written since `poll` was read.
    ///
    /// On success `poll.version` is advanced to the newly stored version.
    /// On failure `poll` is left untouched and the stored record is
    /// unchanged.
    pub async fn replace(&self, poll: &mut Poll) -> Result<(), RepositoryError> {
        let key = poll_key(&poll.id);
        let expected = poll.version;
        let next = expected.checked_add(1).ok_or_else(|| {
            tracing::error!(poll_id = %poll.id, version = expected, "Poll record version exhausted");
            StoreError::VersionExhausted(key.clone())
        })?;

        let mut record = codec::encode(poll);
        codec::set_version(&mut record, next);
        let body = serde_json::Value::Object(record).to_string();

        let outcome = self
            .store
            .swap(&key, expected, next, &body)
            .await
            .inspect_err(|e| {
                tracing::error!(poll_id = %poll.id, error = %e, "Failed to replace poll record");
            })?;

        match outcome {
            SwapOutcome::Swapped => {
                poll.version = next;
                tracing::info!(poll_id = %poll.id, version = next, "Poll record replaced");
                Ok(())
            }
            SwapOutcome::Missing => Err(RepositoryError::NotFound(poll.id.clone())),
            SwapOutcome::Stale { stored } => {
                tracing::debug!(
                    poll_id = %poll.id,
                    expected,
                    stored,
                    "Poll record changed since it was read"
                );
                Err(RepositoryError::Conflict {
                    id: poll.id.clone(),
                    expected,
                    found: stored,
                })
            }
        }
    }

    /// Remove a poll record. Deleting a missing poll is not an error.
    pub async fn delete(&self, id: &PollId) -> Result<(), RepositoryError> {
        let removed = self
            .store
            .remove(&poll_key(id))
            .await
            .inspect_err(|e| {
                tracing::error!(poll_id = %id, error = %e, "Failed to delete poll record");
            })?;
        tracing::info!(poll_id = %id, removed, "Poll record deleted");
        Ok(())
    }
}
