//! Poll lifecycle and vote-integrity rules.
//!
//! Every operation is a read-modify-write against the repository with no
//! in-process locking. The record version makes each write a
//! compare-and-swap: if another request wrote in between, the operation
//! fails with [`VotingError::Conflict`] and nothing it computed is visible.
//! The engine never retries; transports decide whether to re-run.
//!
//! # Lifecycle
//!
//! ```text
//! create_poll --> Open --end_poll (creator)--> Closed
//!                  |                              |
//!                  +-- vote (once per user)       +-- terminal
//! ```

use tally_store::PollRepository;
use tally_types::{Poll, PollId, PollSummary, UserId, Vote, now_whole_seconds};

use crate::error::VotingError;
use crate::validation;

/// Applies the voting rules on top of a [`PollRepository`].
///
/// Cloning is cheap; clones share the repository backend.
#[derive(Clone)]
pub struct VotingEngine {
    repo: PollRepository,
}

impl VotingEngine {
    /// Create an engine over the given repository.
    pub const fn new(repo: PollRepository) -> Self {
        Self { repo }
    }

    /// The repository this engine reads and writes.
    pub const fn repository(&self) -> &PollRepository {
        &self.repo
    }

    /// Create an open poll with an empty vote list per option.
    ///
    /// Title and options are trimmed. Fewer than two options, a blank
    /// option, or the same option twice is a [`VotingError::Validation`].
    pub async fn create_poll(
        &self,
        title: &str,
        description: &str,
        options: Vec<String>,
        creator_id: &UserId,
    ) -> Result<Poll, VotingError> {
        validation::user(creator_id, "creator id")?;
        let title = validation::title(title)?;
        let options = validation::options(options)?;

        let mut poll = Poll::open(
            PollId::generate(),
            title,
            description.trim().to_owned(),
            options,
            creator_id.clone(),
            now_whole_seconds(),
        );
        self.repo.create(&mut poll).await?;

        tracing::info!(
            poll_id = %poll.id,
            creator_id = %poll.creator_id,
            options = poll.options.len(),
            "Poll created"
        );
        Ok(poll)
    }

    /// Load a poll with its full vote history.
    pub async fn get_poll(&self, poll_id: &PollId) -> Result<Poll, VotingError> {
        Ok(self.repo.get(poll_id).await?)
    }

    /// Record `user_id`'s vote for `option`.
    ///
    /// Checks run in order: the poll exists, it is open, the option is one
    /// of its labels, and the user has not voted on any option yet. The
    /// option is matched exactly, falling back to its trimmed form.
    pub async fn vote(
        &self,
        poll_id: &PollId,
        user_id: &UserId,
        option: &str,
    ) -> Result<Vote, VotingError> {
        validation::user(user_id, "user id")?;

        let mut poll = self.repo.get(poll_id).await?;
        if !poll.active {
            tracing::debug!(poll_id = %poll_id, user_id = %user_id, "Vote on ended poll rejected");
            return Err(VotingError::PollEnded(poll_id.clone()));
        }
        let option = if poll.has_option(option) {
            option
        } else {
            option.trim()
        };
        if !poll.has_option(option) {
            tracing::debug!(poll_id = %poll_id, user_id = %user_id, option, "Vote for unknown option rejected");
            return Err(VotingError::InvalidOption {
                poll_id: poll_id.clone(),
                option: option.to_owned(),
            });
        }
        if let Some(existing) = poll.vote_of(user_id) {
            tracing::debug!(
                poll_id = %poll_id,
                user_id = %user_id,
                existing = %existing.option,
                "Repeat vote rejected"
            );
            return Err(VotingError::DuplicateVote {
                poll_id: poll_id.clone(),
                user_id: user_id.clone(),
                existing: existing.option.clone(),
            });
        }

        let vote = Vote {
            user_id: user_id.clone(),
            option: option.to_owned(),
            created_at: now_whole_seconds(),
        };
        poll.votes
            .entry(option.to_owned())
            .or_default()
            .push(vote.clone());
        self.repo.replace(&mut poll).await?;

        tracing::info!(poll_id = %poll_id, user_id = %user_id, option, "Vote recorded");
        Ok(vote)
    }

    /// Count the votes of a poll. Never writes.
    pub async fn results(&self, poll_id: &PollId) -> Result<PollSummary, VotingError> {
        let poll = self.repo.get(poll_id).await?;
        Ok(PollSummary::from_poll(&poll))
    }

    /// Close a poll. Only its creator may do this, and only once.
    pub async fn end_poll(
        &self,
        poll_id: &PollId,
        caller_id: &UserId,
    ) -> Result<Poll, VotingError> {
        let mut poll = self.repo.get(poll_id).await?;
        if !poll.is_creator(caller_id) {
            tracing::debug!(poll_id = %poll_id, user_id = %caller_id, "End by non-creator rejected");
            return Err(VotingError::Unauthorized {
                poll_id: poll_id.clone(),
                user_id: caller_id.clone(),
            });
        }
        if !poll.active {
            tracing::debug!(poll_id = %poll_id, "Poll already ended");
            return Err(VotingError::AlreadyEnded(poll_id.clone()));
        }

        poll.active = false;
        poll.ended_at = Some(now_whole_seconds());
        self.repo.replace(&mut poll).await?;

        tracing::info!(
            poll_id = %poll_id,
            total_votes = poll.total_votes(),
            "Poll ended"
        );
        Ok(poll)
    }

    /// Delete a poll, open or closed. Only its creator may do this.
    pub async fn delete_poll(&self, poll_id: &PollId, caller_id: &UserId) -> Result<(), VotingError> {
        let poll = self.repo.get(poll_id).await?;
        if !poll.is_creator(caller_id) {
            tracing::debug!(poll_id = %poll_id, user_id = %caller_id, "Delete by non-creator rejected");
            return Err(VotingError::Unauthorized {
                poll_id: poll_id.clone(),
                user_id: caller_id.clone(),
            });
        }

        self.repo.delete(poll_id).await?;
        tracing::info!(poll_id = %poll_id, "Poll deleted");
        Ok(())
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::indexing_slicing,
    clippy::arithmetic_side_effects
)]
mod tests {
    use futures::future::join_all;
    use tally_store::{MemoryStore, PollStore, RepositoryError, codec, poll_key};
    use tally_types::now_whole_seconds;

    use super::*;

    fn engine() -> VotingEngine {
        VotingEngine::new(PollRepository::new(PollStore::from(MemoryStore::new())))
    }

    fn engine_with_memory() -> (VotingEngine, MemoryStore) {
        let memory = MemoryStore::new();
        let repo = PollRepository::new(PollStore::from(memory.clone()));
        (VotingEngine::new(repo), memory)
    }

    fn user(id: &str) -> UserId {
        UserId::new(id)
    }

    fn ab() -> Vec<String> {
        vec!["A".to_owned(), "B".to_owned()]
    }

    async fn ab_poll(engine: &VotingEngine) -> Poll {
        engine
            .create_poll("Pick one", "", ab(), &user("creator"))
            .await
            .unwrap()
    }

    // -----------------------------------------------------------------------
    // create_poll
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn create_requires_two_options() {
        let engine = engine();
        let result = engine
            .create_poll("Pick one", "", vec!["A".to_owned()], &user("creator"))
            .await;
        assert!(matches!(result, Err(VotingError::Validation(_))));
    }

    #[tokio::test]
    async fn create_initializes_open_poll() {
        let engine = engine();
        let poll = ab_poll(&engine).await;

        assert!(!poll.id.is_empty());
        assert!(poll.active);
        assert!(poll.ended_at.is_none());
        assert_eq!(poll.votes.len(), 2);
        assert!(poll.votes["A"].is_empty());
        assert!(poll.votes["B"].is_empty());

        let stored = engine.get_poll(&poll.id).await.unwrap();
        assert_eq!(stored, poll);
    }

    #[tokio::test]
    async fn create_rejects_blank_title_and_creator() {
        let engine = engine();
        assert!(matches!(
            engine.create_poll("  ", "", ab(), &user("creator")).await,
            Err(VotingError::Validation(_))
        ));
        assert!(matches!(
            engine.create_poll("Pick one", "", ab(), &user("")).await,
            Err(VotingError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn create_rejects_duplicate_options() {
        let engine = engine();
        let options = vec!["A".to_owned(), "A ".to_owned(), "B".to_owned()];
        assert!(matches!(
            engine
                .create_poll("Pick one", "", options, &user("creator"))
                .await,
            Err(VotingError::Validation(_))
        ));
    }

    // -----------------------------------------------------------------------
    // vote / results
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn vote_is_counted_once_per_user() {
        let engine = engine();
        let poll = ab_poll(&engine).await;

        engine.vote(&poll.id, &user("u1"), "A").await.unwrap();
        let summary = engine.results(&poll.id).await.unwrap();
        assert_eq!(summary.count_for("A"), Some(1));
        assert_eq!(summary.count_for("B"), Some(0));
        assert_eq!(summary.total_votes, 1);

        let again = engine.vote(&poll.id, &user("u1"), "B").await;
        assert!(matches!(
            again,
            Err(VotingError::DuplicateVote { ref existing, .. }) if existing == "A"
        ));

        let unknown = engine.vote(&poll.id, &user("u2"), "C").await;
        assert!(matches!(unknown, Err(VotingError::InvalidOption { .. })));

        let summary = engine.results(&poll.id).await.unwrap();
        assert_eq!(summary.total_votes, 1);
    }

    #[tokio::test]
    async fn vote_matches_stored_labels_exactly_before_trimming() {
        let (engine, memory) = engine_with_memory();
        let poll = Poll::open(
            PollId::new("padded"),
            "Padded labels".to_owned(),
            String::new(),
            vec!["Yes ".to_owned(), "No".to_owned()],
            user("creator"),
            now_whole_seconds(),
        );
        memory
            .put_raw(&poll_key(&poll.id), poll.version, &codec::encode_json(&poll))
            .await;

        let vote = engine.vote(&poll.id, &user("u1"), "Yes ").await.unwrap();
        assert_eq!(vote.option, "Yes ");

        engine.vote(&poll.id, &user("u2"), "  No ").await.unwrap();

        let unknown = engine.vote(&poll.id, &user("u3"), "Yes").await;
        assert!(matches!(unknown, Err(VotingError::InvalidOption { .. })));

        let summary = engine.results(&poll.id).await.unwrap();
        assert_eq!(summary.count_for("Yes "), Some(1));
        assert_eq!(summary.count_for("No"), Some(1));
    }

    #[tokio::test]
    async fn corrupt_record_surfaces_as_decode_error() {
        let (engine, memory) = engine_with_memory();
        let id = PollId::new("corrupt");
        memory
            .put_raw(&poll_key(&id), 1, r#"{"id":"corrupt","options":["A"]}"#)
            .await;

        assert!(matches!(
            engine.get_poll(&id).await,
            Err(VotingError::Decode { .. })
        ));
        assert!(matches!(
            engine.vote(&id, &user("u1"), "A").await,
            Err(VotingError::Decode { .. })
        ));
        assert!(matches!(
            engine.results(&id).await,
            Err(VotingError::Decode { .. })
        ));
    }

    #[tokio::test]
    async fn vote_on_missing_poll_is_not_found() {
        let engine = engine();
        let result = engine.vote(&PollId::new("nope"), &user("u1"), "A").await;
        assert!(matches!(result, Err(VotingError::NotFound(_))));
    }

    #[tokio::test]
    async fn vote_requires_user() {
        let engine = engine();
        let poll = ab_poll(&engine).await;
        let result = engine.vote(&poll.id, &user(""), "A").await;
        assert!(matches!(result, Err(VotingError::Validation(_))));
    }

    #[tokio::test]
    async fn results_do_not_write() {
        let engine = engine();
        let poll = ab_poll(&engine).await;
        engine.results(&poll.id).await.unwrap();
        engine.results(&poll.id).await.unwrap();
        assert_eq!(engine.get_poll(&poll.id).await.unwrap().version, poll.version);
    }

    // -----------------------------------------------------------------------
    // end_poll / delete_poll
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn end_poll_is_creator_only_and_terminal() {
        let engine = engine();
        let poll = ab_poll(&engine).await;

        let other = engine.end_poll(&poll.id, &user("other")).await;
        assert!(matches!(other, Err(VotingError::Unauthorized { .. })));

        let ended = engine.end_poll(&poll.id, &user("creator")).await.unwrap();
        assert!(!ended.active);
        assert!(ended.ended_at.is_some());

        let again = engine.end_poll(&poll.id, &user("creator")).await;
        assert!(matches!(again, Err(VotingError::AlreadyEnded(_))));

        let late = engine.vote(&poll.id, &user("u3"), "A").await;
        assert!(matches!(late, Err(VotingError::PollEnded(_))));

        let summary = engine.results(&poll.id).await.unwrap();
        assert!(!summary.active);
        assert_eq!(summary.ended_at, ended.ended_at);
    }

    #[tokio::test]
    async fn delete_poll_is_creator_only() {
        let engine = engine();
        let poll = ab_poll(&engine).await;

        let other = engine.delete_poll(&poll.id, &user("other")).await;
        assert!(matches!(other, Err(VotingError::Unauthorized { .. })));

        engine.delete_poll(&poll.id, &user("creator")).await.unwrap();
        assert!(matches!(
            engine.get_poll(&poll.id).await,
            Err(VotingError::NotFound(_))
        ));
        assert!(matches!(
            engine.delete_poll(&poll.id, &user("creator")).await,
            Err(VotingError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn closed_poll_can_be_deleted() {
        let engine = engine();
        let poll = ab_poll(&engine).await;
        engine.end_poll(&poll.id, &user("creator")).await.unwrap();
        assert!(engine.delete_poll(&poll.id, &user("creator")).await.is_ok());
    }

    // -----------------------------------------------------------------------
    // Concurrency
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn stale_replace_is_a_conflict() {
        let engine = engine();
        let poll = ab_poll(&engine).await;

        let mut stale = engine.get_poll(&poll.id).await.unwrap();
        engine.vote(&poll.id, &user("u1"), "A").await.unwrap();

        stale.active = false;
        stale.ended_at = Some(stale.created_at);
        let result = engine.repository().replace(&mut stale).await;
        assert!(matches!(result, Err(RepositoryError::Conflict { .. })));
        assert!(VotingError::from(result.unwrap_err()).is_conflict());

        let current = engine.get_poll(&poll.id).await.unwrap();
        assert!(current.active);
        assert_eq!(current.vote_count("A"), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_votes_with_retry_are_all_counted() {
        const VOTERS: usize = 24;

        let engine = engine();
        let poll = ab_poll(&engine).await;

        let tasks = (0..VOTERS).map(|n| {
            let engine = engine.clone();
            let poll_id = poll.id.clone();
            tokio::spawn(async move {
                let voter = user(&format!("voter-{n}"));
                let option = if n % 2 == 0 { "A" } else { "B" };
                loop {
                    match engine.vote(&poll_id, &voter, option).await {
                        Err(e) if e.is_conflict() => tokio::task::yield_now().await,
                        other => return other,
                    }
                }
            })
        });

        for outcome in join_all(tasks).await {
            assert!(outcome.unwrap().is_ok());
        }

        let summary = engine.results(&poll.id).await.unwrap();
        assert_eq!(summary.total_votes, VOTERS as u64);
        assert_eq!(summary.count_for("A"), Some(12));
        assert_eq!(summary.count_for("B"), Some(12));
    }
}
