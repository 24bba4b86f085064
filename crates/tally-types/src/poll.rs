//! The poll aggregate and the votes embedded in it.
//!
//! A [`Poll`] owns its complete vote history. Votes are bucketed by option
//! label and kept in the order they were cast. The structs here carry no
//! business rules; the voting engine decides which mutations are legal and
//! the store codec checks the structural invariants on the way back in.

use std::collections::BTreeMap;

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::ids::{PollId, UserId};

/// Version assigned to a poll before its first write.
///
/// Every successful replace advances the stored version by one.
pub const INITIAL_VERSION: u64 = 1;

/// Minimum number of options a poll must offer.
pub const MIN_OPTIONS: usize = 2;

/// A single user's recorded choice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Vote {
    /// The user who cast the vote.
    pub user_id: UserId,
    /// The option label voted for.
    pub option: String,
    /// When the vote was cast (whole seconds).
    pub created_at: DateTime<Utc>,
}

/// Open/closed state of a poll, derived from [`Poll::active`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum PollStatus {
    /// Accepting votes.
    Open,
    /// Ended by its creator. Terminal.
    Closed,
}

/// One voting question with its options and cast votes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Poll {
    /// Opaque identifier, assigned at creation.
    pub id: PollId,
    /// Question text. Never empty.
    pub title: String,
    /// Free-form description, possibly empty.
    pub description: String,
    /// Distinct option labels in display order.
    pub options: Vec<String>,
    /// Votes per option label, oldest first. Keys are exactly `options`.
    pub votes: BTreeMap<String, Vec<Vote>>,
    /// The user who created the poll and may end or delete it.
    pub creator_id: UserId,
    /// Whether the poll still accepts votes.
    pub active: bool,
    /// Creation time (whole seconds).
    pub created_at: DateTime<Utc>,
    /// When the poll was ended. Set if and only if `active` is false.
    pub ended_at: Option<DateTime<Utc>>,
    /// Revision of the durable record this aggregate was read from.
    pub version: u64,
}

impl Poll {
    /// Build a fresh, open poll with an empty vote bucket per option.
    ///
    /// Performs no validation; callers are expected to have checked the
    /// title and options already.
    pub fn open(
        id: PollId,
        title: String,
        description: String,
        options: Vec<String>,
        creator_id: UserId,
        created_at: DateTime<Utc>,
    ) -> Self {
        let votes = options
            .iter()
            .map(|option| (option.clone(), Vec::new()))
            .collect();
        Self {
            id,
            title,
            description,
            options,
            votes,
            creator_id,
            active: true,
            created_at,
            ended_at: None,
            version: INITIAL_VERSION,
        }
    }

    /// Current lifecycle state.
    pub const fn status(&self) -> PollStatus {
        if self.active {
            PollStatus::Open
        } else {
            PollStatus::Closed
        }
    }

    /// Whether `option` is one of this poll's labels.
    pub fn has_option(&self, option: &str) -> bool {
        self.options.iter().any(|o| o == option)
    }

    /// Whether `user` is the poll's creator.
    pub fn is_creator(&self, user: &UserId) -> bool {
        self.creator_id == *user
    }

    /// The vote `user` has cast on any option, if any.
    pub fn vote_of(&self, user: &UserId) -> Option<&Vote> {
        self.votes
            .values()
            .flat_map(|bucket| bucket.iter())
            .find(|vote| vote.user_id == *user)
    }

    /// Whether `user` has already voted on this poll.
    pub fn has_voted(&self, user: &UserId) -> bool {
        self.vote_of(user).is_some()
    }

    /// Number of votes recorded for `option` (zero for unknown labels).
    pub fn vote_count(&self, option: &str) -> usize {
        self.votes.get(option).map_or(0, Vec::len)
    }

    /// Number of votes across all options.
    pub fn total_votes(&self) -> usize {
        self.votes
            .values()
            .fold(0_usize, |acc, bucket| acc.saturating_add(bucket.len()))
    }
}

/// The current time truncated to whole seconds.
///
/// Poll records store epoch seconds, so every timestamp the service
/// produces is truncated up front to keep stored and in-memory values equal.
pub fn now_whole_seconds() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Poll {
        let mut poll = Poll::open(
            PollId::new("p1"),
            "Lunch?".to_owned(),
            String::new(),
            vec!["Pizza".to_owned(), "Sushi".to_owned()],
            UserId::new("creator"),
            now_whole_seconds(),
        );
        if let Some(bucket) = poll.votes.get_mut("Pizza") {
            bucket.push(Vote {
                user_id: UserId::new("u1"),
                option: "Pizza".to_owned(),
                created_at: now_whole_seconds(),
            });
        }
        poll
    }

    #[test]
    fn open_poll_has_empty_bucket_per_option() {
        let poll = Poll::open(
            PollId::new("p"),
            "t".to_owned(),
            String::new(),
            vec!["A".to_owned(), "B".to_owned()],
            UserId::new("c"),
            now_whole_seconds(),
        );
        assert!(poll.active);
        assert_eq!(poll.status(), PollStatus::Open);
        assert_eq!(poll.ended_at, None);
        assert_eq!(poll.version, INITIAL_VERSION);
        assert_eq!(poll.votes.len(), 2);
        assert!(poll.votes.values().all(Vec::is_empty));
    }

    #[test]
    fn vote_lookup_spans_all_options() {
        let poll = sample();
        assert!(poll.has_voted(&UserId::new("u1")));
        assert!(!poll.has_voted(&UserId::new("u2")));
        assert_eq!(poll.vote_count("Pizza"), 1);
        assert_eq!(poll.vote_count("Sushi"), 0);
        assert_eq!(poll.vote_count("Tacos"), 0);
        assert_eq!(poll.total_votes(), 1);
    }

    #[test]
    fn creator_and_option_checks() {
        let poll = sample();
        assert!(poll.is_creator(&UserId::new("creator")));
        assert!(!poll.is_creator(&UserId::new("u1")));
        assert!(poll.has_option("Sushi"));
        assert!(!poll.has_option("sushi"));
    }

    #[test]
    fn now_has_no_subsecond_part() {
        assert_eq!(now_whole_seconds().timestamp_subsec_nanos(), 0);
    }
}
