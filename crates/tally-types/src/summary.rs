//! Aggregated, read-only view of a poll's results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::ids::PollId;
use crate::poll::Poll;

/// Vote count for a single option.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct OptionTally {
    /// The option label.
    pub option: String,
    /// Number of votes cast for it.
    pub count: u64,
}

/// Per-option counts plus the poll metadata a results view needs.
///
/// Tallies follow the poll's option order so renderers can print them
/// without re-sorting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct PollSummary {
    /// The summarized poll.
    pub id: PollId,
    /// Question text.
    pub title: String,
    /// Free-form description.
    pub description: String,
    /// Option labels in display order.
    pub options: Vec<String>,
    /// One entry per option, in option order.
    pub tallies: Vec<OptionTally>,
    /// Sum of all tallies.
    pub total_votes: u64,
    /// Whether the poll still accepts votes.
    pub active: bool,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// When the poll was ended, if it has been.
    pub ended_at: Option<DateTime<Utc>>,
}

impl PollSummary {
    /// Count the votes of `poll`.
    pub fn from_poll(poll: &Poll) -> Self {
        let tallies: Vec<OptionTally> = poll
            .options
            .iter()
            .map(|option| OptionTally {
                option: option.clone(),
                count: u64::try_from(poll.vote_count(option)).unwrap_or(u64::MAX),
            })
            .collect();
        let total_votes = tallies
            .iter()
            .fold(0_u64, |acc, tally| acc.saturating_add(tally.count));

        Self {
            id: poll.id.clone(),
            title: poll.title.clone(),
            description: poll.description.clone(),
            options: poll.options.clone(),
            tallies,
            total_votes,
            active: poll.active,
            created_at: poll.created_at,
            ended_at: poll.ended_at,
        }
    }

    /// Count for `option`, or `None` if the poll has no such option.
    pub fn count_for(&self, option: &str) -> Option<u64> {
        self.tallies
            .iter()
            .find(|tally| tally.option == option)
            .map(|tally| tally.count)
    }
}
