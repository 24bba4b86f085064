//! Two-way mapping between [`Poll`] and the store's flat record format.
//!
//! The keyed store is schemaless: a poll is held as a JSON object whose
//! values are primitives, lists, and nested maps. Decoding is strict. Any
//! missing field, wrong shape, or structural invariant violation rejects
//! the whole record, including a single malformed vote entry.
//!
//! # Record Layout
//!
//! | Field | Shape | Notes |
//! |-------|-------|-------|
//! | `id` | string | non-empty |
//! | `title` | string | |
//! | `description` | string | |
//! | `options` | list of string | at least 2, distinct, non-empty |
//! | `votes` | map option -> list of `[user_id, option, created_at]` | keys are exactly `options` |
//! | `creator_id` | string | |
//! | `active` | bool | |
//! | `created_at` | int | epoch seconds |
//! | `ended_at` | int | epoch seconds, present iff `active` is false |
//! | `version` | int | non-negative |

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use tally_types::{MIN_OPTIONS, Poll, PollId, UserId, Vote};

/// A poll as the keyed store holds it.
pub type Record = Map<String, Value>;

/// Record field names.
pub mod field {
    /// Poll identifier.
    pub const ID: &str = "id";
    /// Question text.
    pub const TITLE: &str = "title";
    /// Free-form description.
    pub const DESCRIPTION: &str = "description";
    /// Ordered option labels.
    pub const OPTIONS: &str = "options";
    /// Votes keyed by option label.
    pub const VOTES: &str = "votes";
    /// Creating user.
    pub const CREATOR_ID: &str = "creator_id";
    /// Open/closed flag.
    pub const ACTIVE: &str = "active";
    /// Creation time, epoch seconds.
    pub const CREATED_AT: &str = "created_at";
    /// End time, epoch seconds. Omitted while the poll is open.
    pub const ENDED_AT: &str = "ended_at";
    /// Record revision.
    pub const VERSION: &str = "version";
}

/// Reasons a stored record cannot be turned back into a [`Poll`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// The stored body is not a JSON object.
    #[error("record is not a JSON object: {0}")]
    NotAnObject(String),

    /// A required field is absent.
    #[error("missing field `{0}`")]
    MissingField(&'static str),

    /// A field is present with the wrong shape.
    #[error("field `{field}` must be {expected}")]
    WrongType {
        /// The offending field.
        field: &'static str,
        /// Human-readable description of the expected shape.
        expected: &'static str,
    },

    /// The poll identifier is empty.
    #[error("field `id` must not be empty")]
    EmptyId,

    /// Options are too few, empty, or repeated.
    #[error("options must be at least 2 distinct, non-empty labels")]
    InvalidOptions,

    /// An option has no vote list.
    #[error("option `{0}` has no vote list")]
    MissingOptionVotes(String),

    /// The votes map has a key that is not an option.
    #[error("votes reference unknown option `{0}`")]
    UnknownOption(String),

    /// A vote entry is not a well-formed `[user_id, option, created_at]` tuple.
    #[error("malformed vote #{index} under option `{option}`: {reason}")]
    MalformedVote {
        /// Option bucket holding the entry.
        option: String,
        /// Position of the entry in its bucket.
        index: usize,
        /// What is wrong with it.
        reason: &'static str,
    },

    /// A vote is filed under a different option than the one it names.
    #[error("vote for `{named}` is filed under `{bucket}`")]
    MisfiledVote {
        /// Option bucket holding the entry.
        bucket: String,
        /// Option named inside the entry.
        named: String,
    },

    /// The same user appears more than once across the poll.
    #[error("user `{0}` has more than one vote")]
    DuplicateVoter(String),

    /// `ended_at` presence disagrees with `active`.
    #[error("`ended_at` must be set exactly when the poll is inactive")]
    EndedAtMismatch,

    /// An epoch-seconds value cannot be represented as a timestamp.
    #[error("timestamp {0} is out of range")]
    TimestampOutOfRange(i64),
}

// =========================================================================
// Encode
// =========================================================================

/// Encode a poll into its store record.
///
/// Never fails. `ended_at` is omitted while the poll is open.
pub fn encode(poll: &Poll) -> Record {
    let mut record = Record::new();
    record.insert(field::ID.to_owned(), Value::from(poll.id.as_str()));
    record.insert(field::TITLE.to_owned(), Value::from(poll.title.as_str()));
    record.insert(
        field::DESCRIPTION.to_owned(),
        Value::from(poll.description.as_str()),
    );
    record.insert(
        field::OPTIONS.to_owned(),
        Value::Array(poll.options.iter().map(|o| Value::from(o.as_str())).collect()),
    );

    let votes: Map<String, Value> = poll
        .votes
        .iter()
        .map(|(option, bucket)| {
            (
                option.clone(),
                Value::Array(bucket.iter().map(encode_vote).collect()),
            )
        })
        .collect();
    record.insert(field::VOTES.to_owned(), Value::Object(votes));

    record.insert(
        field::CREATOR_ID.to_owned(),
        Value::from(poll.creator_id.as_str()),
    );
    record.insert(field::ACTIVE.to_owned(), Value::Bool(poll.active));
    record.insert(
        field::CREATED_AT.to_owned(),
        Value::from(poll.created_at.timestamp()),
    );
    if let Some(ended_at) = poll.ended_at {
        record.insert(field::ENDED_AT.to_owned(), Value::from(ended_at.timestamp()));
    }
    record.insert(field::VERSION.to_owned(), Value::from(poll.version));
    record
}

fn encode_vote(vote: &Vote) -> Value {
    Value::Array(vec![
        Value::from(vote.user_id.as_str()),
        Value::from(vote.option.as_str()),
        Value::from(vote.created_at.timestamp()),
    ])
}

/// Overwrite the `version` field of an encoded record.
pub fn set_version(record: &mut Record, version: u64) {
    record.insert(field::VERSION.to_owned(), Value::from(version));
}

/// Encode a poll straight to the JSON text the store persists.
pub fn encode_json(poll: &Poll) -> String {
    Value::Object(encode(poll)).to_string()
}

// =========================================================================
// Decode
// =========================================================================

/// Decode a store record into a poll, validating shape and invariants.
pub fn decode(record: &Record) -> Result<Poll, DecodeError> {
    let id = PollId::new(string_field(record, field::ID)?);
    if id.is_empty() {
        return Err(DecodeError::EmptyId);
    }

    let options = decode_options(record)?;
    let votes = decode_votes(record, &options)?;

    let active = record
        .get(field::ACTIVE)
        .ok_or(DecodeError::MissingField(field::ACTIVE))?
        .as_bool()
        .ok_or(DecodeError::WrongType {
            field: field::ACTIVE,
            expected: "a boolean",
        })?;

    let created_at = timestamp_field(record, field::CREATED_AT)?;
    let ended_at = match record.get(field::ENDED_AT) {
        None | Some(Value::Null) => None,
        Some(_) => Some(timestamp_field(record, field::ENDED_AT)?),
    };
    if active == ended_at.is_some() {
        return Err(DecodeError::EndedAtMismatch);
    }

    let version = record
        .get(field::VERSION)
        .ok_or(DecodeError::MissingField(field::VERSION))?
        .as_u64()
        .ok_or(DecodeError::WrongType {
            field: field::VERSION,
            expected: "a non-negative integer",
        })?;

    Ok(Poll {
        id,
        title: string_field(record, field::TITLE)?.to_owned(),
        description: string_field(record, field::DESCRIPTION)?.to_owned(),
        options,
        votes,
        creator_id: UserId::new(string_field(record, field::CREATOR_ID)?),
        active,
        created_at,
        ended_at,
        version,
    })
}

/// Parse the JSON text held by the store and decode it.
pub fn decode_json(body: &str) -> Result<Poll, DecodeError> {
    match serde_json::from_str::<Value>(body) {
        Ok(Value::Object(record)) => decode(&record),
        Ok(other) => Err(DecodeError::NotAnObject(format!("found {}", kind_of(&other)))),
        Err(e) => Err(DecodeError::NotAnObject(e.to_string())),
    }
}

fn decode_options(record: &Record) -> Result<Vec<String>, DecodeError> {
    const EXPECTED: DecodeError = DecodeError::WrongType {
        field: field::OPTIONS,
        expected: "a list of strings",
    };

    let raw = record
        .get(field::OPTIONS)
        .ok_or(DecodeError::MissingField(field::OPTIONS))?
        .as_array()
        .ok_or(EXPECTED)?;

    let mut options = Vec::with_capacity(raw.len());
    let mut seen = BTreeSet::new();
    for value in raw {
        let label = value.as_str().ok_or(EXPECTED)?;
        if label.is_empty() || !seen.insert(label) {
            return Err(DecodeError::InvalidOptions);
        }
        options.push(label.to_owned());
    }
    if options.len() < MIN_OPTIONS {
        return Err(DecodeError::InvalidOptions);
    }
    Ok(options)
}

fn decode_votes(
    record: &Record,
    options: &[String],
) -> Result<BTreeMap<String, Vec<Vote>>, DecodeError> {
    let raw = record
        .get(field::VOTES)
        .ok_or(DecodeError::MissingField(field::VOTES))?
        .as_object()
        .ok_or(DecodeError::WrongType {
            field: field::VOTES,
            expected: "a map of option to vote list",
        })?;

    if let Some(unknown) = raw.keys().find(|key| !options.contains(*key)) {
        return Err(DecodeError::UnknownOption(unknown.clone()));
    }

    let mut voters = BTreeSet::new();
    let mut votes = BTreeMap::new();
    for option in options {
        let entries = raw
            .get(option)
            .ok_or_else(|| DecodeError::MissingOptionVotes(option.clone()))?
            .as_array()
            .ok_or(DecodeError::WrongType {
                field: field::VOTES,
                expected: "a map of option to vote list",
            })?;

        let mut bucket = Vec::with_capacity(entries.len());
        for (index, entry) in entries.iter().enumerate() {
            let vote = decode_vote(option, index, entry)?;
            if !voters.insert(vote.user_id.clone()) {
                return Err(DecodeError::DuplicateVoter(vote.user_id.into_inner()));
            }
            bucket.push(vote);
        }
        votes.insert(option.clone(), bucket);
    }
    Ok(votes)
}

fn decode_vote(bucket: &str, index: usize, entry: &Value) -> Result<Vote, DecodeError> {
    let malformed = |reason: &'static str| DecodeError::MalformedVote {
        option: bucket.to_owned(),
        index,
        reason,
    };

    let tuple = entry.as_array().ok_or_else(|| malformed("not a tuple"))?;
    let [user, option, created_at] = tuple.as_slice() else {
        return Err(malformed("expected 3 fields"));
    };

    let user = user.as_str().ok_or_else(|| malformed("user_id is not a string"))?;
    if user.is_empty() {
        return Err(malformed("user_id is empty"));
    }
    let option = option
        .as_str()
        .ok_or_else(|| malformed("option is not a string"))?;
    if option != bucket {
        return Err(DecodeError::MisfiledVote {
            bucket: bucket.to_owned(),
            named: option.to_owned(),
        });
    }
    let secs = created_at
        .as_i64()
        .ok_or_else(|| malformed("created_at is not an integer"))?;

    Ok(Vote {
        user_id: UserId::new(user),
        option: option.to_owned(),
        created_at: from_epoch(secs)?,
    })
}

fn string_field<'a>(record: &'a Record, name: &'static str) -> Result<&'a str, DecodeError> {
    record
        .get(name)
        .ok_or(DecodeError::MissingField(name))?
        .as_str()
        .ok_or(DecodeError::WrongType {
            field: name,
            expected: "a string",
        })
}

fn timestamp_field(record: &Record, name: &'static str) -> Result<DateTime<Utc>, DecodeError> {
    let secs = record
        .get(name)
        .ok_or(DecodeError::MissingField(name))?
        .as_i64()
        .ok_or(DecodeError::WrongType {
            field: name,
            expected: "an integer epoch-seconds timestamp",
        })?;
    from_epoch(secs)
}

fn from_epoch(secs: i64) -> Result<DateTime<Utc>, DecodeError> {
    DateTime::from_timestamp(secs, 0).ok_or(DecodeError::TimestampOutOfRange(secs))
}

const fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "a map",
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use tally_types::now_whole_seconds;

    use super::*;

    fn open_poll() -> Poll {
        Poll::open(
            PollId::new("poll-1"),
            "Release day?".to_owned(),
            "Pick one".to_owned(),
            vec!["Monday".to_owned(), "Friday".to_owned()],
            UserId::new("creator"),
            now_whole_seconds(),
        )
    }

    fn cast(poll: &mut Poll, user: &str, option: &str) {
        if let Some(bucket) = poll.votes.get_mut(option) {
            bucket.push(Vote {
                user_id: UserId::new(user),
                option: option.to_owned(),
                created_at: now_whole_seconds(),
            });
        }
    }

    fn as_record(value: Value) -> Record {
        match value {
            Value::Object(map) => map,
            _ => Record::new(),
        }
    }

    #[test]
    fn roundtrip_with_no_votes() {
        let poll = open_poll();
        assert_eq!(decode(&encode(&poll)), Ok(poll));
    }

    #[test]
    fn roundtrip_ended_poll_with_votes() {
        let mut poll = open_poll();
        cast(&mut poll, "u1", "Monday");
        cast(&mut poll, "u2", "Friday");
        cast(&mut poll, "u3", "Monday");
        poll.active = false;
        poll.ended_at = Some(now_whole_seconds());
        poll.version = 7;

        let record = encode(&poll);
        assert!(record.contains_key(field::ENDED_AT));
        assert_eq!(decode(&record), Ok(poll.clone()));
        assert_eq!(decode_json(&encode_json(&poll)), Ok(poll));
    }

    #[test]
    fn open_poll_omits_ended_at() {
        let record = encode(&open_poll());
        assert!(!record.contains_key(field::ENDED_AT));
    }

    #[test]
    #[allow(clippy::indexing_slicing)]
    fn votes_encode_as_three_field_tuples() {
        let mut poll = open_poll();
        cast(&mut poll, "u1", "Friday");
        let record = encode(&poll);
        let entry = &record[field::VOTES]["Friday"][0];
        assert_eq!(entry[0], json!("u1"));
        assert_eq!(entry[1], json!("Friday"));
        assert!(entry[2].is_i64());
    }

    #[test]
    fn set_version_overwrites() {
        let mut record = encode(&open_poll());
        set_version(&mut record, 42);
        assert_eq!(decode(&record).map(|p| p.version), Ok(42));
    }

    #[test]
    fn missing_field_is_rejected() {
        let mut record = encode(&open_poll());
        record.remove(field::CREATOR_ID);
        assert_eq!(
            decode(&record),
            Err(DecodeError::MissingField(field::CREATOR_ID))
        );
    }

    #[test]
    fn options_must_be_strings() {
        let mut record = encode(&open_poll());
        record.insert(field::OPTIONS.to_owned(), json!(["Monday", 5]));
        assert!(matches!(
            decode(&record),
            Err(DecodeError::WrongType {
                field: field::OPTIONS,
                ..
            })
        ));
    }

    #[test]
    fn duplicate_or_single_options_are_rejected() {
        let mut record = encode(&open_poll());
        record.insert(field::OPTIONS.to_owned(), json!(["Monday", "Monday"]));
        assert_eq!(decode(&record), Err(DecodeError::InvalidOptions));

        record.insert(field::OPTIONS.to_owned(), json!(["Monday"]));
        assert_eq!(decode(&record), Err(DecodeError::InvalidOptions));
    }

    #[test]
    fn votes_for_unknown_option_are_rejected() {
        let mut record = encode(&open_poll());
        record.insert(
            field::VOTES.to_owned(),
            json!({"Monday": [], "Friday": [], "Sunday": []}),
        );
        assert_eq!(
            decode(&record),
            Err(DecodeError::UnknownOption("Sunday".to_owned()))
        );
    }

    #[test]
    fn every_option_needs_a_vote_list() {
        let mut record = encode(&open_poll());
        record.insert(field::VOTES.to_owned(), json!({"Monday": []}));
        assert_eq!(
            decode(&record),
            Err(DecodeError::MissingOptionVotes("Friday".to_owned()))
        );
    }

    #[test]
    fn one_malformed_vote_fails_the_whole_record() {
        let mut record = encode(&open_poll());
        record.insert(
            field::VOTES.to_owned(),
            json!({
                "Monday": [["u1", "Monday", 1_700_000_000_i64], ["u2", "Monday"]],
                "Friday": [],
            }),
        );
        assert_eq!(
            decode(&record),
            Err(DecodeError::MalformedVote {
                option: "Monday".to_owned(),
                index: 1,
                reason: "expected 3 fields",
            })
        );
    }

    #[test]
    fn misfiled_vote_is_rejected() {
        let mut record = encode(&open_poll());
        record.insert(
            field::VOTES.to_owned(),
            json!({"Monday": [["u1", "Friday", 1_700_000_000_i64]], "Friday": []}),
        );
        assert!(matches!(
            decode(&record),
            Err(DecodeError::MisfiledVote { .. })
        ));
    }

    #[test]
    fn user_voting_twice_is_rejected() {
        let mut record = encode(&open_poll());
        record.insert(
            field::VOTES.to_owned(),
            json!({
                "Monday": [["u1", "Monday", 1_700_000_000_i64]],
                "Friday": [["u1", "Friday", 1_700_000_001_i64]],
            }),
        );
        assert_eq!(
            decode(&record),
            Err(DecodeError::DuplicateVoter("u1".to_owned()))
        );
    }

    #[test]
    fn ended_at_must_match_active_flag() {
        let mut record = encode(&open_poll());
        record.insert(field::ENDED_AT.to_owned(), json!(1_700_000_000_i64));
        assert_eq!(decode(&record), Err(DecodeError::EndedAtMismatch));

        let mut record = encode(&open_poll());
        record.insert(field::ACTIVE.to_owned(), json!(false));
        assert_eq!(decode(&record), Err(DecodeError::EndedAtMismatch));
    }

    #[test]
    fn negative_version_is_rejected() {
        let mut record = encode(&open_poll());
        record.insert(field::VERSION.to_owned(), json!(-1));
        assert!(matches!(
            decode(&record),
            Err(DecodeError::WrongType {
                field: field::VERSION,
                ..
            })
        ));
    }

    #[test]
    fn non_object_body_is_rejected() {
        assert!(matches!(
            decode_json("[1, 2, 3]"),
            Err(DecodeError::NotAnObject(_))
        ));
        assert!(matches!(
            decode_json("not json"),
            Err(DecodeError::NotAnObject(_))
        ));
    }

    #[test]
    fn hand_written_record_decodes() {
        let record = as_record(json!({
            "id": "legacy",
            "title": "Tea or coffee",
            "description": "",
            "options": ["tea", "coffee"],
            "votes": {"tea": [["ann", "tea", 1_700_000_000_i64]], "coffee": []},
            "creator_id": "ann",
            "active": false,
            "created_at": 1_699_999_000_i64,
            "ended_at": 1_700_000_500_i64,
            "version": 3,
        }));
        let poll = decode(&record);
        assert!(poll.is_ok());
        if let Ok(poll) = poll {
            assert_eq!(poll.id, PollId::new("legacy"));
            assert_eq!(poll.vote_count("tea"), 1);
            assert!(!poll.active);
            assert_eq!(poll.ended_at.map(|t| t.timestamp()), Some(1_700_000_500));
            assert_eq!(poll.version, 3);
        }
    }
}
