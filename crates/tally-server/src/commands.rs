//! Chat slash-command adapter.
//!
//! Accepts Mattermost-style outgoing command payloads (form fields
//! `user_id`, `channel_id`, `text`), parses `text` into a [`Command`], runs
//! it through the voting engine, and answers with a [`CommandReply`].
//!
//! ```text
//! /vote create <title> | <option> | <option> [| ...]
//! /vote vote <poll id> <option...>
//! /vote results <poll id>
//! /vote end <poll id>
//! /vote delete <poll id>
//! /vote help
//! ```
//!
//! The leading trigger word is optional. Successes are posted in-channel;
//! errors and usage text go only to the caller.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::FormRejection;
use axum::extract::{Form, State};
use serde::{Deserialize, Serialize};
use tally_engine::VotingError;
use tally_types::{PollId, PollSummary, UserId};

use crate::error::ApiError;
use crate::retry::retry_on_conflict;
use crate::state::AppState;

/// Trigger word stripped from the start of the command text.
const TRIGGER: &str = "/vote";

/// Usage text shown for `help` and malformed commands.
pub const USAGE: &str = "\
Usage:
/vote create <title> | <option> | <option> [| ...]
/vote vote <poll id> <option>
/vote results <poll id>
/vote end <poll id>
/vote delete <poll id>";

/// A parsed chat command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Create a poll.
    Create {
        /// Question text.
        title: String,
        /// Option labels, as typed.
        options: Vec<String>,
    },
    /// Vote on a poll.
    Vote {
        /// Target poll.
        poll_id: PollId,
        /// Chosen option (rest of the line).
        option: String,
    },
    /// Show a poll's counts.
    Results {
        /// Target poll.
        poll_id: PollId,
    },
    /// End a poll.
    End {
        /// Target poll.
        poll_id: PollId,
    },
    /// Delete a poll.
    Delete {
        /// Target poll.
        poll_id: PollId,
    },
    /// Show usage.
    Help,
}

/// Why command text could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    /// The verb is known but its arguments are wrong.
    #[error("usage: {0}")]
    Usage(&'static str),

    /// The verb is not recognized.
    #[error("unknown command `{0}`")]
    Unknown(String),
}

/// Parse command text.
pub fn parse(text: &str) -> Result<Command, CommandError> {
    let text = text.trim();
    let text = match text.split_once(char::is_whitespace) {
        Some((TRIGGER, rest)) => rest.trim_start(),
        _ if text == TRIGGER => "",
        _ => text,
    };
    if text.is_empty() {
        return Ok(Command::Help);
    }

    let (verb, rest) = text
        .split_once(char::is_whitespace)
        .map_or((text, ""), |(verb, rest)| (verb, rest.trim()));

    match verb.to_ascii_lowercase().as_str() {
        "help" => Ok(Command::Help),
        "create" => {
            let mut parts = rest.split('|').map(str::trim);
            let title = parts.next().unwrap_or_default();
            if title.is_empty() {
                return Err(CommandError::Usage("create <title> | <option> | <option>"));
            }
            Ok(Command::Create {
                title: title.to_owned(),
                options: parts.map(str::to_owned).collect(),
            })
        }
        "vote" => {
            let (id, option) = rest
                .split_once(char::is_whitespace)
                .map(|(id, option)| (id, option.trim()))
                .filter(|(_, option)| !option.is_empty())
                .ok_or(CommandError::Usage("vote <poll id> <option>"))?;
            Ok(Command::Vote {
                poll_id: PollId::from(id),
                option: option.to_owned(),
            })
        }
        "results" => single_id(rest, "results <poll id>").map(|poll_id| Command::Results { poll_id }),
        "end" => single_id(rest, "end <poll id>").map(|poll_id| Command::End { poll_id }),
        "delete" => single_id(rest, "delete <poll id>").map(|poll_id| Command::Delete { poll_id }),
        _ => Err(CommandError::Unknown(verb.to_owned())),
    }
}

fn single_id(rest: &str, usage: &'static str) -> Result<PollId, CommandError> {
    let mut words = rest.split_whitespace();
    match (words.next(), words.next()) {
        (Some(id), None) => Ok(PollId::from(id)),
        _ => Err(CommandError::Usage(usage)),
    }
}

// ---------------------------------------------------------------------------
// Replies
// ---------------------------------------------------------------------------

/// Where the chat platform should show a reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseType {
    /// Visible to everyone in the channel.
    InChannel,
    /// Visible only to the caller.
    Ephemeral,
}

/// Slash-command response body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandReply {
    /// Visibility of the reply.
    pub response_type: ResponseType,
    /// Message text (Markdown).
    pub text: String,
}

impl CommandReply {
    fn in_channel(text: impl Into<String>) -> Self {
        Self {
            response_type: ResponseType::InChannel,
            text: text.into(),
        }
    }

    fn ephemeral(text: impl Into<String>) -> Self {
        Self {
            response_type: ResponseType::Ephemeral,
            text: text.into(),
        }
    }
}

/// Render results as one line per option plus totals and status.
pub fn format_results(summary: &PollSummary) -> String {
    let status = if summary.active { "Open" } else { "Closed" };
    let lines: String = summary
        .tallies
        .iter()
        .map(|tally| format!("{}: {}\n", tally.option, tally.count))
        .collect();
    format!(
        "Results for \"{}\" (ID: {}):\n{lines}Total: {}\nStatus: {status}",
        summary.title, summary.id, summary.total_votes
    )
}

// ---------------------------------------------------------------------------
// Execution
// ---------------------------------------------------------------------------

/// Run a parsed command on behalf of `user`.
pub async fn execute(state: &AppState, user: &UserId, command: Command) -> CommandReply {
    let retries = state.conflict_retries;
    let engine = &state.engine;

    let outcome: Result<String, VotingError> = match command {
        Command::Help => return CommandReply::ephemeral(USAGE),
        Command::Create { title, options } => {
            retry_on_conflict(retries, "create_poll", || {
                engine.create_poll(&title, "", options.clone(), user)
            })
            .await
            .map(|poll| {
                format!(
                    "Poll created with ID: {}\n{}\nOptions: {}",
                    poll.id,
                    poll.title,
                    poll.options.join(", ")
                )
            })
        }
        Command::Vote { poll_id, option } => {
            retry_on_conflict(retries, "vote", || engine.vote(&poll_id, user, &option))
                .await
                .map(|vote| format!("Vote for \"{}\" recorded on poll {poll_id}", vote.option))
        }
        Command::Results { poll_id } => engine
            .results(&poll_id)
            .await
            .map(|summary| format_results(&summary)),
        Command::End { poll_id } => {
            retry_on_conflict(retries, "end_poll", || engine.end_poll(&poll_id, user))
                .await
                .map(|poll| {
                    format!(
                        "Poll {} has ended.\n{}",
                        poll.id,
                        format_results(&PollSummary::from_poll(&poll))
                    )
                })
        }
        Command::Delete { poll_id } => {
            retry_on_conflict(retries, "delete_poll", || engine.delete_poll(&poll_id, user))
                .await
                .map(|()| format!("Poll {poll_id} deleted."))
        }
    };

    match outcome {
        Ok(text) => CommandReply::in_channel(text),
        Err(err) => CommandReply::ephemeral(format!("Error: {err}")),
    }
}

/// Form payload of an outgoing slash command.
#[derive(Debug, Deserialize)]
pub struct CommandRequest {
    /// Invoking user.
    pub user_id: String,
    /// Channel the command was typed in.
    #[serde(default)]
    pub channel_id: String,
    /// Text after the trigger.
    #[serde(default)]
    pub text: String,
}

/// `POST /api/v1/commands` handler.
pub async fn handle_command(
    State(state): State<Arc<AppState>>,
    form: Result<Form<CommandRequest>, FormRejection>,
) -> Result<Json<CommandReply>, ApiError> {
    let Form(request) = form?;
    let user = UserId::from(request.user_id.trim());

    tracing::debug!(
        user_id = %user,
        channel_id = %request.channel_id,
        text = %request.text,
        "Chat command received"
    );

    let reply = match parse(&request.text) {
        Ok(command) => execute(&state, &user, command).await,
        Err(err) => CommandReply::ephemeral(format!("Error: {err}\n\n{USAGE}")),
    };
    Ok(Json(reply))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> PollId {
        PollId::new(s)
    }

    #[test]
    fn empty_and_bare_trigger_are_help() {
        assert_eq!(parse(""), Ok(Command::Help));
        assert_eq!(parse("   "), Ok(Command::Help));
        assert_eq!(parse("/vote"), Ok(Command::Help));
        assert_eq!(parse("/vote help"), Ok(Command::Help));
        assert_eq!(parse("HELP"), Ok(Command::Help));
    }

    #[test]
    fn create_splits_on_pipes() {
        assert_eq!(
            parse("/vote create Lunch today? | Pizza |  Tacos  "),
            Ok(Command::Create {
                title: "Lunch today?".to_owned(),
                options: vec!["Pizza".to_owned(), "Tacos".to_owned()],
            })
        );
        assert!(matches!(parse("create | A | B"), Err(CommandError::Usage(_))));
    }

    #[test]
    fn vote_takes_rest_of_line_as_option() {
        assert_eq!(
            parse("vote abc123 New York   "),
            Ok(Command::Vote {
                poll_id: id("abc123"),
                option: "New York".to_owned(),
            })
        );
        assert!(matches!(parse("vote abc123"), Err(CommandError::Usage(_))));
        assert!(matches!(parse("vote"), Err(CommandError::Usage(_))));
    }

    #[test]
    fn id_commands_need_exactly_one_id() {
        assert_eq!(parse("results p1"), Ok(Command::Results { poll_id: id("p1") }));
        assert_eq!(parse("/vote end p1"), Ok(Command::End { poll_id: id("p1") }));
        assert_eq!(parse("delete p1"), Ok(Command::Delete { poll_id: id("p1") }));
        assert!(matches!(parse("end"), Err(CommandError::Usage(_))));
        assert!(matches!(parse("delete p1 p2"), Err(CommandError::Usage(_))));
    }

    #[test]
    fn unknown_verb_is_reported() {
        assert_eq!(
            parse("close p1"),
            Err(CommandError::Unknown("close".to_owned()))
        );
    }

    #[test]
    fn results_render_one_line_per_option() {
        let poll = tally_types::Poll::open(
            id("p1"),
            "Lunch?".to_owned(),
            String::new(),
            vec!["Pizza".to_owned(), "Tacos".to_owned()],
            UserId::new("alice"),
            tally_types::now_whole_seconds(),
        );
        let text = format_results(&PollSummary::from_poll(&poll));
        assert_eq!(
            text,
            "Results for \"Lunch?\" (ID: p1):\nPizza: 0\nTacos: 0\nTotal: 0\nStatus: Open"
        );
    }

    #[tokio::test]
    async fn commands_drive_the_engine() {
        let state = AppState::in_memory(3);
        let alice = UserId::new("alice");
        let bob = UserId::new("bob");

        let created = execute(
            &state,
            &alice,
            Command::Create {
                title: "Lunch?".to_owned(),
                options: vec!["Pizza".to_owned(), "Tacos".to_owned()],
            },
        )
        .await;
        assert_eq!(created.response_type, ResponseType::InChannel);
        let poll_id = created
            .text
            .lines()
            .next()
            .and_then(|line| line.strip_prefix("Poll created with ID: "))
            .map(PollId::from);
        assert!(poll_id.is_some());
        let Some(poll_id) = poll_id else { return };

        let voted = execute(
            &state,
            &bob,
            Command::Vote {
                poll_id: poll_id.clone(),
                option: "Tacos".to_owned(),
            },
        )
        .await;
        assert_eq!(voted.response_type, ResponseType::InChannel);

        let again = execute(
            &state,
            &bob,
            Command::Vote {
                poll_id: poll_id.clone(),
                option: "Pizza".to_owned(),
            },
        )
        .await;
        assert_eq!(again.response_type, ResponseType::Ephemeral);
        assert!(again.text.starts_with("Error:"));

        let results = execute(
            &state,
            &bob,
            Command::Results {
                poll_id: poll_id.clone(),
            },
        )
        .await;
        assert!(results.text.contains("Tacos: 1"));
        assert!(results.text.contains("Pizza: 0"));
        assert!(results.text.ends_with("Status: Open"));

        let denied = execute(
            &state,
            &bob,
            Command::End {
                poll_id: poll_id.clone(),
            },
        )
        .await;
        assert_eq!(denied.response_type, ResponseType::Ephemeral);

        let ended = execute(
            &state,
            &alice,
            Command::End {
                poll_id: poll_id.clone(),
            },
        )
        .await;
        assert_eq!(ended.response_type, ResponseType::InChannel);
        assert!(ended.text.ends_with("Status: Closed"));

        let deleted = execute(&state, &alice, Command::Delete { poll_id }).await;
        assert_eq!(deleted.response_type, ResponseType::InChannel);
    }

    #[tokio::test]
    async fn help_is_ephemeral() {
        let state = AppState::in_memory(0);
        let reply = execute(&state, &UserId::new("u"), Command::Help).await;
        assert_eq!(reply.response_type, ResponseType::Ephemeral);
        assert_eq!(reply.text, USAGE);
    }
}
