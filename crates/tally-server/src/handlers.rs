//! REST API endpoint handlers.
//!
//! Every handler goes through the shared [`VotingEngine`](tally_engine::VotingEngine)
//! in [`AppState`]. Mutations are re-run on write conflicts up to the
//! configured retry budget.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET` | `/api/v1/health` | Liveness probe |
//! | `POST` | `/api/v1/polls` | Create a poll (`X-User-ID` = creator) |
//! | `GET` | `/api/v1/polls/{id}` | Full poll with votes |
//! | `GET` | `/api/v1/polls/{id}/results` | Per-option counts |
//! | `POST` | `/api/v1/polls/{id}/vote` | Cast a vote |
//! | `PUT` | `/api/v1/polls/{id}/end` | End a poll (creator only) |
//! | `DELETE` | `/api/v1/polls/{id}` | Delete a poll (creator only) |

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use serde::{Deserialize, Serialize};
use tally_types::{Poll, PollId, PollSummary, UserId, Vote};

use crate::error::ApiError;
use crate::retry::retry_on_conflict;
use crate::state::AppState;

/// Header carrying the caller's user id.
pub const USER_ID_HEADER: &str = "x-user-id";

// ---------------------------------------------------------------------------
// Envelope and request bodies
// ---------------------------------------------------------------------------

/// Success envelope shared by all poll endpoints.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    /// Always `true` for this type; errors use [`ApiError`].
    pub success: bool,
    /// Human-readable outcome.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Operation payload.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    /// A payload with no message.
    pub const fn data(data: T) -> Self {
        Self {
            success: true,
            message: None,
            data: Some(data),
        }
    }

    /// A payload with a message.
    pub fn with_message(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            data: Some(data),
        }
    }
}

impl ApiResponse<()> {
    /// A message with no payload.
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            data: None,
        }
    }
}

/// Body of `POST /api/v1/polls`.
#[derive(Debug, Deserialize)]
pub struct CreatePollRequest {
    /// Question text.
    pub title: String,
    /// Optional description.
    #[serde(default)]
    pub description: String,
    /// Option labels.
    pub options: Vec<String>,
}

/// Body of `POST /api/v1/polls/{id}/vote`.
#[derive(Debug, Deserialize)]
pub struct VoteRequest {
    /// Chosen option label.
    pub option: String,
    /// Voter id. Falls back to the `X-User-ID` header when absent.
    #[serde(default)]
    pub user_id: Option<String>,
}

/// Read the caller id from `X-User-ID`.
fn caller_id(headers: &HeaderMap) -> Result<UserId, ApiError> {
    headers
        .get(USER_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(UserId::from)
        .ok_or(ApiError::MissingUser)
}

// ---------------------------------------------------------------------------
// GET /api/v1/health
// ---------------------------------------------------------------------------

/// Liveness probe.
pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

// ---------------------------------------------------------------------------
// Polls
// ---------------------------------------------------------------------------

/// Create a poll owned by the `X-User-ID` caller.
pub async fn create_poll(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Result<Json<CreatePollRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ApiResponse<Poll>>), ApiError> {
    let creator = caller_id(&headers)?;
    let Json(request) = body?;

    let poll = retry_on_conflict(state.conflict_retries, "create_poll", || {
        state.engine.create_poll(
            &request.title,
            &request.description,
            request.options.clone(),
            &creator,
        )
    })
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::with_message("Poll created", poll)),
    ))
}

/// Fetch a poll with its full vote history.
pub async fn get_poll(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<Poll>>, ApiError> {
    let poll = state.engine.get_poll(&PollId::from(id)).await?;
    Ok(Json(ApiResponse::data(poll)))
}

/// Per-option vote counts.
pub async fn get_results(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<PollSummary>>, ApiError> {
    let summary = state.engine.results(&PollId::from(id)).await?;
    Ok(Json(ApiResponse::data(summary)))
}

/// Cast a vote. The voter is `user_id` from the body, else `X-User-ID`.
pub async fn vote(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    headers: HeaderMap,
    body: Result<Json<VoteRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<Vote>>, ApiError> {
    let Json(request) = body?;
    let voter = match request.user_id.as_deref().map(str::trim) {
        Some(user) if !user.is_empty() => UserId::from(user),
        _ => caller_id(&headers)?,
    };
    let poll_id = PollId::from(id);

    let vote = retry_on_conflict(state.conflict_retries, "vote", || {
        state.engine.vote(&poll_id, &voter, &request.option)
    })
    .await?;

    Ok(Json(ApiResponse::with_message("Vote recorded", vote)))
}

/// End a poll. Caller must be its creator.
pub async fn end_poll(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<ApiResponse<Poll>>, ApiError> {
    let caller = caller_id(&headers)?;
    let poll_id = PollId::from(id);

    let poll = retry_on_conflict(state.conflict_retries, "end_poll", || {
        state.engine.end_poll(&poll_id, &caller)
    })
    .await?;

    Ok(Json(ApiResponse::with_message("Poll ended", poll)))
}

/// Delete a poll. Caller must be its creator.
pub async fn delete_poll(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    let caller = caller_id(&headers)?;
    let poll_id = PollId::from(id);

    retry_on_conflict(state.conflict_retries, "delete_poll", || {
        state.engine.delete_poll(&poll_id, &caller)
    })
    .await?;

    Ok(Json(ApiResponse::message("Poll deleted")))
}
