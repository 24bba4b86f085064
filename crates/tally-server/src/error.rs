//! Error types for the HTTP layer.
//!
//! [`ApiError`] wraps engine errors and request-shape problems, and
//! converts into an Axum response via its
//! [`IntoResponse`](axum::response::IntoResponse) implementation. Error
//! bodies use the same envelope as successful responses:
//! `{"success": false, "message": ..., "status": ...}`.

use axum::extract::rejection::{FormRejection, JsonRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tally_engine::VotingError;

/// Errors that can occur while handling an API request.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The engine rejected or failed the operation.
    #[error(transparent)]
    Voting(#[from] VotingError),

    /// The request body could not be parsed.
    #[error("invalid request body: {0}")]
    BadRequest(String),

    /// A required caller identity header is absent or blank.
    #[error("missing or empty X-User-ID header")]
    MissingUser,
}

impl ApiError {
    /// HTTP status for this error.
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) | Self::MissingUser => StatusCode::BAD_REQUEST,
            Self::Voting(err) => match err {
                VotingError::Validation(_) | VotingError::InvalidOption { .. } => {
                    StatusCode::BAD_REQUEST
                }
                VotingError::Unauthorized { .. } => StatusCode::FORBIDDEN,
                VotingError::NotFound(_) => StatusCode::NOT_FOUND,
                VotingError::DuplicateVote { .. }
                | VotingError::PollEnded(_)
                | VotingError::AlreadyEnded(_)
                | VotingError::Conflict(_) => StatusCode::CONFLICT,
                VotingError::Decode { .. } => StatusCode::INTERNAL_SERVER_ERROR,
                VotingError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            },
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<FormRejection> for ApiError {
    fn from(rejection: FormRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), error = %self, "Request failed");
        } else {
            tracing::debug!(status = status.as_u16(), error = %self, "Request rejected");
        }

        let body = serde_json::json!({
            "success": false,
            "message": self.to_string(),
            "status": status.as_u16(),
        });

        (status, axum::Json(body)).into_response()
    }
}
