//! Axum router construction for the Tally API.
//!
//! Assembles all routes into a single [`Router`] with CORS and request
//! tracing middleware.

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post, put};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::commands;
use crate::handlers;
use crate::state::AppState;

/// Build the complete Axum router.
///
/// The router includes:
/// - `GET /api/v1/health` -- liveness probe
/// - `POST /api/v1/polls` -- create a poll
/// - `GET /api/v1/polls/{id}` -- full poll
/// - `DELETE /api/v1/polls/{id}` -- delete a poll
/// - `GET /api/v1/polls/{id}/results` -- per-option counts
/// - `POST /api/v1/polls/{id}/vote` -- cast a vote
/// - `PUT /api/v1/polls/{id}/end` -- end a poll
/// - `POST /api/v1/commands` -- chat slash-command endpoint
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/v1/health", get(handlers::health))
        // Polls
        .route("/api/v1/polls", post(handlers::create_poll))
        .route(
            "/api/v1/polls/{id}",
            get(handlers::get_poll).delete(handlers::delete_poll),
        )
        .route("/api/v1/polls/{id}/results", get(handlers::get_results))
        .route("/api/v1/polls/{id}/vote", post(handlers::vote))
        .route("/api/v1/polls/{id}/end", put(handlers::end_poll))
        // Chat integration
        .route("/api/v1/commands", post(commands::handle_command))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
