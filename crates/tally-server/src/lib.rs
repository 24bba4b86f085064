//! HTTP API and chat command endpoint for the Tally polling service.
//!
//! This crate exposes the voting engine over two transports:
//!
//! - **REST endpoints** under `/api/v1` for creating, reading, voting on,
//!   ending, and deleting polls. The caller is identified by the
//!   `X-User-ID` header.
//! - **Slash-command endpoint** (`POST /api/v1/commands`) accepting
//!   Mattermost-style form payloads and answering with chat replies.
//!
//! Both transports re-run a mutation when it loses a write race, up to
//! `api.conflict_retries` times, so concurrent voters do not see spurious
//! failures.

pub mod commands;
pub mod config;
pub mod error;
pub mod handlers;
pub mod retry;
pub mod router;
pub mod server;
pub mod state;

// Re-export primary types for convenience.
pub use config::{ConfigError, TallyConfig};
pub use error::ApiError;
pub use router::build_router;
pub use server::{ServerError, start_server};
pub use state::AppState;
