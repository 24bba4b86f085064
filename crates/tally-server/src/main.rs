//! Tally server binary.
//!
//! Loads configuration, connects the configured poll store, and serves the
//! HTTP API until `Ctrl-C` or `SIGTERM`.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `tally.yaml` (or `TALLY_CONFIG`) plus env
//! 2. Initialize structured logging (tracing)
//! 3. Connect the poll store backend
//! 4. Build the voting engine and shared state
//! 5. Serve the Axum router with graceful shutdown

use std::sync::Arc;

use tally_engine::VotingEngine;
use tally_server::config::{LoggingConfig, StoreBackend, StoreConfig, TallyConfig};
use tally_server::{AppState, start_server};
use tally_store::{DragonflyStore, MemoryStore, PollRepository, PollStore, StoreError};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Application entry point.
///
/// # Errors
///
/// Returns an error if configuration, store connection, or the server fails.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Load configuration.
    let config = TallyConfig::load()?;

    // 2. Initialize structured logging.
    init_logging(&config.logging);
    info!(
        bind_addr = %config.server.bind_addr(),
        store = ?config.store.backend,
        conflict_retries = config.api.conflict_retries,
        "Configuration loaded"
    );

    // 3. Connect the poll store.
    let store = connect_store(&config.store).await?;
    info!(backend = store.backend_name(), "Poll store ready");

    // 4. Build the engine.
    let engine = VotingEngine::new(PollRepository::new(store));
    let state = Arc::new(AppState::new(engine, config.api.conflict_retries));

    // 5. Serve.
    start_server(&config.server, state).await?;

    info!("tally-server exiting");
    Ok(())
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins over `logging.level` when set.
fn init_logging(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));

    if logging.json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    }
}

async fn connect_store(config: &StoreConfig) -> Result<PollStore, StoreError> {
    match config.backend {
        StoreBackend::Dragonfly => {
            info!(url = %config.dragonfly_url, "Connecting to Dragonfly");
            let store = DragonflyStore::connect(&config.dragonfly_options()).await?;
            Ok(PollStore::from(store))
        }
        StoreBackend::Memory => {
            info!("Using in-memory poll store; data will not survive a restart");
            Ok(PollStore::from(MemoryStore::new()))
        }
    }
}
