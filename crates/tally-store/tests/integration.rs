//! Integration tests for the `tally-store` `Dragonfly` backend.
//!
//! These tests require a live Dragonfly (or Redis) instance. Run with:
//!
//! ```bash
//! docker run -d --name tally-dragonfly -p 6379:6379 docker.dragonflydb.io/dragonflydb/dragonfly
//! cargo test -p tally-store -- --ignored
//! docker rm -f tally-dragonfly
//! ```
//!
//! All tests are marked `#[ignore]` so they are skipped during normal
//! `cargo test` runs.

#![allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::missing_panics_doc
)]

use chrono::{TimeZone, Utc};
use tally_store::{
    DragonflyOptions, DragonflyStore, PollRepository, PollStore, RepositoryError, SwapOutcome,
};
use tally_types::{Poll, PollId, UserId};

/// Dragonfly connection URL for the local Docker instance.
const DRAGONFLY_URL: &str = "redis://localhost:6379";

async fn setup_dragonfly() -> DragonflyStore {
    let options = DragonflyOptions {
        url: DRAGONFLY_URL.to_owned(),
        ..DragonflyOptions::default()
    };
    DragonflyStore::connect(&options)
        .await
        .expect("Failed to connect to Dragonfly -- is Dragonfly running?")
}

fn unique_poll() -> Poll {
    Poll::open(
        PollId::generate(),
        "Integration poll".to_owned(),
        "created by tally-store tests".to_owned(),
        vec!["Yes".to_owned(), "No".to_owned()],
        UserId::new("integration-creator"),
        Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
    )
}

// =============================================================================
// Raw store primitives
// =============================================================================

#[tokio::test]
#[ignore = "requires live Dragonfly instance on localhost:6379"]
async fn dragonfly_insert_load_swap_remove() {
    let store = setup_dragonfly().await;
    let key = format!("poll:it-{}", PollId::generate());

    assert!(store.insert(&key, 1, "v1").await.unwrap());
    assert!(!store.insert(&key, 1, "other").await.unwrap());
    assert_eq!(store.load(&key).await.unwrap().as_deref(), Some("v1"));
    assert_eq!(store.version(&key).await.unwrap(), Some(1));

    assert_eq!(
        store.swap(&key, 1, 2, "v2").await.unwrap(),
        SwapOutcome::Swapped
    );
    assert_eq!(
        store.swap(&key, 1, 2, "stale").await.unwrap(),
        SwapOutcome::Stale { stored: 2 }
    );
    assert_eq!(store.load(&key).await.unwrap().as_deref(), Some("v2"));

    assert!(store.remove(&key).await.unwrap());
    assert!(!store.remove(&key).await.unwrap());
    assert_eq!(
        store.swap(&key, 2, 3, "gone").await.unwrap(),
        SwapOutcome::Missing
    );
}

// =============================================================================
// Repository over Dragonfly
// =============================================================================

#[tokio::test]
#[ignore = "requires live Dragonfly instance on localhost:6379"]
async fn dragonfly_repository_round_trip() {
    let repo = PollRepository::new(PollStore::from(setup_dragonfly().await));
    let mut poll = unique_poll();
    let id = repo.create(&mut poll).await.unwrap();

    let loaded = repo.get(&id).await.unwrap();
    assert_eq!(loaded, poll);

    repo.delete(&id).await.unwrap();
    assert!(matches!(
        repo.get(&id).await,
        Err(RepositoryError::NotFound(_))
    ));
}

#[tokio::test]
#[ignore = "requires live Dragonfly instance on localhost:6379"]
async fn dragonfly_repository_detects_stale_replace() {
    let repo = PollRepository::new(PollStore::from(setup_dragonfly().await));
    let mut poll = unique_poll();
    let id = repo.create(&mut poll).await.unwrap();

    let mut first = repo.get(&id).await.unwrap();
    let mut second = repo.get(&id).await.unwrap();
    first.active = false;
    first.ended_at = Some(first.created_at);
    repo.replace(&mut first).await.unwrap();

    let result = repo.replace(&mut second).await;
    assert!(matches!(result, Err(RepositoryError::Conflict { .. })));
    assert!(!repo.get(&id).await.unwrap().active);

    repo.delete(&id).await.unwrap();
}
