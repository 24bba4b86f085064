//! Conflict retry shared by the HTTP handlers and the chat commands.

use std::future::Future;

use tally_engine::VotingError;

/// Run `operation`, re-running it from scratch while it fails with
/// [`VotingError::Conflict`], at most `retries` extra times.
///
/// Each attempt re-reads the poll, so rules are checked against the state
/// that won the race. Any other outcome is returned as is.
pub async fn retry_on_conflict<T, F, Fut>(
    retries: u32,
    name: &'static str,
    mut operation: F,
) -> Result<T, VotingError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, VotingError>>,
{
    let mut remaining = retries;
    loop {
        match operation().await {
            Err(err) if err.is_conflict() && remaining > 0 => {
                remaining = remaining.saturating_sub(1);
                tracing::debug!(operation = name, remaining, error = %err, "Retrying after write conflict");
            }
            outcome => return outcome,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use tally_types::PollId;

    use super::*;

    async fn conflict_until(calls: &AtomicU32, succeed_on: u32) -> Result<u32, VotingError> {
        let n = calls.fetch_add(1, Ordering::SeqCst).saturating_add(1);
        if n >= succeed_on {
            Ok(n)
        } else {
            Err(VotingError::Conflict(PollId::new("p1")))
        }
    }

    #[tokio::test]
    async fn retries_until_success() {
        let calls = AtomicU32::new(0);
        let result = retry_on_conflict(3, "test", || conflict_until(&calls, 3)).await;
        assert_eq!(result.ok(), Some(3));
    }

    #[tokio::test]
    async fn gives_up_after_budget() {
        let calls = AtomicU32::new(0);
        let result = retry_on_conflict(2, "test", || conflict_until(&calls, 10)).await;
        assert!(matches!(result, Err(VotingError::Conflict(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn other_errors_are_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<(), VotingError> = retry_on_conflict(5, "test", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(VotingError::NotFound(PollId::new("p1"))) }
        })
        .await;
        assert!(matches!(result, Err(VotingError::NotFound(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
