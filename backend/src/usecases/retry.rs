use std::{future::Future, time::Duration};

use crates::domain::value_objects::storage_errors::TransactionConflict;
use rand::Rng;
use tokio::time::sleep;
use tracing::warn;

/// Jittered exponential backoff around serializable units of work. Only
/// `TransactionConflict` is retried; every other error returns immediately.
#[derive(Debug, Clone)]
pub struct ConflictRetry {
    pub max_attempts: usize,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl ConflictRetry {
    pub fn new(max_attempts: usize, base_delay_ms: u64, max_delay_ms: u64) -> Self {
        let base_delay_ms = base_delay_ms.max(1);
        Self {
            max_attempts: max_attempts.max(1),
            base_delay_ms,
            max_delay_ms: max_delay_ms.max(base_delay_ms),
        }
    }

    /// Upper bound of the delay before retry number `attempt` (0-based).
    fn delay_ceiling(&self, attempt: usize) -> u64 {
        let exp = 2_u64.saturating_pow(attempt as u32);
        self.base_delay_ms.saturating_mul(exp).min(self.max_delay_ms)
    }

    fn next_delay(&self, attempt: usize) -> Duration {
        let ceiling = self.delay_ceiling(attempt);
        let jittered = rand::thread_rng().gen_range(ceiling / 2..=ceiling);
        Duration::from_millis(jittered)
    }

    pub async fn run<F, Fut, T>(&self, operation: &str, mut op: F) -> anyhow::Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
    {
        let mut attempt = 0;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is::<TransactionConflict>() => {
                    attempt += 1;
                    if attempt >= self.max_attempts {
                        warn!(operation, attempt, "retry: serialization conflicts exhausted");
                        return Err(err);
                    }
                    let delay = self.next_delay(attempt - 1);
                    warn!(
                        operation,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "retry: serialization conflict, backing off"
                    );
                    sleep(delay).await;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

impl Default for ConflictRetry {
    fn default() -> Self {
        Self::new(5, 25, 400)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    };

    #[test]
    fn ceiling_doubles_and_caps() {
        let retry = ConflictRetry::new(5, 25, 400);
        let ceilings: Vec<_> = (0..6).map(|attempt| retry.delay_ceiling(attempt)).collect();
        assert_eq!(ceilings, vec![25, 50, 100, 200, 400, 400]);
    }

    #[test]
    fn new_clamps_inputs() {
        let retry = ConflictRetry::new(0, 0, 0);
        assert_eq!(retry.max_attempts, 1);
        assert_eq!(retry.base_delay_ms, 1);
        assert_eq!(retry.max_delay_ms, 1);
    }

    #[tokio::test]
    async fn retries_conflicts_until_success() {
        let retry = ConflictRetry::new(5, 1, 2);
        let calls = Arc::new(AtomicUsize::new(0));

        let result = retry
            .run("test", || {
                let calls = Arc::clone(&calls);
                async move {
                    if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err(TransactionConflict.into())
                    } else {
                        Ok("done")
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let retry = ConflictRetry::new(3, 1, 2);
        let calls = Arc::new(AtomicUsize::new(0));

        let result: anyhow::Result<()> = retry
            .run("test", || {
                let calls = Arc::clone(&calls);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(TransactionConflict.into())
                }
            })
            .await;

        assert!(result.unwrap_err().is::<TransactionConflict>());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn other_errors_are_not_retried() {
        let retry = ConflictRetry::new(5, 1, 2);
        let calls = Arc::new(AtomicUsize::new(0));

        let result: anyhow::Result<()> = retry
            .run("test", || {
                let calls = Arc::clone(&calls);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(anyhow::anyhow!("boom"))
                }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
