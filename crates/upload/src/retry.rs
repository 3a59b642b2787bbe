//! Bounded retry and receipt polling.
//!
//! Both primitives are generic over the operation so they can be tested
//! without a node; tests run them under paused tokio time.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use w3deploy_protocol::H256;

use crate::error::UploadError;

/// Fixed-delay retry of transient failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one (at least 1).
    pub max_attempts: u32,
    /// Pause between attempts.
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    /// One try, one retry after `delay`.
    pub fn once(delay: Duration) -> Self {
        Self::new(2, delay)
    }

    /// Runs `op` until it succeeds, fails non-transiently, or attempts run
    /// out. `op` receives the 1-based attempt number.
    pub async fn run<T, F, Fut>(&self, what: &str, mut op: F) -> Result<T, UploadError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, UploadError>>,
    {
        let mut attempt = 1;
        loop {
            match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && attempt < self.max_attempts => {
                    warn!(
                        op = what,
                        attempt,
                        delay_secs = self.delay.as_secs_f64(),
                        error = %e,
                        "transient failure, retrying"
                    );
                    tokio::time::sleep(self.delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Polls for a transaction receipt on a fixed interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReceiptPoll {
    pub interval: Duration,
    /// `None` polls until cancelled.
    pub timeout: Option<Duration>,
}

impl ReceiptPoll {
    pub fn new(interval: Duration, timeout: Option<Duration>) -> Self {
        Self { interval, timeout }
    }

    /// Calls `fetch` until it yields a value.
    ///
    /// Transient fetch errors are logged and polling continues; other
    /// errors end the wait. Returns [`UploadError::ConfirmationTimeout`]
    /// once the timeout elapses and [`UploadError::Cancelled`] if `cancel`
    /// fires first.
    pub async fn wait<T, F, Fut>(
        &self,
        tx_hash: H256,
        cancel: &CancellationToken,
        mut fetch: F,
    ) -> Result<T, UploadError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Option<T>, UploadError>>,
    {
        let started = Instant::now();
        loop {
            if cancel.is_cancelled() {
                return Err(UploadError::Cancelled);
            }

            match fetch().await {
                Ok(Some(value)) => return Ok(value),
                Ok(None) => debug!(tx = %tx_hash, "receipt not available yet"),
                Err(e) if e.is_transient() => {
                    warn!(tx = %tx_hash, error = %e, "receipt poll failed, will retry");
                }
                Err(e) => return Err(e),
            }

            let waited = started.elapsed();
            if let Some(limit) = self.timeout
                && waited >= limit
            {
                return Err(UploadError::ConfirmationTimeout { tx_hash, waited });
            }

            tokio::select! {
                _ = cancel.cancelled() => return Err(UploadError::Cancelled),
                _ = tokio::time::sleep(self.interval) => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test(start_paused = true)]
    async fn retry_succeeds_on_second_attempt() {
        let calls = AtomicU32::new(0);
        let started = Instant::now();
        let policy = RetryPolicy::once(Duration::from_secs(3));

        let value = policy
            .run("estimate", |attempt| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if attempt == 1 {
                        Err(UploadError::TransientRpc("timeout".into()))
                    } else {
                        Ok(42)
                    }
                }
            })
            .await
            .unwrap();

        assert_eq!(value, 42);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(started.elapsed() >= Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn retry_gives_up_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::once(Duration::from_secs(3));

        let result: Result<(), _> = policy
            .run("estimate", |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(UploadError::TransientRpc("down".into())) }
            })
            .await;

        assert!(matches!(result, Err(UploadError::TransientRpc(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn retry_does_not_repeat_permanent_errors() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::new(5, Duration::from_secs(1));

        let result: Result<(), _> = policy
            .run("send", |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(UploadError::Rpc("nonce too low".into())) }
            })
            .await;

        assert!(matches!(result, Err(UploadError::Rpc(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn zero_attempts_clamped_to_one() {
        assert_eq!(RetryPolicy::new(0, Duration::ZERO).max_attempts, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn poll_returns_once_value_appears() {
        let calls = Arc::new(AtomicU32::new(0));
        let poll = ReceiptPoll::new(Duration::from_secs(5), None);
        let started = Instant::now();

        let value = poll
            .wait(H256::ZERO, &CancellationToken::new(), || {
                let calls = calls.clone();
                async move {
                    let n = calls.fetch_add(1, Ordering::SeqCst);
                    if n < 3 { Ok(None) } else { Ok(Some(7u32)) }
                }
            })
            .await
            .unwrap();

        assert_eq!(value, 7);
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(15) && elapsed < Duration::from_secs(20));
    }

    #[tokio::test(start_paused = true)]
    async fn poll_tolerates_transient_errors() {
        let calls = AtomicU32::new(0);
        let poll = ReceiptPoll::new(Duration::from_secs(5), None);

        let value = poll
            .wait(H256::ZERO, &CancellationToken::new(), || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n == 0 {
                        Err(UploadError::TransientRpc("reset".into()))
                    } else {
                        Ok(Some("mined"))
                    }
                }
            })
            .await
            .unwrap();

        assert_eq!(value, "mined");
    }

    #[tokio::test(start_paused = true)]
    async fn poll_times_out() {
        let poll = ReceiptPoll::new(Duration::from_secs(5), Some(Duration::from_secs(12)));

        let result: Result<(), _> = poll
            .wait(H256::ZERO, &CancellationToken::new(), || async { Ok(None) })
            .await;

        match result {
            Err(UploadError::ConfirmationTimeout { waited, .. }) => {
                assert!(waited >= Duration::from_secs(12));
            }
            other => panic!("expected timeout, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn poll_stops_on_cancel() {
        let poll = ReceiptPoll::new(Duration::from_secs(5), None);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result: Result<(), _> = poll.wait(H256::ZERO, &cancel, || async { Ok(None) }).await;
        assert!(matches!(result, Err(UploadError::Cancelled)));
    }

    #[tokio::test(start_paused = true)]
    async fn poll_propagates_permanent_errors() {
        let poll = ReceiptPoll::new(Duration::from_secs(5), None);
        let result: Result<(), _> = poll
            .wait(H256::ZERO, &CancellationToken::new(), || async {
                Err(UploadError::Rpc("unknown transaction".into()))
            })
            .await;
        assert!(matches!(result, Err(UploadError::Rpc(_))));
    }
}
