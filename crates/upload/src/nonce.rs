//! Session-wide transaction nonce counter.

use std::sync::atomic::{AtomicU64, Ordering};

use tracing::info;

use crate::contract::StorageContract;
use crate::error::UploadError;
use crate::retry::RetryPolicy;

/// Hands out account nonces to concurrently running file tasks.
///
/// Values are unique and issued in increasing order. A nonce whose
/// transaction fails is never handed out again.
#[derive(Debug)]
pub struct NonceSequencer {
    next: AtomicU64,
}

impl NonceSequencer {
    pub fn new(start: u64) -> Self {
        Self {
            next: AtomicU64::new(start),
        }
    }

    /// Starts from the account's pending transaction count.
    pub async fn from_contract(
        contract: &dyn StorageContract,
        retry: &RetryPolicy,
    ) -> Result<Self, UploadError> {
        let start = retry.run("pending nonce", |_| contract.pending_nonce()).await?;
        info!(nonce = start, "nonce sequencer initialized");
        Ok(Self::new(start))
    }

    /// Takes the next nonce.
    pub fn next(&self) -> u64 {
        self.next.fetch_add(1, Ordering::SeqCst)
    }

    /// The value the next call to [`next`](Self::next) will return.
    pub fn peek(&self) -> u64 {
        self.next.load(Ordering::SeqCst)
    }
}
