//! Stale-chunk reconciliation.
//!
//! A file that shrank leaves orphaned trailing chunks on the contract.
//! Before writing, the remote chunk count is read fresh; if it exceeds
//! the new count the whole file is removed first.

use tracing::{debug, info};

use crate::error::UploadError;
use crate::retry::RetryPolicy;
use crate::submitter::TransactionSubmitter;

/// Remote state of a file after reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileState {
    /// Stored with no more chunks than the new content; diff per chunk.
    Normal { remote_count: u64 },
    /// Nothing stored under the name yet.
    New,
    /// The stored file was removed because it had more chunks.
    Removed { remote_count: u64 },
}

impl ReconcileState {
    /// Whether chunk hashes must be compared before writing.
    pub fn requires_diff(&self) -> bool {
        matches!(self, ReconcileState::Normal { .. })
    }
}

/// Decides, and if needed performs, the destructive remove of one file.
pub struct Reconciler<'a> {
    submitter: &'a TransactionSubmitter,
    read_retry: RetryPolicy,
}

impl<'a> Reconciler<'a> {
    pub fn new(submitter: &'a TransactionSubmitter, read_retry: RetryPolicy) -> Self {
        Self {
            submitter,
            read_retry,
        }
    }

    /// Compares the stored chunk count of `file` with `new_count`.
    ///
    /// A failed remove is returned as an error and must end the file.
    pub async fn reconcile(&self, file: &str, new_count: u64) -> Result<ReconcileState, UploadError> {
        let contract = self.submitter.contract();
        let name = file.as_bytes();
        let remote_count = self
            .read_retry
            .run("count chunks", |_| contract.count_chunks(name))
            .await?;

        if remote_count > new_count {
            info!(file, remote_count, new_count, "file shrank, removing stored chunks");
            self.submitter.remove(file).await?;
            Ok(ReconcileState::Removed { remote_count })
        } else if remote_count == 0 {
            debug!(file, "no stored chunks");
            Ok(ReconcileState::New)
        } else {
            debug!(file, remote_count, new_count, "stored file will be diffed");
            Ok(ReconcileState::Normal { remote_count })
        }
    }
}
