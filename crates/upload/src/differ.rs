//! Per-chunk skip/upload decision.

use tracing::debug;
use w3deploy_protocol::H256;

use crate::contract::StorageContract;
use crate::error::UploadError;
use crate::reconcile::ReconcileState;
use crate::retry::RetryPolicy;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkDecision {
    /// Stored hash matches; nothing to write.
    Skip,
    Upload,
}

/// Compares local chunk hashes with the hashes stored on the contract.
pub struct ChunkDiffer<'a> {
    contract: &'a dyn StorageContract,
    retry: RetryPolicy,
}

impl<'a> ChunkDiffer<'a> {
    pub fn new(contract: &'a dyn StorageContract, retry: RetryPolicy) -> Self {
        Self { contract, retry }
    }

    /// Decides whether chunk `index` of `file` must be written.
    ///
    /// Files that are new or were just removed upload every chunk without
    /// reading the stored hash.
    pub async fn decide(
        &self,
        file: &str,
        index: u64,
        local_hash: H256,
        state: ReconcileState,
    ) -> Result<ChunkDecision, UploadError> {
        if !state.requires_diff() {
            return Ok(ChunkDecision::Upload);
        }

        let contract = self.contract;
        let name = file.as_bytes();
        let remote = self
            .retry
            .run("read chunk hash", |_| contract.chunk_hash(name, index))
            .await?;

        if remote == local_hash {
            debug!(file, chunk = index, "chunk unchanged");
            Ok(ChunkDecision::Skip)
        } else {
            Ok(ChunkDecision::Upload)
        }
    }
}
