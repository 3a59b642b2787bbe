//! Upload of a single file: read, split, reconcile, then write chunk by
//! chunk until done or the first failure.

use tracing::{error, info, warn};
use w3deploy_transfer::{ChunkPlan, read_content, split_even};

use crate::differ::{ChunkDecision, ChunkDiffer};
use crate::error::UploadError;
use crate::reconcile::Reconciler;
use crate::retry::RetryPolicy;
use crate::strategy::ChunkPayload;
use crate::submitter::TransactionSubmitter;
use crate::types::{FileInfo, UploadResult};

/// Runs the per-file flow against a shared submitter.
pub struct FileUploader<'a> {
    submitter: &'a TransactionSubmitter,
    read_retry: RetryPolicy,
}

impl<'a> FileUploader<'a> {
    pub fn new(submitter: &'a TransactionSubmitter, read_retry: RetryPolicy) -> Self {
        Self {
            submitter,
            read_retry,
        }
    }

    /// Uploads `file`. Failures end up in the returned result, never as
    /// an error.
    ///
    /// Chunks are handled strictly in order; a write is only started once
    /// the previous one is confirmed, and the first failed write stops
    /// the file.
    pub async fn upload(&self, file: &FileInfo) -> UploadResult {
        let name = file.logical_name.as_str();

        let content = match read_file(file).await {
            Ok(content) => content,
            Err(e) => {
                error!(file = name, error = %e, "failed to read file");
                return UploadResult::failed(name, e.to_string());
            }
        };

        let strategy = self.submitter.strategy();
        let chunks = match split_even(&content, strategy.capacity()) {
            Ok(chunks) => chunks,
            Err(e) => return UploadResult::failed(name, e.to_string()),
        };
        let plan = *chunks.plan();

        let reconciler = Reconciler::new(self.submitter, self.read_retry);
        let state = match reconciler.reconcile(name, plan.chunk_count as u64).await {
            Ok(state) => state,
            Err(e) => {
                error!(file = name, error = %e, "reconciliation failed, skipping file");
                return UploadResult::failed(name, e.to_string());
            }
        };

        let differ = ChunkDiffer::new(self.submitter.contract(), self.read_retry);
        let group_size = strategy.max_chunks_per_tx();
        let mut result = UploadResult::new(name);
        let mut pending: Vec<ChunkPayload<'_>> = Vec::with_capacity(group_size);

        for chunk in chunks {
            let payload = ChunkPayload {
                index: chunk.index as u64,
                data: chunk.data,
                hash: strategy.content_hash(chunk.data),
            };

            match differ.decide(name, payload.index, payload.hash, state).await {
                Ok(ChunkDecision::Skip) => {
                    result.chunks_skipped += 1;
                    continue;
                }
                Ok(ChunkDecision::Upload) => pending.push(payload),
                Err(e) => {
                    warn!(file = name, chunk = payload.index, error = %e, "chunk hash unavailable");
                    // Grouped chunks waiting for this one are never written.
                    result.failed_indices.extend(pending.drain(..).map(|c| c.index));
                    result.failed_indices.push(payload.index);
                    result.error = Some(e.to_string());
                    break;
                }
            }

            if pending.len() >= group_size && !self.flush(name, &plan, &mut pending, &mut result).await
            {
                break;
            }
        }

        if result.error.is_none() && !pending.is_empty() {
            self.flush(name, &plan, &mut pending, &mut result).await;
        }

        result.succeeded = result.error.is_none() && result.failed_indices.is_empty();
        if result.succeeded {
            info!(
                file = name,
                written = result.chunks_succeeded,
                skipped = result.chunks_skipped,
                "file uploaded"
            );
        }
        result
    }

    /// Writes the pending group. Returns false when the write failed.
    async fn flush(
        &self,
        name: &str,
        plan: &ChunkPlan,
        pending: &mut Vec<ChunkPayload<'_>>,
        result: &mut UploadResult,
    ) -> bool {
        result.chunks_attempted += pending.len() as u64;
        let outcome = self.submitter.write_chunks(name, plan, pending).await;
        let indices: Vec<u64> = pending.drain(..).map(|c| c.index).collect();

        match outcome {
            Ok(receipt) => {
                result.chunks_succeeded += indices.len() as u64;
                result.cost_paid += receipt.value;
                result.bytes_uploaded += receipt.bytes;
                true
            }
            Err(e) => {
                error!(file = name, chunks = ?indices, error = %e, "chunk write failed");
                result.failed_indices.extend(indices);
                result.error = Some(e.to_string());
                false
            }
        }
    }
}

async fn read_file(file: &FileInfo) -> Result<Vec<u8>, UploadError> {
    let path = file.absolute_path.clone();
    let size = usize::try_from(file.size_bytes).map_err(|_| {
        UploadError::InvalidInput(format!("{} is too large", path.display()))
    })?;
    tokio::task::spawn_blocking(move || read_content(&path, size))
        .await
        .map_err(|e| UploadError::Io(std::io::Error::other(e)))?
        .map_err(UploadError::from)
}
