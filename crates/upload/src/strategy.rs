//! Chunk encoding strategies.
//!
//! The strategy is chosen once per session from the network profile and
//! decides chunk capacity, the content hash compared against the
//! contract, the value attached to a write and how the write travels.

use std::sync::Arc;

use tracing::debug;
use w3deploy_protocol::{
    Address, BLOB_DATA_SIZE, ContractCall, H256, TxRequest, encode_blobs, keccak256,
};
use w3deploy_transfer::ChunkPlan;

use crate::broadcaster::{BlobBroadcaster, BlobTxRequest};
use crate::config::UploadConfig;
use crate::contract::StorageContract;
use crate::error::UploadError;
use crate::network::{EncodingMode, InlineLimits, NetworkProfile, SidecarLimits};
use crate::retry::RetryPolicy;

/// A chunk that the differ decided to write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkPayload<'a> {
    pub index: u64,
    pub data: &'a [u8],
    /// Content hash under the active strategy.
    pub hash: H256,
}

/// A write transaction minus nonce and gas limit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedWrite {
    pub call: ContractCall,
    /// Attached value in wei.
    pub value: u128,
    /// Chunk indices covered by this write.
    pub indices: Vec<u64>,
    /// Raw chunk bytes covered by this write.
    pub bytes: u64,
    /// Blob payload for sidecar writes; empty for inline writes.
    pub payload: Vec<u8>,
}

/// Payload in call data, one chunk per transaction.
#[derive(Debug, Clone)]
pub struct InlineStrategy {
    limits: InlineLimits,
    contract_address: Address,
}

impl InlineStrategy {
    pub fn new(limits: InlineLimits, contract_address: Address) -> Self {
        Self {
            limits,
            contract_address,
        }
    }

    /// Stake owed per chunk of a file split by `plan`, in wei.
    pub fn fee_per_chunk(&self, plan: &ChunkPlan) -> u128 {
        self.limits
            .stake_fee
            .map(|fee| fee.wei_per_chunk(plan.file_size, plan.chunk_count))
            .unwrap_or(0)
    }

    fn prepare(&self, name: &[u8], plan: &ChunkPlan, chunk: &ChunkPayload<'_>) -> PreparedWrite {
        PreparedWrite {
            call: ContractCall::WriteChunk {
                name: name.to_vec(),
                chunk_id: chunk.index,
                data: chunk.data.to_vec(),
            },
            value: self.fee_per_chunk(plan),
            indices: vec![chunk.index],
            bytes: chunk.data.len() as u64,
            payload: Vec::new(),
        }
    }
}

/// Payload in blob sidecars, several chunks per transaction.
#[derive(Clone)]
pub struct SidecarStrategy {
    limits: SidecarLimits,
    chain_id: u64,
    rpc_url: String,
    contract_address: Address,
    max_fee_per_blob_gas: u64,
    broadcaster: Arc<dyn BlobBroadcaster>,
}

impl SidecarStrategy {
    pub fn new(
        profile: &NetworkProfile,
        limits: SidecarLimits,
        max_fee_per_blob_gas: u64,
        broadcaster: Arc<dyn BlobBroadcaster>,
    ) -> Result<Self, UploadError> {
        if limits.blob_data_size == 0 || limits.blob_data_size > BLOB_DATA_SIZE {
            return Err(UploadError::InvalidInput(format!(
                "blob data size must be between 1 and {BLOB_DATA_SIZE} bytes"
            )));
        }
        Ok(Self {
            limits: SidecarLimits {
                max_blobs_per_tx: limits.max_blobs_per_tx.max(1),
                ..limits
            },
            chain_id: profile.chain_id,
            rpc_url: profile.rpc_url.clone(),
            contract_address: profile.contract_address,
            max_fee_per_blob_gas,
            broadcaster,
        })
    }

    async fn prepare(
        &self,
        contract: &dyn StorageContract,
        read_retry: &RetryPolicy,
        name: &[u8],
        chunks: &[ChunkPayload<'_>],
    ) -> Result<PreparedWrite, UploadError> {
        let upfront = read_retry
            .run("upfront payment", |_| contract.upfront_payment())
            .await?;

        let mut payload = Vec::with_capacity(chunks.len() * self.limits.blob_data_size);
        for (i, chunk) in chunks.iter().enumerate() {
            payload.extend_from_slice(chunk.data);
            // Every chunk but the last is padded out to a full blob.
            if i + 1 < chunks.len() {
                payload.resize((i + 1) * self.limits.blob_data_size, 0);
            }
        }

        Ok(PreparedWrite {
            call: ContractCall::WriteChunks {
                name: name.to_vec(),
                chunk_ids: chunks.iter().map(|c| c.index).collect(),
                chunk_hashes: chunks.iter().map(|c| c.hash).collect(),
                sizes: chunks.iter().map(|c| c.data.len() as u64).collect(),
            },
            value: upfront * chunks.len() as u128,
            indices: chunks.iter().map(|c| c.index).collect(),
            bytes: chunks.iter().map(|c| c.data.len() as u64).sum(),
            payload,
        })
    }
}

/// Active encoding for a session.
#[derive(Clone)]
pub enum EncodingStrategy {
    Inline(InlineStrategy),
    Sidecar(SidecarStrategy),
}

impl EncodingStrategy {
    /// Picks the strategy for `mode` on `profile`.
    ///
    /// Fails with [`UploadError::UnsupportedEncoding`] when the network
    /// lacks the mode, and with [`UploadError::InvalidInput`] when a
    /// sidecar session has no broadcaster.
    pub fn for_profile(
        profile: &NetworkProfile,
        mode: EncodingMode,
        config: &UploadConfig,
        broadcaster: Option<Arc<dyn BlobBroadcaster>>,
    ) -> Result<Self, UploadError> {
        let unsupported = || UploadError::UnsupportedEncoding {
            mode,
            chain_id: profile.chain_id,
        };

        match mode {
            EncodingMode::Inline => {
                let limits = profile.inline.ok_or_else(unsupported)?;
                Ok(Self::Inline(InlineStrategy::new(
                    limits,
                    profile.contract_address,
                )))
            }
            EncodingMode::Sidecar => {
                let limits = profile.sidecar.ok_or_else(unsupported)?;
                let broadcaster = broadcaster.ok_or_else(|| {
                    UploadError::InvalidInput("blob uploads need a blob broadcaster".into())
                })?;
                Ok(Self::Sidecar(SidecarStrategy::new(
                    profile,
                    limits,
                    config.max_fee_per_blob_gas,
                    broadcaster,
                )?))
            }
        }
    }

    pub fn mode(&self) -> EncodingMode {
        match self {
            Self::Inline(_) => EncodingMode::Inline,
            Self::Sidecar(_) => EncodingMode::Sidecar,
        }
    }

    /// Chunk capacity fed to the chunker.
    pub fn capacity(&self) -> usize {
        match self {
            Self::Inline(s) => s.limits.capacity,
            Self::Sidecar(s) => s.limits.blob_data_size,
        }
    }

    /// How many chunks may share one write transaction.
    pub fn max_chunks_per_tx(&self) -> usize {
        match self {
            Self::Inline(_) => 1,
            Self::Sidecar(s) => s.limits.max_blobs_per_tx,
        }
    }

    /// Hash the contract stores for `data`: over the raw bytes inline,
    /// over the encoded blob in sidecar mode.
    pub fn content_hash(&self, data: &[u8]) -> H256 {
        match self {
            Self::Inline(_) => keccak256(data),
            Self::Sidecar(_) => keccak256(&encode_blobs(data).concat()),
        }
    }

    /// Builds the write for `chunks`, which must be consecutive and no
    /// more than [`max_chunks_per_tx`](Self::max_chunks_per_tx).
    pub async fn prepare(
        &self,
        contract: &dyn StorageContract,
        read_retry: &RetryPolicy,
        name: &[u8],
        plan: &ChunkPlan,
        chunks: &[ChunkPayload<'_>],
    ) -> Result<PreparedWrite, UploadError> {
        if chunks.is_empty() || chunks.len() > self.max_chunks_per_tx() {
            return Err(UploadError::InvalidInput(format!(
                "cannot write {} chunks in one transaction",
                chunks.len()
            )));
        }
        match self {
            Self::Inline(s) => Ok(s.prepare(name, plan, &chunks[0])),
            Self::Sidecar(s) => s.prepare(contract, read_retry, name, chunks).await,
        }
    }

    /// Signs and broadcasts a prepared write with `nonce`.
    pub async fn broadcast(
        &self,
        contract: &dyn StorageContract,
        prepared: &PreparedWrite,
        nonce: u64,
        gas_limit: u64,
    ) -> Result<H256, UploadError> {
        match self {
            Self::Inline(s) => {
                let tx = TxRequest {
                    to: s.contract_address,
                    nonce,
                    gas_limit,
                    value: prepared.value,
                    call: prepared.call.clone(),
                };
                contract.send_transaction(&tx).await
            }
            Self::Sidecar(s) => {
                let fees = contract.fee_data().await?;
                let tx = BlobTxRequest {
                    chain_id: s.chain_id,
                    rpc_url: s.rpc_url.clone(),
                    nonce,
                    to: s.contract_address,
                    value: prepared.value,
                    payload: prepared.payload.clone(),
                    blob_count: prepared.indices.len(),
                    call: prepared.call.clone(),
                    gas_limit,
                    fees,
                    max_fee_per_blob_gas: s.max_fee_per_blob_gas,
                };
                debug!(nonce, blobs = tx.blob_count, "handing blob write to broadcaster");
                s.broadcaster.broadcast(&tx).await
            }
        }
    }
}
