//! Transaction submission: estimate, sign, broadcast, confirm.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use w3deploy_protocol::{ContractCall, H256, Receipt, TxRequest};
use w3deploy_transfer::ChunkPlan;

use crate::config::UploadConfig;
use crate::contract::{StorageContract, confirm};
use crate::error::UploadError;
use crate::nonce::NonceSequencer;
use crate::retry::{ReceiptPoll, RetryPolicy};
use crate::strategy::{ChunkPayload, EncodingStrategy};

/// A confirmed write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteReceipt {
    pub tx_hash: H256,
    /// Value paid, in wei.
    pub value: u128,
    /// Raw chunk bytes written.
    pub bytes: u64,
    pub indices: Vec<u64>,
}

/// Builds and confirms every transaction of a session.
///
/// Each broadcast attempt takes a fresh nonce from the shared sequencer;
/// a nonce spent on a failed attempt is not reused.
pub struct TransactionSubmitter {
    contract: Arc<dyn StorageContract>,
    strategy: EncodingStrategy,
    nonces: Arc<NonceSequencer>,
    read_retry: RetryPolicy,
    gas_retry: RetryPolicy,
    broadcast_retry: RetryPolicy,
    remove_retry: RetryPolicy,
    poll: ReceiptPoll,
    config: UploadConfig,
    cancel: CancellationToken,
}

impl TransactionSubmitter {
    pub fn new(
        contract: Arc<dyn StorageContract>,
        strategy: EncodingStrategy,
        nonces: Arc<NonceSequencer>,
        config: &UploadConfig,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            contract,
            strategy,
            nonces,
            read_retry: config.read_retry(),
            gas_retry: config.gas_retry(),
            broadcast_retry: config.broadcast_retry(),
            remove_retry: config.remove_retry(),
            poll: ReceiptPoll::new(config.poll_interval(), config.confirmation_timeout()),
            config: config.clone(),
            cancel,
        }
    }

    pub fn strategy(&self) -> &EncodingStrategy {
        &self.strategy
    }

    pub fn contract(&self) -> &dyn StorageContract {
        self.contract.as_ref()
    }

    /// Writes `chunks` of `file` in one transaction and waits for it.
    pub async fn write_chunks(
        &self,
        file: &str,
        plan: &ChunkPlan,
        chunks: &[ChunkPayload<'_>],
    ) -> Result<WriteReceipt, UploadError> {
        let contract = self.contract.as_ref();
        let strategy = &self.strategy;
        let prepared = strategy
            .prepare(contract, &self.read_retry, file.as_bytes(), plan, chunks)
            .await?;
        let prepared = &prepared;

        let estimate = self
            .gas_retry
            .run("estimate gas", |_| {
                contract.estimate_gas(&prepared.call, prepared.value)
            })
            .await?;
        let gas_limit = self.config.gas_limit(estimate);

        let nonces = self.nonces.as_ref();
        let tx_hash = self
            .broadcast_retry
            .run("broadcast", move |attempt| {
                let nonce = nonces.next();
                debug!(file, chunks = ?prepared.indices, nonce, attempt, "broadcasting write");
                strategy.broadcast(contract, prepared, nonce, gas_limit)
            })
            .await?;
        info!(file, chunks = ?prepared.indices, tx = %tx_hash, "write broadcast");

        self.confirm(tx_hash).await?;
        info!(file, chunks = ?prepared.indices, tx = %tx_hash, "write confirmed");

        Ok(WriteReceipt {
            tx_hash,
            value: prepared.value,
            bytes: prepared.bytes,
            indices: prepared.indices.clone(),
        })
    }

    /// Removes every chunk of `file` and waits for the receipt.
    ///
    /// Removes always go through the account wallet, whatever the
    /// session's encoding.
    pub async fn remove(&self, file: &str) -> Result<H256, UploadError> {
        let contract = self.contract.as_ref();
        let call = ContractCall::Remove {
            name: file.as_bytes().to_vec(),
        };
        let call = &call;

        let estimate = self
            .gas_retry
            .run("estimate remove gas", |_| contract.estimate_gas(call, 0))
            .await?;
        let gas_limit = self.config.gas_limit(estimate);

        let nonces = self.nonces.as_ref();
        let to = contract.address();
        let tx_hash = self
            .remove_retry
            .run("broadcast remove", move |attempt| {
                let tx = TxRequest {
                    to,
                    nonce: nonces.next(),
                    gas_limit,
                    value: 0,
                    call: call.clone(),
                };
                debug!(file, nonce = tx.nonce, attempt, "broadcasting remove");
                async move { contract.send_transaction(&tx).await }
            })
            .await?;
        info!(file, tx = %tx_hash, "remove broadcast");

        match self.confirm(tx_hash).await {
            Ok(_) => {
                info!(file, tx = %tx_hash, "remove confirmed");
                Ok(tx_hash)
            }
            Err(e) => {
                warn!(file, tx = %tx_hash, error = %e, "remove failed");
                Err(e)
            }
        }
    }

    async fn confirm(&self, tx_hash: H256) -> Result<Receipt, UploadError> {
        confirm(self.contract.as_ref(), tx_hash, &self.poll, &self.cancel).await
    }
}
