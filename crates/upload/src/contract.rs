//! Storage contract connection trait.
//!
//! The embedding application implements [`StorageContract`] on top of its
//! JSON-RPC client and account wallet. Keeping the engine behind a trait
//! keeps it independent of any node library and testable with mocks.

use std::future::Future;
use std::pin::Pin;

use tokio_util::sync::CancellationToken;
use w3deploy_protocol::{Address, ContractCall, FeeData, H256, Receipt, TxRequest};

use crate::error::UploadError;
use crate::retry::ReceiptPoll;

/// Boxed future returned by [`StorageContract`] methods.
pub type ContractFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, UploadError>> + Send + 'a>>;

/// Handle to the remote storage contract plus the signing account.
///
/// Implementations map timeouts and connection failures to
/// [`UploadError::TransientRpc`] so the engine can retry them, and every
/// other node-side failure to [`UploadError::Rpc`].
pub trait StorageContract: Send + Sync {
    /// Address of the contract.
    fn address(&self) -> Address;

    /// The account's transaction count including pending transactions.
    fn pending_nonce(&self) -> ContractFuture<'_, u64>;

    /// Number of chunks currently stored under `name`.
    fn count_chunks<'a>(&'a self, name: &'a [u8]) -> ContractFuture<'a, u64>;

    /// Stored content hash of one chunk ([`H256::ZERO`] if absent).
    fn chunk_hash<'a>(&'a self, name: &'a [u8], chunk_id: u64) -> ContractFuture<'a, H256>;

    /// Per-blob payment required by blob writes, in wei.
    fn upfront_payment(&self) -> ContractFuture<'_, u128>;

    /// Gas estimate for executing `call` with `value` attached.
    fn estimate_gas<'a>(&'a self, call: &'a ContractCall, value: u128)
    -> ContractFuture<'a, u64>;

    /// Current EIP-1559 fee parameters.
    fn fee_data(&self) -> ContractFuture<'_, FeeData>;

    /// Signs `tx` with the account key and broadcasts it.
    fn send_transaction<'a>(&'a self, tx: &'a TxRequest) -> ContractFuture<'a, H256>;

    /// Receipt for `tx_hash`, or `None` while the transaction is pending.
    fn transaction_receipt(&self, tx_hash: H256) -> ContractFuture<'_, Option<Receipt>>;
}

/// Waits until `tx_hash` is mined and returns its receipt.
pub async fn wait_for_receipt(
    contract: &dyn StorageContract,
    tx_hash: H256,
    poll: &ReceiptPoll,
    cancel: &CancellationToken,
) -> Result<Receipt, UploadError> {
    poll.wait(tx_hash, cancel, || async move {
        let receipt = contract.transaction_receipt(tx_hash).await?;
        Ok(receipt.filter(Receipt::is_mined))
    })
    .await
}

/// Waits for `tx_hash` and turns a failed execution status into
/// [`UploadError::Reverted`].
pub async fn confirm(
    contract: &dyn StorageContract,
    tx_hash: H256,
    poll: &ReceiptPoll,
    cancel: &CancellationToken,
) -> Result<Receipt, UploadError> {
    let receipt = wait_for_receipt(contract, tx_hash, poll, cancel).await?;
    if receipt.status {
        Ok(receipt)
    } else {
        Err(UploadError::Reverted { tx_hash })
    }
}
