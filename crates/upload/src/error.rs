//! Upload error types.

use std::time::Duration;

use w3deploy_protocol::H256;

use crate::network::EncodingMode;

/// Errors produced by the upload engine.
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    /// Timeout or connection failure talking to the node. Retried once.
    #[error("transient RPC error: {0}")]
    TransientRpc(String),

    /// The node answered but refused the request (execution error,
    /// malformed call). Not retried.
    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("transaction {tx_hash} reverted")]
    Reverted { tx_hash: H256 },

    #[error("transaction {tx_hash} not confirmed after {waited:?}")]
    ConfirmationTimeout { tx_hash: H256, waited: Duration },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("network {chain_id} does not support {mode} uploads")]
    UnsupportedEncoding { mode: EncodingMode, chain_id: u64 },

    #[error("blob broadcaster error: {0}")]
    Broadcaster(String),

    #[error("config error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("transfer error: {0}")]
    Transfer(#[from] w3deploy_transfer::TransferError),

    #[error("protocol error: {0}")]
    Protocol(#[from] w3deploy_protocol::ProtocolError),

    #[error("cancelled")]
    Cancelled,
}

impl UploadError {
    /// Whether a bounded retry may help.
    pub fn is_transient(&self) -> bool {
        matches!(self, UploadError::TransientRpc(_))
    }

    /// Whether the error must abort the whole session rather than one file.
    pub fn is_session_fatal(&self) -> bool {
        matches!(
            self,
            UploadError::InvalidInput(_) | UploadError::UnsupportedEncoding { .. }
        )
    }
}
