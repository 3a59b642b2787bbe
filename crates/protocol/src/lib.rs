//! On-chain protocol types for the w3deploy storage contract.
//!
//! Everything that has a fixed byte-level meaning lives here: the
//! Keccak-256 content hash, Solidity ABI call encoding, the EIP-4844
//! blob layout, and the transaction/receipt value types exchanged with
//! the node.

pub mod abi;
pub mod blob;
pub mod hash;
pub mod types;

// Re-export primary types for convenience.
pub use abi::{Token, encode_call, encode_tokens, selector};
pub use blob::{BLOB_DATA_SIZE, BLOB_SIZE, blob_count, encode_blob, encode_blobs};
pub use hash::{Address, H256, keccak256};
pub use types::{ContractCall, FeeData, Receipt, TxRequest};

/// Errors produced by the protocol crate.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("invalid hex: {0}")]
    InvalidHex(#[from] hex::FromHexError),

    #[error("invalid length: expected {expected} bytes, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("blob payload too large: {len} bytes (max {max})")]
    BlobTooLarge { len: usize, max: usize },
}
