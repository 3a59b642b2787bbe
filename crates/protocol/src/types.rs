//! Storage contract calls and the transaction values built around them.

use serde::{Deserialize, Serialize};

use crate::abi::{Token, encode_call};
use crate::hash::{Address, H256};

/// A call against the storage contract.
///
/// File names are carried as raw UTF-8 bytes, which is how the contract
/// keys its objects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContractCall {
    /// Inline write: the chunk payload travels in call data.
    WriteChunk {
        name: Vec<u8>,
        chunk_id: u64,
        data: Vec<u8>,
    },
    /// Blob write: call data carries only hashes and sizes, the payload
    /// rides in the transaction's blob sidecar (one blob per chunk).
    WriteChunks {
        name: Vec<u8>,
        chunk_ids: Vec<u64>,
        chunk_hashes: Vec<H256>,
        sizes: Vec<u64>,
    },
    /// Deletes every chunk of a file; returns the number removed.
    Remove { name: Vec<u8> },
    CountChunks { name: Vec<u8> },
    GetChunkHash { name: Vec<u8>, chunk_id: u64 },
    /// Per-blob payment required alongside blob writes.
    UpfrontPayment,
}

impl ContractCall {
    /// Canonical Solidity signature used for the selector.
    pub fn signature(&self) -> &'static str {
        match self {
            ContractCall::WriteChunk { .. } => "writeChunk(bytes,uint256,bytes)",
            ContractCall::WriteChunks { .. } => "writeChunks(bytes,uint256[],bytes32[],uint256[])",
            ContractCall::Remove { .. } => "remove(bytes)",
            ContractCall::CountChunks { .. } => "countChunks(bytes)",
            ContractCall::GetChunkHash { .. } => "getChunkHash(bytes,uint256)",
            ContractCall::UpfrontPayment => "upfrontPayment()",
        }
    }

    /// ABI-encoded call data.
    pub fn encode(&self) -> Vec<u8> {
        let args = match self {
            ContractCall::WriteChunk {
                name,
                chunk_id,
                data,
            } => vec![
                Token::Bytes(name.clone()),
                Token::Uint(u128::from(*chunk_id)),
                Token::Bytes(data.clone()),
            ],
            ContractCall::WriteChunks {
                name,
                chunk_ids,
                chunk_hashes,
                sizes,
            } => vec![
                Token::Bytes(name.clone()),
                Token::Array(chunk_ids.iter().map(|i| Token::Uint(u128::from(*i))).collect()),
                Token::Array(chunk_hashes.iter().map(|h| Token::FixedBytes(*h)).collect()),
                Token::Array(sizes.iter().map(|s| Token::Uint(u128::from(*s))).collect()),
            ],
            ContractCall::Remove { name } | ContractCall::CountChunks { name } => {
                vec![Token::Bytes(name.clone())]
            }
            ContractCall::GetChunkHash { name, chunk_id } => vec![
                Token::Bytes(name.clone()),
                Token::Uint(u128::from(*chunk_id)),
            ],
            ContractCall::UpfrontPayment => Vec::new(),
        };
        encode_call(self.signature(), &args)
    }

    /// True for calls that mutate contract state and need a transaction.
    pub fn is_write(&self) -> bool {
        matches!(
            self,
            ContractCall::WriteChunk { .. }
                | ContractCall::WriteChunks { .. }
                | ContractCall::Remove { .. }
        )
    }
}

/// A transaction ready to be signed by the account wallet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxRequest {
    pub to: Address,
    pub nonce: u64,
    pub gas_limit: u64,
    /// Attached value in wei.
    pub value: u128,
    pub call: ContractCall,
}

impl TxRequest {
    pub fn call_data(&self) -> Vec<u8> {
        self.call.encode()
    }
}

/// A mined transaction receipt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    pub tx_hash: H256,
    /// Block the transaction was included in; `None` while pending.
    pub block_number: Option<u64>,
    /// Execution status (`true` = success, `false` = reverted).
    pub status: bool,
}

impl Receipt {
    pub fn is_mined(&self) -> bool {
        self.block_number.is_some()
    }
}

/// EIP-1559 fee parameters reported by the node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeData {
    pub max_fee_per_gas: u128,
    pub max_priority_fee_per_gas: u128,
}
