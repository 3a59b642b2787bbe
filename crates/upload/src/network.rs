//! Resolved network parameters.
//!
//! The name resolver hands the engine a [`NetworkProfile`]; the engine only
//! reads the capacity, fee and concurrency rules from it. The constructors
//! below carry the constants of the networks the tool is known to run on.

use std::fmt;

use serde::{Deserialize, Serialize};
use w3deploy_protocol::{Address, BLOB_DATA_SIZE};

pub const GALILEO_CHAIN_ID: u64 = 3334;
pub const ARBITRUM_NOVA_CHAIN_ID: u64 = 42170;
pub const BLOB_DEVNET_CHAIN_ID: u64 = 7_011_893_062;

/// Wei per whole native unit.
pub const WEI_PER_UNIT: u128 = 1_000_000_000_000_000_000;

/// Default number of files uploaded concurrently.
pub const DEFAULT_CONCURRENCY: usize = 15;

/// How chunk payloads travel to the contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EncodingMode {
    /// Payload embedded in call data.
    Inline,
    /// Payload in EIP-4844 blobs; call data carries hashes and sizes.
    Sidecar,
}

impl fmt::Display for EncodingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EncodingMode::Inline => f.write_str("calldata"),
            EncodingMode::Sidecar => f.write_str("blob"),
        }
    }
}

/// Per-chunk stake required by networks that charge for large inline writes.
///
/// `overhead` and `unit` are protocol constants; their origin is not
/// documented and they are kept numerically as-is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakeFee {
    /// Chunks at or below this many bytes are free.
    pub threshold: u64,
    pub overhead: u64,
    pub unit: u64,
}

impl StakeFee {
    pub const GALILEO: StakeFee = StakeFee {
        threshold: 24 * 1024 - 326,
        overhead: 326,
        unit: 24 * 1024,
    };

    /// Whole native units owed per chunk when a `file_size` byte file is
    /// split into `chunk_count` chunks.
    ///
    /// The per-chunk size is the exact average `file_size / chunk_count`;
    /// the fee is `floor((avg + overhead) / unit)`, computed without
    /// floating point.
    pub fn units_per_chunk(&self, file_size: usize, chunk_count: usize) -> u128 {
        let size = file_size as u128;
        let count = chunk_count.max(1) as u128;
        if size <= u128::from(self.threshold) * count {
            return 0;
        }
        (size + u128::from(self.overhead) * count) / (u128::from(self.unit) * count)
    }

    /// Same as [`units_per_chunk`](Self::units_per_chunk), in wei.
    pub fn wei_per_chunk(&self, file_size: usize, chunk_count: usize) -> u128 {
        self.units_per_chunk(file_size, chunk_count) * WEI_PER_UNIT
    }
}

/// Inline encoding limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InlineLimits {
    /// Max chunk payload in bytes.
    pub capacity: usize,
    #[serde(default)]
    pub stake_fee: Option<StakeFee>,
}

impl InlineLimits {
    /// High-capacity chains: 475 KiB per chunk plus stake.
    pub const GALILEO: InlineLimits = InlineLimits {
        capacity: 475 * 1024,
        stake_fee: Some(StakeFee::GALILEO),
    };

    /// Ordinary EVM chains: 24 KiB contract code limit minus call overhead.
    pub const EVM: InlineLimits = InlineLimits {
        capacity: 24 * 1024 - 326,
        stake_fee: None,
    };
}

/// Blob sidecar limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SidecarLimits {
    /// Payload bytes per blob; each chunk occupies one blob.
    pub blob_data_size: usize,
    /// Max blobs (chunks) grouped into one transaction.
    pub max_blobs_per_tx: usize,
}

impl Default for SidecarLimits {
    fn default() -> Self {
        Self {
            blob_data_size: BLOB_DATA_SIZE,
            max_blobs_per_tx: 2,
        }
    }
}

/// Everything the engine needs to know about the target network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkProfile {
    pub chain_id: u64,
    pub rpc_url: String,
    pub contract_address: Address,
    #[serde(default = "default_concurrency")]
    pub default_concurrency: usize,
    #[serde(default)]
    pub inline: Option<InlineLimits>,
    #[serde(default)]
    pub sidecar: Option<SidecarLimits>,
}

fn default_concurrency() -> usize {
    DEFAULT_CONCURRENCY
}

impl NetworkProfile {
    /// Any inline-only EVM chain.
    pub fn evm(chain_id: u64, rpc_url: impl Into<String>, contract_address: Address) -> Self {
        let default_concurrency = if chain_id == ARBITRUM_NOVA_CHAIN_ID {
            4
        } else {
            DEFAULT_CONCURRENCY
        };
        Self {
            chain_id,
            rpc_url: rpc_url.into(),
            contract_address,
            default_concurrency,
            inline: Some(InlineLimits::EVM),
            sidecar: None,
        }
    }

    /// Web3Q Galileo: large inline chunks with a stake fee.
    pub fn galileo(rpc_url: impl Into<String>, contract_address: Address) -> Self {
        Self {
            inline: Some(InlineLimits::GALILEO),
            ..Self::evm(GALILEO_CHAIN_ID, rpc_url, contract_address)
        }
    }

    /// Arbitrum Nova: ordinary inline limits, throttled to 4 files.
    pub fn arbitrum_nova(rpc_url: impl Into<String>, contract_address: Address) -> Self {
        Self::evm(ARBITRUM_NOVA_CHAIN_ID, rpc_url, contract_address)
    }

    /// EIP-4844 devnet: blob uploads only, low concurrency.
    pub fn blob_devnet(rpc_url: impl Into<String>, contract_address: Address) -> Self {
        Self {
            chain_id: BLOB_DEVNET_CHAIN_ID,
            rpc_url: rpc_url.into(),
            contract_address,
            default_concurrency: 2,
            inline: None,
            sidecar: Some(SidecarLimits::default()),
        }
    }

    pub fn supports(&self, mode: EncodingMode) -> bool {
        match mode {
            EncodingMode::Inline => self.inline.is_some(),
            EncodingMode::Sidecar => self.sidecar.is_some(),
        }
    }

    /// Preferred mode: blobs where available, otherwise call data.
    pub fn preferred_mode(&self) -> EncodingMode {
        if self.sidecar.is_some() {
            EncodingMode::Sidecar
        } else {
            EncodingMode::Inline
        }
    }
}
