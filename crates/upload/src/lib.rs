//! Upload engine for contract-backed file storage.
//!
//! This crate implements the **business logic** of writing local files
//! into a storage contract. It has no node-client or wallet dependency:
//! the CLI layer provides a [`StorageContract`] implementation (and, for
//! blob networks, a [`BlobBroadcaster`]) that bridges to the actual chain.
//!
//! # Pipeline
//!
//! 1. **Scan**: recursively walk the upload root
//! 2. **Init**: pick the encoding strategy; the starting nonce is read on
//!    first use
//! 3. **Reconcile**: remove files whose chunk count shrank
//! 4. **Diff**: skip chunks whose stored hash already matches
//! 5. **Submit**: estimate, sign, broadcast and confirm each write
//! 6. **Report**: merge per-file results into a session report

pub mod broadcaster;
pub mod config;
pub mod contract;
pub mod differ;
pub mod error;
pub mod network;
pub mod nonce;
pub mod pipeline;
pub mod reconcile;
pub mod retry;
pub mod scanner;
pub mod scheduler;
pub mod session;
pub mod strategy;
pub mod submitter;
pub mod types;

#[cfg(test)]
mod mock;

// Re-export primary types for convenience.
pub use broadcaster::{BlobBroadcaster, BlobTxRequest, BlobUtilsBroadcaster, parse_private_key};
pub use config::UploadConfig;
pub use contract::{ContractFuture, StorageContract};
pub use differ::{ChunkDecision, ChunkDiffer};
pub use error::UploadError;
pub use network::{EncodingMode, InlineLimits, NetworkProfile, SidecarLimits, StakeFee};
pub use nonce::NonceSequencer;
pub use reconcile::{ReconcileState, Reconciler};
pub use retry::{ReceiptPoll, RetryPolicy};
pub use scanner::scan_files;
pub use scheduler::UploadScheduler;
pub use session::Uploader;
pub use strategy::EncodingStrategy;
pub use submitter::TransactionSubmitter;
pub use types::{FailureEntry, FileInfo, SessionReport, UploadResult};
