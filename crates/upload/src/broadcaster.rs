//! External blob transaction broadcaster.
//!
//! Blob transactions need KZG commitments and a typed envelope that the
//! account wallet does not build, so sidecar writes are handed to an
//! external signer. [`BlobUtilsBroadcaster`] drives the `blob-utils`
//! command line tool; tests substitute their own [`BlobBroadcaster`].

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;

use tracing::debug;
use w3deploy_protocol::{Address, ContractCall, FeeData, H256};

use crate::error::UploadError;

/// Boxed future returned by [`BlobBroadcaster::broadcast`].
pub type BroadcastFuture<'a> = Pin<Box<dyn Future<Output = Result<H256, UploadError>> + Send + 'a>>;

/// Everything the external signer needs for one blob transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobTxRequest {
    pub chain_id: u64,
    pub rpc_url: String,
    pub nonce: u64,
    pub to: Address,
    /// Attached value in wei (upfront payment × blob count).
    pub value: u128,
    /// Raw chunk bytes, each chunk zero-padded to one blob's data capacity
    /// so the signer packs exactly one chunk per blob.
    pub payload: Vec<u8>,
    pub blob_count: usize,
    pub call: ContractCall,
    pub gas_limit: u64,
    pub fees: FeeData,
    pub max_fee_per_blob_gas: u64,
}

/// Signs and broadcasts blob-carrying transactions.
pub trait BlobBroadcaster: Send + Sync {
    /// Broadcasts `tx` and returns its hash.
    fn broadcast<'a>(&'a self, tx: &'a BlobTxRequest) -> BroadcastFuture<'a>;
}

/// Checks a hex private key (optional `0x`) and returns it without prefix.
pub fn parse_private_key(key: &str) -> Result<String, UploadError> {
    let raw = key.trim();
    let raw = raw
        .strip_prefix("0x")
        .or_else(|| raw.strip_prefix("0X"))
        .unwrap_or(raw);
    let bytes = hex::decode(raw)
        .map_err(|_| UploadError::InvalidInput("private key is not valid hex".into()))?;
    if bytes.len() != 32 {
        return Err(UploadError::InvalidInput(format!(
            "private key must be 32 bytes, got {}",
            bytes.len()
        )));
    }
    Ok(raw.to_ascii_lowercase())
}

/// Runs `blob-utils tx` for every broadcast.
pub struct BlobUtilsBroadcaster {
    program: PathBuf,
    private_key: String,
}

impl BlobUtilsBroadcaster {
    /// Creates a broadcaster signing with `private_key`.
    pub fn new(program: impl Into<PathBuf>, private_key: &str) -> Result<Self, UploadError> {
        Ok(Self {
            program: program.into(),
            private_key: parse_private_key(private_key)?,
        })
    }

    fn command_args(&self, tx: &BlobTxRequest, blob_file: &str) -> Vec<String> {
        vec![
            "tx".into(),
            "--chain-id".into(),
            tx.chain_id.to_string(),
            "--rpc-url".into(),
            tx.rpc_url.clone(),
            "--private-key".into(),
            self.private_key.clone(),
            "--nonce".into(),
            tx.nonce.to_string(),
            "--to".into(),
            tx.to.to_hex(),
            "--value".into(),
            tx.value.to_string(),
            "--blob-file".into(),
            blob_file.to_string(),
            "--calldata".into(),
            format!("0x{}", hex::encode(tx.call.encode())),
            "--gas-limit".into(),
            tx.gas_limit.to_string(),
            "--max-fee-per-gas".into(),
            tx.fees.max_fee_per_gas.to_string(),
            "--priority-gas-price".into(),
            tx.fees.max_priority_fee_per_gas.to_string(),
            "--max-fee-per-data-gas".into(),
            tx.max_fee_per_blob_gas.to_string(),
        ]
    }

    async fn run(&self, tx: &BlobTxRequest) -> Result<H256, UploadError> {
        let blob_file = tempfile::Builder::new()
            .prefix("w3deploy-blob-")
            .tempfile()?;
        tokio::fs::write(blob_file.path(), &tx.payload).await?;
        let blob_path = blob_file.path().to_string_lossy().into_owned();

        debug!(
            nonce = tx.nonce,
            blobs = tx.blob_count,
            program = %self.program.display(),
            "invoking blob broadcaster"
        );

        let output = tokio::process::Command::new(&self.program)
            .args(self.command_args(tx, &blob_path))
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                UploadError::Broadcaster(format!(
                    "failed to run {}: {e}",
                    self.program.display()
                ))
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);

        if !output.status.success() {
            return Err(classify_failure(&stderr));
        }

        parse_tx_hash(&stdout)
            .or_else(|| parse_tx_hash(&stderr))
            .ok_or_else(|| {
                UploadError::Broadcaster(format!(
                    "no transaction hash in output: {}",
                    stdout.trim()
                ))
            })
    }
}

impl BlobBroadcaster for BlobUtilsBroadcaster {
    fn broadcast<'a>(&'a self, tx: &'a BlobTxRequest) -> BroadcastFuture<'a> {
        Box::pin(self.run(tx))
    }
}

/// First `0x`-prefixed 32-byte hex token in `output`.
fn parse_tx_hash(output: &str) -> Option<H256> {
    output
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|token| token.len() == 66 && token.starts_with("0x"))
        .find_map(|token| token.parse().ok())
}

/// Connection trouble is worth one more try; anything else is final.
fn classify_failure(stderr: &str) -> UploadError {
    let message = stderr.trim().to_string();
    let lower = message.to_ascii_lowercase();
    if ["timeout", "timed out", "connection refused", "connection reset"]
        .iter()
        .any(|needle| lower.contains(needle))
    {
        UploadError::TransientRpc(message)
    } else {
        UploadError::Broadcaster(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &str = "0x4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318";

    fn request() -> BlobTxRequest {
        BlobTxRequest {
            chain_id: 7_011_893_062,
            rpc_url: "http://localhost:8545".into(),
            nonce: 12,
            to: Address([0x22; 20]),
            value: 2_000,
            payload: vec![1, 2, 3],
            blob_count: 1,
            call: ContractCall::WriteChunks {
                name: b"a".to_vec(),
                chunk_ids: vec![0],
                chunk_hashes: vec![H256([3; 32])],
                sizes: vec![3],
            },
            gas_limit: 120_000,
            fees: FeeData {
                max_fee_per_gas: 30,
                max_priority_fee_per_gas: 2,
            },
            max_fee_per_blob_gas: 300_000_000,
        }
    }

    #[test]
    fn private_key_validation() {
        assert_eq!(parse_private_key(KEY).unwrap(), &KEY[2..]);
        assert_eq!(parse_private_key(&KEY[2..]).unwrap(), &KEY[2..]);
        assert!(matches!(
            parse_private_key("0x1234"),
            Err(UploadError::InvalidInput(_))
        ));
        assert!(matches!(
            parse_private_key("not a key"),
            Err(UploadError::InvalidInput(_))
        ));
    }

    #[test]
    fn command_line_layout() {
        let broadcaster = BlobUtilsBroadcaster::new("blob-utils", KEY).unwrap();
        let args = broadcaster.command_args(&request(), "/tmp/blob");

        let flag = |name: &str| {
            let pos = args.iter().position(|a| a == name).unwrap();
            args[pos + 1].clone()
        };
        assert_eq!(args[0], "tx");
        assert_eq!(flag("--chain-id"), "7011893062");
        assert_eq!(flag("--nonce"), "12");
        assert_eq!(flag("--to"), format!("0x{}", "22".repeat(20)));
        assert_eq!(flag("--value"), "2000");
        assert_eq!(flag("--blob-file"), "/tmp/blob");
        assert_eq!(flag("--gas-limit"), "120000");
        assert_eq!(flag("--priority-gas-price"), "2");
        assert_eq!(flag("--max-fee-per-data-gas"), "300000000");
        assert!(flag("--calldata").starts_with("0x"));
        assert_eq!(flag("--private-key"), &KEY[2..]);
    }

    #[test]
    fn tx_hash_parsed_from_output() {
        let hash = format!("0x{}", "ab".repeat(32));
        let output = format!("sending blob tx...\nTransaction submitted. hash: {hash}\n");
        assert_eq!(parse_tx_hash(&output), Some(H256([0xab; 32])));

        assert_eq!(parse_tx_hash("to 0x2222222222222222222222222222222222222222"), None);
        assert_eq!(parse_tx_hash(""), None);
    }

    #[test]
    fn failures_classified() {
        assert!(classify_failure("dial tcp: connection refused").is_transient());
        assert!(!classify_failure("insufficient funds for gas").is_transient());
    }

    #[tokio::test]
    async fn missing_program_is_broadcaster_error() {
        let broadcaster =
            BlobUtilsBroadcaster::new("/nonexistent/w3deploy/blob-utils", KEY).unwrap();
        let result = broadcaster.broadcast(&request()).await;
        assert!(matches!(result, Err(UploadError::Broadcaster(_))));
    }
}
