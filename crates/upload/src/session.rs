//! Upload session: the entry point used by the CLI layer.

use std::sync::Arc;

use tokio::sync::OnceCell;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::broadcaster::BlobBroadcaster;
use crate::config::UploadConfig;
use crate::contract::StorageContract;
use crate::error::UploadError;
use crate::network::{EncodingMode, NetworkProfile};
use crate::nonce::NonceSequencer;
use crate::pipeline::FileUploader;
use crate::scheduler::UploadScheduler;
use crate::strategy::EncodingStrategy;
use crate::submitter::TransactionSubmitter;
use crate::types::{FileInfo, SessionReport, UploadResult};

/// One upload session against one contract.
///
/// Holds the only state shared across file tasks: the contract handle
/// and the nonce sequencer. The sequencer is seeded from the account's
/// pending nonce on the first upload or remove, after that call's input
/// has been validated.
pub struct Uploader {
    contract: Arc<dyn StorageContract>,
    strategy: EncodingStrategy,
    profile: NetworkProfile,
    config: UploadConfig,
    cancel: CancellationToken,
    submitter: OnceCell<TransactionSubmitter>,
}

impl Uploader {
    /// Validates the session parameters and picks the encoding strategy.
    ///
    /// Makes no network call: unsupported encodings and bad configuration
    /// are rejected here, the starting nonce is read on first use.
    pub async fn init(
        contract: Arc<dyn StorageContract>,
        profile: NetworkProfile,
        mode: EncodingMode,
        config: UploadConfig,
        broadcaster: Option<Arc<dyn BlobBroadcaster>>,
    ) -> Result<Self, UploadError> {
        config.validate()?;
        if profile.contract_address.is_zero() {
            return Err(UploadError::InvalidInput("contract address is not set".into()));
        }
        let strategy = EncodingStrategy::for_profile(&profile, mode, &config, broadcaster)?;

        Ok(Self {
            contract,
            strategy,
            profile,
            config,
            cancel: CancellationToken::new(),
            submitter: OnceCell::new(),
        })
    }

    /// The session submitter, created with the pending nonce on first use.
    async fn submitter(&self) -> Result<&TransactionSubmitter, UploadError> {
        self.submitter
            .get_or_try_init(|| async {
                let nonces =
                    NonceSequencer::from_contract(self.contract.as_ref(), &self.config.read_retry())
                        .await?;
                info!(
                    chain_id = self.profile.chain_id,
                    contract = %self.profile.contract_address,
                    mode = %self.mode(),
                    nonce = nonces.peek(),
                    concurrency = self.concurrency(),
                    "upload session started"
                );
                Ok::<_, UploadError>(TransactionSubmitter::new(
                    self.contract.clone(),
                    self.strategy.clone(),
                    Arc::new(nonces),
                    &self.config,
                    self.cancel.clone(),
                ))
            })
            .await
    }

    /// Cancels pending receipt waits; in-flight files end as failures.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn mode(&self) -> EncodingMode {
        self.strategy.mode()
    }

    /// File concurrency: the configured override or the network default.
    pub fn concurrency(&self) -> usize {
        self.config
            .concurrency
            .unwrap_or(self.profile.default_concurrency)
            .max(1)
    }

    /// Uploads every file with the session's concurrency.
    pub async fn upload_all(&self, files: Vec<FileInfo>) -> Result<SessionReport, UploadError> {
        self.upload_all_with_limit(files, self.concurrency()).await
    }

    /// Uploads every file, at most `limit` at a time.
    ///
    /// Only invalid input fails the call; per-file failures are listed in
    /// the report.
    pub async fn upload_all_with_limit(
        &self,
        files: Vec<FileInfo>,
        limit: usize,
    ) -> Result<SessionReport, UploadError> {
        validate_files(&files)?;
        let submitter = self.submitter().await?;

        let uploader = FileUploader::new(submitter, self.config.read_retry());
        let uploader = &uploader;
        let scheduler = UploadScheduler::new(limit);
        let file_count = files.len();

        let results = scheduler
            .run(files, move |file| async move { uploader.upload(&file).await })
            .await;
        let report = SessionReport::from_results(&results);

        info!(
            files = file_count,
            succeeded = report.total_file_count,
            chunks = report.total_chunks_written,
            skipped = report.total_chunks_skipped,
            bytes = report.total_bytes,
            cost_wei = %report.total_cost,
            failures = report.failures.len(),
            "upload session finished"
        );
        Ok(report)
    }

    /// Uploads one file.
    pub async fn upload_file(&self, file: &FileInfo) -> Result<UploadResult, UploadError> {
        validate_files(std::slice::from_ref(file))?;
        let submitter = self.submitter().await?;
        Ok(FileUploader::new(submitter, self.config.read_retry())
            .upload(file)
            .await)
    }

    /// Removes every chunk stored under `name`.
    ///
    /// Returns `false` when the remove transaction reverted.
    pub async fn remove_file(&self, name: &str) -> Result<bool, UploadError> {
        if name.is_empty() {
            return Err(UploadError::InvalidInput("file name is empty".into()));
        }
        match self.submitter().await?.remove(name).await {
            Ok(_) => Ok(true),
            Err(UploadError::Reverted { tx_hash }) => {
                warn!(file = name, tx = %tx_hash, "remove reverted");
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }
}

fn validate_files(files: &[FileInfo]) -> Result<(), UploadError> {
    if files.is_empty() {
        return Err(UploadError::InvalidInput("no files to upload".into()));
    }
    for file in files {
        if file.logical_name.is_empty() {
            return Err(UploadError::InvalidInput(format!(
                "{} has an empty file name",
                file.absolute_path.display()
            )));
        }
        if !file.absolute_path.is_file() {
            return Err(UploadError::InvalidInput(format!(
                "{} does not exist",
                file.absolute_path.display()
            )));
        }
    }
    Ok(())
}
