//! Upload engine configuration.
//!
//! Stored as TOML; every field has a default so an empty document is a
//! valid configuration.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::UploadError;
use crate::retry::RetryPolicy;

/// Tunables for one upload session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    /// Overrides the network's default file concurrency.
    pub concurrency: Option<usize>,

    /// Attempts per retried call (initial try included).
    pub retry_attempts: u32,

    /// Delay before re-reading chunk hashes / counts / payments.
    pub read_retry_delay_secs: u64,

    /// Delay before re-estimating gas.
    pub gas_retry_delay_secs: u64,

    /// Delay before re-broadcasting a chunk write.
    pub broadcast_retry_delay_secs: u64,

    /// Delay before re-broadcasting a remove.
    pub remove_retry_delay_secs: u64,

    /// Interval between receipt polls.
    pub receipt_poll_interval_secs: u64,

    /// Give up waiting for a receipt after this long; 0 waits forever.
    pub confirmation_timeout_secs: u64,

    /// Gas limit = estimate × numerator / denominator.
    pub gas_limit_numerator: u64,
    pub gas_limit_denominator: u64,

    /// Blob gas fee cap passed to the blob broadcaster.
    pub max_fee_per_blob_gas: u64,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            concurrency: None,
            retry_attempts: 2,
            read_retry_delay_secs: 3,
            gas_retry_delay_secs: 3,
            broadcast_retry_delay_secs: 5,
            remove_retry_delay_secs: 3,
            receipt_poll_interval_secs: 5,
            confirmation_timeout_secs: 600,
            gas_limit_numerator: 6,
            gas_limit_denominator: 5,
            max_fee_per_blob_gas: 300_000_000,
        }
    }
}

impl UploadConfig {
    /// Parses a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self, UploadError> {
        let config: UploadConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads a TOML file.
    pub fn load(path: &Path) -> Result<Self, UploadError> {
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&content)?;
        tracing::debug!(path = %path.display(), "upload configuration loaded");
        Ok(config)
    }

    /// Rejects values that would stall or break the engine.
    pub fn validate(&self) -> Result<(), UploadError> {
        if self.concurrency == Some(0) {
            return Err(UploadError::InvalidInput("concurrency must be at least 1".into()));
        }
        if self.retry_attempts == 0 {
            return Err(UploadError::InvalidInput(
                "retry_attempts must be at least 1".into(),
            ));
        }
        if self.gas_limit_denominator == 0 || self.gas_limit_numerator == 0 {
            return Err(UploadError::InvalidInput(
                "gas limit multiplier must be non-zero".into(),
            ));
        }
        if self.receipt_poll_interval_secs == 0 {
            return Err(UploadError::InvalidInput(
                "receipt_poll_interval_secs must be at least 1".into(),
            ));
        }
        Ok(())
    }

    pub fn read_retry(&self) -> RetryPolicy {
        RetryPolicy::new(self.retry_attempts, Duration::from_secs(self.read_retry_delay_secs))
    }

    pub fn gas_retry(&self) -> RetryPolicy {
        RetryPolicy::new(self.retry_attempts, Duration::from_secs(self.gas_retry_delay_secs))
    }

    pub fn broadcast_retry(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.retry_attempts,
            Duration::from_secs(self.broadcast_retry_delay_secs),
        )
    }

    pub fn remove_retry(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.retry_attempts,
            Duration::from_secs(self.remove_retry_delay_secs),
        )
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.receipt_poll_interval_secs)
    }

    pub fn confirmation_timeout(&self) -> Option<Duration> {
        (self.confirmation_timeout_secs > 0)
            .then(|| Duration::from_secs(self.confirmation_timeout_secs))
    }

    /// Applies the safety margin to a gas estimate.
    pub fn gas_limit(&self, estimate: u64) -> u64 {
        let limit = u128::from(estimate) * u128::from(self.gas_limit_numerator)
            / u128::from(self.gas_limit_denominator);
        u64::try_from(limit).unwrap_or(u64::MAX)
    }
}
