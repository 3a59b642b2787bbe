//! Data types for the upload flow.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// One local file to upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileInfo {
    pub absolute_path: PathBuf,
    /// Name under which the contract stores the file; `/`-separated.
    pub logical_name: String,
    pub size_bytes: u64,
}

/// Outcome of uploading one file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadResult {
    pub file_name: String,
    pub succeeded: bool,
    /// Chunks handed to the submitter (skipped chunks excluded).
    pub chunks_attempted: u64,
    pub chunks_succeeded: u64,
    /// Chunks left untouched because the stored hash matched.
    pub chunks_skipped: u64,
    pub failed_indices: Vec<u64>,
    /// Value attached to confirmed writes, in wei.
    pub cost_paid: u128,
    /// Raw chunk bytes confirmed on-chain.
    pub bytes_uploaded: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl UploadResult {
    pub(crate) fn new(file_name: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            ..Self::default()
        }
    }

    /// A file that failed before any chunk was attempted.
    pub fn failed(file_name: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::new(file_name)
        }
    }
}

/// One line of the failure list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureEntry {
    pub file: String,
    /// `None` for file-level failures (read error, failed remove, panic).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Aggregate of every file result in a session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionReport {
    /// Sum of confirmed write values, in wei.
    pub total_cost: u128,
    /// Files uploaded without failure.
    pub total_file_count: u64,
    pub total_chunks_written: u64,
    pub total_chunks_skipped: u64,
    pub total_bytes: u64,
    pub failures: Vec<FailureEntry>,
}

impl SessionReport {
    /// Sums per-file results.
    pub fn from_results<'a>(results: impl IntoIterator<Item = &'a UploadResult>) -> Self {
        let mut report = SessionReport::default();
        for result in results {
            report.total_cost += result.cost_paid;
            report.total_chunks_written += result.chunks_succeeded;
            report.total_chunks_skipped += result.chunks_skipped;
            report.total_bytes += result.bytes_uploaded;

            if result.succeeded {
                report.total_file_count += 1;
            } else if result.failed_indices.is_empty() {
                report.failures.push(FailureEntry {
                    file: result.file_name.clone(),
                    chunk: None,
                    error: result.error.clone(),
                });
            } else {
                report
                    .failures
                    .extend(result.failed_indices.iter().map(|&index| FailureEntry {
                        file: result.file_name.clone(),
                        chunk: Some(index),
                        error: result.error.clone(),
                    }));
            }
        }
        report
    }

    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }

    /// Human-readable failure list: `<file> Chunk:<i>` or `<file>`.
    pub fn failure_lines(&self) -> Vec<String> {
        self.failures
            .iter()
            .map(|f| match f.chunk {
                Some(index) => format!("{} Chunk:{index}", f.file),
                None => f.file.clone(),
            })
            .collect()
    }
}
