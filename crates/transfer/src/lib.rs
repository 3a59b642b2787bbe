//! Even-split file chunking.
//!
//! A file that fits the active encoding's capacity is sent as one chunk.
//! Larger files are cut into `ceil(size / capacity)` slices of equal
//! length `ceil(size / count)`, the last slice taking whatever remains.
//! Fee formulas downstream use the post-split slice size, never the
//! capacity constant.

mod chunked;

pub use chunked::{ChunkPlan, ChunkSlice, EvenChunks, read_content, split_even};

/// Errors produced by the transfer crate.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("chunk capacity must be greater than zero")]
    ZeroCapacity,

    #[error("content length {actual} does not match planned size {planned}")]
    SizeMismatch { planned: usize, actual: usize },
}
