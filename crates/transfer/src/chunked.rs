use std::io::Read;
use std::ops::Range;
use std::path::Path;

use crate::TransferError;

// ---------------------------------------------------------------------------
// ChunkPlan
// ---------------------------------------------------------------------------

/// How a file of a given size is cut for a given capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkPlan {
    /// Total file size in bytes.
    pub file_size: usize,
    /// Capacity threshold of the active encoding.
    pub capacity: usize,
    /// Number of chunks (always at least one).
    pub chunk_count: usize,
    /// Length of every slice except possibly the last.
    pub slice_size: usize,
}

impl ChunkPlan {
    /// Plans the even split of `file_size` bytes under `capacity`.
    pub fn new(file_size: usize, capacity: usize) -> Result<Self, TransferError> {
        if capacity == 0 {
            return Err(TransferError::ZeroCapacity);
        }

        let (chunk_count, slice_size) = if file_size <= capacity {
            (1, file_size)
        } else {
            let count = file_size.div_ceil(capacity);
            (count, file_size.div_ceil(count))
        };

        Ok(Self {
            file_size,
            capacity,
            chunk_count,
            slice_size,
        })
    }

    /// Byte range of chunk `index` within the file.
    ///
    /// Panics if `index >= chunk_count`.
    pub fn range(&self, index: usize) -> Range<usize> {
        assert!(index < self.chunk_count, "chunk index out of range");
        let start = index * self.slice_size;
        let end = (start + self.slice_size).min(self.file_size);
        start..end
    }

    /// True when the file was split at all.
    pub fn is_split(&self) -> bool {
        self.chunk_count > 1
    }
}

// ---------------------------------------------------------------------------
// EvenChunks
// ---------------------------------------------------------------------------

/// One slice of a file's content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkSlice<'a> {
    /// Zero-based position of the chunk; contiguous `0..chunk_count`.
    pub index: usize,
    pub data: &'a [u8],
}

/// Ordered, restartable iterator over the even split of a buffer.
///
/// Call [`EvenChunks::restart`] to iterate again from chunk 0.
#[derive(Debug, Clone)]
pub struct EvenChunks<'a> {
    content: &'a [u8],
    plan: ChunkPlan,
    next: usize,
}

impl<'a> EvenChunks<'a> {
    pub fn plan(&self) -> &ChunkPlan {
        &self.plan
    }

    /// Returns a fresh iterator positioned at chunk 0.
    pub fn restart(&self) -> Self {
        Self {
            content: self.content,
            plan: self.plan,
            next: 0,
        }
    }

    /// Returns chunk `index` without advancing the iterator.
    pub fn get(&self, index: usize) -> Option<ChunkSlice<'a>> {
        (index < self.plan.chunk_count).then(|| ChunkSlice {
            index,
            data: &self.content[self.plan.range(index)],
        })
    }
}

impl<'a> Iterator for EvenChunks<'a> {
    type Item = ChunkSlice<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let slice = self.get(self.next)?;
        self.next += 1;
        Some(slice)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.plan.chunk_count - self.next.min(self.plan.chunk_count);
        (left, Some(left))
    }
}

impl ExactSizeIterator for EvenChunks<'_> {}

/// Splits `content` into its even chunk sequence for `capacity`.
pub fn split_even(content: &[u8], capacity: usize) -> Result<EvenChunks<'_>, TransferError> {
    let plan = ChunkPlan::new(content.len(), capacity)?;
    Ok(EvenChunks {
        content,
        plan,
        next: 0,
    })
}

/// Reads a whole file, checking it still has the size the scanner saw.
pub fn read_content(path: &Path, expected_size: usize) -> Result<Vec<u8>, TransferError> {
    let mut file = std::fs::File::open(path)?;
    let mut buf = Vec::with_capacity(expected_size);
    file.read_to_end(&mut buf)?;
    if buf.len() != expected_size {
        return Err(TransferError::SizeMismatch {
            planned: expected_size,
            actual: buf.len(),
        });
    }
    Ok(buf)
}
