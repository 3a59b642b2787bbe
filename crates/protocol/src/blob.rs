//! EIP-4844 blob layout.
//!
//! A blob is 4096 field elements of 32 bytes. Each field element must stay
//! below the BLS modulus, so only the low 31 bytes carry data and the
//! leading byte is always zero.

use crate::ProtocolError;

/// Field elements per blob.
pub const FIELD_ELEMENTS_PER_BLOB: usize = 4096;

/// Encoded size of one field element.
pub const BYTES_PER_FIELD_ELEMENT: usize = 32;

/// Payload bytes carried by one field element.
pub const USABLE_BYTES_PER_FIELD_ELEMENT: usize = 31;

/// Encoded blob size (128 KiB).
pub const BLOB_SIZE: usize = FIELD_ELEMENTS_PER_BLOB * BYTES_PER_FIELD_ELEMENT;

/// Payload capacity of one blob (4096 × 31 bytes).
pub const BLOB_DATA_SIZE: usize = FIELD_ELEMENTS_PER_BLOB * USABLE_BYTES_PER_FIELD_ELEMENT;

/// Number of blobs needed to carry `len` payload bytes (at least one).
pub fn blob_count(len: usize) -> usize {
    len.div_ceil(BLOB_DATA_SIZE).max(1)
}

/// Encodes up to [`BLOB_DATA_SIZE`] bytes into a single zero-padded blob.
pub fn encode_blob(data: &[u8]) -> Result<Vec<u8>, ProtocolError> {
    if data.len() > BLOB_DATA_SIZE {
        return Err(ProtocolError::BlobTooLarge {
            len: data.len(),
            max: BLOB_DATA_SIZE,
        });
    }

    Ok(pack(data))
}

/// Encodes an arbitrary payload into as many blobs as it needs.
pub fn encode_blobs(data: &[u8]) -> Vec<Vec<u8>> {
    if data.is_empty() {
        return vec![vec![0u8; BLOB_SIZE]];
    }
    data.chunks(BLOB_DATA_SIZE).map(pack).collect()
}

// Caller guarantees `data.len() <= BLOB_DATA_SIZE`.
fn pack(data: &[u8]) -> Vec<u8> {
    let mut blob = vec![0u8; BLOB_SIZE];
    for (i, piece) in data.chunks(USABLE_BYTES_PER_FIELD_ELEMENT).enumerate() {
        let start = i * BYTES_PER_FIELD_ELEMENT + 1;
        blob[start..start + piece.len()].copy_from_slice(piece);
    }
    blob
}
