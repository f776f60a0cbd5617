//! Integrity checks applied to every range read before its chunks are used.

use bytes::Bytes;

use crate::video::{ChunkNumber, StreamChunk};

/// Reasons a batch of chunks is refused.
///
/// Kept for diagnostics only; every variant surfaces to the user as the same
/// load failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChunkValidationError {
    #[error("invalid range {start}..={end}")]
    InvalidRange { start: ChunkNumber, end: ChunkNumber },

    #[error("expected {expected} chunks, received {actual}")]
    CountMismatch { expected: u64, actual: usize },

    #[error("expected chunk {expected} at position {position}, found {found}")]
    OutOfSequence {
        position: usize,
        expected: ChunkNumber,
        found: ChunkNumber,
    },

    #[error("chunk {chunk} has an empty payload")]
    EmptyPayload { chunk: ChunkNumber },

    #[error("chunk {chunk} declares {declared} bytes but carries {actual}")]
    DeclaredSizeMismatch {
        chunk: ChunkNumber,
        declared: u64,
        actual: usize,
    },
}

/// Orders a range read and checks it is exactly `start..=end`.
///
/// Chunks may arrive in any order. After sorting, the batch must hold one
/// chunk per number in the range with no gaps, duplicates or strays, and every
/// payload must be non-empty and match its declared size. Returns the payloads
/// in chunk order; any violation rejects the whole batch.
///
/// # Errors
///
/// - `ChunkValidationError::InvalidRange` - If `start > end` or the range
///   spans more chunks than a `u64` can count
/// - `ChunkValidationError::CountMismatch` - Missing or extra chunks
/// - `ChunkValidationError::OutOfSequence` - Gap, duplicate or out-of-range number
/// - `ChunkValidationError::EmptyPayload` - A chunk carries no bytes
/// - `ChunkValidationError::DeclaredSizeMismatch` - Declared size differs from payload
pub fn validate_chunk_batch(
    mut chunks: Vec<StreamChunk>,
    start: ChunkNumber,
    end: ChunkNumber,
) -> Result<Vec<Bytes>, ChunkValidationError> {
    if start > end {
        return Err(ChunkValidationError::InvalidRange { start, end });
    }

    let expected = (end.as_u64() - start.as_u64())
        .checked_add(1)
        .ok_or(ChunkValidationError::InvalidRange { start, end })?;

    chunks.sort_by_key(|chunk| chunk.chunk_number);

    if chunks.len() as u64 != expected {
        return Err(ChunkValidationError::CountMismatch {
            expected,
            actual: chunks.len(),
        });
    }

    for (position, chunk) in chunks.iter().enumerate() {
        let expected = ChunkNumber::new(start.as_u64() + position as u64);
        if chunk.chunk_number != expected {
            return Err(ChunkValidationError::OutOfSequence {
                position,
                expected,
                found: chunk.chunk_number,
            });
        }
        if chunk.data.is_empty() {
            return Err(ChunkValidationError::EmptyPayload {
                chunk: chunk.chunk_number,
            });
        }
        if !chunk.is_consistent() {
            return Err(ChunkValidationError::DeclaredSizeMismatch {
                chunk: chunk.chunk_number,
                declared: chunk.size,
                actual: chunk.data.len(),
            });
        }
    }

    Ok(chunks.into_iter().map(|chunk| chunk.data).collect())
}
