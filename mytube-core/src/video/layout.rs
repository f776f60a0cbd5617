//! Byte layout of a chunked video.
//!
//! Both pipelines derive chunk boundaries from the same two numbers: the total
//! byte length and the chunk size. Every chunk is `chunk_size` bytes except
//! the last, which holds the remainder.

use std::ops::{Range, RangeInclusive};

use super::ChunkNumber;

/// Chunk boundaries for a file of known size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkLayout {
    total_bytes: u64,
    chunk_size: u64,
}

impl ChunkLayout {
    /// Returns `None` when `chunk_size` is zero.
    pub fn new(total_bytes: u64, chunk_size: u64) -> Option<Self> {
        (chunk_size > 0).then_some(Self {
            total_bytes,
            chunk_size,
        })
    }

    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    pub fn chunk_size(&self) -> u64 {
        self.chunk_size
    }

    /// `ceil(total_bytes / chunk_size)`; an empty file has no chunks.
    pub fn total_chunks(&self) -> u64 {
        self.total_bytes.div_ceil(self.chunk_size)
    }

    /// Byte range `[n*C, min((n+1)*C, S))` of a chunk, or `None` past the end.
    pub fn chunk_range(&self, chunk: ChunkNumber) -> Option<Range<u64>> {
        if chunk.as_u64() >= self.total_chunks() {
            return None;
        }
        let start = chunk.as_u64() * self.chunk_size;
        let end = (start + self.chunk_size).min(self.total_bytes);
        Some(start..end)
    }

    pub fn chunk_len(&self, chunk: ChunkNumber) -> Option<u64> {
        self.chunk_range(chunk).map(|range| range.end - range.start)
    }

    /// Iterates every chunk number with its byte range in ascending order.
    pub fn chunks(&self) -> impl Iterator<Item = (ChunkNumber, Range<u64>)> + '_ {
        (0..self.total_chunks()).filter_map(move |n| {
            let chunk = ChunkNumber::new(n);
            self.chunk_range(chunk).map(|range| (chunk, range))
        })
    }
}

/// Acceptable total byte length for a video with the given layout metadata.
///
/// The last chunk holds between 1 and `chunk_size` bytes, so the total lies in
/// `((n - 1) * C, n * C]`. Zero chunks means zero bytes.
pub fn expected_size_bounds(total_chunks: u64, chunk_size: u64) -> RangeInclusive<u64> {
    if total_chunks == 0 {
        return 0..=0;
    }
    let full = (total_chunks - 1).saturating_mul(chunk_size);
    full.saturating_add(1)..=total_chunks.saturating_mul(chunk_size)
}

/// `round(done / total * 100)` with halves rounded up, clamped to 0..=100.
///
/// A zero total counts as complete.
pub fn round_percentage(done: u64, total: u64) -> u8 {
    if total == 0 {
        return 100;
    }
    let done = done.min(total) as u128;
    let total = total as u128;
    ((done * 200 + total) / (total * 2)) as u8
}
