//! Video identity, metadata and chunk types shared by both pipelines.

pub mod layout;
pub mod resolution;

use std::fmt;

use bytes::Bytes;
use rand::Rng;
use serde::{Deserialize, Serialize};

pub use layout::{ChunkLayout, expected_size_bounds, round_percentage};
pub use resolution::resolution_label;

const ID_SUFFIX_LEN: usize = 9;
const ID_SUFFIX_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Opaque unique identifier for a video.
///
/// Primary key for metadata, chunks and interaction state. Immutable once
/// assigned.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VideoId(String);

impl VideoId {
    /// Wraps an existing identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a fresh identifier from the current time and a random
    /// base36 suffix, e.g. `video_1760000000000_k3x9q0a1b`.
    pub fn generate() -> Self {
        let mut rng = rand::rng();
        let suffix: String = (0..ID_SUFFIX_LEN)
            .map(|_| ID_SUFFIX_ALPHABET[rng.random_range(0..ID_SUFFIX_ALPHABET.len())] as char)
            .collect();
        Self(format!(
            "video_{}_{}",
            chrono::Utc::now().timestamp_millis(),
            suffix
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for VideoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for VideoId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Zero-based position of a chunk within a video.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ChunkNumber(pub u64);

impl ChunkNumber {
    /// Creates ChunkNumber from zero-based index.
    pub fn new(number: u64) -> Self {
        Self(number)
    }

    /// Returns the underlying chunk number.
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ChunkNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Metadata record registered before any chunk of a video is sent.
///
/// `total_chunks` and `chunk_size` together fix the byte layout the streaming
/// source later reconstructs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoMetadata {
    pub id: VideoId,
    pub title: String,
    pub description: String,
    /// Milliseconds since the Unix epoch
    pub upload_timestamp: u64,
    pub resolution: String,
    pub duration_seconds: u64,
    pub total_chunks: u64,
    pub chunk_size: u64,
}

/// One stored byte range of a video.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamChunk {
    pub chunk_number: ChunkNumber,
    pub data: Bytes,
    /// Declared payload length
    pub size: u64,
}

impl StreamChunk {
    /// Creates a chunk whose declared size matches its payload.
    pub fn new(chunk_number: ChunkNumber, data: Bytes) -> Self {
        let size = data.len() as u64;
        Self {
            chunk_number,
            data,
            size,
        }
    }

    /// Whether the declared size equals the payload length.
    pub fn is_consistent(&self) -> bool {
        self.size == self.data.len() as u64
    }
}
