//! Chunked upload of local videos to the remote store.
//!
//! An upload registers the video's metadata, then sends its chunks one at a
//! time in ascending order, reporting progress after each acknowledged chunk.
//! A failed or cancelled upload can be retried; retries start over from
//! chunk 0.

pub mod pipeline;
pub mod source;

use std::fmt;

pub use pipeline::ChunkedUploader;
pub use source::{LocalFileSource, MemorySource, UploadSource};

use crate::remote::RemoteError;
use crate::video::{ChunkLayout, ChunkNumber, VideoId, VideoMetadata, round_percentage};
use crate::{NOT_AUTHENTICATED_MESSAGE, UPLOAD_CANCELLED_MESSAGE, UPLOAD_FAILED_MESSAGE};

/// Errors that can occur during an upload attempt.
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("No active remote session")]
    NotAuthenticated,

    #[error("Invalid upload request: {reason}")]
    InvalidRequest { reason: String },

    #[error("Metadata registration failed: {source}")]
    MetadataRegistration { source: RemoteError },

    #[error("Chunk {chunk} transmission failed: {source}")]
    ChunkTransmission {
        chunk: ChunkNumber,
        source: RemoteError,
    },

    #[error("Failed to read chunk {chunk} from source: {source}")]
    SourceRead {
        chunk: ChunkNumber,
        source: std::io::Error,
    },

    #[error("Upload cancelled by user")]
    Cancelled,

    #[error("No previous upload to retry")]
    NothingToRetry,
}

impl UploadError {
    /// Coarse message shown to the end user.
    pub fn user_message(&self) -> &'static str {
        match self {
            UploadError::NotAuthenticated => NOT_AUTHENTICATED_MESSAGE,
            UploadError::Cancelled => UPLOAD_CANCELLED_MESSAGE,
            _ => UPLOAD_FAILED_MESSAGE,
        }
    }
}

/// Caller-supplied fields of a new video.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadRequest {
    pub id: VideoId,
    pub title: String,
    pub description: String,
    pub duration_seconds: u64,
    pub resolution: String,
}

impl UploadRequest {
    /// Checks the required fields; only the description may be empty.
    ///
    /// # Errors
    ///
    /// - `UploadError::InvalidRequest` - If id, title or resolution is blank
    pub fn validate(&self) -> Result<(), UploadError> {
        let missing = if self.id.is_empty() {
            Some("id")
        } else if self.title.trim().is_empty() {
            Some("title")
        } else if self.resolution.trim().is_empty() {
            Some("resolution")
        } else {
            None
        };

        match missing {
            Some(field) => Err(UploadError::InvalidRequest {
                reason: format!("{field} must not be empty"),
            }),
            None => Ok(()),
        }
    }

    /// Builds the metadata record registered ahead of the chunks.
    pub fn to_metadata(&self, layout: &ChunkLayout, upload_timestamp: u64) -> VideoMetadata {
        VideoMetadata {
            id: self.id.clone(),
            title: self.title.clone(),
            description: self.description.clone(),
            upload_timestamp,
            resolution: self.resolution.clone(),
            duration_seconds: self.duration_seconds,
            total_chunks: layout.total_chunks(),
            chunk_size: layout.chunk_size(),
        }
    }
}

/// Progress of an in-flight upload, refreshed after every chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadProgress {
    pub uploaded_bytes: u64,
    pub total_bytes: u64,
    /// 0..=100, rounded
    pub percentage: u8,
    /// 1-indexed chunk just acknowledged
    pub current_chunk: u64,
    pub total_chunks: u64,
}

impl UploadProgress {
    /// Progress once `chunk`, ending at byte `end_offset`, is acknowledged.
    pub fn after_chunk(layout: &ChunkLayout, chunk: ChunkNumber, end_offset: u64) -> Self {
        Self {
            uploaded_bytes: end_offset,
            total_bytes: layout.total_bytes(),
            percentage: round_percentage(end_offset, layout.total_bytes()),
            current_chunk: chunk.as_u64() + 1,
            total_chunks: layout.total_chunks(),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.uploaded_bytes >= self.total_bytes
    }
}

/// Observable lifecycle of a [`ChunkedUploader`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum UploadState {
    #[default]
    Idle,
    Uploading,
    Completed,
    Cancelled,
    /// Holds the user-facing message; details go to the log
    Failed { reason: String },
}

impl fmt::Display for UploadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UploadState::Idle => write!(f, "idle"),
            UploadState::Uploading => write!(f, "uploading"),
            UploadState::Completed => write!(f, "completed"),
            UploadState::Cancelled => write!(f, "cancelled"),
            UploadState::Failed { reason } => write!(f, "failed: {reason}"),
        }
    }
}
