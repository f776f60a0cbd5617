//! Client-side contract against the remote chunk store.
//!
//! The store persists video metadata and chunks. Its storage engine is not
//! modelled here; pipelines only rely on the four calls of [`ChunkStore`].

pub mod memory;

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

pub use memory::{InMemoryChunkStore, RemoteCall};

use crate::video::{ChunkNumber, StreamChunk, VideoId, VideoMetadata};

/// Failures reported by a remote call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RemoteError {
    /// The store received the call and refused it
    #[error("Remote rejected call: {reason}")]
    Rejected { reason: String },

    /// The call never produced a response
    #[error("Remote unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("Video {video_id} not found")]
    VideoNotFound { video_id: VideoId },
}

/// Outcome of a range read.
///
/// The store reports per-video failures in-band rather than as a transport
/// error; both are handled the same way by the streaming source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RangeRead {
    /// Chunks within the requested range, in no particular order
    Chunks(Vec<StreamChunk>),
    /// Store-side failure text
    Error(String),
}

/// Remote chunk-transfer contract consumed by both pipelines.
#[async_trait]
pub trait ChunkStore: Send + Sync {
    /// Creates or overwrites the metadata record keyed by `metadata.id`.
    ///
    /// Safe to repeat when an upload is retried from scratch.
    ///
    /// # Errors
    ///
    /// - `RemoteError::Rejected` - If the store refuses the record
    /// - `RemoteError::Unavailable` - If the call could not complete
    async fn register_video_metadata(&self, metadata: &VideoMetadata) -> Result<(), RemoteError>;

    /// Stores one chunk keyed by `(video_id, chunk_number)`.
    ///
    /// `declared_size` must equal `payload.len()`.
    ///
    /// # Errors
    ///
    /// - `RemoteError::Rejected` - If the chunk is refused
    /// - `RemoteError::Unavailable` - If the call could not complete
    async fn upload_chunk(
        &self,
        video_id: &VideoId,
        chunk_number: ChunkNumber,
        payload: Bytes,
        declared_size: u64,
    ) -> Result<(), RemoteError>;

    /// Returns all stored chunks numbered within `start..=end`.
    ///
    /// # Errors
    ///
    /// - `RemoteError::Unavailable` - If the call could not complete
    async fn read_chunk_range(
        &self,
        video_id: &VideoId,
        start: ChunkNumber,
        end: ChunkNumber,
    ) -> Result<RangeRead, RemoteError>;

    /// Looks up the metadata record for a video.
    ///
    /// # Errors
    ///
    /// - `RemoteError::Unavailable` - If the call could not complete
    async fn video_metadata(&self, video_id: &VideoId)
    -> Result<Option<VideoMetadata>, RemoteError>;
}

/// Active authenticated session with the remote store.
///
/// Holding one is the precondition for uploading.
#[derive(Clone)]
pub struct RemoteSession {
    principal: String,
    store: Arc<dyn ChunkStore>,
}

impl RemoteSession {
    pub fn new(principal: impl Into<String>, store: Arc<dyn ChunkStore>) -> Self {
        Self {
            principal: principal.into(),
            store,
        }
    }

    /// Identity the session was opened for.
    pub fn principal(&self) -> &str {
        &self.principal
    }

    pub fn store(&self) -> &Arc<dyn ChunkStore> {
        &self.store
    }
}

impl std::fmt::Debug for RemoteSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteSession")
            .field("principal", &self.principal)
            .finish_non_exhaustive()
    }
}
