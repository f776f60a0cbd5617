//! Playback streaming source.
//!
//! Reassembles a remotely stored video from its chunks: batches are read in
//! ascending order, each batch is sorted and validated, and the concatenated
//! buffer is exposed through a session-local blob URL that the caller must
//! release.

pub mod blob;
pub mod source;
pub mod validation;

pub use blob::{BlobRegistry, BlobUrl, MediaBlob, ScopedBlobUrl};
pub use source::VideoStreamSource;
pub use validation::{ChunkValidationError, validate_chunk_batch};

use crate::LOAD_FAILED_MESSAGE;
use crate::remote::RemoteError;
use crate::video::ChunkNumber;

/// Errors that can occur while assembling a video for playback.
#[derive(Debug, thiserror::Error)]
pub enum StreamingError {
    #[error("Range read {start}..={end} failed: {reason}")]
    RangeRead {
        start: ChunkNumber,
        end: ChunkNumber,
        reason: String,
    },

    #[error("Remote call failed: {source}")]
    Remote {
        #[from]
        source: RemoteError,
    },

    #[error("Chunk batch {start}..={end} rejected: {source}")]
    Validation {
        start: ChunkNumber,
        end: ChunkNumber,
        source: ChunkValidationError,
    },

    #[error("Assembled {actual} bytes, expected between {min} and {max}")]
    SizeMismatch { actual: u64, min: u64, max: u64 },

    #[error("Video metadata declares no chunks")]
    EmptyVideo,

    #[error("Playback assembly cancelled")]
    Cancelled,
}

impl StreamingError {
    /// Coarse message shown to the end user.
    ///
    /// Remote errors and client-side integrity failures look the same from
    /// the viewer's side, so every variant maps to one message.
    pub fn user_message(&self) -> &'static str {
        LOAD_FAILED_MESSAGE
    }
}
