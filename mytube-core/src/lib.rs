//! Mytube Core - Chunked video transfer for the Mytube client
//!
//! This crate provides the building blocks for moving videos between a local
//! device and the remote chunk store: the chunked upload pipeline, the
//! playback streaming source that reassembles chunks into a playable blob,
//! and the shared chunk layout and validation rules both rely on.

pub mod cancellation;
pub mod config;
pub mod remote;
pub mod streaming;
pub mod tracing_setup;
pub mod upload;
pub mod video;

// Re-export main types for convenient access
pub use cancellation::CancellationFlag;
pub use config::MytubeConfig;
pub use remote::{ChunkStore, InMemoryChunkStore, RemoteError, RemoteSession};
pub use streaming::{BlobRegistry, BlobUrl, StreamingError, VideoStreamSource};
pub use upload::{ChunkedUploader, UploadError, UploadProgress, UploadRequest};
pub use video::{ChunkNumber, StreamChunk, VideoId, VideoMetadata};

/// User-facing message for any upload failure that is not a cancellation.
pub const UPLOAD_FAILED_MESSAGE: &str = "Upload failed. Please try again.";
/// User-facing message for a cooperative upload cancellation.
pub const UPLOAD_CANCELLED_MESSAGE: &str = "Upload cancelled by user.";
/// User-facing message when no session exists at upload time.
pub const NOT_AUTHENTICATED_MESSAGE: &str = "Not authenticated. Please sign in to upload videos.";
/// User-facing message for every playback assembly failure.
pub const LOAD_FAILED_MESSAGE: &str = "Failed to load video. Please try again.";

/// Core errors that can bubble up from any Mytube subsystem.
#[derive(Debug, thiserror::Error)]
pub enum MytubeError {
    #[error("Upload error: {0}")]
    Upload(#[from] UploadError),

    #[error("Streaming error: {0}")]
    Streaming(#[from] StreamingError),

    #[error("Remote error: {0}")]
    Remote(#[from] RemoteError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl MytubeError {
    /// Returns a user-friendly error message suitable for display.
    ///
    /// Internal distinctions (which chunk, which validation rule) are
    /// collapsed into one message per operation.
    pub fn user_message(&self) -> String {
        match self {
            MytubeError::Upload(e) => e.user_message().to_string(),
            MytubeError::Streaming(e) => e.user_message().to_string(),
            MytubeError::Remote(_) => "Remote service error occurred".to_string(),
            MytubeError::Io(_) => "File system error occurred".to_string(),
        }
    }

    /// Checks if this error came from the user rather than the system.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            MytubeError::Upload(UploadError::InvalidRequest { .. })
                | MytubeError::Upload(UploadError::Cancelled)
                | MytubeError::Upload(UploadError::NotAuthenticated)
        )
    }
}
