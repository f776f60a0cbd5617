//! Sequential chunk upload with progress, cancellation and retry.

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use super::{UploadError, UploadProgress, UploadRequest, UploadSource, UploadState};
use crate::cancellation::CancellationFlag;
use crate::config::UploadConfig;
use crate::remote::RemoteSession;
use crate::video::{ChunkLayout, VideoMetadata};

/// Source and request of the most recent attempt, replayed by `retry`.
#[derive(Clone)]
struct UploadAttempt {
    source: Arc<dyn UploadSource>,
    request: UploadRequest,
}

/// Uploads one video at a time to the remote store.
///
/// Metadata registration always completes before chunk 0 is sent, and chunks
/// go out strictly in ascending order with at most one call in flight. Chunks
/// already acknowledged are never rolled back; a retry re-sends everything.
pub struct ChunkedUploader {
    session: Option<RemoteSession>,
    config: UploadConfig,
    cancellation: CancellationFlag,
    last_attempt: Option<UploadAttempt>,
    state: UploadState,
    progress: Option<UploadProgress>,
}

impl ChunkedUploader {
    /// Creates an uploader. `None` models a signed-out client.
    pub fn new(session: Option<RemoteSession>, config: UploadConfig) -> Self {
        Self {
            session,
            config,
            cancellation: CancellationFlag::new(),
            last_attempt: None,
            state: UploadState::Idle,
            progress: None,
        }
    }

    /// Handle that cancels the running upload from outside the call.
    pub fn cancellation_flag(&self) -> CancellationFlag {
        self.cancellation.clone()
    }

    /// Stops the upload before its next chunk is sent.
    pub fn cancel(&self) {
        self.cancellation.cancel();
    }

    pub fn state(&self) -> &UploadState {
        &self.state
    }

    /// Progress of the running upload; cleared once it ends.
    pub fn progress(&self) -> Option<&UploadProgress> {
        self.progress.as_ref()
    }

    /// User-facing message of the last failed or cancelled attempt.
    pub fn error_message(&self) -> Option<&str> {
        match &self.state {
            UploadState::Failed { reason } => Some(reason),
            UploadState::Cancelled => Some(crate::UPLOAD_CANCELLED_MESSAGE),
            _ => None,
        }
    }

    /// Uploads `source` as the video described by `request`.
    ///
    /// `on_progress` runs after every acknowledged chunk; its percentages are
    /// non-decreasing and reach 100 on success. Returns the registered
    /// metadata.
    ///
    /// # Errors
    ///
    /// - `UploadError::NotAuthenticated` - No session; nothing is sent
    /// - `UploadError::InvalidRequest` - Blank required field or empty source
    /// - `UploadError::MetadataRegistration` - No chunk was sent
    /// - `UploadError::ChunkTransmission` - Remaining chunks were skipped
    /// - `UploadError::SourceRead` - The local source could not be read
    /// - `UploadError::Cancelled` - The cancellation flag was observed
    pub async fn upload<F>(
        &mut self,
        source: Arc<dyn UploadSource>,
        request: UploadRequest,
        on_progress: F,
    ) -> Result<VideoMetadata, UploadError>
    where
        F: FnMut(&UploadProgress),
    {
        let Some(session) = self.session.clone() else {
            warn!(video_id = %request.id, "Upload attempted without a session");
            self.state = UploadState::Failed {
                reason: crate::NOT_AUTHENTICATED_MESSAGE.to_string(),
            };
            return Err(UploadError::NotAuthenticated);
        };

        let attempt = UploadAttempt { source, request };
        self.last_attempt = Some(attempt.clone());
        self.cancellation.reset();

        let result = self.run(&session, attempt, on_progress).await;
        self.finish(result)
    }

    /// Replays the last attempt from chunk 0 with the same source and request.
    ///
    /// # Errors
    ///
    /// - `UploadError::NothingToRetry` - No attempt has been made yet
    /// - Any error of [`ChunkedUploader::upload`]
    pub async fn retry<F>(&mut self, on_progress: F) -> Result<VideoMetadata, UploadError>
    where
        F: FnMut(&UploadProgress),
    {
        let Some(attempt) = self.last_attempt.clone() else {
            return Err(UploadError::NothingToRetry);
        };
        info!(video_id = %attempt.request.id, "Retrying upload from the first chunk");
        self.upload(attempt.source, attempt.request, on_progress).await
    }

    async fn run<F>(
        &mut self,
        session: &RemoteSession,
        attempt: UploadAttempt,
        mut on_progress: F,
    ) -> Result<VideoMetadata, UploadError>
    where
        F: FnMut(&UploadProgress),
    {
        let UploadAttempt { source, request } = attempt;
        request.validate()?;

        if source.is_empty() {
            return Err(UploadError::InvalidRequest {
                reason: "source file is empty".to_string(),
            });
        }
        let layout = ChunkLayout::new(source.len(), self.config.chunk_size).ok_or_else(|| {
            UploadError::InvalidRequest {
                reason: "chunk size must be positive".to_string(),
            }
        })?;

        self.state = UploadState::Uploading;
        self.progress = None;

        let timestamp = chrono::Utc::now().timestamp_millis().max(0) as u64;
        let metadata = request.to_metadata(&layout, timestamp);
        let store = session.store();

        info!(
            video_id = %metadata.id,
            principal = session.principal(),
            total_bytes = layout.total_bytes(),
            total_chunks = metadata.total_chunks,
            chunk_size = metadata.chunk_size,
            "Registering video metadata"
        );
        store
            .register_video_metadata(&metadata)
            .await
            .map_err(|source| UploadError::MetadataRegistration { source })?;

        for (chunk, range) in layout.chunks() {
            if self.cancellation.is_cancelled() {
                return Err(UploadError::Cancelled);
            }

            let payload = source
                .read_range(range.clone())
                .await
                .map_err(|source| UploadError::SourceRead { chunk, source })?;
            let declared_size = payload.len() as u64;

            store
                .upload_chunk(&metadata.id, chunk, payload, declared_size)
                .await
                .map_err(|source| UploadError::ChunkTransmission { chunk, source })?;

            let progress = UploadProgress::after_chunk(&layout, chunk, range.end);
            debug!(
                video_id = %metadata.id,
                %chunk,
                bytes = declared_size,
                percentage = progress.percentage,
                "Chunk acknowledged"
            );
            self.progress = Some(progress);
            on_progress(&progress);
        }

        Ok(metadata)
    }

    fn finish(
        &mut self,
        result: Result<VideoMetadata, UploadError>,
    ) -> Result<VideoMetadata, UploadError> {
        self.progress = None;
        match &result {
            Ok(metadata) => {
                info!(video_id = %metadata.id, total_chunks = metadata.total_chunks, "Upload complete");
                self.state = UploadState::Completed;
            }
            Err(UploadError::Cancelled) => {
                warn!("Upload cancelled by user; acknowledged chunks remain on the remote store");
                self.state = UploadState::Cancelled;
            }
            Err(e) => {
                error!(error = %e, "Upload failed");
                self.state = UploadState::Failed {
                    reason: e.user_message().to_string(),
                };
            }
        }
        result
    }
}
