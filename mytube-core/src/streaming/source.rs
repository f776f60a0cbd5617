//! Playback reassembly of a remotely stored video.

use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use tracing::{debug, error, info, warn};

use super::blob::{BlobRegistry, BlobUrl, ScopedBlobUrl};
use super::validation::validate_chunk_batch;
use super::StreamingError;
use crate::cancellation::CancellationFlag;
use crate::config::StreamingConfig;
use crate::remote::{ChunkStore, RangeRead};
use crate::video::{ChunkNumber, VideoId, VideoMetadata, expected_size_bounds, round_percentage};

/// Pulls every chunk of one video and exposes the result as a blob URL.
///
/// The chunk layout always comes from previously fetched metadata; the source
/// never infers it. Batches are fetched one at a time in ascending order.
pub struct VideoStreamSource {
    video_id: VideoId,
    store: Arc<dyn ChunkStore>,
    total_chunks: u64,
    chunk_size: u64,
    registry: BlobRegistry,
    config: StreamingConfig,
}

impl VideoStreamSource {
    pub fn new(
        video_id: VideoId,
        store: Arc<dyn ChunkStore>,
        total_chunks: u64,
        chunk_size: u64,
        registry: BlobRegistry,
    ) -> Self {
        Self {
            video_id,
            store,
            total_chunks,
            chunk_size,
            registry,
            config: StreamingConfig::default(),
        }
    }

    /// Creates a source for the layout recorded in `metadata`.
    pub fn from_metadata(
        metadata: &VideoMetadata,
        store: Arc<dyn ChunkStore>,
        registry: BlobRegistry,
    ) -> Self {
        Self::new(
            metadata.id.clone(),
            store,
            metadata.total_chunks,
            metadata.chunk_size,
            registry,
        )
    }

    pub fn with_config(mut self, config: StreamingConfig) -> Self {
        self.config = config;
        self
    }

    pub fn video_id(&self) -> &VideoId {
        &self.video_id
    }

    pub fn total_chunks(&self) -> u64 {
        self.total_chunks
    }

    pub fn chunk_size(&self) -> u64 {
        self.chunk_size
    }

    /// Fetches chunks `start..=end` with one range read and returns their
    /// payloads in chunk order.
    ///
    /// # Errors
    ///
    /// - `StreamingError::Remote` - The call itself failed
    /// - `StreamingError::RangeRead` - The store answered with an error
    /// - `StreamingError::Validation` - The batch is incomplete, disordered or empty
    pub async fn fetch_chunks(
        &self,
        start: ChunkNumber,
        end: ChunkNumber,
    ) -> Result<Vec<Bytes>, StreamingError> {
        let read = self
            .store
            .read_chunk_range(&self.video_id, start, end)
            .await
            .map_err(|source| {
                error!(video_id = %self.video_id, %start, %end, error = %source, "Range read call failed");
                StreamingError::Remote { source }
            })?;

        let chunks = match read {
            RangeRead::Chunks(chunks) => chunks,
            RangeRead::Error(reason) => {
                error!(video_id = %self.video_id, %start, %end, %reason, "Remote reported range read error");
                return Err(StreamingError::RangeRead { start, end, reason });
            }
        };

        let received = chunks.len();
        let payloads = validate_chunk_batch(chunks, start, end).map_err(|source| {
            error!(
                video_id = %self.video_id,
                %start,
                %end,
                received,
                error = %source,
                "Chunk batch failed validation"
            );
            StreamingError::Validation { start, end, source }
        })?;

        debug!(video_id = %self.video_id, %start, %end, "Fetched chunk batch");
        Ok(payloads)
    }

    /// Assembles the whole video and registers it as a blob URL.
    ///
    /// `on_progress` receives the rounded share of chunks fetched after each
    /// batch; the last call reports 100. No blob is created on failure. The
    /// caller owns the returned URL and must revoke it exactly once.
    ///
    /// # Errors
    ///
    /// - Any error of [`VideoStreamSource::fetch_chunks`]
    /// - `StreamingError::EmptyVideo` - Metadata declares no chunks
    /// - `StreamingError::SizeMismatch` - Assembled length contradicts the layout
    pub async fn create_blob_url<F>(&self, on_progress: F) -> Result<BlobUrl, StreamingError>
    where
        F: FnMut(u8),
    {
        self.create_blob_url_with_cancel(on_progress, &CancellationFlag::new())
            .await
    }

    /// Like [`VideoStreamSource::create_blob_url`], but stops before the next
    /// batch once `cancellation` is set. A batch already in flight completes
    /// and its result is discarded.
    ///
    /// # Errors
    ///
    /// - `StreamingError::Cancelled` - The flag was observed
    /// - Any error of [`VideoStreamSource::create_blob_url`]
    pub async fn create_blob_url_with_cancel<F>(
        &self,
        mut on_progress: F,
        cancellation: &CancellationFlag,
    ) -> Result<BlobUrl, StreamingError>
    where
        F: FnMut(u8),
    {
        if self.total_chunks == 0 {
            error!(video_id = %self.video_id, "Metadata declares no chunks");
            return Err(StreamingError::EmptyVideo);
        }

        let batch_size = self.config.batch_size.max(1);
        // Grows per batch; total_chunks is remote input.
        let mut payloads: Vec<Bytes> = Vec::new();
        let mut batch_start = 0;

        while batch_start < self.total_chunks {
            if cancellation.is_cancelled() {
                warn!(video_id = %self.video_id, fetched = payloads.len(), "Playback assembly abandoned");
                return Err(StreamingError::Cancelled);
            }

            let batch_end = batch_start
                .saturating_add(batch_size - 1)
                .min(self.total_chunks - 1);
            let batch = self
                .fetch_chunks(ChunkNumber::new(batch_start), ChunkNumber::new(batch_end))
                .await?;
            payloads.extend(batch);

            on_progress(round_percentage(payloads.len() as u64, self.total_chunks));
            batch_start = batch_end + 1;
        }

        if cancellation.is_cancelled() {
            warn!(video_id = %self.video_id, "Playback assembly abandoned after final batch");
            return Err(StreamingError::Cancelled);
        }

        let buffer = concatenate(&payloads);
        let bounds = expected_size_bounds(self.total_chunks, self.chunk_size);
        if !bounds.contains(&(buffer.len() as u64)) {
            error!(
                video_id = %self.video_id,
                actual = buffer.len(),
                min = bounds.start(),
                max = bounds.end(),
                "Assembled video size contradicts metadata"
            );
            return Err(StreamingError::SizeMismatch {
                actual: buffer.len() as u64,
                min: *bounds.start(),
                max: *bounds.end(),
            });
        }

        info!(
            video_id = %self.video_id,
            bytes = buffer.len(),
            chunks = self.total_chunks,
            "Video assembled"
        );
        Ok(self.registry.create(buffer, self.config.mime_type.clone()))
    }

    /// Assembles the video into a URL that is revoked when the guard drops.
    ///
    /// # Errors
    ///
    /// - Any error of [`VideoStreamSource::create_blob_url`]
    pub async fn create_scoped_blob_url<F>(
        &self,
        on_progress: F,
    ) -> Result<ScopedBlobUrl, StreamingError>
    where
        F: FnMut(u8),
    {
        let url = self.create_blob_url(on_progress).await?;
        Ok(ScopedBlobUrl::new(self.registry.clone(), url))
    }

    /// Releases a URL created by any source sharing `registry`.
    ///
    /// Returns false when the URL was already released.
    pub fn revoke_blob_url(registry: &BlobRegistry, url: &BlobUrl) -> bool {
        registry.revoke(url)
    }
}

fn concatenate(payloads: &[Bytes]) -> Bytes {
    let total: usize = payloads.iter().map(Bytes::len).sum();
    let mut buffer = BytesMut::with_capacity(total);
    for payload in payloads {
        buffer.extend_from_slice(payload);
    }
    buffer.freeze()
}
