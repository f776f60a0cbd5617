//! Integration tests for the upload pipeline and the streaming source.
//!
//! These drive both pipelines end to end against the in-memory chunk store,
//! checking call ordering on the upload side and ordering, validation and
//! size guarantees on the playback side.

use std::io::Write;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use mytube_core::config::UploadConfig;
use mytube_core::remote::{RangeRead, RemoteCall};
use mytube_core::streaming::StreamingError;
use mytube_core::upload::{LocalFileSource, MemorySource, UploadSource, UploadState};
use mytube_core::{
    BlobRegistry, CancellationFlag, ChunkNumber, ChunkStore, ChunkedUploader, InMemoryChunkStore,
    LOAD_FAILED_MESSAGE, RemoteError, RemoteSession, StreamChunk, UPLOAD_CANCELLED_MESSAGE,
    UploadError, UploadRequest, VideoId, VideoMetadata, VideoStreamSource,
};

const MIB: u64 = 1_048_576;

/// Test fixture wiring an uploader and a registry to one in-memory store.
struct PipelineFixture {
    store: Arc<InMemoryChunkStore>,
    uploader: ChunkedUploader,
    registry: BlobRegistry,
}

impl PipelineFixture {
    fn new(chunk_size: u64) -> Self {
        let store = Arc::new(InMemoryChunkStore::new());
        let session = RemoteSession::new("integration-tester", store.clone());
        Self {
            store,
            uploader: ChunkedUploader::new(Some(session), UploadConfig { chunk_size }),
            registry: BlobRegistry::new(),
        }
    }

    fn request(id: &str) -> UploadRequest {
        UploadRequest {
            id: VideoId::new(id),
            title: "Integration clip".to_string(),
            description: String::new(),
            duration_seconds: 12,
            resolution: "1080p".to_string(),
        }
    }

    fn payload(len: u64) -> Bytes {
        Bytes::from((0..len).map(|i| (i * 7 % 256) as u8).collect::<Vec<u8>>())
    }

    fn stream_source(&self, metadata: &VideoMetadata) -> VideoStreamSource {
        VideoStreamSource::from_metadata(metadata, self.store.clone(), self.registry.clone())
    }

    fn chunk_sizes(&self) -> Vec<u64> {
        self.store
            .calls()
            .into_iter()
            .filter_map(|call| match call {
                RemoteCall::UploadChunk { size, .. } => Some(size),
                _ => None,
            })
            .collect()
    }
}

#[tokio::test]
async fn test_two_and_a_half_mib_upload_sends_three_ordered_chunks() {
    let mut fixture = PipelineFixture::new(MIB);
    let data = PipelineFixture::payload(5 * MIB / 2);
    let source: Arc<dyn UploadSource> = Arc::new(MemorySource::new(data));

    let metadata = fixture
        .uploader
        .upload(source, PipelineFixture::request("v-25"), |_| {})
        .await
        .unwrap();

    assert_eq!(metadata.total_chunks, 3);
    assert_eq!(metadata.chunk_size, MIB);

    let calls = fixture.store.calls();
    assert!(matches!(
        calls[0],
        RemoteCall::RegisterMetadata { total_chunks: 3, .. }
    ));
    assert_eq!(
        fixture.store.uploaded_chunk_numbers(),
        vec![ChunkNumber::new(0), ChunkNumber::new(1), ChunkNumber::new(2)]
    );
    assert_eq!(fixture.chunk_sizes(), vec![MIB, MIB, 524_288]);
}

#[tokio::test]
async fn test_chunk_call_count_matches_layout() {
    for (len, chunk_size) in [(1u64, 4u64), (4, 4), (5, 4), (1000, 7), (64, 64), (65, 64)] {
        let mut fixture = PipelineFixture::new(chunk_size);
        let source: Arc<dyn UploadSource> =
            Arc::new(MemorySource::new(PipelineFixture::payload(len)));

        fixture
            .uploader
            .upload(source, PipelineFixture::request("v"), |_| {})
            .await
            .unwrap();

        let expected_chunks = len.div_ceil(chunk_size);
        let numbers: Vec<u64> = fixture
            .store
            .uploaded_chunk_numbers()
            .into_iter()
            .map(ChunkNumber::as_u64)
            .collect();
        assert_eq!(numbers, (0..expected_chunks).collect::<Vec<_>>());

        let sizes = fixture.chunk_sizes();
        let (last, full) = sizes.split_last().unwrap();
        assert!(full.iter().all(|&size| size == chunk_size));
        assert_eq!(*last, len - (expected_chunks - 1) * chunk_size);
    }
}

#[tokio::test]
async fn test_cancel_after_second_chunk_then_retry() {
    let mut fixture = PipelineFixture::new(4);
    let source: Arc<dyn UploadSource> = Arc::new(MemorySource::new(PipelineFixture::payload(12)));
    let flag = fixture.uploader.cancellation_flag();

    let result = fixture
        .uploader
        .upload(source, PipelineFixture::request("v"), |progress| {
            if progress.current_chunk == 2 {
                flag.cancel();
            }
        })
        .await;

    assert!(matches!(result, Err(UploadError::Cancelled)));
    assert_eq!(fixture.uploader.state(), &UploadState::Cancelled);
    assert_eq!(
        fixture.uploader.error_message(),
        Some(UPLOAD_CANCELLED_MESSAGE)
    );
    assert_eq!(fixture.store.uploaded_chunk_numbers().len(), 2);

    fixture.store.clear_calls();
    fixture.uploader.retry(|_| {}).await.unwrap();

    let calls = fixture.store.calls();
    assert_eq!(calls.len(), 4);
    assert!(matches!(calls[0], RemoteCall::RegisterMetadata { .. }));
    assert_eq!(
        fixture.store.uploaded_chunk_numbers(),
        vec![ChunkNumber::new(0), ChunkNumber::new(1), ChunkNumber::new(2)]
    );
}

#[tokio::test]
async fn test_retry_after_failure_restarts_from_first_chunk() {
    let mut fixture = PipelineFixture::new(4);
    fixture.store.fail_chunk_upload_once(ChunkNumber::new(2));
    let source: Arc<dyn UploadSource> = Arc::new(MemorySource::new(PipelineFixture::payload(16)));

    let result = fixture
        .uploader
        .upload(source, PipelineFixture::request("v"), |_| {})
        .await;
    assert!(matches!(
        result,
        Err(UploadError::ChunkTransmission { chunk, .. }) if chunk == ChunkNumber::new(2)
    ));

    fixture.store.clear_calls();
    let metadata = fixture.uploader.retry(|_| {}).await.unwrap();

    assert_eq!(metadata.total_chunks, 4);
    assert!(matches!(
        fixture.store.calls()[0],
        RemoteCall::RegisterMetadata { .. }
    ));
    assert_eq!(
        fixture
            .store
            .uploaded_chunk_numbers()
            .into_iter()
            .map(ChunkNumber::as_u64)
            .collect::<Vec<_>>(),
        vec![0, 1, 2, 3]
    );
    assert_eq!(fixture.uploader.state(), &UploadState::Completed);
}

#[tokio::test]
async fn test_upload_then_playback_round_trip() {
    let mut fixture = PipelineFixture::new(1000);
    let original = PipelineFixture::payload(23_456);
    let source: Arc<dyn UploadSource> = Arc::new(MemorySource::new(original.clone()));
    let mut upload_reports = Vec::new();

    let metadata = fixture
        .uploader
        .upload(source, PipelineFixture::request("round-trip"), |p| {
            upload_reports.push(p.percentage)
        })
        .await
        .unwrap();

    let stored = fixture
        .store
        .video_metadata(&metadata.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored, metadata);

    let mut playback_reports = Vec::new();
    let url = fixture
        .stream_source(&stored)
        .create_blob_url(|p| playback_reports.push(p))
        .await
        .unwrap();

    let blob = fixture.registry.resolve(&url).unwrap();
    assert_eq!(blob.len() as u64, 23_456);
    assert_eq!(blob.data(), &original);

    for reports in [&upload_reports, &playback_reports] {
        assert!(reports.windows(2).all(|pair| pair[0] <= pair[1]));
        assert_eq!(reports.last(), Some(&100));
    }
    assert_eq!(playback_reports.len(), 3);

    assert!(VideoStreamSource::revoke_blob_url(&fixture.registry, &url));
    assert_eq!(fixture.registry.live_count(), 0);
}

#[tokio::test]
async fn test_single_chunk_video_boundary() {
    let mut fixture = PipelineFixture::new(MIB);
    let source: Arc<dyn UploadSource> = Arc::new(MemorySource::new(PipelineFixture::payload(10)));

    let metadata = fixture
        .uploader
        .upload(source, PipelineFixture::request("tiny"), |_| {})
        .await
        .unwrap();
    assert_eq!(fixture.store.calls().len(), 2);

    fixture.store.clear_calls();
    let url = fixture
        .stream_source(&metadata)
        .create_blob_url(|_| {})
        .await
        .unwrap();

    assert_eq!(
        fixture.store.calls(),
        vec![RemoteCall::ReadChunkRange {
            video_id: VideoId::new("tiny"),
            start: ChunkNumber::new(0),
            end: ChunkNumber::new(0),
        }]
    );
    assert!(fixture.registry.revoke(&url));
}

#[tokio::test]
async fn test_short_batch_fails_without_blob() {
    let mut fixture = PipelineFixture::new(4);
    let source: Arc<dyn UploadSource> = Arc::new(MemorySource::new(PipelineFixture::payload(60)));
    let metadata = fixture
        .uploader
        .upload(source, PipelineFixture::request("v"), |_| {})
        .await
        .unwrap();
    assert_eq!(metadata.total_chunks, 15);

    fixture.store.drop_chunk_from_reads(ChunkNumber::new(3));
    let stream = fixture.stream_source(&metadata);

    let error = stream
        .fetch_chunks(ChunkNumber::new(0), ChunkNumber::new(9))
        .await
        .unwrap_err();
    assert!(matches!(error, StreamingError::Validation { .. }));
    assert_eq!(error.user_message(), LOAD_FAILED_MESSAGE);

    let mut reports = Vec::new();
    let result = stream.create_blob_url(|p| reports.push(p)).await;
    assert!(result.is_err());
    assert!(reports.is_empty());
    assert_eq!(fixture.registry.live_count(), 0);
}

#[tokio::test]
async fn test_failure_in_later_batch_discards_earlier_batches() {
    let mut fixture = PipelineFixture::new(4);
    let source: Arc<dyn UploadSource> = Arc::new(MemorySource::new(PipelineFixture::payload(60)));
    let metadata = fixture
        .uploader
        .upload(source, PipelineFixture::request("v"), |_| {})
        .await
        .unwrap();

    fixture.store.empty_chunk_in_reads(ChunkNumber::new(12));
    let mut reports = Vec::new();
    let result = fixture
        .stream_source(&metadata)
        .create_blob_url(|p| reports.push(p))
        .await;

    assert!(matches!(result, Err(StreamingError::Validation { .. })));
    assert_eq!(reports, vec![67]);
    assert_eq!(fixture.registry.live_count(), 0);
}

#[tokio::test]
async fn test_remote_error_variant_maps_to_load_failure() {
    let fixture = PipelineFixture::new(4);
    fixture.store.fail_range_reads("canister out of cycles");
    let stream = VideoStreamSource::new(
        VideoId::new("any"),
        fixture.store.clone(),
        2,
        4,
        fixture.registry.clone(),
    );

    let error = stream.create_blob_url(|_| {}).await.unwrap_err();

    assert!(matches!(error, StreamingError::RangeRead { ref reason, .. } if reason.contains("cycles")));
    assert_eq!(error.user_message(), LOAD_FAILED_MESSAGE);
}

/// Store that answers every range read with a fixed chunk order.
struct FixedOrderStore {
    order: Vec<u64>,
}

#[async_trait]
impl ChunkStore for FixedOrderStore {
    async fn register_video_metadata(&self, _metadata: &VideoMetadata) -> Result<(), RemoteError> {
        Ok(())
    }

    async fn upload_chunk(
        &self,
        _video_id: &VideoId,
        _chunk_number: ChunkNumber,
        _payload: Bytes,
        _declared_size: u64,
    ) -> Result<(), RemoteError> {
        Ok(())
    }

    async fn read_chunk_range(
        &self,
        _video_id: &VideoId,
        _start: ChunkNumber,
        _end: ChunkNumber,
    ) -> Result<RangeRead, RemoteError> {
        Ok(RangeRead::Chunks(
            self.order
                .iter()
                .map(|&n| StreamChunk::new(ChunkNumber::new(n), Bytes::from(vec![n as u8; 2])))
                .collect(),
        ))
    }

    async fn video_metadata(
        &self,
        _video_id: &VideoId,
    ) -> Result<Option<VideoMetadata>, RemoteError> {
        Ok(None)
    }
}

#[tokio::test]
async fn test_out_of_order_remote_return_is_corrected() {
    let store = Arc::new(FixedOrderStore {
        order: vec![3, 1, 2, 0],
    });
    let registry = BlobRegistry::new();
    let stream = VideoStreamSource::new(VideoId::new("v"), store, 4, 2, registry.clone());

    let payloads = stream
        .fetch_chunks(ChunkNumber::new(0), ChunkNumber::new(3))
        .await
        .unwrap();
    let firsts: Vec<u8> = payloads.iter().map(|p| p[0]).collect();
    assert_eq!(firsts, vec![0, 1, 2, 3]);

    let url = stream.create_blob_url(|_| {}).await.unwrap();
    assert_eq!(
        registry.resolve(&url).unwrap().data().as_ref(),
        &[0, 0, 1, 1, 2, 2, 3, 3]
    );
}

#[tokio::test]
async fn test_abandoned_playback_creates_no_blob() {
    let mut fixture = PipelineFixture::new(4);
    let source: Arc<dyn UploadSource> = Arc::new(MemorySource::new(PipelineFixture::payload(100)));
    let metadata = fixture
        .uploader
        .upload(source, PipelineFixture::request("v"), |_| {})
        .await
        .unwrap();
    fixture.store.clear_calls();

    let cancellation = CancellationFlag::new();
    let trigger = cancellation.clone();
    let result = fixture
        .stream_source(&metadata)
        .create_blob_url_with_cancel(|_| trigger.cancel(), &cancellation)
        .await;

    assert!(matches!(result, Err(StreamingError::Cancelled)));
    assert_eq!(fixture.store.calls().len(), 1);
    assert_eq!(fixture.registry.live_count(), 0);
}

#[tokio::test]
async fn test_local_file_upload_round_trip() {
    let mut file = tempfile::Builder::new().suffix(".mp4").tempfile().unwrap();
    let original = PipelineFixture::payload(5_000);
    file.write_all(&original).unwrap();
    file.flush().unwrap();

    let mut fixture = PipelineFixture::new(1024);
    let source: Arc<dyn UploadSource> = Arc::new(LocalFileSource::open(file.path()).await.unwrap());

    let metadata = fixture
        .uploader
        .upload(source, PipelineFixture::request("from-disk"), |_| {})
        .await
        .unwrap();
    assert_eq!(metadata.total_chunks, 5);

    let scoped = fixture
        .stream_source(&metadata)
        .create_scoped_blob_url(|_| {})
        .await
        .unwrap();
    assert_eq!(scoped.resolve().unwrap().data(), &original);
}
