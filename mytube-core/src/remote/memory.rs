//! In-process chunk store.
//!
//! Implements the full remote contract in memory for the CLI and for tests.
//! Range reads come back in a seeded shuffled order so callers must sort, and
//! faults can be injected per call type to drive the failure paths of both
//! pipelines deterministically.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use rand::SeedableRng;
use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;

use super::{ChunkStore, RangeRead, RemoteError};
use crate::video::{ChunkNumber, StreamChunk, VideoId, VideoMetadata};

const DEFAULT_SEED: u64 = 42;

/// One observed call, recorded in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteCall {
    RegisterMetadata {
        video_id: VideoId,
        total_chunks: u64,
        chunk_size: u64,
    },
    UploadChunk {
        video_id: VideoId,
        chunk_number: ChunkNumber,
        size: u64,
    },
    ReadChunkRange {
        video_id: VideoId,
        start: ChunkNumber,
        end: ChunkNumber,
    },
    VideoMetadata {
        video_id: VideoId,
    },
}

#[derive(Debug, Clone)]
struct StoredVideo {
    metadata: VideoMetadata,
    chunks: BTreeMap<ChunkNumber, Bytes>,
}

#[derive(Debug, Clone, Copy)]
struct ChunkFault {
    chunk: ChunkNumber,
    persistent: bool,
}

#[derive(Debug, Default)]
struct Faults {
    metadata_failure: Option<String>,
    chunk_failure: Option<ChunkFault>,
    dropped_chunk: Option<ChunkNumber>,
    emptied_chunk: Option<ChunkNumber>,
    range_error: Option<String>,
}

struct StoreState {
    videos: HashMap<VideoId, StoredVideo>,
    calls: Vec<RemoteCall>,
    faults: Faults,
    shuffle_reads: bool,
    rng: ChaCha8Rng,
}

/// Chunk store backed by process memory.
pub struct InMemoryChunkStore {
    state: Mutex<StoreState>,
}

impl InMemoryChunkStore {
    /// Creates an empty store with the default shuffle seed.
    pub fn new() -> Self {
        Self::with_seed(DEFAULT_SEED)
    }

    /// Creates an empty store whose range-read ordering derives from `seed`.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            state: Mutex::new(StoreState {
                videos: HashMap::new(),
                calls: Vec::new(),
                faults: Faults::default(),
                shuffle_reads: true,
                rng: ChaCha8Rng::seed_from_u64(seed),
            }),
        }
    }

    /// Returns range reads in ascending order instead of shuffled.
    pub fn disable_shuffle(&self) {
        self.state.lock().shuffle_reads = false;
    }

    /// Every metadata registration fails with `reason` until cleared.
    pub fn fail_metadata_registration(&self, reason: impl Into<String>) {
        self.state.lock().faults.metadata_failure = Some(reason.into());
    }

    /// The next upload of `chunk` fails; later attempts succeed.
    pub fn fail_chunk_upload_once(&self, chunk: ChunkNumber) {
        self.state.lock().faults.chunk_failure = Some(ChunkFault {
            chunk,
            persistent: false,
        });
    }

    /// Every upload of `chunk` fails until cleared.
    pub fn fail_chunk_upload_always(&self, chunk: ChunkNumber) {
        self.state.lock().faults.chunk_failure = Some(ChunkFault {
            chunk,
            persistent: true,
        });
    }

    /// Range reads silently omit `chunk`.
    pub fn drop_chunk_from_reads(&self, chunk: ChunkNumber) {
        self.state.lock().faults.dropped_chunk = Some(chunk);
    }

    /// Range reads return `chunk` with an empty payload.
    pub fn empty_chunk_in_reads(&self, chunk: ChunkNumber) {
        self.state.lock().faults.emptied_chunk = Some(chunk);
    }

    /// Range reads answer with the in-band error variant.
    pub fn fail_range_reads(&self, reason: impl Into<String>) {
        self.state.lock().faults.range_error = Some(reason.into());
    }

    pub fn clear_faults(&self) {
        self.state.lock().faults = Faults::default();
    }

    /// Calls observed so far, in arrival order.
    pub fn calls(&self) -> Vec<RemoteCall> {
        self.state.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state.lock().calls.clear();
    }

    /// Chunk numbers of every upload call, including failed ones.
    pub fn uploaded_chunk_numbers(&self) -> Vec<ChunkNumber> {
        self.state
            .lock()
            .calls
            .iter()
            .filter_map(|call| match call {
                RemoteCall::UploadChunk { chunk_number, .. } => Some(*chunk_number),
                _ => None,
            })
            .collect()
    }

    /// Number of chunks currently stored for a video.
    pub fn stored_chunk_count(&self, video_id: &VideoId) -> usize {
        self.state
            .lock()
            .videos
            .get(video_id)
            .map_or(0, |video| video.chunks.len())
    }

    /// Stored chunks concatenated in chunk order, bypassing the read path.
    pub fn stored_bytes(&self, video_id: &VideoId) -> Option<Vec<u8>> {
        let state = self.state.lock();
        let video = state.videos.get(video_id)?;
        Some(
            video
                .chunks
                .values()
                .flat_map(|data| data.iter().copied())
                .collect(),
        )
    }

    /// Seeds a video directly, as if it had been uploaded earlier.
    pub fn insert_video(&self, metadata: VideoMetadata, chunks: Vec<StreamChunk>) {
        let chunks = chunks
            .into_iter()
            .map(|chunk| (chunk.chunk_number, chunk.data))
            .collect();
        self.state
            .lock()
            .videos
            .insert(metadata.id.clone(), StoredVideo { metadata, chunks });
    }
}

impl Default for InMemoryChunkStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChunkStore for InMemoryChunkStore {
    async fn register_video_metadata(&self, metadata: &VideoMetadata) -> Result<(), RemoteError> {
        let mut state = self.state.lock();
        state.calls.push(RemoteCall::RegisterMetadata {
            video_id: metadata.id.clone(),
            total_chunks: metadata.total_chunks,
            chunk_size: metadata.chunk_size,
        });

        if let Some(reason) = &state.faults.metadata_failure {
            return Err(RemoteError::Rejected {
                reason: reason.clone(),
            });
        }

        let total_chunks = metadata.total_chunks;
        let video = state
            .videos
            .entry(metadata.id.clone())
            .or_insert_with(|| StoredVideo {
                metadata: metadata.clone(),
                chunks: BTreeMap::new(),
            });
        video.metadata = metadata.clone();
        video
            .chunks
            .retain(|number, _| number.as_u64() < total_chunks);

        tracing::trace!(video_id = %metadata.id, total_chunks, "Registered video metadata");
        Ok(())
    }

    async fn upload_chunk(
        &self,
        video_id: &VideoId,
        chunk_number: ChunkNumber,
        payload: Bytes,
        declared_size: u64,
    ) -> Result<(), RemoteError> {
        let mut state = self.state.lock();
        state.calls.push(RemoteCall::UploadChunk {
            video_id: video_id.clone(),
            chunk_number,
            size: declared_size,
        });

        let chunk_fault = state.faults.chunk_failure;
        if let Some(fault) = chunk_fault {
            if fault.chunk == chunk_number {
                if !fault.persistent {
                    state.faults.chunk_failure = None;
                }
                return Err(RemoteError::Unavailable {
                    reason: format!("injected failure for chunk {chunk_number}"),
                });
            }
        }

        if declared_size != payload.len() as u64 {
            return Err(RemoteError::Rejected {
                reason: format!(
                    "declared size {declared_size} does not match payload length {}",
                    payload.len()
                ),
            });
        }

        let Some(video) = state.videos.get_mut(video_id) else {
            return Err(RemoteError::VideoNotFound {
                video_id: video_id.clone(),
            });
        };

        if chunk_number.as_u64() >= video.metadata.total_chunks {
            return Err(RemoteError::Rejected {
                reason: format!(
                    "chunk {chunk_number} outside registered count {}",
                    video.metadata.total_chunks
                ),
            });
        }

        video.chunks.insert(chunk_number, payload);
        tracing::trace!(%video_id, %chunk_number, declared_size, "Stored chunk");
        Ok(())
    }

    async fn read_chunk_range(
        &self,
        video_id: &VideoId,
        start: ChunkNumber,
        end: ChunkNumber,
    ) -> Result<RangeRead, RemoteError> {
        let mut state = self.state.lock();
        state.calls.push(RemoteCall::ReadChunkRange {
            video_id: video_id.clone(),
            start,
            end,
        });

        if let Some(reason) = &state.faults.range_error {
            return Ok(RangeRead::Error(reason.clone()));
        }
        if start > end {
            return Ok(RangeRead::Error(format!("Invalid range {start}..={end}")));
        }
        let Some(video) = state.videos.get(video_id) else {
            return Ok(RangeRead::Error("Video not found".to_string()));
        };

        let dropped = state.faults.dropped_chunk;
        let emptied = state.faults.emptied_chunk;
        let mut chunks: Vec<StreamChunk> = video
            .chunks
            .range(start..=end)
            .filter(|(number, _)| Some(**number) != dropped)
            .map(|(number, data)| {
                if Some(*number) == emptied {
                    StreamChunk::new(*number, Bytes::new())
                } else {
                    StreamChunk::new(*number, data.clone())
                }
            })
            .collect();

        if state.shuffle_reads {
            let StoreState { rng, .. } = &mut *state;
            chunks.shuffle(rng);
        }

        Ok(RangeRead::Chunks(chunks))
    }

    async fn video_metadata(
        &self,
        video_id: &VideoId,
    ) -> Result<Option<VideoMetadata>, RemoteError> {
        let mut state = self.state.lock();
        state.calls.push(RemoteCall::VideoMetadata {
            video_id: video_id.clone(),
        });
        Ok(state
            .videos
            .get(video_id)
            .map(|video| video.metadata.clone()))
    }
}
