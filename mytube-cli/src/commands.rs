//! CLI command implementations

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, anyhow};
use clap::Subcommand;
use mytube_core::config::{DEFAULT_CHUNK_SIZE, MytubeConfig};
use mytube_core::upload::{LocalFileSource, UploadSource};
use mytube_core::video::{ChunkLayout, resolution_label};
use mytube_core::{
    BlobRegistry, ChunkStore, ChunkedUploader, InMemoryChunkStore, RemoteSession, UploadRequest,
    VideoId, VideoStreamSource,
};
use sha1::{Digest, Sha1};

/// Principal the local session is opened for.
const LOCAL_PRINCIPAL: &str = "local-cli";

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Print how a file would be split into chunks
    Layout {
        /// Video file to inspect
        file: PathBuf,
        /// Chunk size in bytes
        #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE)]
        chunk_size: u64,
    },
    /// Upload a file to an in-memory store, play it back and verify the bytes
    Roundtrip {
        /// Video file to upload
        file: PathBuf,
        /// Video title
        #[arg(long)]
        title: String,
        /// Video description
        #[arg(long, default_value = "")]
        description: String,
        /// Duration in seconds
        #[arg(long, default_value_t = 0)]
        duration: u64,
        /// Resolution label; derived from --width/--height when omitted
        #[arg(long)]
        resolution: Option<String>,
        /// Frame width in pixels
        #[arg(long, default_value_t = 0)]
        width: u32,
        /// Frame height in pixels
        #[arg(long, default_value_t = 0)]
        height: u32,
        /// Video id; generated when omitted
        #[arg(long)]
        id: Option<String>,
    },
}

/// Handle the CLI command
///
/// # Errors
/// Returns appropriate error based on the command that fails
pub async fn handle_command(command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Layout { file, chunk_size } => show_layout(file, chunk_size).await,
        Commands::Roundtrip {
            file,
            title,
            description,
            duration,
            resolution,
            width,
            height,
            id,
        } => {
            let request = UploadRequest {
                id: id.map(VideoId::new).unwrap_or_else(VideoId::generate),
                title,
                description,
                duration_seconds: duration,
                resolution: resolution.unwrap_or_else(|| resolution_label(width, height)),
            };
            round_trip(file, request).await
        }
    }
}

/// Print the chunk layout of a file
async fn show_layout(file: PathBuf, chunk_size: u64) -> anyhow::Result<()> {
    let source = LocalFileSource::open(&file)
        .await
        .with_context(|| format!("cannot open {}", file.display()))?;
    let layout = ChunkLayout::new(source.len(), chunk_size)
        .ok_or_else(|| anyhow!("chunk size must be positive"))?;

    println!(
        "{}: {} bytes ({}), {} chunks of {} bytes",
        source.path().display(),
        layout.total_bytes(),
        source.mime_type(),
        layout.total_chunks(),
        layout.chunk_size()
    );
    for (chunk, range) in layout.chunks() {
        println!(
            "  chunk {chunk:>5}: bytes {}..{} ({} bytes)",
            range.start,
            range.end,
            range.end - range.start
        );
    }

    Ok(())
}

/// Upload, reassemble and compare digests
async fn round_trip(file: PathBuf, request: UploadRequest) -> anyhow::Result<()> {
    let config = MytubeConfig::from_env();
    let source = LocalFileSource::open(&file)
        .await
        .with_context(|| format!("cannot open {}", file.display()))?;
    let source: Arc<dyn UploadSource> = Arc::new(source);

    let store = Arc::new(InMemoryChunkStore::new());
    let session = RemoteSession::new(LOCAL_PRINCIPAL, store.clone());
    let mut uploader = ChunkedUploader::new(Some(session), config.upload.clone());

    println!("Uploading {} as {}", file.display(), request.id);
    let metadata = match uploader
        .upload(source.clone(), request, |progress| {
            println!(
                "  chunk {}/{} - {}/{} bytes ({}%)",
                progress.current_chunk,
                progress.total_chunks,
                progress.uploaded_bytes,
                progress.total_bytes,
                progress.percentage
            );
        })
        .await
    {
        Ok(metadata) => metadata,
        Err(e) => {
            let message = e.user_message();
            return Err(anyhow::Error::new(e).context(message));
        }
    };

    let stored = store
        .video_metadata(&metadata.id)
        .await?
        .ok_or_else(|| anyhow!("video {} missing after upload", metadata.id))?;
    println!("{}", serde_json::to_string_pretty(&stored)?);

    let registry = BlobRegistry::new();
    let stream = VideoStreamSource::from_metadata(&stored, store.clone(), registry.clone())
        .with_config(config.streaming.clone());

    println!("Reassembling {}", stored.id);
    let blob_url = match stream
        .create_scoped_blob_url(|percentage| println!("  loaded {percentage}%"))
        .await
    {
        Ok(url) => url,
        Err(e) => {
            let message = e.user_message();
            return Err(anyhow::Error::new(e).context(message));
        }
    };
    let blob = blob_url
        .resolve()
        .ok_or_else(|| anyhow!("blob {} vanished before playback", blob_url.url()))?;

    let original = source.read_range(0..source.len()).await?;
    let expected = hex::encode(Sha1::digest(&original));
    let actual = hex::encode(Sha1::digest(blob.data()));

    println!(
        "{} -> {} bytes ({}), sha1 {}",
        blob_url.url(),
        blob.len(),
        blob.mime_type(),
        actual
    );
    drop(blob);
    drop(blob_url);
    tracing::debug!(live = registry.live_count(), "Released playback blob");

    if expected != actual {
        return Err(anyhow!(
            "reassembled video differs from source (expected sha1 {expected}, got {actual})"
        ));
    }
    println!("Round trip verified");

    Ok(())
}
