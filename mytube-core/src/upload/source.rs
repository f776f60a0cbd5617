//! Byte sources an upload reads its chunks from.

use std::io::SeekFrom;
use std::ops::Range;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio::sync::Mutex;

use crate::config::DEFAULT_MIME_TYPE;

/// Random-access view of the file being uploaded.
#[async_trait]
pub trait UploadSource: Send + Sync {
    /// Total length in bytes
    fn len(&self) -> u64;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Media type of the content
    fn mime_type(&self) -> &str;

    /// Reads exactly the bytes in `range`.
    ///
    /// # Errors
    ///
    /// - `std::io::Error` - If the range lies outside the source or reading fails
    async fn read_range(&self, range: Range<u64>) -> std::io::Result<Bytes>;
}

fn out_of_bounds(range: &Range<u64>, len: u64) -> std::io::Error {
    std::io::Error::new(
        std::io::ErrorKind::UnexpectedEof,
        format!("range {}..{} outside source of {len} bytes", range.start, range.end),
    )
}

/// Source held entirely in memory.
#[derive(Debug, Clone)]
pub struct MemorySource {
    data: Bytes,
    mime_type: String,
}

impl MemorySource {
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self {
            data: data.into(),
            mime_type: DEFAULT_MIME_TYPE.to_string(),
        }
    }
}

#[async_trait]
impl UploadSource for MemorySource {
    fn len(&self) -> u64 {
        self.data.len() as u64
    }

    fn mime_type(&self) -> &str {
        &self.mime_type
    }

    async fn read_range(&self, range: Range<u64>) -> std::io::Result<Bytes> {
        if range.start > range.end || range.end > self.len() {
            return Err(out_of_bounds(&range, self.len()));
        }
        Ok(self.data.slice(range.start as usize..range.end as usize))
    }
}

/// Source backed by a file on disk.
///
/// The handle stays open for the lifetime of the source and each chunk is
/// read with a seek followed by an exact read.
#[derive(Debug)]
pub struct LocalFileSource {
    path: PathBuf,
    len: u64,
    mime_type: String,
    file: Mutex<File>,
}

impl LocalFileSource {
    /// Opens `path` and records its size and guessed media type.
    ///
    /// # Errors
    ///
    /// - `std::io::Error` - If the file cannot be opened or stat'ed
    pub async fn open(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path).await?;
        let len = file.metadata().await?.len();
        let mime_type = mime_guess::from_path(&path)
            .first_raw()
            .unwrap_or(DEFAULT_MIME_TYPE)
            .to_string();

        tracing::debug!(path = %path.display(), len, %mime_type, "Opened upload source");

        Ok(Self {
            path,
            len,
            mime_type,
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl UploadSource for LocalFileSource {
    fn len(&self) -> u64 {
        self.len
    }

    fn mime_type(&self) -> &str {
        &self.mime_type
    }

    async fn read_range(&self, range: Range<u64>) -> std::io::Result<Bytes> {
        if range.start > range.end || range.end > self.len {
            return Err(out_of_bounds(&range, self.len));
        }

        let mut buffer = vec![0u8; (range.end - range.start) as usize];
        let mut file = self.file.lock().await;
        file.seek(SeekFrom::Start(range.start)).await?;
        file.read_exact(&mut buffer).await?;
        Ok(Bytes::from(buffer))
    }
}
