//! Session-local handles to reassembled media buffers.
//!
//! A blob URL is an opaque string that resolves to an in-memory buffer only
//! through the registry that issued it. The buffer stays alive until the URL
//! is revoked, so every created URL needs exactly one matching revoke.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::RwLock;
use uuid::Uuid;

const BLOB_URL_PREFIX: &str = "blob:mytube/";

/// Opaque handle to a registered media buffer.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BlobUrl(String);

impl BlobUrl {
    fn generate() -> Self {
        Self(format!("{BLOB_URL_PREFIX}{}", Uuid::new_v4()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BlobUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Playable media buffer behind a blob URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaBlob {
    data: Bytes,
    mime_type: String,
}

impl MediaBlob {
    pub fn data(&self) -> &Bytes {
        &self.data
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Table of live blob URLs for one client session.
///
/// Cloning yields another handle to the same table.
#[derive(Debug, Clone, Default)]
pub struct BlobRegistry {
    blobs: Arc<RwLock<HashMap<BlobUrl, MediaBlob>>>,
}

impl BlobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `data` and returns a fresh URL for it.
    pub fn create(&self, data: Bytes, mime_type: impl Into<String>) -> BlobUrl {
        let url = BlobUrl::generate();
        let blob = MediaBlob {
            data,
            mime_type: mime_type.into(),
        };
        tracing::debug!(%url, bytes = blob.len(), mime_type = blob.mime_type(), "Created blob URL");
        self.blobs.write().insert(url.clone(), blob);
        url
    }

    /// Looks up a live URL. The returned blob shares the registered buffer.
    pub fn resolve(&self, url: &BlobUrl) -> Option<MediaBlob> {
        self.blobs.read().get(url).cloned()
    }

    /// Releases the buffer behind `url`.
    ///
    /// Returns false if the URL was unknown or already revoked.
    pub fn revoke(&self, url: &BlobUrl) -> bool {
        let released = self.blobs.write().remove(url);
        match &released {
            Some(blob) => tracing::debug!(%url, bytes = blob.len(), "Revoked blob URL"),
            None => tracing::trace!(%url, "Revoke of unknown blob URL ignored"),
        }
        released.is_some()
    }

    /// Number of URLs not yet revoked.
    pub fn live_count(&self) -> usize {
        self.blobs.read().len()
    }

    /// Bytes held by URLs not yet revoked.
    pub fn live_bytes(&self) -> usize {
        self.blobs.read().values().map(MediaBlob::len).sum()
    }
}

/// Blob URL revoked when dropped.
#[derive(Debug)]
pub struct ScopedBlobUrl {
    registry: BlobRegistry,
    url: BlobUrl,
    armed: bool,
}

impl ScopedBlobUrl {
    pub fn new(registry: BlobRegistry, url: BlobUrl) -> Self {
        Self {
            registry,
            url,
            armed: true,
        }
    }

    pub fn url(&self) -> &BlobUrl {
        &self.url
    }

    pub fn resolve(&self) -> Option<MediaBlob> {
        self.registry.resolve(&self.url)
    }

    /// Hands the URL back to the caller, who becomes responsible for revoking it.
    pub fn into_url(mut self) -> BlobUrl {
        self.armed = false;
        self.url.clone()
    }
}

impl Drop for ScopedBlobUrl {
    fn drop(&mut self) {
        if self.armed {
            self.registry.revoke(&self.url);
        }
    }
}
