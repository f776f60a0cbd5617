//! Centralized configuration for Mytube.
//!
//! All tunable parameters of the transfer pipelines are defined here to avoid
//! hard-coded values scattered throughout the codebase.

/// Chunk size used by the upload pipeline (1 MiB).
pub const DEFAULT_CHUNK_SIZE: u64 = 1_048_576;
/// Number of chunks requested per range read during playback assembly.
pub const DEFAULT_BATCH_SIZE: u64 = 10;
/// Media type attached to reassembled playback blobs.
pub const DEFAULT_MIME_TYPE: &str = "video/mp4";

/// Central configuration for all Mytube components.
///
/// Supports environment variable overrides for runtime customization.
#[derive(Debug, Clone, Default)]
pub struct MytubeConfig {
    pub upload: UploadConfig,
    pub streaming: StreamingConfig,
}

/// Upload pipeline configuration.
#[derive(Debug, Clone)]
pub struct UploadConfig {
    /// Size of every chunk except possibly the last, in bytes. Captured once
    /// per upload and recorded in the video metadata.
    pub chunk_size: u64,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

/// Playback assembly configuration.
#[derive(Debug, Clone)]
pub struct StreamingConfig {
    /// Chunks per range read
    pub batch_size: u64,
    /// Media type of assembled blobs
    pub mime_type: String,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            mime_type: DEFAULT_MIME_TYPE.to_string(),
        }
    }
}

impl MytubeConfig {
    /// Creates configuration with environment variable overrides.
    ///
    /// Zero or unparsable values are ignored and the default is kept.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(chunk_size) = std::env::var("MYTUBE_CHUNK_SIZE") {
            if let Ok(bytes) = chunk_size.parse::<u64>() {
                if bytes > 0 {
                    config.upload.chunk_size = bytes;
                }
            }
        }

        if let Ok(batch_size) = std::env::var("MYTUBE_BATCH_SIZE") {
            if let Ok(count) = batch_size.parse::<u64>() {
                if count > 0 {
                    config.streaming.batch_size = count;
                }
            }
        }

        if let Ok(mime_type) = std::env::var("MYTUBE_MIME_TYPE") {
            if !mime_type.trim().is_empty() {
                config.streaming.mime_type = mime_type;
            }
        }

        config
    }

    /// Creates a configuration optimized for testing.
    ///
    /// Small chunks keep multi-chunk scenarios cheap in memory.
    pub fn for_testing() -> Self {
        Self {
            upload: UploadConfig { chunk_size: 1024 },
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_values() {
        let config = MytubeConfig::default();

        assert_eq!(config.upload.chunk_size, 1_048_576);
        assert_eq!(config.streaming.batch_size, 10);
        assert_eq!(config.streaming.mime_type, "video/mp4");
    }

    #[test]
    fn test_testing_preset() {
        let config = MytubeConfig::for_testing();
        assert_eq!(config.upload.chunk_size, 1024);
        assert_eq!(config.streaming.batch_size, DEFAULT_BATCH_SIZE);
    }

    #[test]
    fn test_env_override() {
        unsafe {
            std::env::set_var("MYTUBE_CHUNK_SIZE", "4096");
            std::env::set_var("MYTUBE_BATCH_SIZE", "0");
            std::env::set_var("MYTUBE_MIME_TYPE", "video/webm");
        }

        let config = MytubeConfig::from_env();

        assert_eq!(config.upload.chunk_size, 4096);
        assert_eq!(config.streaming.batch_size, DEFAULT_BATCH_SIZE);
        assert_eq!(config.streaming.mime_type, "video/webm");

        // Cleanup
        unsafe {
            std::env::remove_var("MYTUBE_CHUNK_SIZE");
            std::env::remove_var("MYTUBE_BATCH_SIZE");
            std::env::remove_var("MYTUBE_MIME_TYPE");
        }
    }
}
