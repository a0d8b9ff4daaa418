//! Configuration for rotcheck operations

use crate::throughput::DEFAULT_THROUGHPUT_WINDOW;
use crate::verifier::VerifyConfig;
use crate::writer::WriteConfig;

/// Default chunk size for reads and writes (1 MiB)
pub const DEFAULT_CHUNK_SIZE: usize = 1024 * 1024;

/// Minimum chunk size (4 KiB)
pub const MIN_CHUNK_SIZE: usize = 4 * 1024;

/// Maximum chunk size (64 MiB)
pub const MAX_CHUNK_SIZE: usize = 64 * 1024 * 1024;

/// Chunk sizes are kept a multiple of this so the disk-full shrink step and the
/// generator block size both divide them
pub const CHUNK_ALIGNMENT: usize = 512;

/// Default distance between progress reports (256 MiB)
pub const DEFAULT_PROGRESS_INTERVAL: u64 = 256 * 1024 * 1024;

/// Main configuration struct
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Chunk size for read/write operations
    pub chunk_size: usize,

    /// Bytes between progress reports and throughput samples
    pub progress_interval: u64,

    /// Number of speed samples kept by the throughput estimator
    pub throughput_window: usize,

    /// Whether to sync the file to stable storage after writing
    pub sync_on_complete: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
            throughput_window: DEFAULT_THROUGHPUT_WINDOW,
            sync_on_complete: true,
        }
    }
}

impl Config {
    /// Create a new config with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Set chunk size (clamped to the valid range and aligned down to 512 bytes)
    pub fn chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = normalize_chunk_size(size);
        self
    }

    /// Set progress interval in bytes
    pub fn progress_interval(mut self, interval: u64) -> Self {
        self.progress_interval = interval.max(1);
        self
    }

    /// Set throughput window size
    pub fn throughput_window(mut self, window: usize) -> Self {
        self.throughput_window = window.max(1);
        self
    }

    /// Set sync_on_complete
    pub fn sync_on_complete(mut self, sync: bool) -> Self {
        self.sync_on_complete = sync;
        self
    }

    /// Derive the write engine configuration
    pub fn write_config(&self) -> WriteConfig {
        WriteConfig::new()
            .chunk_size(self.chunk_size)
            .progress_interval(self.progress_interval)
            .throughput_window(self.throughput_window)
    }

    /// Derive the verify engine configuration
    pub fn verify_config(&self) -> VerifyConfig {
        VerifyConfig::new()
            .chunk_size(self.chunk_size)
            .progress_interval(self.progress_interval)
            .throughput_window(self.throughput_window)
    }
}

/// Clamp a chunk size to `MIN_CHUNK_SIZE..=MAX_CHUNK_SIZE` and align it down to
/// [`CHUNK_ALIGNMENT`]
pub fn normalize_chunk_size(size: usize) -> usize {
    let clamped = size.clamp(MIN_CHUNK_SIZE, MAX_CHUNK_SIZE);
    clamped - clamped % CHUNK_ALIGNMENT
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.chunk_size, DEFAULT_CHUNK_SIZE);
        assert_eq!(config.progress_interval, DEFAULT_PROGRESS_INTERVAL);
        assert_eq!(config.throughput_window, DEFAULT_THROUGHPUT_WINDOW);
        assert!(config.sync_on_complete);
    }

    #[test]
    fn test_config_builder() {
        let config = Config::new()
            .chunk_size(64 * 1024)
            .progress_interval(1_000_000)
            .throughput_window(10)
            .sync_on_complete(false);

        assert_eq!(config.chunk_size, 64 * 1024);
        assert_eq!(config.progress_interval, 1_000_000);
        assert_eq!(config.throughput_window, 10);
        assert!(!config.sync_on_complete);
    }

    #[test]
    fn test_chunk_size_normalization() {
        // Too small
        assert_eq!(normalize_chunk_size(100), MIN_CHUNK_SIZE);
        // Too large
        assert_eq!(normalize_chunk_size(1 << 30), MAX_CHUNK_SIZE);
        // Unaligned
        assert_eq!(normalize_chunk_size(10_000), 9_728);
        // Just right
        assert_eq!(normalize_chunk_size(1024 * 1024), 1024 * 1024);
    }

    #[test]
    fn test_zero_values_are_raised() {
        let config = Config::new().progress_interval(0).throughput_window(0);
        assert_eq!(config.progress_interval, 1);
        assert_eq!(config.throughput_window, 1);
    }

    #[test]
    fn test_engine_configs_follow_config() {
        let config = Config::new().chunk_size(8192).progress_interval(65_536);

        let write = config.write_config();
        assert_eq!(write.chunk_size, 8192);
        assert_eq!(write.progress_interval, 65_536);

        let verify = config.verify_config();
        assert_eq!(verify.chunk_size, 8192);
        assert_eq!(verify.progress_interval, 65_536);
    }
}
