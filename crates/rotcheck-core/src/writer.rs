//! Write engine
//!
//! Drains a fresh [`Generator`] into the target chunk by chunk. Two modes exist:
//! - fixed length: stop after exactly N bytes
//! - fill: keep writing until the volume runs out of space, re-querying the
//!   [`FreeSpace`] collaborator only at progress checkpoints
//!
//! Running out of space is not a failure. When a write fails because the volume is
//! full, the same pending chunk is retried at lengths shrinking by
//! [`DISK_FULL_SHRINK_STEP`] until one succeeds or nothing is left, and the phase
//! ends early with [`StopReason::DiskFull`]. Every other I/O error is fatal.

use crate::config::{normalize_chunk_size, DEFAULT_CHUNK_SIZE, DEFAULT_PROGRESS_INTERVAL};
use crate::error::{Error, Result};
use crate::generator::Generator;
use crate::throughput::{
    calculate_eta, format_duration, format_speed, Checkpoints, ThroughputEstimator,
    DEFAULT_THROUGHPUT_WINDOW,
};
use std::io::{self, Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Bytes removed from the pending chunk on every disk-full retry
pub const DISK_FULL_SHRINK_STEP: usize = 512;

/// Source of the free space available on a volume
///
/// The answer is coarse and may be stale; the write engine only asks at progress
/// checkpoints.
#[cfg_attr(test, mockall::automock)]
pub trait FreeSpace {
    /// Bytes currently available to this process in the volume holding `dir`
    fn available_bytes(&self, dir: &Path) -> io::Result<u64>;
}

/// Write progress information
#[derive(Debug, Clone)]
pub struct WriteProgress {
    /// Bytes written so far
    pub bytes_written: u64,

    /// Total bytes to write (in fill mode, the latest free-space estimate)
    pub total_bytes: u64,

    /// Outlier-trimmed write speed in bytes per second
    pub speed_bps: u64,

    /// Estimated time remaining in seconds
    pub eta_seconds: Option<u64>,

    /// Elapsed time since start
    pub elapsed: Duration,
}

impl WriteProgress {
    /// Calculate completion percentage (0.0 to 100.0)
    pub fn percentage(&self) -> f64 {
        if self.total_bytes == 0 {
            100.0
        } else {
            (self.bytes_written as f64 / self.total_bytes as f64 * 100.0).min(100.0)
        }
    }

    /// Format speed for display (e.g., "45.2 MB/s")
    pub fn speed_display(&self) -> String {
        format_speed(self.speed_bps)
    }

    /// Format ETA for display (e.g., "2m 30s")
    pub fn eta_display(&self) -> String {
        match self.eta_seconds {
            Some(secs) if secs > 0 => format_duration(secs),
            _ => "calculating...".to_string(),
        }
    }
}

/// Progress callback type
pub type ProgressCallback = Box<dyn FnMut(&WriteProgress) + Send>;

/// Configuration for write operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteConfig {
    /// Chunk size for write operations
    pub chunk_size: usize,

    /// Bytes between progress reports
    pub progress_interval: u64,

    /// Number of samples kept by the throughput estimator
    pub throughput_window: usize,
}

impl Default for WriteConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
            throughput_window: DEFAULT_THROUGHPUT_WINDOW,
        }
    }
}

impl WriteConfig {
    /// Create a new config with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Set chunk size (clamped to the valid range, aligned down to 512 bytes)
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
}

/// Why the write phase ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The requested length was written
    Completed,
    /// A write hit a full volume or an exceeded quota
    DiskFull,
    /// Fill mode consumed the free space that was reported
    SpaceExhausted,
}

/// Result of a write operation
#[derive(Debug, Clone, serde::Serialize)]
pub struct WriteResult {
    /// Total bytes written
    pub bytes_written: u64,

    /// Total time elapsed
    pub elapsed: Duration,

    /// Average speed in bytes per second
    pub average_speed: u64,

    /// Why the phase ended
    pub stop_reason: StopReason,
}

impl WriteResult {
    /// Format average speed for display
    pub fn speed_display(&self) -> String {
        format_speed(self.average_speed)
    }

    /// Whether the volume filled up before the requested length
    pub fn disk_full(&self) -> bool {
        self.stop_reason == StopReason::DiskFull
    }
}

/// How far the write phase may go
enum Budget<'a> {
    Fixed(u64),
    Fill {
        free_space: &'a dyn FreeSpace,
        dir: &'a Path,
        limit: u64,
    },
}

impl Budget<'_> {
    fn limit(&self) -> u64 {
        match self {
            Budget::Fixed(length) => *length,
            Budget::Fill { limit, .. } => *limit,
        }
    }

    fn exhausted(&self) -> StopReason {
        match self {
            Budget::Fixed(_) => StopReason::Completed,
            Budget::Fill { .. } => StopReason::SpaceExhausted,
        }
    }

    fn refresh(&mut self, written: u64) {
        if let Budget::Fill {
            free_space,
            dir,
            limit,
        } = self
        {
            match free_space.available_bytes(*dir) {
                Ok(available) => {
                    *limit = written.saturating_add(available);
                    tracing::debug!("Free space re-query: {} bytes available", available);
                }
                Err(e) => {
                    tracing::warn!("Free space query failed, keeping previous estimate: {}", e);
                }
            }
        }
    }
}

/// Outcome of writing a single chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChunkWrite {
    Complete,
    /// Volume full; this many bytes of the chunk were persisted
    DiskFull(usize),
}

/// Writer engine for the deterministic stream
pub struct Writer {
    config: WriteConfig,
    progress_callback: Option<ProgressCallback>,
    cancel_flag: Arc<AtomicBool>,
}

impl Writer {
    /// Create a new writer with default configuration
    pub fn new() -> Self {
        Self::with_config(WriteConfig::default())
    }

    /// Create a new writer with custom configuration
    pub fn with_config(config: WriteConfig) -> Self {
        Self {
            config,
            progress_callback: None,
            cancel_flag: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Set a progress callback, invoked at every progress checkpoint
    pub fn on_progress<F>(mut self, callback: F) -> Self
    where
        F: FnMut(&WriteProgress) + Send + 'static,
    {
        self.progress_callback = Some(Box::new(callback));
        self
    }

    /// Share an existing cancellation flag
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel_flag = flag;
        self
    }

    /// Get a handle to cancel the write operation
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel_flag)
    }

    /// Write exactly `length` bytes of the stream to `target`, starting at offset 0.
    ///
    /// # Returns
    /// * `Ok(WriteResult)` - Write completed, possibly early because the volume filled up
    /// * `Err(Error)` - Fatal I/O error or cancellation
    pub fn write<W>(&mut self, target: &mut W, length: u64) -> Result<WriteResult>
    where
        W: Write + Seek,
    {
        tracing::debug!("Writing {} bytes", length);
        self.write_internal(target, Budget::Fixed(length))
    }

    /// Write until the volume holding `dir` has no space left
    pub fn fill<W>(
        &mut self,
        target: &mut W,
        free_space: &dyn FreeSpace,
        dir: &Path,
    ) -> Result<WriteResult>
    where
        W: Write + Seek,
    {
        let available = free_space.available_bytes(dir)?;
        tracing::debug!("Filling {:?}: {} bytes available", dir, available);
        self.write_internal(
            target,
            Budget::Fill {
                free_space,
                dir,
                limit: available,
            },
        )
    }

    fn write_internal<W>(&mut self, target: &mut W, mut budget: Budget<'_>) -> Result<WriteResult>
    where
        W: Write + Seek,
    {
        let start_time = Instant::now();
        let chunk_size = self.config.chunk_size;

        let mut generator = Generator::new();
        let mut buffer = vec![0u8; chunk_size];
        let mut estimator = ThroughputEstimator::new(self.config.throughput_window);
        let mut checkpoints = Checkpoints::new(self.config.progress_interval);
        let mut bytes_written = 0u64;

        estimator.start(start_time, 0);
        target.seek(SeekFrom::Start(0))?;

        let stop_reason = loop {
            if self.cancel_flag.load(Ordering::SeqCst) {
                return Err(Error::Cancelled);
            }

            let remaining = budget.limit().saturating_sub(bytes_written);
            if remaining == 0 {
                break budget.exhausted();
            }
            let len = usize::try_from(remaining).map_or(chunk_size, |r| r.min(chunk_size));

            generator.fill(&mut buffer)?;

            match write_chunk(target, &buffer[..len], bytes_written)? {
                ChunkWrite::Complete => bytes_written += len as u64,
                ChunkWrite::DiskFull(persisted) => {
                    bytes_written += persisted as u64;
                    tracing::warn!(
                        "Volume full after {} bytes, ending write phase early",
                        bytes_written
                    );
                    break StopReason::DiskFull;
                }
            }

            // A short chunk leaves the generator ahead of the file, so it must be the last
            if len < chunk_size {
                break budget.exhausted();
            }

            if checkpoints.crossed(bytes_written) {
                let now = Instant::now();
                estimator.checkpoint(now, bytes_written);
                budget.refresh(bytes_written);

                if let Some(ref mut callback) = self.progress_callback {
                    let speed_bps = estimator.average();
                    let total_bytes = budget.limit();
                    callback(&WriteProgress {
                        bytes_written,
                        total_bytes,
                        speed_bps,
                        eta_seconds: calculate_eta(bytes_written, total_bytes, speed_bps),
                        elapsed: now.duration_since(start_time),
                    });
                }
            }
        };

        match target.flush() {
            Ok(()) => {}
            Err(e) if is_disk_full(&e) => {
                tracing::warn!("Volume full while flushing: {}", e);
            }
            Err(e) => return Err(Error::Io(e)),
        }

        let elapsed = start_time.elapsed();
        let average_speed = if elapsed.as_secs_f64() > 0.0 {
            (bytes_written as f64 / elapsed.as_secs_f64()) as u64
        } else {
            0
        };

        Ok(WriteResult {
            bytes_written,
            elapsed,
            average_speed,
            stop_reason,
        })
    }
}

impl Default for Writer {
    fn default() -> Self {
        Self::new()
    }
}

/// Whether an I/O error means the volume (or the user's quota) is full
pub fn is_disk_full(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::StorageFull | io::ErrorKind::QuotaExceeded
    )
}

/// Write one chunk at `offset`, degrading on a full volume
fn write_chunk<W: Write + Seek>(target: &mut W, data: &[u8], offset: u64) -> Result<ChunkWrite> {
    match target.write_all(data) {
        Ok(()) => Ok(ChunkWrite::Complete),
        Err(e) if is_disk_full(&e) => {
            tracing::debug!("Disk full at offset {}, shrinking pending chunk", offset);
            shrink_pending_chunk(target, data, offset)
        }
        Err(e) => Err(Error::Io(e)),
    }
}

/// Retry the pending chunk at shrinking lengths until a write sticks
fn shrink_pending_chunk<W: Write + Seek>(
    target: &mut W,
    data: &[u8],
    offset: u64,
) -> Result<ChunkWrite> {
    let mut len = data.len();

    loop {
        len = len.saturating_sub(DISK_FULL_SHRINK_STEP);
        if len == 0 {
            return Ok(ChunkWrite::DiskFull(0));
        }

        target.seek(SeekFrom::Start(offset))?;
        match target.write_all(&data[..len]) {
            Ok(()) => return Ok(ChunkWrite::DiskFull(len)),
            Err(e) if is_disk_full(&e) => continue,
            Err(e) => return Err(Error::Io(e)),
        }
    }
}

// ============================================================================
// UNIT TESTS
// ============================================================================
