//! Verification engine
//!
//! Re-derives the stream from a fresh [`Generator`] while reading the file back and
//! compares the two chunk by chunk. The comparison scans aligned groups of four
//! 64-bit words for a quick equal/not-equal answer; a chunk with any difference is
//! re-scanned byte by byte from its start so that every failing position is found.
//!
//! Each mismatching byte contributes `(offset, actual)` to the [`Signature`]. The
//! pass succeeds only when no mismatch was found.
//!
//! ## Example
//!
//! ```no_run
//! use rotcheck_core::verifier::Verifier;
//! use std::fs::File;
//!
//! let mut file = File::open("rotcheck.dat")?;
//! let length = file.metadata()?.len();
//!
//! let mut verifier = Verifier::new()
//!     .on_progress(|p| println!("{:.1}%", p.percentage()));
//! let result = verifier.verify(&mut file, length)?;
//!
//! println!("{} mismatches, signature {}", result.mismatches, result.signature);
//! # Ok::<(), rotcheck_core::Error>(())
//! ```

use crate::config::{normalize_chunk_size, DEFAULT_CHUNK_SIZE, DEFAULT_PROGRESS_INTERVAL};
use crate::error::{Error, Result};
use crate::generator::{Generator, BLOCK_SIZE};
use crate::signature::{Signature, SignatureBuilder};
use crate::throughput::{
    calculate_eta, format_duration, format_speed, Checkpoints, ThroughputEstimator,
    DEFAULT_THROUGHPUT_WINDOW,
};
use serde::Serialize;
use std::io::{Read, Seek, SeekFrom};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Number of individual mismatches kept for reporting
pub const MAX_REPORTED_MISMATCHES: usize = 32;

const WORD_SIZE: usize = std::mem::size_of::<u64>();

// ============================================================================
// Verification Progress
// ============================================================================

/// Progress callback type
pub type ProgressCallback = Box<dyn FnMut(&VerificationProgress) + Send>;

/// Verification progress information
#[derive(Debug, Clone)]
pub struct VerificationProgress {
    /// Bytes compared so far
    pub bytes_verified: u64,
    /// Size of the file being verified
    pub total_bytes: u64,
    /// Mismatching bytes found so far
    pub mismatches: u64,
    /// Outlier-trimmed read speed in bytes per second
    pub speed_bps: u64,
    /// Estimated time remaining
    pub eta_seconds: Option<u64>,
    /// Elapsed time
    pub elapsed: Duration,
}

impl VerificationProgress {
    /// Calculate completion percentage (0-100)
    pub fn percentage(&self) -> f64 {
        if self.total_bytes == 0 {
            100.0
        } else {
            (self.bytes_verified as f64 / self.total_bytes as f64) * 100.0
        }
    }

    /// Format speed for display
    pub fn speed_display(&self) -> String {
        format_speed(self.speed_bps)
    }

    /// Format ETA for display
    pub fn eta_display(&self) -> String {
        match self.eta_seconds {
            Some(secs) => format_duration(secs),
            None => "unknown".to_string(),
        }
    }
}

// ============================================================================
// Mismatch accounting
// ============================================================================

/// A single byte that did not match the stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Mismatch {
    /// Absolute offset in the file
    pub offset: u64,
    /// Byte the generator produced
    pub expected: u8,
    /// Byte read back from the file
    pub actual: u8,
}

/// Running tally of mismatches for one verification pass
#[derive(Debug, Default)]
pub struct MismatchLog {
    count: u64,
    signature: SignatureBuilder,
    first: Vec<Mismatch>,
}

impl MismatchLog {
    /// Create an empty log
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one failing byte; calls must come in ascending offset order
    pub fn record(&mut self, offset: u64, expected: u8, actual: u8) {
        self.count += 1;
        self.signature.record(offset, actual);
        if self.first.len() < MAX_REPORTED_MISMATCHES {
            self.first.push(Mismatch {
                offset,
                expected,
                actual,
            });
        }
    }

    /// Mismatches recorded so far
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Earliest recorded mismatches, at most [`MAX_REPORTED_MISMATCHES`]
    pub fn first(&self) -> &[Mismatch] {
        &self.first
    }

    /// Finalize into the mismatch count, signature and earliest mismatches
    pub fn finish(self) -> (u64, Signature, Vec<Mismatch>) {
        (self.count, self.signature.finish(), self.first)
    }
}

/// Compare `actual` against `expected`, logging every differing byte.
///
/// `base_offset` is the absolute file offset of the first byte. Only the common
/// prefix of the two slices is compared.
pub fn compare_chunk(expected: &[u8], actual: &[u8], base_offset: u64, log: &mut MismatchLog) {
    let len = expected.len().min(actual.len());
    let (expected, actual) = (&expected[..len], &actual[..len]);
    let aligned = len - len % BLOCK_SIZE;

    let dirty = expected[..aligned]
        .chunks_exact(BLOCK_SIZE)
        .zip(actual[..aligned].chunks_exact(BLOCK_SIZE))
        .any(|(e, a)| words_differ(e, a));

    // The wide pass only covers whole groups
    let scan_from = if dirty { 0 } else { aligned };

    for (i, (&e, &a)) in expected[scan_from..]
        .iter()
        .zip(&actual[scan_from..])
        .enumerate()
    {
        if e != a {
            log.record(base_offset + (scan_from + i) as u64, e, a);
        }
    }
}

/// Whether two equally sized groups differ in any of their words
fn words_differ(expected: &[u8], actual: &[u8]) -> bool {
    expected
        .chunks_exact(WORD_SIZE)
        .zip(actual.chunks_exact(WORD_SIZE))
        .fold(0u64, |acc, (e, a)| acc | (load_word(e) ^ load_word(a)))
        != 0
}

fn load_word(bytes: &[u8]) -> u64 {
    let mut word = [0u8; WORD_SIZE];
    word.copy_from_slice(bytes);
    u64::from_ne_bytes(word)
}

// ============================================================================
// Verification Result
// ============================================================================

/// Result of a verification pass
#[derive(Debug, Clone, Serialize)]
pub struct VerificationResult {
    /// Bytes verified
    pub bytes_verified: u64,
    /// Number of mismatching bytes
    pub mismatches: u64,
    /// Fingerprint of the mismatch set
    pub signature: Signature,
    /// Earliest mismatches, at most [`MAX_REPORTED_MISMATCHES`]
    pub first_mismatches: Vec<Mismatch>,
    /// Elapsed time
    pub elapsed: Duration,
    /// Average speed
    pub speed_bps: u64,
}

impl VerificationResult {
    /// Whether the file matched the stream exactly
    pub fn passed(&self) -> bool {
        self.mismatches == 0
    }

    /// Offset of the first mismatching byte, if any
    pub fn first_mismatch_offset(&self) -> Option<u64> {
        self.first_mismatches.first().map(|m| m.offset)
    }

    /// Format average speed for display
    pub fn speed_display(&self) -> String {
        format_speed(self.speed_bps)
    }
}

// ============================================================================
// Verifier
// ============================================================================

/// Verification configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifyConfig {
    /// Chunk size for reading
    pub chunk_size: usize,
    /// Bytes between progress reports
    pub progress_interval: u64,
    /// Number of samples kept by the throughput estimator
    pub throughput_window: usize,
}

impl Default for VerifyConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
            throughput_window: DEFAULT_THROUGHPUT_WINDOW,
        }
    }
}

impl VerifyConfig {
    /// Create a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set chunk size (clamped to valid range)
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

/// Verifier for files produced by the write engine
pub struct Verifier {
    config: VerifyConfig,
    progress_callback: Option<ProgressCallback>,
    cancel_flag: Arc<AtomicBool>,
}

impl Verifier {
    /// Create a new Verifier with default configuration
    pub fn new() -> Self {
        Self::with_config(VerifyConfig::default())
    }

    /// Create a Verifier with custom configuration
    pub fn with_config(config: VerifyConfig) -> Self {
        Self {
            config,
            progress_callback: None,
            cancel_flag: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Set progress callback
    pub fn on_progress<F>(mut self, callback: F) -> Self
    where
        F: FnMut(&VerificationProgress) + Send + 'static,
    {
        self.progress_callback = Some(Box::new(callback));
        self
    }

    /// Share an existing cancellation flag
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel_flag = flag;
        self
    }

    /// Get a handle to cancel the operation
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel_flag)
    }

    /// Compare the first `length` bytes of `source` against the stream.
    ///
    /// `length` must be the actual size of the source. A source that ends early is
    /// an error, not a mismatch.
    pub fn verify<R>(&mut self, source: &mut R, length: u64) -> Result<VerificationResult>
    where
        R: Read + Seek + ?Sized,
    {
        let start = Instant::now();
        source.seek(SeekFrom::Start(0))?;

        let chunk_size = self.config.chunk_size;
        let mut generator = Generator::new();
        let mut expected = vec![0u8; chunk_size];
        let mut actual = vec![0u8; chunk_size];
        let mut log = MismatchLog::new();
        let mut estimator = ThroughputEstimator::new(self.config.throughput_window);
        let mut checkpoints = Checkpoints::new(self.config.progress_interval);
        let mut bytes_verified = 0u64;

        estimator.start(start, 0);
        tracing::debug!("Verifying {} bytes in {} byte chunks", length, chunk_size);

        while bytes_verified < length {
            if self.cancel_flag.load(Ordering::SeqCst) {
                return Err(Error::Cancelled);
            }

            let remaining = length - bytes_verified;
            let to_read = usize::try_from(remaining).map_or(chunk_size, |r| r.min(chunk_size));

            let read = read_full(source, &mut actual[..to_read])?;
            if read < to_read {
                return Err(Error::UnexpectedEof {
                    offset: bytes_verified + read as u64,
                    expected: length,
                });
            }

            generator.fill(&mut expected)?;

            let before = log.count();
            compare_chunk(&expected[..to_read], &actual[..to_read], bytes_verified, &mut log);
            if log.count() > before {
                tracing::debug!(
                    "{} mismatches in chunk at offset {}",
                    log.count() - before,
                    bytes_verified
                );
            }

            bytes_verified += to_read as u64;

            if checkpoints.crossed(bytes_verified) {
                let now = Instant::now();
                estimator.checkpoint(now, bytes_verified);

                if let Some(ref mut callback) = self.progress_callback {
                    let speed_bps = estimator.average();
                    callback(&VerificationProgress {
                        bytes_verified,
                        total_bytes: length,
                        mismatches: log.count(),
                        speed_bps,
                        eta_seconds: calculate_eta(bytes_verified, length, speed_bps),
                        elapsed: now.duration_since(start),
                    });
                }
            }
        }

        let elapsed = start.elapsed();
        let speed_bps = if elapsed.as_secs_f64() > 0.0 {
            (bytes_verified as f64 / elapsed.as_secs_f64()) as u64
        } else {
            0
        };
        let (mismatches, signature, first_mismatches) = log.finish();

        Ok(VerificationResult {
            bytes_verified,
            mismatches,
            signature,
            first_mismatches,
            elapsed,
            speed_bps,
        })
    }
}

impl Default for Verifier {
    fn default() -> Self {
        Self::new()
    }
}

/// Read as much as possible into buffer
fn read_full<R: Read + ?Sized>(reader: &mut R, buf: &mut [u8]) -> Result<usize> {
    let mut total = 0;
    while total < buf.len() {
        match reader.read(&mut buf[total..]) {
            Ok(0) => break,
            Ok(n) => total += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(Error::Io(e)),
        }
    }
    Ok(total)
}

// ============================================================================
// UNIT TESTS
// ============================================================================
