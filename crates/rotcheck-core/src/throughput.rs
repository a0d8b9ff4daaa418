//! Throughput estimation and progress cadence
//!
//! Engines take one speed sample each time the processed byte count crosses a
//! fixed absolute threshold. Reporting is therefore driven by bytes, not by a
//! wall-clock timer, and its cadence scales with the device speed.

use std::collections::VecDeque;
use std::time::Instant;

/// Default number of samples kept in the window
pub const DEFAULT_THROUGHPUT_WINDOW: usize = 64;

/// Maximum share of the window that may be discarded as outliers
const MAX_DISCARD_FRACTION: f64 = 0.2;

/// Ratio between mean and worst sample below which trimming stops
const OUTLIER_RATIO: f64 = 1.2;

/// Bounded window of speed samples with an outlier-trimmed average
#[derive(Debug, Clone)]
pub struct ThroughputEstimator {
    samples: VecDeque<f64>,
    capacity: usize,
    mark: Option<(Instant, u64)>,
}

impl ThroughputEstimator {
    /// Create an estimator keeping at most `capacity` samples
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
            mark: None,
        }
    }

    /// Set the reference point for the first interval
    pub fn start(&mut self, at: Instant, bytes: u64) {
        self.mark = Some((at, bytes));
    }

    /// Take a sample for the interval ending at `at` with `bytes` processed in total.
    ///
    /// Intervals with no measurable elapsed time only move the reference point.
    pub fn checkpoint(&mut self, at: Instant, bytes: u64) {
        if let Some((since, base)) = self.mark {
            let secs = at.saturating_duration_since(since).as_secs_f64();
            if secs > 0.0 {
                self.push_sample(bytes.saturating_sub(base) as f64 / secs);
            }
        }
        self.mark = Some((at, bytes));
    }

    /// Append a bytes-per-second sample, evicting the oldest past capacity
    pub fn push_sample(&mut self, bytes_per_second: f64) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(bytes_per_second);
    }

    /// Number of samples currently held
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Whether no sample has been taken yet
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Outlier-trimmed average speed in bytes per second (0 with no samples)
    pub fn average(&self) -> u64 {
        let samples: Vec<f64> = self.samples.iter().copied().collect();
        trimmed_mean(&samples).map_or(0, |mean| mean.max(0.0) as u64)
    }
}

impl Default for ThroughputEstimator {
    fn default() -> Self {
        Self::new(DEFAULT_THROUGHPUT_WINDOW)
    }
}

/// Mean of `samples` after discarding transient outliers.
///
/// The sample farthest from the current mean is dropped while fewer than 20% of the
/// samples have been dropped and `max(mean, worst) / min(mean, worst)` is at least
/// 1.2. Returns `None` for an empty slice.
pub fn trimmed_mean(samples: &[f64]) -> Option<f64> {
    if samples.is_empty() {
        return None;
    }

    let limit = samples.len() as f64 * MAX_DISCARD_FRACTION;
    let mut kept: Vec<f64> = samples.to_vec();
    let mut discarded = 0usize;

    loop {
        let mean = kept.iter().sum::<f64>() / kept.len() as f64;

        if kept.len() == 1 || discarded as f64 >= limit {
            return Some(mean);
        }

        let (worst_idx, worst) = kept
            .iter()
            .copied()
            .enumerate()
            .max_by(|(_, a), (_, b)| (a - mean).abs().total_cmp(&(b - mean).abs()))?;

        let hi = mean.max(worst);
        let lo = mean.min(worst);
        if hi <= 0.0 {
            return Some(mean);
        }
        // A zero-speed stall against a positive mean counts as an outlier
        if lo > 0.0 && hi / lo < OUTLIER_RATIO {
            return Some(mean);
        }

        kept.swap_remove(worst_idx);
        discarded += 1;
    }
}

/// Fixed absolute byte thresholds at which progress is reported
#[derive(Debug, Clone)]
pub struct Checkpoints {
    interval: u64,
    next: u64,
}

impl Checkpoints {
    /// Report every `interval` bytes (an interval of 0 is treated as 1)
    pub fn new(interval: u64) -> Self {
        let interval = interval.max(1);
        Self {
            interval,
            next: interval,
        }
    }

    /// Returns true once per crossing when `total` reaches the next threshold
    pub fn crossed(&mut self, total: u64) -> bool {
        if total < self.next {
            return false;
        }
        // Skip every threshold a single large step jumped over
        self.next = (total / self.interval + 1) * self.interval;
        true
    }

    /// Reporting interval in bytes
    pub fn interval(&self) -> u64 {
        self.interval
    }
}

/// Calculate estimated time remaining
pub(crate) fn calculate_eta(done: u64, total: u64, speed_bps: u64) -> Option<u64> {
    if speed_bps == 0 || done >= total {
        return None;
    }

    let remaining = total.saturating_sub(done);
    Some(remaining / speed_bps)
}

/// Format speed for display
pub fn format_speed(bytes_per_second: u64) -> String {
    const KB: u64 = 1000;
    const MB: u64 = KB * 1000;
    const GB: u64 = MB * 1000;

    if bytes_per_second >= GB {
        format!("{:.1} GB/s", bytes_per_second as f64 / GB as f64)
    } else if bytes_per_second >= MB {
        format!("{:.1} MB/s", bytes_per_second as f64 / MB as f64)
    } else if bytes_per_second >= KB {
        format!("{:.1} kB/s", bytes_per_second as f64 / KB as f64)
    } else {
        format!("{} B/s", bytes_per_second)
    }
}

/// Format duration for display
pub fn format_duration(seconds: u64) -> String {
    if seconds >= 3600 {
        let hours = seconds / 3600;
        let mins = (seconds % 3600) / 60;
        format!("{}h {}m", hours, mins)
    } else if seconds >= 60 {
        let mins = seconds / 60;
        let secs = seconds % 60;
        format!("{}m {}s", mins, secs)
    } else {
        format!("{}s", seconds)
    }
}

// ============================================================================
// UNIT TESTS
// ============================================================================
