//! Progress bar utilities for the CLI

use anyhow::Result;
use humansize::{format_size, DECIMAL};
use indicatif::{ProgressBar, ProgressStyle};
use rotcheck_core::{VerificationProgress, WriteProgress};

/// Create a progress bar for one phase of a run
///
/// `total` may be zero when the final size is not known yet (fill mode before the
/// first free-space estimate); the bar grows when progress reports a total.
pub fn create_progress_bar(total: u64, operation: &str, silent: bool) -> Result<ProgressBar> {
    if silent {
        return Ok(ProgressBar::hidden());
    }

    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(&format!(
                "  {{spinner:.green}} {} [{{bar:40.cyan/blue}}] {{bytes}}/{{total_bytes}} {{msg}}",
                operation
            ))?
            .progress_chars("█▓░"),
    );

    Ok(pb)
}

/// Mirror a write progress report onto `pb`
pub fn update_write(pb: &ProgressBar, progress: &WriteProgress) {
    if pb.length() != Some(progress.total_bytes) {
        pb.set_length(progress.total_bytes);
    }
    pb.set_position(progress.bytes_written);
    pb.set_message(format!(
        "{}, ETA: {}",
        progress.speed_display(),
        progress.eta_display()
    ));
}

/// Mirror a verify progress report onto `pb`
pub fn update_verify(pb: &ProgressBar, progress: &VerificationProgress) {
    pb.set_length(progress.total_bytes);
    pb.set_position(progress.bytes_verified);
    pb.set_message(verify_message(progress));
}

fn verify_message(progress: &VerificationProgress) -> String {
    if progress.mismatches == 0 {
        format!(
            "{}, ETA: {}",
            progress.speed_display(),
            progress.eta_display()
        )
    } else {
        format!(
            "{}, ETA: {}, {} mismatched",
            progress.speed_display(),
            progress.eta_display(),
            progress.mismatches
        )
    }
}

/// Decimal human-readable size ("1.50 GB")
pub fn human_size(bytes: u64) -> String {
    format_size(bytes, DECIMAL)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn verify_progress(mismatches: u64) -> VerificationProgress {
        VerificationProgress {
            bytes_verified: 500,
            total_bytes: 1000,
            mismatches,
            speed_bps: 1_000_000,
            eta_seconds: Some(3),
            elapsed: Duration::from_secs(1),
        }
    }

    #[test]
    fn test_hidden_when_silent() {
        let pb = create_progress_bar(100, "Writing", true).unwrap();
        assert!(pb.is_hidden());
    }

    #[test]
    fn test_update_write_grows_length() {
        let pb = create_progress_bar(0, "Writing", false).unwrap();
        let progress = WriteProgress {
            bytes_written: 4096,
            total_bytes: 1_000_000,
            speed_bps: 0,
            eta_seconds: None,
            elapsed: Duration::ZERO,
        };
        update_write(&pb, &progress);
        assert_eq!(pb.length(), Some(1_000_000));
        assert_eq!(pb.position(), 4096);
    }

    #[test]
    fn test_update_verify_position() {
        let pb = create_progress_bar(0, "Verifying", false).unwrap();
        update_verify(&pb, &verify_progress(0));
        assert_eq!(pb.length(), Some(1000));
        assert_eq!(pb.position(), 500);
    }

    #[test]
    fn test_verify_message_mentions_mismatches() {
        assert!(!verify_message(&verify_progress(0)).contains("mismatched"));
        assert!(verify_message(&verify_progress(7)).contains("7 mismatched"));
    }

    #[test]
    fn test_human_size() {
        assert_eq!(human_size(0), "0 B");
        assert_eq!(human_size(1_234_000_000), "1.23 GB");
    }
}
