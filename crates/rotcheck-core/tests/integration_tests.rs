//! Integration tests for rotcheck-core
//!
//! These tests run the full write and verify pipeline against temporary files.

use rotcheck_core::{
    Config, Error, FreeSpace, Generator, Outcome, RunPlan, Signature, StopReason, TestRunner,
    VerifyConfig, Verifier, WriteConfig, WriteTarget, Writer, BLOCK_SIZE,
};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

/// Reports a fixed amount of free space
struct FixedSpace(u64);

impl FreeSpace for FixedSpace {
    fn available_bytes(&self, _dir: &Path) -> io::Result<u64> {
        Ok(self.0)
    }
}

/// Reports a shrinking amount of free space on every query
struct ShrinkingSpace {
    remaining: AtomicU64,
    step: u64,
}

impl FreeSpace for ShrinkingSpace {
    fn available_bytes(&self, _dir: &Path) -> io::Result<u64> {
        let current = self.remaining.load(Ordering::SeqCst);
        self.remaining
            .store(current.saturating_sub(self.step), Ordering::SeqCst);
        Ok(current)
    }
}

fn config() -> Config {
    Config::new().sync_on_complete(false)
}

fn runner() -> TestRunner {
    TestRunner::new(config(), Box::new(FixedSpace(0)))
}

fn set_byte(path: &Path, offset: u64, value: u8) {
    let mut file = OpenOptions::new().write(true).open(path).unwrap();
    file.seek(SeekFrom::Start(offset)).unwrap();
    file.write_all(&[value]).unwrap();
}

fn xor_byte(path: &Path, offset: u64, mask: u8) {
    let data = fs::read(path).unwrap();
    set_byte(path, offset, data[offset as usize] ^ mask);
}

fn verify(path: &Path) -> (u64, Signature) {
    let report = runner().run(&RunPlan::verify_only(path)).unwrap();
    let result = report.verification.unwrap();
    (result.mismatches, result.signature)
}

// ============================================================================
// Generator properties
// ============================================================================

#[test]
fn test_generator_split_is_chunking_independent() {
    let total = BLOCK_SIZE * 1000;
    let mut whole = vec![0u8; total];
    Generator::new().fill(&mut whole).unwrap();

    for split in [BLOCK_SIZE, BLOCK_SIZE * 7, BLOCK_SIZE * 500, total - BLOCK_SIZE] {
        let mut parts = vec![0u8; total];
        let mut generator = Generator::new();
        let (first, second) = parts.split_at_mut(split);
        generator.fill(first).unwrap();
        generator.fill(second).unwrap();
        assert_eq!(parts, whole, "split at {}", split);
    }
}

#[test]
fn test_generator_rejects_unaligned() {
    let mut buf = vec![0u8; BLOCK_SIZE + 1];
    assert!(matches!(
        Generator::new().fill(&mut buf),
        Err(Error::InvalidArgument(_))
    ));
}

// ============================================================================
// End-to-end scenarios
// ============================================================================

#[test]
fn test_one_million_bytes_then_single_corruption() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("rotcheck.dat");

    let report = runner()
        .run(&RunPlan::check(&path, WriteTarget::Bytes(1_000_000)))
        .unwrap();
    assert_eq!(report.outcome(), Outcome::Passed);
    assert_eq!(fs::metadata(&path).unwrap().len(), 1_000_000);
    let clean = report.verification.unwrap();
    assert_eq!((clean.mismatches, clean.signature), (0, Signature::CLEAN));

    set_byte(&path, 12345, 0x55);

    let (mismatches, first) = verify(&path);
    assert_eq!(mismatches, 1);
    assert_eq!(first, Signature(0xfa57_9421));
    assert_ne!(first, clean.signature);

    // Same persisted bytes, same signature
    assert_eq!(verify(&path), (1, first));
}

#[test]
fn test_corruption_offset_is_reported() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("rotcheck.dat");
    runner()
        .run(&RunPlan::write_only(&path, WriteTarget::Bytes(300_000)))
        .unwrap();

    xor_byte(&path, 123_457, 0x01);

    let report = runner().run(&RunPlan::verify_only(&path)).unwrap();
    assert_eq!(report.exit_code(), 2);
    let result = report.verification.unwrap();
    assert_eq!(result.mismatches, 1);
    assert_eq!(result.first_mismatch_offset(), Some(123_457));
}

#[test]
fn test_different_corruptions_have_different_signatures() {
    let dir = TempDir::new().unwrap();
    let a = dir.path().join("a.dat");
    let b = dir.path().join("b.dat");
    for path in [&a, &b] {
        runner()
            .run(&RunPlan::write_only(path, WriteTarget::Bytes(200_000)))
            .unwrap();
    }

    xor_byte(&a, 10, 0xff);
    xor_byte(&a, 150_000, 0xff);
    xor_byte(&b, 11, 0xff);
    xor_byte(&b, 150_000, 0xff);

    let (count_a, sig_a) = verify(&a);
    let (count_b, sig_b) = verify(&b);
    assert_eq!(count_a, 2);
    assert_eq!(count_b, 2);
    assert_ne!(sig_a, sig_b);
}

#[test]
fn test_zero_length_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("empty.dat");

    let report = runner()
        .run(&RunPlan::check(&path, WriteTarget::Bytes(0)))
        .unwrap();

    assert_eq!(report.outcome(), Outcome::Passed);
    assert_eq!(report.verification.unwrap().signature, Signature::CLEAN);
    assert_eq!(fs::metadata(&path).unwrap().len(), 0);
}

#[test]
fn test_many_chunks_unaligned_length() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("rotcheck.dat");

    let report = TestRunner::new(config().chunk_size(4096), Box::new(FixedSpace(0)))
        .run(&RunPlan::check(&path, WriteTarget::Bytes(4096 * 50 + 17)))
        .unwrap();

    assert_eq!(report.outcome(), Outcome::Passed);
}

#[test]
fn test_write_and_verify_with_different_chunk_sizes() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("rotcheck.dat");
    let length = 1_000_003u64;

    let mut file = File::create(&path).unwrap();
    Writer::with_config(WriteConfig::new().chunk_size(4096))
        .write(&mut file, length)
        .unwrap();
    drop(file);

    let mut file = File::open(&path).unwrap();
    let result = Verifier::with_config(VerifyConfig::new().chunk_size(1024 * 1024))
        .verify(&mut file, length)
        .unwrap();

    assert!(result.passed());
    assert_eq!(result.bytes_verified, length);
}

#[test]
fn test_verify_length_comes_from_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("rotcheck.dat");
    runner()
        .run(&RunPlan::write_only(&path, WriteTarget::Bytes(100_000)))
        .unwrap();

    // A truncated file still verifies: its length is whatever is on disk
    let file = OpenOptions::new().write(true).open(&path).unwrap();
    file.set_len(54_321).unwrap();
    drop(file);

    let report = runner().run(&RunPlan::verify_only(&path)).unwrap();
    let result = report.verification.unwrap();
    assert!(result.passed());
    assert_eq!(result.bytes_verified, 54_321);
}

#[test]
fn test_foreign_file_fails_verification() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("zeros.dat");
    fs::write(&path, vec![0u8; 10_000]).unwrap();

    let report = runner().run(&RunPlan::verify_only(&path)).unwrap();

    assert_eq!(report.outcome(), Outcome::MismatchesFound);
    let result = report.verification.unwrap();
    assert!(result.mismatches > 9_000);
    assert_eq!(result.first_mismatches.len(), 32);
}

// ============================================================================
// Fill mode
// ============================================================================

#[test]
fn test_fill_mode_respects_free_space() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("fill.dat");
    let free = 777_777u64;

    let report = TestRunner::new(config().chunk_size(65_536), Box::new(FixedSpace(free)))
        .run(&RunPlan::check(&path, WriteTarget::Fill))
        .unwrap();

    let write = report.write.as_ref().unwrap();
    assert_eq!(write.stop_reason, StopReason::SpaceExhausted);
    assert_eq!(write.bytes_written, free);
    assert!(fs::metadata(&path).unwrap().len() <= free);
    assert_eq!(report.outcome(), Outcome::Passed);
}

#[test]
fn test_fill_mode_follows_shrinking_estimate() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("fill.dat");

    // Another process consumes space while the test runs
    let free_space = ShrinkingSpace {
        remaining: AtomicU64::new(400_000),
        step: 150_000,
    };
    let config = config().chunk_size(4096).progress_interval(65_536);

    let report = TestRunner::new(config, Box::new(free_space))
        .run(&RunPlan::check(&path, WriteTarget::Fill))
        .unwrap();

    let written = report.write.unwrap().bytes_written;
    assert!(written < 400_000, "wrote {}", written);
    assert!(report.verification.unwrap().passed());
}

#[test]
fn test_fill_mode_with_no_space() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("fill.dat");

    let report = TestRunner::new(config(), Box::new(FixedSpace(0)))
        .run(&RunPlan::check(&path, WriteTarget::Fill))
        .unwrap();

    assert_eq!(report.write.as_ref().unwrap().bytes_written, 0);
    assert_eq!(report.outcome(), Outcome::Passed);
}

// ============================================================================
// Preconditions, delete and progress
// ============================================================================

#[test]
fn test_existing_file_requires_overwrite() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("rotcheck.dat");
    fs::write(&path, b"precious").unwrap();

    let result = runner().run(&RunPlan::check(&path, WriteTarget::Bytes(1000)));
    assert!(matches!(result, Err(Error::TargetExists(_))));
    assert_eq!(fs::read(&path).unwrap(), b"precious");

    let report = runner()
        .run(&RunPlan::check(&path, WriteTarget::Bytes(1000)).overwrite(true))
        .unwrap();
    assert_eq!(report.outcome(), Outcome::Passed);
}

#[test]
fn test_delete_flag_removes_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("rotcheck.dat");

    let report = runner()
        .run(&RunPlan::check(&path, WriteTarget::Bytes(10_000)).delete(true))
        .unwrap();

    assert!(report.deleted);
    assert_eq!(report.outcome(), Outcome::Passed);
    assert!(!path.exists());
}

#[test]
fn test_progress_reported_for_both_phases() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("rotcheck.dat");

    let writes = Arc::new(AtomicU64::new(0));
    let verifies = Arc::new(AtomicU64::new(0));
    let writes_clone = Arc::clone(&writes);
    let verifies_clone = Arc::clone(&verifies);

    let config = config().chunk_size(4096).progress_interval(40_960);
    TestRunner::new(config, Box::new(FixedSpace(0)))
        .on_write_progress(move |_| {
            writes_clone.fetch_add(1, Ordering::SeqCst);
        })
        .on_verify_progress(move |p| {
            assert_eq!(p.mismatches, 0);
            verifies_clone.fetch_add(1, Ordering::SeqCst);
        })
        .run(&RunPlan::check(&path, WriteTarget::Bytes(409_600)))
        .unwrap();

    assert_eq!(writes.load(Ordering::SeqCst), 10);
    assert_eq!(verifies.load(Ordering::SeqCst), 10);
}
