//! # Rotcheck Core
//!
//! Generation and verification engine for the rotcheck storage integrity tester.
//!
//! A run writes a deterministic pseudo-random stream to a file, then re-derives the
//! same stream and compares it against what the storage returns. Every mismatching
//! byte is folded into a 32-bit [`Signature`], so repeated passes over the same
//! defect produce the same value.
//!
//! ## Modules
//!
//! - `generator`: Deterministic xorshift stream
//! - `writer`: Chunked write engine with fill mode and disk-full degradation
//! - `verifier`: Read-back comparison and mismatch accounting
//! - `signature`: CRC-32 fingerprint of the mismatch set
//! - `throughput`: Outlier-trimmed speed estimation and progress thresholds
//! - `runner`: Write, verify, delete sequencing
//! - `size`: Size and write directive parsing
//! - `error`: Error types and result aliases
//! - `config`: Runtime configuration
//! - `settings`: Persistent user settings from configuration file
//!
//! ## Example
//!
//! ```ignore
//! use rotcheck_core::{Config, RunPlan, TestRunner, WriteTarget};
//!
//! let plan = RunPlan::check("/mnt/usb/rotcheck.dat", WriteTarget::Bytes(1 << 30));
//! let report = TestRunner::new(Config::default(), Box::new(free_space)).run(&plan)?;
//!
//! if let Some(v) = &report.verification {
//!     println!("{} mismatches, signature {}", v.mismatches, v.signature);
//! }
//! std::process::exit(report.exit_code());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod generator;
pub mod runner;
pub mod settings;
pub mod signature;
pub mod size;
pub mod throughput;
pub mod verifier;
pub mod writer;

pub use config::{
    Config, CHUNK_ALIGNMENT, DEFAULT_CHUNK_SIZE, DEFAULT_PROGRESS_INTERVAL, MAX_CHUNK_SIZE,
    MIN_CHUNK_SIZE,
};
pub use error::{Error, Result};
pub use generator::{Generator, BLOCK_SIZE};
pub use runner::{Outcome, RunPlan, RunReport, TestRunner, EXIT_MISMATCHES};
pub use settings::{BehaviorSettings, Settings, SettingsError, TestSettings};
pub use signature::{Signature, SignatureBuilder};
pub use size::{format_size, parse_size, parse_write_target, WriteTarget};
pub use throughput::{format_duration, format_speed, trimmed_mean, ThroughputEstimator};
pub use verifier::{
    compare_chunk, Mismatch, MismatchLog, VerificationProgress, VerificationResult, Verifier,
    VerifyConfig, MAX_REPORTED_MISMATCHES,
};
pub use writer::{
    FreeSpace, StopReason, WriteConfig, WriteProgress, WriteResult, Writer, DISK_FULL_SHRINK_STEP,
};
