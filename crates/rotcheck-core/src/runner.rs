//! Test run orchestration
//!
//! A run is strictly linear: `[write] -> [verify] -> [delete] -> report`. Each phase
//! finishes before the next one opens the file. A fatal error in any phase aborts the
//! run and leaves the file as it is. Deletion happens after verification whatever
//! its outcome.

use crate::config::Config;
use crate::error::{Error, Result};
use crate::size::{format_size, WriteTarget};
use crate::verifier::{self, VerificationResult, Verifier};
use crate::writer::{self, is_disk_full, FreeSpace, WriteResult, Writer};
use serde::Serialize;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

/// Exit status for a run that completed and found mismatches
pub const EXIT_MISMATCHES: i32 = 2;

/// What a run should do with its target file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunPlan {
    /// File to write and/or verify
    pub target: PathBuf,
    /// Write directive; `None` verifies an existing file
    pub write: Option<WriteTarget>,
    /// Whether to verify the file
    pub verify: bool,
    /// Remove the file once the other phases are done
    pub delete: bool,
    /// Allow replacing an existing file
    pub overwrite: bool,
}

impl RunPlan {
    /// Write then verify
    pub fn check(target: impl Into<PathBuf>, write: WriteTarget) -> Self {
        Self {
            target: target.into(),
            write: Some(write),
            verify: true,
            delete: false,
            overwrite: false,
        }
    }

    /// Write without verifying
    pub fn write_only(target: impl Into<PathBuf>, write: WriteTarget) -> Self {
        Self {
            verify: false,
            ..Self::check(target, write)
        }
    }

    /// Verify an existing file
    pub fn verify_only(target: impl Into<PathBuf>) -> Self {
        Self {
            target: target.into(),
            write: None,
            verify: true,
            delete: false,
            overwrite: false,
        }
    }

    /// Set whether the file is deleted at the end of the run
    pub fn delete(mut self, delete: bool) -> Self {
        self.delete = delete;
        self
    }

    /// Set whether an existing file may be replaced
    pub fn overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    /// Check the plan against the current state of the filesystem
    pub fn validate(&self) -> Result<()> {
        if self.write.is_none() && !self.verify {
            return Err(Error::InvalidArgument(
                "nothing to do: neither write nor verify requested".to_string(),
            ));
        }

        let display = self.target.display().to_string();
        if self.target.is_dir() {
            return Err(Error::InvalidArgument(format!("{} is a directory", display)));
        }

        let exists = self.target.exists();
        match self.write {
            Some(_) if exists && !self.overwrite => Err(Error::TargetExists(display)),
            None if !exists => Err(Error::TargetNotFound(display)),
            _ => Ok(()),
        }
    }
}

/// Final status of a run that did not hit a fatal error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// Verification found no mismatches
    Passed,
    /// The file was written and verification was skipped
    WriteOnly,
    /// Verification found at least one mismatching byte
    MismatchesFound,
}

/// Results of every phase that ran
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// Write phase result
    pub write: Option<WriteResult>,
    /// Verify phase result
    pub verification: Option<VerificationResult>,
    /// Whether the file was removed
    pub deleted: bool,
}

impl RunReport {
    /// Overall outcome
    pub fn outcome(&self) -> Outcome {
        match &self.verification {
            Some(result) if result.passed() => Outcome::Passed,
            Some(_) => Outcome::MismatchesFound,
            None => Outcome::WriteOnly,
        }
    }

    /// Process exit status for this report
    pub fn exit_code(&self) -> i32 {
        match self.outcome() {
            Outcome::Passed | Outcome::WriteOnly => 0,
            Outcome::MismatchesFound => EXIT_MISMATCHES,
        }
    }
}

/// Runs a [`RunPlan`] against the filesystem
pub struct TestRunner {
    config: Config,
    free_space: Box<dyn FreeSpace>,
    write_progress: Option<writer::ProgressCallback>,
    verify_progress: Option<verifier::ProgressCallback>,
    cancel_flag: Arc<AtomicBool>,
}

impl TestRunner {
    /// Create a runner that asks `free_space` for room in fill mode
    pub fn new(config: Config, free_space: Box<dyn FreeSpace>) -> Self {
        Self {
            config,
            free_space,
            write_progress: None,
            verify_progress: None,
            cancel_flag: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Set the write phase progress callback
    pub fn on_write_progress<F>(mut self, callback: F) -> Self
    where
        F: FnMut(&writer::WriteProgress) + Send + 'static,
    {
        self.write_progress = Some(Box::new(callback));
        self
    }

    /// Set the verify phase progress callback
    pub fn on_verify_progress<F>(mut self, callback: F) -> Self
    where
        F: FnMut(&verifier::VerificationProgress) + Send + 'static,
    {
        self.verify_progress = Some(Box::new(callback));
        self
    }

    /// Share an existing cancellation flag with both engines
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel_flag = flag;
        self
    }

    /// Get a handle to cancel the run at the next chunk boundary
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel_flag)
    }

    /// Execute every phase of `plan`
    pub fn run(mut self, plan: &RunPlan) -> Result<RunReport> {
        plan.validate()?;

        let write = match plan.write {
            Some(target) => Some(self.write_phase(&plan.target, target)?),
            None => None,
        };

        let verification = if plan.verify {
            Some(self.verify_phase(&plan.target)?)
        } else {
            None
        };

        let deleted = if plan.delete {
            fs::remove_file(&plan.target)?;
            tracing::info!("Deleted {}", plan.target.display());
            true
        } else {
            false
        };

        Ok(RunReport {
            write,
            verification,
            deleted,
        })
    }

    fn write_phase(&mut self, path: &Path, target: WriteTarget) -> Result<WriteResult> {
        tracing::info!("Writing {} to {}", target, path.display());

        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;

        let mut writer = Writer::with_config(self.config.write_config())
            .with_cancel_flag(Arc::clone(&self.cancel_flag));
        if let Some(callback) = self.write_progress.take() {
            writer = writer.on_progress(callback);
        }

        let result = match target {
            WriteTarget::Bytes(length) => writer.write(&mut file, length)?,
            WriteTarget::Fill => {
                let dir = parent_dir(path);
                writer.fill(&mut file, self.free_space.as_ref(), dir)?
            }
        };

        if result.disk_full() {
            // Drop whatever a failed partial write left past the accepted length
            file.set_len(result.bytes_written)?;
        }

        if self.config.sync_on_complete {
            sync_file(&file)?;
        }

        tracing::info!(
            "Wrote {} in {:.1}s ({})",
            format_size(result.bytes_written),
            result.elapsed.as_secs_f64(),
            result.speed_display()
        );

        Ok(result)
    }

    fn verify_phase(&mut self, path: &Path) -> Result<VerificationResult> {
        let mut file = File::open(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => Error::TargetNotFound(path.display().to_string()),
            _ => Error::Io(e),
        })?;
        let length = file.metadata()?.len();

        tracing::info!("Verifying {} of {}", format_size(length), path.display());

        let mut verifier = Verifier::with_config(self.config.verify_config())
            .with_cancel_flag(Arc::clone(&self.cancel_flag));
        if let Some(callback) = self.verify_progress.take() {
            verifier = verifier.on_progress(callback);
        }

        let result = verifier.verify(&mut file, length)?;

        if result.passed() {
            tracing::info!("Verified {} with no mismatches", format_size(length));
        } else {
            tracing::warn!(
                "{} mismatches, signature {}",
                result.mismatches,
                result.signature
            );
        }

        Ok(result)
    }
}

/// Flush the file to stable storage; a full volume at this point only loses the tail
fn sync_file(file: &File) -> Result<()> {
    match file.sync_all() {
        Ok(()) => Ok(()),
        Err(e) if is_disk_full(&e) => {
            tracing::warn!("Volume full while syncing: {}", e);
            Ok(())
        }
        Err(e) => Err(Error::Io(e)),
    }
}

/// Directory whose volume holds `path`
pub fn parent_dir(path: &Path) -> &Path {
    path.parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."))
}

// ============================================================================
// UNIT TESTS
// ============================================================================
