//! Check, write and verify commands
//!
//! All three drive a [`TestRunner`] with a different [`RunPlan`]:
//! - `check` writes the test file and reads it back
//! - `write` only lays the file down, for a later `verify`
//! - `verify` reads back a file written earlier
//!
//! The command is responsible for the overwrite prompt, progress display and the
//! final summary. The process exit code comes from the run report.

use anyhow::{bail, Context, Result};
use console::{style, Term};
use dialoguer::Confirm;
use serde::Serialize;
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use rotcheck_core::runner::parent_dir;
use rotcheck_core::{
    Config, Error, Outcome, RunPlan, RunReport, StopReason, TestRunner, VerificationResult,
    WriteResult, WriteTarget,
};

use crate::progress::{create_progress_bar, human_size, update_verify, update_write};
use crate::space::PlatformFreeSpace;
use crate::EXIT_INTERRUPTED;

/// Mismatches listed individually in the human-readable summary
const SHOWN_MISMATCHES: usize = 8;

/// Arguments shared by the check, write and verify commands
pub struct RunArgs {
    pub plan: RunPlan,
    pub config: Config,
    pub json: bool,
    pub skip_confirm: bool,
    pub cancel_flag: Arc<AtomicBool>,
    pub silent: bool,
}

/// Conditionally println based on silent mode
macro_rules! println_if {
    ($silent:expr) => {
        if !$silent {
            println!();
        }
    };
    ($silent:expr, $($arg:tt)*) => {
        if !$silent {
            println!($($arg)*);
        }
    };
}

/// Execute a run and return the process exit code
pub fn execute(args: RunArgs) -> Result<i32> {
    let RunArgs {
        mut plan,
        config,
        json,
        skip_confirm,
        cancel_flag,
        silent,
    } = args;

    // JSON mode keeps stdout for the report alone
    let quiet = silent || json;

    println_if!(
        quiet,
        "{} {}",
        style("Target:").bold(),
        style(plan.target.display()).cyan()
    );

    if plan.write.is_some() && plan.target.exists() && !plan.overwrite {
        if !confirm_overwrite(&plan.target, skip_confirm)? {
            println_if!(quiet, "{}", style("Aborted.").yellow());
            return Ok(1);
        }
        plan.overwrite = true;
    }

    let write_total = match plan.write {
        Some(WriteTarget::Bytes(length)) => {
            println_if!(
                quiet,
                "  {} Writing {}",
                style("ℹ").blue(),
                human_size(length)
            );
            length
        }
        Some(WriteTarget::Fill) => {
            let dir = parent_dir(&plan.target);
            let space = rotcheck_platform::space_info(dir)
                .with_context(|| format!("Failed to query free space for {}", dir.display()))?;
            println_if!(
                quiet,
                "  {} Filling {} free ({} of {} in use)",
                style("ℹ").blue(),
                human_size(space.available),
                human_size(space.used()),
                human_size(space.total)
            );
            space.available
        }
        None => 0,
    };

    let write_pb = create_progress_bar(write_total, "Writing", quiet)?;
    let verify_pb = create_progress_bar(0, "Verifying", quiet)?;

    let write_bar = write_pb.clone();
    let finished_write_bar = write_pb.clone();
    let verify_bar = verify_pb.clone();

    let runner = TestRunner::new(config, Box::new(PlatformFreeSpace))
        .with_cancel_flag(cancel_flag)
        .on_write_progress(move |progress| update_write(&write_bar, progress))
        .on_verify_progress(move |progress| {
            if !finished_write_bar.is_finished() {
                finished_write_bar.finish_and_clear();
            }
            update_verify(&verify_bar, progress);
        });

    let result = runner.run(&plan);

    write_pb.finish_and_clear();
    verify_pb.finish_and_clear();

    let report = match result {
        Ok(report) => report,
        Err(Error::Cancelled) => {
            println_if!(quiet, "\n{}", style("Run cancelled by user.").yellow());
            if plan.target.exists() {
                println_if!(
                    quiet,
                    "  {} left in place",
                    style(plan.target.display()).cyan()
                );
            }
            return Ok(EXIT_INTERRUPTED);
        }
        Err(e) => bail!("Run failed: {}", e),
    };

    if json {
        if !silent {
            println!("{}", render_json(&plan.target, &report)?);
        }
    } else {
        print_summary(&plan, &report, silent);
    }

    Ok(report.exit_code())
}

/// Ask before replacing an existing file
fn confirm_overwrite(target: &Path, skip_confirm: bool) -> Result<bool> {
    if skip_confirm {
        tracing::debug!("Overwriting {} without asking", target.display());
        return Ok(true);
    }

    if !Term::stderr().is_term() {
        bail!(
            "{} already exists.\n\
             Pass --overwrite to replace it.",
            target.display()
        );
    }

    let proceed = Confirm::new()
        .with_prompt(format!("{} already exists. Overwrite it?", target.display()))
        .default(false)
        .interact()?;

    Ok(proceed)
}

fn print_summary(plan: &RunPlan, report: &RunReport, silent: bool) {
    if let Some(write) = &report.write {
        print_write(write, silent);
    }

    if let Some(verification) = &report.verification {
        print_verification(verification, silent);
    }

    if report.deleted {
        println_if!(
            silent,
            "  {} Removed {}",
            style("✓").green(),
            plan.target.display()
        );
    }

    println_if!(silent);
    match report.outcome() {
        Outcome::Passed => {
            println_if!(
                silent,
                "{}",
                style("✓ No corruption detected.").green().bold()
            );
        }
        Outcome::WriteOnly => {
            println_if!(
                silent,
                "{}",
                style("✓ Write complete.").green().bold()
            );
            println_if!(
                silent,
                "  Run 'rotcheck verify {}' later to check the data.",
                plan.target.display()
            );
        }
        Outcome::MismatchesFound => {
            println_if!(
                silent,
                "{}",
                style("✗ Corruption detected!").red().bold()
            );
        }
    }
}

fn print_write(write: &WriteResult, silent: bool) {
    match write.stop_reason {
        StopReason::DiskFull => {
            println_if!(
                silent,
                "  {} Volume full after {} in {:.1}s ({})",
                style("ℹ").blue(),
                human_size(write.bytes_written),
                write.elapsed.as_secs_f64(),
                write.speed_display()
            );
        }
        StopReason::Completed | StopReason::SpaceExhausted => {
            println_if!(
                silent,
                "  {} Wrote {} in {:.1}s ({})",
                style("✓").green(),
                human_size(write.bytes_written),
                write.elapsed.as_secs_f64(),
                write.speed_display()
            );
        }
    }
}

fn print_verification(result: &VerificationResult, silent: bool) {
    if result.passed() {
        println_if!(
            silent,
            "  {} Verified {} in {:.1}s ({}), no mismatches",
            style("✓").green(),
            human_size(result.bytes_verified),
            result.elapsed.as_secs_f64(),
            result.speed_display()
        );
    } else {
        println_if!(
            silent,
            "  {} {} mismatched bytes in {}",
            style("✗").red(),
            result.mismatches,
            human_size(result.bytes_verified)
        );
    }

    println_if!(silent, "  Signature: {}", style(result.signature).bold());

    if result.first_mismatches.is_empty() {
        return;
    }

    println_if!(silent, "  First mismatches:");
    for mismatch in result.first_mismatches.iter().take(SHOWN_MISMATCHES) {
        println_if!(
            silent,
            "    offset {}: expected {:#04x}, found {:#04x}",
            mismatch.offset,
            mismatch.expected,
            mismatch.actual
        );
    }

    let shown = result.first_mismatches.len().min(SHOWN_MISMATCHES) as u64;
    if result.mismatches > shown {
        println_if!(silent, "    ... and {} more", result.mismatches - shown);
    }
}

/// Machine-readable run report
#[derive(Serialize)]
struct JsonReport<'a> {
    target: String,
    outcome: Outcome,
    exit_code: i32,
    signature: Option<String>,
    #[serde(flatten)]
    report: &'a RunReport,
}

fn render_json(target: &Path, report: &RunReport) -> Result<String> {
    let output = JsonReport {
        target: target.display().to_string(),
        outcome: report.outcome(),
        exit_code: report.exit_code(),
        signature: report
            .verification
            .as_ref()
            .map(|result| result.signature.to_string()),
        report,
    };
    serde_json::to_string_pretty(&output).context("Failed to serialize report to JSON")
}
