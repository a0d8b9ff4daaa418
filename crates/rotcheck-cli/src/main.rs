//! Rotcheck - detect silent data corruption on storage devices
//!
//! # Usage
//!
//! ```bash
//! # Fill a USB stick with test data and read it back
//! rotcheck check /media/usb/rotcheck.dat --size fill
//!
//! # Write 10 GB now, verify next month
//! rotcheck write /mnt/archive/rotcheck.dat --size 10G
//! rotcheck verify /mnt/archive/rotcheck.dat
//! ```

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use clap_mangen::Man;
use console::style;
use rotcheck_core::size::parse_size_with_default_unit;
use rotcheck_core::{Config, Settings, WriteTarget};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

mod commands;
mod progress;
mod space;

/// Exit status for errors, including command-line usage errors
const EXIT_FAILURE: i32 = 1;

/// Exit status after the user interrupted a run
pub(crate) const EXIT_INTERRUPTED: i32 = 130;

/// Rotcheck - detect silent data corruption on storage devices
#[derive(Parser)]
#[command(name = "rotcheck")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Suppress ALL output (implies --quiet and --yes)
    #[arg(long, global = true)]
    silent: bool,

    /// Answer yes to confirmation prompts
    #[arg(short = 'y', long, global = true)]
    yes: bool,

    /// Use this configuration file instead of the default
    #[arg(long, global = true, value_name = "FILE", env = "ROTCHECK_CONFIG")]
    config: Option<PathBuf>,

    /// I/O chunk size (e.g., 1Mi, 4Mi, 512Ki)
    #[arg(long, global = true, value_name = "SIZE")]
    chunk_size: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a test file and verify it
    Check {
        /// File to create on the volume under test
        path: PathBuf,

        /// Bytes to write (e.g., 500M, 10G, 1.5Ti) or "fill" for all free space
        #[arg(short, long, value_name = "SIZE")]
        size: WriteTarget,

        /// Replace the file if it already exists
        #[arg(long)]
        overwrite: bool,

        /// Remove the file after verification
        #[arg(long)]
        delete: bool,

        /// Output the result in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Write a test file without verifying it
    Write {
        /// File to create on the volume under test
        path: PathBuf,

        /// Bytes to write (e.g., 500M, 10G, 1.5Ti) or "fill" for all free space
        #[arg(short, long, value_name = "SIZE")]
        size: WriteTarget,

        /// Replace the file if it already exists
        #[arg(long)]
        overwrite: bool,
    },

    /// Verify a previously written test file
    Verify {
        /// Test file to read back
        path: PathBuf,

        /// Remove the file after verification
        #[arg(long)]
        delete: bool,

        /// Output the result in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Show or initialize the configuration file
    Config {
        /// Create a configuration file with default values
        #[arg(long)]
        init: bool,

        /// Print the configuration file path
        #[arg(long)]
        path: bool,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },

    /// Generate man pages
    Mangen {
        /// Output directory for man pages
        #[arg(short, long, default_value = ".")]
        out_dir: String,
    },
}

fn main() {
    // Set up panic handler for nicer error messages
    std::panic::set_hook(Box::new(|panic_info| {
        eprintln!("{} {}", style("Error:").red().bold(), panic_info);
    }));

    match run() {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("{} {}", style("Error:").red().bold(), e);

            // Show cause chain in verbose mode
            if std::env::var("RUST_BACKTRACE").is_ok() {
                let mut source = e.source();
                while let Some(cause) = source {
                    eprintln!("  {} {}", style("Caused by:").yellow(), cause);
                    source = cause.source();
                }
            }

            std::process::exit(EXIT_FAILURE);
        }
    }
}

fn run() -> Result<i32> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        // --help and --version
        Err(e) if !e.use_stderr() => e.exit(),
        Err(e) => {
            e.print()?;
            return Ok(EXIT_FAILURE);
        }
    };

    let config_path = cli.config.clone().or_else(Settings::config_path);
    let (settings, settings_error) = match config_path.as_deref() {
        Some(path) if path.exists() => match Settings::read_from_path(path) {
            Ok(settings) => (settings, None),
            Err(e) => (Settings::default(), Some(e)),
        },
        _ => (Settings::default(), None),
    };

    // Initialize logging
    // --silent implies --quiet (no logs at all, not even errors to tracing)
    let quiet = cli.quiet || settings.behavior.quiet;
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else if quiet || cli.silent {
        EnvFilter::new("off")
    } else {
        EnvFilter::new("info")
    };

    // Logs go to stderr so --json output stays parseable
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();

    match settings_error {
        Some(e) => tracing::warn!("{}, using defaults", e),
        None => tracing::debug!("Settings from {:?}", config_path),
    }

    let silent = cli.silent;

    match cli.command {
        Commands::Check {
            path,
            size,
            overwrite,
            delete,
            json,
        } => {
            let config = runtime_config(&settings, cli.chunk_size.as_deref())?;
            commands::run::execute(commands::run::RunArgs {
                plan: rotcheck_core::RunPlan::check(path, size)
                    .overwrite(overwrite)
                    .delete(delete),
                config,
                json: json || settings.behavior.json,
                skip_confirm: cli.yes || silent || settings.behavior.skip_confirmation,
                cancel_flag: install_cancel_handler(silent)?,
                silent,
            })
        }
        Commands::Write {
            path,
            size,
            overwrite,
        } => {
            let config = runtime_config(&settings, cli.chunk_size.as_deref())?;
            commands::run::execute(commands::run::RunArgs {
                plan: rotcheck_core::RunPlan::write_only(path, size).overwrite(overwrite),
                config,
                json: settings.behavior.json,
                skip_confirm: cli.yes || silent || settings.behavior.skip_confirmation,
                cancel_flag: install_cancel_handler(silent)?,
                silent,
            })
        }
        Commands::Verify { path, delete, json } => {
            let config = runtime_config(&settings, cli.chunk_size.as_deref())?;
            commands::run::execute(commands::run::RunArgs {
                plan: rotcheck_core::RunPlan::verify_only(path).delete(delete),
                config,
                json: json || settings.behavior.json,
                skip_confirm: cli.yes || silent || settings.behavior.skip_confirmation,
                cancel_flag: install_cancel_handler(silent)?,
                silent,
            })
        }
        Commands::Config { init, path, json } => {
            commands::config::execute(commands::config::ConfigArgs {
                init,
                path,
                json,
                silent,
                config_file: cli.config,
            })?;
            Ok(0)
        }
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            let name = cmd.get_name().to_string();
            generate(shell, &mut cmd, name, &mut std::io::stdout());
            Ok(0)
        }
        Commands::Mangen { out_dir } => {
            generate_man_pages(Path::new(&out_dir), silent)?;
            Ok(0)
        }
    }
}

/// Build the runtime configuration from the settings file and command-line overrides
fn runtime_config(settings: &Settings, chunk_size: Option<&str>) -> Result<Config> {
    let mut config = settings
        .to_config()
        .context("Invalid configuration file")?;

    if let Some(chunk_size) = chunk_size {
        let bytes = parse_size_with_default_unit(chunk_size, 1)
            .with_context(|| format!("Invalid chunk size: {}", chunk_size))?;
        let bytes = usize::try_from(bytes)
            .with_context(|| format!("Chunk size too large: {}", chunk_size))?;
        config = config.chunk_size(bytes);
    }

    tracing::debug!(
        "Chunk size {} bytes, progress every {} bytes",
        config.chunk_size,
        config.progress_interval
    );
    Ok(config)
}

/// Ctrl+C cancels at the next chunk; a second Ctrl+C exits immediately
fn install_cancel_handler(silent: bool) -> Result<Arc<AtomicBool>> {
    let cancel = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&cancel);

    ctrlc::set_handler(move || {
        if flag.swap(true, Ordering::SeqCst) {
            // Second Ctrl+C, force exit
            if !silent {
                eprintln!("\n{}", style("Forced exit").red().bold());
            }
            std::process::exit(EXIT_INTERRUPTED);
        }
        if !silent {
            eprintln!(
                "\n{}",
                style("Cancelling... Press Ctrl+C again to force exit").yellow()
            );
        }
    })
    .context("Failed to install Ctrl+C handler")?;

    Ok(cancel)
}

fn generate_man_pages(out_path: &Path, silent: bool) -> Result<()> {
    let cmd = Cli::command();
    std::fs::create_dir_all(out_path)?;

    // Generate main man page
    let man = Man::new(cmd.clone());
    let mut buffer = Vec::new();
    man.render(&mut buffer)?;
    std::fs::write(out_path.join("rotcheck.1"), buffer)?;
    if !silent {
        println!("Generated: {}", out_path.join("rotcheck.1").display());
    }

    // Generate man pages for subcommands
    for subcommand in cmd.get_subcommands() {
        let name = subcommand.get_name();
        // Skip hidden commands and meta commands
        if subcommand.is_hide_set() || name == "completions" || name == "mangen" || name == "help"
        {
            continue;
        }

        let man = Man::new(subcommand.clone());
        let mut buffer = Vec::new();
        man.render(&mut buffer)?;
        let filename = format!("rotcheck-{}.1", name);
        std::fs::write(out_path.join(&filename), buffer)?;
        if !silent {
            println!("Generated: {}", out_path.join(&filename).display());
        }
    }

    if !silent {
        println!(
            "\nInstall with: sudo cp {}/*.1 /usr/local/share/man/man1/",
            out_path.display()
        );
    }
    Ok(())
}
