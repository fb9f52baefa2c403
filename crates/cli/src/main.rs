// ABOUTME: CLI for tidying and merging MDict dictionary source files.
// ABOUTME: Loads a JSON rule file, runs the chosen command, and logs progress to stderr.

use std::io::IsTerminal;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use mdtools_dict::{merge_files, tidy_file, MergeConfig, TidyConfig};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Tidy and merge MDict dictionary source files.
#[derive(Parser, Debug)]
#[command(name = "mdtools", version)]
#[command(about = "Tidy and merge MDict dictionary source files", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Log debug diagnostics
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Only log warnings and errors
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Rewrite every entry according to a tidy rule file
    Tidy {
        /// JSON rule file
        #[arg(short = 'c', long = "config")]
        config: PathBuf,

        /// Worker threads (overrides Jobs in the rule file)
        #[arg(long)]
        jobs: Option<usize>,
    },
    /// Merge origin blocks from a source dictionary into a target
    Merge {
        /// JSON merge file
        #[arg(short = 'c', long = "config")]
        config: PathBuf,
    },
}

fn init_logging(args: &Args) {
    let filter = if args.verbose {
        EnvFilter::new("debug")
    } else if args.quiet {
        EnvFilter::new("warn")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .with_target(false)
        .init();
}

fn run(command: Command) -> Result<()> {
    match command {
        Command::Tidy { config, jobs } => {
            let mut rules = TidyConfig::load(&config)
                .with_context(|| format!("cannot use tidy rules {}", config.display()))?;
            if let Some(jobs) = jobs {
                rules.jobs = jobs.max(1);
            }
            let summary = tidy_file(&rules).context("tidy failed")?;
            if summary.grown > 0 {
                info!(entries = summary.grown, "entries grew suspiciously, see warnings above");
            }
        }
        Command::Merge { config } => {
            let rules = MergeConfig::load(&config)
                .with_context(|| format!("cannot use merge rules {}", config.display()))?;
            merge_files(&rules).context("merge failed")?;
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(&args);

    let start = Instant::now();
    match run(args.command) {
        Ok(()) => {
            info!(elapsed = ?start.elapsed(), "process done");
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("process failed: {err:#}");
            ExitCode::from(1)
        }
    }
}
