#![deny(unsafe_code)]

mod commands;
mod exit_code;

use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use revmount_core::HarnessError;
use tracing_subscriber::EnvFilter;

use crate::commands::{list, run};

/// Differential tests for mounted revision views of backup archives
#[derive(Parser)]
#[command(name = "revmount")]
#[command(author, version)]
#[command(propagate_version = true)]
#[command(after_help = "EXAMPLES:
    # Show every generated case
    revmount list

    # Run the nested fixtures against the real tools
    revmount run --filter nested

    # Check the harness itself without rdiff-backup or FUSE
    revmount run --simulate

    # Run extra fixtures in latest-only mode
    revmount run --fixtures fixtures.toml --mode last
")]
struct Cli {
    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Configuration file (default: $REVMOUNT_CONFIG or ~/.config/revmount/config.toml)
    #[arg(long, value_name = "PATH", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the generated test cases
    List(list::Args),

    /// Build, mount and verify test cases
    Run(run::Args),
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::from(exit_code::SUCCESS),
        Err(e) => {
            let code = categorize_error(&e);

            let args: Vec<String> = std::env::args().collect();
            let is_quiet = args.iter().any(|a| a == "-q" || a == "--quiet");

            if !is_quiet {
                eprintln!("Error: {e:#}");
            }

            ExitCode::from(code)
        }
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    if !cli.quiet {
        setup_tracing(cli.verbose);
    }

    match cli.command {
        Commands::List(args) => list::execute(&args, cli.quiet),
        Commands::Run(args) => run::execute(&args, cli.config.as_deref(), cli.quiet),
    }
}

/// Set up tracing/logging based on verbosity level
fn setup_tracing(verbose: u8) {
    let filter = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .with_writer(io::stderr)
        .init();
}

/// Categorize an error into an exit code using typed error downcasting
fn categorize_error(e: &anyhow::Error) -> u8 {
    for cause in e.chain() {
        if let Some(harness_err) = cause.downcast_ref::<HarnessError>() {
            return match harness_err {
                HarnessError::Verification(_) => exit_code::VERIFICATION_FAILED,
                HarnessError::Config(_) => exit_code::CONFIG_INVALID,
                HarnessError::InvalidFixture { .. } => exit_code::USAGE_ERROR,
                err if err.is_tool_failure() => exit_code::TOOL_FAILED,
                _ => exit_code::GENERAL_ERROR,
            };
        }
    }
    exit_code::GENERAL_ERROR
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use revmount_core::VerifyFailure;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_categorize_error() {
        let verification = anyhow::Error::new(HarnessError::from(VerifyFailure::EmptyFixture))
            .context("1 of 1 case(s) failed");
        assert_eq!(categorize_error(&verification), exit_code::VERIFICATION_FAILED);

        let config = anyhow::Error::new(HarnessError::Config("tools.backup is empty".into()));
        assert_eq!(categorize_error(&config), exit_code::CONFIG_INVALID);

        let spawn = anyhow::Error::new(HarnessError::Spawn {
            tool: "rdiff-backup".into(),
            source: io::Error::from(io::ErrorKind::NotFound),
        });
        assert_eq!(categorize_error(&spawn), exit_code::TOOL_FAILED);

        assert_eq!(categorize_error(&anyhow::anyhow!("boom")), exit_code::GENERAL_ERROR);
    }
}
