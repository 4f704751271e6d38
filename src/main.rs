//! policy-lint - validate Azure Policy documents
//!
//! Classifies definitions, policy sets and assignment trees, checks them
//! against JSON Schema and semantic rules, and applies quick fixes.

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use policy_lint::app::AppContext;
use policy_lint::cli::Cli;
use policy_lint::cli::output::{emit_json, robot_error};
use policy_lint::{LintError, Result};

/// Exit code when documents have error-severity issues.
const EXIT_ISSUES: u8 = 1;
/// Exit code for usage, configuration or I/O failures.
const EXIT_FAILURE: u8 = 2;

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(&cli);

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        // The command already reported its findings.
        Err(LintError::ValidationFailed(_)) => ExitCode::from(EXIT_ISSUES),
        Err(e) => {
            if cli.robot {
                let code = match &e {
                    LintError::NotFound(_) => "not_found",
                    LintError::Config(_) => "config",
                    LintError::Io(_) => "io",
                    _ => "error",
                };
                let _ = emit_json(&robot_error(code, e.to_string()));
            } else {
                eprintln!("Error: {e}");
            }
            ExitCode::from(EXIT_FAILURE)
        }
    }
}

fn run(cli: &Cli) -> Result<()> {
    let ctx = AppContext::from_cli(cli)?;
    policy_lint::cli::commands::run(&ctx, &cli.command)
}

fn init_tracing(cli: &Cli) {
    if cli.quiet {
        return;
    }

    let filter = match cli.verbose {
        0 => "warn,policy_lint=info",
        1 => "info,policy_lint=debug",
        2 => "debug,policy_lint=trace",
        _ => "trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    if cli.robot {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}
