//! Command-line interface.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub mod commands;
pub mod output;

pub use output::OutputFormat;

#[derive(Parser, Debug)]
#[command(
    name = "policy-lint",
    version,
    about = "Classify, validate and quick-fix Azure Policy documents"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Machine-readable JSON output on stdout, JSON logs on stderr
    #[arg(long, global = true)]
    pub robot: bool,

    /// Output format (overridden by --robot)
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Human)]
    pub format: OutputFormat,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress logging
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Explicit configuration file
    #[arg(long, global = true, env = "POLICY_LINT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Directory holding the schema files
    #[arg(long, global = true)]
    pub schemas: Option<PathBuf>,
}

impl Cli {
    #[must_use]
    pub const fn output_format(&self) -> OutputFormat {
        if self.robot {
            OutputFormat::Json
        } else {
            self.format
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Validate policy documents and report issues
    Check(commands::check::CheckArgs),

    /// Apply every available quick fix and write the files back
    Fix(commands::fix::FixArgs),

    /// Print the detected type of each document
    Classify(commands::classify::ClassifyArgs),

    /// List validation rules
    Rules(commands::rules::RulesArgs),
}
