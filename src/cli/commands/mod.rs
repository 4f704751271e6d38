//! CLI command implementations
//!
//! Each subcommand has its own module with an Args struct and a `run()`
//! function.

use std::path::{Path, PathBuf};

use clap::Args;
use walkdir::WalkDir;

pub mod check;
pub mod classify;
pub mod fix;
pub mod rules;

use crate::app::AppContext;
use crate::cli::Commands;
use crate::config::Config;
use crate::error::{LintError, Result};

/// Dispatch a command to its handler
pub fn run(ctx: &AppContext, command: &Commands) -> Result<()> {
    match command {
        Commands::Check(args) => check::run(ctx, args),
        Commands::Fix(args) => fix::run(ctx, args),
        Commands::Classify(args) => classify::run(ctx, args),
        Commands::Rules(args) => rules::run(ctx, args),
    }
}

/// Rule settings that can be overridden per invocation.
#[derive(Args, Debug, Clone, Default)]
pub struct RuleArgs {
    /// Treat warnings as errors
    #[arg(long)]
    pub strict: bool,

    /// Stop reporting after N errors per document
    #[arg(long)]
    pub max_errors: Option<usize>,

    /// Skip specific rules (comma-separated IDs)
    #[arg(long, value_delimiter = ',')]
    pub skip: Vec<String>,
}

impl RuleArgs {
    pub fn apply(&self, config: &mut Config) {
        if self.strict {
            config.rules.strict = true;
        }
        if let Some(max) = self.max_errors {
            config.rules.max_errors = Some(max);
        }
        for rule_id in &self.skip {
            if !config.rules.disabled.contains(rule_id) {
                config.rules.disabled.push(rule_id.clone());
            }
        }
    }
}

/// Whether a file looks like a policy document.
fn is_policy_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json") || ext.eq_ignore_ascii_case("jsonc"))
}

/// Expand the given paths into document files, walking directories.
pub fn discover_documents(paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for path in paths {
        if path.is_file() {
            files.push(path.clone());
        } else if path.is_dir() {
            let mut found: Vec<PathBuf> = WalkDir::new(path)
                .follow_links(true)
                .into_iter()
                .filter_map(std::result::Result::ok)
                .filter(|e| e.file_type().is_file() && is_policy_file(e.path()))
                .map(walkdir::DirEntry::into_path)
                .collect();
            found.sort();
            files.extend(found);
        } else {
            return Err(LintError::NotFound(format!("path {}", path.display())));
        }
    }
    Ok(files)
}

/// Stable document id for a file.
#[must_use]
pub fn document_id(path: &Path) -> String {
    path.display().to_string()
}

pub fn read_document(path: &Path) -> Result<String> {
    Ok(std::fs::read_to_string(path)?)
}
