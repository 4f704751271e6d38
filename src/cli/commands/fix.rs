//! policy-lint fix - Apply quick fixes and write the files back

use std::path::PathBuf;

use clap::Args;
use colored::Colorize;
use serde::Serialize;
use tracing::info;

use super::{RuleArgs, discover_documents, document_id, read_document};
use crate::app::AppContext;
use crate::cli::output::{HumanLayout, emit_human, emit_json, robot_ok, severity_label};
use crate::error::Result;
use crate::lint::Issue;
use crate::orchestrator::ValidationService;

#[derive(Args, Debug)]
pub struct FixArgs {
    /// Files or directories to fix
    #[arg(value_name = "PATH", required = true)]
    pub paths: Vec<PathBuf>,

    #[command(flatten)]
    pub rules: RuleArgs,

    /// Report what would change without writing files
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Debug, Serialize)]
pub struct FixFileReport {
    pub path: String,
    /// Codes of the fixes applied, in order
    pub applied: Vec<String>,
    pub written: bool,
    /// Issues left after fixing
    pub remaining: Vec<Issue>,
}

/// Fix every validated document. Unrecognized or malformed files are skipped.
pub fn fix_files(service: &ValidationService, paths: &[PathBuf], dry_run: bool) -> Result<Vec<FixFileReport>> {
    let mut reports = Vec::new();
    for path in discover_documents(paths)? {
        let text = read_document(&path)?;
        let id = document_id(&path);
        if service.did_open(&id, &text, 1).is_none() {
            continue;
        }

        let outcome = service.fix_all(&id)?;
        let written = !dry_run && !outcome.applied.is_empty();
        if written {
            std::fs::write(&path, &outcome.text)?;
            info!(path = %path.display(), fixes = outcome.applied.len(), "wrote fixes");
        }
        service.did_close(&id);

        reports.push(FixFileReport {
            path: id,
            applied: outcome.applied,
            written,
            remaining: outcome.result.map(|r| r.issues).unwrap_or_default(),
        });
    }
    Ok(reports)
}

pub fn run(ctx: &AppContext, args: &FixArgs) -> Result<()> {
    let service = ctx.service(&args.rules)?;
    let reports = fix_files(&service, &args.paths, args.dry_run)?;

    if ctx.is_human() {
        output_human(&reports, args.dry_run);
    } else {
        emit_json(&robot_ok(&reports))?;
    }
    Ok(())
}

fn output_human(reports: &[FixFileReport], dry_run: bool) {
    let mut layout = HumanLayout::new();
    let verb = if dry_run { "would apply" } else { "applied" };

    for report in reports {
        if report.applied.is_empty() && report.remaining.is_empty() {
            continue;
        }
        layout.push_line(report.path.bold().to_string());
        if !report.applied.is_empty() {
            layout.push_line(format!(
                "  {} {verb} {} fix(es): {}",
                "✓".green(),
                report.applied.len(),
                report.applied.join(", ")
            ));
        }
        for issue in &report.remaining {
            layout.push_line(format!(
                "  {} {} {}",
                severity_label(issue.severity),
                issue.code.dimmed(),
                issue.message
            ));
        }
        layout.blank();
    }

    let total: usize = reports.iter().map(|r| r.applied.len()).sum();
    layout.section("Summary");
    layout.kv("Files", &reports.len().to_string());
    layout.kv("Fixes", &total.to_string());
    emit_human(layout);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lint::rules::definition::MISSING_EFFECT_PARAMETER;
    use crate::test_utils::fixtures::{self, PolicyFixture};

    #[test]
    fn test_fix_files_writes_back() {
        let fixture = PolicyFixture::new();
        let path = fixture.create_file("defs/deny.json", fixtures::DEFINITION_MISSING_EFFECT);
        let service = fixture.service();

        let reports = fix_files(&service, &[path.clone()], false).unwrap();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].applied, vec![MISSING_EFFECT_PARAMETER.to_string()]);
        assert!(reports[0].written);

        let written = std::fs::read_to_string(&path).unwrap();
        let value: serde_json::Value = serde_json::from_str(&written).unwrap();
        assert_eq!(value["properties"]["parameters"]["effect"]["defaultValue"], "Audit");
    }

    #[test]
    fn test_dry_run_leaves_file() {
        let fixture = PolicyFixture::new();
        let path = fixture.create_file("defs/deny.json", fixtures::DEFINITION_MISSING_EFFECT);
        let service = fixture.service();

        let reports = fix_files(&service, &[path.clone()], true).unwrap();
        assert!(!reports[0].written);
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            fixtures::DEFINITION_MISSING_EFFECT
        );
    }
}
