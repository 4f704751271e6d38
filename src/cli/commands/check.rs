//! policy-lint check - Validate documents and report issues

use std::path::PathBuf;

use clap::Args;
use colored::Colorize;
use serde::Serialize;

use super::{RuleArgs, discover_documents, document_id, read_document};
use crate::app::AppContext;
use crate::classify::DocumentType;
use crate::cli::output::{HumanLayout, emit_human, emit_json, robot_failed, robot_ok, severity_label};
use crate::error::{LintError, Result};
use crate::lint::{Issue, SourceSpan, ValidationResult};
use crate::orchestrator::ValidationService;
use crate::parser::parse;

#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Files or directories to check
    #[arg(value_name = "PATH", required = true)]
    pub paths: Vec<PathBuf>,

    #[command(flatten)]
    pub rules: RuleArgs,

    /// Only print files with issues
    #[arg(long)]
    pub only_issues: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FileStatus {
    Validated,
    SyntaxError,
    Unrecognized,
}

#[derive(Debug, Serialize)]
pub struct SyntaxErrorReport {
    pub message: String,
    pub range: SourceSpan,
}

#[derive(Debug, Serialize)]
pub struct FileReport {
    pub path: String,
    pub status: FileStatus,
    pub doc_type: DocumentType,
    pub valid: bool,
    pub error_count: usize,
    pub warning_count: usize,
    pub truncated: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub issues: Vec<Issue>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub syntax_errors: Vec<SyntaxErrorReport>,
}

impl FileReport {
    fn from_result(path: String, result: ValidationResult) -> Self {
        Self {
            path,
            status: FileStatus::Validated,
            doc_type: result.doc_type,
            valid: result.valid,
            error_count: result.error_count(),
            warning_count: result.warning_count(),
            truncated: result.truncated,
            issues: result.issues,
            syntax_errors: Vec::new(),
        }
    }

    fn unvalidated(path: String, text: &str) -> Self {
        let parsed = parse(text);
        let syntax_errors: Vec<SyntaxErrorReport> = parsed
            .syntax_errors
            .iter()
            .map(|e| SyntaxErrorReport {
                message: e.message.clone(),
                range: parsed.span_of(e.span),
            })
            .collect();
        let status = if syntax_errors.is_empty() {
            FileStatus::Unrecognized
        } else {
            FileStatus::SyntaxError
        };
        Self {
            path,
            status,
            doc_type: DocumentType::None,
            valid: syntax_errors.is_empty(),
            error_count: syntax_errors.len(),
            warning_count: 0,
            truncated: false,
            issues: Vec::new(),
            syntax_errors,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CheckSummary {
    pub files: usize,
    pub validated: usize,
    pub skipped: usize,
    pub errors: usize,
    pub warnings: usize,
}

#[derive(Debug, Serialize)]
pub struct CheckReport {
    pub files: Vec<FileReport>,
    pub summary: CheckSummary,
}

/// Validate every file and collect per-file reports.
pub fn check_files(service: &ValidationService, paths: &[PathBuf]) -> Result<CheckReport> {
    let mut files = Vec::new();
    for path in discover_documents(paths)? {
        let text = read_document(&path)?;
        let id = document_id(&path);
        let report = match service.did_open(&id, &text, 1) {
            Some(result) => FileReport::from_result(id, result),
            None => FileReport::unvalidated(id, &text),
        };
        files.push(report);
    }

    let summary = CheckSummary {
        files: files.len(),
        validated: files.iter().filter(|f| f.status == FileStatus::Validated).count(),
        skipped: files.iter().filter(|f| f.status == FileStatus::Unrecognized).count(),
        errors: files.iter().map(|f| f.error_count).sum(),
        warnings: files.iter().map(|f| f.warning_count).sum(),
    };
    Ok(CheckReport { files, summary })
}

pub fn run(ctx: &AppContext, args: &CheckArgs) -> Result<()> {
    let service = ctx.service(&args.rules)?;
    let report = check_files(&service, &args.paths)?;
    let errors = report.summary.errors;

    if ctx.is_human() {
        output_human(&report, args.only_issues);
    } else if errors > 0 {
        emit_json(&robot_failed(errors, &report))?;
    } else {
        emit_json(&robot_ok(&report))?;
    }

    if errors > 0 {
        Err(LintError::ValidationFailed(format!("{errors} error(s) found")))
    } else {
        Ok(())
    }
}

fn output_human(report: &CheckReport, only_issues: bool) {
    let mut layout = HumanLayout::new();

    for file in &report.files {
        match file.status {
            FileStatus::Unrecognized => {
                if !only_issues {
                    layout.push_line(format!("{} {} (not a policy document)", "-".dimmed(), file.path.dimmed()));
                }
                continue;
            }
            FileStatus::SyntaxError => {
                layout.push_line(format!("{} {}", "✗".red(), file.path.bold()));
                for error in &file.syntax_errors {
                    layout.push_line(format!(
                        "  {} {} {}",
                        severity_label(crate::lint::Severity::Error),
                        error.message,
                        error.range.to_string().dimmed()
                    ));
                }
                layout.blank();
                continue;
            }
            FileStatus::Validated => {}
        }

        if file.issues.is_empty() {
            if !only_issues {
                layout.push_line(format!("{} {} ({})", "✓".green(), file.path.dimmed(), file.doc_type));
            }
            continue;
        }

        let mark = if file.valid { "!".yellow() } else { "✗".red() };
        layout.push_line(format!("{mark} {} ({})", file.path.bold(), file.doc_type));
        for issue in &file.issues {
            layout.push_line(format!(
                "  {} {} {} {}",
                severity_label(issue.severity),
                issue.code.dimmed(),
                issue.message,
                issue.range.to_string().dimmed()
            ));
            if let Some(suggestion) = &issue.suggestion {
                layout.push_line(format!("    {} {suggestion}", "hint:".cyan()));
            }
        }
        if file.truncated {
            layout.push_line(format!("  {}", "(output truncated by max-errors)".dimmed()));
        }
        layout.blank();
    }

    layout.section("Summary");
    layout.kv("Files", &report.summary.files.to_string());
    layout.kv("Validated", &report.summary.validated.to_string());
    layout.kv("Skipped", &report.summary.skipped.to_string());
    layout.kv("Errors", &report.summary.errors.to_string());
    layout.kv("Warnings", &report.summary.warnings.to_string());

    emit_human(layout);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::fixtures::{self, PolicyFixture};

    #[test]
    fn test_check_files_reports_each_status() {
        let fixture = PolicyFixture::new();
        let good = fixture.create_file("defs/good.json", fixtures::DEFINITION);
        let broken = fixture.create_file("defs/broken.json", "{\"name\": ");
        let other = fixture.create_file("defs/other.json", r#"{"hello": "world"}"#);

        let service = fixture.service();
        let report = check_files(&service, &[good, broken, other]).unwrap();

        let statuses: Vec<FileStatus> = report.files.iter().map(|f| f.status).collect();
        assert_eq!(
            statuses,
            vec![FileStatus::Validated, FileStatus::SyntaxError, FileStatus::Unrecognized]
        );
        assert!(report.files[0].valid);
        assert_eq!(report.files[0].doc_type, DocumentType::Definition);
        assert_eq!(report.summary.validated, 1);
        assert_eq!(report.summary.skipped, 1);
        assert!(report.summary.errors >= 1);
    }
}
