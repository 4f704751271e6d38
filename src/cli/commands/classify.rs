//! policy-lint classify - Print the detected type of each document

use std::path::PathBuf;

use clap::Args;
use colored::Colorize;
use serde::Serialize;

use super::{discover_documents, document_id, read_document};
use crate::app::AppContext;
use crate::classify::{DocumentType, classify};
use crate::cli::output::{HumanLayout, emit_human, emit_json, robot_ok};
use crate::error::Result;
use crate::fields;
use crate::parser::parse;

#[derive(Args, Debug)]
pub struct ClassifyArgs {
    /// Files or directories to classify
    #[arg(value_name = "PATH", required = true)]
    pub paths: Vec<PathBuf>,
}

#[derive(Debug, Serialize)]
pub struct Classification {
    pub path: String,
    pub doc_type: DocumentType,
    /// Declared `$schema`, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
    pub syntax_errors: usize,
}

/// Classify one document's text.
#[must_use]
pub fn classify_text(path: String, text: &str) -> Classification {
    let parsed = parse(text);
    let (doc_type, schema) = match parsed.value.as_ref().filter(|_| parsed.is_clean()) {
        Some(value) => (
            classify(value),
            fields::string(value, fields::SCHEMA).map(str::to_string),
        ),
        None => (DocumentType::None, None),
    };
    Classification {
        path,
        doc_type,
        schema,
        syntax_errors: parsed.syntax_errors.len(),
    }
}

pub fn run(ctx: &AppContext, args: &ClassifyArgs) -> Result<()> {
    let mut results = Vec::new();
    for path in discover_documents(&args.paths)? {
        let text = read_document(&path)?;
        results.push(classify_text(document_id(&path), &text));
    }

    if !ctx.is_human() {
        return emit_json(&robot_ok(&results));
    }

    let mut layout = HumanLayout::new();
    for result in &results {
        let label = if result.syntax_errors > 0 {
            "syntax error".red().to_string()
        } else if result.doc_type.is_none() {
            "unrecognized".dimmed().to_string()
        } else {
            result.doc_type.to_string().green().to_string()
        };
        layout.push_line(format!("{label:>14}  {}", result.path));
    }
    emit_human(layout);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::fixtures;

    #[test]
    fn test_classify_text() {
        let result = classify_text("a.json".into(), fixtures::COLLECTION);
        assert_eq!(result.doc_type, DocumentType::Collection);
        assert_eq!(result.syntax_errors, 0);

        let result = classify_text("b.json".into(), fixtures::ASSIGNMENT);
        assert_eq!(result.doc_type, DocumentType::Assignment);
        assert!(result.schema.is_some());

        let result = classify_text("c.json".into(), "{\"policyRule\": ");
        assert_eq!(result.doc_type, DocumentType::None);
        assert!(result.syntax_errors > 0);
    }
}
