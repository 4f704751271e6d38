//! Turning raw schema violations into positioned issues.
//!
//! Positions come from the syntax tree when the failing instance path
//! resolves. Otherwise the text is scanned for the last property name on
//! the path, and as a last resort the issue lands on the first line.

use regex::Regex;
use serde_json::json;
use tracing::debug;

use super::registry::RawSchemaError;
use crate::lint::diagnostic::{Issue, SourceSpan, path_to_json};
use crate::parser::{AstNode, ParsedDocument, PathSegment, find_property_by_path, parse_pointer};

/// Issue code for schema violations.
pub const SCHEMA_VIOLATION: &str = "SCHEMA_VIOLATION";

/// How a range was found.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum RangeSource {
    /// Resolved through the syntax tree
    Ast,
    /// Degraded: found by scanning the text for the property name
    TextScan,
    /// Nothing matched; first line of the document
    FirstLine,
}

/// Find the range for a value path. Always produces a range.
#[must_use]
pub fn locate(parsed: &ParsedDocument, path: &[PathSegment]) -> (SourceSpan, RangeSource) {
    if let Some(range) = locate_in_tree(parsed, path) {
        return (range, RangeSource::Ast);
    }
    if let Some(range) = scan_for_key(parsed, path) {
        debug!(path = ?path, "range found by text scan");
        return (range, RangeSource::TextScan);
    }
    (parsed.first_line(), RangeSource::FirstLine)
}

fn locate_in_tree(parsed: &ParsedDocument, path: &[PathSegment]) -> Option<SourceSpan> {
    let tree = parsed.tree.as_ref()?;
    if path.is_empty() {
        return Some(parsed.first_line());
    }
    if let Some(AstNode::Property { key_span, .. }) = find_property_by_path(tree, path) {
        return Some(parsed.span_of(*key_span));
    }
    parsed.node_at(path).map(|node| parsed.range_of(node))
}

fn scan_for_key(parsed: &ParsedDocument, path: &[PathSegment]) -> Option<SourceSpan> {
    let key = path.iter().rev().find_map(|segment| match segment {
        PathSegment::Key(key) => Some(key.as_str()),
        PathSegment::Index(_) => None,
    })?;
    let pattern = Regex::new(&format!(r#""{}"\s*:"#, regex::escape(key))).ok()?;
    let found = pattern.find(&parsed.text)?;
    // quotes included, colon excluded
    let end = found.start() + key.len() + 2;
    Some(parsed.line_index().span(&parsed.text, found.start(), end))
}

/// Convert raw violations into `SCHEMA_VIOLATION` issues owned by `rule_id`.
#[must_use]
pub fn format_errors(errors: &[RawSchemaError], parsed: &ParsedDocument, rule_id: &str) -> Vec<Issue> {
    errors
        .iter()
        .map(|error| {
            let path = parse_pointer(&error.instance_path);
            let (range, _) = locate(parsed, &path);
            let message = if path.is_empty() {
                error.message.clone()
            } else {
                format!("{}: {}", dotted(&path), error.message)
            };
            Issue::error(rule_id, SCHEMA_VIOLATION, message)
                .with_range(range)
                .with_data(json!({
                    "path": path_to_json(&path),
                    "keyword": error.keyword(),
                    "schemaPath": error.schema_path,
                }))
        })
        .collect()
}

fn dotted(path: &[PathSegment]) -> String {
    let mut out = String::new();
    for segment in path {
        match segment {
            PathSegment::Key(key) => {
                if !out.is_empty() {
                    out.push('.');
                }
                out.push_str(key);
            }
            PathSegment::Index(index) => out.push_str(&format!("[{index}]")),
        }
    }
    out
}
