//! Issue types produced by validation rules.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::parser::PathSegment;
pub use crate::parser::SourceSpan;

/// Source label attached to every issue.
pub const ISSUE_SOURCE: &str = "policy-lint";

/// Category of validation rule
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleCategory {
    /// Structural validity against the JSON schema
    Schema,
    /// Semantic structure (effects, parameters)
    Structure,
    /// Reference integrity (definition references, reference ids)
    Reference,
    /// Naming constraints
    Naming,
    /// Assignment scopes
    Scope,
}

impl fmt::Display for RuleCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Schema => write!(f, "schema"),
            Self::Structure => write!(f, "structure"),
            Self::Reference => write!(f, "reference"),
            Self::Naming => write!(f, "naming"),
            Self::Scope => write!(f, "scope"),
        }
    }
}

/// Severity level for issues
#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Informational suggestion
    Info,
    /// Should fix, but does not make the document invalid
    Warning,
    /// Must fix, the document is invalid
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "info"),
            Self::Warning => write!(f, "warning"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// A single validation finding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    /// Stable issue code, e.g. `NAME_LENGTH`
    pub code: String,
    pub message: String,
    pub severity: Severity,
    pub range: SourceSpan,
    pub source: String,
    /// The rule that produced this issue
    pub rule_id: String,
    /// Rule-specific context needed to compute a fix later
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub data: Value,
    /// Optional hint for fixing by hand
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

impl Issue {
    pub fn new(
        rule_id: impl Into<String>,
        code: impl Into<String>,
        severity: Severity,
        message: impl Into<String>,
    ) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            severity,
            range: SourceSpan::default(),
            source: ISSUE_SOURCE.to_string(),
            rule_id: rule_id.into(),
            data: Value::Null,
            suggestion: None,
        }
    }

    /// Create an error issue
    pub fn error(
        rule_id: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::new(rule_id, code, Severity::Error, message)
    }

    /// Create a warning issue
    pub fn warning(
        rule_id: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::new(rule_id, code, Severity::Warning, message)
    }

    /// Set the range
    #[must_use]
    pub const fn with_range(mut self, range: SourceSpan) -> Self {
        self.range = range;
        self
    }

    /// Attach rule-specific data
    #[must_use]
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = data;
        self
    }

    /// Set a suggestion
    #[must_use]
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// The value path stored under `data.path`, if any.
    #[must_use]
    pub fn path(&self) -> Option<Vec<PathSegment>> {
        path_from_json(self.data.get("path")?)
    }

    /// A string stored under `data.<key>`.
    #[must_use]
    pub fn data_str(&self, key: &str) -> Option<&str> {
        self.data.get(key)?.as_str()
    }
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} {}: {} at {}",
            self.severity, self.code, self.rule_id, self.message, self.range
        )?;
        if let Some(suggestion) = &self.suggestion {
            write!(f, " (hint: {suggestion})")?;
        }
        Ok(())
    }
}

/// Encode a value path for storage in issue data.
#[must_use]
pub fn path_to_json(path: &[PathSegment]) -> Value {
    Value::Array(
        path.iter()
            .map(|segment| match segment {
                PathSegment::Key(key) => Value::String(key.clone()),
                PathSegment::Index(index) => Value::from(*index),
            })
            .collect(),
    )
}

/// Decode a value path stored by [`path_to_json`].
#[must_use]
pub fn path_from_json(value: &Value) -> Option<Vec<PathSegment>> {
    value
        .as_array()?
        .iter()
        .map(|segment| match segment {
            Value::String(key) => Some(PathSegment::Key(key.clone())),
            Value::Number(n) => n
                .as_u64()
                .and_then(|n| usize::try_from(n).ok())
                .map(PathSegment::Index),
            _ => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Info < Severity::Warning);
        assert!(Severity::Warning < Severity::Error);
    }

    #[test]
    fn test_issue_builder() {
        let issue = Issue::error("name-length", "NAME_LENGTH", "too long")
            .with_range(SourceSpan::new(1, 5, 1, 10))
            .with_data(json!({"path": ["assignment", "name"], "name": "x"}))
            .with_suggestion("shorten it");

        assert_eq!(issue.rule_id, "name-length");
        assert_eq!(issue.severity, Severity::Error);
        assert_eq!(issue.source, ISSUE_SOURCE);
        assert_eq!(issue.data_str("name"), Some("x"));
        assert_eq!(
            issue.path(),
            Some(vec![PathSegment::key("assignment"), PathSegment::key("name")])
        );
    }

    #[test]
    fn test_path_json_round_trip() {
        let path = vec![
            PathSegment::key("children"),
            PathSegment::Index(2),
            PathSegment::key("scope"),
        ];
        let encoded = path_to_json(&path);
        assert_eq!(encoded, json!(["children", 2, "scope"]));
        assert_eq!(path_from_json(&encoded), Some(path));
        assert_eq!(path_from_json(&json!([true])), None);
    }

    #[test]
    fn test_issue_display() {
        let issue = Issue::warning("non-empty-collection", "EMPTY_DEFINITIONS", "empty")
            .with_range(SourceSpan::new(4, 0, 4, 2));
        assert_eq!(
            issue.to_string(),
            "[warning] EMPTY_DEFINITIONS non-empty-collection: empty at 5:1-3"
        );
    }

    #[test]
    fn test_category_display() {
        assert_eq!(RuleCategory::Schema.to_string(), "schema");
        assert_eq!(RuleCategory::Scope.to_string(), "scope");
    }
}
