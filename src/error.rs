//! Error types for policy-lint.

use thiserror::Error;

/// Crate-wide error type.
#[derive(Error, Debug)]
pub enum LintError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("schema load error for '{schema}': {reason}")]
    SchemaLoad { schema: String, reason: String },

    #[error("schema compile error for '{schema}': {reason}")]
    SchemaCompile { schema: String, reason: String },

    /// A rule failed while inspecting a document.
    #[error("rule '{rule_id}' failed: {reason}")]
    Rule { rule_id: String, reason: String },

    /// A rule could not compute an edit for an issue.
    #[error("fix for '{code}' unavailable: {reason}")]
    Fix { code: String, reason: String },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("validation failed: {0}")]
    ValidationFailed(String),
}

impl LintError {
    pub fn rule(rule_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Rule {
            rule_id: rule_id.into(),
            reason: reason.into(),
        }
    }

    pub fn fix(code: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Fix {
            code: code.into(),
            reason: reason.into(),
        }
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, LintError>;
