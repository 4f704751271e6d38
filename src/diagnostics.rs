//! Host-facing diagnostics and fix actions.

use std::collections::HashMap;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::lint::{Issue, Severity, SourceSpan, ValidationResult, Validator};

/// A diagnostic as shown by a host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub range: SourceSpan,
    pub message: String,
    pub severity: Severity,
    pub code: String,
    pub source: String,
}

impl From<&Issue> for Diagnostic {
    fn from(issue: &Issue) -> Self {
        Self {
            range: issue.range,
            message: issue.message.clone(),
            severity: issue.severity,
            code: issue.code.clone(),
            source: issue.source.clone(),
        }
    }
}

/// Convert a result's issues into diagnostics.
#[must_use]
pub fn to_diagnostics(result: &ValidationResult) -> Vec<Diagnostic> {
    result.issues.iter().map(Diagnostic::from).collect()
}

/// Every issue paired with whether its owning rule can fix it.
#[must_use]
pub fn list_fixable_issues(result: &ValidationResult, validator: &Validator) -> Vec<(Issue, bool)> {
    result
        .issues
        .iter()
        .map(|issue| (issue.clone(), validator.can_fix(issue)))
        .collect()
}

/// Receives diagnostics for display.
pub trait DiagnosticSink: Send + Sync {
    fn publish(&self, document_id: &str, diagnostics: Vec<Diagnostic>);

    /// Remove everything previously published for a document.
    fn clear(&self, document_id: &str);
}

/// Sink keeping the latest diagnostics per document in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    published: Mutex<HashMap<String, Vec<Diagnostic>>>,
    publish_count: Mutex<HashMap<String, usize>>,
}

impl MemorySink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Latest diagnostics for a document, if any are published.
    #[must_use]
    pub fn get(&self, document_id: &str) -> Option<Vec<Diagnostic>> {
        self.published.lock().get(document_id).cloned()
    }

    /// How many times diagnostics were published for a document.
    #[must_use]
    pub fn publish_count(&self, document_id: &str) -> usize {
        self.publish_count.lock().get(document_id).copied().unwrap_or(0)
    }
}

impl DiagnosticSink for MemorySink {
    fn publish(&self, document_id: &str, diagnostics: Vec<Diagnostic>) {
        self.published
            .lock()
            .insert(document_id.to_string(), diagnostics);
        *self
            .publish_count
            .lock()
            .entry(document_id.to_string())
            .or_default() += 1;
    }

    fn clear(&self, document_id: &str) {
        self.published.lock().remove(document_id);
    }
}
