//! Rule configuration and the per-pass validation context.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::diagnostic::Severity;
use crate::parser::ParsedDocument;
use crate::schema::SchemaRegistry;

/// Configuration for rule execution
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidationConfig {
    /// Rules to disable by ID
    #[serde(default)]
    pub disabled_rules: HashSet<String>,

    /// Severity overrides by rule ID
    #[serde(default)]
    pub severity_overrides: HashMap<String, Severity>,

    /// Treat warnings as errors
    #[serde(default)]
    pub strict: bool,

    /// Maximum errors before stopping validation
    #[serde(default)]
    pub max_errors: Option<usize>,
}

impl ValidationConfig {
    /// Create a new default config
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable strict mode
    #[must_use]
    pub const fn strict(mut self) -> Self {
        self.strict = true;
        self
    }

    /// Set max errors
    #[must_use]
    pub const fn with_max_errors(mut self, max: usize) -> Self {
        self.max_errors = Some(max);
        self
    }

    /// Disable a rule
    #[must_use]
    pub fn disable_rule(mut self, rule_id: impl Into<String>) -> Self {
        self.disabled_rules.insert(rule_id.into());
        self
    }

    /// Override severity for a rule
    #[must_use]
    pub fn override_severity(mut self, rule_id: impl Into<String>, severity: Severity) -> Self {
        self.severity_overrides.insert(rule_id.into(), severity);
        self
    }

    /// Check if a rule is disabled
    #[must_use]
    pub fn is_rule_disabled(&self, rule_id: &str) -> bool {
        self.disabled_rules.contains(rule_id)
    }

    /// Get effective severity for an issue produced by a rule
    #[must_use]
    pub fn effective_severity(&self, rule_id: &str, default: Severity) -> Severity {
        let severity = self
            .severity_overrides
            .get(rule_id)
            .copied()
            .unwrap_or(default);

        if self.strict && severity == Severity::Warning {
            Severity::Error
        } else {
            severity
        }
    }
}

/// Everything a rule may look at during one validation pass.
pub struct ValidationContext<'a> {
    pub parsed: &'a ParsedDocument,
    pub value: &'a Value,
    pub schemas: &'a SchemaRegistry,
    pub config: &'a ValidationConfig,
}

impl<'a> ValidationContext<'a> {
    /// Build a context; `None` when the document has no parsed value.
    #[must_use]
    pub fn new(
        parsed: &'a ParsedDocument,
        schemas: &'a SchemaRegistry,
        config: &'a ValidationConfig,
    ) -> Option<Self> {
        Some(Self {
            parsed,
            value: parsed.value.as_ref()?,
            schemas,
            config,
        })
    }
}
