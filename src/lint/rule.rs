//! Validation rules as plain data.
//!
//! A [`Rule`] is a table entry: identity, default severity, the codes it
//! emits and two function pointers. Rules hold no state; everything they
//! need arrives through the [`ValidationContext`].

use std::fmt;

use crate::error::Result;

use super::config::ValidationContext;
use super::diagnostic::{Issue, RuleCategory, Severity};
use super::edit::TextEdit;

/// Inspects a document and reports issues.
pub type ValidateFn = fn(&Rule, &ValidationContext<'_>) -> Result<Vec<Issue>>;

/// Computes an edit resolving one issue. `Ok(None)` means no edit applies.
pub type FixFn = fn(&Rule, &ValidationContext<'_>, &Issue) -> Result<Option<TextEdit>>;

/// Quick-fix capability of a rule.
#[derive(Clone, Copy)]
pub struct Fixer {
    /// Issue codes this fixer can resolve
    pub codes: &'static [&'static str],
    pub apply: FixFn,
}

/// A validation rule.
#[derive(Clone, Copy)]
pub struct Rule {
    /// Unique identifier within a validator (e.g., "name-length")
    pub id: &'static str,
    /// Human-readable name
    pub name: &'static str,
    pub description: &'static str,
    pub category: RuleCategory,
    /// Default severity level
    pub severity: Severity,
    pub enabled: bool,
    /// Every issue code this rule can emit
    pub codes: &'static [&'static str],
    pub validate: ValidateFn,
    pub fix: Option<Fixer>,
}

impl Rule {
    /// Run the rule, stamping its id on every issue.
    ///
    /// # Errors
    ///
    /// Propagates whatever the rule's validate function reports.
    pub fn run(&self, ctx: &ValidationContext<'_>) -> Result<Vec<Issue>> {
        let mut issues = (self.validate)(self, ctx)?;
        for issue in &mut issues {
            issue.rule_id = self.id.to_string();
        }
        Ok(issues)
    }

    /// Whether this rule emits `code`.
    #[must_use]
    pub fn emits(&self, code: &str) -> bool {
        self.codes.contains(&code)
    }

    /// Whether this rule can compute an edit for `issue`.
    #[must_use]
    pub fn can_fix(&self, issue: &Issue) -> bool {
        issue.rule_id == self.id
            && self
                .fix
                .is_some_and(|fixer| fixer.codes.contains(&issue.code.as_str()))
    }

    /// Compute the edit for `issue`.
    ///
    /// # Errors
    ///
    /// Propagates failures of the rule's fix function.
    pub fn fix(&self, ctx: &ValidationContext<'_>, issue: &Issue) -> Result<Option<TextEdit>> {
        match self.fix {
            Some(fixer) if self.can_fix(issue) => (fixer.apply)(self, ctx, issue),
            _ => Ok(None),
        }
    }

    /// Create an issue with this rule's default severity.
    #[must_use]
    pub fn issue(&self, code: &str, message: impl Into<String>) -> Issue {
        Issue::new(self.id, code, self.severity, message)
    }
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rule")
            .field("id", &self.id)
            .field("severity", &self.severity)
            .field("enabled", &self.enabled)
            .field("codes", &self.codes)
            .field("fixable", &self.fix.map(|fixer| fixer.codes))
            .finish()
    }
}
