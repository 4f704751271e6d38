//! Per-document-type validators running rule tables.

use serde::Serialize;
use tracing::{debug, trace, warn};

use crate::classify::{DocumentType, classify};
use crate::parser::{ParsedDocument, SourceSpan, parse};

use super::config::{ValidationConfig, ValidationContext};
use super::diagnostic::{Issue, RuleCategory, Severity};
use super::edit::TextEdit;
use super::rule::Rule;
use super::rules::rules_for;

/// Result of validating one document version.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationResult {
    pub document_id: String,
    pub version: u64,
    pub doc_type: DocumentType,
    /// All issues collected
    pub issues: Vec<Issue>,
    /// Whether validation was truncated due to `max_errors`
    pub truncated: bool,
    /// No error-severity issue was found
    pub valid: bool,
}

impl ValidationResult {
    #[must_use]
    pub fn new(
        document_id: impl Into<String>,
        version: u64,
        doc_type: DocumentType,
        issues: Vec<Issue>,
        truncated: bool,
    ) -> Self {
        let valid = !issues.iter().any(|i| i.severity == Severity::Error);
        Self {
            document_id: document_id.into(),
            version,
            doc_type,
            issues,
            truncated,
            valid,
        }
    }

    /// Get error issues
    pub fn errors(&self) -> impl Iterator<Item = &Issue> {
        self.issues.iter().filter(|i| i.severity == Severity::Error)
    }

    /// Get warning issues
    pub fn warnings(&self) -> impl Iterator<Item = &Issue> {
        self.issues.iter().filter(|i| i.severity == Severity::Warning)
    }

    /// Issues carrying `code`
    pub fn with_code<'a>(&'a self, code: &'a str) -> impl Iterator<Item = &'a Issue> {
        self.issues.iter().filter(move |i| i.code == code)
    }

    /// Find the issue with `code` at (or containing) `range`.
    #[must_use]
    pub fn find<'a>(&'a self, code: &'a str, range: SourceSpan) -> Option<&'a Issue> {
        self.with_code(code)
            .find(|i| i.range == range)
            .or_else(|| self.with_code(code).find(|i| i.range.contains(&range)))
    }

    #[must_use]
    pub fn error_count(&self) -> usize {
        self.errors().count()
    }

    #[must_use]
    pub fn warning_count(&self) -> usize {
        self.warnings().count()
    }
}

/// Information about a registered rule
#[derive(Debug, Clone, Serialize)]
pub struct RuleInfo {
    pub id: String,
    pub name: String,
    pub description: String,
    pub category: RuleCategory,
    pub doc_type: DocumentType,
    pub default_severity: Severity,
    /// Issue codes the rule can emit
    pub codes: Vec<String>,
    /// Whether the rule supports quick fixes
    pub can_fix: bool,
    /// Whether the rule is disabled by configuration
    pub disabled: bool,
}

/// Issues collected by one run of a validator.
#[derive(Debug, Clone, Default)]
pub struct RunOutcome {
    pub issues: Vec<Issue>,
    pub truncated: bool,
}

/// Owns the rule table for one document type.
pub struct Validator {
    doc_type: DocumentType,
    /// Lowercase substrings, one of which must appear before parsing
    markers: &'static [&'static str],
    rules: Vec<Rule>,
}

const DEFINITION_MARKERS: &[&str] = &[
    "policyrule",
    "policy-definition",
    "policydefinition",
];
const COLLECTION_MARKERS: &[&str] = &[
    "policydefinitions",
    "policy-set-definition",
    "policysetdefinition",
];
const ASSIGNMENT_MARKERS: &[&str] = &[
    "nodename",
    "definitionentry",
    "policy-assignment",
    "policyassignment",
];

impl Validator {
    #[must_use]
    pub fn new(doc_type: DocumentType) -> Self {
        let markers = match doc_type {
            DocumentType::None => &[][..],
            DocumentType::Definition => DEFINITION_MARKERS,
            DocumentType::Collection => COLLECTION_MARKERS,
            DocumentType::Assignment => ASSIGNMENT_MARKERS,
        };
        Self {
            doc_type,
            markers,
            rules: rules_for(doc_type),
        }
    }

    /// One validator per document type, in dispatch order.
    #[must_use]
    pub fn all() -> Vec<Self> {
        vec![
            Self::new(DocumentType::Definition),
            Self::new(DocumentType::Collection),
            Self::new(DocumentType::Assignment),
        ]
    }

    #[must_use]
    pub const fn doc_type(&self) -> DocumentType {
        self.doc_type
    }

    #[must_use]
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    #[must_use]
    pub fn rule(&self, id: &str) -> Option<&Rule> {
        self.rules.iter().find(|r| r.id == id)
    }

    /// Cheap substring check run before parsing.
    #[must_use]
    pub fn might_accept(&self, text: &str) -> bool {
        let lower = text.to_ascii_lowercase();
        self.markers.iter().any(|marker| lower.contains(marker))
    }

    /// Whether a parsed document classifies as this validator's type.
    #[must_use]
    pub fn accepts(&self, parsed: &ParsedDocument) -> bool {
        parsed.is_clean() && parsed.value.as_ref().is_some_and(|v| classify(v) == self.doc_type)
    }

    /// Substring pre-check, then parse and classify. `false` on parse failure.
    #[must_use]
    pub fn can_validate(&self, text: &str) -> bool {
        self.might_accept(text) && self.accepts(&parse(text))
    }

    /// Run every enabled rule. A failing rule is logged and skipped.
    #[must_use]
    pub fn run(&self, ctx: &ValidationContext<'_>) -> RunOutcome {
        let config = ctx.config;
        let mut outcome = RunOutcome::default();
        let mut error_count = 0;

        for rule in &self.rules {
            if !rule.enabled || config.is_rule_disabled(rule.id) {
                trace!(rule = rule.id, "rule disabled");
                continue;
            }

            let issues = match rule.run(ctx) {
                Ok(issues) => issues,
                Err(err) => {
                    warn!(rule = rule.id, error = %err, "rule failed, skipping");
                    continue;
                }
            };

            for mut issue in issues {
                issue.severity = config.effective_severity(&issue.rule_id, issue.severity);
                if issue.severity == Severity::Error {
                    error_count += 1;
                }
                outcome.issues.push(issue);

                if config.max_errors.is_some_and(|max| error_count >= max) {
                    debug!(doc_type = %self.doc_type, error_count, "max errors reached");
                    outcome.truncated = true;
                    return outcome;
                }
            }
        }

        outcome
    }

    /// Whether the owning rule can fix `issue`.
    #[must_use]
    pub fn can_fix(&self, issue: &Issue) -> bool {
        self.rule(&issue.rule_id).is_some_and(|rule| rule.can_fix(issue))
    }

    /// Compute the edit for `issue`. A failing fix is logged and yields `None`.
    #[must_use]
    pub fn fix(&self, ctx: &ValidationContext<'_>, issue: &Issue) -> Option<TextEdit> {
        let rule = self.rule(&issue.rule_id)?;
        if !rule.can_fix(issue) || ctx.config.is_rule_disabled(rule.id) {
            return None;
        }
        match rule.fix(ctx, issue) {
            Ok(edit) => edit,
            Err(err) => {
                warn!(rule = rule.id, code = %issue.code, error = %err, "fix failed");
                None
            }
        }
    }

    #[must_use]
    pub fn list_rules(&self, config: &ValidationConfig) -> Vec<RuleInfo> {
        self.rules
            .iter()
            .map(|r| RuleInfo {
                id: r.id.to_string(),
                name: r.name.to_string(),
                description: r.description.to_string(),
                category: r.category,
                doc_type: self.doc_type,
                default_severity: r.severity,
                codes: r.codes.iter().map(ToString::to_string).collect(),
                can_fix: r.fix.is_some(),
                disabled: !r.enabled || config.is_rule_disabled(r.id),
            })
            .collect()
    }
}

impl std::fmt::Debug for Validator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Validator")
            .field("doc_type", &self.doc_type)
            .field("rules", &self.rules.iter().map(|r| r.id).collect::<Vec<_>>())
            .finish()
    }
}

/// Pick the validator for a parsed document.
#[must_use]
pub fn select<'a>(validators: &'a [Validator], text: &str, parsed: &ParsedDocument) -> Option<&'a Validator> {
    validators
        .iter()
        .find(|v| v.might_accept(text) && v.accepts(parsed))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lint::rules::collection::{EMPTY_DEFINITIONS, MISSING_REFERENCE_ID};
    use crate::schema::SchemaRegistry;

    const COLLECTION: &str = r#"{
  "name": "set",
  "properties": {
    "policyDefinitions": []
  }
}"#;

    fn run_with(config: &ValidationConfig, text: &str) -> RunOutcome {
        let parsed = parse(text);
        let schemas = SchemaRegistry::new(None);
        let validator = Validator::new(DocumentType::Collection);
        let ctx = ValidationContext::new(&parsed, &schemas, config)
            .unwrap();
        validator.run(&ctx)
    }

    #[test]
    fn test_can_validate() {
        let collection = Validator::new(DocumentType::Collection);
        let definition = Validator::new(DocumentType::Definition);
        assert!(collection.can_validate(COLLECTION));
        // substring passes, classification does not
        assert!(definition.might_accept(COLLECTION));
        assert!(!definition.can_validate(COLLECTION));
        // malformed
        assert!(!collection.can_validate(r#"{"properties": {"policyDefinitions": [}"#));
    }

    #[test]
    fn test_empty_collection_is_valid_with_warning() {
        let outcome = run_with(&ValidationConfig::new(), COLLECTION);
        let result = ValidationResult::new("doc", 1, DocumentType::Collection, outcome.issues, false);
        assert!(result.valid);
        assert_eq!(result.with_code(EMPTY_DEFINITIONS).count(), 1);
        assert_eq!(result.error_count(), 0);
    }

    #[test]
    fn test_strict_mode_invalidates_warnings() {
        let outcome = run_with(&ValidationConfig::new().strict(), COLLECTION);
        let result = ValidationResult::new("doc", 1, DocumentType::Collection, outcome.issues, false);
        assert!(!result.valid);
    }

    #[test]
    fn test_disabled_rule_is_skipped() {
        let config = ValidationConfig::new().disable_rule("non-empty-collection");
        let outcome = run_with(&config, COLLECTION);
        assert!(outcome.issues.iter().all(|i| i.code != EMPTY_DEFINITIONS));
    }

    #[test]
    fn test_max_errors_truncates() {
        let text = r#"{"name": "s", "properties": {"policyDefinitions": [{}, {}, {}]}}"#;
        let config = ValidationConfig::new().with_max_errors(2);
        let outcome = run_with(&config, text);
        assert!(outcome.truncated);
        assert_eq!(
            outcome.issues.iter().filter(|i| i.severity == Severity::Error).count(),
            2
        );
    }

    #[test]
    fn test_failing_rule_does_not_stop_others() {
        fn broken(rule: &Rule, _: &ValidationContext<'_>) -> crate::error::Result<Vec<Issue>> {
            Err(crate::error::LintError::rule(rule.id, "boom"))
        }
        let mut validator = Validator::new(DocumentType::Collection);
        let mut rule = validator.rules[1];
        rule.id = "broken";
        rule.validate = broken;
        validator.rules.insert(0, rule);

        let parsed = parse(r#"{"name": "s", "properties": {"policyDefinitions": [{"policyDefinitionName": "a"}]}}"#);
        let schemas = SchemaRegistry::new(None);
        let config = ValidationConfig::new();
        let ctx = ValidationContext::new(&parsed, &schemas, &config).unwrap();
        let outcome = validator.run(&ctx);
        assert!(outcome.issues.iter().any(|i| i.code == MISSING_REFERENCE_ID));
        let result = ValidationResult::new("set", 1, DocumentType::Collection, outcome.issues, outcome.truncated);
        assert!(!result.valid);
    }

    #[test]
    fn test_find_by_range() {
        let issue = Issue::warning("r", "CODE", "m").with_range(SourceSpan::new(2, 0, 4, 1));
        let result = ValidationResult::new("doc", 1, DocumentType::Collection, vec![issue], false);
        assert!(result.find("CODE", SourceSpan::new(2, 0, 4, 1)).is_some());
        assert!(result.find("CODE", SourceSpan::new(3, 0, 3, 2)).is_some());
        assert!(result.find("OTHER", SourceSpan::new(2, 0, 4, 1)).is_none());
    }

    #[test]
    fn test_list_rules() {
        let config = ValidationConfig::new().disable_rule("name-length");
        let rules = Validator::new(DocumentType::Assignment).list_rules(&config);
        let name_length = rules.iter().find(|r| r.id == "name-length").unwrap();
        assert!(name_length.disabled);
        assert!(name_length.can_fix);
        assert_eq!(name_length.doc_type, DocumentType::Assignment);
    }
}
