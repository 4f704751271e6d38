//! Policy document linting framework.
//!
//! - [`Rule`] is a plain table entry with `validate` and optional `fix`
//!   function pointers
//! - [`Validator`] owns the ordered rule table for one document type
//! - [`Issue`] is a positioned finding; [`TextEdit`] is a quick-fix edit
//! - [`ValidationConfig`] disables rules, overrides severities and enables
//!   strict mode
//!
//! # Example
//!
//! ```
//! use policy_lint::classify::DocumentType;
//! use policy_lint::lint::{ValidationConfig, ValidationContext, Validator};
//! use policy_lint::parser::parse;
//! use policy_lint::schema::SchemaRegistry;
//!
//! let parsed = parse(r#"{"name": "set", "properties": {"policyDefinitions": []}}"#);
//! let schemas = SchemaRegistry::new(None);
//! let config = ValidationConfig::new();
//! let ctx = ValidationContext::new(&parsed, &schemas, &config).unwrap();
//!
//! let outcome = Validator::new(DocumentType::Collection).run(&ctx);
//! assert!(outcome.issues.iter().any(|i| i.code == "EMPTY_DEFINITIONS"));
//! ```

pub mod config;
pub mod diagnostic;
pub mod edit;
pub mod engine;
pub mod rule;
pub mod rules;

pub use config::{ValidationConfig, ValidationContext};
pub use diagnostic::{ISSUE_SOURCE, Issue, RuleCategory, Severity, SourceSpan};
pub use edit::TextEdit;
pub use engine::{RuleInfo, RunOutcome, ValidationResult, Validator, select};
pub use rule::{FixFn, Fixer, Rule, ValidateFn};
pub use rules::rules_for;
