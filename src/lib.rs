//! policy-lint: classify, validate and quick-fix Azure Policy documents.
//!
//! Three document types are understood: policy definitions, policy set
//! definitions (collections) and assignment trees. Each document is parsed
//! into a position-carrying syntax tree, checked against a JSON Schema and
//! then against per-type semantic rules. Rules may offer quick fixes as
//! plain text edits.

pub mod app;
pub mod classify;
pub mod cli;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod fields;
pub mod lint;
pub mod orchestrator;
pub mod parser;
pub mod schema;
pub mod test_utils;

pub use error::{LintError, Result};
