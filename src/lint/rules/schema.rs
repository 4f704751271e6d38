//! Structural validation against the resolved JSON schema.
//!
//! Resolution follows the declared `$schema` first. When it is missing or
//! unknown the schema is inferred from the document shape; when nothing
//! can be inferred a single `NO_SCHEMA_RESOLVED` warning is reported.

use tracing::debug;

use crate::classify::DocumentType;
use crate::error::Result;
use crate::fields;
use crate::lint::config::ValidationContext;
use crate::lint::diagnostic::{Issue, RuleCategory, Severity};
use crate::lint::rule::Rule;
use crate::schema::{SCHEMA_VIOLATION, format_errors, infer_type};

pub const NO_SCHEMA_RESOLVED: &str = "NO_SCHEMA_RESOLVED";

pub const SCHEMA_VALIDATION: Rule = Rule {
    id: "schema-validation",
    name: "Schema Validation",
    description: "Document must satisfy the JSON schema for its type",
    category: RuleCategory::Schema,
    severity: Severity::Error,
    enabled: true,
    codes: &[SCHEMA_VIOLATION, NO_SCHEMA_RESOLVED],
    validate: validate_against_schema,
    fix: None,
};

/// Local schema id for a document, following declared then inferred schema.
#[must_use]
pub fn resolve_schema_id(ctx: &ValidationContext<'_>) -> Option<String> {
    let declared = fields::string(ctx.value, fields::SCHEMA);
    if let Some(id) = declared.and_then(|url| ctx.schemas.resolve(url)) {
        return Some(id);
    }
    if let Some(url) = declared {
        debug!(schema = url, "declared schema not recognized, inferring");
    }
    infer_type(ctx.value)
        .and_then(DocumentType::schema_id)
        .map(str::to_string)
}

fn validate_against_schema(rule: &Rule, ctx: &ValidationContext<'_>) -> Result<Vec<Issue>> {
    let Some(schema_id) = resolve_schema_id(ctx) else {
        return Ok(vec![
            Issue::warning(
                rule.id,
                NO_SCHEMA_RESOLVED,
                "No schema could be resolved for this document",
            )
            .with_range(ctx.parsed.first_line())
            .with_suggestion("Add a \"$schema\" property naming the policy schema"),
        ]);
    };

    let report = ctx.schemas.validate(&schema_id, ctx.value)?;
    debug!(
        schema = %report.schema_id,
        valid = report.valid,
        errors = report.errors.len(),
        fallback = report.fallback,
        "structural validation"
    );
    Ok(format_errors(&report.errors, ctx.parsed, rule.id))
}
