//! Rules for policy collections (policy set definitions).

use std::collections::HashSet;

use serde_json::{Value, json};

use crate::error::{LintError, Result};
use crate::fields;
use crate::lint::config::ValidationContext;
use crate::lint::diagnostic::{Issue, RuleCategory, Severity, path_to_json};
use crate::lint::edit::{TextEdit, insert_property, replace_value};
use crate::lint::rule::{Fixer, Rule};
use crate::parser::{PathSegment, SourceSpan};

pub const INVALID_DEFINITION_REFERENCE: &str = "INVALID_DEFINITION_REFERENCE";
pub const DUPLICATE_REFERENCE_ID: &str = "DUPLICATE_REFERENCE_ID";
pub const MISSING_REFERENCE_ID: &str = "MISSING_REFERENCE_ID";
pub const EMPTY_DEFINITIONS: &str = "EMPTY_DEFINITIONS";

/// Property written when a fix adds a reference id.
const REFERENCE_ID_KEY: &str = "policyDefinitionReferenceId";

pub const REFERENCE_INTEGRITY: Rule = Rule {
    id: "reference-integrity",
    name: "Reference Integrity",
    description: "Each entry names one definition and has a unique reference id",
    category: RuleCategory::Reference,
    severity: Severity::Error,
    enabled: true,
    codes: &[
        INVALID_DEFINITION_REFERENCE,
        DUPLICATE_REFERENCE_ID,
        MISSING_REFERENCE_ID,
    ],
    validate: check_references,
    fix: Some(Fixer {
        codes: &[DUPLICATE_REFERENCE_ID, MISSING_REFERENCE_ID],
        apply: fix_reference_id,
    }),
};

pub const NON_EMPTY_COLLECTION: Rule = Rule {
    id: "non-empty-collection",
    name: "Non-Empty Collection",
    description: "A collection should reference at least one definition",
    category: RuleCategory::Structure,
    severity: Severity::Warning,
    enabled: true,
    codes: &[EMPTY_DEFINITIONS],
    validate: check_not_empty,
    fix: None,
};

/// Rules run for collections, after schema validation.
#[must_use]
pub fn collection_rules() -> Vec<Rule> {
    vec![REFERENCE_INTEGRITY, NON_EMPTY_COLLECTION]
}

/// One entry of `policyDefinitions`.
struct Entry<'a> {
    path: Vec<PathSegment>,
    value: &'a Value,
}

fn entries(value: &Value) -> Option<(Vec<PathSegment>, Vec<Entry<'_>>)> {
    let (props_path, props) = fields::properties(value);
    let (list_path, list) = fields::get_with_path(props, &props_path, fields::POLICY_DEFINITIONS)?;
    let entries = list
        .as_array()?
        .iter()
        .enumerate()
        .map(|(index, entry)| {
            let mut path = list_path.clone();
            path.push(PathSegment::Index(index));
            Entry { path, value: entry }
        })
        .collect();
    Some((list_path, entries))
}

fn range_at(ctx: &ValidationContext<'_>, path: &[PathSegment]) -> SourceSpan {
    ctx.parsed
        .node_at(path)
        .map_or_else(|| ctx.parsed.first_line(), |node| ctx.parsed.range_of(node))
}

/// Reference id derived from a definition id or name.
fn derive_reference_id(entry: &Value) -> Option<String> {
    if let Some(id) = fields::non_empty_str(entry, fields::DEFINITION_ID) {
        return id
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .filter(|s| !s.is_empty())
            .map(str::to_string);
    }
    fields::non_empty_str(entry, fields::DEFINITION_NAME).map(str::to_string)
}

/// Every reference id used in the collection, lowercased.
fn used_reference_ids(value: &Value) -> HashSet<String> {
    entries(value)
        .map(|(_, entries)| {
            entries
                .iter()
                .filter_map(|e| fields::string(e.value, fields::REFERENCE_ID))
                .map(str::to_ascii_lowercase)
                .collect()
        })
        .unwrap_or_default()
}

fn unique_reference_id(base: &str, used: &HashSet<String>) -> String {
    if !used.contains(&base.to_ascii_lowercase()) {
        return base.to_string();
    }
    (2..)
        .map(|n| format!("{base}-{n}"))
        .find(|candidate| !used.contains(&candidate.to_ascii_lowercase()))
        .unwrap_or_else(|| base.to_string())
}

fn check_references(rule: &Rule, ctx: &ValidationContext<'_>) -> Result<Vec<Issue>> {
    let Some((_, entries)) = entries(ctx.value) else {
        return Ok(vec![]);
    };
    let mut issues = Vec::new();
    let mut seen = HashSet::new();

    for (index, entry) in entries.iter().enumerate() {
        let has_id = fields::non_empty_str(entry.value, fields::DEFINITION_ID).is_some();
        let has_name = fields::non_empty_str(entry.value, fields::DEFINITION_NAME).is_some();
        if has_id == has_name {
            let message = if has_id {
                format!("Entry {index} sets both policyDefinitionId and policyDefinitionName")
            } else {
                format!("Entry {index} sets neither policyDefinitionId nor policyDefinitionName")
            };
            issues.push(
                rule.issue(INVALID_DEFINITION_REFERENCE, message)
                    .with_range(range_at(ctx, &entry.path))
                    .with_data(json!({"path": path_to_json(&entry.path)})),
            );
        }

        match fields::get_with_path(entry.value, &entry.path, fields::REFERENCE_ID) {
            Some((path, Value::String(reference_id))) if !reference_id.trim().is_empty() => {
                if !seen.insert(reference_id.to_ascii_lowercase()) {
                    issues.push(
                        rule.issue(
                            DUPLICATE_REFERENCE_ID,
                            format!("Reference id '{reference_id}' is already used"),
                        )
                        .with_range(range_at(ctx, &path))
                        .with_data(json!({
                            "path": path_to_json(&path),
                            "referenceId": reference_id,
                        })),
                    );
                }
            }
            _ => {
                issues.push(
                    rule.issue(
                        MISSING_REFERENCE_ID,
                        format!("Entry {index} has no policyDefinitionReferenceId"),
                    )
                    .with_range(range_at(ctx, &entry.path))
                    .with_data(json!({"path": path_to_json(&entry.path)})),
                );
            }
        }
    }

    Ok(issues)
}

fn fix_reference_id(_: &Rule, ctx: &ValidationContext<'_>, issue: &Issue) -> Result<Option<TextEdit>> {
    let path = issue
        .path()
        .ok_or_else(|| LintError::fix(&issue.code, "issue has no path"))?;
    let Some(node) = ctx.parsed.node_at(&path) else {
        return Ok(None);
    };
    let used = used_reference_ids(ctx.value);

    match issue.code.as_str() {
        DUPLICATE_REFERENCE_ID => {
            let Some(current) = issue.data_str("referenceId") else {
                return Ok(None);
            };
            let renamed = unique_reference_id(current, &used);
            replace_value(ctx.parsed, node, &Value::String(renamed)).map(Some)
        }
        MISSING_REFERENCE_ID => {
            let Some(entry) = ctx.value.pointer(&pointer(&path)) else {
                return Ok(None);
            };
            let Some(base) = derive_reference_id(entry) else {
                return Ok(None);
            };
            let reference_id = unique_reference_id(&base, &used);
            let value = Value::String(reference_id);
            match fields::get_with_path(entry, &path, fields::REFERENCE_ID) {
                // present but blank or not a string
                Some((value_path, _)) => match ctx.parsed.node_at(&value_path) {
                    Some(value_node) => replace_value(ctx.parsed, value_node, &value).map(Some),
                    None => Ok(None),
                },
                None => insert_property(ctx.parsed, node, REFERENCE_ID_KEY, &value).map(Some),
            }
        }
        _ => Ok(None),
    }
}

fn pointer(path: &[PathSegment]) -> String {
    path.iter()
        .map(|segment| match segment {
            PathSegment::Key(key) => format!("/{}", key.replace('~', "~0").replace('/', "~1")),
            PathSegment::Index(index) => format!("/{index}"),
        })
        .collect()
}

fn check_not_empty(rule: &Rule, ctx: &ValidationContext<'_>) -> Result<Vec<Issue>> {
    let Some((list_path, entries)) = entries(ctx.value) else {
        return Ok(vec![]);
    };
    if !entries.is_empty() {
        return Ok(vec![]);
    }
    Ok(vec![
        rule.issue(EMPTY_DEFINITIONS, "Collection does not reference any definitions")
            .with_range(range_at(ctx, &list_path))
            .with_data(json!({"path": path_to_json(&list_path)})),
    ])
}
