//! Rules for assignment trees.
//!
//! An assignment file is a tree of nodes linked through `children`. Scope
//! is inherited down the tree, so a node without its own `scope` is fine
//! as long as an ancestor has one.

use serde_json::{Map, Value, json};

use crate::error::{LintError, Result};
use crate::fields;
use crate::lint::config::ValidationContext;
use crate::lint::diagnostic::{Issue, RuleCategory, Severity, path_to_json};
use crate::lint::edit::{TextEdit, insert_property, replace_value};
use crate::lint::rule::{Fixer, Rule};
use crate::parser::{PathSegment, SourceSpan};

pub const NAME_LENGTH: &str = "NAME_LENGTH";
pub const MISSING_SCOPE: &str = "MISSING_SCOPE";
pub const INVALID_SCOPE: &str = "INVALID_SCOPE";
pub const CONFLICTING_DEFINITION_REFERENCES: &str = "CONFLICTING_DEFINITION_REFERENCES";

/// Longest assignment name Azure accepts.
pub const MAX_NAME_LENGTH: usize = 24;

/// Scope path prefixes, compared case-insensitively.
pub const SCOPE_PREFIXES: [&str; 2] = [
    "/providers/microsoft.management/managementgroups/",
    "/subscriptions/",
];

const PLACEHOLDER_SCOPE: &str = "/providers/Microsoft.Management/managementGroups/<management-group-id>";
const PLACEHOLDER_ENVIRONMENT: &str = "default";

pub const NAME_LENGTH_RULE: Rule = Rule {
    id: "name-length",
    name: "Assignment Name Length",
    description: "Assignment names must be at most 24 characters",
    category: RuleCategory::Naming,
    severity: Severity::Error,
    enabled: true,
    codes: &[NAME_LENGTH],
    validate: check_name_length,
    fix: Some(Fixer {
        codes: &[NAME_LENGTH],
        apply: truncate_name,
    }),
};

pub const SCOPE_RULE: Rule = Rule {
    id: "assignment-scope",
    name: "Assignment Scope",
    description: "Every leaf node needs a scope, and scopes must be management group or subscription paths",
    category: RuleCategory::Scope,
    severity: Severity::Error,
    enabled: true,
    codes: &[MISSING_SCOPE, INVALID_SCOPE],
    validate: check_scope,
    fix: Some(Fixer {
        codes: &[MISSING_SCOPE],
        apply: insert_scope,
    }),
};

pub const EXCLUSIVE_REFERENCE_RULE: Rule = Rule {
    id: "exclusive-definition-reference",
    name: "Exclusive Definition Reference",
    description: "A node references its definitions one way only",
    category: RuleCategory::Reference,
    severity: Severity::Error,
    enabled: true,
    codes: &[CONFLICTING_DEFINITION_REFERENCES],
    validate: check_exclusive_reference,
    fix: None,
};

/// Rules run for assignments, after schema validation.
#[must_use]
pub fn assignment_rules() -> Vec<Rule> {
    vec![NAME_LENGTH_RULE, SCOPE_RULE, EXCLUSIVE_REFERENCE_RULE]
}

/// One node of the assignment tree.
struct TreeNode<'a> {
    path: Vec<PathSegment>,
    value: &'a Value,
    /// This node or an ancestor declares a scope
    scoped: bool,
    leaf: bool,
}

fn tree_nodes(root: &Value) -> Vec<TreeNode<'_>> {
    let mut out = Vec::new();
    visit(root, Vec::new(), false, &mut out);
    out
}

fn visit<'a>(value: &'a Value, path: Vec<PathSegment>, inherited: bool, out: &mut Vec<TreeNode<'a>>) {
    if !value.is_object() {
        return;
    }
    let scoped = inherited || fields::get(value, fields::SCOPE).is_some();
    let children = fields::get_with_path(value, &path, fields::CHILDREN)
        .and_then(|(children_path, children)| Some((children_path, children.as_array()?)));
    let leaf = children.as_ref().is_none_or(|(_, list)| list.is_empty());

    out.push(TreeNode {
        path,
        value,
        scoped,
        leaf,
    });

    if let Some((children_path, list)) = children {
        for (index, child) in list.iter().enumerate() {
            let mut child_path = children_path.clone();
            child_path.push(PathSegment::Index(index));
            visit(child, child_path, scoped, out);
        }
    }
}

fn range_at(ctx: &ValidationContext<'_>, path: &[PathSegment]) -> SourceSpan {
    ctx.parsed
        .node_at(path)
        .map_or_else(|| ctx.parsed.first_line(), |node| ctx.parsed.range_of(node))
}

/// Every `assignment.name` on a node, including those inside
/// `definitionEntryList` entries.
fn assignment_names<'a>(node: &TreeNode<'a>) -> Vec<(Vec<PathSegment>, &'a str)> {
    let mut holders = vec![(node.path.clone(), node.value)];
    if let Some((list_path, list)) =
        fields::get_with_path(node.value, &node.path, fields::DEFINITION_ENTRY_LIST)
    {
        for (index, entry) in list.as_array().into_iter().flatten().enumerate() {
            let mut entry_path = list_path.clone();
            entry_path.push(PathSegment::Index(index));
            holders.push((entry_path, entry));
        }
    }

    holders
        .into_iter()
        .filter_map(|(path, holder)| {
            let (assignment_path, assignment) =
                fields::get_with_path(holder, &path, fields::ASSIGNMENT)?;
            let (name_path, name) = fields::get_with_path(assignment, &assignment_path, fields::NAME)?;
            Some((name_path, name.as_str()?))
        })
        .collect()
}

fn check_name_length(rule: &Rule, ctx: &ValidationContext<'_>) -> Result<Vec<Issue>> {
    let mut issues = Vec::new();
    for node in tree_nodes(ctx.value) {
        for (path, name) in assignment_names(&node) {
            let length = name.chars().count();
            if length <= MAX_NAME_LENGTH {
                continue;
            }
            issues.push(
                rule.issue(
                    NAME_LENGTH,
                    format!("Assignment name '{name}' is {length} characters; the limit is {MAX_NAME_LENGTH}"),
                )
                .with_range(range_at(ctx, &path))
                .with_data(json!({"path": path_to_json(&path), "name": name}))
                .with_suggestion("Shorten the name to 24 characters or fewer"),
            );
        }
    }
    Ok(issues)
}

fn truncate_name(_: &Rule, ctx: &ValidationContext<'_>, issue: &Issue) -> Result<Option<TextEdit>> {
    let path = issue
        .path()
        .ok_or_else(|| LintError::fix(&issue.code, "issue has no path"))?;
    let Some(node) = ctx.parsed.node_at(&path) else {
        return Ok(None);
    };
    let Some(name) = node.as_str() else {
        return Ok(None);
    };
    let truncated: String = name.chars().take(MAX_NAME_LENGTH).collect();
    replace_value(ctx.parsed, node, &Value::String(truncated)).map(Some)
}

fn is_valid_scope_path(path: &str) -> bool {
    let lower = path.trim().to_ascii_lowercase();
    SCOPE_PREFIXES
        .iter()
        .any(|prefix| lower.starts_with(prefix) && lower.len() > prefix.len())
}

fn check_scope(rule: &Rule, ctx: &ValidationContext<'_>) -> Result<Vec<Issue>> {
    let mut issues = Vec::new();

    for node in tree_nodes(ctx.value) {
        if node.leaf && !node.scoped {
            let label = fields::string(node.value, fields::NODE_NAME).unwrap_or("<unnamed>");
            issues.push(
                rule.issue(MISSING_SCOPE, format!("Node '{label}' has no scope, and no ancestor defines one"))
                    .with_range(range_at(ctx, &node.path))
                    .with_data(json!({"path": path_to_json(&node.path)})),
            );
        }

        let Some((scope_path, scope)) = fields::get_with_path(node.value, &node.path, fields::SCOPE)
        else {
            continue;
        };
        let Some(environments) = scope.as_object() else {
            issues.push(
                rule.issue(INVALID_SCOPE, "Scope must map environments to scope paths")
                    .with_range(range_at(ctx, &scope_path))
                    .with_data(json!({"path": path_to_json(&scope_path)})),
            );
            continue;
        };
        for (environment, paths) in environments {
            let mut env_path = scope_path.clone();
            env_path.push(PathSegment::key(environment));
            issues.extend(check_scope_paths(rule, ctx, environment, &env_path, paths));
        }
    }

    Ok(issues)
}

fn check_scope_paths(
    rule: &Rule,
    ctx: &ValidationContext<'_>,
    environment: &str,
    env_path: &[PathSegment],
    paths: &Value,
) -> Vec<Issue> {
    let candidates: Vec<(Vec<PathSegment>, &Value)> = match paths {
        Value::Array(items) => items
            .iter()
            .enumerate()
            .map(|(index, item)| {
                let mut path = env_path.to_vec();
                path.push(PathSegment::Index(index));
                (path, item)
            })
            .collect(),
        other => vec![(env_path.to_vec(), other)],
    };

    candidates
        .into_iter()
        .filter_map(|(path, value)| {
            let message = match value.as_str() {
                Some(scope) if is_valid_scope_path(scope) => return None,
                Some(scope) => format!(
                    "Scope '{scope}' for '{environment}' is not a management group or subscription path"
                ),
                None => format!("Scope for '{environment}' must be a path or a list of paths"),
            };
            Some(
                rule.issue(INVALID_SCOPE, message)
                    .with_range(range_at(ctx, &path))
                    .with_data(json!({"path": path_to_json(&path)})),
            )
        })
        .collect()
}

/// Placeholder scope in the shape of the first scope already in the document.
fn placeholder_scope(root: &Value) -> Value {
    let existing = tree_nodes(root)
        .into_iter()
        .find_map(|node| fields::value(node.value, fields::SCOPE)?.as_object().cloned());

    let mut scope = Map::new();
    match existing.filter(|envs| !envs.is_empty()) {
        Some(environments) => {
            for (environment, paths) in environments {
                let placeholder = if paths.is_array() {
                    json!([PLACEHOLDER_SCOPE])
                } else {
                    json!(PLACEHOLDER_SCOPE)
                };
                scope.insert(environment, placeholder);
            }
        }
        None => {
            scope.insert(PLACEHOLDER_ENVIRONMENT.to_string(), json!([PLACEHOLDER_SCOPE]));
        }
    }
    Value::Object(scope)
}

fn insert_scope(_: &Rule, ctx: &ValidationContext<'_>, issue: &Issue) -> Result<Option<TextEdit>> {
    let path = issue
        .path()
        .ok_or_else(|| LintError::fix(&issue.code, "issue has no path"))?;
    let Some(node) = ctx.parsed.node_at(&path) else {
        return Ok(None);
    };
    insert_property(ctx.parsed, node, "scope", &placeholder_scope(ctx.value)).map(Some)
}

fn check_exclusive_reference(rule: &Rule, ctx: &ValidationContext<'_>) -> Result<Vec<Issue>> {
    let mut issues = Vec::new();

    for node in tree_nodes(ctx.value) {
        let entry = fields::get_with_path(node.value, &node.path, fields::DEFINITION_ENTRY);
        let list = fields::get_with_path(node.value, &node.path, fields::DEFINITION_ENTRY_LIST);

        if let (Some((entry_path, _)), Some(_)) = (&entry, &list) {
            issues.push(
                rule.issue(
                    CONFLICTING_DEFINITION_REFERENCES,
                    "definitionEntry and definitionEntryList cannot be used on the same node",
                )
                .with_range(range_at(ctx, entry_path))
                .with_data(json!({"path": path_to_json(entry_path)})),
            );
        }

        let mut references = Vec::new();
        if let Some((entry_path, entry)) = entry {
            references.push((entry_path, entry));
        }
        if let Some((list_path, list)) = list {
            for (index, item) in list.as_array().into_iter().flatten().enumerate() {
                let mut item_path = list_path.clone();
                item_path.push(PathSegment::Index(index));
                references.push((item_path, item));
            }
        }

        for (path, reference) in references {
            let named: Vec<&str> = [
                ("policyId", fields::POLICY_ID),
                ("policyName", fields::POLICY_NAME),
                ("policySetId", fields::POLICY_SET_ID),
                ("policySetName", fields::POLICY_SET_NAME),
            ]
            .into_iter()
            .filter(|(_, aliases)| fields::non_empty_str(reference, aliases).is_some())
            .map(|(label, _)| label)
            .collect();

            if named.len() > 1 {
                issues.push(
                    rule.issue(
                        CONFLICTING_DEFINITION_REFERENCES,
                        format!("Reference sets {}; use exactly one", named.join(", ")),
                    )
                    .with_range(range_at(ctx, &path))
                    .with_data(json!({"path": path_to_json(&path)})),
                );
            }
        }
    }

    Ok(issues)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lint::config::ValidationConfig;
    use crate::parser::parse;
    use crate::schema::SchemaRegistry;

    fn run(rule: &Rule, text: &str) -> Vec<Issue> {
        let parsed = parse(text);
        let schemas = SchemaRegistry::new(None);
        let config = ValidationConfig::new();
        let ctx = ValidationContext::new(&parsed, &schemas, &config).unwrap();
        rule.run(&ctx).unwrap()
    }

    fn fix(rule: &Rule, text: &str, issue: &Issue) -> String {
        let parsed = parse(text);
        let schemas = SchemaRegistry::new(None);
        let config = ValidationConfig::new();
        let ctx = ValidationContext::new(&parsed, &schemas, &config).unwrap();
        rule.fix(&ctx, issue).unwrap().unwrap().apply(text).unwrap()
    }

    const TREE: &str = r#"{
  "nodeName": "/root",
  "scope": {"prod": ["/providers/Microsoft.Management/managementGroups/contoso"]},
  "children": [
    {
      "nodeName": "security",
      "assignment": {"name": "security-baseline-for-production"},
      "definitionEntry": {"policySetName": "baseline"},
      "children": [
        {
          "nodeName": "nested",
          "assignment": {"name": "another-name-that-is-way-too-long"}
        },
        {
          "nodeName": "short",
          "assignment": {"name": "ok-name"}
        }
      ]
    }
  ]
}"#;

    #[test]
    fn test_every_long_name_reported_once() {
        let issues = run(&NAME_LENGTH_RULE, TREE);
        assert_eq!(issues.len(), 2);
        assert!(issues.iter().all(|i| i.code == NAME_LENGTH));
        assert_eq!(issues[0].data_str("name"), Some("security-baseline-for-production"));
        assert_eq!(issues[1].data_str("name"), Some("another-name-that-is-way-too-long"));
    }

    #[test]
    fn test_name_fix_truncates() {
        let issues = run(&NAME_LENGTH_RULE, TREE);
        let fixed = fix(&NAME_LENGTH_RULE, TREE, &issues[1]);
        let value: Value = serde_json::from_str(&fixed).unwrap();
        assert_eq!(
            value["children"][0]["children"][0]["assignment"]["name"],
            "another-name-that-is-way"
        );
        assert_eq!(run(&NAME_LENGTH_RULE, &fixed).len(), 1);
    }

    #[test]
    fn test_names_in_entry_lists() {
        let text = r#"{"nodeName": "/r", "definitionEntryList": [
            {"policySetName": "a", "assignment": {"name": "this-name-is-definitely-too-long"}}
        ]}"#;
        let issues = run(&NAME_LENGTH_RULE, text);
        assert_eq!(issues.len(), 1);
        assert_eq!(
            issues[0].path().unwrap()[..2],
            [PathSegment::key("definitionEntryList"), PathSegment::Index(0)]
        );
    }

    #[test]
    fn test_inherited_scope_is_enough() {
        assert!(run(&SCOPE_RULE, TREE).is_empty());
    }

    #[test]
    fn test_missing_scope_fix_follows_document_shape() {
        let text = r#"{
  "nodeName": "/root",
  "children": [
    {"nodeName": "a", "scope": {"dev": "/subscriptions/0000", "prod": "/subscriptions/1111"}},
    {"nodeName": "b"}
  ]
}"#;
        let issues = run(&SCOPE_RULE, text);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].code, MISSING_SCOPE);

        let fixed = fix(&SCOPE_RULE, text, &issues[0]);
        let value: Value = serde_json::from_str(&fixed).unwrap();
        let scope = &value["children"][1]["scope"];
        assert_eq!(scope["dev"], PLACEHOLDER_SCOPE);
        assert_eq!(scope["prod"], PLACEHOLDER_SCOPE);
        assert!(run(&SCOPE_RULE, &fixed).is_empty());
    }

    #[test]
    fn test_missing_scope_default_shape() {
        let text = r#"{"nodeName": "/root"}"#;
        let issues = run(&SCOPE_RULE, text);
        assert_eq!(issues.len(), 1);

        let fixed = fix(&SCOPE_RULE, text, &issues[0]);
        let value: Value = serde_json::from_str(&fixed).unwrap();
        assert_eq!(value["scope"]["default"], json!([PLACEHOLDER_SCOPE]));
        assert!(run(&SCOPE_RULE, &fixed).is_empty());
    }

    #[test]
    fn test_invalid_scope_paths() {
        let text = r#"{"nodeName": "/root", "scope": {
            "prod": ["/subscriptions/1111", "/resourceGroups/rg"],
            "dev": 5,
            "test": "/PROVIDERS/microsoft.management/MANAGEMENTGROUPS/x"
        }}"#;
        let issues = run(&SCOPE_RULE, text);
        assert_eq!(issues.len(), 2);
        assert!(issues.iter().all(|i| i.code == INVALID_SCOPE));
        assert!(SCOPE_RULE.fix.is_some_and(|f| !f.codes.contains(&INVALID_SCOPE)));
    }

    #[test]
    fn test_conflicting_references() {
        let text = r#"{"nodeName": "/root",
            "definitionEntry": {"policyId": "/x", "policySetName": "y"},
            "definitionEntryList": [{"policyName": "z"}]
        }"#;
        let issues = run(&EXCLUSIVE_REFERENCE_RULE, text);
        assert_eq!(issues.len(), 2);
        assert!(issues.iter().all(|i| i.code == CONFLICTING_DEFINITION_REFERENCES));
        assert!(issues[1].message.contains("policyId, policySetName"));

        let clean = r#"{"nodeName": "/root", "definitionEntry": {"policySetName": "y"}}"#;
        assert!(run(&EXCLUSIVE_REFERENCE_RULE, clean).is_empty());
    }
}
