//! Rules for policy definitions.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Value, json};

use crate::error::{LintError, Result};
use crate::fields;
use crate::lint::config::ValidationContext;
use crate::lint::diagnostic::{Issue, RuleCategory, Severity, path_to_json};
use crate::lint::edit::{TextEdit, insert_property, replace_value};
use crate::lint::rule::{Fixer, Rule};
use crate::parser::PathSegment;

pub const MISSING_EFFECT_PARAMETER: &str = "MISSING_EFFECT_PARAMETER";
pub const EFFECT_NOT_PARAMETERIZED: &str = "EFFECT_NOT_PARAMETERIZED";

static PARAMETER_EXPRESSION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\[\s*parameters\(\s*'([^']+)'\s*\)\s*\]$").expect("valid regex")
});

pub const EFFECT_PARAMETER_RULE: Rule = Rule {
    id: "effect-parameter",
    name: "Effect Parameter",
    description: "The policy effect should come from a declared parameter",
    category: RuleCategory::Structure,
    severity: Severity::Error,
    enabled: true,
    codes: &[MISSING_EFFECT_PARAMETER, EFFECT_NOT_PARAMETERIZED],
    validate: check_effect,
    fix: Some(Fixer {
        codes: &[MISSING_EFFECT_PARAMETER, EFFECT_NOT_PARAMETERIZED],
        apply: fix_effect,
    }),
};

/// Rules run for definitions, after schema validation.
#[must_use]
pub fn definition_rules() -> Vec<Rule> {
    vec![EFFECT_PARAMETER_RULE]
}

/// Standard declaration inserted for a missing effect parameter.
#[must_use]
pub fn effect_parameter_declaration() -> Value {
    json!({
        "type": "String",
        "metadata": {
            "displayName": "Effect",
            "description": "Enable or disable the execution of the policy"
        },
        "allowedValues": ["Audit", "Deny", "Disabled"],
        "defaultValue": "Audit"
    })
}

/// Parameter named by a `[parameters('x')]` expression.
fn referenced_parameter(effect: &str) -> Option<&str> {
    PARAMETER_EXPRESSION
        .captures(effect.trim())
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

fn effect_location(value: &Value) -> Option<(Vec<PathSegment>, &str)> {
    let (props_path, props) = fields::properties(value);
    let (rule_path, rule) = fields::get_with_path(props, &props_path, fields::POLICY_RULE)?;
    let (then_path, then) = fields::get_with_path(rule, &rule_path, fields::THEN)?;
    let (effect_path, effect) = fields::get_with_path(then, &then_path, fields::EFFECT)?;
    Some((effect_path, effect.as_str()?))
}

fn declared_parameters(value: &Value) -> Option<&serde_json::Map<String, Value>> {
    let (_, props) = fields::properties(value);
    fields::value(props, fields::PARAMETERS).and_then(Value::as_object)
}

fn parameter_declared(value: &Value, name: &str) -> bool {
    declared_parameters(value).is_some_and(|params| params.keys().any(|key| key.eq_ignore_ascii_case(name)))
}

/// Declared parameter that should carry a literal effect: one named after the
/// effect, else one whose allowed values include the literal.
fn effect_parameter_for(value: &Value, effect: &str) -> Option<String> {
    let params = declared_parameters(value)?;
    let by_name = params
        .keys()
        .find(|key| key.to_ascii_lowercase().contains("effect"));
    let by_values = || {
        params.iter().find_map(|(key, decl)| {
            let allowed = fields::value(decl, fields::ALLOWED_VALUES)?.as_array()?;
            allowed
                .iter()
                .filter_map(Value::as_str)
                .any(|v| v.eq_ignore_ascii_case(effect.trim()))
                .then_some(key)
        })
    };
    by_name.or_else(by_values).cloned()
}

fn check_effect(rule: &Rule, ctx: &ValidationContext<'_>) -> Result<Vec<Issue>> {
    let Some((path, effect)) = effect_location(ctx.value) else {
        return Ok(vec![]);
    };
    let range = ctx
        .parsed
        .node_at(&path)
        .map_or_else(|| ctx.parsed.first_line(), |node| ctx.parsed.range_of(node));

    if let Some(parameter) = referenced_parameter(effect) {
        if parameter_declared(ctx.value, parameter) {
            return Ok(vec![]);
        }
        return Ok(vec![
            rule.issue(
                MISSING_EFFECT_PARAMETER,
                format!("Effect refers to parameter '{parameter}' which is not declared"),
            )
            .with_range(range)
            .with_data(json!({"path": path_to_json(&path), "parameter": parameter}))
            .with_suggestion(format!("Declare '{parameter}' under properties.parameters")),
        ]);
    }

    if effect.trim_start().starts_with('[') {
        // some other template expression
        return Ok(vec![]);
    }
    let Some(parameter) = effect_parameter_for(ctx.value, effect) else {
        return Ok(vec![]);
    };

    Ok(vec![
        Issue::warning(
            rule.id,
            EFFECT_NOT_PARAMETERIZED,
            format!("Effect '{effect}' is hard-coded but parameter '{parameter}' is declared"),
        )
        .with_range(range)
        .with_data(json!({"path": path_to_json(&path), "effect": effect, "parameter": parameter}))
        .with_suggestion(format!("Use \"[parameters('{parameter}')]\"")),
    ])
}

fn fix_effect(_: &Rule, ctx: &ValidationContext<'_>, issue: &Issue) -> Result<Option<TextEdit>> {
    match issue.code.as_str() {
        MISSING_EFFECT_PARAMETER => {
            let parameter = issue
                .data_str("parameter")
                .ok_or_else(|| LintError::fix(&issue.code, "issue has no parameter name"))?;
            declare_parameter(ctx, parameter).map(Some)
        }
        EFFECT_NOT_PARAMETERIZED => {
            let parameter = issue
                .data_str("parameter")
                .ok_or_else(|| LintError::fix(&issue.code, "issue has no parameter name"))?;
            let Some(node) = issue.path().and_then(|path| ctx.parsed.node_at(&path)) else {
                return Ok(None);
            };
            let expression = Value::String(format!("[parameters('{parameter}')]"));
            replace_value(ctx.parsed, node, &expression).map(Some)
        }
        _ => Ok(None),
    }
}

fn declare_parameter(ctx: &ValidationContext<'_>, parameter: &str) -> Result<TextEdit> {
    let (props_path, props) = fields::properties(ctx.value);

    if let Some((params_path, _)) = fields::get_with_path(props, &props_path, fields::PARAMETERS) {
        let node = ctx
            .parsed
            .node_at(&params_path)
            .ok_or_else(|| LintError::fix(MISSING_EFFECT_PARAMETER, "parameters not in tree"))?;
        return insert_property(ctx.parsed, node, parameter, &effect_parameter_declaration());
    }

    let node = ctx
        .parsed
        .node_at(&props_path)
        .ok_or_else(|| LintError::fix(MISSING_EFFECT_PARAMETER, "properties not in tree"))?;
    let mut parameters = serde_json::Map::new();
    parameters.insert(parameter.to_string(), effect_parameter_declaration());
    insert_property(ctx.parsed, node, "parameters", &Value::Object(parameters))
}
