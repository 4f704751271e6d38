//! policy-lint rules - List validation rules

use clap::Args;
use colored::Colorize;

use super::RuleArgs;
use crate::app::AppContext;
use crate::classify::DocumentType;
use crate::cli::output::{HumanLayout, emit_human, emit_json, robot_ok};
use crate::error::{LintError, Result};
use crate::lint::RuleInfo;

#[derive(Args, Debug)]
pub struct RulesArgs {
    /// Show details for one rule id
    #[arg(long)]
    pub explain: Option<String>,
}

pub fn run(ctx: &AppContext, args: &RulesArgs) -> Result<()> {
    let service = ctx.service(&RuleArgs::default())?;
    let rules = service.list_rules();

    if let Some(rule_id) = &args.explain {
        let matching: Vec<&RuleInfo> = rules.iter().filter(|r| r.id == *rule_id).collect();
        let Some(first) = matching.first() else {
            return Err(LintError::NotFound(format!("rule '{rule_id}'")));
        };
        if !ctx.is_human() {
            return emit_json(&robot_ok(first));
        }
        let types: Vec<String> = matching.iter().map(|r| r.doc_type.to_string()).collect();
        let mut layout = HumanLayout::new();
        layout.title(&format!("Rule: {}", first.id));
        layout.kv("Name", &first.name);
        layout.kv("Applies to", &types.join(", "));
        layout.kv("Severity", &first.default_severity.to_string());
        layout.kv("Codes", &first.codes.join(", "));
        layout.kv("Auto-fix", if first.can_fix { "Yes" } else { "No" });
        layout.kv("Disabled", if first.disabled { "Yes" } else { "No" });
        layout.blank();
        layout.section("Description");
        layout.push_line(first.description.clone());
        emit_human(layout);
        return Ok(());
    }

    if !ctx.is_human() {
        return emit_json(&robot_ok(&rules));
    }

    let mut layout = HumanLayout::new();
    layout.title("Available Rules");
    for doc_type in [DocumentType::Definition, DocumentType::Collection, DocumentType::Assignment] {
        layout.section(&doc_type.to_string());
        for rule in rules.iter().filter(|r| r.doc_type == doc_type) {
            let fix_badge = if rule.can_fix { " [fixable]".green().to_string() } else { String::new() };
            let disabled = if rule.disabled { " [disabled]".dimmed().to_string() } else { String::new() };
            layout.bullet(&format!(
                "{} - {} ({}){fix_badge}{disabled}",
                rule.id, rule.name, rule.default_severity
            ));
        }
        layout.blank();
    }
    emit_human(layout);
    Ok(())
}
