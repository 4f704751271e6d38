use std::sync::Arc;

use serde_json::Value;

use policy_lint::classify::DocumentType;
use policy_lint::diagnostics::{DiagnosticSink, MemorySink};
use policy_lint::lint::rules::assignment::NAME_LENGTH;
use policy_lint::lint::rules::collection::{DUPLICATE_REFERENCE_ID, EMPTY_DEFINITIONS};
use policy_lint::lint::rules::definition::{EFFECT_NOT_PARAMETERIZED, MISSING_EFFECT_PARAMETER};
use policy_lint::lint::{Severity, ValidationConfig};
use policy_lint::test_utils::{PolicyFixture, fixtures};

fn collection_with(entries: &str) -> String {
    format!(r#"{{"name": "set", "properties": {{"displayName": "Set", "policyDefinitions": [{entries}]}}}}"#)
}

#[test]
fn test_fixtures_are_clean() {
    let service = PolicyFixture::new().service();
    for (id, text) in [
        ("definition", fixtures::DEFINITION),
        ("collection", fixtures::COLLECTION),
        ("assignment", fixtures::ASSIGNMENT),
    ] {
        let result = service.validate_document(id, text, 1).unwrap();
        assert!(result.issues.is_empty(), "{id}: {:?}", result.issues);
        assert!(result.valid);
    }
}

#[test]
fn test_nested_long_names_reported_once_each() {
    let text = r#"{
  "nodeName": "/root",
  "definitionEntry": {"policySetName": "baseline"},
  "scope": {"prod": ["/subscriptions/1111"]},
  "children": [
    {
      "nodeName": "a",
      "assignment": {"name": "abcdefghijklmnopqrstuvwxyz-one"},
      "children": [
        {"nodeName": "b", "assignment": {"name": "abcdefghijklmnopqrstuvwxyz-two"}}
      ]
    },
    {"nodeName": "c", "assignment": {"name": "short"}}
  ]
}"#;
    let service = PolicyFixture::new().service();
    let result = service.did_open("tree", text, 1).unwrap();
    assert_eq!(result.doc_type, DocumentType::Assignment);
    let issues: Vec<_> = result.with_code(NAME_LENGTH).cloned().collect();
    assert_eq!(issues.len(), 2);

    let edit = service.request_fix("tree", NAME_LENGTH, issues[0].range).unwrap();
    assert_eq!(edit.new_text, "\"abcdefghijklmnopqrstuvwx\"");

    let applied = service.apply_fix("tree", NAME_LENGTH, issues[0].range).unwrap().unwrap();
    let remaining: Vec<_> = applied.result.unwrap().with_code(NAME_LENGTH).cloned().collect();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].range, issues[1].range);
}

#[test]
fn test_duplicate_reference_ids() {
    let entry = r#"{"policyDefinitionReferenceId": "r", "policyDefinitionName": "d"}"#;
    let text = collection_with(&[entry; 4].join(","));
    let service = PolicyFixture::new().service();
    let result = service.validate_document("set", &text, 1).unwrap();
    assert_eq!(result.with_code(DUPLICATE_REFERENCE_ID).count(), 3);
    assert!(!result.valid);
}

#[test]
fn test_missing_effect_parameter_fix_is_clean() {
    let service = PolicyFixture::new().service();
    let result = service
        .did_open("def", fixtures::DEFINITION_MISSING_EFFECT, 1)
        .unwrap();
    let issues: Vec<_> = result.with_code(MISSING_EFFECT_PARAMETER).cloned().collect();
    assert_eq!(issues.len(), 1);

    let applied = service
        .apply_fix("def", MISSING_EFFECT_PARAMETER, issues[0].range)
        .unwrap()
        .unwrap();
    let value: Value = serde_json::from_str(&applied.text).unwrap();
    assert_eq!(value["properties"]["parameters"]["effect"]["type"], "String");

    let result = applied.result.unwrap();
    assert_eq!(result.with_code(MISSING_EFFECT_PARAMETER).count(), 0);
    assert!(result.valid);
}

#[test]
fn test_empty_collection_is_valid_with_warning() {
    let service = PolicyFixture::new().service();
    let result = service.validate_document("set", &collection_with(""), 1).unwrap();
    let empty: Vec<_> = result.with_code(EMPTY_DEFINITIONS).collect();
    assert_eq!(empty.len(), 1);
    assert_eq!(empty[0].severity, Severity::Warning);
    assert!(result.valid);
}

#[test]
fn test_strict_mode_blocks_on_warnings() {
    let fixture = PolicyFixture::new();
    let service = fixture.service_with(ValidationConfig::new().strict(), Arc::new(MemorySink::new()));
    let result = service.validate_document("set", &collection_with(""), 1).unwrap();
    assert_eq!(result.with_code(EMPTY_DEFINITIONS).next().unwrap().severity, Severity::Error);
    assert!(!result.valid);
}

#[test]
fn test_disabled_rule_is_skipped() {
    let fixture = PolicyFixture::new();
    let config = ValidationConfig::new().disable_rule("non-empty-collection");
    let service = fixture.service_with(config, Arc::new(MemorySink::new()));
    let result = service.validate_document("set", &collection_with(""), 1).unwrap();
    assert!(result.issues.is_empty());
}

#[test]
fn test_malformed_document_returns_none() {
    let sink = Arc::new(MemorySink::new());
    let service = PolicyFixture::new().service_with(
        ValidationConfig::default(),
        Arc::clone(&sink) as Arc<dyn DiagnosticSink>,
    );
    let broken = &fixtures::DEFINITION[..fixtures::DEFINITION.len() - 3];
    assert!(service.validate_document("def", broken, 1).is_none());
    assert!(sink.get("def").is_none());
    assert_eq!(sink.publish_count("def"), 0);
}

#[test]
fn test_fix_all_reaches_fixed_point() {
    let text = r#"{
  "name": "deny-public-ip",
  "properties": {
    "displayName": "Deny public IP",
    "mode": "All",
    "parameters": {
      "ipEffect": {"type": "String", "allowedValues": ["Audit", "Deny"]}
    },
    "policyRule": {
      "if": {"field": "type", "equals": "Microsoft.Network/publicIPAddresses"},
      "then": {"effect": "Deny"}
    }
  }
}"#;
    let service = PolicyFixture::new().service();
    service.did_open("def", text, 1).unwrap();
    let outcome = service.fix_all("def").unwrap();
    assert_eq!(outcome.applied, vec![EFFECT_NOT_PARAMETERIZED.to_string()]);

    let value: Value = serde_json::from_str(&outcome.text).unwrap();
    assert_eq!(
        value["properties"]["policyRule"]["then"]["effect"],
        "[parameters('ipEffect')]"
    );
    assert!(outcome.result.unwrap().issues.is_empty());
}

#[test]
fn test_literal_effect_without_parameters_stays_valid() {
    let text = r#"{
  "name": "deny-public-ip",
  "properties": {
    "displayName": "Deny public IP",
    "mode": "All",
    "policyRule": {
      "if": {"field": "type", "equals": "Microsoft.Network/publicIPAddresses"},
      "then": {"effect": "Deny"}
    }
  }
}"#;
    let service = PolicyFixture::new().service();
    let result = service.did_open("def", text, 1).unwrap();
    assert!(result.valid);
    assert!(result.issues.is_empty());

    let outcome = service.fix_all("def").unwrap();
    assert!(outcome.applied.is_empty());
    assert_eq!(outcome.text, text);
}
