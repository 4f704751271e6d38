use std::sync::Arc;

use policy_lint::diagnostics::MemorySink;
use policy_lint::lint::ValidationConfig;
use policy_lint::orchestrator::{DEFAULT_CACHE_CAPACITY, ValidationService};
use policy_lint::schema::{SCHEMA_VIOLATION, SchemaRegistry};
use policy_lint::test_utils::PolicyFixture;

const BAD_PARAMETER_TYPE: &str = r#"{
  "name": "audit-tags",
  "properties": {
    "mode": "Indexed",
    "parameters": {
      "effect": {"type": "Str", "defaultValue": "Audit"}
    },
    "policyRule": {
      "if": {"field": "tags", "exists": "false"},
      "then": {"effect": "[parameters('effect')]"}
    }
  }
}"#;

const NO_NAME: &str = r#"{
  "mode": "All",
  "parameters": {"effect": {"type": "String"}},
  "policyRule": {
    "if": {"field": "type", "equals": "x"},
    "then": {"effect": "[parameters('effect')]"}
  }
}"#;

fn service_over(registry: SchemaRegistry) -> ValidationService {
    ValidationService::new(
        Arc::new(registry),
        ValidationConfig::default(),
        Arc::new(MemorySink::new()),
        std::time::Duration::from_millis(500),
        DEFAULT_CACHE_CAPACITY,
    )
}

#[test]
fn test_full_schema_catches_parameter_type() {
    let fixture = PolicyFixture::new();
    let dir = fixture.copy_schemas(&[]);
    let service = service_over(SchemaRegistry::new(Some(dir)));
    let result = service.validate_document("def", BAD_PARAMETER_TYPE, 1).unwrap();
    let violations: Vec<_> = result.with_code(SCHEMA_VIOLATION).collect();
    assert_eq!(violations.len(), 1);
    assert!(violations[0].message.starts_with("properties.parameters.effect.type"));
    // the range points at the offending value, line 5 (0-indexed)
    assert_eq!(violations[0].range.start_line, 5);
}

#[test]
fn test_missing_schema_file_uses_fallback() {
    let fixture = PolicyFixture::new();
    let dir = fixture.copy_schemas(&["policy-definition"]);
    let registry = SchemaRegistry::new(Some(dir));
    assert!(registry.load("policy-definition").fallback);
    assert!(!registry.load("policy-set-definition").fallback);

    let service = service_over(registry);
    let result = service.validate_document("def", BAD_PARAMETER_TYPE, 1).unwrap();
    assert_eq!(result.with_code(SCHEMA_VIOLATION).count(), 0);

    let result = service.validate_document("bare", NO_NAME, 1).unwrap();
    let messages: Vec<&str> = result
        .with_code(SCHEMA_VIOLATION)
        .map(|issue| issue.message.as_str())
        .collect();
    assert_eq!(messages.len(), 2);
    assert!(messages.iter().any(|m| m.contains("\"name\"")));
    assert!(messages.iter().any(|m| m.contains("\"properties\"")));
}

#[test]
fn test_corrupt_schema_file_uses_fallback() {
    let fixture = PolicyFixture::new();
    let dir = fixture.copy_schemas(&["policy-definition"]);
    std::fs::write(dir.join("policy-definition-schema.json"), "{ not json").unwrap();
    let registry = SchemaRegistry::new(Some(dir));
    assert!(registry.load("policy-definition").fallback);
}
