use policy_lint::classify::{DocumentType, classify};
use policy_lint::parser::parse;
use policy_lint::test_utils::fixtures;
use serde_json::json;

#[test]
fn test_fixtures_classify() {
    let cases = [
        (fixtures::DEFINITION, DocumentType::Definition),
        (fixtures::DEFINITION_MISSING_EFFECT, DocumentType::Definition),
        (fixtures::COLLECTION, DocumentType::Collection),
        (fixtures::ASSIGNMENT, DocumentType::Assignment),
    ];
    for (text, expected) in cases {
        let parsed = parse(text);
        assert!(parsed.is_clean());
        assert_eq!(classify(parsed.value.as_ref().unwrap()), expected);
    }
}

#[test]
fn test_declared_schema_overrides_structure() {
    // Looks like an assignment tree, but declares the definition schema.
    let value = json!({
        "$schema": "https://example.com/schemas/policy-definition-schema.json",
        "nodeName": "/root",
        "policyDefinitions": []
    });
    assert_eq!(classify(&value), DocumentType::Definition);

    let value = json!({
        "$schema": "https://schema.management.azure.com/schemas/2019-09-01/policySetDefinition.json",
        "name": "x"
    });
    assert_eq!(classify(&value), DocumentType::Collection);
}

#[test]
fn test_unknown_documents() {
    for value in [json!({}), json!([]), json!("text"), json!({"name": "x", "properties": {}})] {
        assert_eq!(classify(&value), DocumentType::None);
    }
}

#[test]
fn test_resource_type_is_last_resort() {
    let value = json!({
        "type": "Microsoft.Authorization/policyAssignments",
        "name": "a"
    });
    assert_eq!(classify(&value), DocumentType::Assignment);
}
