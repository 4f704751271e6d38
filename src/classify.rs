//! Document type classification.
//!
//! Signals are checked in a fixed priority order and the first match
//! wins, even when a later signal would be more specific:
//!
//! 1. declared `$schema` matches a known canonical pattern
//! 2. provenance marker in `metadata`
//! 3. assignment root marker (`nodeName`)
//! 4. definition shape (`mode` plus a `policyRule` with `if`/`then`)
//! 5. collection shape (`policyDefinitions` array of references)
//! 6. resource `type` string

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::fields;

pub const DEFINITION_RESOURCE_TYPE: &str = "Microsoft.Authorization/policyDefinitions";
pub const COLLECTION_RESOURCE_TYPE: &str = "Microsoft.Authorization/policySetDefinitions";
pub const ASSIGNMENT_RESOURCE_TYPE: &str = "Microsoft.Authorization/policyAssignments";

static COLLECTION_SCHEMA: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)policy-?set-?definition(?:-schema)?\.json").expect("valid regex")
});
static DEFINITION_SCHEMA: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)policy-?definition(?:-schema)?\.json").expect("valid regex")
});
static ASSIGNMENT_SCHEMA: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)policy-?assignment(?:-schema)?\.json").expect("valid regex")
});

/// What kind of policy document a text holds.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentType {
    #[default]
    None,
    Definition,
    Collection,
    Assignment,
}

impl DocumentType {
    /// Local schema id for this type.
    #[must_use]
    pub const fn schema_id(self) -> Option<&'static str> {
        match self {
            Self::None => None,
            Self::Definition => Some("policy-definition"),
            Self::Collection => Some("policy-set-definition"),
            Self::Assignment => Some("policy-assignment"),
        }
    }

    /// Reverse of [`DocumentType::schema_id`].
    #[must_use]
    pub fn from_schema_id(id: &str) -> Self {
        match id {
            "policy-definition" => Self::Definition,
            "policy-set-definition" => Self::Collection,
            "policy-assignment" => Self::Assignment,
            _ => Self::None,
        }
    }

    #[must_use]
    pub const fn is_none(self) -> bool {
        matches!(self, Self::None)
    }
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::Definition => write!(f, "definition"),
            Self::Collection => write!(f, "collection"),
            Self::Assignment => write!(f, "assignment"),
        }
    }
}

/// Classify a parsed document.
#[must_use]
pub fn classify(value: &Value) -> DocumentType {
    if !value.is_object() {
        return DocumentType::None;
    }
    from_declared_schema(value)
        .or_else(|| from_provenance(value))
        .or_else(|| from_assignment_marker(value))
        .or_else(|| from_definition_shape(value))
        .or_else(|| from_collection_shape(value))
        .or_else(|| from_resource_type(value))
        .unwrap_or_default()
}

/// Match a schema URL or file name against the known canonical patterns.
#[must_use]
pub fn type_for_schema_url(url: &str) -> Option<DocumentType> {
    if COLLECTION_SCHEMA.is_match(url) {
        Some(DocumentType::Collection)
    } else if DEFINITION_SCHEMA.is_match(url) {
        Some(DocumentType::Definition)
    } else if ASSIGNMENT_SCHEMA.is_match(url) {
        Some(DocumentType::Assignment)
    } else {
        None
    }
}

fn from_declared_schema(value: &Value) -> Option<DocumentType> {
    type_for_schema_url(fields::string(value, fields::SCHEMA)?)
}

fn from_provenance(value: &Value) -> Option<DocumentType> {
    let source = fields::string(fields::metadata(value)?, fields::PROVENANCE)?.to_ascii_lowercase();
    if source.contains("policysetdefinitions") {
        Some(DocumentType::Collection)
    } else if source.contains("policydefinitions") {
        Some(DocumentType::Definition)
    } else if source.contains("policyassignments") {
        Some(DocumentType::Assignment)
    } else {
        None
    }
}

fn from_assignment_marker(value: &Value) -> Option<DocumentType> {
    fields::get(value, fields::NODE_NAME).map(|_| DocumentType::Assignment)
}

fn from_definition_shape(value: &Value) -> Option<DocumentType> {
    let (_, props) = fields::properties(value);
    fields::value(props, fields::MODE)?;
    has_rule_condition(props).then_some(DocumentType::Definition)
}

fn from_collection_shape(value: &Value) -> Option<DocumentType> {
    let (_, props) = fields::properties(value);
    let entries = fields::value(props, fields::POLICY_DEFINITIONS)?.as_array()?;
    entries
        .iter()
        .all(Value::is_object)
        .then_some(DocumentType::Collection)
}

fn from_resource_type(value: &Value) -> Option<DocumentType> {
    match fields::string(value, fields::TYPE)? {
        DEFINITION_RESOURCE_TYPE => Some(DocumentType::Definition),
        COLLECTION_RESOURCE_TYPE => Some(DocumentType::Collection),
        ASSIGNMENT_RESOURCE_TYPE => Some(DocumentType::Assignment),
        _ => None,
    }
}

/// Whether `props` holds a `policyRule` with both `if` and `then`.
#[must_use]
pub fn has_rule_condition(props: &Value) -> bool {
    fields::value(props, fields::POLICY_RULE).is_some_and(|rule| {
        fields::value(rule, fields::IF).is_some_and(Value::is_object)
            && fields::value(rule, fields::THEN).is_some_and(Value::is_object)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn definition_body() -> Value {
        json!({
            "name": "deny-public-ip",
            "properties": {
                "mode": "All",
                "policyRule": {"if": {"field": "type", "equals": "x"}, "then": {"effect": "deny"}}
            }
        })
    }

    #[test]
    fn test_declared_schema_wins_over_structure() {
        let mut doc = definition_body();
        doc["$schema"] = json!(
            "https://raw.githubusercontent.com/Azure/enterprise-azure-policy-as-code/main/Schemas/policy-assignment-schema.json"
        );
        assert_eq!(classify(&doc), DocumentType::Assignment);

        doc["$schema"] = json!("https://example.com/schemas/policy-set-definition-schema.json");
        assert_eq!(classify(&doc), DocumentType::Collection);
    }

    #[test]
    fn test_schema_patterns() {
        assert_eq!(
            type_for_schema_url("https://schema.management.azure.com/schemas/2019-09-01/policyDefinition.json"),
            Some(DocumentType::Definition)
        );
        assert_eq!(
            type_for_schema_url("https://schema.management.azure.com/schemas/2019-09-01/policySetDefinition.json"),
            Some(DocumentType::Collection)
        );
        assert_eq!(type_for_schema_url("https://example.com/other.json"), None);
    }

    #[test]
    fn test_provenance_marker() {
        let doc = json!({
            "properties": {
                "metadata": {"source": "https://github.com/Azure/azure-policy/tree/master/built-in-policies/policySetDefinitions/Network"},
                "mode": "All",
                "policyRule": {"if": {}, "then": {}}
            }
        });
        // provenance outranks the definition shape
        assert_eq!(classify(&doc), DocumentType::Collection);
    }

    #[test]
    fn test_node_name_marks_assignment() {
        let mut doc = definition_body();
        doc["nodeName"] = json!("/root");
        assert_eq!(classify(&doc), DocumentType::Assignment);
    }

    #[test]
    fn test_definition_shape() {
        assert_eq!(classify(&definition_body()), DocumentType::Definition);

        let mut no_mode = definition_body();
        no_mode["properties"].as_object_mut().unwrap().remove("mode");
        assert_eq!(classify(&no_mode), DocumentType::None);
    }

    #[test]
    fn test_collection_shape() {
        let doc = json!({"properties": {"policyDefinitions": []}});
        assert_eq!(classify(&doc), DocumentType::Collection);
        let doc = json!({"properties": {"policyDefinitions": ["not-an-object"]}});
        assert_eq!(classify(&doc), DocumentType::None);
    }

    #[test]
    fn test_resource_type_is_last_resort() {
        let doc = json!({"type": ASSIGNMENT_RESOURCE_TYPE, "properties": {}});
        assert_eq!(classify(&doc), DocumentType::Assignment);

        let doc = json!({"type": ASSIGNMENT_RESOURCE_TYPE, "properties": {"policyDefinitions": []}});
        assert_eq!(classify(&doc), DocumentType::Collection);
    }

    #[test]
    fn test_unrecognized_documents() {
        assert_eq!(classify(&json!({"hello": "world"})), DocumentType::None);
        assert_eq!(classify(&json!([1, 2])), DocumentType::None);
        assert_eq!(classify(&json!("text")), DocumentType::None);
    }

    #[test]
    fn test_schema_id_round_trip() {
        for doc_type in [
            DocumentType::Definition,
            DocumentType::Collection,
            DocumentType::Assignment,
        ] {
            assert_eq!(DocumentType::from_schema_id(doc_type.schema_id().unwrap()), doc_type);
        }
        assert_eq!(DocumentType::None.schema_id(), None);
    }
}
