//! Schema inference for documents that declare no `$schema`.

use serde_json::Value;

use crate::classify::{DocumentType, has_rule_condition};
use crate::fields;

/// Guess the document type from its shape.
///
/// Checked in order: a rule condition block means a definition, an array
/// of references means a collection, a reference to a definition id means
/// an assignment.
#[must_use]
pub fn infer_type(value: &Value) -> Option<DocumentType> {
    if !value.is_object() {
        return None;
    }
    let (_, props) = fields::properties(value);

    if has_rule_condition(props) {
        return Some(DocumentType::Definition);
    }
    if fields::value(props, fields::POLICY_DEFINITIONS).is_some_and(Value::is_array) {
        return Some(DocumentType::Collection);
    }
    if references_definition(value) || references_definition(props) {
        return Some(DocumentType::Assignment);
    }
    None
}

fn references_definition(value: &Value) -> bool {
    if fields::non_empty_str(value, fields::DEFINITION_ID).is_some() {
        return true;
    }
    if fields::value(value, fields::DEFINITION_ENTRY).is_some_and(is_definition_reference) {
        return true;
    }
    fields::value(value, fields::DEFINITION_ENTRY_LIST)
        .and_then(Value::as_array)
        .is_some_and(|entries| entries.iter().any(is_definition_reference))
}

fn is_definition_reference(entry: &Value) -> bool {
    [
        fields::POLICY_ID,
        fields::POLICY_NAME,
        fields::POLICY_SET_ID,
        fields::POLICY_SET_NAME,
    ]
    .iter()
    .any(|aliases| fields::non_empty_str(entry, aliases).is_some())
}
