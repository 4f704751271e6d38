//! Field accessors for loosely-shaped policy documents.
//!
//! Policy files in the wild mix casings (`policyRule`, `PolicyRule`) and
//! sometimes drop the `properties` wrapper. Every lookup goes through an
//! ordered alias list; the first key present wins and is returned so that
//! callers can build exact value paths into the syntax tree.

use serde_json::Value;

use crate::parser::PathSegment;

pub const SCHEMA: &[&str] = &["$schema"];
pub const NAME: &[&str] = &["name", "Name"];
pub const TYPE: &[&str] = &["type", "Type"];
pub const PROPERTIES: &[&str] = &["properties", "Properties"];
pub const METADATA: &[&str] = &["metadata", "Metadata"];
pub const MODE: &[&str] = &["mode", "Mode"];
pub const PARAMETERS: &[&str] = &["parameters", "Parameters"];
pub const POLICY_RULE: &[&str] = &["policyRule", "PolicyRule", "policyrule"];
pub const IF: &[&str] = &["if", "If"];
pub const THEN: &[&str] = &["then", "Then"];
pub const EFFECT: &[&str] = &["effect", "Effect"];
pub const ALLOWED_VALUES: &[&str] = &["allowedValues", "AllowedValues"];

pub const POLICY_DEFINITIONS: &[&str] = &["policyDefinitions", "PolicyDefinitions"];
pub const DEFINITION_ID: &[&str] = &["policyDefinitionId", "PolicyDefinitionId", "policyDefinitionID"];
pub const DEFINITION_NAME: &[&str] = &["policyDefinitionName", "PolicyDefinitionName"];
pub const REFERENCE_ID: &[&str] = &[
    "policyDefinitionReferenceId",
    "PolicyDefinitionReferenceId",
    "policyDefinitionReferenceID",
];

pub const NODE_NAME: &[&str] = &["nodeName", "NodeName"];
pub const ASSIGNMENT: &[&str] = &["assignment", "Assignment"];
pub const CHILDREN: &[&str] = &["children", "Children"];
pub const SCOPE: &[&str] = &["scope", "Scope"];
pub const DEFINITION_ENTRY: &[&str] = &["definitionEntry", "DefinitionEntry"];
pub const DEFINITION_ENTRY_LIST: &[&str] = &["definitionEntryList", "DefinitionEntryList"];
pub const POLICY_ID: &[&str] = &["policyId", "PolicyId"];
pub const POLICY_NAME: &[&str] = &["policyName", "PolicyName"];
pub const POLICY_SET_ID: &[&str] = &["policySetId", "PolicySetId"];
pub const POLICY_SET_NAME: &[&str] = &["policySetName", "PolicySetName"];

/// Keys in `metadata` that can carry a provenance marker.
pub const PROVENANCE: &[&str] = &["source", "Source", "epacSource", "epacCloneSource"];

/// Look up the first alias present on an object.
#[must_use]
pub fn get<'a>(value: &'a Value, aliases: &[&str]) -> Option<(&'a str, &'a Value)> {
    let map = value.as_object()?;
    aliases
        .iter()
        .find_map(|alias| map.get_key_value(*alias))
        .map(|(key, value)| (key.as_str(), value))
}

/// Look up a field and return only its value.
#[must_use]
pub fn value<'a>(value: &'a Value, aliases: &[&str]) -> Option<&'a Value> {
    get(value, aliases).map(|(_, v)| v)
}

/// Look up a string field.
#[must_use]
pub fn string<'a>(value: &'a Value, aliases: &[&str]) -> Option<&'a str> {
    self::value(value, aliases)?.as_str()
}

/// Look up a string field that is present and not blank.
#[must_use]
pub fn non_empty_str<'a>(value: &'a Value, aliases: &[&str]) -> Option<&'a str> {
    string(value, aliases).filter(|s| !s.trim().is_empty())
}

/// Look up a field, extending `path` with the key actually used.
#[must_use]
pub fn get_with_path<'a>(
    value: &'a Value,
    path: &[PathSegment],
    aliases: &[&str],
) -> Option<(Vec<PathSegment>, &'a Value)> {
    let (key, found) = get(value, aliases)?;
    let mut path = path.to_vec();
    path.push(PathSegment::key(key));
    Some((path, found))
}

/// The object holding a resource's properties, with its path.
///
/// Falls back to the root when the `properties` wrapper is absent.
#[must_use]
pub fn properties(value: &Value) -> (Vec<PathSegment>, &Value) {
    match get_with_path(value, &[], PROPERTIES) {
        Some((path, props)) if props.is_object() => (path, props),
        _ => (Vec::new(), value),
    }
}

/// `metadata` from either the properties object or the root.
#[must_use]
pub fn metadata(value: &Value) -> Option<&Value> {
    let (_, props) = properties(value);
    self::value(props, METADATA).or_else(|| self::value(value, METADATA))
}
