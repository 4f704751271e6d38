//! Built-in validation rules, grouped by the document type they check.
//!
//! - **Schema** (`schema`): structural validation, shared by every type
//! - **Definition** (`definition`): effect parameterization
//! - **Collection** (`collection`): reference integrity, non-empty list
//! - **Assignment** (`assignment`): names, scopes, definition references

pub mod assignment;
pub mod collection;
pub mod definition;
pub mod schema;

use crate::classify::DocumentType;
use crate::lint::rule::Rule;

pub use assignment::{EXCLUSIVE_REFERENCE_RULE, NAME_LENGTH_RULE, SCOPE_RULE, assignment_rules};
pub use collection::{NON_EMPTY_COLLECTION, REFERENCE_INTEGRITY, collection_rules};
pub use definition::{EFFECT_PARAMETER_RULE, definition_rules};
pub use schema::SCHEMA_VALIDATION;

/// The ordered rule table for a document type, schema rule first.
#[must_use]
pub fn rules_for(doc_type: DocumentType) -> Vec<Rule> {
    let specific = match doc_type {
        DocumentType::None => return Vec::new(),
        DocumentType::Definition => definition_rules(),
        DocumentType::Collection => collection_rules(),
        DocumentType::Assignment => assignment_rules(),
    };
    let mut rules = vec![SCHEMA_VALIDATION];
    rules.extend(specific);
    rules
}
