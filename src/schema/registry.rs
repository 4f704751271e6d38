//! Schema loading, alias resolution and compiled validator cache.
//!
//! Schemas are read from disk once and kept for the life of the registry.
//! A missing or corrupt schema file is replaced by a generated fallback
//! that only requires the generic top-level fields, so validation of that
//! document type degrades instead of stopping.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};

use jsonschema::{Draft, Retrieve, Uri, Validator};
use parking_lot::RwLock;
use regex::Regex;
use serde_json::{Value, json};
use tracing::{debug, trace, warn};

use crate::classify::{DocumentType, type_for_schema_url};
use crate::error::{LintError, Result};

/// Local ids of the three well-known schemas.
pub const LOCAL_SCHEMA_IDS: [&str; 3] = [
    "policy-definition",
    "policy-set-definition",
    "policy-assignment",
];

const EPAC_SCHEMA_BASE: &str =
    "https://raw.githubusercontent.com/Azure/enterprise-azure-policy-as-code/main/Schemas/";
const ARM_SCHEMA_BASE: &str = "https://schema.management.azure.com/schemas/2019-09-01/";

static UNKNOWN_META_SCHEMA: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(unknown|unresolvable|unrecognized|failed to resolve)\b.*(meta-?schema|specification|\$schema)",
    )
    .expect("valid regex")
});

/// File name of a local schema inside the schemas directory.
#[must_use]
pub fn schema_file_name(local_id: &str) -> String {
    format!("{local_id}-schema.json")
}

/// Minimal schema used when a schema file cannot be loaded.
#[must_use]
pub fn fallback_schema() -> Value {
    json!({
        "$schema": "http://json-schema.org/draft-07/schema#",
        "type": "object",
        "required": ["name", "properties"]
    })
}

/// A loaded schema document.
#[derive(Debug, Clone)]
pub struct Schema {
    pub id: String,
    pub document: Value,
    /// True when this is the generated fallback
    pub fallback: bool,
}

/// One violation as reported by the underlying validator.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct RawSchemaError {
    /// JSON pointer into the validated document
    pub instance_path: String,
    /// JSON pointer into the schema
    pub schema_path: String,
    pub message: String,
}

impl RawSchemaError {
    /// The schema keyword that failed (`required`, `enum`, ...).
    #[must_use]
    pub fn keyword(&self) -> Option<&str> {
        self.schema_path.rsplit('/').find(|s| !s.is_empty() && s.parse::<usize>().is_err())
    }

    /// Whether this error only reports an unresolved meta-schema reference.
    #[must_use]
    pub fn is_unknown_meta_schema(&self) -> bool {
        UNKNOWN_META_SCHEMA.is_match(&self.message)
    }
}

/// Outcome of validating a value against one schema.
#[derive(Debug, Clone)]
pub struct StructuralReport {
    pub schema_id: String,
    pub valid: bool,
    pub errors: Vec<RawSchemaError>,
    pub fallback: bool,
}

/// Resolves `$ref` URIs from the loaded schemas only; never touches the network.
struct LocalRetriever {
    schemas_by_uri: HashMap<String, Value>,
}

impl Retrieve for LocalRetriever {
    fn retrieve(
        &self,
        uri: &Uri<&str>,
    ) -> std::result::Result<Value, Box<dyn std::error::Error + Send + Sync>> {
        let uri = uri.as_str();
        if let Some(value) = self.schemas_by_uri.get(uri) {
            return Ok(value.clone());
        }
        trace!(uri, "unresolved schema reference, using permissive schema");
        Ok(json!({}))
    }
}

/// Registry of policy schemas.
pub struct SchemaRegistry {
    schemas_dir: Option<PathBuf>,
    aliases: RwLock<HashMap<String, String>>,
    loaded: RwLock<HashMap<String, Arc<Schema>>>,
    compiled: RwLock<HashMap<String, Arc<Validator>>>,
}

impl SchemaRegistry {
    /// Create a registry reading from `schemas_dir`, with the canonical
    /// aliases pre-registered.
    #[must_use]
    pub fn new(schemas_dir: Option<PathBuf>) -> Self {
        let registry = Self {
            schemas_dir,
            aliases: RwLock::new(HashMap::new()),
            loaded: RwLock::new(HashMap::new()),
            compiled: RwLock::new(HashMap::new()),
        };
        for id in LOCAL_SCHEMA_IDS {
            registry.register_alias(&format!("{EPAC_SCHEMA_BASE}{}", schema_file_name(id)), id);
        }
        registry.register_alias(&format!("{ARM_SCHEMA_BASE}policyDefinition.json"), "policy-definition");
        registry.register_alias(
            &format!("{ARM_SCHEMA_BASE}policySetDefinition.json"),
            "policy-set-definition",
        );
        registry.register_alias(&format!("{ARM_SCHEMA_BASE}policyAssignment.json"), "policy-assignment");
        registry
    }

    #[must_use]
    pub fn schemas_dir(&self) -> Option<&Path> {
        self.schemas_dir.as_deref()
    }

    /// Map an external schema URL onto a local schema id.
    pub fn register_alias(&self, external_url: &str, local_id: &str) {
        self.aliases
            .write()
            .insert(normalize_url(external_url), local_id.to_string());
    }

    /// Resolve a schema URL or local id to a local schema id.
    #[must_use]
    pub fn resolve(&self, id_or_url: &str) -> Option<String> {
        if let Some(id) = self.aliases.read().get(&normalize_url(id_or_url)) {
            return Some(id.clone());
        }
        if LOCAL_SCHEMA_IDS.contains(&id_or_url) {
            return Some(id_or_url.to_string());
        }
        type_for_schema_url(id_or_url)
            .and_then(DocumentType::schema_id)
            .map(str::to_string)
    }

    /// Load a schema by local id, falling back to the minimal schema.
    ///
    /// Idempotent: the first load is cached and returned afterwards.
    pub fn load(&self, local_id: &str) -> Arc<Schema> {
        if let Some(schema) = self.loaded.read().get(local_id) {
            return Arc::clone(schema);
        }

        let schema = match self.read_schema(local_id) {
            Ok(document) => {
                debug!(schema = local_id, "loaded schema");
                Schema {
                    id: local_id.to_string(),
                    document,
                    fallback: false,
                }
            }
            Err(err) => {
                warn!(schema = local_id, error = %err, "using fallback schema");
                Schema {
                    id: local_id.to_string(),
                    document: fallback_schema(),
                    fallback: true,
                }
            }
        };

        Arc::clone(
            self.loaded
                .write()
                .entry(local_id.to_string())
                .or_insert_with(|| Arc::new(schema)),
        )
    }

    /// Load every well-known schema up front.
    pub fn warm_up(&self) {
        for id in LOCAL_SCHEMA_IDS {
            let _ = self.load(id);
        }
    }

    fn read_schema(&self, local_id: &str) -> Result<Value> {
        let dir = self.schemas_dir.as_ref().ok_or_else(|| LintError::SchemaLoad {
            schema: local_id.to_string(),
            reason: "no schemas directory configured".to_string(),
        })?;
        let path = dir.join(schema_file_name(local_id));
        let raw = std::fs::read_to_string(&path).map_err(|e| LintError::SchemaLoad {
            schema: local_id.to_string(),
            reason: format!("read {}: {e}", path.display()),
        })?;
        let document: Value = serde_json::from_str(&raw).map_err(|e| LintError::SchemaLoad {
            schema: local_id.to_string(),
            reason: format!("invalid JSON in {}: {e}", path.display()),
        })?;
        if !document.is_object() {
            return Err(LintError::SchemaLoad {
                schema: local_id.to_string(),
                reason: "schema root is not an object".to_string(),
            });
        }
        Ok(document)
    }

    /// Validate `value` against the schema named by `id_or_url`.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` when `id_or_url` resolves to no known schema.
    pub fn validate(&self, id_or_url: &str, value: &Value) -> Result<StructuralReport> {
        let local_id = self
            .resolve(id_or_url)
            .ok_or_else(|| LintError::NotFound(format!("schema '{id_or_url}'")))?;
        let schema = self.load(&local_id);
        let validator = self.compiled(&schema);

        let errors: Vec<RawSchemaError> = validator
            .iter_errors(value)
            .map(|e| RawSchemaError {
                instance_path: e.instance_path.to_string(),
                schema_path: e.schema_path.to_string(),
                message: e.to_string(),
            })
            .filter(|e| {
                let meta = e.is_unknown_meta_schema();
                if meta {
                    debug!(schema = %local_id, message = %e.message, "ignoring meta-schema error");
                }
                !meta
            })
            .collect();

        Ok(StructuralReport {
            schema_id: local_id,
            valid: errors.is_empty(),
            errors,
            fallback: schema.fallback,
        })
    }

    fn compiled(&self, schema: &Schema) -> Arc<Validator> {
        if let Some(validator) = self.compiled.read().get(&schema.id) {
            return Arc::clone(validator);
        }

        let validator = match self.compile(&schema.document) {
            Ok(validator) => validator,
            Err(err) => {
                warn!(schema = %schema.id, error = %err, "schema does not compile, using fallback");
                self.compile(&fallback_schema())
                    .unwrap_or_else(|_| permissive_validator())
            }
        };

        Arc::clone(
            self.compiled
                .write()
                .entry(schema.id.clone())
                .or_insert_with(|| Arc::new(validator)),
        )
    }

    fn compile(&self, document: &Value) -> Result<Validator> {
        match self.build(document) {
            Ok(validator) => Ok(validator),
            Err(reason) if UNKNOWN_META_SCHEMA.is_match(&reason) => {
                debug!(reason = %reason, "unknown meta-schema, compiling without $schema");
                let mut stripped = document.clone();
                if let Some(map) = stripped.as_object_mut() {
                    map.remove("$schema");
                }
                self.build(&stripped).map_err(|reason| LintError::SchemaCompile {
                    schema: schema_label(document),
                    reason,
                })
            }
            Err(reason) => Err(LintError::SchemaCompile {
                schema: schema_label(document),
                reason,
            }),
        }
    }

    fn build(&self, document: &Value) -> std::result::Result<Validator, String> {
        let mut schemas_by_uri = HashMap::new();
        for schema in self.loaded.read().values() {
            if let Some(id) = schema.document.get("$id").and_then(Value::as_str) {
                schemas_by_uri.insert(id.to_string(), schema.document.clone());
            }
        }

        let mut opts = jsonschema::options();
        opts.with_draft(Draft::Draft7);
        opts.with_retriever(LocalRetriever { schemas_by_uri });
        opts.build(document).map_err(|e| e.to_string())
    }
}

impl std::fmt::Debug for SchemaRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaRegistry")
            .field("schemas_dir", &self.schemas_dir)
            .field("loaded", &self.loaded.read().keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

fn permissive_validator() -> Validator {
    jsonschema::validator_for(&json!({})).expect("empty schema always compiles")
}

fn schema_label(document: &Value) -> String {
    document
        .get("$id")
        .and_then(Value::as_str)
        .unwrap_or("<inline>")
        .to_string()
}

fn normalize_url(url: &str) -> String {
    url.trim().trim_end_matches('#').to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_schema(dir: &TempDir, id: &str, body: &str) {
        std::fs::write(dir.path().join(schema_file_name(id)), body).unwrap();
    }

    fn shipped() -> SchemaRegistry {
        SchemaRegistry::new(Some(
            PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("schemas"),
        ))
    }

    #[test]
    fn test_aliases_resolve_many_to_one() {
        let registry = SchemaRegistry::new(None);
        registry.register_alias("https://example.com/legacy/def.json", "policy-definition");

        assert_eq!(
            registry.resolve("https://example.com/legacy/def.json#").as_deref(),
            Some("policy-definition")
        );
        assert_eq!(
            registry
                .resolve(&format!("{EPAC_SCHEMA_BASE}policy-definition-schema.json"))
                .as_deref(),
            Some("policy-definition")
        );
        assert_eq!(registry.resolve("policy-assignment").as_deref(), Some("policy-assignment"));
        assert_eq!(registry.resolve("https://example.com/unrelated.json"), None);
    }

    #[test]
    fn test_missing_file_uses_fallback() {
        let dir = TempDir::new().unwrap();
        let registry = SchemaRegistry::new(Some(dir.path().to_path_buf()));
        let schema = registry.load("policy-definition");
        assert!(schema.fallback);
        assert_eq!(schema.document, fallback_schema());
    }

    #[test]
    fn test_corrupt_file_uses_fallback() {
        let dir = TempDir::new().unwrap();
        write_schema(&dir, "policy-definition", "{ not json");
        let registry = SchemaRegistry::new(Some(dir.path().to_path_buf()));
        assert!(registry.load("policy-definition").fallback);
    }

    #[test]
    fn test_load_is_cached() {
        let dir = TempDir::new().unwrap();
        write_schema(&dir, "policy-definition", r#"{"type": "object"}"#);
        let registry = SchemaRegistry::new(Some(dir.path().to_path_buf()));
        let first = registry.load("policy-definition");
        std::fs::remove_file(dir.path().join(schema_file_name("policy-definition"))).unwrap();
        let second = registry.load("policy-definition");
        assert!(Arc::ptr_eq(&first, &second));
        assert!(!second.fallback);
    }

    #[test]
    fn test_fallback_reports_generic_required_fields() {
        let registry = SchemaRegistry::new(None);
        let report = registry
            .validate("policy-assignment", &json!({"nodeName": "/root"}))
            .unwrap();
        assert!(report.fallback);
        assert!(!report.valid);
        assert_eq!(report.errors.len(), 2);
        assert!(report.errors.iter().all(|e| e.keyword() == Some("required")));
    }

    #[test]
    fn test_unknown_meta_schema_does_not_hide_violations() {
        let dir = TempDir::new().unwrap();
        write_schema(
            &dir,
            "policy-definition",
            r#"{
                "$schema": "https://example.com/no-such-meta-schema#",
                "type": "object",
                "required": ["name"]
            }"#,
        );
        let registry = SchemaRegistry::new(Some(dir.path().to_path_buf()));

        let report = registry.validate("policy-definition", &json!({})).unwrap();
        assert!(!report.valid);
        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].message.contains("name"));

        let report = registry.validate("policy-definition", &json!({"name": "x"})).unwrap();
        assert!(report.valid);
    }

    #[test]
    fn test_unresolved_schema_is_not_found() {
        let registry = SchemaRegistry::new(None);
        let err = registry
            .validate("https://example.com/unrelated.json", &json!({}))
            .unwrap_err();
        assert!(matches!(err, LintError::NotFound(_)));
    }

    #[test]
    fn test_shipped_schemas_load() {
        let registry = shipped();
        registry.warm_up();
        for id in LOCAL_SCHEMA_IDS {
            assert!(!registry.load(id).fallback, "{id} should load from disk");
        }
    }

    #[test]
    fn test_keyword_from_schema_path() {
        let err = RawSchemaError {
            instance_path: "/properties".to_string(),
            schema_path: "/properties/properties/required".to_string(),
            message: String::new(),
        };
        assert_eq!(err.keyword(), Some("required"));
        let err = RawSchemaError {
            instance_path: String::new(),
            schema_path: "/allOf/0".to_string(),
            message: String::new(),
        };
        assert_eq!(err.keyword(), Some("allOf"));
    }
}
