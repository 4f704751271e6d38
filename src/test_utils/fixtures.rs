use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;

use crate::diagnostics::{DiagnosticSink, MemorySink};
use crate::lint::ValidationConfig;
use crate::orchestrator::{DEFAULT_CACHE_CAPACITY, ValidationService};
use crate::schema::{SchemaRegistry, schema_file_name};

/// A definition with no issues.
pub const DEFINITION: &str = r#"{
  "$schema": "https://raw.githubusercontent.com/Azure/enterprise-azure-policy-as-code/main/Schemas/policy-definition-schema.json",
  "name": "deny-public-ip",
  "properties": {
    "displayName": "Deny public IP addresses",
    "mode": "All",
    "parameters": {
      "effect": {
        "type": "String",
        "allowedValues": ["Audit", "Deny", "Disabled"],
        "defaultValue": "Deny"
      }
    },
    "policyRule": {
      "if": {"field": "type", "equals": "Microsoft.Network/publicIPAddresses"},
      "then": {"effect": "[parameters('effect')]"}
    }
  }
}"#;

/// A definition whose effect refers to an undeclared parameter.
pub const DEFINITION_MISSING_EFFECT: &str = r#"{
  "name": "deny-public-ip",
  "properties": {
    "displayName": "Deny public IP addresses",
    "mode": "All",
    "policyRule": {
      "if": {"field": "type", "equals": "Microsoft.Network/publicIPAddresses"},
      "then": {"effect": "[parameters('effect')]"}
    }
  }
}"#;

/// A policy set with two valid references.
pub const COLLECTION: &str = r#"{
  "name": "network-baseline",
  "properties": {
    "displayName": "Network baseline",
    "policyDefinitions": [
      {
        "policyDefinitionReferenceId": "deny-public-ip",
        "policyDefinitionName": "deny-public-ip"
      },
      {
        "policyDefinitionReferenceId": "audit-nsg",
        "policyDefinitionId": "/providers/Microsoft.Authorization/policyDefinitions/audit-nsg"
      }
    ]
  }
}"#;

/// An assignment tree with no issues.
pub const ASSIGNMENT: &str = r#"{
  "$schema": "https://raw.githubusercontent.com/Azure/enterprise-azure-policy-as-code/main/Schemas/policy-assignment-schema.json",
  "nodeName": "/root",
  "definitionEntry": {"policySetName": "network-baseline"},
  "children": [
    {
      "nodeName": "prod",
      "assignment": {"name": "net-baseline-prod", "displayName": "Network baseline"},
      "scope": {"prod": ["/providers/Microsoft.Management/managementGroups/prod"]}
    },
    {
      "nodeName": "dev",
      "assignment": {"name": "net-baseline-dev", "displayName": "Network baseline"},
      "scope": {"dev": "/subscriptions/00000000-0000-0000-0000-000000000000"}
    }
  ]
}"#;

/// The schema files shipped with the crate.
#[must_use]
pub fn shipped_schemas_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("schemas")
}

/// Isolated directory for policy files and, optionally, a private copy of
/// the schemas.
pub struct PolicyFixture {
    pub temp_dir: TempDir,
    pub root: PathBuf,
}

impl Default for PolicyFixture {
    fn default() -> Self {
        Self::new()
    }
}

impl PolicyFixture {
    #[must_use]
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let root = temp_dir.path().to_path_buf();
        Self { temp_dir, root }
    }

    /// Create a file relative to the fixture root.
    #[must_use]
    pub fn create_file(&self, relative_path: &str, content: &str) -> PathBuf {
        let full_path = self.root.join(relative_path);
        if let Some(parent) = full_path.parent() {
            std::fs::create_dir_all(parent).expect("Failed to create parent dirs");
        }
        std::fs::write(&full_path, content).expect("Failed to write file");
        full_path
    }

    /// Copy the shipped schemas into `<root>/schemas`, skipping `omit`.
    #[must_use]
    pub fn copy_schemas(&self, omit: &[&str]) -> PathBuf {
        let dir = self.root.join("schemas");
        std::fs::create_dir_all(&dir).expect("Failed to create schemas dir");
        for id in crate::schema::LOCAL_SCHEMA_IDS {
            if omit.contains(&id) {
                continue;
            }
            let name = schema_file_name(id);
            std::fs::copy(shipped_schemas_dir().join(&name), dir.join(&name))
                .expect("Failed to copy schema");
        }
        dir
    }

    /// Service over the shipped schemas with default settings.
    #[must_use]
    pub fn service(&self) -> ValidationService {
        self.service_with(ValidationConfig::default(), Arc::new(MemorySink::new()))
    }

    #[must_use]
    pub fn service_with(&self, config: ValidationConfig, sink: Arc<dyn DiagnosticSink>) -> ValidationService {
        ValidationService::new(
            Arc::new(SchemaRegistry::new(Some(shipped_schemas_dir()))),
            config,
            sink,
            Duration::from_millis(500),
            DEFAULT_CACHE_CAPACITY,
        )
    }
}
