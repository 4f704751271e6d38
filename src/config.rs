use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::classify::DocumentType;
use crate::error::{LintError, Result};
use crate::lint::{Severity, ValidationConfig};
use crate::schema::{LOCAL_SCHEMA_IDS, SchemaRegistry};

/// Project-level config file name.
pub const PROJECT_CONFIG_FILE: &str = "policy-lint.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub schemas: SchemasConfig,
    #[serde(default)]
    pub rules: RulesConfig,
    #[serde(default)]
    pub service: ServiceConfig,
}

impl Config {
    /// Defaults, then the global file, the project file, an explicit file
    /// (`--config` or `POLICY_LINT_CONFIG`), then environment overrides.
    pub fn load(explicit_path: Option<&Path>, project_root: &Path) -> Result<Self> {
        let mut config = Self::default();

        if let Some(global) = Self::load_global()? {
            config.merge_patch(global);
        }
        if let Some(project) = Self::load_patch(&project_root.join(PROJECT_CONFIG_FILE))? {
            config.merge_patch(project);
        }

        let explicit = explicit_path
            .map(PathBuf::from)
            .or_else(|| env_string("POLICY_LINT_CONFIG").map(PathBuf::from));
        if let Some(path) = explicit {
            let patch = Self::load_patch(&path)?.ok_or_else(|| {
                LintError::Config(format!("config file {} not found", path.display()))
            })?;
            config.merge_patch(patch);
        }

        config.apply_env_overrides()?;
        config.schemas.resolve_dir(project_root);

        Ok(config)
    }

    fn load_global() -> Result<Option<ConfigPatch>> {
        let Some(dir) = dirs::config_dir() else {
            return Ok(None);
        };
        Self::load_patch(&dir.join("policy-lint/config.toml"))
    }

    fn load_patch(path: &Path) -> Result<Option<ConfigPatch>> {
        if !path.exists() {
            return Ok(None);
        }

        let raw = std::fs::read_to_string(path)
            .map_err(|err| LintError::Config(format!("read config {}: {err}", path.display())))?;
        let patch = toml::from_str(&raw)
            .map_err(|err| LintError::Config(format!("parse config {}: {err}", path.display())))?;
        Ok(Some(patch))
    }

    fn merge_patch(&mut self, patch: ConfigPatch) {
        if let Some(patch) = patch.schemas {
            self.schemas.merge(patch);
        }
        if let Some(patch) = patch.rules {
            self.rules.merge(patch);
        }
        if let Some(patch) = patch.service {
            self.service.merge(patch);
        }
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Some(value) = env_string("POLICY_LINT_SCHEMAS_DIR") {
            self.schemas.dir = Some(PathBuf::from(value));
        }
        if let Some(value) = env_u64("POLICY_LINT_DEBOUNCE_MS")? {
            self.service.debounce_ms = value;
        }
        if let Some(value) = env_bool("POLICY_LINT_STRICT") {
            self.rules.strict = value;
        }
        if let Some(values) = env_list("POLICY_LINT_DISABLED_RULES") {
            self.rules.disabled = merge_unique(values, &self.rules.disabled);
        }
        Ok(())
    }

    /// Rule engine settings.
    #[must_use]
    pub fn validation_config(&self) -> ValidationConfig {
        let mut config = ValidationConfig::new();
        config.disabled_rules = self.rules.disabled.iter().cloned().collect();
        config.severity_overrides = self
            .rules
            .severity_overrides
            .iter()
            .map(|(id, severity)| (id.clone(), *severity))
            .collect();
        config.strict = self.rules.strict;
        config.max_errors = self.rules.max_errors;
        config
    }

    /// Build a schema registry with the configured directory and aliases.
    pub fn schema_registry(&self) -> Result<SchemaRegistry> {
        let registry = SchemaRegistry::new(self.schemas.dir.clone());
        for (url, target) in &self.schemas.aliases {
            registry.register_alias(url, alias_target(target)?);
        }
        Ok(registry)
    }

    #[must_use]
    pub const fn debounce(&self) -> Duration {
        Duration::from_millis(self.service.debounce_ms)
    }
}

/// Accept either a local schema id or a document type name.
fn alias_target(target: &str) -> Result<&'static str> {
    if let Some(id) = LOCAL_SCHEMA_IDS.iter().find(|id| **id == target) {
        return Ok(*id);
    }
    let doc_type = match target.to_ascii_lowercase().as_str() {
        "definition" => DocumentType::Definition,
        "collection" | "set" => DocumentType::Collection,
        "assignment" => DocumentType::Assignment,
        _ => DocumentType::None,
    };
    doc_type.schema_id().ok_or_else(|| {
        LintError::Config(format!(
            "unknown schema alias target {target} (expected {} or definition|collection|assignment)",
            LOCAL_SCHEMA_IDS.join("|")
        ))
    })
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchemasConfig {
    /// Directory holding `<id>-schema.json` files
    pub dir: Option<PathBuf>,
    /// Extra schema URL to local schema id (or document type) mappings
    #[serde(default)]
    pub aliases: BTreeMap<String, String>,
}

impl SchemasConfig {
    fn merge(&mut self, patch: SchemasPatch) {
        if let Some(value) = patch.dir {
            self.dir = Some(value);
        }
        if let Some(aliases) = patch.aliases {
            self.aliases.extend(aliases);
        }
    }

    /// Make a relative directory absolute, or pick up `<root>/schemas`.
    fn resolve_dir(&mut self, project_root: &Path) {
        self.dir = match self.dir.take() {
            Some(dir) if dir.is_relative() => Some(project_root.join(dir)),
            Some(dir) => Some(dir),
            None => {
                let candidate = project_root.join("schemas");
                candidate.is_dir().then_some(candidate)
            }
        };
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RulesConfig {
    #[serde(default)]
    pub disabled: Vec<String>,
    #[serde(default)]
    pub severity_overrides: BTreeMap<String, Severity>,
    #[serde(default)]
    pub strict: bool,
    pub max_errors: Option<usize>,
}

impl RulesConfig {
    fn merge(&mut self, patch: RulesPatch) {
        if let Some(values) = patch.disabled {
            self.disabled = merge_unique(values, &self.disabled);
        }
        if let Some(overrides) = patch.severity_overrides {
            self.severity_overrides.extend(overrides);
        }
        if let Some(value) = patch.strict {
            self.strict = value;
        }
        if let Some(value) = patch.max_errors {
            self.max_errors = Some(value);
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub debounce_ms: u64,
    /// Documents kept in the result cache
    pub cache_capacity: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 500,
            cache_capacity: 256,
        }
    }
}

impl ServiceConfig {
    fn merge(&mut self, patch: ServicePatch) {
        if let Some(value) = patch.debounce_ms {
            self.debounce_ms = value;
        }
        if let Some(value) = patch.cache_capacity {
            self.cache_capacity = value;
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
struct ConfigPatch {
    pub schemas: Option<SchemasPatch>,
    pub rules: Option<RulesPatch>,
    pub service: Option<ServicePatch>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct SchemasPatch {
    pub dir: Option<PathBuf>,
    pub aliases: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct RulesPatch {
    pub disabled: Option<Vec<String>>,
    pub severity_overrides: Option<BTreeMap<String, Severity>>,
    pub strict: Option<bool>,
    pub max_errors: Option<usize>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct ServicePatch {
    pub debounce_ms: Option<u64>,
    pub cache_capacity: Option<usize>,
}

fn merge_unique(values: Vec<String>, existing: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for value in values.into_iter().chain(existing.iter().cloned()) {
        if seen.insert(value.clone()) {
            out.push(value);
        }
    }
    out
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

fn env_bool(key: &str) -> Option<bool> {
    std::env::var(key).ok().map(|value| {
        matches!(
            value.to_lowercase().as_str(),
            "1" | "true" | "yes" | "on"
        )
    })
}

fn env_u64(key: &str) -> Result<Option<u64>> {
    match std::env::var(key) {
        Ok(value) => value.parse::<u64>().map(Some).map_err(|err| {
            LintError::Config(format!("invalid {key} value {value}: {err}"))
        }),
        Err(_) => Ok(None),
    }
}

fn env_list(key: &str) -> Option<Vec<String>> {
    std::env::var(key).ok().map(|value| {
        value
            .split(',')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .map(str::to_string)
            .collect()
    })
}
