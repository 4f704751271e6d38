//! The validation service: document store, cache, debounce, fix dispatch.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use serde::Serialize;
use tracing::{debug, trace};

use super::cache::{CacheStats, ResultCache};
use super::debounce::Debouncer;
use crate::classify::DocumentType;
use crate::config::Config;
use crate::diagnostics::{DiagnosticSink, MemorySink, list_fixable_issues, to_diagnostics};
use crate::error::{LintError, Result};
use crate::lint::{
    Issue, RuleInfo, SourceSpan, TextEdit, ValidationConfig, ValidationContext, ValidationResult,
    Validator, select,
};
use crate::parser::parse;
use crate::schema::SchemaRegistry;

/// Upper bound on fix/re-validate rounds in [`ValidationService::fix_all`].
pub const MAX_FIX_PASSES: usize = 32;

/// Latest known text of an open document.
#[derive(Debug, Clone)]
struct DocumentState {
    text: String,
    version: u64,
}

/// Outcome of applying one fix.
#[derive(Debug, Clone, Serialize)]
pub struct AppliedFix {
    pub edit: TextEdit,
    pub text: String,
    pub version: u64,
    /// Re-validation of the edited text
    pub result: Option<ValidationResult>,
}

/// Outcome of [`ValidationService::fix_all`].
#[derive(Debug, Clone, Serialize)]
pub struct FixAllOutcome {
    /// Codes of the fixes applied, in order
    pub applied: Vec<String>,
    pub text: String,
    pub version: u64,
    pub result: Option<ValidationResult>,
}

pub struct ValidationService {
    schemas: Arc<SchemaRegistry>,
    validators: Vec<Validator>,
    config: ValidationConfig,
    cache: ResultCache,
    debouncer: Debouncer,
    documents: RwLock<HashMap<String, DocumentState>>,
    sink: Arc<dyn DiagnosticSink>,
}

impl ValidationService {
    #[must_use]
    pub fn new(
        schemas: Arc<SchemaRegistry>,
        config: ValidationConfig,
        sink: Arc<dyn DiagnosticSink>,
        debounce: Duration,
        cache_capacity: usize,
    ) -> Self {
        Self {
            schemas,
            validators: Validator::all(),
            config,
            cache: ResultCache::new(cache_capacity),
            debouncer: Debouncer::new(debounce),
            documents: RwLock::new(HashMap::new()),
            sink,
        }
    }

    /// Build a service from loaded configuration and warm up the schemas.
    pub fn from_config(config: &Config, sink: Arc<dyn DiagnosticSink>) -> Result<Self> {
        let schemas = Arc::new(config.schema_registry()?);
        schemas.warm_up();
        debug!(schemas_dir = ?schemas.schemas_dir(), "validation service ready");
        Ok(Self::new(
            schemas,
            config.validation_config(),
            sink,
            config.debounce(),
            config.service.cache_capacity,
        ))
    }

    /// Service with default settings and an in-memory sink.
    #[must_use]
    pub fn with_schemas(schemas: SchemaRegistry) -> Self {
        Self::new(
            Arc::new(schemas),
            ValidationConfig::default(),
            Arc::new(MemorySink::new()),
            Duration::from_millis(500),
            super::cache::DEFAULT_CACHE_CAPACITY,
        )
    }

    #[must_use]
    pub fn validators(&self) -> &[Validator] {
        &self.validators
    }

    #[must_use]
    pub fn validator_for(&self, doc_type: DocumentType) -> Option<&Validator> {
        self.validators.iter().find(|v| v.doc_type() == doc_type)
    }

    #[must_use]
    pub const fn config(&self) -> &ValidationConfig {
        &self.config
    }

    #[must_use]
    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Latest text and version stored for a document.
    #[must_use]
    pub fn document(&self, document_id: &str) -> Option<(String, u64)> {
        self.documents
            .read()
            .get(document_id)
            .map(|doc| (doc.text.clone(), doc.version))
    }

    /// Store text unless a newer version is already known.
    fn remember(&self, document_id: &str, text: &str, version: u64) -> bool {
        let mut documents = self.documents.write();
        match documents.get(document_id) {
            Some(existing) if existing.version > version => false,
            _ => {
                documents.insert(
                    document_id.to_string(),
                    DocumentState {
                        text: text.to_string(),
                        version,
                    },
                );
                true
            }
        }
    }

    /// Validate one version of a document.
    ///
    /// `None` when the document does not parse cleanly or no validator
    /// accepts it; previously published diagnostics are cleared then.
    pub fn validate_document(&self, document_id: &str, text: &str, version: u64) -> Option<ValidationResult> {
        if let Some(hit) = self.cache.get(document_id, version) {
            return Some(hit);
        }
        let current = self.remember(document_id, text, version);

        let parsed = parse(text);
        if !parsed.is_clean() {
            debug!(
                document = document_id,
                version,
                errors = parsed.syntax_errors.len(),
                "syntax errors, not validating"
            );
            self.forget_result(document_id, current);
            return None;
        }

        let Some(validator) = select(&self.validators, text, &parsed) else {
            debug!(document = document_id, version, "no validator accepts document");
            self.forget_result(document_id, current);
            return None;
        };

        let ctx = ValidationContext::new(&parsed, &self.schemas, &self.config)?;
        let outcome = validator.run(&ctx);
        let result = ValidationResult::new(
            document_id,
            version,
            validator.doc_type(),
            outcome.issues,
            outcome.truncated,
        );
        debug!(
            document = document_id,
            version,
            doc_type = %result.doc_type,
            issues = result.issues.len(),
            valid = result.valid,
            "validated"
        );

        if current && self.cache.insert(result.clone()) {
            self.sink.publish(document_id, to_diagnostics(&result));
        } else {
            trace!(document = document_id, version, "superseded result not published");
        }
        Some(result)
    }

    fn forget_result(&self, document_id: &str, current: bool) {
        if current {
            self.cache.evict(document_id);
            self.sink.clear(document_id);
        }
    }

    /// Every issue of a result paired with whether it can be fixed.
    #[must_use]
    pub fn list_fixable_issues(&self, result: &ValidationResult) -> Vec<(Issue, bool)> {
        match self.validator_for(result.doc_type) {
            Some(validator) => list_fixable_issues(result, validator),
            None => result.issues.iter().map(|i| (i.clone(), false)).collect(),
        }
    }

    /// Compute the edit resolving the issue with `code` at `range`.
    ///
    /// The owning validator and rule are derived again from the latest
    /// stored text.
    #[must_use]
    pub fn request_fix(&self, document_id: &str, code: &str, range: SourceSpan) -> Option<TextEdit> {
        let (text, version) = self.document(document_id)?;
        let result = self.validate_document(document_id, &text, version)?;
        let issue = result.find(code, range)?;
        self.compute_fix(&text, result.doc_type, issue)
    }

    fn compute_fix(&self, text: &str, doc_type: DocumentType, issue: &Issue) -> Option<TextEdit> {
        let validator = self.validator_for(doc_type)?;
        let parsed = parse(text);
        let ctx = ValidationContext::new(&parsed, &self.schemas, &self.config)?;
        validator.fix(&ctx, issue)
    }

    /// Apply the fix for an issue to the stored text and re-validate.
    ///
    /// # Errors
    ///
    /// Fails when the computed edit does not fit the stored text.
    pub fn apply_fix(&self, document_id: &str, code: &str, range: SourceSpan) -> Result<Option<AppliedFix>> {
        let Some(edit) = self.request_fix(document_id, code, range) else {
            return Ok(None);
        };
        self.commit_edit(document_id, edit).map(Some)
    }

    fn commit_edit(&self, document_id: &str, edit: TextEdit) -> Result<AppliedFix> {
        let (text, version) = self
            .document(document_id)
            .ok_or_else(|| LintError::NotFound(format!("document '{document_id}'")))?;
        let new_text = edit.apply(&text)?;
        let new_version = version + 1;
        let result = self.fix_applied(document_id, &new_text, new_version);
        Ok(AppliedFix {
            edit,
            text: new_text,
            version: new_version,
            result,
        })
    }

    /// Record that the host applied an edit and re-validate immediately.
    pub fn fix_applied(&self, document_id: &str, text: &str, version: u64) -> Option<ValidationResult> {
        self.debouncer.cancel(document_id);
        self.validate_document(document_id, text, version)
    }

    /// Apply every available fix, one at a time, re-validating in between.
    ///
    /// # Errors
    ///
    /// Fails when the document is unknown or an edit does not apply.
    pub fn fix_all(&self, document_id: &str) -> Result<FixAllOutcome> {
        let (text, version) = self
            .document(document_id)
            .ok_or_else(|| LintError::NotFound(format!("document '{document_id}'")))?;
        let mut outcome = FixAllOutcome {
            applied: Vec::new(),
            result: self.validate_document(document_id, &text, version),
            text,
            version,
        };

        for _ in 0..MAX_FIX_PASSES {
            let Some(result) = outcome.result.as_ref() else {
                break;
            };
            let next = self
                .list_fixable_issues(result)
                .into_iter()
                .filter(|(_, can_fix)| *can_fix)
                .find_map(|(issue, _)| {
                    let edit = self.compute_fix(&outcome.text, result.doc_type, &issue)?;
                    Some((issue.code, edit))
                });
            let Some((code, edit)) = next else {
                break;
            };

            let applied = self.commit_edit(document_id, edit)?;
            outcome.applied.push(code);
            outcome.text = applied.text;
            outcome.version = applied.version;
            outcome.result = applied.result;
        }

        debug!(document = document_id, fixes = outcome.applied.len(), "fix all finished");
        Ok(outcome)
    }

    /// A document was opened: validate right away.
    pub fn did_open(&self, document_id: &str, text: &str, version: u64) -> Option<ValidationResult> {
        self.validate_document(document_id, text, version)
    }

    /// A document changed: store it and schedule a debounced re-validation.
    ///
    /// Must be called from within a tokio runtime.
    pub fn did_change(self: &Arc<Self>, document_id: &str, text: &str, version: u64) {
        if !self.remember(document_id, text, version) {
            trace!(document = document_id, version, "ignoring out-of-order change");
            return;
        }
        let service = Arc::clone(self);
        let id = document_id.to_string();
        self.debouncer.schedule(document_id, move || {
            if let Some((text, version)) = service.document(&id) {
                let _ = service.validate_document(&id, &text, version);
            }
        });
    }

    /// A document was closed: forget it and clear its diagnostics.
    pub fn did_close(&self, document_id: &str) {
        self.debouncer.cancel(document_id);
        self.cache.evict(document_id);
        self.documents.write().remove(document_id);
        self.sink.clear(document_id);
    }

    /// Rules of every validator.
    #[must_use]
    pub fn list_rules(&self) -> Vec<RuleInfo> {
        self.validators
            .iter()
            .flat_map(|v| v.list_rules(&self.config))
            .collect()
    }
}
