//! Document validation with structured errors and suggestions.
//!
//! Checks Rule, Action and Policy documents on their own (header, condition
//! tree, windows, comparators) and as a set (duplicate ids, references to
//! actions and policies that do not exist).
//! Returns a [`ValidationResult`] with errors (block save) and warnings (advisory).

mod condition_checks;
mod document_checks;
mod reference_checks;

pub mod fuzzy;


use crate::schema::*;
use serde::{Deserialize, Serialize};

// ── Result types ────────────────────────────────────────────────────

/// Overall validation outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationWarning>,
}

/// A blocking validation error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationError {
    /// JSON-path-like location, e.g. `"spec.conditionSet.conditions[0].threshold"`.
    pub path: String,
    pub message: String,
    /// Optional "Did you mean …?" suggestion.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

/// A non-blocking advisory warning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationWarning {
    pub path: String,
    pub message: String,
}

impl ValidationResult {
    pub(crate) fn new() -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub(crate) fn error(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.valid = false;
        self.errors.push(ValidationError {
            path: path.into(),
            message: message.into(),
            suggestion: None,
        });
    }

    pub(crate) fn error_with_suggestion(
        &mut self,
        path: impl Into<String>,
        message: impl Into<String>,
        suggestion: impl Into<String>,
    ) {
        self.valid = false;
        self.errors.push(ValidationError {
            path: path.into(),
            message: message.into(),
            suggestion: Some(suggestion.into()),
        });
    }

    pub(crate) fn warn(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ValidationWarning {
            path: path.into(),
            message: message.into(),
        });
    }

    /// Fold `other` into this result, prefixing its paths with `prefix`.
    pub(crate) fn merge(&mut self, prefix: &str, other: ValidationResult) {
        let join = |path: String| {
            if path.is_empty() {
                prefix.to_string()
            } else {
                format!("{prefix}: {path}")
            }
        };
        self.valid &= other.valid;
        self.errors.extend(other.errors.into_iter().map(|mut e| {
            e.path = join(e.path);
            e
        }));
        self.warnings.extend(other.warnings.into_iter().map(|mut w| {
            w.path = join(w.path);
            w
        }));
    }
}

// ── Public API ──────────────────────────────────────────────────────

/// Validate one document on its own.
pub fn validate_document(doc: &RuleDocument) -> ValidationResult {
    let mut result = ValidationResult::new();
    document_checks::validate_header(doc, &mut result);
    match doc {
        RuleDocument::Rule(def) => {
            document_checks::validate_rule_spec(def, &mut result);
            condition_checks::validate_condition_set(
                &def.spec.condition_set,
                "spec.conditionSet",
                &mut result,
            );
        }
        RuleDocument::Action(def) => document_checks::validate_action_spec(def, &mut result),
        RuleDocument::Policy(_) => {}
    }
    result
}

/// Validate every document and the references between them.
///
/// Paths in the result are prefixed with `{kind}/{id}`.
pub fn validate_documents(docs: &[RuleDocument]) -> ValidationResult {
    let mut result = ValidationResult::new();
    for doc in docs {
        let prefix = format!("{}/{}", doc.kind(), doc.metadata().id);
        result.merge(&prefix, validate_document(doc));
    }
    reference_checks::validate_references(docs, &mut result);
    result
}

/// Parse raw YAML and validate. Parse failures are reported as errors.
pub fn validate_yaml(yaml: &str) -> ValidationResult {
    let parsed = serde_yaml::from_str::<DocumentEnvelope>(yaml)
        .map_err(|e| e.to_string())
        .and_then(|envelope| envelope.parse_full());
    match parsed {
        Ok(doc) => validate_document(&doc),
        Err(e) => {
            let mut result = ValidationResult::new();
            result.error("", format!("YAML parse error: {e}"));
            result
        }
    }
}
