//! Document envelope for lightweight first-pass deserialization.

use serde::{Deserialize, Serialize};

use super::{ActionDocument, CommonMetadata, DocumentKind, PolicyDocument, RuleDefinition, RuleDocument};

/// Lightweight first-pass deserializer that reads only the header fields.
///
/// Used during two-pass loading: first extract `kind` to determine the
/// concrete type, then deserialize the full document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentEnvelope {
    #[serde(rename = "apiVersion")]
    pub api_version: String,
    pub kind: String,
    pub metadata: CommonMetadata,
    /// Remaining fields captured as raw YAML for second-pass deserialization.
    #[serde(flatten)]
    pub rest: serde_yaml::Value,
}

impl DocumentEnvelope {
    pub fn document_kind(&self) -> std::result::Result<DocumentKind, String> {
        self.kind.parse()
    }

    /// Two-pass: reconstruct the full YAML and deserialize into the concrete type.
    pub fn parse_full(&self) -> std::result::Result<RuleDocument, String> {
        let yaml = serde_yaml::to_string(self).map_err(|e| e.to_string())?;
        match self.document_kind()? {
            DocumentKind::Rule => {
                let doc: RuleDefinition = serde_yaml::from_str(&yaml).map_err(|e| e.to_string())?;
                Ok(RuleDocument::Rule(doc))
            }
            DocumentKind::Action => {
                let doc: ActionDocument = serde_yaml::from_str(&yaml).map_err(|e| e.to_string())?;
                Ok(RuleDocument::Action(doc))
            }
            DocumentKind::Policy => {
                let doc: PolicyDocument = serde_yaml::from_str(&yaml).map_err(|e| e.to_string())?;
                Ok(RuleDocument::Policy(doc))
            }
        }
    }
}
