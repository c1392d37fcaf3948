//! File-backed document kinds and their conversion into engine types.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Action, CommonMetadata, ConditionSet, DocumentKind, Policy, PolicyPenalty, Rule, RuleStatus};

/// `kind: Rule` document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleDefinition {
    #[serde(rename = "apiVersion")]
    pub api_version: String,
    pub kind: String,
    pub metadata: CommonMetadata,
    pub spec: RuleSpec,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleSpec {
    pub status: RuleStatus,
    #[serde(default)]
    pub version: Option<String>,
    /// Item type ids this rule applies to.
    pub item_types: Vec<String>,
    /// Action ids dispatched when the rule passes.
    #[serde(default)]
    pub actions: Vec<String>,
    #[serde(default)]
    pub policies: Vec<String>,
    #[serde(default)]
    pub max_daily_actions: Option<u32>,
    #[serde(default)]
    pub expiration_time: Option<DateTime<Utc>>,
    pub condition_set: ConditionSet,
}

impl RuleDefinition {
    pub fn to_rule(&self) -> Rule {
        Rule {
            id: self.metadata.id.clone(),
            name: self.metadata.name.clone(),
            version: self.spec.version.clone().unwrap_or_else(|| "1".to_string()),
            status: self.spec.status,
            tags: self.metadata.tags.iter().cloned().collect(),
            condition_set: self.spec.condition_set.clone(),
            max_daily_actions: self.spec.max_daily_actions,
            daily_actions_run: 0,
            last_action_date: None,
            expiration_time: self.spec.expiration_time,
        }
    }
}

/// `kind: Action` document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionDocument {
    #[serde(rename = "apiVersion")]
    pub api_version: String,
    pub kind: String,
    pub metadata: CommonMetadata,
    #[serde(default)]
    pub spec: ActionSpec,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionSpec {
    #[serde(default)]
    pub callback_url: Option<String>,
    #[serde(default)]
    pub callback_headers: BTreeMap<String, String>,
    #[serde(default)]
    pub callback_body: Option<serde_json::Value>,
}

impl ActionDocument {
    pub fn to_action(&self) -> Action {
        Action {
            id: self.metadata.id.clone(),
            name: self.metadata.name.clone(),
            callback_url: self.spec.callback_url.clone(),
            callback_headers: self.spec.callback_headers.clone(),
            callback_body: self.spec.callback_body.clone(),
        }
    }
}

/// `kind: Policy` document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyDocument {
    #[serde(rename = "apiVersion")]
    pub api_version: String,
    pub kind: String,
    pub metadata: CommonMetadata,
    #[serde(default)]
    pub spec: PolicySpec,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicySpec {
    #[serde(default)]
    pub penalty: PolicyPenalty,
}

impl PolicyDocument {
    pub fn to_policy(&self) -> Policy {
        Policy {
            id: self.metadata.id.clone(),
            name: self.metadata.name.clone(),
            penalty: self.spec.penalty,
        }
    }
}

/// A fully deserialized document of any supported kind.
#[derive(Debug, Clone, PartialEq)]
pub enum RuleDocument {
    Rule(RuleDefinition),
    Action(ActionDocument),
    Policy(PolicyDocument),
}

impl RuleDocument {
    /// Get the document's metadata regardless of kind.
    pub fn metadata(&self) -> &CommonMetadata {
        match self {
            RuleDocument::Rule(doc) => &doc.metadata,
            RuleDocument::Action(doc) => &doc.metadata,
            RuleDocument::Policy(doc) => &doc.metadata,
        }
    }

    pub fn kind(&self) -> DocumentKind {
        match self {
            RuleDocument::Rule(_) => DocumentKind::Rule,
            RuleDocument::Action(_) => DocumentKind::Action,
            RuleDocument::Policy(_) => DocumentKind::Policy,
        }
    }

    pub fn as_rule(&self) -> Option<&RuleDefinition> {
        match self {
            RuleDocument::Rule(doc) => Some(doc),
            _ => None,
        }
    }

    /// Serialize this document to YAML, delegating to the inner type.
    pub fn to_yaml(&self) -> std::result::Result<String, serde_yaml::Error> {
        match self {
            RuleDocument::Rule(d) => serde_yaml::to_string(d),
            RuleDocument::Action(d) => serde_yaml::to_string(d),
            RuleDocument::Policy(d) => serde_yaml::to_string(d),
        }
    }
}
