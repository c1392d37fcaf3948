//! Actions triggered by passing rules and the policies attached to rules.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// An organization-configured action. Compared by `id` for deduplication.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Action {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub callback_url: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub callback_headers: BTreeMap<String, String>,
    /// Extra JSON merged into the callback body as `custom`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub callback_body: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PolicyPenalty {
    #[default]
    None,
    Low,
    Medium,
    High,
    Severe,
}

/// Organizational classification attached to rules for audit.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Policy {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub penalty: PolicyPenalty,
}
