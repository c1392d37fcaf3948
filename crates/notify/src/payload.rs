//! JSON body posted to an action's callback URL.

use serde::Serialize;
use tripwire_core::ItemIdentifier;
use tripwire_rules::engine::actions::TriggeredAction;
use tripwire_rules::schema::PolicyPenalty;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CallbackItem {
    pub id: String,
    pub type_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CallbackPolicy {
    pub id: String,
    pub name: String,
    pub penalty: PolicyPenalty,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CallbackRule {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CallbackAction {
    pub id: String,
}

/// What the receiving service learns about one triggered action.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CallbackPayload {
    pub item: CallbackItem,
    pub policies: Vec<CallbackPolicy>,
    pub rules: Vec<CallbackRule>,
    pub action: CallbackAction,
    /// The action's configured extra body, or an empty object.
    pub custom: serde_json::Value,
}

impl CallbackPayload {
    pub fn new(target: &ItemIdentifier, triggered: &TriggeredAction) -> Self {
        Self {
            item: CallbackItem {
                id: target.id.clone(),
                type_id: target.type_id.clone(),
            },
            policies: triggered
                .policies
                .iter()
                .map(|p| CallbackPolicy {
                    id: p.id.clone(),
                    name: p.name.clone(),
                    penalty: p.penalty,
                })
                .collect(),
            rules: triggered
                .matching_rules
                .iter()
                .map(|r| CallbackRule {
                    id: r.id.clone(),
                    name: r.name.clone(),
                })
                .collect(),
            action: CallbackAction {
                id: triggered.action.id.clone(),
            },
            custom: triggered
                .action
                .callback_body
                .clone()
                .unwrap_or_else(|| serde_json::json!({})),
        }
    }
}
