//! Outcomes and the evaluated mirror of a condition tree.

use serde::{Deserialize, Serialize};

use super::{Conjunction, LeafCondition};

/// Outcome of any condition node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConditionOutcome {
    Passed,
    Failed,
    Inapplicable,
    Errored,
}

/// Outcomes a completed (non-erroring) evaluation can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CompletionOutcome {
    Passed,
    Failed,
    Inapplicable,
}

impl From<CompletionOutcome> for ConditionOutcome {
    fn from(value: CompletionOutcome) -> Self {
        match value {
            CompletionOutcome::Passed => ConditionOutcome::Passed,
            CompletionOutcome::Failed => ConditionOutcome::Failed,
            CompletionOutcome::Inapplicable => ConditionOutcome::Inapplicable,
        }
    }
}

/// Error captured as data on a condition result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConditionError {
    pub message: String,
    /// The failure may succeed if retried.
    #[serde(default)]
    pub transient: bool,
}

/// Result attached to an evaluated condition node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConditionResult {
    #[serde(rename_all = "camelCase")]
    Completed {
        outcome: CompletionOutcome,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        score: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        matched_value: Option<String>,
        /// Only set when an "is unavailable" comparison passed on an error.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<ConditionError>,
    },
    Errored { error: ConditionError },
}

impl ConditionResult {
    pub fn completed(outcome: CompletionOutcome) -> Self {
        ConditionResult::Completed {
            outcome,
            score: None,
            matched_value: None,
            error: None,
        }
    }

    pub fn scored(outcome: CompletionOutcome, score: Option<String>, matched_value: Option<String>) -> Self {
        ConditionResult::Completed {
            outcome,
            score,
            matched_value,
            error: None,
        }
    }

    pub fn errored(error: ConditionError) -> Self {
        ConditionResult::Errored { error }
    }

    pub fn outcome(&self) -> ConditionOutcome {
        match self {
            ConditionResult::Completed { outcome, .. } => (*outcome).into(),
            ConditionResult::Errored { .. } => ConditionOutcome::Errored,
        }
    }

    pub fn is_passed(&self) -> bool {
        self.outcome() == ConditionOutcome::Passed
    }
}

/// A leaf condition with its result. `result` is `None` when the leaf was
/// skipped because its parent's outcome was already determined.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeafConditionWithResult {
    #[serde(flatten)]
    pub condition: LeafCondition,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<ConditionResult>,
}

/// A condition set with its children's results, in definition order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConditionSetWithResult {
    pub conjunction: Conjunction,
    pub conditions: Vec<ConditionWithResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<ConditionResult>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConditionWithResult {
    Set(ConditionSetWithResult),
    Leaf(LeafConditionWithResult),
}

impl ConditionWithResult {
    pub fn result(&self) -> Option<&ConditionResult> {
        match self {
            ConditionWithResult::Set(set) => set.result.as_ref(),
            ConditionWithResult::Leaf(leaf) => leaf.result.as_ref(),
        }
    }

    pub fn outcome(&self) -> Option<ConditionOutcome> {
        self.result().map(ConditionResult::outcome)
    }
}

impl ConditionSetWithResult {
    pub fn outcome(&self) -> Option<ConditionOutcome> {
        self.result.as_ref().map(ConditionResult::outcome)
    }
}
