//! Condition trees: nested sets of leaf conditions joined by a conjunction.

use serde::{Deserialize, Serialize};

use super::AggregationClause;

/// How a condition set combines its children.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Conjunction {
    And,
    Or,
    Xor,
}

/// A non-empty list of conditions combined with one conjunction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConditionSet {
    pub conjunction: Conjunction,
    pub conditions: Vec<Condition>,
}

/// A condition tree node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Condition {
    /// Nested set, recognised by its `conjunction` + `conditions` fields.
    Set(ConditionSet),
    Leaf(LeafCondition),
}

/// A single check: resolve `input`, score it with `signal`, compare.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeafCondition {
    pub input: ConditionInput,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signal: Option<ConditionSignal>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub matching_values: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comparator: Option<Comparator>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold: Option<Threshold>,
}

/// What part of the item feeds a leaf condition.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConditionInput {
    /// The whole item, rendered as JSON.
    FullItem,
    /// One named field of the item type.
    ContentField { name: String },
    /// Every string field of the item.
    AllText,
    /// The submitting user, or the item itself for user items.
    AuthorUser,
    /// A computed value resolved through the derived-field resolver.
    DerivedField { spec: DerivedFieldSpec },
}

/// Identifies a derived value: a derivation applied to another input.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DerivedFieldSpec {
    pub derivation: String,
    pub source: Box<ConditionInput>,
}

impl DerivedFieldSpec {
    /// Stable key for caching resolved values within one evaluation.
    pub fn cache_key(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| format!("{self:?}"))
    }
}

/// Scoring function a leaf condition delegates to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConditionSignal {
    /// A signal run by the signal runner.
    External {
        id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        subcategory: Option<String>,
    },
    /// The current value of a windowed aggregation.
    Aggregation(AggregationClause),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Comparator {
    Equals,
    NotEqualTo,
    LessThan,
    LessThanOrEquals,
    GreaterThan,
    GreaterThanOrEquals,
    /// Passes when the signal could not produce a score.
    IsUnavailable,
    /// Passes when the input has no value. Takes no signal.
    IsNotProvided,
}

impl Comparator {
    pub fn is_ordering(self) -> bool {
        matches!(
            self,
            Comparator::LessThan
                | Comparator::LessThanOrEquals
                | Comparator::GreaterThan
                | Comparator::GreaterThanOrEquals
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Threshold {
    Number(f64),
    Text(String),
}

impl Condition {
    pub fn as_set(&self) -> Option<&ConditionSet> {
        match self {
            Condition::Set(set) => Some(set),
            Condition::Leaf(_) => None,
        }
    }

    pub fn as_leaf(&self) -> Option<&LeafCondition> {
        match self {
            Condition::Leaf(leaf) => Some(leaf),
            Condition::Set(_) => None,
        }
    }
}
