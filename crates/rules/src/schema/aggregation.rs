//! Sliding-window aggregation clauses referenced by leaf conditions.

use serde::{Deserialize, Serialize};

use super::{ConditionInput, ConditionSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AggregationKind {
    Count,
}

/// Window of `size_ms` total width advancing in `hop_ms` steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Window {
    pub size_ms: u64,
    pub hop_ms: u64,
}

/// A counter over events grouped by key within a sliding window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregationClause {
    pub id: String,
    pub aggregation: AggregationKind,
    /// Gates which events are counted. Absent means every event counts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition_set: Option<ConditionSet>,
    #[serde(default)]
    pub group_by: Vec<ConditionInput>,
    pub window: Window,
}
