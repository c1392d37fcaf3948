//! Recursive condition evaluation.
//!
//! - Leaf conditions resolve their input, run their signal through the
//!   context (cached per submission) and compare the score.
//! - Condition sets evaluate children cheapest-first and stop as soon as the
//!   outcome is decided.
//! - Failures are captured as `ERRORED` results so siblings and other rules
//!   keep evaluating.

mod comparator;
mod condition_set;
mod input;
mod leaf;


use serde::Serialize;

use crate::context::EvaluationContext;
use crate::schema::{ConditionOutcome, ConditionSetWithResult, Rule};

pub use condition_set::{
    all_aggregations_in_condition_set, condition_cost, get_condition_set_outcome,
    get_condition_set_results, outcome_to_nullable_bool, try_get_outcome_from_partial_outcomes,
    AGGREGATION_SIGNAL_ID,
};
pub use input::resolve_input;

/// Result of running one rule.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleExecutionResult {
    pub passed: bool,
    pub result: ConditionSetWithResult,
}

impl RuleExecutionResult {
    pub fn outcome(&self) -> ConditionOutcome {
        self.result.outcome().unwrap_or(ConditionOutcome::Errored)
    }
}

/// Runs a rule's condition tree against an evaluation context.
pub struct RuleEvaluator;

impl RuleEvaluator {
    /// A rule passes only on a PASSED top-level outcome; ERRORED counts as not passing.
    pub async fn run_rule(rule: &Rule, ctx: &EvaluationContext) -> RuleExecutionResult {
        let result = get_condition_set_results(&rule.condition_set, ctx).await;
        let passed = result
            .outcome()
            .and_then(outcome_to_nullable_bool)
            .unwrap_or(false);
        RuleExecutionResult { passed, result }
    }
}
