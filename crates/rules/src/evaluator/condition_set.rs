//! Condition set evaluation: cost ordering, short-circuiting and
//! three-valued outcome combination.

use futures::future::BoxFuture;
use futures::FutureExt;
use tracing::{debug, warn};

use crate::context::EvaluationContext;
use crate::schema::{
    AggregationClause, CompletionOutcome, Condition, ConditionError, ConditionOutcome,
    ConditionResult, ConditionSet, ConditionSetWithResult, ConditionSignal, ConditionWithResult,
    Conjunction, ConditionInput, LeafConditionWithResult,
};

use super::leaf::run_leaf_condition;

// ── Outcome algebra ─────────────────────────────────────────────────

/// PASSED is true, FAILED and INAPPLICABLE are false, ERRORED is unknown.
pub fn outcome_to_nullable_bool(outcome: ConditionOutcome) -> Option<bool> {
    match outcome {
        ConditionOutcome::Passed => Some(true),
        ConditionOutcome::Failed | ConditionOutcome::Inapplicable => Some(false),
        ConditionOutcome::Errored => None,
    }
}

/// Combine the outcomes of every evaluated child.
///
/// - AND: the first false outcome, else ERRORED if any child errored, else PASSED.
/// - OR: PASSED if any child passed, else ERRORED if any errored, else FAILED.
/// - XOR: PASSED for exactly one pass and no errors; ERRORED when errors leave
///   it undecided (at most one pass); FAILED otherwise.
pub fn get_condition_set_outcome(
    conjunction: Conjunction,
    outcomes: &[ConditionOutcome],
) -> ConditionOutcome {
    let first_false = outcomes
        .iter()
        .copied()
        .find(|o| outcome_to_nullable_bool(*o) == Some(false));
    let trues = outcomes
        .iter()
        .filter(|o| outcome_to_nullable_bool(**o) == Some(true))
        .count();
    let any_null = outcomes.iter().any(|o| outcome_to_nullable_bool(*o).is_none());

    match conjunction {
        Conjunction::And => match first_false {
            Some(outcome) => outcome,
            None if any_null => ConditionOutcome::Errored,
            None => ConditionOutcome::Passed,
        },
        Conjunction::Or => {
            if trues > 0 {
                ConditionOutcome::Passed
            } else if any_null {
                ConditionOutcome::Errored
            } else {
                ConditionOutcome::Failed
            }
        }
        Conjunction::Xor => {
            if trues == 1 && !any_null {
                ConditionOutcome::Passed
            } else if trues <= 1 && any_null {
                ConditionOutcome::Errored
            } else {
                ConditionOutcome::Failed
            }
        }
    }
}

/// The set's outcome if the outcomes so far already decide it.
pub fn try_get_outcome_from_partial_outcomes(
    conjunction: Conjunction,
    outcomes: &[ConditionOutcome],
) -> Option<ConditionOutcome> {
    match conjunction {
        Conjunction::And => outcomes
            .iter()
            .copied()
            .find(|o| outcome_to_nullable_bool(*o) == Some(false)),
        Conjunction::Or => outcomes
            .iter()
            .any(|o| outcome_to_nullable_bool(*o) == Some(true))
            .then_some(ConditionOutcome::Passed),
        Conjunction::Xor => {
            let trues = outcomes
                .iter()
                .filter(|o| outcome_to_nullable_bool(**o) == Some(true))
                .count();
            (trues > 1).then_some(ConditionOutcome::Failed)
        }
    }
}

// ── Cost ────────────────────────────────────────────────────────────

/// Signal cost plus input derivation cost for a leaf; the sum for a set.
pub fn condition_cost(condition: &Condition, ctx: &EvaluationContext) -> u32 {
    match condition {
        Condition::Set(set) => set
            .conditions
            .iter()
            .map(|c| condition_cost(c, ctx))
            .fold(0u32, u32::saturating_add),
        Condition::Leaf(leaf) => {
            let signal_cost = match &leaf.signal {
                None => 0,
                Some(ConditionSignal::External { id, .. }) => ctx.signal_cost(id),
                Some(ConditionSignal::Aggregation(_)) => ctx.signal_cost(AGGREGATION_SIGNAL_ID),
            };
            let input_cost = match &leaf.input {
                ConditionInput::DerivedField { spec } => ctx.derivation_cost(spec),
                _ => 0,
            };
            signal_cost.saturating_add(input_cost)
        }
    }
}

/// Id under which aggregation reads are costed by the signal runner.
pub const AGGREGATION_SIGNAL_ID: &str = "AGGREGATION";

// ── Evaluation ──────────────────────────────────────────────────────

fn set_result(outcome: ConditionOutcome, children: &[ConditionWithResult]) -> ConditionResult {
    match outcome {
        ConditionOutcome::Passed => ConditionResult::completed(CompletionOutcome::Passed),
        ConditionOutcome::Failed => ConditionResult::completed(CompletionOutcome::Failed),
        ConditionOutcome::Inapplicable => ConditionResult::completed(CompletionOutcome::Inapplicable),
        ConditionOutcome::Errored => {
            let errored = children
                .iter()
                .filter(|c| c.outcome() == Some(ConditionOutcome::Errored))
                .count();
            ConditionResult::errored(ConditionError {
                message: format!("{errored} child condition(s) errored"),
                transient: false,
            })
        }
    }
}

/// Mirror of `condition` with no results: it was never evaluated.
pub(crate) fn skipped(condition: &Condition) -> ConditionWithResult {
    match condition {
        Condition::Set(set) => ConditionWithResult::Set(ConditionSetWithResult {
            conjunction: set.conjunction,
            conditions: set.conditions.iter().map(skipped).collect(),
            result: None,
        }),
        Condition::Leaf(leaf) => ConditionWithResult::Leaf(LeafConditionWithResult {
            condition: leaf.clone(),
            result: None,
        }),
    }
}

/// Evaluate a condition set against the context.
///
/// Children run one at a time, cheapest first. Once the outcomes so far
/// decide the set, the rest are skipped and carry no result. Children are
/// reported in definition order. An empty set is ERRORED.
pub fn get_condition_set_results<'a>(
    set: &'a ConditionSet,
    ctx: &'a EvaluationContext,
) -> BoxFuture<'a, ConditionSetWithResult> {
    async move {
        if set.conditions.is_empty() {
            warn!(conjunction = ?set.conjunction, "condition set has no conditions");
            return ConditionSetWithResult {
                conjunction: set.conjunction,
                conditions: Vec::new(),
                result: Some(ConditionResult::errored(ConditionError {
                    message: "condition set has no conditions".to_string(),
                    transient: false,
                })),
            };
        }

        let mut order: Vec<usize> = (0..set.conditions.len()).collect();
        order.sort_by_cached_key(|&i| condition_cost(&set.conditions[i], ctx));

        let mut evaluated: Vec<Option<ConditionWithResult>> = vec![None; set.conditions.len()];
        let mut outcomes = Vec::with_capacity(set.conditions.len());
        let mut decided: Option<ConditionOutcome> = None;

        for i in order {
            let condition = &set.conditions[i];
            if decided.is_some() {
                evaluated[i] = Some(skipped(condition));
                continue;
            }

            let with_result = match condition {
                Condition::Set(child) => {
                    ConditionWithResult::Set(get_condition_set_results(child, ctx).await)
                }
                Condition::Leaf(leaf) => ConditionWithResult::Leaf(LeafConditionWithResult {
                    condition: leaf.clone(),
                    result: Some(run_leaf_condition(leaf, ctx).await),
                }),
            };
            outcomes.push(with_result.outcome().unwrap_or(ConditionOutcome::Errored));
            evaluated[i] = Some(with_result);
            decided = try_get_outcome_from_partial_outcomes(set.conjunction, &outcomes);
        }

        let outcome =
            decided.unwrap_or_else(|| get_condition_set_outcome(set.conjunction, &outcomes));
        let conditions: Vec<ConditionWithResult> = evaluated.into_iter().flatten().collect();
        debug!(conjunction = ?set.conjunction, outcome = ?outcome, "condition set evaluated");

        ConditionSetWithResult {
            conjunction: set.conjunction,
            result: Some(set_result(outcome, &conditions)),
            conditions,
        }
    }
    .boxed()
}

/// Every aggregation referenced by a leaf anywhere in `set`.
///
/// Gating condition sets of those aggregations are not searched.
pub fn all_aggregations_in_condition_set(set: &ConditionSet) -> Vec<&AggregationClause> {
    set.conditions
        .iter()
        .flat_map(|condition| match condition {
            Condition::Set(child) => all_aggregations_in_condition_set(child),
            Condition::Leaf(leaf) => match &leaf.signal {
                Some(ConditionSignal::Aggregation(clause)) => vec![clause],
                _ => Vec::new(),
            },
        })
        .collect()
}
