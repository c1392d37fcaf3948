//! Leaf condition evaluation.

use tracing::debug;
use tripwire_core::ScalarValue;

use crate::aggregation::runtime_args_for_item;
use crate::context::EvaluationContext;
use crate::schema::{
    AggregationClause, Comparator, CompletionOutcome, ConditionError, ConditionResult,
    ConditionSignal, LeafCondition,
};
use crate::signals::{SignalRequest, SignalScore};

use super::comparator::score_passes;
use super::input::resolve_input;

fn pass_or_fail(passed: bool) -> CompletionOutcome {
    if passed {
        CompletionOutcome::Passed
    } else {
        CompletionOutcome::Failed
    }
}

fn comparison_error(message: String) -> ConditionResult {
    ConditionResult::errored(ConditionError {
        message,
        transient: false,
    })
}

/// "Is unavailable" turns an error into a pass that still carries the error.
fn unavailable_or_errored(leaf: &LeafCondition, error: ConditionError) -> ConditionResult {
    if leaf.comparator == Some(Comparator::IsUnavailable) {
        ConditionResult::Completed {
            outcome: CompletionOutcome::Passed,
            score: None,
            matched_value: None,
            error: Some(error),
        }
    } else {
        ConditionResult::errored(error)
    }
}

/// Evaluate one leaf. Failures are returned as `ERRORED` results, never raised.
pub(crate) async fn run_leaf_condition(
    leaf: &LeafCondition,
    ctx: &EvaluationContext,
) -> ConditionResult {
    if let Some(ConditionSignal::Aggregation(clause)) = &leaf.signal {
        return run_aggregation_condition(leaf, clause, ctx).await;
    }

    let values = match resolve_input(&leaf.input, ctx).await {
        Ok(values) => values,
        Err(e) => return unavailable_or_errored(leaf, e),
    };

    if leaf.comparator == Some(Comparator::IsNotProvided) {
        return ConditionResult::completed(pass_or_fail(values.is_empty()));
    }
    if values.is_empty() {
        return ConditionResult::completed(CompletionOutcome::Inapplicable);
    }

    match &leaf.signal {
        Some(ConditionSignal::External { id, subcategory }) => {
            run_signal_condition(leaf, id, subcategory.as_deref(), values, ctx).await
        }
        _ => compare_raw_values(leaf, &values),
    }
}

/// No signal: the input values themselves are the scores.
fn compare_raw_values(leaf: &LeafCondition, values: &[ScalarValue]) -> ConditionResult {
    let mut last_score = None;
    for value in values {
        let score = match value {
            ScalarValue::Number(n) => SignalScore::Number(*n),
            ScalarValue::Boolean(b) => SignalScore::Boolean(*b),
            other => SignalScore::Text(other.as_text()),
        };
        match score_passes(&score, leaf.comparator, leaf.threshold.as_ref()) {
            Ok(true) => {
                return ConditionResult::scored(
                    CompletionOutcome::Passed,
                    Some(score.to_string()),
                    Some(value.as_text()),
                )
            }
            Ok(false) => last_score = Some(score.to_string()),
            Err(message) => return comparison_error(message),
        }
    }
    ConditionResult::scored(CompletionOutcome::Failed, last_score, None)
}

/// Passes if any input value passes. An error on any value, with no value
/// passing, makes the whole leaf `ERRORED`.
async fn run_signal_condition(
    leaf: &LeafCondition,
    signal_id: &str,
    subcategory: Option<&str>,
    values: Vec<ScalarValue>,
    ctx: &EvaluationContext,
) -> ConditionResult {
    let user = ctx.input().author();
    let mut first_error: Option<ConditionError> = None;
    let mut last_score = None;

    for value in values {
        let request = SignalRequest {
            signal_id: signal_id.to_string(),
            subcategory: subcategory.map(str::to_string),
            value,
            matching_values: leaf.matching_values.clone(),
            org_id: ctx.org_id().to_string(),
            user: user.clone(),
        };

        match ctx.run_signal(request).await {
            Ok(output) => {
                if leaf.comparator == Some(Comparator::IsUnavailable) {
                    last_score = Some(output.score.to_string());
                    continue;
                }
                match score_passes(&output.score, leaf.comparator, leaf.threshold.as_ref()) {
                    Ok(true) => {
                        return ConditionResult::scored(
                            CompletionOutcome::Passed,
                            Some(output.score.to_string()),
                            output.matched_value,
                        )
                    }
                    Ok(false) => last_score = Some(output.score.to_string()),
                    Err(message) => {
                        first_error.get_or_insert(ConditionError {
                            message,
                            transient: false,
                        });
                    }
                }
            }
            Err(e) => {
                debug!(signal = %signal_id, error = %e, "signal run failed");
                if leaf.comparator == Some(Comparator::IsUnavailable) {
                    return unavailable_or_errored(leaf, ConditionError::from(&e));
                }
                first_error.get_or_insert(ConditionError::from(&e));
            }
        }
    }

    match first_error {
        Some(error) => ConditionResult::errored(error),
        None => ConditionResult::scored(CompletionOutcome::Failed, last_score, None),
    }
}

/// Score is the current window value for the item's group key.
async fn run_aggregation_condition(
    leaf: &LeafCondition,
    clause: &AggregationClause,
    ctx: &EvaluationContext,
) -> ConditionResult {
    let Some(args) = runtime_args_for_item(clause, ctx).await else {
        return ConditionResult::completed(CompletionOutcome::Inapplicable);
    };

    let count = match ctx.aggregations().evaluate_aggregation(clause, &args).await {
        Ok(count) => count,
        Err(e) => {
            return unavailable_or_errored(
                leaf,
                ConditionError {
                    message: e.to_string(),
                    transient: true,
                },
            )
        }
    };

    let score = SignalScore::Number(count as f64);
    match leaf.comparator {
        Some(Comparator::IsUnavailable) => {
            ConditionResult::scored(CompletionOutcome::Failed, Some(score.to_string()), None)
        }
        comparator => match score_passes(&score, comparator, leaf.threshold.as_ref()) {
            Ok(passed) => ConditionResult::scored(pass_or_fail(passed), Some(score.to_string()), None),
            Err(message) => comparison_error(message),
        },
    }
}
