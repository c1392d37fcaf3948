//! Condition tree checks: structure, comparators, thresholds, aggregation windows.

use crate::schema::*;
use super::ValidationResult;

pub(super) fn validate_condition_set(set: &ConditionSet, path: &str, result: &mut ValidationResult) {
    if set.conditions.is_empty() {
        result.error(
            format!("{path}.conditions"),
            "condition set must contain at least one condition",
        );
    }

    for (i, condition) in set.conditions.iter().enumerate() {
        let child = format!("{path}.conditions[{i}]");
        match condition {
            Condition::Set(nested) => validate_condition_set(nested, &child, result),
            Condition::Leaf(leaf) => validate_leaf(leaf, &child, result),
        }
    }
}

fn threshold_is_numeric(threshold: &Threshold) -> bool {
    match threshold {
        Threshold::Number(_) => true,
        Threshold::Text(s) => s.trim().parse::<f64>().is_ok(),
    }
}

fn validate_leaf(leaf: &LeafCondition, path: &str, result: &mut ValidationResult) {
    match leaf.comparator {
        Some(Comparator::IsNotProvided) => {
            if leaf.signal.is_some() {
                result.error(
                    format!("{path}.signal"),
                    "IS_NOT_PROVIDED checks the input itself and cannot be combined with a signal",
                );
            }
        }
        Some(Comparator::IsUnavailable) => {
            let derived = matches!(leaf.input, ConditionInput::DerivedField { .. });
            if leaf.signal.is_none() && !derived {
                result.warn(
                    format!("{path}.comparator"),
                    "IS_UNAVAILABLE never passes without a signal or derived-field input",
                );
            }
        }
        Some(comparator) => match &leaf.threshold {
            None => result.error(
                format!("{path}.threshold"),
                format!("{comparator:?} requires a threshold"),
            ),
            Some(threshold) if comparator.is_ordering() && !threshold_is_numeric(threshold) => {
                result.error(
                    format!("{path}.threshold"),
                    format!("{comparator:?} requires a numeric threshold, got {threshold:?}"),
                );
            }
            Some(_) => {}
        },
        None => {
            if leaf.signal.is_none() {
                result.error(path, "condition needs a signal or a comparator");
            }
        }
    }

    match &leaf.signal {
        Some(ConditionSignal::Aggregation(clause)) => {
            validate_aggregation(leaf, clause, &format!("{path}.signal"), result);
        }
        Some(ConditionSignal::External { id, .. }) => {
            if id.is_empty() {
                result.error(format!("{path}.signal.id"), "signal id must not be empty");
            }
            if id == "TEXT_CONTAINS" && leaf.matching_values.is_empty() {
                result.error(
                    format!("{path}.matchingValues"),
                    "TEXT_CONTAINS requires at least one matching value",
                );
            }
        }
        None => {}
    }
}

fn validate_aggregation(
    leaf: &LeafCondition,
    clause: &AggregationClause,
    path: &str,
    result: &mut ValidationResult,
) {
    let window = &clause.window;
    if window.size_ms == 0 {
        result.error(format!("{path}.window.sizeMs"), "window size must be greater than 0");
    }
    if window.hop_ms == 0 {
        result.error(format!("{path}.window.hopMs"), "window hop must be greater than 0");
    } else if window.hop_ms > window.size_ms {
        result.error(
            format!("{path}.window.hopMs"),
            format!(
                "window hop ({}ms) must not exceed window size ({}ms)",
                window.hop_ms, window.size_ms
            ),
        );
    } else if window.size_ms % window.hop_ms != 0 {
        result.warn(
            format!("{path}.window"),
            "window size is not a multiple of hop; the window covers whole hops only",
        );
    }

    // COUNT scores are numbers; only numeric comparisons make sense.
    match (leaf.comparator, &leaf.threshold) {
        (None, _) => result.error(
            path,
            "aggregation conditions need a comparator against a numeric threshold",
        ),
        (Some(Comparator::IsUnavailable | Comparator::IsNotProvided), _) => {}
        (Some(_), Some(threshold)) if !threshold_is_numeric(threshold) => result.error(
            format!("{path}.threshold"),
            format!("{:?} aggregations compare against numbers, got {threshold:?}", clause.aggregation),
        ),
        _ => {}
    }

    if let Some(gate) = &clause.condition_set {
        validate_condition_set(gate, &format!("{path}.conditionSet"), result);
    }
}
