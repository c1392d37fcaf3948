//! Per-item arguments for reading or updating an aggregation.

use tracing::debug;
use tripwire_core::ScalarValue;

use crate::context::EvaluationContext;
use crate::evaluator::resolve_input;
use crate::schema::AggregationClause;

/// Group key and event time of the current item for one aggregation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregationRuntimeArgs {
    pub group_values: Vec<String>,
    pub event_time_ms: i64,
}

/// Group-by values are flattened across every `group_by` input. Returns
/// `None` when the item has no submission, any input resolves to nothing,
/// or a value is not a string, id or user id.
pub async fn runtime_args_for_item(
    clause: &AggregationClause,
    ctx: &EvaluationContext,
) -> Option<AggregationRuntimeArgs> {
    let submission = ctx.submission()?;

    let mut group_values = Vec::new();
    for input in &clause.group_by {
        let values = match resolve_input(input, ctx).await {
            Ok(values) => values,
            Err(e) => {
                debug!(aggregation_id = %clause.id, error = %e.message, "group-by input failed to resolve");
                return None;
            }
        };
        if values.is_empty() {
            return None;
        }
        for value in values {
            match value {
                ScalarValue::String(s) | ScalarValue::Id(s) => group_values.push(s),
                ScalarValue::UserId(user) => group_values.push(user.id),
                other => {
                    debug!(aggregation_id = %clause.id, value = ?other, "unsupported group-by value type");
                    return None;
                }
            }
        }
    }

    Some(AggregationRuntimeArgs {
        group_values,
        event_time_ms: submission.event_time().timestamp_millis(),
    })
}
