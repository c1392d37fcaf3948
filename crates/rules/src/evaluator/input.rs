//! Resolution of a condition input into the values a signal scores.

use tripwire_core::ScalarValue;

use crate::context::{EvaluationContext, RuleInput};
use crate::schema::{ConditionError, ConditionInput};

/// Values of `input` for the context's item. An empty list means "not provided".
pub async fn resolve_input(
    input: &ConditionInput,
    ctx: &EvaluationContext,
) -> Result<Vec<ScalarValue>, ConditionError> {
    match input {
        ConditionInput::FullItem => Ok(match ctx.input() {
            RuleInput::Submission(s) => {
                vec![ScalarValue::String(serde_json::Value::Object(s.data.clone()).to_string())]
            }
            RuleInput::Identifier { item, .. } => vec![ScalarValue::Id(item.id.clone())],
        }),
        ConditionInput::ContentField { name } => Ok(ctx
            .submission()
            .map(|s| s.field_values(name))
            .unwrap_or_default()),
        ConditionInput::AllText => Ok(ctx.submission().map(|s| s.all_text()).unwrap_or_default()),
        ConditionInput::AuthorUser => Ok(ctx
            .input()
            .author()
            .map(ScalarValue::UserId)
            .into_iter()
            .collect()),
        ConditionInput::DerivedField { spec } => ctx
            .derived_field_value(spec)
            .await
            .map_err(|e| ConditionError::from(&e)),
    }
}
