//! Error types for the rule engine and its collaborators.

use crate::schema::ConditionError;

/// Failure of a signal run.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SignalError {
    /// Will fail again on retry (bad input, unsupported subcategory, ...).
    #[error("signal '{signal}' failed: {message}")]
    Permanent { signal: String, message: String },

    /// May succeed on retry (timeout, upstream outage, ...).
    #[error("signal '{signal}' temporarily unavailable: {message}")]
    Transient { signal: String, message: String },

    #[error("unknown signal '{0}'")]
    Unknown(String),
}

impl SignalError {
    pub fn is_transient(&self) -> bool {
        matches!(self, SignalError::Transient { .. })
    }
}

impl From<&SignalError> for ConditionError {
    fn from(e: &SignalError) -> Self {
        ConditionError {
            message: e.to_string(),
            transient: e.is_transient(),
        }
    }
}

/// Permanent failure to compute a derived field.
#[derive(Debug, Clone, thiserror::Error)]
#[error("derived field '{derivation}' failed: {message}")]
pub struct DerivedFieldError {
    pub derivation: String,
    pub message: String,
}

impl From<&DerivedFieldError> for ConditionError {
    fn from(e: &DerivedFieldError) -> Self {
        ConditionError {
            message: e.to_string(),
            transient: false,
        }
    }
}

/// Aggregation counter store failure.
#[derive(Debug, Clone, thiserror::Error)]
#[error("counter store error: {0}")]
pub struct StoreError(pub String);

/// Rule, action or policy lookup failure.
#[derive(Debug, thiserror::Error)]
pub enum LookupError {
    #[error("lookup backend unavailable: {0}")]
    Unavailable(String),

    #[error("{0}")]
    Other(String),
}

/// Outcome of delivering one action.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionDelivery {
    pub action_id: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Action publishing failure.
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    /// Some deliveries failed after retries; every delivery is listed.
    #[error("{} of {} action deliveries failed", .failed, .results.len())]
    Partial {
        failed: usize,
        results: Vec<ActionDelivery>,
    },

    #[error("publisher transport error: {0}")]
    Transport(String),
}

impl PublishError {
    /// Build a `Partial` error when any delivery failed.
    pub fn from_results(results: Vec<ActionDelivery>) -> Result<Vec<ActionDelivery>, PublishError> {
        let failed = results.iter().filter(|r| !r.success).count();
        if failed == 0 {
            Ok(results)
        } else {
            Err(PublishError::Partial { failed, results })
        }
    }
}

/// Execution log sink failure.
#[derive(Debug, thiserror::Error)]
#[error("execution log error: {0}")]
pub struct LogError(pub String);

/// Quota usage write failure.
#[derive(Debug, thiserror::Error)]
#[error("quota update failed: {0}")]
pub struct QuotaError(pub String);

/// Errors surfaced by [`crate::engine::RuleEngine`].
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("failed to fetch enabled rules: {0}")]
    RuleFetch(#[source] LookupError),

    #[error("failed to resolve actions: {0}")]
    ActionLookup(#[source] LookupError),

    #[error("failed to resolve policies: {0}")]
    PolicyLookup(#[source] LookupError),

    #[error(transparent)]
    Publish(#[from] PublishError),

    #[error(transparent)]
    Log(#[from] LogError),

    #[error("rule set task aborted: {0}")]
    Join(String),
}
