//! Contracts for the collaborators the engine reads from and writes to.
//!
//! Lookups are eventually consistent: an implementation may serve data that
//! lags the latest write by its own bounded staleness window. The engine
//! reads each of them once per evaluation and treats the result as a
//! point-in-time snapshot.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tripwire_core::{CorrelationId, ItemIdentifier, ItemSubmission, ScalarValue};

use crate::engine::TriggeredAction;
use crate::error::{
    ActionDelivery, DerivedFieldError, LogError, LookupError, PublishError, QuotaError,
};
use crate::schema::{Action, ConditionSetWithResult, DerivedFieldSpec, Policy, Rule, RuleEnvironment};

/// Source of rule definitions.
#[async_trait::async_trait]
pub trait RuleSource: Send + Sync {
    /// Rules enabled for `item_type_id` right now. `None` means none configured.
    async fn get_enabled_rules_for_item_type(
        &self,
        item_type_id: &str,
    ) -> Result<Option<Vec<Arc<Rule>>>, LookupError>;
}

#[async_trait::async_trait]
pub trait ActionSource: Send + Sync {
    async fn get_actions_for_rule(&self, rule_id: &str) -> Result<Vec<Action>, LookupError>;
}

#[async_trait::async_trait]
pub trait PolicySource: Send + Sync {
    /// Policies keyed by rule id. Rules without policies may be absent.
    async fn get_policies_for_rules(
        &self,
        rule_ids: &[String],
    ) -> Result<HashMap<String, Vec<Policy>>, LookupError>;
}

/// Persists per-rule daily action usage.
#[async_trait::async_trait]
pub trait ActionLimitRecorder: Send + Sync {
    async fn record_rule_action_limit_usage(&self, rule_ids: &[String]) -> Result<(), QuotaError>;
}

/// Values shared by every action in one publish call.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishContext {
    pub org_id: String,
    pub target_item: ItemIdentifier,
    pub correlation_id: CorrelationId,
    pub environment: RuleEnvironment,
    pub sync: bool,
}

/// Delivers triggered actions.
#[async_trait::async_trait]
pub trait ActionPublisher: Send + Sync {
    /// Deliver every action. Returns one entry per action, or
    /// [`PublishError::Partial`] when any delivery failed.
    async fn publish_actions(
        &self,
        actions: &[TriggeredAction],
        context: &PublishContext,
    ) -> Result<Vec<ActionDelivery>, PublishError>;
}

/// One rule's evaluation, as handed to the execution logger.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleExecutionRecord {
    pub org_id: String,
    pub rule_id: String,
    pub rule_name: String,
    pub rule_version: String,
    pub tags: Vec<String>,
    pub item: ItemIdentifier,
    pub environment: RuleEnvironment,
    pub correlation_id: CorrelationId,
    pub passed: bool,
    pub result: ConditionSetWithResult,
    pub policies: Vec<Policy>,
    pub executed_at: DateTime<Utc>,
}

#[async_trait::async_trait]
pub trait RuleExecutionLogger: Send + Sync {
    async fn log_rule_executions(
        &self,
        records: Vec<RuleExecutionRecord>,
        sync: bool,
    ) -> Result<(), LogError>;
}

/// Computes derived input values. Implementations are expected to sit in
/// front of a request-collapsing cache.
#[async_trait::async_trait]
pub trait DerivedFieldResolver: Send + Sync {
    /// Values for `spec`; empty when the derivation produced nothing.
    async fn resolve(
        &self,
        spec: &DerivedFieldSpec,
        submission: &ItemSubmission,
    ) -> Result<Vec<ScalarValue>, DerivedFieldError>;

    /// Cost of computing `spec`, added to the consuming condition's cost.
    fn derivation_cost(&self, _spec: &DerivedFieldSpec) -> u32 {
        0
    }
}

/// Resolver for deployments without derived fields: every spec is empty.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDerivedFields;

#[async_trait::async_trait]
impl DerivedFieldResolver for NoDerivedFields {
    async fn resolve(
        &self,
        _spec: &DerivedFieldSpec,
        _submission: &ItemSubmission,
    ) -> Result<Vec<ScalarValue>, DerivedFieldError> {
        Ok(Vec::new())
    }
}
