//! Rule engine: the entry point that runs every enabled rule for a submission.
//!
//! A submission's enabled rules are split by status into a LIVE set and a
//! BACKGROUND set. Both sets share one [`EvaluationContext`], so signal runs
//! and derived fields are computed once per submission, and run concurrently
//! on a spawned task. Only the LIVE set's actions are returned to the caller.

pub mod actions;
mod rule_set;

#[cfg(test)]
mod tests;

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{error, info};
use tripwire_core::{CorrelationId, ItemSubmission, ScalarValue};

use crate::aggregation::AggregationsService;
use crate::context::{EvaluationContext, RuleInput};
use crate::error::{DerivedFieldError, EngineError};
use crate::schema::{DerivedFieldSpec, Rule, RuleEnvironment, RuleStatus};
use crate::services::{
    ActionLimitRecorder, ActionPublisher, ActionSource, DerivedFieldResolver, PolicySource,
    RuleExecutionLogger, RuleSource,
};
use crate::signals::SignalRunner;

pub use actions::{collect_triggered_actions, MatchingRule, TriggeredAction};
pub use rule_set::RuleSetOutcome;

/// Collaborators the engine is built from. Each field can be swapped for a
/// fake independently.
pub struct RuleEngineDeps {
    pub rules: Arc<dyn RuleSource>,
    pub actions: Arc<dyn ActionSource>,
    pub policies: Arc<dyn PolicySource>,
    pub limits: Arc<dyn ActionLimitRecorder>,
    pub publisher: Arc<dyn ActionPublisher>,
    pub execution_logger: Arc<dyn RuleExecutionLogger>,
    pub signals: Arc<dyn SignalRunner>,
    pub derived_fields: Arc<dyn DerivedFieldResolver>,
    pub aggregations: Arc<AggregationsService>,
}

#[derive(Clone)]
pub struct RuleEngine {
    deps: Arc<RuleEngineDeps>,
}

/// Handle to the LIVE actions of a [`RuleEngine::run_enabled_rules`] call.
///
/// Dropping it does not cancel the evaluation; logging and dispatch still run
/// to completion.
pub struct ActionsTriggered(JoinHandle<Result<Vec<TriggeredAction>, EngineError>>);

impl ActionsTriggered {
    /// Wait for both rule sets to finish. Fails if either set failed.
    pub async fn wait(self) -> Result<Vec<TriggeredAction>, EngineError> {
        self.0.await.map_err(|e| EngineError::Join(e.to_string()))?
    }

    pub fn is_finished(&self) -> bool {
        self.0.is_finished()
    }
}

/// Derived-field values from the submission's evaluation context, sharing
/// the cache the rules used.
#[derive(Clone)]
pub struct DerivedFieldAccessor(Arc<EvaluationContext>);

impl DerivedFieldAccessor {
    pub async fn get(&self, spec: &DerivedFieldSpec) -> Result<Vec<ScalarValue>, DerivedFieldError> {
        self.0.derived_field_value(spec).await
    }
}

pub struct EnabledRulesRun {
    pub actions_triggered: ActionsTriggered,
    pub derived_fields: DerivedFieldAccessor,
}

impl RuleEngine {
    pub fn new(deps: RuleEngineDeps) -> Self {
        Self { deps: Arc::new(deps) }
    }

    /// A fresh context, with empty caches, for one rule input.
    pub fn make_evaluation_context(&self, org_id: impl Into<String>, input: RuleInput) -> EvaluationContext {
        EvaluationContext::new(
            org_id,
            input,
            Arc::clone(&self.deps.signals),
            Arc::clone(&self.deps.derived_fields),
            Arc::clone(&self.deps.aggregations),
        )
    }

    /// Run every rule enabled for the submission's item type.
    ///
    /// Returns as soon as the rules are fetched; evaluation continues on a
    /// spawned task. Fails only when the rule lookup fails.
    pub async fn run_enabled_rules(
        &self,
        submission: ItemSubmission,
        correlation_id: CorrelationId,
        sync: bool,
    ) -> Result<EnabledRulesRun, EngineError> {
        let item_type_id = submission.item_type.id.clone();
        let rules = self
            .deps
            .rules
            .get_enabled_rules_for_item_type(&item_type_id)
            .await
            .map_err(|e| {
                error!(item_type = %item_type_id, error = %e, "failed to fetch enabled rules");
                EngineError::RuleFetch(e)
            })?
            .unwrap_or_default();

        let (live, background) = partition_by_status(rules);
        info!(
            item_type = %item_type_id,
            correlation_id = %correlation_id,
            live = live.len(),
            background = background.len(),
            "running enabled rules"
        );

        let org_id = submission.org_id().to_string();
        let ctx = Arc::new(self.make_evaluation_context(org_id, RuleInput::Submission(submission)));

        let engine = self.clone();
        let task_ctx = Arc::clone(&ctx);
        let handle = tokio::spawn(async move {
            let (live, background) = tokio::join!(
                engine.run_rule_set(&live, &task_ctx, RuleEnvironment::Live, &correlation_id, sync),
                engine.run_rule_set(
                    &background,
                    &task_ctx,
                    RuleEnvironment::Background,
                    &correlation_id,
                    sync
                ),
            );
            let live = live?;
            background?;
            Ok(live.actions)
        });

        Ok(EnabledRulesRun {
            actions_triggered: ActionsTriggered(handle),
            derived_fields: DerivedFieldAccessor(ctx),
        })
    }
}

/// LIVE and BACKGROUND rules; anything else the source returned is dropped.
fn partition_by_status(rules: Vec<Arc<Rule>>) -> (Vec<Arc<Rule>>, Vec<Arc<Rule>>) {
    let mut live = Vec::new();
    let mut background = Vec::new();
    for rule in rules {
        match rule.status {
            RuleStatus::Live => live.push(rule),
            RuleStatus::Background => background.push(rule),
            _ => {}
        }
    }
    (live, background)
}
