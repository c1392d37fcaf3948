//! Running one set of rules in one environment.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use futures::future::join_all;
use tracing::{debug, error, info_span, warn, Instrument};
use tripwire_core::CorrelationId;

use crate::aggregation::runtime_args_for_item;
use crate::context::EvaluationContext;
use crate::error::EngineError;
use crate::evaluator::{
    all_aggregations_in_condition_set, get_condition_set_results, RuleEvaluator,
    RuleExecutionResult,
};
use crate::schema::{Action, ConditionOutcome, ConditionSet, Policy, Rule, RuleEnvironment};
use crate::services::{PublishContext, RuleExecutionRecord};

use super::actions::{collect_triggered_actions, TriggeredAction};
use super::RuleEngine;

/// Per-rule results, in input order, and the actions dispatched.
#[derive(Debug, Clone, Default)]
pub struct RuleSetOutcome {
    pub results: Vec<(Arc<Rule>, RuleExecutionResult)>,
    pub actions: Vec<TriggeredAction>,
}

impl RuleSetOutcome {
    pub fn passing_rule_ids(&self) -> Vec<&str> {
        self.results
            .iter()
            .filter(|(_, result)| result.passed)
            .map(|(rule, _)| rule.id.as_str())
            .collect()
    }
}

impl RuleEngine {
    /// Count this submission in every aggregation referenced by `set` whose
    /// gate passes. Store failures are logged and skipped.
    ///
    /// Identifier-only inputs are not events and update nothing.
    pub async fn preprocess_aggregation_conditions(&self, set: &ConditionSet, ctx: &EvaluationContext) {
        if ctx.submission().is_none() {
            return;
        }

        let updates = all_aggregations_in_condition_set(set).into_iter().map(|clause| async move {
            let applicable = match &clause.condition_set {
                None => true,
                Some(gate) => get_condition_set_results(gate, ctx)
                    .await
                    .result
                    .as_ref()
                    .is_some_and(|r| r.is_passed()),
            };
            if !applicable {
                debug!(aggregation_id = %clause.id, "aggregation gate did not pass");
                return;
            }

            let Some(args) = runtime_args_for_item(clause, ctx).await else {
                debug!(aggregation_id = %clause.id, "no group key for item, skipping update");
                return;
            };
            if let Err(e) = ctx.aggregations().update_aggregation(clause, &args).await {
                warn!(aggregation_id = %clause.id, error = %e, "aggregation update failed");
            }
        });
        join_all(updates).await;
    }

    /// Evaluate `rules` in `environment`, then log, dispatch and record quota
    /// usage as the environment allows.
    pub async fn run_rule_set(
        &self,
        rules: &[Arc<Rule>],
        ctx: &Arc<EvaluationContext>,
        environment: RuleEnvironment,
        correlation_id: &CorrelationId,
        sync: bool,
    ) -> Result<RuleSetOutcome, EngineError> {
        if rules.is_empty() {
            return Ok(RuleSetOutcome::default());
        }

        let span = info_span!(
            "rule_set",
            environment = %environment,
            correlation_id = %correlation_id,
            rules = rules.len()
        );
        self.run_rule_set_inner(rules, ctx, environment, correlation_id, sync)
            .instrument(span)
            .await
    }

    async fn run_rule_set_inner(
        &self,
        rules: &[Arc<Rule>],
        ctx: &EvaluationContext,
        environment: RuleEnvironment,
        correlation_id: &CorrelationId,
        sync: bool,
    ) -> Result<RuleSetOutcome, EngineError> {
        join_all(
            rules
                .iter()
                .map(|rule| self.preprocess_aggregation_conditions(&rule.condition_set, ctx)),
        )
        .await;

        let evaluations = join_all(rules.iter().map(|rule| RuleEvaluator::run_rule(rule, ctx))).await;
        let results: Vec<(Arc<Rule>, RuleExecutionResult)> =
            rules.iter().cloned().zip(evaluations).collect();

        for (rule, result) in &results {
            if result.outcome() == ConditionOutcome::Errored {
                warn!(rule_id = %rule.id, "rule evaluation errored");
            }
        }

        let passing: Vec<&Arc<Rule>> = results
            .iter()
            .filter(|(_, result)| result.passed)
            .map(|(rule, _)| rule)
            .collect();
        let rule_ids: Vec<String> = rules.iter().map(|r| r.id.clone()).collect();

        let (actions_by_rule, policies_by_rule) = tokio::try_join!(
            self.actions_for_rules(&passing, environment),
            async {
                self.deps
                    .policies
                    .get_policies_for_rules(&rule_ids)
                    .await
                    .map_err(EngineError::PolicyLookup)
            },
        )?;

        let records = execution_records(&results, ctx, environment, correlation_id, &policies_by_rule);

        if !environment.runs_actions() {
            self.deps.execution_logger.log_rule_executions(records, sync).await?;
            return Ok(RuleSetOutcome { results, actions: Vec::new() });
        }

        let actions = collect_triggered_actions(&actions_by_rule, &policies_by_rule, environment);
        let publish_context = PublishContext {
            org_id: ctx.org_id().to_string(),
            target_item: ctx.input().identifier(),
            correlation_id: correlation_id.clone(),
            environment,
            sync,
        };
        let passing_ids: Vec<String> = passing.iter().map(|r| r.id.clone()).collect();

        let (logged, published, ()) = tokio::join!(
            self.deps.execution_logger.log_rule_executions(records, sync),
            async {
                if actions.is_empty() {
                    return Ok(Vec::new());
                }
                self.deps.publisher.publish_actions(&actions, &publish_context).await
            },
            async {
                if !environment.counts_against_limit() || passing_ids.is_empty() {
                    return;
                }
                if let Err(e) = self.deps.limits.record_rule_action_limit_usage(&passing_ids).await {
                    warn!(rules = ?passing_ids, error = %e, "failed to record rule action usage");
                }
            },
        );

        if let Err(e) = published {
            error!(error = %e, actions = actions.len(), "failed to publish actions");
            return Err(e.into());
        }
        logged?;

        Ok(RuleSetOutcome { results, actions })
    }

    /// Configured actions of each passing rule. Skipped when the environment
    /// never dispatches.
    async fn actions_for_rules(
        &self,
        passing: &[&Arc<Rule>],
        environment: RuleEnvironment,
    ) -> Result<Vec<(Arc<Rule>, Vec<Action>)>, EngineError> {
        if !environment.runs_actions() {
            return Ok(Vec::new());
        }
        let lookups = passing.iter().map(|rule| async move {
            let actions = self
                .deps
                .actions
                .get_actions_for_rule(&rule.id)
                .await
                .map_err(EngineError::ActionLookup)?;
            Ok::<_, EngineError>((Arc::clone(rule), actions))
        });
        join_all(lookups).await.into_iter().collect()
    }
}

fn execution_records(
    results: &[(Arc<Rule>, RuleExecutionResult)],
    ctx: &EvaluationContext,
    environment: RuleEnvironment,
    correlation_id: &CorrelationId,
    policies_by_rule: &HashMap<String, Vec<Policy>>,
) -> Vec<RuleExecutionRecord> {
    let executed_at = Utc::now();
    let item = ctx.input().identifier();
    results
        .iter()
        .map(|(rule, result)| RuleExecutionRecord {
            org_id: ctx.org_id().to_string(),
            rule_id: rule.id.clone(),
            rule_name: rule.name.clone(),
            rule_version: rule.version.clone(),
            tags: rule.tags.iter().cloned().collect(),
            item: item.clone(),
            environment,
            correlation_id: correlation_id.clone(),
            passed: result.passed,
            result: result.result.clone(),
            policies: policies_by_rule.get(&rule.id).cloned().unwrap_or_default(),
            executed_at,
        })
        .collect()
}
