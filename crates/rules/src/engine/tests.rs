//! Tests for rule set runs and the enabled-rules entry point.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tripwire_core::CorrelationId;

use super::*;
use crate::error::{LookupError, QuotaError};
use crate::execution_log::{ExecutionLog, ExecutionQuery};
use crate::memory::{InMemoryRuleRepository, RecordingActionPublisher};
use crate::schema::*;
use crate::services::NoDerivedFields;
use crate::test_support::*;

struct Harness {
    repo: Arc<InMemoryRuleRepository>,
    publisher: Arc<RecordingActionPublisher>,
    log: ExecutionLog,
    engine: RuleEngine,
}

fn harness_with(limits: Option<Arc<dyn ActionLimitRecorder>>, rules: Option<Arc<dyn RuleSource>>) -> Harness {
    let repo = Arc::new(InMemoryRuleRepository::new());
    let publisher = Arc::new(RecordingActionPublisher::new());
    let log = ExecutionLog::new();
    let engine = RuleEngine::new(RuleEngineDeps {
        rules: rules.unwrap_or_else(|| repo.clone() as Arc<dyn RuleSource>),
        actions: repo.clone(),
        policies: repo.clone(),
        limits: limits.unwrap_or_else(|| repo.clone() as Arc<dyn ActionLimitRecorder>),
        publisher: publisher.clone(),
        execution_logger: Arc::new(log.clone()),
        signals: Arc::new(ScriptedSignals::new()),
        derived_fields: Arc::new(NoDerivedFields),
        aggregations: aggregations(),
    });
    Harness { repo, publisher, log, engine }
}

fn harness() -> Harness {
    harness_with(None, None)
}

fn rule(id: &str, status: RuleStatus, needle: &str) -> Rule {
    Rule {
        id: id.into(),
        name: id.into(),
        version: "1".into(),
        status,
        tags: Default::default(),
        condition_set: set(Conjunction::And, vec![contains_leaf(needle)]),
        max_daily_actions: None,
        daily_actions_run: 0,
        last_action_date: None,
        expiration_time: None,
    }
}

fn action(id: &str) -> Action {
    Action {
        id: id.into(),
        name: id.into(),
        callback_url: None,
        callback_headers: Default::default(),
        callback_body: None,
    }
}

impl Harness {
    fn add_rule(&self, rule: Rule, actions: &[&str]) -> Arc<Rule> {
        for id in actions {
            self.repo.upsert_action(action(id));
        }
        let id = rule.id.clone();
        self.repo.upsert_rule(
            rule,
            vec!["post".into()],
            actions.iter().map(|a| a.to_string()).collect(),
            vec![],
        );
        self.repo.rule(&id).unwrap()
    }

    fn context(&self, text: &str) -> Arc<EvaluationContext> {
        Arc::new(self.engine.make_evaluation_context(
            "org-1",
            RuleInput::Submission(post(text, "u1", T0)),
        ))
    }
}

fn correlation() -> CorrelationId {
    CorrelationId::new("test", "1")
}

#[tokio::test]
async fn empty_rule_set_has_no_side_effects() {
    let h = harness();
    let outcome = h
        .engine
        .run_rule_set(&[], &h.context("x"), RuleEnvironment::Live, &correlation(), false)
        .await
        .unwrap();
    assert!(outcome.results.is_empty());
    assert!(outcome.actions.is_empty());
    assert!(h.log.is_empty());
    assert!(h.publisher.batches().is_empty());
}

#[tokio::test]
async fn live_set_publishes_deduplicated_actions() {
    let h = harness();
    let a = h.add_rule(rule("a", RuleStatus::Live, "spam"), &["remove"]);
    let b = h.add_rule(rule("b", RuleStatus::Live, "spam"), &["remove", "notify"]);
    let c = h.add_rule(rule("c", RuleStatus::Live, "unrelated"), &["ban"]);

    let outcome = h
        .engine
        .run_rule_set(&[a, b, c], &h.context("buy spam now"), RuleEnvironment::Live, &correlation(), true)
        .await
        .unwrap();

    assert_eq!(outcome.passing_rule_ids(), vec!["a", "b"]);
    assert_eq!(outcome.actions.len(), 2);
    let remove = outcome.actions.iter().find(|t| t.action_id() == "remove").unwrap();
    assert_eq!(remove.rule_ids(), vec!["a", "b"]);

    let batches = h.publisher.batches();
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0].0.environment, RuleEnvironment::Live);
    assert!(batches[0].0.sync);
    assert_eq!(batches[0].0.target_item.id, format!("post-{T0}"));

    // Every rule is logged, passing or not.
    assert_eq!(h.log.len(), 3);
    // Quota usage is recorded for passing rules only.
    assert_eq!(h.repo.rule("a").unwrap().daily_actions_run, 1);
    assert_eq!(h.repo.rule("c").unwrap().daily_actions_run, 0);
}

#[tokio::test]
async fn background_set_logs_but_never_dispatches() {
    let h = harness();
    let a = h.add_rule(rule("a", RuleStatus::Background, "spam"), &["remove"]);

    let outcome = h
        .engine
        .run_rule_set(&[a], &h.context("spam"), RuleEnvironment::Background, &correlation(), false)
        .await
        .unwrap();

    assert_eq!(outcome.passing_rule_ids(), vec!["a"]);
    assert!(outcome.actions.is_empty());
    assert!(h.publisher.batches().is_empty());
    let logged = h.log.query("a", &ExecutionQuery::default());
    assert_eq!(logged.len(), 1);
    assert!(logged[0].passed);
    assert_eq!(logged[0].environment, RuleEnvironment::Background);
    assert_eq!(h.repo.rule("a").unwrap().daily_actions_run, 0);
}

#[tokio::test]
async fn manual_set_dispatches_without_counting() {
    let h = harness();
    let a = h.add_rule(rule("a", RuleStatus::Live, "spam"), &["remove"]);

    let outcome = h
        .engine
        .run_rule_set(&[a], &h.context("spam"), RuleEnvironment::Manual, &correlation(), false)
        .await
        .unwrap();

    assert_eq!(outcome.actions.len(), 1);
    assert_eq!(h.publisher.published().len(), 1);
    assert_eq!(h.repo.rule("a").unwrap().daily_actions_run, 0);
}

#[tokio::test]
async fn publish_failure_propagates_after_logging() {
    let h = harness();
    h.publisher.set_failing(true);
    let a = h.add_rule(rule("a", RuleStatus::Live, "spam"), &["remove"]);

    let err = h
        .engine
        .run_rule_set(&[a], &h.context("spam"), RuleEnvironment::Live, &correlation(), false)
        .await
        .unwrap_err();

    assert!(matches!(err, EngineError::Publish(_)));
    assert_eq!(h.log.len(), 1);
}

struct FailingQuota(AtomicUsize);

#[async_trait::async_trait]
impl ActionLimitRecorder for FailingQuota {
    async fn record_rule_action_limit_usage(&self, _rule_ids: &[String]) -> Result<(), QuotaError> {
        self.0.fetch_add(1, Ordering::SeqCst);
        Err(QuotaError("quota store down".into()))
    }
}

#[tokio::test]
async fn quota_failure_is_swallowed() {
    let quota = Arc::new(FailingQuota(AtomicUsize::new(0)));
    let h = harness_with(Some(quota.clone()), None);
    let a = h.add_rule(rule("a", RuleStatus::Live, "spam"), &["remove"]);

    let outcome = h
        .engine
        .run_rule_set(&[a], &h.context("spam"), RuleEnvironment::Live, &correlation(), false)
        .await
        .unwrap();

    assert_eq!(outcome.actions.len(), 1);
    assert_eq!(quota.0.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn rerun_is_deterministic() {
    let h = harness();
    let a = h.add_rule(rule("a", RuleStatus::Live, "spam"), &["remove", "flag"]);
    let b = h.add_rule(rule("b", RuleStatus::Live, "spam"), &["flag"]);
    let rules = vec![a, b];

    let first = h
        .engine
        .run_rule_set(&rules, &h.context("spam"), RuleEnvironment::Manual, &correlation(), false)
        .await
        .unwrap();
    let reversed: Vec<_> = rules.iter().rev().cloned().collect();
    let second = h
        .engine
        .run_rule_set(&reversed, &h.context("spam"), RuleEnvironment::Manual, &correlation(), false)
        .await
        .unwrap();

    assert_eq!(first.actions, second.actions);
    for (rule, result) in &first.results {
        let (_, other) = second.results.iter().find(|(r, _)| r.id == rule.id).unwrap();
        assert_eq!(result, other);
    }
}

#[tokio::test]
async fn gated_aggregation_counts_only_matching_events() {
    let h = harness();
    let clause = AggregationClause {
        id: "spam-per-author".into(),
        aggregation: AggregationKind::Count,
        condition_set: Some(set(Conjunction::And, vec![contains_leaf("spam")])),
        group_by: vec![ConditionInput::AuthorUser],
        window: Window { size_ms: 10_000, hop_ms: 2_000 },
    };
    let condition_set = set(
        Conjunction::And,
        vec![Condition::Leaf(LeafCondition {
            input: ConditionInput::AuthorUser,
            signal: Some(ConditionSignal::Aggregation(clause)),
            matching_values: vec![],
            comparator: Some(Comparator::GreaterThanOrEquals),
            threshold: Some(Threshold::Number(1.0)),
        })],
    );

    let ctx = h.context("hello");
    h.engine.preprocess_aggregation_conditions(&condition_set, &ctx).await;
    let result = get_outcome(&condition_set, &ctx).await;
    assert_eq!(result, ConditionOutcome::Failed);

    let ctx = h.context("spam");
    h.engine.preprocess_aggregation_conditions(&condition_set, &ctx).await;
    assert_eq!(get_outcome(&condition_set, &ctx).await, ConditionOutcome::Passed);
}

async fn get_outcome(set: &ConditionSet, ctx: &EvaluationContext) -> ConditionOutcome {
    crate::evaluator::get_condition_set_results(set, ctx)
        .await
        .outcome()
        .unwrap()
}

#[tokio::test]
async fn identifier_inputs_do_not_update_aggregations() {
    let h = harness();
    let clause = AggregationClause {
        id: "per-user".into(),
        aggregation: AggregationKind::Count,
        condition_set: None,
        group_by: vec![ConditionInput::AuthorUser],
        window: Window { size_ms: 10_000, hop_ms: 2_000 },
    };
    let condition_set = set(
        Conjunction::And,
        vec![Condition::Leaf(LeafCondition {
            input: ConditionInput::AuthorUser,
            signal: Some(ConditionSignal::Aggregation(clause)),
            matching_values: vec![],
            comparator: Some(Comparator::GreaterThan),
            threshold: Some(Threshold::Number(0.0)),
        })],
    );
    let ctx = h.engine.make_evaluation_context(
        "org-1",
        RuleInput::Identifier {
            item: tripwire_core::ItemIdentifier { id: "u1".into(), type_id: "user".into() },
            kind: tripwire_core::ItemKind::User,
        },
    );
    h.engine.preprocess_aggregation_conditions(&condition_set, &ctx).await;
    assert_ne!(get_outcome(&condition_set, &ctx).await, ConditionOutcome::Passed);
}

// ── run_enabled_rules ───────────────────────────────────────────────

#[tokio::test]
async fn enabled_rules_return_only_live_actions() {
    let h = harness();
    h.add_rule(rule("live", RuleStatus::Live, "spam"), &["remove"]);
    h.add_rule(rule("shadow", RuleStatus::Background, "spam"), &["ban"]);

    let run = h
        .engine
        .run_enabled_rules(post("spam", "u1", T0), correlation(), false)
        .await
        .unwrap();
    let actions = run.actions_triggered.wait().await.unwrap();

    assert_eq!(actions.len(), 1);
    assert_eq!(actions[0].action_id(), "remove");
    assert_eq!(h.log.query("shadow", &ExecutionQuery::default()).len(), 1);
    assert_eq!(h.publisher.published().len(), 1);
}

#[tokio::test]
async fn enabled_rules_with_no_rules_is_empty() {
    let h = harness();
    let run = h
        .engine
        .run_enabled_rules(post("spam", "u1", T0), correlation(), false)
        .await
        .unwrap();
    assert!(run.actions_triggered.wait().await.unwrap().is_empty());
    assert!(h.log.is_empty());
}

struct BrokenRules;

#[async_trait::async_trait]
impl RuleSource for BrokenRules {
    async fn get_enabled_rules_for_item_type(
        &self,
        _item_type_id: &str,
    ) -> Result<Option<Vec<Arc<Rule>>>, LookupError> {
        Err(LookupError::Unavailable("connection refused".into()))
    }
}

#[tokio::test]
async fn rule_fetch_failure_fails_the_call() {
    let h = harness_with(None, Some(Arc::new(BrokenRules)));
    let err = h
        .engine
        .run_enabled_rules(post("spam", "u1", T0), correlation(), false)
        .await
        .err()
        .unwrap();
    assert!(matches!(err, EngineError::RuleFetch(_)));
}

#[tokio::test]
async fn derived_fields_are_readable_from_the_run() {
    let h = harness();
    let run = h
        .engine
        .run_enabled_rules(post("spam", "u1", T0), correlation(), false)
        .await
        .unwrap();
    let spec = DerivedFieldSpec {
        derivation: "ENGLISH_TRANSLATION".into(),
        source: Box::new(ConditionInput::ContentField { name: "text".into() }),
    };
    assert!(run.derived_fields.get(&spec).await.unwrap().is_empty());
}
