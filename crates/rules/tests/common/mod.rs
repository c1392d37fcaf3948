//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use tripwire_core::{CorrelationId, FieldSchema, FieldType, ItemKind, ItemSubmission, ItemType, UserRef};
use tripwire_rules::aggregation::{AggregationsService, CounterStore, InMemoryCounterStore};
use tripwire_rules::engine::{RuleEngine, RuleEngineDeps};
use tripwire_rules::execution_log::ExecutionLog;
use tripwire_rules::memory::{InMemoryRuleRepository, RecordingActionPublisher};
use tripwire_rules::schema::*;
use tripwire_rules::services::{ActionLimitRecorder, NoDerivedFields, RuleSource};
use tripwire_rules::signals::{BuiltinSignalRunner, SignalRunner};

pub const T0: i64 = 1_700_000_000_000;

pub fn noon() -> DateTime<Utc> {
    NaiveDate::from_ymd_opt(2026, 3, 1)
        .unwrap()
        .and_hms_opt(12, 0, 0)
        .unwrap()
        .and_utc()
}

pub fn post(text: &str, author: &str, time_ms: i64) -> ItemSubmission {
    let mut data = serde_json::Map::new();
    data.insert("text".into(), serde_json::Value::String(text.into()));
    ItemSubmission {
        submission_id: format!("sub-{time_ms}"),
        item_id: format!("post-{time_ms}"),
        item_type: ItemType {
            id: "post".into(),
            org_id: "org-1".into(),
            name: "Post".into(),
            kind: ItemKind::Content,
            fields: vec![
                FieldSchema { name: "text".into(), field_type: FieldType::String, repeated: false },
                FieldSchema { name: "link".into(), field_type: FieldType::Url, repeated: false },
            ],
            created_at_field: None,
        },
        data,
        creator: Some(UserRef { id: author.into(), type_id: "user".into() }),
        submission_time: Utc.timestamp_millis_opt(time_ms).unwrap(),
    }
}

pub fn correlation() -> CorrelationId {
    CorrelationId::new("integration", "1")
}

pub fn contains(needle: &str) -> Condition {
    Condition::Leaf(LeafCondition {
        input: ConditionInput::ContentField { name: "text".into() },
        signal: Some(ConditionSignal::External { id: "TEXT_CONTAINS".into(), subcategory: None }),
        matching_values: vec![needle.into()],
        comparator: None,
        threshold: None,
    })
}

pub fn rule(id: &str, status: RuleStatus, condition_set: ConditionSet) -> Rule {
    Rule {
        id: id.into(),
        name: id.into(),
        version: "1".into(),
        status,
        tags: Default::default(),
        condition_set,
        max_daily_actions: None,
        daily_actions_run: 0,
        last_action_date: None,
        expiration_time: None,
    }
}

pub fn action(id: &str) -> Action {
    Action {
        id: id.into(),
        name: id.into(),
        callback_url: None,
        callback_headers: Default::default(),
        callback_body: None,
    }
}

pub struct Harness {
    pub repo: Arc<InMemoryRuleRepository>,
    pub publisher: Arc<RecordingActionPublisher>,
    pub log: ExecutionLog,
    pub aggregations: Arc<AggregationsService>,
    pub engine: RuleEngine,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_signals(Arc::new(BuiltinSignalRunner::default()))
    }

    pub fn with_signals(signals: Arc<dyn SignalRunner>) -> Self {
        Self::with_parts(signals, Arc::new(InMemoryCounterStore::new()))
    }

    pub fn with_store(store: Arc<dyn CounterStore>) -> Self {
        Self::with_parts(Arc::new(BuiltinSignalRunner::default()), store)
    }

    fn with_parts(signals: Arc<dyn SignalRunner>, store: Arc<dyn CounterStore>) -> Self {
        let repo = Arc::new(InMemoryRuleRepository::new().with_clock(noon));
        let publisher = Arc::new(RecordingActionPublisher::new());
        let log = ExecutionLog::new();
        let aggregations = Arc::new(AggregationsService::new(store));
        let engine = RuleEngine::new(RuleEngineDeps {
            rules: repo.clone() as Arc<dyn RuleSource>,
            actions: repo.clone(),
            policies: repo.clone(),
            limits: repo.clone() as Arc<dyn ActionLimitRecorder>,
            publisher: publisher.clone(),
            execution_logger: Arc::new(log.clone()),
            signals,
            derived_fields: Arc::new(NoDerivedFields),
            aggregations: aggregations.clone(),
        });
        Self { repo, publisher, log, aggregations, engine }
    }

    /// Store `rule` for item type `post` with the given actions and policies.
    pub fn add_rule(&self, rule: Rule, actions: &[&str], policies: &[Policy]) -> Arc<Rule> {
        for id in actions {
            self.repo.upsert_action(action(id));
        }
        for policy in policies {
            self.repo.upsert_policy(policy.clone());
        }
        let id = rule.id.clone();
        self.repo.upsert_rule(
            rule,
            vec!["post".into()],
            actions.iter().map(|a| a.to_string()).collect(),
            policies.iter().map(|p| p.id.clone()).collect(),
        );
        self.repo.rule(&id).unwrap()
    }
}
