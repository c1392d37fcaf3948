//! Shared fixtures for unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{TimeZone, Utc};
use tripwire_core::{FieldSchema, FieldType, ItemKind, ItemSubmission, ItemType, UserRef};

use crate::aggregation::{AggregationsService, InMemoryCounterStore};
use crate::context::{EvaluationContext, RuleInput};
use crate::error::SignalError;
use crate::schema::{
    Comparator, Condition, ConditionInput, ConditionSet, ConditionSignal, Conjunction,
    LeafCondition, Threshold,
};
use crate::services::NoDerivedFields;
use crate::signals::{BuiltinSignalRunner, SignalOutput, SignalRequest, SignalRunner};

/// Signals with scripted results; unscripted ids fall through to the built-ins.
#[derive(Default)]
pub(crate) struct ScriptedSignals {
    results: Mutex<HashMap<String, Result<SignalOutput, SignalError>>>,
    costs: HashMap<String, u32>,
    pub calls: Arc<AtomicUsize>,
    pub seen: Mutex<Vec<String>>,
}

impl ScriptedSignals {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(self, id: &str, result: Result<SignalOutput, SignalError>) -> Self {
        self.results
            .lock()
            .unwrap()
            .insert(id.to_string(), result);
        self
    }

    pub fn with_cost(mut self, id: &str, cost: u32) -> Self {
        self.costs.insert(id.to_string(), cost);
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl SignalRunner for ScriptedSignals {
    async fn run_signal(&self, request: SignalRequest) -> Result<SignalOutput, SignalError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(request.signal_id.clone());
        let scripted = self.results.lock().unwrap().get(&request.signal_id).cloned();
        match scripted {
            Some(result) => result,
            None => BuiltinSignalRunner::default().run_signal(request).await,
        }
    }

    fn cost(&self, signal_id: &str) -> u32 {
        self.costs.get(signal_id).copied().unwrap_or(10)
    }
}

pub(crate) const T0: i64 = 1_700_000_000_000;

pub(crate) fn post_type() -> ItemType {
    ItemType {
        id: "post".into(),
        org_id: "org-1".into(),
        name: "Post".into(),
        kind: ItemKind::Content,
        fields: vec![
            FieldSchema { name: "text".into(), field_type: FieldType::String, repeated: false },
            FieldSchema { name: "link".into(), field_type: FieldType::Url, repeated: false },
            FieldSchema { name: "likes".into(), field_type: FieldType::Number, repeated: false },
        ],
        created_at_field: None,
    }
}

pub(crate) fn post(text: &str, author: &str, time_ms: i64) -> ItemSubmission {
    let mut data = serde_json::Map::new();
    data.insert("text".into(), serde_json::Value::String(text.into()));
    ItemSubmission {
        submission_id: format!("sub-{time_ms}"),
        item_id: format!("post-{time_ms}"),
        item_type: post_type(),
        data,
        creator: Some(UserRef { id: author.into(), type_id: "user".into() }),
        submission_time: Utc.timestamp_millis_opt(time_ms).unwrap(),
    }
}

pub(crate) fn aggregations() -> Arc<AggregationsService> {
    Arc::new(AggregationsService::new(Arc::new(InMemoryCounterStore::new())))
}

pub(crate) fn context_with(
    submission: ItemSubmission,
    signals: Arc<dyn SignalRunner>,
    aggregations: Arc<AggregationsService>,
) -> EvaluationContext {
    EvaluationContext::new(
        submission.org_id().to_string(),
        RuleInput::Submission(submission),
        signals,
        Arc::new(NoDerivedFields),
        aggregations,
    )
}

pub(crate) fn context(submission: ItemSubmission, signals: Arc<dyn SignalRunner>) -> EvaluationContext {
    context_with(submission, signals, aggregations())
}

pub(crate) fn signal_leaf(signal: &str) -> Condition {
    Condition::Leaf(LeafCondition {
        input: ConditionInput::ContentField { name: "text".into() },
        signal: Some(ConditionSignal::External { id: signal.into(), subcategory: None }),
        matching_values: vec![],
        comparator: None,
        threshold: None,
    })
}

pub(crate) fn contains_leaf(needle: &str) -> Condition {
    Condition::Leaf(LeafCondition {
        input: ConditionInput::ContentField { name: "text".into() },
        signal: Some(ConditionSignal::External { id: "TEXT_CONTAINS".into(), subcategory: None }),
        matching_values: vec![needle.into()],
        comparator: None,
        threshold: None,
    })
}

pub(crate) fn numeric_leaf(signal: &str, comparator: Comparator, threshold: f64) -> Condition {
    Condition::Leaf(LeafCondition {
        input: ConditionInput::ContentField { name: "text".into() },
        signal: Some(ConditionSignal::External { id: signal.into(), subcategory: None }),
        matching_values: vec![],
        comparator: Some(comparator),
        threshold: Some(Threshold::Number(threshold)),
    })
}

pub(crate) fn set(conjunction: Conjunction, conditions: Vec<Condition>) -> ConditionSet {
    ConditionSet { conjunction, conditions }
}
