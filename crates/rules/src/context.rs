//! Per-submission evaluation context shared by every rule in a run.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::OnceCell;
use tripwire_core::{ItemIdentifier, ItemKind, ItemSubmission, ScalarValue, UserRef};

use crate::aggregation::AggregationsService;
use crate::error::{DerivedFieldError, SignalError};
use crate::schema::DerivedFieldSpec;
use crate::services::DerivedFieldResolver;
use crate::signals::{SignalOutput, SignalRequest, SignalRunner};

/// What the rules are evaluated against.
#[derive(Debug, Clone)]
pub enum RuleInput {
    /// A full item submission.
    Submission(ItemSubmission),
    /// Only an item's identity, e.g. a user being re-checked by id.
    Identifier {
        item: ItemIdentifier,
        kind: ItemKind,
    },
}

impl RuleInput {
    pub fn identifier(&self) -> ItemIdentifier {
        match self {
            RuleInput::Submission(s) => s.identifier(),
            RuleInput::Identifier { item, .. } => item.clone(),
        }
    }

    pub fn submission(&self) -> Option<&ItemSubmission> {
        match self {
            RuleInput::Submission(s) => Some(s),
            RuleInput::Identifier { .. } => None,
        }
    }

    /// The user an author-based input refers to: the creator of a submission,
    /// or the item itself when it is a user.
    pub fn author(&self) -> Option<UserRef> {
        match self {
            RuleInput::Submission(s) if s.item_type.kind == ItemKind::User => Some(UserRef {
                id: s.item_id.clone(),
                type_id: s.item_type.id.clone(),
            }),
            RuleInput::Submission(s) => s.creator.clone(),
            RuleInput::Identifier { item, kind } if *kind == ItemKind::User => Some(UserRef {
                id: item.id.clone(),
                type_id: item.type_id.clone(),
            }),
            RuleInput::Identifier { .. } => None,
        }
    }
}

type SignalCell = Arc<OnceCell<Result<SignalOutput, SignalError>>>;
type DerivedCell = Arc<OnceCell<Result<Vec<ScalarValue>, DerivedFieldError>>>;

/// Everything a condition needs besides the condition itself.
///
/// Signal runs and derived-field values are memoized per context, so rules
/// sharing a condition on the same submission compute it at most once, even
/// when they ask concurrently.
pub struct EvaluationContext {
    org_id: String,
    input: RuleInput,
    signals: Arc<dyn SignalRunner>,
    derived_fields: Arc<dyn DerivedFieldResolver>,
    aggregations: Arc<AggregationsService>,
    signal_cache: Mutex<HashMap<String, SignalCell>>,
    derived_cache: Mutex<HashMap<String, DerivedCell>>,
}

impl EvaluationContext {
    pub fn new(
        org_id: impl Into<String>,
        input: RuleInput,
        signals: Arc<dyn SignalRunner>,
        derived_fields: Arc<dyn DerivedFieldResolver>,
        aggregations: Arc<AggregationsService>,
    ) -> Self {
        Self {
            org_id: org_id.into(),
            input,
            signals,
            derived_fields,
            aggregations,
            signal_cache: Mutex::new(HashMap::new()),
            derived_cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn org_id(&self) -> &str {
        &self.org_id
    }

    pub fn input(&self) -> &RuleInput {
        &self.input
    }

    pub fn submission(&self) -> Option<&ItemSubmission> {
        self.input.submission()
    }

    pub fn aggregations(&self) -> &AggregationsService {
        &self.aggregations
    }

    pub fn signal_cost(&self, signal_id: &str) -> u32 {
        self.signals.cost(signal_id)
    }

    pub fn derivation_cost(&self, spec: &DerivedFieldSpec) -> u32 {
        self.derived_fields.derivation_cost(spec)
    }

    /// Run a signal, sharing the result with identical requests in this context.
    pub async fn run_signal(&self, request: SignalRequest) -> Result<SignalOutput, SignalError> {
        let cell = {
            let mut cache = self.signal_cache.lock().expect("signal cache lock poisoned");
            Arc::clone(cache.entry(request.cache_key()).or_default())
        };
        cell.get_or_init(|| self.signals.run_signal(request))
            .await
            .clone()
    }

    /// Resolve a derived field. Identifier-only inputs have no derived values.
    pub async fn derived_field_value(
        &self,
        spec: &DerivedFieldSpec,
    ) -> Result<Vec<ScalarValue>, DerivedFieldError> {
        let Some(submission) = self.submission() else {
            return Ok(Vec::new());
        };
        let cell = {
            let mut cache = self.derived_cache.lock().expect("derived field cache lock poisoned");
            Arc::clone(cache.entry(spec.cache_key()).or_default())
        };
        cell.get_or_init(|| self.derived_fields.resolve(spec, submission))
            .await
            .clone()
    }
}
