//! In-memory collaborators: a rule/action/policy repository and a recording
//! action publisher.
//!
//! The repository is what the loader fills from YAML documents and what the
//! CLI and tests run the engine against.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::engine::TriggeredAction;
use crate::error::{ActionDelivery, LookupError, PublishError, QuotaError};
use crate::schema::{Action, DocumentKind, Policy, Rule, RuleDocument};
use crate::services::{
    ActionLimitRecorder, ActionPublisher, ActionSource, PolicySource, PublishContext, RuleSource,
};

/// A rule plus the references that live beside it in its definition.
#[derive(Debug, Clone)]
struct StoredRule {
    rule: Arc<Rule>,
    item_types: Vec<String>,
    action_ids: Vec<String>,
    policy_ids: Vec<String>,
}

/// Rules, actions and policies held in memory.
///
/// Unknown action or policy references are skipped at read time with a
/// warning, the same way a lagging store would return nothing for them.
pub struct InMemoryRuleRepository {
    rules: RwLock<BTreeMap<String, StoredRule>>,
    actions: RwLock<HashMap<String, Action>>,
    policies: RwLock<HashMap<String, Policy>>,
    clock: fn() -> DateTime<Utc>,
}

impl InMemoryRuleRepository {
    pub fn new() -> Self {
        Self {
            rules: RwLock::new(BTreeMap::new()),
            actions: RwLock::new(HashMap::new()),
            policies: RwLock::new(HashMap::new()),
            clock: Utc::now,
        }
    }

    /// Use `clock` for the enabled check and quota day.
    pub fn with_clock(mut self, clock: fn() -> DateTime<Utc>) -> Self {
        self.clock = clock;
        self
    }

    /// Insert or replace a rule. Quota counters of an existing rule with the
    /// same id are kept.
    pub fn upsert_rule(
        &self,
        mut rule: Rule,
        item_types: Vec<String>,
        action_ids: Vec<String>,
        policy_ids: Vec<String>,
    ) {
        let mut guard = self.rules.write().expect("rules lock poisoned");
        if let Some(existing) = guard.get(&rule.id) {
            rule.daily_actions_run = existing.rule.daily_actions_run;
            rule.last_action_date = existing.rule.last_action_date;
        }
        guard.insert(
            rule.id.clone(),
            StoredRule {
                rule: Arc::new(rule),
                item_types,
                action_ids,
                policy_ids,
            },
        );
    }

    pub fn upsert_action(&self, action: Action) {
        self.actions
            .write()
            .expect("actions lock poisoned")
            .insert(action.id.clone(), action);
    }

    pub fn upsert_policy(&self, policy: Policy) {
        self.policies
            .write()
            .expect("policies lock poisoned")
            .insert(policy.id.clone(), policy);
    }

    /// Store the engine types carried by a parsed document.
    pub fn apply_document(&self, doc: &RuleDocument) {
        match doc {
            RuleDocument::Rule(def) => self.upsert_rule(
                def.to_rule(),
                def.spec.item_types.clone(),
                def.spec.actions.clone(),
                def.spec.policies.clone(),
            ),
            RuleDocument::Action(def) => self.upsert_action(def.to_action()),
            RuleDocument::Policy(def) => self.upsert_policy(def.to_policy()),
        }
    }

    /// Remove a document by kind and id. Returns whether anything was removed.
    pub fn remove(&self, kind: DocumentKind, id: &str) -> bool {
        match kind {
            DocumentKind::Rule => self.rules.write().expect("rules lock poisoned").remove(id).is_some(),
            DocumentKind::Action => self
                .actions
                .write()
                .expect("actions lock poisoned")
                .remove(id)
                .is_some(),
            DocumentKind::Policy => self
                .policies
                .write()
                .expect("policies lock poisoned")
                .remove(id)
                .is_some(),
        }
    }

    /// Current state of a rule, including quota counters.
    pub fn rule(&self, id: &str) -> Option<Arc<Rule>> {
        let guard = self.rules.read().expect("rules lock poisoned");
        guard.get(id).map(|stored| Arc::clone(&stored.rule))
    }

    pub fn rule_count(&self) -> usize {
        self.rules.read().expect("rules lock poisoned").len()
    }

    pub fn action_count(&self) -> usize {
        self.actions.read().expect("actions lock poisoned").len()
    }

    pub fn policy_count(&self) -> usize {
        self.policies.read().expect("policies lock poisoned").len()
    }

    pub fn action_ids(&self) -> Vec<String> {
        self.actions.read().expect("actions lock poisoned").keys().cloned().collect()
    }

    pub fn policy_ids(&self) -> Vec<String> {
        self.policies.read().expect("policies lock poisoned").keys().cloned().collect()
    }
}

impl Default for InMemoryRuleRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl RuleSource for InMemoryRuleRepository {
    async fn get_enabled_rules_for_item_type(
        &self,
        item_type_id: &str,
    ) -> Result<Option<Vec<Arc<Rule>>>, LookupError> {
        let now = (self.clock)();
        let guard = self.rules.read().expect("rules lock poisoned");
        let rules: Vec<Arc<Rule>> = guard
            .values()
            .filter(|stored| stored.item_types.iter().any(|t| t == item_type_id))
            .filter(|stored| stored.rule.is_enabled(now))
            .map(|stored| Arc::clone(&stored.rule))
            .collect();
        debug!(item_type = %item_type_id, rules = rules.len(), "enabled rules");
        Ok(if rules.is_empty() { None } else { Some(rules) })
    }
}

#[async_trait::async_trait]
impl ActionSource for InMemoryRuleRepository {
    async fn get_actions_for_rule(&self, rule_id: &str) -> Result<Vec<Action>, LookupError> {
        let action_ids = {
            let guard = self.rules.read().expect("rules lock poisoned");
            match guard.get(rule_id) {
                Some(stored) => stored.action_ids.clone(),
                None => return Ok(Vec::new()),
            }
        };
        let actions = self.actions.read().expect("actions lock poisoned");
        Ok(action_ids
            .iter()
            .filter_map(|id| {
                let action = actions.get(id).cloned();
                if action.is_none() {
                    warn!(rule_id = %rule_id, action_id = %id, "rule references unknown action");
                }
                action
            })
            .collect())
    }
}

#[async_trait::async_trait]
impl PolicySource for InMemoryRuleRepository {
    async fn get_policies_for_rules(
        &self,
        rule_ids: &[String],
    ) -> Result<HashMap<String, Vec<Policy>>, LookupError> {
        let rules = self.rules.read().expect("rules lock poisoned");
        let policies = self.policies.read().expect("policies lock poisoned");
        let mut out = HashMap::new();
        for rule_id in rule_ids {
            let Some(stored) = rules.get(rule_id) else {
                continue;
            };
            let attached: Vec<Policy> = stored
                .policy_ids
                .iter()
                .filter_map(|id| policies.get(id).cloned())
                .collect();
            if !attached.is_empty() {
                out.insert(rule_id.clone(), attached);
            }
        }
        Ok(out)
    }
}

#[async_trait::async_trait]
impl ActionLimitRecorder for InMemoryRuleRepository {
    async fn record_rule_action_limit_usage(&self, rule_ids: &[String]) -> Result<(), QuotaError> {
        let today = (self.clock)().date_naive();
        let mut guard = self.rules.write().expect("rules lock poisoned");
        for rule_id in rule_ids {
            let Some(stored) = guard.get_mut(rule_id) else {
                continue;
            };
            let mut rule = (*stored.rule).clone();
            rule.record_action_usage(today);
            debug!(
                rule_id = %rule_id,
                daily_actions_run = rule.daily_actions_run,
                "recorded action usage"
            );
            stored.rule = Arc::new(rule);
        }
        Ok(())
    }
}

/// Publisher that records every batch instead of delivering it.
#[derive(Default)]
pub struct RecordingActionPublisher {
    batches: Mutex<Vec<(PublishContext, Vec<TriggeredAction>)>>,
    fail: AtomicBool,
}

impl RecordingActionPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every later publish report all deliveries as failed.
    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn batches(&self) -> Vec<(PublishContext, Vec<TriggeredAction>)> {
        self.batches.lock().expect("publisher lock poisoned").clone()
    }

    /// Every action published so far, in publish order.
    pub fn published(&self) -> Vec<TriggeredAction> {
        self.batches()
            .into_iter()
            .flat_map(|(_, actions)| actions)
            .collect()
    }
}

#[async_trait::async_trait]
impl ActionPublisher for RecordingActionPublisher {
    async fn publish_actions(
        &self,
        actions: &[TriggeredAction],
        context: &PublishContext,
    ) -> Result<Vec<ActionDelivery>, PublishError> {
        let failing = self.fail.load(Ordering::SeqCst);
        let results = actions
            .iter()
            .map(|a| ActionDelivery {
                action_id: a.action.id.clone(),
                success: !failing,
                error: failing.then(|| "delivery disabled".to_string()),
            })
            .collect();
        if !failing {
            self.batches
                .lock()
                .expect("publisher lock poisoned")
                .push((context.clone(), actions.to_vec()));
        }
        PublishError::from_results(results)
    }
}
