//! In-memory rule execution log.
//!
//! Keeps the most recent records per rule, capped at a configurable maximum
//! (default 500) with FIFO eviction. Uses `std::sync::RwLock` so it can be
//! read from synchronous code as well as from the engine's tasks.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, RwLock};

use serde::Deserialize;
use tracing::debug;

use crate::error::LogError;
use crate::schema::RuleEnvironment;
use crate::services::{RuleExecutionLogger, RuleExecutionRecord};

/// Query parameters for filtering execution records.
#[derive(Debug, Default, Deserialize)]
pub struct ExecutionQuery {
    /// Only records from this environment.
    pub environment: Option<RuleEnvironment>,
    /// Only passing (`true`) or non-passing (`false`) records.
    pub passed: Option<bool>,
    /// Maximum number of records to return. Defaults to 100.
    pub limit: Option<u32>,
}

/// Per-rule execution records with FIFO eviction.
#[derive(Clone)]
pub struct ExecutionLog {
    records: Arc<RwLock<HashMap<String, VecDeque<RuleExecutionRecord>>>>,
    max_records_per_rule: usize,
}

impl ExecutionLog {
    /// Create a log with the default cap of 500 records per rule.
    pub fn new() -> Self {
        Self::with_capacity(500)
    }

    /// Create a log with a custom per-rule cap.
    pub fn with_capacity(max: usize) -> Self {
        Self {
            records: Arc::new(RwLock::new(HashMap::new())),
            max_records_per_rule: max,
        }
    }

    pub fn append(&self, record: RuleExecutionRecord) {
        let mut guard = self.records.write().expect("execution_log lock poisoned");
        let deque = guard.entry(record.rule_id.clone()).or_default();
        deque.push_back(record);
        while deque.len() > self.max_records_per_rule {
            deque.pop_front();
        }
    }

    /// Records for a rule, newest first.
    pub fn query(&self, rule_id: &str, query: &ExecutionQuery) -> Vec<RuleExecutionRecord> {
        let guard = self.records.read().expect("execution_log lock poisoned");
        let Some(deque) = guard.get(rule_id) else {
            return Vec::new();
        };

        let limit = query.limit.unwrap_or(100) as usize;
        deque
            .iter()
            .rev()
            .filter(|r| query.environment.map_or(true, |env| r.environment == env))
            .filter(|r| query.passed.map_or(true, |p| r.passed == p))
            .take(limit)
            .cloned()
            .collect()
    }

    /// Total records held across all rules.
    pub fn len(&self) -> usize {
        let guard = self.records.read().expect("execution_log lock poisoned");
        guard.values().map(VecDeque::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self, rule_id: &str) {
        let mut guard = self.records.write().expect("execution_log lock poisoned");
        guard.remove(rule_id);
    }
}

impl Default for ExecutionLog {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl RuleExecutionLogger for ExecutionLog {
    async fn log_rule_executions(
        &self,
        records: Vec<RuleExecutionRecord>,
        _sync: bool,
    ) -> Result<(), LogError> {
        debug!(records = records.len(), "logging rule executions");
        for record in records {
            self.append(record);
        }
        Ok(())
    }
}
