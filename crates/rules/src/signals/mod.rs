//! Signal runner contract and the built-in text signals.

mod builtin;

use std::fmt;

use serde::{Deserialize, Serialize};
use tripwire_core::{ScalarValue, UserRef};

use crate::error::SignalError;

pub use builtin::BuiltinSignalRunner;

/// Cost assumed for a signal the runner knows nothing about.
pub const DEFAULT_SIGNAL_COST: u32 = 10;

/// One invocation of a signal against one input value.
#[derive(Debug, Clone, PartialEq)]
pub struct SignalRequest {
    pub signal_id: String,
    pub subcategory: Option<String>,
    pub value: ScalarValue,
    pub matching_values: Vec<String>,
    pub org_id: String,
    pub user: Option<UserRef>,
}

impl SignalRequest {
    /// Requests with equal keys within one evaluation share a single run.
    pub fn cache_key(&self) -> String {
        format!(
            "{}|{}|{}|{}",
            self.signal_id,
            self.subcategory.as_deref().unwrap_or(""),
            serde_json::to_string(&self.value).unwrap_or_default(),
            self.matching_values.join("\u{1f}")
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SignalScore {
    Boolean(bool),
    Number(f64),
    Text(String),
}

impl fmt::Display for SignalScore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignalScore::Boolean(b) => write!(f, "{b}"),
            SignalScore::Number(n) => write!(f, "{n}"),
            SignalScore::Text(s) => write!(f, "{s}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SignalOutput {
    pub score: SignalScore,
    /// The matching value that produced the score, when the signal reports one.
    pub matched_value: Option<String>,
}

impl SignalOutput {
    pub fn new(score: SignalScore) -> Self {
        Self {
            score,
            matched_value: None,
        }
    }
}

/// Runs scoring functions for leaf conditions.
#[async_trait::async_trait]
pub trait SignalRunner: Send + Sync {
    /// Score one input. Errors distinguish permanent from transient failures.
    async fn run_signal(&self, request: SignalRequest) -> Result<SignalOutput, SignalError>;

    /// Relative cost used to order sibling conditions, cheapest first.
    fn cost(&self, _signal_id: &str) -> u32 {
        DEFAULT_SIGNAL_COST
    }
}
