//! Text signals that need no external service.

use crate::error::SignalError;

use super::{SignalOutput, SignalRequest, SignalRunner, SignalScore};

pub const TEXT_CONTAINS: &str = "TEXT_CONTAINS";
pub const TEXT_LENGTH: &str = "TEXT_LENGTH";

/// Runs `TEXT_CONTAINS` and `TEXT_LENGTH` locally.
#[derive(Debug, Clone)]
pub struct BuiltinSignalRunner {
    cost: u32,
}

impl BuiltinSignalRunner {
    pub fn new(cost: u32) -> Self {
        Self { cost }
    }
}

impl Default for BuiltinSignalRunner {
    fn default() -> Self {
        Self::new(1)
    }
}

#[async_trait::async_trait]
impl SignalRunner for BuiltinSignalRunner {
    async fn run_signal(&self, request: SignalRequest) -> Result<SignalOutput, SignalError> {
        let text = request.value.as_text();
        match request.signal_id.as_str() {
            TEXT_CONTAINS => {
                if request.matching_values.is_empty() {
                    return Err(SignalError::Permanent {
                        signal: TEXT_CONTAINS.to_string(),
                        message: "no matching values given".to_string(),
                    });
                }
                let haystack = text.to_lowercase();
                let matched = request
                    .matching_values
                    .iter()
                    .find(|needle| haystack.contains(&needle.to_lowercase()));
                Ok(SignalOutput {
                    score: SignalScore::Boolean(matched.is_some()),
                    matched_value: matched.cloned(),
                })
            }
            TEXT_LENGTH => Ok(SignalOutput::new(SignalScore::Number(
                text.chars().count() as f64,
            ))),
            other => Err(SignalError::Unknown(other.to_string())),
        }
    }

    fn cost(&self, _signal_id: &str) -> u32 {
        self.cost
    }
}
