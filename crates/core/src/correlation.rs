use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::CoreError;

/// Ties every side effect of one submission together: dispatch, logging, tracing.
///
/// Rendered as `{source}:{id}`, e.g. `submit-content:3f2a...`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CorrelationId {
    source: String,
    id: String,
}

impl CorrelationId {
    pub fn new(source: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            id: id.into(),
        }
    }

    /// A fresh id for `source` backed by a random UUID.
    pub fn generate(source: impl Into<String>) -> Self {
        Self::new(source, Uuid::new_v4().to_string())
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.source, self.id)
    }
}

impl FromStr for CorrelationId {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once(':') {
            Some((source, id)) if !source.is_empty() && !id.is_empty() => {
                Ok(Self::new(source, id))
            }
            _ => Err(CoreError::InvalidCorrelationId(s.to_string())),
        }
    }
}

impl TryFrom<String> for CorrelationId {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<CorrelationId> for String {
    fn from(value: CorrelationId) -> Self {
        value.to_string()
    }
}
