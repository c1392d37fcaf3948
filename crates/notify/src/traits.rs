//! Channel trait definition and shared error types.

use std::collections::BTreeMap;

/// Errors that can occur during action delivery.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("callback returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("failed to serialize callback body: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl NotifyError {
    /// Transport failures, timeouts, 429 and 5xx responses are worth retrying.
    /// Bad configuration and other 4xx responses fail the same way every time.
    pub fn is_retryable(&self) -> bool {
        match self {
            NotifyError::Http(_) => true,
            NotifyError::Status { status, .. } => *status == 429 || *status >= 500,
            NotifyError::Config(_) | NotifyError::Serialize(_) => false,
        }
    }
}

/// A fully resolved callback, ready for delivery.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct CallbackRequest {
    pub url: String,
    /// Header names to values, with env references already resolved.
    pub headers: BTreeMap<String, String>,
    pub body: serde_json::Value,
}

/// Trait for action delivery transports.
#[async_trait::async_trait]
pub trait ActionChannel: Send + Sync {
    /// Deliver one callback. Called again on retryable failures.
    async fn deliver(&self, request: &CallbackRequest) -> Result<(), NotifyError>;

    /// Human-readable name for this channel (e.g., "webhook").
    fn channel_name(&self) -> &str;
}
