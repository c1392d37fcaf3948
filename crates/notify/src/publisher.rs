//! Publishes triggered actions as HTTP callbacks.
//!
//! Every action in a batch is delivered concurrently. A failing delivery
//! never blocks the others; it is retried with exponential backoff and, if
//! it still fails, reported in the batch's [`PublishError::Partial`].

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tripwire_core::config::PublisherConfig;
use tripwire_rules::engine::actions::TriggeredAction;
use tripwire_rules::error::{ActionDelivery, PublishError};
use tripwire_rules::services::{ActionPublisher, PublishContext};

use crate::payload::CallbackPayload;
use crate::traits::{ActionChannel, CallbackRequest, NotifyError};
use crate::webhook::{resolve_env_vars, WebhookChannel};

/// Retry schedule for one delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts after the first one.
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &PublisherConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            initial_backoff: Duration::from_millis(config.initial_backoff_ms),
            max_backoff: Duration::from_millis(config.max_backoff_ms),
        }
    }

    /// Wait before retry number `retry` (0-based): doubles each time, capped.
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry.min(16));
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&PublisherConfig::default())
    }
}

/// [`ActionPublisher`] that posts one callback per triggered action.
pub struct WebhookActionPublisher {
    channel: Arc<dyn ActionChannel>,
    retry: RetryPolicy,
    /// Used for actions without a callback URL of their own.
    default_callback_url: Option<String>,
    auth_token: Option<String>,
}

impl WebhookActionPublisher {
    /// Publisher over a reqwest-backed [`WebhookChannel`].
    pub fn from_config(config: &PublisherConfig) -> Result<Self, NotifyError> {
        let channel = WebhookChannel::from_config(config)?;
        Ok(Self::with_channel(Arc::new(channel), config))
    }

    pub fn with_channel(channel: Arc<dyn ActionChannel>, config: &PublisherConfig) -> Self {
        Self {
            channel,
            retry: RetryPolicy::from_config(config),
            default_callback_url: config.default_callback_url.clone(),
            auth_token: config.auth_token.clone(),
        }
    }

    /// Resolve URL, headers and body for one action.
    pub fn build_request(
        &self,
        triggered: &TriggeredAction,
        context: &PublishContext,
    ) -> Result<CallbackRequest, NotifyError> {
        let action = &triggered.action;
        let url = action
            .callback_url
            .as_deref()
            .or(self.default_callback_url.as_deref())
            .ok_or_else(|| {
                NotifyError::Config(format!("action '{}' has no callback URL", action.id))
            })?;

        let mut headers = std::collections::BTreeMap::new();
        if let Some(token) = &self.auth_token {
            headers.insert("Authorization".to_string(), format!("Bearer {token}"));
        }
        for (key, value) in &action.callback_headers {
            headers.insert(key.clone(), resolve_env_vars(value)?);
        }
        headers.insert(
            "X-Correlation-Id".to_string(),
            context.correlation_id.to_string(),
        );

        let body = serde_json::to_value(CallbackPayload::new(&context.target_item, triggered))?;

        Ok(CallbackRequest {
            url: resolve_env_vars(url)?,
            headers,
            body,
        })
    }

    async fn deliver_with_retries(&self, request: &CallbackRequest) -> Result<(), NotifyError> {
        let mut retry = 0;
        loop {
            match self.channel.deliver(request).await {
                Ok(()) => return Ok(()),
                Err(e) if e.is_retryable() && retry < self.retry.max_retries => {
                    let wait = self.retry.backoff(retry);
                    tracing::debug!(
                        url = %request.url,
                        channel = self.channel.channel_name(),
                        error = %e,
                        retry,
                        wait_ms = wait.as_millis() as u64,
                        "Callback failed, retrying"
                    );
                    tokio::time::sleep(wait).await;
                    retry += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn publish_one(
        &self,
        triggered: &TriggeredAction,
        context: &PublishContext,
    ) -> ActionDelivery {
        let start = std::time::Instant::now();
        let result = match self.build_request(triggered, context) {
            Ok(request) => self.deliver_with_retries(&request).await,
            Err(e) => Err(e),
        };
        let duration_ms = start.elapsed().as_millis() as u64;

        match result {
            Ok(()) => {
                tracing::info!(
                    action_id = %triggered.action.id,
                    correlation_id = %context.correlation_id,
                    channel = self.channel.channel_name(),
                    duration_ms,
                    "Action delivered"
                );
                ActionDelivery {
                    action_id: triggered.action.id.clone(),
                    success: true,
                    error: None,
                }
            }
            Err(e) => {
                tracing::warn!(
                    action_id = %triggered.action.id,
                    correlation_id = %context.correlation_id,
                    channel = self.channel.channel_name(),
                    error = %e,
                    duration_ms,
                    "Action delivery failed"
                );
                ActionDelivery {
                    action_id: triggered.action.id.clone(),
                    success: false,
                    error: Some(e.to_string()),
                }
            }
        }
    }
}

#[async_trait::async_trait]
impl ActionPublisher for WebhookActionPublisher {
    async fn publish_actions(
        &self,
        actions: &[TriggeredAction],
        context: &PublishContext,
    ) -> Result<Vec<ActionDelivery>, PublishError> {
        let results = join_all(actions.iter().map(|a| self.publish_one(a, context))).await;
        PublishError::from_results(results)
    }
}
