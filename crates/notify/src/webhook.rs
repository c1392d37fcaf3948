//! HTTP webhook channel.
//!
//! Posts callback bodies as JSON to the action's callback URL with the
//! action's custom headers.

use std::time::Duration;

use tripwire_core::config::PublisherConfig;

use crate::traits::{ActionChannel, CallbackRequest, NotifyError};

/// Delivers callbacks as JSON over HTTP POST.
#[derive(Debug, Clone)]
pub struct WebhookChannel {
    /// Shared HTTP client (connection pooling).
    client: reqwest::Client,
}

impl WebhookChannel {
    /// Create a channel whose requests time out after `timeout`.
    pub fn new(timeout: Duration) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }

    pub fn from_config(config: &PublisherConfig) -> Result<Self, NotifyError> {
        Self::new(Duration::from_secs(config.timeout_secs.max(1)))
    }
}

#[async_trait::async_trait]
impl ActionChannel for WebhookChannel {
    async fn deliver(&self, request: &CallbackRequest) -> Result<(), NotifyError> {
        let body = serde_json::to_vec(&request.body)?;

        let mut builder = self.client.post(&request.url);
        // Custom headers cannot change the content type.
        for (key, value) in request
            .headers
            .iter()
            .filter(|(key, _)| !key.eq_ignore_ascii_case("content-type"))
        {
            builder = builder.header(key.as_str(), value.as_str());
        }
        let builder = builder
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body);

        let response = builder.send().await?;
        let status = response.status();

        if !status.is_success() {
            let body_text = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            tracing::warn!(
                url = %request.url,
                %status,
                body = %body_text,
                "callback returned non-2xx status"
            );
            return Err(NotifyError::Status {
                status: status.as_u16(),
                body: body_text,
            });
        }

        tracing::debug!(url = %request.url, %status, "callback delivered");
        Ok(())
    }

    fn channel_name(&self) -> &str {
        "webhook"
    }
}

/// Resolve `${VAR_NAME}` patterns in a string using `std::env::var`.
///
/// Returns an error if a referenced variable is not set.
pub(crate) fn resolve_env_vars(input: &str) -> Result<String, NotifyError> {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && chars.peek() == Some(&'{') {
            chars.next();
            let mut var_name = String::new();
            let mut closed = false;
            for c in chars.by_ref() {
                if c == '}' {
                    closed = true;
                    break;
                }
                var_name.push(c);
            }
            if !closed {
                return Err(NotifyError::Config(format!(
                    "unclosed env var reference in: {input}"
                )));
            }
            let value = std::env::var(&var_name)
                .map_err(|_| NotifyError::Config(format!("env var not found: {var_name}")))?;
            result.push_str(&value);
        } else {
            result.push(ch);
        }
    }

    Ok(result)
}
