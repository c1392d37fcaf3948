//! Action delivery over HTTP callbacks.
//!
//! This crate provides:
//! - `ActionChannel` trait for pluggable delivery transports
//! - Webhook channel posting JSON callback payloads with reqwest
//! - `WebhookActionPublisher`, the engine's `ActionPublisher`, which fans out
//!   one callback per triggered action with bounded exponential-backoff retries

pub mod payload;
pub mod publisher;
pub mod traits;
pub mod webhook;

pub use publisher::{RetryPolicy, WebhookActionPublisher};
pub use traits::{ActionChannel, CallbackRequest, NotifyError};
pub use webhook::WebhookChannel;
