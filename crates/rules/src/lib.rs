//! Moderation rule engine.
//!
//! This crate provides:
//! - Rule, condition, aggregation, action and policy types with serde (de)serialization
//! - A recursive condition evaluator with three-valued AND/OR/XOR outcomes
//! - Sliding-window COUNT aggregations over a pluggable counter store
//! - The rule engine: LIVE/BACKGROUND rule sets, action dedupe, dispatch gating
//! - In-memory collaborators and an execution log for local runs and tests
//! - A YAML document loader with hot-reload via `notify`, plus validation

pub mod aggregation;
pub mod context;
pub mod engine;
pub mod error;
pub mod evaluator;
pub mod execution_log;
pub mod loader;
pub mod memory;
pub mod schema;
pub mod services;
pub mod signals;
pub mod validation;

#[cfg(test)]
pub(crate) mod test_support;
