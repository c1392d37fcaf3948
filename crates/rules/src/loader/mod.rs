//! Filesystem document loader with hot-reload via `notify` watcher.
//!
//! Reads Rule, Action and Policy documents from a directory of YAML files
//! into an [`InMemoryRuleRepository`](crate::memory::InMemoryRuleRepository),
//! and keeps the repository in step with file creates, edits and deletes.
//! Documents are parsed in two passes (DocumentEnvelope -> RuleDocument).

mod core;
mod error;
mod watcher;

#[cfg(test)]
mod tests;

pub use self::core::RuleLoader;
pub use self::error::{LoadResult, LoadStatus, Result, RuleError};
