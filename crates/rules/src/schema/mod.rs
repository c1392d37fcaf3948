//! Schema types for rules, conditions, aggregations, actions and policies.
//!
//! - Engine types: [`Rule`], [`ConditionSet`], [`AggregationClause`], [`Action`], [`Policy`]
//! - Evaluated results: [`ConditionResult`], [`ConditionSetWithResult`]
//! - File documents: [`DocumentEnvelope`] first pass, [`RuleDocument`] second pass

mod action;
mod aggregation;
mod condition;
mod document;
mod envelope;
mod kind;
mod metadata;
mod result;
mod rule;

pub use action::*;
pub use aggregation::*;
pub use condition::*;
pub use document::*;
pub use envelope::*;
pub use kind::*;
pub use metadata::*;
pub use result::*;
pub use rule::*;
