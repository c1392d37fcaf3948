//! Document kind enum for two-pass deserialization dispatch.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Supported document kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DocumentKind {
    Rule,
    Action,
    Policy,
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocumentKind::Rule => write!(f, "Rule"),
            DocumentKind::Action => write!(f, "Action"),
            DocumentKind::Policy => write!(f, "Policy"),
        }
    }
}

impl FromStr for DocumentKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "Rule" => Ok(DocumentKind::Rule),
            "Action" => Ok(DocumentKind::Action),
            "Policy" => Ok(DocumentKind::Policy),
            other => Err(format!("unknown document kind: '{}'", other)),
        }
    }
}
