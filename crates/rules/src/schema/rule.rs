//! Rules, their stored status, and the environment a rule set runs in.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::ConditionSet;

/// Stored lifecycle status of a rule. `Expired` is derived from
/// `expiration_time` and never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RuleStatus {
    Draft,
    Live,
    Background,
    Expired,
}

impl fmt::Display for RuleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleStatus::Draft => write!(f, "DRAFT"),
            RuleStatus::Live => write!(f, "LIVE"),
            RuleStatus::Background => write!(f, "BACKGROUND"),
            RuleStatus::Expired => write!(f, "EXPIRED"),
        }
    }
}

/// A moderation rule: a condition tree plus quota bookkeeping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rule {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub version: String,
    pub status: RuleStatus,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    pub condition_set: ConditionSet,
    #[serde(default)]
    pub max_daily_actions: Option<u32>,
    #[serde(default)]
    pub daily_actions_run: u32,
    #[serde(default)]
    pub last_action_date: Option<NaiveDate>,
    #[serde(default)]
    pub expiration_time: Option<DateTime<Utc>>,
}

impl Rule {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expiration_time.is_some_and(|t| t <= now)
    }

    /// Status with expiry applied.
    pub fn effective_status(&self, now: DateTime<Utc>) -> RuleStatus {
        if self.is_expired(now) {
            RuleStatus::Expired
        } else {
            self.status
        }
    }

    /// Quota for `today` is used up. `daily_actions_run` only counts when
    /// `last_action_date` is `today`.
    pub fn quota_exhausted(&self, today: NaiveDate) -> bool {
        match self.max_daily_actions {
            Some(max) => self.last_action_date == Some(today) && self.daily_actions_run >= max,
            None => false,
        }
    }

    /// Not expired, LIVE or BACKGROUND, and with quota left for the current UTC day.
    pub fn is_enabled(&self, now: DateTime<Utc>) -> bool {
        matches!(
            self.effective_status(now),
            RuleStatus::Live | RuleStatus::Background
        ) && !self.quota_exhausted(now.date_naive())
    }

    /// Count one dispatch against the quota, rolling the counter over on a new day.
    pub fn record_action_usage(&mut self, today: NaiveDate) {
        if self.last_action_date == Some(today) {
            self.daily_actions_run += 1;
        } else {
            self.daily_actions_run = 1;
            self.last_action_date = Some(today);
        }
    }
}

/// Context one rule set is run in. Independent of the rules' own status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RuleEnvironment {
    Live,
    Background,
    Backtest,
    Manual,
    Retroaction,
}

impl RuleEnvironment {
    /// Whether passing rules dispatch their actions.
    pub fn runs_actions(self) -> bool {
        matches!(
            self,
            RuleEnvironment::Live | RuleEnvironment::Manual | RuleEnvironment::Retroaction
        )
    }

    /// Whether dispatches count against each rule's daily quota.
    pub fn counts_against_limit(self) -> bool {
        matches!(self, RuleEnvironment::Live)
    }
}

impl fmt::Display for RuleEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleEnvironment::Live => write!(f, "LIVE"),
            RuleEnvironment::Background => write!(f, "BACKGROUND"),
            RuleEnvironment::Backtest => write!(f, "BACKTEST"),
            RuleEnvironment::Manual => write!(f, "MANUAL"),
            RuleEnvironment::Retroaction => write!(f, "RETROACTION"),
        }
    }
}
