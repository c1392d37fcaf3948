use std::env;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Read a profiled env var: tries {PROFILE}_{KEY} first, falls back to {KEY}.
fn profiled_env_opt(profile: &str, key: &str) -> Option<String> {
    if !profile.is_empty() {
        let prefixed = format!("{}_{}", profile, key);
        if let Some(v) = env_opt(&prefixed) {
            return Some(v);
        }
    }
    env_opt(key)
}

fn profiled_env_or(profile: &str, key: &str, default: &str) -> String {
    profiled_env_opt(profile, key).unwrap_or_else(|| default.to_string())
}

fn profiled_env_bool(profile: &str, key: &str, default: bool) -> bool {
    profiled_env_opt(profile, key)
        .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(default)
}

fn profiled_env_u32(profile: &str, key: &str, default: u32) -> u32 {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn profiled_env_u64(profile: &str, key: &str, default: u64) -> u64 {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Active profile name (empty = default).
    pub profile: String,
    pub engine: EngineConfig,
    pub publisher: PublisherConfig,
}

impl Config {
    /// Build config from environment variables (call `load_dotenv()` first).
    /// Profile is read from `TRIPWIRE_PROFILE`. When set (e.g. `PROD`),
    /// every key is first looked up as `{PROFILE}_{KEY}`, falling back to `{KEY}`.
    pub fn from_env() -> Self {
        let profile = env_or("TRIPWIRE_PROFILE", "").to_uppercase();
        Self::for_profile(&profile)
    }

    /// Build config for a specific named profile (empty string = default).
    pub fn for_profile(profile: &str) -> Self {
        let p = profile.to_uppercase();
        let p = p.as_str();
        Self {
            profile: p.to_string(),
            engine: EngineConfig::from_env_profiled(p),
            publisher: PublisherConfig::from_env_profiled(p),
        }
    }

    pub fn profile_label(&self) -> &str {
        if self.profile.is_empty() { "default" } else { &self.profile }
    }

    /// Print a redacted summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded (profile: {}):", self.profile_label());
        tracing::info!(
            "  engine:     rules_dir={}, watch={}, log_capacity={}",
            self.engine.rules_dir.display(),
            self.engine.watch_rules,
            self.engine.execution_log_capacity
        );
        tracing::info!(
            "  publisher:  callback={}, retries={}, backoff={}..{}ms",
            self.publisher.default_callback_url.as_deref().unwrap_or("(none)"),
            self.publisher.max_retries,
            self.publisher.initial_backoff_ms,
            self.publisher.max_backoff_ms
        );
    }

    /// Return a redacted view safe for printing (no header secrets).
    pub fn redacted_summary(&self) -> serde_json::Value {
        serde_json::json!({
            "profile": self.profile_label(),
            "engine": {
                "rules_dir": self.engine.rules_dir,
                "watch_rules": self.engine.watch_rules,
                "execution_log_capacity": self.engine.execution_log_capacity,
                "default_signal_cost": self.engine.default_signal_cost,
            },
            "publisher": {
                "default_callback_url": self.publisher.default_callback_url,
                "timeout_secs": self.publisher.timeout_secs,
                "max_retries": self.publisher.max_retries,
                "initial_backoff_ms": self.publisher.initial_backoff_ms,
                "max_backoff_ms": self.publisher.max_backoff_ms,
                "auth_token_set": self.publisher.auth_token.is_some(),
            },
        })
    }
}

// ── Engine ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Directory holding Rule/Action/Policy YAML documents.
    pub rules_dir: PathBuf,
    /// Hot-reload rule documents when files change.
    pub watch_rules: bool,
    /// Per-rule cap on retained execution records.
    pub execution_log_capacity: u32,
    /// Cost assigned to signals that do not declare one.
    pub default_signal_cost: u32,
}

impl EngineConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            rules_dir: PathBuf::from(profiled_env_or(p, "TRIPWIRE_RULES_DIR", "rules")),
            watch_rules: profiled_env_bool(p, "TRIPWIRE_WATCH_RULES", false),
            execution_log_capacity: profiled_env_u32(p, "TRIPWIRE_EXECUTION_LOG_CAPACITY", 500),
            default_signal_cost: profiled_env_u32(p, "TRIPWIRE_DEFAULT_SIGNAL_COST", 10),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            rules_dir: PathBuf::from("rules"),
            watch_rules: false,
            execution_log_capacity: 500,
            default_signal_cost: 10,
        }
    }
}

// ── Action publisher ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublisherConfig {
    /// Callback used for actions that carry no URL of their own.
    pub default_callback_url: Option<String>,
    /// Bearer token attached to every callback request.
    #[serde(skip_serializing)]
    pub auth_token: Option<String>,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl PublisherConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            default_callback_url: profiled_env_opt(p, "TRIPWIRE_CALLBACK_URL"),
            auth_token: profiled_env_opt(p, "TRIPWIRE_CALLBACK_TOKEN"),
            timeout_secs: profiled_env_u64(p, "TRIPWIRE_CALLBACK_TIMEOUT_SECS", 10),
            max_retries: profiled_env_u32(p, "TRIPWIRE_CALLBACK_MAX_RETRIES", 5),
            initial_backoff_ms: profiled_env_u64(p, "TRIPWIRE_CALLBACK_INITIAL_BACKOFF_MS", 5),
            max_backoff_ms: profiled_env_u64(p, "TRIPWIRE_CALLBACK_MAX_BACKOFF_MS", 500),
        }
    }
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            default_callback_url: None,
            auth_token: None,
            timeout_secs: 10,
            max_retries: 5,
            initial_backoff_ms: 5,
            max_backoff_ms: 500,
        }
    }
}
