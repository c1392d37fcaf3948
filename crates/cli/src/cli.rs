use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tripwire_rules::schema::RuleEnvironment;

/// Rule evaluation and action dispatch for content moderation.
///
/// Loads Rule, Action and Policy documents from a directory and runs item
/// submissions through them.
#[derive(Parser, Debug)]
#[command(name = "tripwire", version, about)]
pub struct CliArgs {
    /// Configuration profile (keys resolve as `{PROFILE}_{KEY}` first).
    #[arg(long, env = "TRIPWIRE_PROFILE", global = true)]
    pub profile: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run one item submission through the enabled rules for its item type.
    Evaluate {
        /// Path to an item submission JSON file.
        item: PathBuf,

        /// Rules directory (overrides TRIPWIRE_RULES_DIR).
        #[arg(long)]
        rules_dir: Option<PathBuf>,

        /// LIVE runs the live and background sets; any other environment runs
        /// every enabled rule in that environment.
        #[arg(long, default_value = "LIVE", value_parser = parse_environment)]
        environment: RuleEnvironment,

        /// POST triggered actions to their callback URLs instead of only reporting them.
        #[arg(long)]
        deliver: bool,

        /// Correlation id as `{source}:{id}`; generated when absent.
        #[arg(long)]
        correlation_id: Option<String>,
    },

    /// Check every document in a rules directory, alone and as a set.
    Validate {
        /// Rules directory (overrides TRIPWIRE_RULES_DIR).
        #[arg(long)]
        rules_dir: Option<PathBuf>,

        /// Keep running and re-validate whenever the directory changes
        /// (defaults to TRIPWIRE_WATCH_RULES).
        #[arg(long)]
        watch: bool,
    },

    /// Print the resolved configuration with secrets redacted.
    Config,
}

/// Accepts `live`, `LIVE`, `manual`, ...
fn parse_environment(raw: &str) -> Result<RuleEnvironment, String> {
    serde_json::from_value(serde_json::Value::String(raw.to_uppercase()))
        .map_err(|_| format!("unknown rule environment '{raw}'"))
}
