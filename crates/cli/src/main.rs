mod cli;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use serde::Serialize;
use tracing::{info, warn};

use tripwire_core::{Config, CorrelationId, ItemSubmission};
use tripwire_notify::WebhookActionPublisher;
use tripwire_rules::aggregation::{AggregationsService, InMemoryCounterStore};
use tripwire_rules::context::RuleInput;
use tripwire_rules::engine::actions::TriggeredAction;
use tripwire_rules::engine::{RuleEngine, RuleEngineDeps};
use tripwire_rules::execution_log::{ExecutionLog, ExecutionQuery};
use tripwire_rules::loader::{LoadStatus, RuleLoader};
use tripwire_rules::memory::{InMemoryRuleRepository, RecordingActionPublisher};
use tripwire_rules::schema::{DocumentKind, RuleDocument, RuleEnvironment};
use tripwire_rules::services::{
    ActionLimitRecorder, ActionPublisher, NoDerivedFields, RuleExecutionRecord, RuleSource,
};
use tripwire_rules::signals::BuiltinSignalRunner;
use tripwire_rules::validation::{validate_documents, ValidationError, ValidationResult};

use crate::cli::{CliArgs, Command};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    tripwire_core::config::load_dotenv();
    let args = CliArgs::parse();
    let config = match &args.profile {
        Some(profile) => Config::for_profile(profile),
        None => Config::from_env(),
    };
    config.log_summary();

    match args.command {
        Command::Evaluate {
            item,
            rules_dir,
            environment,
            deliver,
            correlation_id,
        } => {
            let rules_dir = rules_dir.unwrap_or_else(|| config.engine.rules_dir.clone());
            let report = evaluate(&config, &rules_dir, &item, environment, deliver, correlation_id).await?;
            print_json(&report)
        }
        Command::Validate { rules_dir, watch } => {
            let rules_dir = rules_dir.unwrap_or_else(|| config.engine.rules_dir.clone());
            let (mut loader, failures) = load_rules(&rules_dir)?;
            let report = validate(&loader, failures);
            print_json(&report)?;
            if watch || config.engine.watch_rules {
                return watch_rules(&mut loader).await;
            }
            if !report.valid {
                bail!("{} has {} invalid document(s)", rules_dir.display(), report.errors.len());
            }
            Ok(())
        }
        Command::Config => print_json(&config.redacted_summary()),
    }
}

fn print_json(value: &impl Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Load every document under `rules_dir` into a fresh repository.
fn load_rules(rules_dir: &Path) -> Result<(RuleLoader, Vec<(PathBuf, String)>)> {
    if !rules_dir.is_dir() {
        bail!("rules directory {} does not exist", rules_dir.display());
    }
    let loader = RuleLoader::new(rules_dir.to_path_buf(), Arc::new(InMemoryRuleRepository::new()));
    let results = loader
        .load_all()
        .with_context(|| format!("failed to scan {}", rules_dir.display()))?;

    let failures: Vec<(PathBuf, String)> = results
        .into_iter()
        .filter_map(|r| match r.status {
            LoadStatus::Failed { error } => Some((r.path, error)),
            _ => None,
        })
        .collect();
    for (path, error) in &failures {
        warn!(path = %path.display(), error = %error, "document failed to load");
    }
    Ok((loader, failures))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EvaluationReport {
    correlation_id: String,
    environment: RuleEnvironment,
    delivered: bool,
    actions: Vec<TriggeredAction>,
    executions: Vec<RuleExecutionRecord>,
}

async fn evaluate(
    config: &Config,
    rules_dir: &Path,
    item_path: &Path,
    environment: RuleEnvironment,
    deliver: bool,
    correlation_id: Option<String>,
) -> Result<EvaluationReport> {
    let (loader, _) = load_rules(rules_dir)?;
    let repo = loader.repository();

    let raw = std::fs::read_to_string(item_path)
        .with_context(|| format!("failed to read {}", item_path.display()))?;
    let submission = ItemSubmission::from_json(&raw)
        .with_context(|| format!("failed to parse {}", item_path.display()))?;

    let correlation_id = match correlation_id {
        Some(raw) => raw.parse::<CorrelationId>()?,
        None => CorrelationId::generate("cli"),
    };

    let publisher: Arc<dyn ActionPublisher> = if deliver {
        Arc::new(WebhookActionPublisher::from_config(&config.publisher).context("failed to build webhook publisher")?)
    } else {
        Arc::new(RecordingActionPublisher::new())
    };
    let log = ExecutionLog::with_capacity(config.engine.execution_log_capacity as usize);

    let engine = RuleEngine::new(RuleEngineDeps {
        rules: repo.clone() as Arc<dyn RuleSource>,
        actions: repo.clone(),
        policies: repo.clone(),
        limits: repo.clone() as Arc<dyn ActionLimitRecorder>,
        publisher,
        execution_logger: Arc::new(log.clone()),
        signals: Arc::new(BuiltinSignalRunner::new(config.engine.default_signal_cost)),
        derived_fields: Arc::new(NoDerivedFields),
        aggregations: Arc::new(AggregationsService::new(Arc::new(InMemoryCounterStore::new()))),
    });

    info!(
        item_id = %submission.item_id,
        item_type = %submission.item_type.id,
        %environment,
        correlation_id = %correlation_id,
        "evaluating item"
    );

    let actions = if environment == RuleEnvironment::Live {
        let run = engine
            .run_enabled_rules(submission, correlation_id.clone(), true)
            .await?;
        run.actions_triggered.wait().await?
    } else {
        let rules = repo
            .get_enabled_rules_for_item_type(&submission.item_type.id)
            .await?
            .unwrap_or_default();
        let org_id = submission.org_id().to_string();
        let ctx = Arc::new(engine.make_evaluation_context(org_id, RuleInput::Submission(submission)));
        engine
            .run_rule_set(&rules, &ctx, environment, &correlation_id, true)
            .await?
            .actions
    };

    let executions = loader
        .documents()
        .iter()
        .filter(|doc| doc.kind() == DocumentKind::Rule)
        .flat_map(|doc| log.query(&doc.metadata().id, &ExecutionQuery::default()))
        .collect();

    Ok(EvaluationReport {
        correlation_id: correlation_id.to_string(),
        environment,
        delivered: deliver && environment.runs_actions(),
        actions,
        executions,
    })
}

fn validate(loader: &RuleLoader, failures: Vec<(PathBuf, String)>) -> ValidationResult {
    let mut result = validate_documents(&loader.documents());
    for (path, message) in failures {
        result.valid = false;
        result.errors.push(ValidationError {
            path: path.display().to_string(),
            message,
            suggestion: None,
        });
    }
    result
}

/// Hot-reload the directory and print a fresh report whenever the loaded
/// document set changes. Runs until interrupted.
async fn watch_rules(loader: &mut RuleLoader) -> Result<()> {
    loader.watch().context("failed to watch rules directory")?;
    info!("watching for rule changes, press Ctrl-C to stop");

    let mut last = loader.documents();
    let mut ticker = tokio::time::interval(Duration::from_millis(500));
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let current = loader.documents();
                if !same_documents(&last, &current) {
                    print_json(&validate(loader, Vec::new()))?;
                    last = current;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("stopped watching");
                return Ok(());
            }
        }
    }
}

fn same_documents(a: &[RuleDocument], b: &[RuleDocument]) -> bool {
    a.len() == b.len() && a.iter().all(|doc| b.contains(doc))
}
