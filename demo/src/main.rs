//! Tandem runtime demo CLI.
//!
//! Drives the approval engine and the orchestrator with scripted
//! collaborators, so every run is deterministic and needs no network.
//!
//! Usage:
//!   cargo run -p demo -- decide --action execute --target "rm -rf /"
//!   cargo run -p demo -- decide --action execute --target "docker compose up" --verdict fail
//!   cargo run -p demo -- run --task "Validate request bodies" --approve-on 2

mod script;

use std::{path::PathBuf, sync::Arc};

use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use tandem_audit::InMemoryAuditWriter;
use tandem_contracts::{
    approval::{ActionKind, ApprovalRequest},
    error::{TandemError, TandemResult},
    orchestration::{IterationUpdate, RunOutcome},
};
use tandem_core::{changes::extract_file_changes, Orchestrator, OrchestratorConfig};
use tandem_policy::{ApprovalEngine, PolicyConfig};

use script::Verdict;

// ── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "demo",
    about = "Tandem runtime demo",
    long_about = "Exercises the approval engine and the planner/implementer loop\n\
                  with scripted backends and a scripted adjudicator."
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Decide one approval request and print the decision as JSON.
    Decide {
        /// read, write, execute, browse, or delete.
        #[arg(long)]
        action: ActionKind,
        /// File path, command, or URL.
        #[arg(long)]
        target: String,
        #[arg(long, default_value = "")]
        context: String,
        /// TOML file with extra `deny` / `allow` patterns.
        #[arg(long)]
        policy: Option<PathBuf>,
        /// Scripted adjudicator answer for requests no matcher covers.
        #[arg(long, value_enum, default_value = "allow")]
        verdict: Verdict,
        /// Also print the audit trail as JSON lines.
        #[arg(long)]
        show_audit: bool,
    },
    /// Run the refinement loop and print every update as JSON.
    Run {
        #[arg(long)]
        task: String,
        #[arg(long, default_value = "")]
        context: String,
        /// Orchestrator TOML configuration.
        #[arg(long)]
        config: Option<PathBuf>,
        /// Pass on which the scripted reviewer approves; 0 never approves.
        #[arg(long, default_value_t = 2)]
        approve_on: u32,
    },
}

// ── Entry point ───────────────────────────────────────────────────────────────

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Command::Decide {
            action,
            target,
            context,
            policy,
            verdict,
            show_audit,
        } => decide(action, &target, &context, policy, verdict, show_audit),
        Command::Run {
            task,
            context,
            config,
            approve_on,
        } => run(&task, &context, config, approve_on),
    };

    if let Err(e) = result {
        eprintln!("Demo error: {}", e);
        std::process::exit(1);
    }
}

// ── decide ────────────────────────────────────────────────────────────────────

fn decide(
    action: ActionKind,
    target: &str,
    context: &str,
    policy: Option<PathBuf>,
    verdict: Verdict,
    show_audit: bool,
) -> TandemResult<()> {
    let policy = match policy {
        Some(path) => PolicyConfig::from_file(&path)?,
        None => PolicyConfig::default(),
    };
    let trail = InMemoryAuditWriter::new("demo-decide");
    let engine = ApprovalEngine::with_defaults(&policy, Box::new(script::adjudicator(verdict)))?
        .with_audit(Box::new(trail.clone()));

    let decision = engine.decide(&ApprovalRequest::new(action, target, context));
    println!("{}", to_json(&decision)?);

    if show_audit {
        let log = trail.export_log();
        print!("{}", log.to_jsonl().map_err(json_error)?);
        info!(
            entries = log.entries.len(),
            intact = trail.verify_integrity(),
            "audit trail exported"
        );
    }
    Ok(())
}

// ── run ───────────────────────────────────────────────────────────────────────

fn run(task: &str, context: &str, config: Option<PathBuf>, approve_on: u32) -> TandemResult<()> {
    let config = match config {
        Some(path) => OrchestratorConfig::from_file(&path)?,
        None => OrchestratorConfig::default(),
    };
    let passes = config.effective_max_iterations();

    let engine = ApprovalEngine::with_defaults(
        &PolicyConfig::default(),
        Box::new(script::adjudicator(Verdict::Allow)),
    )?;
    let orchestrator = Orchestrator::new(
        &config,
        Box::new(script::planner(passes, approve_on)),
        Box::new(script::implementer(passes)),
    )
    .with_approval_gate(Arc::new(engine))
    .with_advisor(Box::new(script::advisor()));

    let mut failed: Option<TandemError> = None;
    let outcome = orchestrator.run(task, context, |update: IterationUpdate| {
        if failed.is_some() {
            return;
        }
        match to_json(&update) {
            Ok(line) => println!("{line}"),
            Err(e) => failed = Some(e),
        }
    })?;
    if let Some(e) = failed {
        return Err(e);
    }

    match &outcome {
        RunOutcome::Complete { iterations, .. } => {
            eprintln!("Approved after {iterations} iteration(s).");
        }
        RunOutcome::MaxIterationsReached { iterations, .. } => {
            eprintln!("No approval within {iterations} iteration(s).");
        }
        RunOutcome::Cancelled { .. } => eprintln!("Run cancelled."),
    }

    let implementation = outcome.state().implementation.clone().unwrap_or_default();
    for change in extract_file_changes(&implementation) {
        let decision = orchestrator.request_approval(
            ActionKind::Write,
            &change.path,
            "apply the final implementation",
        );
        eprintln!(
            "write {} -> {} ({})",
            change.path,
            if decision.allow { "allowed" } else { "denied" },
            decision.reasoning
        );
    }
    Ok(())
}

// ── Helpers ───────────────────────────────────────────────────────────────────

fn to_json<T: serde::Serialize>(value: &T) -> TandemResult<String> {
    serde_json::to_string(value).map_err(json_error)
}

fn json_error(e: serde_json::Error) -> TandemError {
    TandemError::ConfigError {
        reason: format!("failed to serialize output: {}", e),
    }
}
