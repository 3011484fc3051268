//! Sieve application binary - composition root.
//!
//! 1. Parse CLI flags and load configuration from TOML
//! 2. Initialize tracing
//! 3. Build the action catalog, intent sieve, planner and human gate
//! 4. Run one request (or the offline demo) and print the outcome

mod cli;
mod demo;

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;

use sieve_action::{ActionCatalog, ConsoleGate, FixedGate, HumanGate, Orchestrator};
use sieve_core::config::SieveConfig;
use sieve_ollama::{OllamaGuard, OllamaPlanner};
use sieve_policy::IntentSieve;

use crate::cli::{CliArgs, Command};

async fn run_query(
    config: &SieveConfig,
    query: &str,
    approve: Option<bool>,
) -> Result<(), Box<dyn std::error::Error>> {
    let catalog = Arc::new(ActionCatalog::with_defaults(&config.actions)?);
    tracing::info!(actions = catalog.len(), "Action catalog ready");

    let guard = Arc::new(OllamaGuard::new(&config.guard)?);
    let sieve = IntentSieve::new(&config.sieve, guard)
        .with_guard_timeout(Duration::from_secs(config.guard.timeout_secs));
    tracing::info!(
        model = %config.guard.model,
        policy = ?config.sieve.guard_policy,
        "Intent sieve ready"
    );

    let planner = Arc::new(OllamaPlanner::new(&config.planner, &catalog)?);
    tracing::info!(model = %config.planner.model, "Planner ready");

    let gate: Arc<dyn HumanGate> = match approve {
        Some(true) => Arc::new(FixedGate::approve_all()),
        Some(false) => Arc::new(FixedGate::deny_all()),
        None => Arc::new(ConsoleGate),
    };

    let orchestrator = Orchestrator::new(
        planner,
        Arc::new(sieve),
        catalog,
        gate,
        config.orchestrator.clone(),
    )
    .with_system_prompt(config.planner.system_prompt.clone());

    let outcome = orchestrator.run(query).await?;
    demo::print_outcome(&outcome);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    // Config. A missing file means defaults; a broken one is fatal.
    let config_file = args.resolve_config_path();
    let mut config = if config_file.exists() {
        SieveConfig::load(&config_file)?
    } else {
        SieveConfig::default()
    };
    args.apply_overrides(&mut config);
    config.validate()?;

    // Tracing.
    let log_level = args.resolve_log_level(&config);
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("Starting Sieve v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        path = %config_file.display(),
        found = config_file.exists(),
        max_steps = config.orchestrator.max_steps,
        block_policy = ?config.orchestrator.block_policy,
        "Configuration loaded"
    );

    match &args.command {
        Command::Run { query } => run_query(&config, query, args.gate_override()).await,
        Command::Demo => demo::run_demo(&config, args.gate_override()).await,
    }
}
