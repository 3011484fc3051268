//! CLI argument definitions for the Sieve application.
//!
//! Priority resolution: CLI args > env vars > config file > defaults.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use sieve_core::config::SieveConfig;

/// Sieve: runs an LLM agent with every proposed action checked against your request.
#[derive(Parser, Debug)]
#[command(name = "sieve", version, about)]
pub struct CliArgs {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config", global = true)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level", global = true)]
    pub log_level: Option<String>,

    /// Maximum planning steps per run.
    #[arg(long = "max-steps", global = true)]
    pub max_steps: Option<u32>,

    /// Approve every action that needs confirmation without asking.
    #[arg(long = "yes", global = true, conflicts_with = "no")]
    pub yes: bool,

    /// Deny every action that needs confirmation without asking.
    #[arg(long = "no", global = true)]
    pub no: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum Command {
    /// Run one request against the configured Ollama planner and guard.
    Run {
        /// The request, e.g. "Read requirements.txt".
        query: String,
    },
    /// Run the built-in scenarios offline with a scripted planner.
    Demo,
}

impl CliArgs {
    /// Resolve the configuration file path.
    ///
    /// Priority: --config flag > SIEVE_CONFIG env var > ~/.sieve/config.toml.
    pub fn resolve_config_path(&self) -> PathBuf {
        if let Some(ref p) = self.config {
            return p.clone();
        }
        if let Ok(p) = std::env::var("SIEVE_CONFIG") {
            return PathBuf::from(p);
        }
        default_config_path()
    }

    /// Resolve the log level: --log-level flag > config file value.
    pub fn resolve_log_level(&self, config: &SieveConfig) -> String {
        self.log_level
            .clone()
            .unwrap_or_else(|| config.general.log_level.clone())
    }

    /// Apply flag overrides to a loaded configuration.
    pub fn apply_overrides(&self, config: &mut SieveConfig) {
        if let Some(level) = &self.log_level {
            config.general.log_level = level.clone();
        }
        if let Some(max_steps) = self.max_steps {
            config.orchestrator.max_steps = max_steps;
        }
    }

    /// Fixed confirmation answer requested on the command line, if any.
    pub fn gate_override(&self) -> Option<bool> {
        match (self.yes, self.no) {
            (true, _) => Some(true),
            (_, true) => Some(false),
            _ => None,
        }
    }
}

/// Default config file path for the current platform.
fn default_config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    if let Ok(home) = std::env::var("USERPROFILE") {
        return PathBuf::from(home).join(".sieve").join("config.toml");
    }
    #[cfg(not(target_os = "windows"))]
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".sieve").join("config.toml");
    }
    PathBuf::from("config.toml")
}
