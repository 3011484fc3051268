use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{Result, SieveError};

/// Top-level configuration for the Sieve application.
///
/// Loaded from `~/.sieve/config.toml` by default. Each section corresponds
/// to one component of the mediation pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SieveConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub sieve: PolicyConfig,
    #[serde(default)]
    pub guard: GuardConfig,
    #[serde(default)]
    pub planner: PlannerConfig,
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
    #[serde(default)]
    pub actions: ActionsConfig,
}

impl SieveConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read or parsed, or if the
    /// parsed values are out of range.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: SieveConfig = toml::from_str(&content)?;
        config.validate()?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }

    /// Reject settings that would make the pipeline unsafe or unbounded.
    pub fn validate(&self) -> Result<()> {
        if self.orchestrator.max_steps == 0 {
            return Err(SieveError::Config(
                "orchestrator.max_steps must be at least 1".to_string(),
            ));
        }
        if normalize_keywords(&self.sieve.destructive_keywords).is_empty()
            && normalize_keywords(&self.sieve.destructive_actions).is_empty()
        {
            return Err(SieveError::Config(
                "sieve needs at least one destructive keyword or action name".to_string(),
            ));
        }
        if self.guard.timeout_secs == 0 {
            return Err(SieveError::Config(
                "guard.timeout_secs must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

/// Which proposals are sent to the guard classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GuardPolicy {
    /// Every proposal, to catch indirect prompt injection on benign-looking actions.
    #[default]
    All,
    /// Only proposals the symbolic layer classifies as destructive.
    DestructiveOnly,
}

/// Intent sieve (symbolic layer and guard routing) settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// Substrings of an action name that mark it destructive (case-insensitive).
    pub destructive_keywords: Vec<String>,
    /// Exact action names that are always destructive.
    pub destructive_actions: Vec<String>,
    /// Words in the user's intent that authorize a destructive action.
    pub authorization_keywords: Vec<String>,
    /// Whether the guard sees every proposal or only destructive ones.
    pub guard_policy: GuardPolicy,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            destructive_keywords: vec!["delete".into(), "remove".into(), "clear".into()],
            destructive_actions: Vec::new(),
            authorization_keywords: vec!["delete".into(), "remove".into(), "clean".into()],
            guard_policy: GuardPolicy::All,
        }
    }
}

/// Trim and lowercase keyword entries, dropping blank ones.
///
/// The symbolic layer matches against exactly this list, so validation must
/// look at it too: `[" "]` is an empty predicate, not a one-word one.
pub fn normalize_keywords(words: &[String]) -> Vec<String> {
    words
        .iter()
        .map(|w| w.trim().to_lowercase())
        .filter(|w| !w.is_empty())
        .collect()
}

/// Guard classifier endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GuardConfig {
    /// Base URL of the Ollama server hosting the guard model.
    pub endpoint: String,
    pub model: String,
    /// Request timeout; an expired request counts as "classifier unavailable".
    pub timeout_secs: u64,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:11434".to_string(),
            model: "llama-guard3:8b".to_string(),
            timeout_secs: 30,
        }
    }
}

/// Default system prompt given to the planner.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a secure agentic assistant. \
If the Intent Sieve blocks one of your actions, stop calling tools and explain \
the security violation to the user.";

/// Planner model settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    pub endpoint: String,
    pub model: String,
    pub temperature: f32,
    pub system_prompt: String,
    pub timeout_secs: u64,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:11434".to_string(),
            model: "llama3.1:8b".to_string(),
            temperature: 0.0,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            timeout_secs: 120,
        }
    }
}

/// What happens to the rest of a step after one proposal is denied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockPolicy {
    /// Skip every remaining proposal in the step.
    #[default]
    FailFast,
    /// Route the remaining proposals of the step, then stop.
    Continue,
}

/// Default instruction appended when a run stops early.
pub const DEFAULT_EXPLAIN_PROMPT: &str = "The previous action was not completed. \
It was blocked by the Intent Sieve or failed. Explain exactly why, based on my \
original request, and do not call any more tools.";

/// Orchestration loop settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Maximum planning steps before the run is forced to explain and stop.
    pub max_steps: u32,
    pub block_policy: BlockPolicy,
    /// Seconds to wait for a human decision; 0 waits forever.
    pub human_timeout_secs: u64,
    pub explain_prompt: String,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_steps: 5,
            block_policy: BlockPolicy::FailFast,
            human_timeout_secs: 300,
            explain_prompt: DEFAULT_EXPLAIN_PROMPT.to_string(),
        }
    }
}

/// Built-in action settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ActionsConfig {
    /// Directory `read_file` is confined to.
    pub workspace_root: String,
}

impl Default for ActionsConfig {
    fn default() -> Self {
        Self {
            workspace_root: ".".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_default_config() {
        let config = SieveConfig::default();
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.orchestrator.max_steps, 5);
        assert_eq!(config.orchestrator.block_policy, BlockPolicy::FailFast);
        assert_eq!(config.sieve.guard_policy, GuardPolicy::All);
        assert_eq!(
            config.sieve.destructive_keywords,
            vec!["delete", "remove", "clear"]
        );
        assert_eq!(
            config.sieve.authorization_keywords,
            vec!["delete", "remove", "clean"]
        );
        assert_eq!(config.guard.model, "llama-guard3:8b");
        assert_eq!(config.planner.model, "llama3.1:8b");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_valid_config() {
        let content = r#"
[general]
log_level = "debug"

[sieve]
destructive_keywords = ["drop", "wipe"]
authorization_keywords = ["wipe"]
guard_policy = "destructive_only"

[orchestrator]
max_steps = 3
block_policy = "continue"
human_timeout_secs = 0
"#;
        let file = create_temp_config(content);
        let config = SieveConfig::load(file.path()).unwrap();
        assert_eq!(config.general.log_level, "debug");
        assert_eq!(config.sieve.destructive_keywords, vec!["drop", "wipe"]);
        assert_eq!(config.sieve.guard_policy, GuardPolicy::DestructiveOnly);
        assert_eq!(config.orchestrator.max_steps, 3);
        assert_eq!(config.orchestrator.block_policy, BlockPolicy::Continue);
        assert_eq!(config.orchestrator.human_timeout_secs, 0);
        // Unspecified fields fall back to defaults
        assert_eq!(config.orchestrator.explain_prompt, DEFAULT_EXPLAIN_PROMPT);
        assert_eq!(config.guard.timeout_secs, 30);
    }

    #[test]
    fn test_load_partial_config_uses_defaults() {
        let file = create_temp_config("[guard]\nmodel = \"custom-guard\"\n");
        let config = SieveConfig::load(file.path()).unwrap();
        assert_eq!(config.guard.model, "custom-guard");
        assert_eq!(config.guard.endpoint, "http://localhost:11434");
        assert_eq!(config.orchestrator.max_steps, 5);
    }

    #[test]
    fn test_load_rejects_zero_steps() {
        let file = create_temp_config("[orchestrator]\nmax_steps = 0\n");
        let err = SieveConfig::load(file.path()).unwrap_err();
        assert!(matches!(err, SieveError::Config(_)));
        assert!(err.to_string().contains("max_steps"));
    }

    #[test]
    fn test_load_rejects_empty_destructive_predicate() {
        let file = create_temp_config("[sieve]\ndestructive_keywords = []\n");
        assert!(SieveConfig::load(file.path()).is_err());
    }

    #[test]
    fn test_load_rejects_blank_destructive_predicate() {
        let file = create_temp_config(
            "[sieve]\ndestructive_keywords = [\" \", \"\"]\ndestructive_actions = [\"\\t\"]\nguard_policy = \"destructive_only\"\n",
        );
        let err = SieveConfig::load(file.path()).unwrap_err();
        assert!(matches!(err, SieveError::Config(_)));
        assert!(err.to_string().contains("destructive"));
    }

    #[test]
    fn test_blank_entries_beside_a_real_keyword_are_accepted() {
        let file = create_temp_config("[sieve]\ndestructive_keywords = [\" \", \"Wipe \"]\n");
        let config = SieveConfig::load(file.path()).unwrap();
        assert_eq!(
            normalize_keywords(&config.sieve.destructive_keywords),
            vec!["wipe"]
        );
    }

    #[test]
    fn test_load_rejects_unknown_policy() {
        let file = create_temp_config("[sieve]\nguard_policy = \"sometimes\"\n");
        assert!(matches!(
            SieveConfig::load(file.path()),
            Err(SieveError::Config(_))
        ));
    }

    #[test]
    fn test_load_missing_file() {
        let result = SieveConfig::load(Path::new("/nonexistent/sieve/config.toml"));
        assert!(matches!(result, Err(SieveError::Io(_))));
    }

    #[test]
    fn test_load_or_default_falls_back() {
        let config = SieveConfig::load_or_default(Path::new("/nonexistent/sieve/config.toml"));
        assert_eq!(config.orchestrator.max_steps, 5);
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let mut config = SieveConfig::default();
        config.orchestrator.max_steps = 7;
        config.sieve.destructive_actions = vec!["format_disk".into()];
        config.save(&path).unwrap();

        let reloaded = SieveConfig::load(&path).unwrap();
        assert_eq!(reloaded.orchestrator.max_steps, 7);
        assert_eq!(reloaded.sieve.destructive_actions, vec!["format_disk"]);
    }
}
