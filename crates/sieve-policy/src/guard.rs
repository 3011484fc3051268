//! Layer 2 boundary: the neural guard classifier contract.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use sieve_core::types::{ActionArgs, ActionProposal};

use crate::error::GuardError;

/// What the guard is asked to judge: the user's intent and one proposed action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuardRequest {
    pub intent: String,
    pub action: String,
    pub args: ActionArgs,
}

impl GuardRequest {
    pub fn new(intent: &str, proposal: &ActionProposal) -> Self {
        Self {
            intent: intent.to_string(),
            action: proposal.name.clone(),
            args: proposal.args.clone(),
        }
    }

    /// Structured prompt: "intent X proposes action Y with arguments Z".
    pub fn prompt(&self) -> String {
        format!(
            "User Intent: {}\nProposed Action: {}({})",
            self.intent,
            self.action,
            serde_json::Value::Object(self.args.clone())
        )
    }
}

/// The guard's label for a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "label", rename_all = "snake_case")]
pub enum GuardLabel {
    Safe,
    /// Unsafe, with whatever hazard categories the classifier reported.
    Unsafe { categories: Vec<String> },
}

impl GuardLabel {
    pub fn is_unsafe(&self) -> bool {
        matches!(self, GuardLabel::Unsafe { .. })
    }
}

/// A stateless safety classifier, safe to share across concurrent runs.
#[async_trait]
pub trait GuardClassifier: Send + Sync {
    /// Label a proposed action. Any error makes the sieve fail closed.
    async fn classify(&self, request: &GuardRequest) -> Result<GuardLabel, GuardError>;
}

/// Offline classifier that labels a proposal unsafe when any of its
/// argument values contains one of a fixed set of phrases.
///
/// Stands in for a model when none is reachable (demo runs, tests). The
/// phrases are matched case-insensitively.
#[derive(Debug, Clone)]
pub struct KeywordGuard {
    phrases: Vec<String>,
}

/// Category reported for keyword hits.
pub const KEYWORD_CATEGORY: &str = "keyword";

impl KeywordGuard {
    pub fn new<I, S>(phrases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            phrases: phrases
                .into_iter()
                .map(|p| p.as_ref().trim().to_lowercase())
                .filter(|p| !p.is_empty())
                .collect(),
        }
    }

    /// Phrases typical of injected instructions and system-path tampering.
    pub fn with_default_phrases() -> Self {
        Self::new([
            "system notice",
            "do not ask for confirmation",
            "ignore previous instructions",
            "rm -rf",
            "/etc/",
        ])
    }

    fn matched(&self, request: &GuardRequest) -> Option<&str> {
        request.args.values().find_map(|value| {
            let text = match value {
                serde_json::Value::String(s) => s.to_lowercase(),
                other => other.to_string().to_lowercase(),
            };
            self.phrases
                .iter()
                .find(|phrase| text.contains(phrase.as_str()))
                .map(|p| p.as_str())
        })
    }
}

#[async_trait]
impl GuardClassifier for KeywordGuard {
    async fn classify(&self, request: &GuardRequest) -> Result<GuardLabel, GuardError> {
        match self.matched(request) {
            Some(phrase) => {
                tracing::debug!(action = %request.action, phrase, "Keyword guard hit");
                Ok(GuardLabel::Unsafe {
                    categories: vec![KEYWORD_CATEGORY.to_string()],
                })
            }
            None => Ok(GuardLabel::Safe),
        }
    }
}
