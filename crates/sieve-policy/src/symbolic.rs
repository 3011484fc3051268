//! Layer 1: symbolic intent and argument matching.
//!
//! A proposal is *destructive* when its action name contains one of the
//! configured keywords or is listed explicitly. A destructive proposal passes
//! only if the user's intent carries an authorization keyword and every
//! argument is backed by the intent text.
//!
//! The check is a heuristic, tuned to over-block: a legitimate request phrased
//! without the expected keywords is denied, while a destructive action whose
//! target the user never mentioned should never slip through.

use sieve_core::config::{normalize_keywords, PolicyConfig};
use sieve_core::types::ActionProposal;

/// Characters that mark a token as a concrete target (file, path, URL, identifier).
const TARGET_MARKERS: &[char] = &['.', '/', '\\', '_', ':', '@'];

/// Punctuation stripped from the edges of a token before matching.
const TOKEN_EDGE_PUNCTUATION: &[char] = &['"', '\'', '(', ')', ',', ';', '`', '[', ']'];

/// Plain words a target-backed value may carry that the intent never used.
const MAX_UNBACKED_WORDS: usize = 3;

/// Outcome of the symbolic layer for one proposal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SymbolicCheck {
    /// Not destructive; the symbolic layer has no objection.
    NonDestructive,
    /// Destructive, but the intent authorizes it and names its targets.
    DestructiveAuthorized,
    /// Destructive and not backed by the intent.
    Drift { detail: String },
}

impl SymbolicCheck {
    pub fn is_destructive(&self) -> bool {
        !matches!(self, SymbolicCheck::NonDestructive)
    }
}

/// Keyword-driven destructive-action predicate and drift check.
#[derive(Debug, Clone)]
pub struct SymbolicLayer {
    destructive_keywords: Vec<String>,
    destructive_actions: Vec<String>,
    authorization_keywords: Vec<String>,
}

impl SymbolicLayer {
    /// Build the layer from config. All keywords are matched case-insensitively.
    pub fn new(config: &PolicyConfig) -> Self {
        Self {
            destructive_keywords: normalize_keywords(&config.destructive_keywords),
            destructive_actions: normalize_keywords(&config.destructive_actions),
            authorization_keywords: normalize_keywords(&config.authorization_keywords),
        }
    }

    /// Whether an action name is destructive.
    pub fn is_destructive(&self, action: &str) -> bool {
        let action = action.to_lowercase();
        self.destructive_actions.iter().any(|a| *a == action)
            || self
                .destructive_keywords
                .iter()
                .any(|k| action.contains(k.as_str()))
    }

    /// Whether the intent contains any authorization keyword.
    pub fn intent_authorizes(&self, intent: &str) -> bool {
        let intent = intent.to_lowercase();
        self.authorization_keywords
            .iter()
            .any(|k| intent.contains(k.as_str()))
    }

    /// Check every argument value against the intent.
    ///
    /// Returns the first value that is not backed by the intent.
    pub fn unbacked_argument(&self, intent: &str, proposal: &ActionProposal) -> Option<String> {
        let intent = intent.to_lowercase();
        proposal
            .arg_texts()
            .find(|value| !argument_backed_by(&intent, &value.to_lowercase()))
    }

    /// Run the full layer-1 check.
    pub fn check(&self, intent: &str, proposal: &ActionProposal) -> SymbolicCheck {
        if !self.is_destructive(&proposal.name) {
            return SymbolicCheck::NonDestructive;
        }

        if !self.intent_authorizes(intent) {
            return SymbolicCheck::Drift {
                detail: format!(
                    "destructive action '{}' was not requested by the user",
                    proposal.name
                ),
            };
        }

        if let Some(value) = self.unbacked_argument(intent, proposal) {
            return SymbolicCheck::Drift {
                detail: format!(
                    "target '{}' of action '{}' does not appear in the user's request",
                    value, proposal.name
                ),
            };
        }

        SymbolicCheck::DestructiveAuthorized
    }
}

/// A value is backed if it occurs verbatim in the intent, or if it contains
/// target-like tokens, every one of them occurs in the intent, and at most
/// [`MAX_UNBACKED_WORDS`] of its remaining words are missing from the intent.
///
/// Both inputs must already be lowercase.
fn argument_backed_by(intent: &str, value: &str) -> bool {
    if intent.contains(value) {
        return true;
    }

    let (targets, words): (Vec<&str>, Vec<&str>) = value
        .split_whitespace()
        .map(|t| {
            t.trim_matches(TOKEN_EDGE_PUNCTUATION)
                .trim_end_matches(['.', ':'])
        })
        .filter(|t| !t.is_empty())
        .partition(|t| t.contains(TARGET_MARKERS));

    if targets.is_empty() || !targets.iter().all(|t| intent.contains(t)) {
        return false;
    }
    words.iter().filter(|w| !intent.contains(*w)).count() <= MAX_UNBACKED_WORDS
}
