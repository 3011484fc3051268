use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Top-level error type for the Sieve system.
///
/// Subsystem crates define their own error types and implement
/// `From<SieveError>` where they need to carry configuration or I/O failures
/// across crate boundaries.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SieveError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<toml::de::Error> for SieveError {
    fn from(err: toml::de::Error) -> Self {
        SieveError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for SieveError {
    fn from(err: toml::ser::Error) -> Self {
        SieveError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for SieveError {
    fn from(err: serde_json::Error) -> Self {
        SieveError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for Sieve operations.
pub type Result<T> = std::result::Result<T, SieveError>;

/// Why a proposal (or the whole run) did not complete.
///
/// These are never returned as `Err` from a run. They are written into the
/// transcript as feedback and collected on the run outcome, so a denial is
/// always visible to both the planner and the operator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StopReason {
    /// Symbolic or neural layer rejected the action.
    #[error("action '{action}' was blocked by the intent sieve: {reason}")]
    ValidationBlocked { action: String, reason: String },

    /// The proposal needed confirmation and the human said no (or never answered).
    #[error("action '{action}' was not confirmed: {reason}")]
    ValidationReviewRejected { action: String, reason: String },

    /// The guard classifier could not be reached; the sieve failed closed.
    #[error("action '{action}' was blocked because the safety classifier is unavailable: {reason}")]
    ClassifierUnavailable { action: String, reason: String },

    #[error("action '{action}' is not registered")]
    ToolNotFound { action: String },

    #[error("action '{action}' failed: {message}")]
    ToolExecutionError { action: String, message: String },

    #[error("step budget of {max_steps} planning steps exhausted")]
    StepBudgetExceeded { max_steps: u32 },
}

impl StopReason {
    /// Stable machine-readable code, used in log fields and feedback tags.
    pub fn code(&self) -> &'static str {
        match self {
            StopReason::ValidationBlocked { .. } => "validation_blocked",
            StopReason::ValidationReviewRejected { .. } => "validation_review_rejected",
            StopReason::ClassifierUnavailable { .. } => "classifier_unavailable",
            StopReason::ToolNotFound { .. } => "tool_not_found",
            StopReason::ToolExecutionError { .. } => "tool_execution_error",
            StopReason::StepBudgetExceeded { .. } => "step_budget_exceeded",
        }
    }

    /// The action this reason refers to, if any.
    pub fn action(&self) -> Option<&str> {
        match self {
            StopReason::ValidationBlocked { action, .. }
            | StopReason::ValidationReviewRejected { action, .. }
            | StopReason::ClassifierUnavailable { action, .. }
            | StopReason::ToolNotFound { action }
            | StopReason::ToolExecutionError { action, .. } => Some(action),
            StopReason::StepBudgetExceeded { .. } => None,
        }
    }

    /// True for denials made by the security layers (including a human "no").
    ///
    /// Infrastructure outages and tool failures are not security denials.
    pub fn is_security_denial(&self) -> bool {
        matches!(
            self,
            StopReason::ValidationBlocked { .. } | StopReason::ValidationReviewRejected { .. }
        )
    }
}
