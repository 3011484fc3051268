//! Error types for actions, planners and the orchestration loop.

use crate::state::Phase;

/// Errors from action lookup and handler execution.
#[derive(Debug, thiserror::Error)]
pub enum ActionError {
    #[error("Action not registered: {0}")]
    NotFound(String),
    #[error("Action already registered: {0}")]
    Duplicate(String),
    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),
    #[error("Action handler failed: {0}")]
    HandlerFailed(String),
}

/// Errors from a planner backend.
#[derive(Debug, thiserror::Error)]
pub enum PlannerError {
    #[error("planner unavailable: {0}")]
    Unavailable(String),
    #[error("planner returned an invalid response: {0}")]
    InvalidResponse(String),
    #[error("planner script exhausted after {0} calls")]
    Exhausted(usize),
}

/// Errors that abort a run. Denials and tool failures are not errors; they
/// end up in the transcript and on the run outcome instead.
#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    #[error("planner failed: {0}")]
    Planner(#[from] PlannerError),
    #[error("Invalid phase transition: {0} -> {1}")]
    InvalidTransition(Phase, Phase),
    #[error("empty user request")]
    EmptyRequest,
}
