//! Orchestration phases and per-run state.
//!
//! Allowed phase transitions:
//! Planning -> Validating | Explaining | Done
//! Validating -> Executing | AwaitingHuman | BlockedFeedback
//! AwaitingHuman -> Executing | BlockedFeedback
//! Executing | BlockedFeedback -> Validating | Planning | Explaining
//! Explaining -> Done

use std::fmt;

use serde::{Deserialize, Serialize};
use sieve_core::types::AssistantMessage;

use crate::error::OrchestratorError;

/// Where a run currently is in its plan / validate / route cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Planning,
    Validating,
    Executing,
    AwaitingHuman,
    BlockedFeedback,
    Explaining,
    Done,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Planning => write!(f, "planning"),
            Phase::Validating => write!(f, "validating"),
            Phase::Executing => write!(f, "executing"),
            Phase::AwaitingHuman => write!(f, "awaiting_human"),
            Phase::BlockedFeedback => write!(f, "blocked_feedback"),
            Phase::Explaining => write!(f, "explaining"),
            Phase::Done => write!(f, "done"),
        }
    }
}

/// Validate that a phase transition is allowed.
pub fn validate_transition(from: Phase, to: Phase) -> Result<(), OrchestratorError> {
    let valid = matches!(
        (from, to),
        (Phase::Planning, Phase::Validating)
            | (Phase::Planning, Phase::Explaining)
            | (Phase::Planning, Phase::Done)
            | (Phase::Validating, Phase::Executing)
            | (Phase::Validating, Phase::AwaitingHuman)
            | (Phase::Validating, Phase::BlockedFeedback)
            | (Phase::AwaitingHuman, Phase::Executing)
            | (Phase::AwaitingHuman, Phase::BlockedFeedback)
            | (Phase::Executing, Phase::Validating)
            | (Phase::Executing, Phase::Planning)
            | (Phase::Executing, Phase::Explaining)
            | (Phase::BlockedFeedback, Phase::Validating)
            | (Phase::BlockedFeedback, Phase::Planning)
            | (Phase::BlockedFeedback, Phase::Explaining)
            | (Phase::Explaining, Phase::Done)
    );

    if valid {
        Ok(())
    } else {
        Err(OrchestratorError::InvalidTransition(from, to))
    }
}

/// Mutable state of one run. Only the orchestrator touches it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestrationState {
    step: u32,
    max_steps: u32,
    stopped: bool,
    phase: Phase,
    last_assistant: Option<AssistantMessage>,
}

impl OrchestrationState {
    pub fn new(max_steps: u32) -> Self {
        Self {
            step: 0,
            max_steps,
            stopped: false,
            phase: Phase::Planning,
            last_assistant: None,
        }
    }

    pub fn step(&self) -> u32 {
        self.step
    }

    pub fn max_steps(&self) -> u32 {
        self.max_steps
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn last_assistant(&self) -> Option<&AssistantMessage> {
        self.last_assistant.as_ref()
    }

    /// True once every planning step has been used.
    pub fn budget_exhausted(&self) -> bool {
        self.step >= self.max_steps
    }

    /// Count one planning call. The counter never decreases.
    pub fn begin_step(&mut self) -> u32 {
        self.step = self.step.saturating_add(1);
        self.step
    }

    /// Mark the run stopped. There is no way to un-stop a run.
    pub fn stop(&mut self) {
        self.stopped = true;
    }

    pub fn record_assistant(&mut self, message: AssistantMessage) {
        self.last_assistant = Some(message);
    }

    /// Move to another phase, rejecting transitions the loop never makes.
    pub fn transition(&mut self, to: Phase) -> Result<(), OrchestratorError> {
        validate_transition(self.phase, to)?;
        tracing::trace!(from = %self.phase, to = %to, step = self.step, "Phase transition");
        self.phase = to;
        Ok(())
    }
}
