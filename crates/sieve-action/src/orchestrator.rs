//! The bounded plan / validate / route / execute loop.
//!
//! One call to [`Orchestrator::run`] owns one transcript and one
//! [`OrchestrationState`]. Every proposal the planner makes is judged by the
//! intent sieve against the user's original request before anything runs:
//! ALLOW executes, REVIEW asks the human gate, BLOCK writes error-tagged
//! feedback and stops the run. A stopped run (or one that used up its step
//! budget) gets exactly one more planner call to explain itself.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::Instrument;
use uuid::Uuid;

use sieve_core::config::{BlockPolicy, OrchestratorConfig, DEFAULT_SYSTEM_PROMPT};
use sieve_core::error::StopReason;
use sieve_core::types::{
    ActionOutcome, ActionProposal, ActionResult, AssistantMessage, BlockCause, Message, Transcript,
    Verdict, VerdictKind,
};
use sieve_policy::IntentSieve;

use crate::confirmation::HumanGate;
use crate::error::OrchestratorError;
use crate::handler::ActionCatalog;
use crate::planner::Planner;
use crate::state::{OrchestrationState, Phase};

/// Answer surfaced when a stopped run's planner still tries to call actions.
pub const STOPPED_DENIAL: &str = "I could not complete this request. An action was \
restricted by the Intent Sieve and no further actions were taken.";

/// Answer surfaced when a run finishes normally with empty planner text.
pub const EMPTY_ANSWER: &str = "The task finished without a textual answer.";

const HUMAN_DECLINED: &str = "human declined";
const HUMAN_TIMED_OUT: &str = "human approval timed out";

/// Everything a finished run produced.
#[derive(Debug, Clone, Serialize)]
pub struct RunOutcome {
    pub run_id: Uuid,
    /// The answer to show the user.
    pub answer: String,
    pub transcript: Transcript,
    pub state: OrchestrationState,
    pub planner_calls: u32,
    /// Every stop reason recorded during the run, in order.
    pub stops: Vec<StopReason>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RunOutcome {
    pub fn was_stopped(&self) -> bool {
        self.state.is_stopped()
    }

    /// Results of the actions that actually ran and succeeded.
    pub fn executed(&self) -> impl Iterator<Item = &ActionResult> {
        self.transcript.action_results().filter(|r| r.is_success())
    }
}

/// Per-run mutable data. Never shared between runs.
struct Run {
    transcript: Transcript,
    state: OrchestrationState,
    stops: Vec<StopReason>,
    planner_calls: u32,
}

impl Run {
    fn record_stop(&mut self, reason: StopReason) {
        tracing::warn!(
            code = reason.code(),
            action = reason.action().unwrap_or("-"),
            step = self.state.step(),
            "Run stopped: {}",
            reason
        );
        self.stops.push(reason);
        self.state.stop();
    }
}

/// How the human gate resolved a REVIEW.
enum HumanDecision {
    Approved,
    Declined,
    TimedOut,
}

pub struct Orchestrator {
    planner: Arc<dyn Planner>,
    sieve: Arc<IntentSieve>,
    catalog: Arc<ActionCatalog>,
    gate: Arc<dyn HumanGate>,
    config: OrchestratorConfig,
    human_timeout: Option<Duration>,
    system_prompt: String,
}

impl Orchestrator {
    pub fn new(
        planner: Arc<dyn Planner>,
        sieve: Arc<IntentSieve>,
        catalog: Arc<ActionCatalog>,
        gate: Arc<dyn HumanGate>,
        config: OrchestratorConfig,
    ) -> Self {
        let human_timeout = match config.human_timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };
        Self {
            planner,
            sieve,
            catalog,
            gate,
            config,
            human_timeout,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
        }
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    /// Override the human confirmation timeout. `None` waits forever.
    pub fn with_human_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.human_timeout = timeout;
        self
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Drive one user request to a final answer.
    ///
    /// Denials, tool failures and budget exhaustion are not errors: they are
    /// recorded on the returned [`RunOutcome`]. Only an empty request, a
    /// planner failure inside the loop, or an internal phase error aborts.
    pub async fn run(&self, user_query: &str) -> Result<RunOutcome, OrchestratorError> {
        let query = user_query.trim();
        if query.is_empty() {
            return Err(OrchestratorError::EmptyRequest);
        }
        let run_id = Uuid::new_v4();
        let span = tracing::info_span!("run", run_id = %run_id);
        self.drive(run_id, query).instrument(span).await
    }

    async fn drive(&self, run_id: Uuid, query: &str) -> Result<RunOutcome, OrchestratorError> {
        let started_at = Utc::now();
        tracing::info!(max_steps = self.config.max_steps, "Run started");

        let mut run = Run {
            transcript: Transcript::new(self.system_prompt.clone(), query),
            state: OrchestrationState::new(self.config.max_steps),
            stops: Vec::new(),
            planner_calls: 0,
        };

        let answer = loop {
            if run.state.budget_exhausted() {
                let reason = StopReason::StepBudgetExceeded {
                    max_steps: run.state.max_steps(),
                };
                run.transcript.push(Message::feedback(None, reason.clone()));
                run.record_stop(reason);
                run.state.transition(Phase::Explaining)?;
                break self.explain(&mut run).await?;
            }

            let step = run.state.begin_step();
            let message = self.call_planner(&mut run).await?;

            if !message.has_proposals() {
                run.state.transition(Phase::Done)?;
                break if message.text.trim().is_empty() {
                    EMPTY_ANSWER.to_string()
                } else {
                    message.text
                };
            }

            tracing::info!(step, proposals = message.proposals.len(), "Step planned");
            self.route_step(&mut run, query, &message.proposals).await?;

            if run.state.is_stopped() {
                run.state.transition(Phase::Explaining)?;
                break self.explain(&mut run).await?;
            }
            run.state.transition(Phase::Planning)?;
        };

        let outcome = RunOutcome {
            run_id,
            answer,
            transcript: run.transcript,
            state: run.state,
            planner_calls: run.planner_calls,
            stops: run.stops,
            started_at,
            finished_at: Utc::now(),
        };
        tracing::info!(
            steps = outcome.state.step(),
            planner_calls = outcome.planner_calls,
            stopped = outcome.was_stopped(),
            "Run finished"
        );
        Ok(outcome)
    }

    async fn call_planner(&self, run: &mut Run) -> Result<AssistantMessage, OrchestratorError> {
        run.planner_calls += 1;
        let message = self.planner.plan(&run.transcript).await?;
        run.transcript.push(Message::Assistant(message.clone()));
        run.state.record_assistant(message.clone());
        Ok(message)
    }

    /// Validate and route every proposal of one step, in order.
    async fn route_step(
        &self,
        run: &mut Run,
        intent: &str,
        proposals: &[ActionProposal],
    ) -> Result<(), OrchestratorError> {
        for (index, proposal) in proposals.iter().enumerate() {
            if run.state.is_stopped() && self.config.block_policy == BlockPolicy::FailFast {
                tracing::info!(
                    skipped = proposals.len() - index,
                    step = run.state.step(),
                    "Skipping remaining proposals after stop"
                );
                break;
            }

            run.state.transition(Phase::Validating)?;
            let verdict = self.sieve.validate(intent, proposal).await;

            match verdict.kind {
                VerdictKind::Allow => {
                    run.state.transition(Phase::Executing)?;
                    self.execute(run, proposal).await;
                }
                VerdictKind::Review => {
                    run.state.transition(Phase::AwaitingHuman)?;
                    match self.ask_human(proposal, &verdict.reason).await {
                        HumanDecision::Approved => {
                            tracing::info!(action = %proposal.name, "Human approved action");
                            run.state.transition(Phase::Executing)?;
                            self.execute(run, proposal).await;
                        }
                        HumanDecision::Declined => {
                            self.deny(run, proposal, review_rejected(proposal, HUMAN_DECLINED))?;
                        }
                        HumanDecision::TimedOut => {
                            self.deny(run, proposal, review_rejected(proposal, HUMAN_TIMED_OUT))?;
                        }
                    }
                }
                VerdictKind::Block(cause) => {
                    self.deny(run, proposal, block_reason(proposal, cause, &verdict))?;
                }
            }
        }
        Ok(())
    }

    async fn ask_human(&self, proposal: &ActionProposal, reason: &str) -> HumanDecision {
        let confirm = self.gate.confirm(proposal, reason);
        let approved = match self.human_timeout {
            Some(limit) => match tokio::time::timeout(limit, confirm).await {
                Ok(answer) => answer,
                Err(_) => return HumanDecision::TimedOut,
            },
            None => confirm.await,
        };
        if approved {
            HumanDecision::Approved
        } else {
            HumanDecision::Declined
        }
    }

    /// Write error-tagged feedback in place of an action result and stop.
    fn deny(
        &self,
        run: &mut Run,
        proposal: &ActionProposal,
        reason: StopReason,
    ) -> Result<(), OrchestratorError> {
        run.state.transition(Phase::BlockedFeedback)?;
        run.transcript
            .push(Message::feedback(Some(proposal.id.clone()), reason.clone()));
        run.record_stop(reason);
        Ok(())
    }

    async fn execute(&self, run: &mut Run, proposal: &ActionProposal) {
        let result = match self.catalog.lookup(&proposal.name) {
            Err(_) => ActionResult::error(
                proposal,
                StopReason::ToolNotFound {
                    action: proposal.name.clone(),
                },
            ),
            Ok(handler) => match handler.invoke(&proposal.args).await {
                Ok(text) => {
                    tracing::info!(action = %proposal.name, proposal_id = %proposal.id, "Action executed");
                    ActionResult::success(proposal, text)
                }
                Err(e) => ActionResult::error(
                    proposal,
                    StopReason::ToolExecutionError {
                        action: proposal.name.clone(),
                        message: e.to_string(),
                    },
                ),
            },
        };

        if let ActionOutcome::Error { reason } = &result.outcome {
            run.record_stop(reason.clone());
        }
        run.transcript.push(Message::ActionResult(result));
    }

    /// Ask the planner once more why the run stopped, then compose the answer.
    async fn explain(&self, run: &mut Run) -> Result<String, OrchestratorError> {
        run.transcript
            .push(Message::user(self.config.explain_prompt.clone()));

        let message = match self.call_planner(run).await {
            Ok(message) => Some(message),
            Err(e) => {
                tracing::warn!(error = %e, "Planner failed to explain stopped run");
                None
            }
        };
        run.state.transition(Phase::Done)?;
        Ok(stopped_answer(message.as_ref(), &run.stops))
    }
}

fn review_rejected(proposal: &ActionProposal, reason: &str) -> StopReason {
    StopReason::ValidationReviewRejected {
        action: proposal.name.clone(),
        reason: reason.to_string(),
    }
}

fn block_reason(proposal: &ActionProposal, cause: BlockCause, verdict: &Verdict) -> StopReason {
    match cause {
        BlockCause::ClassifierUnavailable => StopReason::ClassifierUnavailable {
            action: proposal.name.clone(),
            reason: verdict
                .detail
                .clone()
                .unwrap_or_else(|| verdict.reason.clone()),
        },
        BlockCause::SemanticDrift | BlockCause::GuardUnsafe => StopReason::ValidationBlocked {
            action: proposal.name.clone(),
            reason: verdict.full_reason(),
        },
    }
}

/// Notice appended to every stopped run's answer.
pub fn restriction_notice(stops: &[StopReason]) -> String {
    let mut notice = String::from("[Intent Sieve] This request was restricted:");
    for stop in stops {
        notice.push_str("\n- ");
        notice.push_str(&stop.to_string());
    }
    notice
}

/// Final answer of a stopped run. Never reports success it did not have.
pub fn stopped_answer(message: Option<&AssistantMessage>, stops: &[StopReason]) -> String {
    let notice = restriction_notice(stops);
    match message {
        Some(m) if m.has_proposals() => format!("{}\n\n{}", STOPPED_DENIAL, notice),
        Some(m) if !m.text.trim().is_empty() => format!("{}\n\n{}", m.text.trim_end(), notice),
        _ => notice,
    }
}
