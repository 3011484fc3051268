//! Planner seam.
//!
//! A planner reads the transcript so far and returns text plus zero or more
//! action proposals. Real backends live in other crates; [`ScriptedPlanner`]
//! replays canned responses for the demo and for tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use sieve_core::types::{AssistantMessage, Transcript};

use crate::error::PlannerError;

#[async_trait]
pub trait Planner: Send + Sync {
    async fn plan(&self, transcript: &Transcript) -> Result<AssistantMessage, PlannerError>;
}

#[derive(Default)]
struct ScriptState {
    script: VecDeque<AssistantMessage>,
    seen: Vec<Transcript>,
}

/// Replays a fixed list of responses in order.
///
/// Once the script runs out, the planner either repeats its fallback
/// response or fails with [`PlannerError::Exhausted`]. Every transcript it
/// was called with is recorded.
#[derive(Default)]
pub struct ScriptedPlanner {
    state: Mutex<ScriptState>,
    fallback: Option<AssistantMessage>,
}

impl ScriptedPlanner {
    pub fn new(script: impl IntoIterator<Item = AssistantMessage>) -> Self {
        Self {
            state: Mutex::new(ScriptState {
                script: script.into_iter().collect(),
                seen: Vec::new(),
            }),
            fallback: None,
        }
    }

    /// Answer with `message` once the script is used up.
    pub fn with_fallback(mut self, message: AssistantMessage) -> Self {
        self.fallback = Some(message);
        self
    }

    /// A planner that answers every call with the same message.
    pub fn repeating(message: AssistantMessage) -> Self {
        Self::new(Vec::new()).with_fallback(message)
    }

    /// Number of `plan` calls so far.
    pub fn calls(&self) -> usize {
        self.state.lock().map(|s| s.seen.len()).unwrap_or(0)
    }

    /// Copies of every transcript the planner was called with.
    pub fn seen(&self) -> Vec<Transcript> {
        self.state.lock().map(|s| s.seen.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Planner for ScriptedPlanner {
    async fn plan(&self, transcript: &Transcript) -> Result<AssistantMessage, PlannerError> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| PlannerError::Unavailable("script lock poisoned".to_string()))?;
        state.seen.push(transcript.clone());

        if let Some(next) = state.script.pop_front() {
            return Ok(next);
        }
        match &self.fallback {
            Some(message) => Ok(message.clone()),
            None => Err(PlannerError::Exhausted(state.seen.len())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use sieve_core::types::ActionProposal;

    fn transcript() -> Transcript {
        Transcript::new("sys", "Read requirements.txt")
    }

    #[tokio::test]
    async fn test_script_replayed_in_order() {
        let planner = ScriptedPlanner::new(vec![
            AssistantMessage::proposing(vec![ActionProposal::from_json(
                "read_file",
                json!({"path": "requirements.txt"}),
            )]),
            AssistantMessage::text("done"),
        ]);

        let first = planner.plan(&transcript()).await.unwrap();
        assert_eq!(first.proposals[0].name, "read_file");
        let second = planner.plan(&transcript()).await.unwrap();
        assert_eq!(second.text, "done");
        assert_eq!(planner.calls(), 2);
    }

    #[tokio::test]
    async fn test_exhausted_script_errors() {
        let planner = ScriptedPlanner::new(vec![AssistantMessage::text("only")]);
        planner.plan(&transcript()).await.unwrap();
        let err = planner.plan(&transcript()).await.unwrap_err();
        assert!(matches!(err, PlannerError::Exhausted(2)));
    }

    #[tokio::test]
    async fn test_repeating_planner() {
        let planner = ScriptedPlanner::repeating(AssistantMessage::text("again"));
        for _ in 0..3 {
            assert_eq!(planner.plan(&transcript()).await.unwrap().text, "again");
        }
        assert_eq!(planner.calls(), 3);
    }

    #[tokio::test]
    async fn test_records_transcripts() {
        let planner = ScriptedPlanner::repeating(AssistantMessage::text("ok"));
        planner.plan(&transcript()).await.unwrap();
        let seen = planner.seen();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].original_intent(), Some("Read requirements.txt"));
    }
}
