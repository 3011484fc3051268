//! Human confirmation for proposals the sieve routes to REVIEW.
//!
//! The orchestrator only sees the [`HumanGate`] trait. A gate answers
//! `true` to run the action and `false` to deny it; any failure to obtain
//! an answer is a denial.

use std::collections::VecDeque;
use std::io::{BufRead, Write};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::oneshot;

use sieve_core::types::ActionProposal;

#[async_trait]
pub trait HumanGate: Send + Sync {
    /// Ask whether `proposal` may run. `reason` is the sieve's review reason.
    async fn confirm(&self, proposal: &ActionProposal, reason: &str) -> bool;
}

// =============================================================================
// Console
// =============================================================================

/// Line printed when a console prompt is abandoned before it was answered.
pub const CONSOLE_UNANSWERED: &str = "\n[REVIEW] no answer in time; action denied\n";

/// Prompts on the terminal and reads a y/n answer from stdin.
///
/// Reading stdin cannot be cancelled. If the orchestrator's human timeout
/// expires, the blocking read keeps waiting until the next line arrives and
/// that answer is discarded.
#[derive(Debug, Default)]
pub struct ConsoleGate;

impl ConsoleGate {
    fn ask(prompt: String) -> bool {
        let mut stderr = std::io::stderr();
        if write!(stderr, "{}", prompt).and_then(|_| stderr.flush()).is_err() {
            return false;
        }
        let mut line = String::new();
        match std::io::stdin().lock().read_line(&mut line) {
            Ok(0) | Err(_) => false,
            Ok(_) => is_yes(&line),
        }
    }
}

#[async_trait]
impl HumanGate for ConsoleGate {
    async fn confirm(&self, proposal: &ActionProposal, reason: &str) -> bool {
        let prompt = format!(
            "\n[REVIEW] {}\n  reason: {}\nAllow this action? [y/N] ",
            proposal.describe(),
            reason
        );
        let mut notice = UnansweredNotice::new(std::io::stderr());
        let answer = tokio::task::spawn_blocking(move || Self::ask(prompt))
            .await
            .unwrap_or(false);
        notice.answered();
        answer
    }
}

/// Writes [`CONSOLE_UNANSWERED`] on drop unless the prompt got its answer.
struct UnansweredNotice<W: Write> {
    out: W,
    answered: bool,
}

impl<W: Write> UnansweredNotice<W> {
    fn new(out: W) -> Self {
        Self {
            out,
            answered: false,
        }
    }

    fn answered(&mut self) {
        self.answered = true;
    }
}

impl<W: Write> Drop for UnansweredNotice<W> {
    fn drop(&mut self) {
        if !self.answered {
            let _ = self
                .out
                .write_all(CONSOLE_UNANSWERED.as_bytes())
                .and_then(|_| self.out.flush());
        }
    }
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}

// =============================================================================
// Fixed answer
// =============================================================================

/// Gives the same answer to every request. Used for `--yes`/`--no` and tests.
#[derive(Debug)]
pub struct FixedGate {
    approve: bool,
    requests: AtomicUsize,
}

impl FixedGate {
    pub fn approve_all() -> Self {
        Self {
            approve: true,
            requests: AtomicUsize::new(0),
        }
    }

    pub fn deny_all() -> Self {
        Self {
            approve: false,
            requests: AtomicUsize::new(0),
        }
    }

    /// How many confirmations were requested.
    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HumanGate for FixedGate {
    async fn confirm(&self, proposal: &ActionProposal, _reason: &str) -> bool {
        self.requests.fetch_add(1, Ordering::SeqCst);
        tracing::debug!(action = %proposal.name, approve = self.approve, "Fixed gate answered");
        self.approve
    }
}

// =============================================================================
// Queue
// =============================================================================

/// A confirmation waiting for an answer from another task.
pub struct PendingConfirmation {
    pub proposal_id: String,
    pub action: String,
    /// Human-readable form of the call, e.g. `delete_files({"reason":"x"})`.
    pub description: String,
    pub reason: String,
    pub created_at: DateTime<Utc>,
    responder: oneshot::Sender<bool>,
}

/// Summary of a pending confirmation, safe to hand out.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingSummary {
    pub proposal_id: String,
    pub action: String,
    pub description: String,
    pub reason: String,
    pub created_at: DateTime<Utc>,
}

/// Gate that parks requests in a queue until someone approves or dismisses
/// them by proposal id. Suits a UI or API front end driving the run.
#[derive(Default)]
pub struct QueueGate {
    pending: Mutex<VecDeque<PendingConfirmation>>,
}

impl QueueGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Approve a pending confirmation. Returns `false` if none matches or
    /// the run waiting on it has given up.
    pub fn approve(&self, proposal_id: &str) -> bool {
        self.resolve(proposal_id, true)
    }

    /// Deny a pending confirmation. Returns `false` if none matches or the
    /// run waiting on it has given up.
    pub fn dismiss(&self, proposal_id: &str) -> bool {
        self.resolve(proposal_id, false)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.lock().map(|p| p.len()).unwrap_or(0)
    }

    pub fn pending(&self) -> Vec<PendingSummary> {
        let Ok(pending) = self.pending.lock() else {
            return Vec::new();
        };
        pending
            .iter()
            .map(|p| PendingSummary {
                proposal_id: p.proposal_id.clone(),
                action: p.action.clone(),
                description: p.description.clone(),
                reason: p.reason.clone(),
                created_at: p.created_at,
            })
            .collect()
    }

    fn resolve(&self, proposal_id: &str, answer: bool) -> bool {
        let Ok(mut pending) = self.pending.lock() else {
            return false;
        };
        let Some(pos) = pending.iter().position(|p| p.proposal_id == proposal_id) else {
            return false;
        };
        match pending.remove(pos) {
            Some(confirmation) => confirmation.responder.send(answer).is_ok(),
            None => false,
        }
    }

    fn withdraw(&self, proposal_id: &str) {
        let Ok(mut pending) = self.pending.lock() else {
            return;
        };
        let before = pending.len();
        pending.retain(|p| p.proposal_id != proposal_id);
        if pending.len() < before {
            tracing::info!(proposal_id = %proposal_id, "Abandoned confirmation withdrawn");
        }
    }
}

/// Removes a queued confirmation when the waiting `confirm` call is dropped,
/// e.g. by a human timeout. A resolved entry is already gone.
struct Withdraw<'a> {
    gate: &'a QueueGate,
    proposal_id: &'a str,
}

impl Drop for Withdraw<'_> {
    fn drop(&mut self) {
        self.gate.withdraw(self.proposal_id);
    }
}

#[async_trait]
impl HumanGate for QueueGate {
    async fn confirm(&self, proposal: &ActionProposal, reason: &str) -> bool {
        let (tx, rx) = oneshot::channel();
        {
            let Ok(mut pending) = self.pending.lock() else {
                return false;
            };
            pending.push_back(PendingConfirmation {
                proposal_id: proposal.id.clone(),
                action: proposal.name.clone(),
                description: proposal.describe(),
                reason: reason.to_string(),
                created_at: Utc::now(),
                responder: tx,
            });
        }
        let _withdraw = Withdraw {
            gate: self,
            proposal_id: &proposal.id,
        };
        tracing::info!(action = %proposal.name, proposal_id = %proposal.id, "Awaiting confirmation");
        rx.await.unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;

    fn proposal() -> ActionProposal {
        ActionProposal::from_json("delete_files", json!({"reason": "cleanup"}))
    }

    async fn wait_for_pending(gate: &QueueGate, n: usize) {
        for _ in 0..100 {
            if gate.pending_count() == n {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("expected {} pending confirmations", n);
    }

    #[test]
    fn test_is_yes() {
        assert!(is_yes("y\n"));
        assert!(is_yes("  YES "));
        assert!(!is_yes("n"));
        assert!(!is_yes(""));
        assert!(!is_yes("yes please"));
    }

    #[tokio::test]
    async fn test_fixed_gate() {
        let gate = FixedGate::approve_all();
        assert!(gate.confirm(&proposal(), "r").await);
        assert!(gate.confirm(&proposal(), "r").await);
        assert_eq!(gate.requests(), 2);

        let gate = FixedGate::deny_all();
        assert!(!gate.confirm(&proposal(), "r").await);
        assert_eq!(gate.requests(), 1);
    }

    #[tokio::test]
    async fn test_queue_gate_approve() {
        let gate = Arc::new(QueueGate::new());
        let p = proposal();
        let id = p.id.clone();

        let waiter = {
            let gate = gate.clone();
            tokio::spawn(async move { gate.confirm(&p, "destructive").await })
        };
        wait_for_pending(&gate, 1).await;

        let pending = gate.pending();
        assert_eq!(pending[0].proposal_id, id);
        assert_eq!(pending[0].reason, "destructive");
        assert!(pending[0].description.starts_with("delete_files("));

        assert!(gate.approve(&id));
        assert!(waiter.await.unwrap());
        assert_eq!(gate.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_queue_gate_dismiss() {
        let gate = Arc::new(QueueGate::new());
        let p = proposal();
        let id = p.id.clone();

        let waiter = {
            let gate = gate.clone();
            tokio::spawn(async move { gate.confirm(&p, "destructive").await })
        };
        wait_for_pending(&gate, 1).await;

        assert!(gate.dismiss(&id));
        assert!(!waiter.await.unwrap());
    }

    #[test]
    fn test_resolve_unknown_id() {
        let gate = QueueGate::new();
        assert!(!gate.approve("call_missing"));
        assert!(!gate.dismiss("call_missing"));
        assert!(gate.pending().is_empty());
    }

    #[tokio::test]
    async fn test_abandoned_confirmation_leaves_queue() {
        let gate = QueueGate::new();
        let p = proposal();
        let id = p.id.clone();

        let answer = tokio::time::timeout(Duration::from_millis(20), gate.confirm(&p, "r")).await;
        assert!(answer.is_err());
        assert_eq!(gate.pending_count(), 0);
        assert!(gate.pending().is_empty());
        assert!(!gate.approve(&id));
    }

    #[test]
    fn test_unanswered_prompt_prints_denial() {
        let mut out = Vec::new();
        drop(UnansweredNotice::new(&mut out));
        assert_eq!(String::from_utf8(out).unwrap(), CONSOLE_UNANSWERED);

        let mut out = Vec::new();
        let mut notice = UnansweredNotice::new(&mut out);
        notice.answered();
        drop(notice);
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn test_double_approve() {
        let gate = Arc::new(QueueGate::new());
        let p = proposal();
        let id = p.id.clone();
        let waiter = {
            let gate = gate.clone();
            tokio::spawn(async move { gate.confirm(&p, "r").await })
        };
        wait_for_pending(&gate, 1).await;

        assert!(gate.approve(&id));
        assert!(!gate.approve(&id));
        assert!(waiter.await.unwrap());
    }
}
