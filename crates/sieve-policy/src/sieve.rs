//! The intent sieve: three ordered layers producing one verdict.
//!
//! 1. Symbolic drift check (see [`crate::symbolic`]). Drift blocks at once.
//! 2. Guard classifier, for every proposal or only destructive ones. An
//!    `unsafe` label blocks; a classifier failure blocks as
//!    "classifier unavailable" so outages stay separable from denials.
//! 3. Risk routing. Destructive proposals that survived both layers go to
//!    human review; everything else is allowed.

use std::sync::Arc;
use std::time::{Duration, Instant};

use sieve_core::config::{GuardPolicy, PolicyConfig};
use sieve_core::types::{ActionProposal, BlockCause, Verdict, VerdictKind};

use crate::error::GuardError;
use crate::guard::{GuardClassifier, GuardLabel, GuardRequest};
use crate::symbolic::{SymbolicCheck, SymbolicLayer};

/// Reason attached to every REVIEW verdict.
pub const REVIEW_REASON: &str = "destructive action requires confirmation";

/// Validates proposals against the user's original intent.
pub struct IntentSieve {
    symbolic: SymbolicLayer,
    guard: Arc<dyn GuardClassifier>,
    guard_policy: GuardPolicy,
    guard_timeout: Option<Duration>,
}

impl IntentSieve {
    /// Create a sieve from policy config and a guard classifier.
    pub fn new(config: &PolicyConfig, guard: Arc<dyn GuardClassifier>) -> Self {
        Self {
            symbolic: SymbolicLayer::new(config),
            guard,
            guard_policy: config.guard_policy,
            guard_timeout: None,
        }
    }

    /// Bound every guard call; an expired call counts as "classifier unavailable".
    pub fn with_guard_timeout(mut self, timeout: Duration) -> Self {
        self.guard_timeout = Some(timeout);
        self
    }

    pub fn guard_policy(&self) -> GuardPolicy {
        self.guard_policy
    }

    pub fn symbolic(&self) -> &SymbolicLayer {
        &self.symbolic
    }

    /// Judge one proposal. Never fails: every error path is a BLOCK verdict.
    pub async fn validate(&self, original_intent: &str, proposal: &ActionProposal) -> Verdict {
        let start = Instant::now();
        tracing::debug!(action = %proposal.name, proposal_id = %proposal.id, "Sieve analyzing action");

        let verdict = self.evaluate(original_intent, proposal, start).await;
        log_verdict(proposal, &verdict);
        verdict
    }

    async fn evaluate(
        &self,
        original_intent: &str,
        proposal: &ActionProposal,
        start: Instant,
    ) -> Verdict {
        // Layer 1: symbolic
        let symbolic = self.symbolic.check(original_intent, proposal);
        if let SymbolicCheck::Drift { detail } = &symbolic {
            return Verdict::block(
                BlockCause::SemanticDrift,
                Some(detail.clone()),
                start.elapsed(),
            );
        }
        let destructive = symbolic.is_destructive();

        // Layer 2: neural
        let consult_guard = match self.guard_policy {
            GuardPolicy::All => true,
            GuardPolicy::DestructiveOnly => destructive,
        };
        if consult_guard {
            let request = GuardRequest::new(original_intent, proposal);
            match self.classify(&request).await {
                Ok(GuardLabel::Safe) => {}
                Ok(GuardLabel::Unsafe { categories }) => {
                    let detail = if categories.is_empty() {
                        None
                    } else {
                        Some(format!("hazard categories {}", categories.join(",")))
                    };
                    return Verdict::block(BlockCause::GuardUnsafe, detail, start.elapsed());
                }
                Err(e) => {
                    return Verdict::block(
                        BlockCause::ClassifierUnavailable,
                        Some(e.to_string()),
                        start.elapsed(),
                    );
                }
            }
        }

        // Layer 3: risk routing
        if destructive {
            Verdict::review(REVIEW_REASON, start.elapsed())
        } else {
            Verdict::allow(start.elapsed())
        }
    }

    async fn classify(&self, request: &GuardRequest) -> Result<GuardLabel, GuardError> {
        match self.guard_timeout {
            Some(limit) => tokio::time::timeout(limit, self.guard.classify(request))
                .await
                .map_err(|_| GuardError::Timeout(limit.as_millis() as u64))?,
            None => self.guard.classify(request).await,
        }
    }
}

fn log_verdict(proposal: &ActionProposal, verdict: &Verdict) {
    let latency_ms = verdict.latency.as_millis() as u64;
    let reason = verdict.full_reason();
    match verdict.kind {
        VerdictKind::Allow | VerdictKind::Review => tracing::info!(
            action = %proposal.name,
            proposal_id = %proposal.id,
            verdict = %verdict.kind,
            reason = %reason,
            latency_ms,
            "Sieve verdict"
        ),
        VerdictKind::Block(BlockCause::ClassifierUnavailable) => tracing::error!(
            action = %proposal.name,
            proposal_id = %proposal.id,
            verdict = %verdict.kind,
            cause = "classifier_unavailable",
            reason = %reason,
            latency_ms,
            "Sieve failed closed: guard classifier unavailable"
        ),
        VerdictKind::Block(cause) => tracing::warn!(
            action = %proposal.name,
            proposal_id = %proposal.id,
            verdict = %verdict.kind,
            cause = %cause,
            reason = %reason,
            latency_ms,
            "Sieve rejected action"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Guard that always returns the same answer and counts calls.
    struct FixedGuard {
        answer: Result<GuardLabel, String>,
        calls: AtomicUsize,
    }

    impl FixedGuard {
        fn safe() -> Arc<Self> {
            Arc::new(Self {
                answer: Ok(GuardLabel::Safe),
                calls: AtomicUsize::new(0),
            })
        }

        fn unsafe_with(categories: &[&str]) -> Arc<Self> {
            Arc::new(Self {
                answer: Ok(GuardLabel::Unsafe {
                    categories: categories.iter().map(|c| c.to_string()).collect(),
                }),
                calls: AtomicUsize::new(0),
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                answer: Err("connection refused".to_string()),
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl GuardClassifier for FixedGuard {
        async fn classify(&self, _request: &GuardRequest) -> Result<GuardLabel, GuardError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.answer.clone().map_err(GuardError::Unavailable)
        }
    }

    /// Guard that never answers.
    struct HangingGuard;

    #[async_trait]
    impl GuardClassifier for HangingGuard {
        async fn classify(&self, _request: &GuardRequest) -> Result<GuardLabel, GuardError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(GuardLabel::Safe)
        }
    }

    fn sieve_with(guard: Arc<dyn GuardClassifier>, policy: GuardPolicy) -> IntentSieve {
        let config = PolicyConfig {
            guard_policy: policy,
            ..PolicyConfig::default()
        };
        IntentSieve::new(&config, guard)
    }

    fn proposal(name: &str, args: serde_json::Value) -> ActionProposal {
        ActionProposal::from_json(name, args)
    }

    // ---- layer 1 ----

    #[tokio::test]
    async fn test_unauthorized_destructive_blocks_regardless_of_guard() {
        for guard in [FixedGuard::safe(), FixedGuard::unsafe_with(&[]), FixedGuard::failing()] {
            let sieve = sieve_with(guard.clone(), GuardPolicy::All);
            let v = sieve
                .validate(
                    "Summarize this page",
                    &proposal("delete_files", json!({"reason": "cleanup"})),
                )
                .await;
            assert_eq!(v.kind, VerdictKind::Block(BlockCause::SemanticDrift));
            assert_eq!(v.reason, "semantic drift");
            // Layer 1 short-circuits layer 2
            assert_eq!(guard.calls(), 0);
        }
    }

    #[tokio::test]
    async fn test_injected_system_wipe_is_drift() {
        let sieve = sieve_with(FixedGuard::safe(), GuardPolicy::All);
        let v = sieve
            .validate(
                "Summarize this page",
                &proposal("delete_system_files", json!({"reason": "server migration"})),
            )
            .await;
        assert_eq!(v.kind, VerdictKind::Block(BlockCause::SemanticDrift));
        assert!(v.detail.unwrap().contains("delete_system_files"));
    }

    // ---- layer 2 ----

    #[tokio::test]
    async fn test_guard_unsafe_blocks_non_destructive() {
        let sieve = sieve_with(FixedGuard::unsafe_with(&["S2", "S14"]), GuardPolicy::All);
        let v = sieve
            .validate(
                "Read requirements.txt",
                &proposal("read_file", json!({"path": "requirements.txt"})),
            )
            .await;
        assert_eq!(v.kind, VerdictKind::Block(BlockCause::GuardUnsafe));
        assert_eq!(v.full_reason(), "guard flagged unsafe: hazard categories S2,S14");
    }

    #[tokio::test]
    async fn test_guard_unsafe_blocks_authorized_destructive() {
        let sieve = sieve_with(FixedGuard::unsafe_with(&[]), GuardPolicy::All);
        let v = sieve
            .validate(
                "Delete test_log.txt",
                &proposal("delete_files", json!({"reason": "cleanup of test_log.txt"})),
            )
            .await;
        assert_eq!(v.kind, VerdictKind::Block(BlockCause::GuardUnsafe));
        assert_eq!(v.detail, None);
    }

    #[tokio::test]
    async fn test_classifier_failure_fails_closed() {
        let sieve = sieve_with(FixedGuard::failing(), GuardPolicy::All);
        let v = sieve
            .validate(
                "Read requirements.txt",
                &proposal("read_file", json!({"path": "requirements.txt"})),
            )
            .await;
        assert_eq!(v.kind, VerdictKind::Block(BlockCause::ClassifierUnavailable));
        assert_eq!(v.reason, "classifier unavailable");
        assert!(v.full_reason().contains("connection refused"));
    }

    #[tokio::test]
    async fn test_classifier_timeout_fails_closed() {
        let sieve = sieve_with(Arc::new(HangingGuard), GuardPolicy::All)
            .with_guard_timeout(Duration::from_millis(20));
        let v = sieve
            .validate(
                "Read requirements.txt",
                &proposal("read_file", json!({"path": "requirements.txt"})),
            )
            .await;
        assert_eq!(v.kind, VerdictKind::Block(BlockCause::ClassifierUnavailable));
        assert!(v.full_reason().contains("timed out"));
    }

    #[tokio::test]
    async fn test_destructive_only_policy_skips_guard_for_safe_actions() {
        let guard = FixedGuard::failing();
        let sieve = sieve_with(guard.clone(), GuardPolicy::DestructiveOnly);
        let v = sieve
            .validate(
                "Read requirements.txt",
                &proposal("read_file", json!({"path": "requirements.txt"})),
            )
            .await;
        assert!(v.is_allow());
        assert_eq!(guard.calls(), 0);
    }

    #[tokio::test]
    async fn test_destructive_only_policy_still_guards_destructive() {
        let guard = FixedGuard::unsafe_with(&["S1"]);
        let sieve = sieve_with(guard.clone(), GuardPolicy::DestructiveOnly);
        let v = sieve
            .validate(
                "Delete test_log.txt",
                &proposal("delete_files", json!({"reason": "cleanup of test_log.txt"})),
            )
            .await;
        assert_eq!(v.kind, VerdictKind::Block(BlockCause::GuardUnsafe));
        assert_eq!(guard.calls(), 1);
    }

    #[tokio::test]
    async fn test_all_policy_guards_every_action() {
        let guard = FixedGuard::safe();
        let sieve = sieve_with(guard.clone(), GuardPolicy::All);
        sieve
            .validate("Fetch example.com", &proposal("fetch_web_page", json!({"url": "example.com"})))
            .await;
        assert_eq!(guard.calls(), 1);
    }

    // ---- layer 3 ----

    #[tokio::test]
    async fn test_authorized_destructive_goes_to_review() {
        let sieve = sieve_with(FixedGuard::safe(), GuardPolicy::All);
        let v = sieve
            .validate(
                "Delete test_log.txt",
                &proposal("delete_files", json!({"reason": "cleanup of test_log.txt"})),
            )
            .await;
        assert!(v.is_review());
        assert_eq!(v.reason, REVIEW_REASON);
    }

    #[tokio::test]
    async fn test_non_destructive_never_reviews() {
        let sieve = sieve_with(FixedGuard::safe(), GuardPolicy::All);
        for (intent, name, args) in [
            ("Read requirements.txt", "read_file", json!({"path": "requirements.txt"})),
            ("Delete everything", "read_file", json!({"path": "secrets.env"})),
            ("Summarize this page", "fetch_web_page", json!({"url": "http://x.test"})),
        ] {
            let v = sieve.validate(intent, &proposal(name, args)).await;
            assert!(v.is_allow(), "{} should be allowed", name);
        }
    }
}
