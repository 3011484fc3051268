//! Shared domain types: proposals, transcript messages and verdicts.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::StopReason;

// =============================================================================
// Proposals
// =============================================================================

/// Named arguments of a proposed action. Keys are unique by construction.
pub type ActionArgs = serde_json::Map<String, serde_json::Value>;

/// A single action the planner wants to run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionProposal {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub args: ActionArgs,
}

impl ActionProposal {
    /// Create a proposal with a freshly generated identifier.
    pub fn new(name: impl Into<String>, args: ActionArgs) -> Self {
        Self {
            id: format!("call_{}", Uuid::new_v4().simple()),
            name: name.into(),
            args,
        }
    }

    /// Create a proposal from a JSON object literal. Non-object values yield no arguments.
    pub fn from_json(name: impl Into<String>, args: serde_json::Value) -> Self {
        let args = match args {
            serde_json::Value::Object(map) => map,
            _ => ActionArgs::new(),
        };
        Self::new(name, args)
    }

    /// Get a string argument by key.
    pub fn arg_str(&self, key: &str) -> Option<&str> {
        self.args.get(key).and_then(|v| v.as_str())
    }

    /// Every argument value rendered as plain text.
    ///
    /// Strings are taken verbatim (no JSON quoting); other values use their
    /// JSON representation.
    pub fn arg_texts(&self) -> impl Iterator<Item = String> + '_ {
        self.args.values().map(|v| match v {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        })
    }

    /// Compact human-readable form, e.g. `delete_files({"reason":"cleanup"})`.
    pub fn describe(&self) -> String {
        format!(
            "{}({})",
            self.name,
            serde_json::Value::Object(self.args.clone())
        )
    }
}

// =============================================================================
// Transcript
// =============================================================================

/// What the planner returned for one call: text plus zero or more proposals.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssistantMessage {
    pub text: String,
    #[serde(default)]
    pub proposals: Vec<ActionProposal>,
}

impl AssistantMessage {
    /// A final answer with no proposals.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            proposals: Vec::new(),
        }
    }

    /// A message proposing the given actions.
    pub fn proposing(proposals: Vec<ActionProposal>) -> Self {
        Self {
            text: String::new(),
            proposals,
        }
    }

    pub fn has_proposals(&self) -> bool {
        !self.proposals.is_empty()
    }
}

/// Outcome of running (or trying to run) one action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ActionOutcome {
    Success { text: String },
    Error { reason: StopReason },
}

/// Result of one routed proposal that reached execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionResult {
    pub proposal_id: String,
    pub action: String,
    pub outcome: ActionOutcome,
}

impl ActionResult {
    pub fn success(proposal: &ActionProposal, text: impl Into<String>) -> Self {
        Self {
            proposal_id: proposal.id.clone(),
            action: proposal.name.clone(),
            outcome: ActionOutcome::Success { text: text.into() },
        }
    }

    pub fn error(proposal: &ActionProposal, reason: StopReason) -> Self {
        Self {
            proposal_id: proposal.id.clone(),
            action: proposal.name.clone(),
            outcome: ActionOutcome::Error { reason },
        }
    }

    /// The text the planner sees for this result.
    pub fn content(&self) -> String {
        match &self.outcome {
            ActionOutcome::Success { text } => text.clone(),
            ActionOutcome::Error { reason } => {
                format!("ACTION ERROR [{}]: {}", reason.code(), reason)
            }
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, ActionOutcome::Success { .. })
    }
}

/// One entry in a conversation transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum Message {
    System {
        content: String,
    },
    User {
        content: String,
    },
    Assistant(AssistantMessage),
    ActionResult(ActionResult),
    /// Synthetic, error-tagged feedback written in place of an action result
    /// when a proposal was denied, or when the run ran out of steps.
    Feedback {
        proposal_id: Option<String>,
        reason: StopReason,
    },
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Message::System {
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Message::User {
            content: content.into(),
        }
    }

    pub fn feedback(proposal_id: Option<String>, reason: StopReason) -> Self {
        Message::Feedback {
            proposal_id,
            reason,
        }
    }

    /// Plain-text content as it is shown to a planner.
    pub fn content(&self) -> String {
        match self {
            Message::System { content } | Message::User { content } => content.clone(),
            Message::Assistant(msg) => msg.text.clone(),
            Message::ActionResult(result) => result.content(),
            Message::Feedback { reason, .. } => feedback_text(reason),
        }
    }
}

/// Render a stop reason as feedback text. Security denials get a louder tag so
/// planners treat them as a hard stop rather than a transient tool error.
pub fn feedback_text(reason: &StopReason) -> String {
    let tag = match reason {
        StopReason::ValidationBlocked { .. } | StopReason::ValidationReviewRejected { .. } => {
            "CRITICAL SECURITY ERROR"
        }
        StopReason::ClassifierUnavailable { .. } => "SECURITY CHECK UNAVAILABLE",
        StopReason::ToolNotFound { .. } | StopReason::ToolExecutionError { .. } => "ACTION ERROR",
        StopReason::StepBudgetExceeded { .. } => "STEP LIMIT REACHED",
    };
    format!("{} [{}]: {}", tag, reason.code(), reason)
}

/// Ordered, append-only conversation owned by a single run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Transcript {
    messages: Vec<Message>,
}

impl Transcript {
    /// Start a transcript with a system prompt and the user's request.
    pub fn new(system_prompt: impl Into<String>, user_query: impl Into<String>) -> Self {
        Self {
            messages: vec![Message::system(system_prompt), Message::user(user_query)],
        }
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// The first user message: the intent every proposal is judged against.
    pub fn original_intent(&self) -> Option<&str> {
        self.messages.iter().find_map(|m| match m {
            Message::User { content } => Some(content.as_str()),
            _ => None,
        })
    }

    /// All action results recorded so far, in order.
    pub fn action_results(&self) -> impl Iterator<Item = &ActionResult> {
        self.messages.iter().filter_map(|m| match m {
            Message::ActionResult(r) => Some(r),
            _ => None,
        })
    }
}

// =============================================================================
// Verdicts
// =============================================================================

/// Why the sieve blocked a proposal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockCause {
    /// Destructive action without authorization or target evidence in the intent.
    SemanticDrift,
    /// The guard classifier labelled the proposal unsafe.
    GuardUnsafe,
    /// The guard classifier could not be consulted (fail-closed).
    ClassifierUnavailable,
}

impl fmt::Display for BlockCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockCause::SemanticDrift => write!(f, "semantic drift"),
            BlockCause::GuardUnsafe => write!(f, "guard flagged unsafe"),
            BlockCause::ClassifierUnavailable => write!(f, "classifier unavailable"),
        }
    }
}

/// The sieve's three-way routing decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "verdict", content = "cause", rename_all = "snake_case")]
pub enum VerdictKind {
    Allow,
    Block(BlockCause),
    Review,
}

impl fmt::Display for VerdictKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VerdictKind::Allow => write!(f, "ALLOW"),
            VerdictKind::Block(_) => write!(f, "BLOCK"),
            VerdictKind::Review => write!(f, "REVIEW"),
        }
    }
}

/// Decision for one proposal, with the reason and how long it took.
#[derive(Debug, Clone, PartialEq)]
pub struct Verdict {
    pub kind: VerdictKind,
    /// Short reason, e.g. "semantic drift".
    pub reason: String,
    /// Optional longer explanation for logs and feedback.
    pub detail: Option<String>,
    pub latency: Duration,
}

impl Verdict {
    pub fn allow(latency: Duration) -> Self {
        Self {
            kind: VerdictKind::Allow,
            reason: "passed all layers".to_string(),
            detail: None,
            latency,
        }
    }

    /// Block with the cause's canonical reason.
    pub fn block(cause: BlockCause, detail: Option<String>, latency: Duration) -> Self {
        Self {
            kind: VerdictKind::Block(cause),
            reason: cause.to_string(),
            detail,
            latency,
        }
    }

    pub fn review(reason: impl Into<String>, latency: Duration) -> Self {
        Self {
            kind: VerdictKind::Review,
            reason: reason.into(),
            detail: None,
            latency,
        }
    }

    pub fn is_allow(&self) -> bool {
        matches!(self.kind, VerdictKind::Allow)
    }

    pub fn is_block(&self) -> bool {
        matches!(self.kind, VerdictKind::Block(_))
    }

    pub fn is_review(&self) -> bool {
        matches!(self.kind, VerdictKind::Review)
    }

    /// Reason plus detail, when there is one.
    pub fn full_reason(&self) -> String {
        match &self.detail {
            Some(detail) => format!("{}: {}", self.reason, detail),
            None => self.reason.clone(),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
