//! Tool-calling chat model served by Ollama as the planner.

use std::time::Duration;

use async_trait::async_trait;

use sieve_action::{ActionCatalog, ActionDescriptor, Planner, PlannerError};
use sieve_core::config::PlannerConfig;
use sieve_core::types::{
    feedback_text, ActionArgs, ActionProposal, AssistantMessage, Message, Transcript,
};

use crate::client::{
    ChatMessage, ChatOptions, ChatRequest, FunctionCall, OllamaClient, Tool, ToolCall, ToolFunction,
};
use crate::error::OllamaError;

pub struct OllamaPlanner {
    client: OllamaClient,
    model: String,
    temperature: f32,
    tools: Vec<Tool>,
}

impl OllamaPlanner {
    /// Build a planner advertising every action in `catalog` as a tool.
    pub fn new(config: &PlannerConfig, catalog: &ActionCatalog) -> Result<Self, OllamaError> {
        let client = OllamaClient::new(&config.endpoint, Duration::from_secs(config.timeout_secs))?;
        Ok(Self {
            client,
            model: config.model.clone(),
            temperature: config.temperature,
            tools: catalog.descriptors().into_iter().map(tool).collect(),
        })
    }

    fn request(&self, transcript: &Transcript) -> ChatRequest {
        ChatRequest {
            model: self.model.clone(),
            messages: transcript.messages().iter().map(to_chat_message).collect(),
            stream: false,
            tools: self.tools.clone(),
            options: ChatOptions {
                temperature: self.temperature,
            },
        }
    }
}

fn tool(descriptor: ActionDescriptor) -> Tool {
    Tool {
        kind: "function",
        function: ToolFunction {
            name: descriptor.name,
            description: descriptor.description,
            parameters: descriptor.parameters,
        },
    }
}

/// Render one transcript entry in Ollama's chat format.
pub fn to_chat_message(message: &Message) -> ChatMessage {
    match message {
        Message::System { content } => ChatMessage::new("system", content.clone()),
        Message::User { content } => ChatMessage::new("user", content.clone()),
        Message::Assistant(assistant) => ChatMessage {
            tool_calls: assistant
                .proposals
                .iter()
                .map(|p| ToolCall {
                    id: Some(p.id.clone()),
                    function: FunctionCall {
                        name: p.name.clone(),
                        arguments: serde_json::Value::Object(p.args.clone()),
                    },
                })
                .collect(),
            ..ChatMessage::new("assistant", assistant.text.clone())
        },
        Message::ActionResult(result) => ChatMessage {
            tool_name: Some(result.action.clone()),
            ..ChatMessage::new("tool", result.content())
        },
        // Budget feedback answers no particular call, so it goes in as a user turn.
        Message::Feedback {
            proposal_id: None,
            reason,
        } => ChatMessage::new("user", feedback_text(reason)),
        Message::Feedback { reason, .. } => ChatMessage {
            tool_name: reason.action().map(str::to_string),
            ..ChatMessage::new("tool", feedback_text(reason))
        },
    }
}

/// Turn the model's reply into text plus proposals.
pub fn to_assistant_message(reply: ChatMessage) -> Result<AssistantMessage, PlannerError> {
    let mut proposals = Vec::with_capacity(reply.tool_calls.len());
    for call in reply.tool_calls {
        let name = call.function.name.trim().to_string();
        if name.is_empty() {
            return Err(PlannerError::InvalidResponse(
                "tool call without a function name".to_string(),
            ));
        }
        let args = arguments(call.function.arguments)?;
        let mut proposal = ActionProposal::new(name, args);
        if let Some(id) = call.id.filter(|id| !id.is_empty()) {
            proposal.id = id;
        }
        proposals.push(proposal);
    }
    Ok(AssistantMessage {
        text: reply.content,
        proposals,
    })
}

/// Arguments arrive as an object, or (from some models) as a JSON string.
fn arguments(value: serde_json::Value) -> Result<ActionArgs, PlannerError> {
    match value {
        serde_json::Value::Object(map) => Ok(map),
        serde_json::Value::Null => Ok(ActionArgs::new()),
        serde_json::Value::String(raw) if raw.trim().is_empty() => Ok(ActionArgs::new()),
        serde_json::Value::String(raw) => match serde_json::from_str(&raw) {
            Ok(serde_json::Value::Object(map)) => Ok(map),
            _ => Err(PlannerError::InvalidResponse(format!(
                "tool arguments are not a JSON object: {}",
                raw
            ))),
        },
        other => Err(PlannerError::InvalidResponse(format!(
            "tool arguments are not a JSON object: {}",
            other
        ))),
    }
}

impl From<OllamaError> for PlannerError {
    fn from(err: OllamaError) -> Self {
        match err {
            OllamaError::InvalidResponse(msg) => PlannerError::InvalidResponse(msg),
            other => PlannerError::Unavailable(other.to_string()),
        }
    }
}

#[async_trait]
impl Planner for OllamaPlanner {
    async fn plan(&self, transcript: &Transcript) -> Result<AssistantMessage, PlannerError> {
        let reply = self.client.chat(&self.request(transcript)).await?;
        let message = to_assistant_message(reply)?;
        tracing::debug!(
            model = %self.model,
            proposals = message.proposals.len(),
            "Planner replied"
        );
        Ok(message)
    }
}
