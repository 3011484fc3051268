//! Llama Guard served by Ollama as the sieve's neural layer.

use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;

use sieve_core::config::GuardConfig;
use sieve_policy::{GuardClassifier, GuardError, GuardLabel, GuardRequest};

use crate::client::{ChatMessage, ChatOptions, ChatRequest, OllamaClient};
use crate::error::OllamaError;

/// Llama Guard hazard category codes, e.g. `S1`, `S14`.
static CATEGORY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bS(\d{1,2})\b").expect("Invalid category regex"));

pub struct OllamaGuard {
    client: OllamaClient,
    model: String,
}

impl OllamaGuard {
    pub fn new(config: &GuardConfig) -> Result<Self, OllamaError> {
        let client = OllamaClient::new(&config.endpoint, Duration::from_secs(config.timeout_secs))?;
        Ok(Self {
            client,
            model: config.model.clone(),
        })
    }

    fn request(&self, guard_request: &GuardRequest) -> ChatRequest {
        ChatRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage::new("user", guard_request.prompt())],
            stream: false,
            tools: Vec::new(),
            options: ChatOptions { temperature: 0.0 },
        }
    }
}

/// Parse a Llama Guard reply: "safe", or "unsafe" followed by category codes.
pub fn parse_label(reply: &str) -> Result<GuardLabel, GuardError> {
    let text = reply.trim();
    if text.is_empty() {
        return Err(GuardError::InvalidResponse("empty reply".to_string()));
    }
    if !text.to_lowercase().contains("unsafe") {
        return Ok(GuardLabel::Safe);
    }

    let mut categories: Vec<String> = Vec::new();
    for caps in CATEGORY.captures_iter(text) {
        let code = format!("S{}", &caps[1]);
        if !categories.contains(&code) {
            categories.push(code);
        }
    }
    Ok(GuardLabel::Unsafe { categories })
}

impl From<OllamaError> for GuardError {
    fn from(err: OllamaError) -> Self {
        match err {
            OllamaError::Timeout => GuardError::Unavailable("request timed out".to_string()),
            OllamaError::InvalidResponse(msg) => GuardError::InvalidResponse(msg),
            other => GuardError::Unavailable(other.to_string()),
        }
    }
}

#[async_trait]
impl GuardClassifier for OllamaGuard {
    async fn classify(&self, request: &GuardRequest) -> Result<GuardLabel, GuardError> {
        let reply = self.client.chat(&self.request(request)).await?;
        let label = parse_label(&reply.content)?;
        tracing::debug!(action = %request.action, model = %self.model, flagged = label.is_unsafe(), "Guard replied");
        Ok(label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use sieve_core::types::ActionProposal;

    #[test]
    fn test_parse_safe() {
        assert_eq!(parse_label("safe").unwrap(), GuardLabel::Safe);
        assert_eq!(parse_label("\n\nsafe\n").unwrap(), GuardLabel::Safe);
    }

    #[test]
    fn test_parse_unsafe_with_categories() {
        let label = parse_label("unsafe\nS1,S14").unwrap();
        assert_eq!(
            label,
            GuardLabel::Unsafe {
                categories: vec!["S1".to_string(), "S14".to_string()]
            }
        );
    }

    #[test]
    fn test_parse_unsafe_without_categories() {
        let label = parse_label("UNSAFE").unwrap();
        assert_eq!(label, GuardLabel::Unsafe { categories: vec![] });
    }

    #[test]
    fn test_parse_empty_reply_is_error() {
        assert!(matches!(
            parse_label("   "),
            Err(GuardError::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_ollama_error_maps_to_unavailable() {
        let err: GuardError = OllamaError::Http("connection refused".into()).into();
        assert!(matches!(err, GuardError::Unavailable(ref m) if m.contains("connection refused")));
        let err: GuardError = OllamaError::Timeout.into();
        assert!(matches!(err, GuardError::Unavailable(_)));
    }

    #[test]
    fn test_request_is_single_user_message() {
        let guard = OllamaGuard::new(&GuardConfig::default()).unwrap();
        let proposal = ActionProposal::from_json("delete_files", json!({"reason": "cleanup"}));
        let request = guard.request(&GuardRequest::new("Summarize this page", &proposal));
        assert_eq!(request.model, "llama-guard3:8b");
        assert!(!request.stream);
        assert_eq!(request.messages.len(), 1);
        assert_eq!(request.messages[0].role, "user");
        assert!(request.messages[0]
            .content
            .starts_with("User Intent: Summarize this page\nProposed Action: delete_files("));
    }

    #[tokio::test]
    async fn test_unreachable_server_is_guard_error() {
        let config = GuardConfig {
            endpoint: "http://127.0.0.1:9".to_string(),
            timeout_secs: 2,
            ..GuardConfig::default()
        };
        let guard = OllamaGuard::new(&config).unwrap();
        let proposal = ActionProposal::from_json("read_file", json!({"path": "a.txt"}));
        let result = guard
            .classify(&GuardRequest::new("Read a.txt", &proposal))
            .await;
        assert!(matches!(result, Err(GuardError::Unavailable(_))));
    }
}
