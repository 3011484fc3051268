//! Action handler trait and the action catalog.
//!
//! Handlers are registered once, by name, when the catalog is built. The
//! orchestrator resolves a proposal's action name through the catalog and
//! calls the single `invoke` entry point; there is no other calling style.

pub mod delete_files;
pub mod read_file;
pub mod web_page;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use sieve_core::config::ActionsConfig;
use sieve_core::types::ActionArgs;

use crate::error::ActionError;

pub use delete_files::SimulatedDeleteHandler;
pub use read_file::ReadFileHandler;
pub use web_page::FetchWebPageHandler;

/// An executable action.
#[async_trait]
pub trait ActionHandler: Send + Sync {
    /// Unique name planners use to call this action.
    fn name(&self) -> &str;

    /// One-line description shown to planners.
    fn description(&self) -> &str;

    /// JSON schema of the arguments object.
    fn parameters(&self) -> serde_json::Value;

    /// Run the action and return its text result.
    async fn invoke(&self, args: &ActionArgs) -> Result<String, ActionError>;
}

/// Planner-facing description of a registered action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionDescriptor {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// Name -> handler registry, built at startup and shared read-only afterwards.
#[derive(Default)]
pub struct ActionCatalog {
    handlers: HashMap<String, Arc<dyn ActionHandler>>,
}

impl ActionCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler under its own name. Names must be unique.
    pub fn register(&mut self, handler: Arc<dyn ActionHandler>) -> Result<(), ActionError> {
        let name = handler.name().to_string();
        if self.handlers.contains_key(&name) {
            return Err(ActionError::Duplicate(name));
        }
        tracing::debug!(action = %name, "Action registered");
        self.handlers.insert(name, handler);
        Ok(())
    }

    /// Register the built-in actions.
    pub fn register_defaults(&mut self, config: &ActionsConfig) -> Result<(), ActionError> {
        self.register(Arc::new(FetchWebPageHandler))?;
        self.register(Arc::new(ReadFileHandler::new(&config.workspace_root)))?;
        self.register(Arc::new(SimulatedDeleteHandler::delete_files()))?;
        self.register(Arc::new(SimulatedDeleteHandler::delete_system_files()))?;
        Ok(())
    }

    /// Catalog with the built-in actions.
    pub fn with_defaults(config: &ActionsConfig) -> Result<Self, ActionError> {
        let mut catalog = Self::new();
        catalog.register_defaults(config)?;
        Ok(catalog)
    }

    pub fn lookup(&self, name: &str) -> Result<Arc<dyn ActionHandler>, ActionError> {
        self.handlers
            .get(name)
            .cloned()
            .ok_or_else(|| ActionError::NotFound(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Descriptors of every registered action, sorted by name.
    pub fn descriptors(&self) -> Vec<ActionDescriptor> {
        let mut descriptors: Vec<ActionDescriptor> = self
            .handlers
            .values()
            .map(|h| ActionDescriptor {
                name: h.name().to_string(),
                description: h.description().to_string(),
                parameters: h.parameters(),
            })
            .collect();
        descriptors.sort_by(|a, b| a.name.cmp(&b.name));
        descriptors
    }
}

/// Fetch a required, non-empty string argument.
pub(crate) fn required_str<'a>(args: &'a ActionArgs, key: &str) -> Result<&'a str, ActionError> {
    match args.get(key).and_then(|v| v.as_str()) {
        Some(value) if !value.trim().is_empty() => Ok(value),
        Some(_) => Err(ActionError::InvalidArguments(format!(
            "'{}' must not be empty",
            key
        ))),
        None => Err(ActionError::InvalidArguments(format!(
            "missing string argument '{}'",
            key
        ))),
    }
}

/// Schema for an action taking a single required string argument.
pub(crate) fn single_string_schema(key: &str, description: &str) -> serde_json::Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            key: { "type": "string", "description": description }
        },
        "required": [key]
    })
}
