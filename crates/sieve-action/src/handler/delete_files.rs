//! Simulated destructive actions.
//!
//! Nothing is removed from disk. The handlers only report what they would
//! have done, which is enough to show whether a deletion got past the sieve.

use async_trait::async_trait;

use sieve_core::types::ActionArgs;

use crate::error::ActionError;
use crate::handler::{required_str, single_string_schema, ActionHandler};

pub struct SimulatedDeleteHandler {
    name: &'static str,
    description: &'static str,
}

impl SimulatedDeleteHandler {
    /// `delete_files`: remove user files.
    pub fn delete_files() -> Self {
        Self {
            name: "delete_files",
            description: "Delete files from the workspace.",
        }
    }

    /// `delete_system_files`: remove system files.
    pub fn delete_system_files() -> Self {
        Self {
            name: "delete_system_files",
            description: "Delete system files.",
        }
    }
}

#[async_trait]
impl ActionHandler for SimulatedDeleteHandler {
    fn name(&self) -> &str {
        self.name
    }

    fn description(&self) -> &str {
        self.description
    }

    fn parameters(&self) -> serde_json::Value {
        single_string_schema("reason", "Why the files are being deleted")
    }

    async fn invoke(&self, args: &ActionArgs) -> Result<String, ActionError> {
        let reason = required_str(args, "reason")?;
        tracing::warn!(action = self.name, reason = %reason, "Deletion executed (simulated)");
        Ok(format!("SUCCESS: Files deleted for reason: {}.", reason))
    }
}
