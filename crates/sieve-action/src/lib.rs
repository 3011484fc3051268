//! Action side of Sieve: the action catalog, human confirmation, the
//! planner contract and the orchestration loop that ties them to the
//! intent sieve.

pub mod confirmation;
pub mod error;
pub mod handler;
pub mod orchestrator;
pub mod planner;
pub mod state;

pub use confirmation::{ConsoleGate, FixedGate, HumanGate, QueueGate};
pub use error::{ActionError, OrchestratorError, PlannerError};
pub use handler::{ActionCatalog, ActionDescriptor, ActionHandler};
pub use orchestrator::{Orchestrator, RunOutcome};
pub use planner::{Planner, ScriptedPlanner};
pub use state::{OrchestrationState, Phase};
