//! Ollama backends for Sieve: a Llama Guard classifier and a tool-calling
//! planner, both speaking Ollama's `/api/chat` endpoint.

pub mod client;
pub mod error;
pub mod guard;
pub mod planner;

pub use client::OllamaClient;
pub use error::OllamaError;
pub use guard::OllamaGuard;
pub use planner::OllamaPlanner;
