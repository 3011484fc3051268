//! Intent sieve for Sieve.
//!
//! Judges each action a planner proposes against the user's original
//! request: a symbolic drift check, a neural guard classifier, and risk
//! routing into allow / block / review.

pub mod error;
pub mod guard;
pub mod sieve;
pub mod symbolic;

pub use error::GuardError;
pub use guard::{GuardClassifier, GuardLabel, GuardRequest, KeywordGuard};
pub use sieve::IntentSieve;
pub use symbolic::{SymbolicCheck, SymbolicLayer};
