//! Error types for the guard classifier boundary.

/// Failures talking to a guard classifier.
///
/// Every variant is treated as "classifier unavailable" by the sieve, which
/// then fails closed.
#[derive(Debug, thiserror::Error)]
pub enum GuardError {
    #[error("guard classifier unreachable: {0}")]
    Unavailable(String),
    #[error("guard classifier timed out after {0} ms")]
    Timeout(u64),
    #[error("guard classifier returned an invalid response: {0}")]
    InvalidResponse(String),
}
