pub mod config;
pub mod error;
pub mod types;

pub use config::{BlockPolicy, GuardPolicy, SieveConfig};
pub use error::{Result, SieveError, StopReason};
pub use types::*;
