//! Shared types for the statistician engine
//!
//! This crate holds the definition document model, stream values, and
//! reset-period specifications consumed by the `processor` crate.

pub mod definition;
pub mod errors;
pub mod period;
pub mod value;

// Re-export commonly used types
pub use definition::{FunctionRequest, GroupDefinition, StatFunction, StatsDefinition};
pub use errors::{DefinitionError, Result};
pub use period::ResetPeriod;
pub use value::{Observation, StreamValue, ValueKind};
