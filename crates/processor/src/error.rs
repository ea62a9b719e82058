//! Error types for the statistics engine
//!
//! This module provides error handling for definition loading, output
//! slot access, reset scheduling, and per-group calculation failures.

use statistician_types::{DefinitionError, StatFunction};
use std::fmt;
use thiserror::Error;

/// Main engine error type
#[derive(Error, Debug)]
pub enum ProcessorError {
    /// Definition loading/validation errors
    #[error("definition error: {0}")]
    Definition(#[from] DefinitionError),

    /// Output slot access errors
    #[error("slot error: {0}")]
    Slot(#[from] SlotError),

    /// Reset scheduling errors
    #[error("schedule error: {0}")]
    Schedule(#[from] ScheduleError),

    /// One or more functions failed while observing a value; the
    /// remaining functions in the same call still ran
    #[error("group '{group}': {n} function(s) failed during observe", n = .failures.len())]
    Observe {
        group: String,
        failures: Vec<FunctionFailure>,
    },

    /// One or more functions failed while resetting a window; the
    /// remaining functions in the same call still ran
    #[error("group '{group}': {n} function(s) failed during reset", n = .failures.len())]
    Reset {
        group: String,
        failures: Vec<FunctionFailure>,
    },

    /// Serialization/deserialization errors
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Generic error for unexpected conditions
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

/// Output slot access errors
#[derive(Error, Debug)]
pub enum SlotError {
    /// The named slot does not exist
    #[error("slot not found: {name}")]
    NotFound { name: String },

    /// The caller is not allowed to touch the named slot
    #[error("access denied for slot '{name}'")]
    Unauthorized { name: String },

    /// The slot holds a value of an unexpected shape
    #[error("slot '{name}' holds {actual}, expected {expected}")]
    TypeMismatch {
        name: String,
        expected: String,
        actual: String,
    },

    /// The platform reported a failure for the named slot or stream
    #[error("platform error on '{name}': {reason}")]
    Platform { name: String, reason: String },
}

/// Reset scheduling errors
#[derive(Error, Debug)]
pub enum ScheduleError {
    /// The reset period adds up to zero seconds
    #[error("reset period is empty")]
    EmptyPeriod,

    /// The external timer mechanism rejected a registration
    #[error("timer registration failed for '{key}': {reason}")]
    Registration { key: String, reason: String },
}

/// A single function's failure inside an `observe`/`reset_window` call
///
/// Failures are collected per group; one function failing never stops
/// the functions after it from running.
#[derive(Debug, Clone)]
pub struct FunctionFailure {
    pub function: StatFunction,
    pub reason: String,
}

impl FunctionFailure {
    pub fn new(function: StatFunction, error: impl fmt::Display) -> Self {
        Self {
            function,
            reason: error.to_string(),
        }
    }
}

impl fmt::Display for FunctionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.function, self.reason)
    }
}

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, ProcessorError>;

/// Result type alias for slot operations
pub type SlotResult<T> = std::result::Result<T, SlotError>;

/// Result type alias for scheduling operations
pub type ScheduleResult<T> = std::result::Result<T, ScheduleError>;

impl From<serde_json::Error> for ProcessorError {
    fn from(err: serde_json::Error) -> Self {
        ProcessorError::Serialization(err.to_string())
    }
}

impl From<anyhow::Error> for ProcessorError {
    fn from(err: anyhow::Error) -> Self {
        ProcessorError::Unexpected(err.to_string())
    }
}
