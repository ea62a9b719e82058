//! Stream values and observations
//!
//! A monitored stream carries either boolean or numeric values. The
//! distribution functions treat booleans as a fixed two-bucket scheme;
//! every other function coerces them to 0.0/1.0.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single value carried by a monitored stream
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StreamValue {
    /// A boolean stream value
    Bool(bool),
    /// A numeric stream value (integer streams are widened to f64)
    Number(f64),
}

impl StreamValue {
    /// The kind of stream this value belongs to
    pub fn kind(&self) -> ValueKind {
        match self {
            StreamValue::Bool(_) => ValueKind::Boolean,
            StreamValue::Number(_) => ValueKind::Numeric,
        }
    }

    /// Numeric view of the value; booleans coerce to 0.0/1.0
    pub fn as_f64(&self) -> f64 {
        match self {
            StreamValue::Bool(false) => 0.0,
            StreamValue::Bool(true) => 1.0,
            StreamValue::Number(n) => *n,
        }
    }

    /// The boolean payload, if this is a boolean value
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            StreamValue::Bool(b) => Some(*b),
            StreamValue::Number(_) => None,
        }
    }
}

impl From<f64> for StreamValue {
    fn from(value: f64) -> Self {
        StreamValue::Number(value)
    }
}

impl From<bool> for StreamValue {
    fn from(value: bool) -> Self {
        StreamValue::Bool(value)
    }
}

impl fmt::Display for StreamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamValue::Bool(b) => write!(f, "{}", b),
            StreamValue::Number(n) => write!(f, "{}", n),
        }
    }
}

/// The value type of a stream, as declared by its profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    Boolean,
    Numeric,
}

/// A stream value together with the instant it was observed
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    /// The observed value
    pub value: StreamValue,
    /// When the stream reported it
    pub timestamp: DateTime<Utc>,
}

impl Observation {
    /// Create a new observation
    pub fn new(value: impl Into<StreamValue>, timestamp: DateTime<Utc>) -> Self {
        Self {
            value: value.into(),
            timestamp,
        }
    }
}

impl fmt::Display for Observation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} @ {}", self.value, self.timestamp.to_rfc3339())
    }
}
