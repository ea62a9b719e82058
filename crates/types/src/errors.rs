//! Error types for definition documents

use thiserror::Error;

/// Result type alias for definition handling
pub type Result<T> = std::result::Result<T, DefinitionError>;

/// Errors raised while loading or validating a statistics definition
///
/// All of these are construction-time failures: a definition that fails
/// validation must not be registered, not even partially.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DefinitionError {
    /// Two groups in the same definition share a name
    #[error("duplicate group name '{group}' in definition '{definition}'")]
    DuplicateGroup { group: String, definition: String },

    /// A reset period string could not be parsed
    #[error("invalid reset period '{spec}': {reason}")]
    InvalidPeriod { spec: String, reason: String },

    /// A configured reset period adds up to zero time
    #[error("reset period '{spec}' in group '{group}' is empty")]
    EmptyPeriod { group: String, spec: String },

    /// An anchor date could not be parsed as ISO-8601
    #[error("invalid anchor date '{value}' in group '{group}'")]
    InvalidAnchor { group: String, value: String },

    /// A distribution function on a numeric stream has no bucket size
    #[error("function '{function}' in group '{group}' requires a bucketsize parameter")]
    MissingBucketSize { function: String, group: String },

    /// A distribution bucket size must be strictly positive
    #[error("function '{function}' in group '{group}' has a non-positive bucketsize")]
    InvalidBucketSize { function: String, group: String },
}
