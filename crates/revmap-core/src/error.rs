//! Error types for domain parsing.

use thiserror::Error;

/// Errors raised while parsing or validating domain values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// The commit type is not one of the recognised values.
    #[error("invalid commit type: {0:?}")]
    InvalidCommitType(String),

    /// A map identifier is not a positive integer.
    #[error("invalid map id: {0}")]
    InvalidMapId(String),
}

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;
