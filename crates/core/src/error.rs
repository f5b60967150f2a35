//! Unified error types for the split engine.
//!
//! The taxonomy follows the failure surfaces of the pipeline:
//! - Validation: a malformed or unrecognized event; skip it, continue the batch
//! - Delivery: client-side transport failure; the batch is re-enqueued, bounded
//!   by queue capacity
//! - Aggregation: persistence failure during an upsert, surfaced as a 500;
//!   partitions already committed are not rolled back (counters are commutative
//!   and safe to retry)
//!
//! "Insufficient data" is not an error anywhere in this crate: the significance
//! engine reports it as a normal non-significant result.

use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for the split engine.
#[derive(Debug, Error)]
pub enum Error {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("missing required field: {0}")]
    MissingField(String),

    #[error("delivery error: {0}")]
    Delivery(String),

    #[error("aggregation error: {0}")]
    Aggregation(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::MissingField(field.into())
    }

    pub fn delivery(msg: impl Into<String>) -> Self {
        Self::Delivery(msg.into())
    }

    pub fn aggregation(msg: impl Into<String>) -> Self {
        Self::Aggregation(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Get the HTTP status code for this error.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::Validation(_) => 400,
            Self::MissingField(_) => 400,
            Self::Serialization(_) => 400,
            Self::Delivery(_) => 502,
            Self::Aggregation(_) => 500,
            Self::Internal(_) => 500,
        }
    }
}
