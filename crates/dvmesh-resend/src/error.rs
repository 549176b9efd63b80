//! Resend queue error types

use thiserror::Error;

/// Resend-specific errors
///
/// Admission filtering and "nothing pending" are not errors; they are
/// reported through [`crate::RecordOutcome`] and plain `Option`/`bool` results.
#[derive(Error, Debug)]
pub enum ResendError {
    #[error("Allocation failure while recording resend entry")]
    AllocationFailure,

    #[error("Resend queue full (max {max} entries)")]
    QueueFull { max: usize },

    #[error("Invalid prefix length: {0} (max 128)")]
    InvalidPrefixLength(u8),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Configuration parse error: {0}")]
    Config(#[from] serde_yaml::Error),
}

/// Result type for resend operations
pub type Result<T> = std::result::Result<T, ResendError>;
