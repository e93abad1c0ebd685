//! Error types for queue lifecycle operations.

use std::time::Duration;
use thiserror::Error;

/// Error taxonomy for every remote call the controller makes
#[derive(Debug, Error)]
pub enum QueueError {
    /// Queue or message is absent. Used as a signal, not an anomaly.
    #[error("Not found: {entity}")]
    NotFound { entity: String },

    #[error("Message lock conflict: {message}")]
    LockConflict { message: String },

    #[error("Message {message_index} is too large and cannot be sent: {size} bytes (max: {max_size})")]
    PayloadTooLarge {
        message_index: usize,
        size: usize,
        max_size: usize,
    },

    #[error("Entity already exists: {name}")]
    EntityExists { name: String },

    #[error("Transient failure: {message}")]
    Transient { message: String },

    #[error("{operation} did not succeed after {attempts} attempts")]
    Timeout { operation: String, attempts: u32 },

    #[error("Fatal error: {message}")]
    Fatal { message: String },

    #[error("Validation error: {0}")]
    ValidationError(#[from] ValidationError),

    #[error("Configuration error: {0}")]
    ConfigurationError(#[from] ConfigurationError),
}

impl QueueError {
    /// Check if error is transient and should be retried
    pub fn is_transient(&self) -> bool {
        match self {
            Self::NotFound { .. } => false,
            Self::LockConflict { .. } => false,
            Self::PayloadTooLarge { .. } => false,
            Self::EntityExists { .. } => false,
            Self::Transient { .. } => true,
            Self::Timeout { .. } => false,
            Self::Fatal { .. } => false,
            Self::ValidationError(_) => false,
            Self::ConfigurationError(_) => false,
        }
    }

    /// Check if error reports a missing queue or message
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Get suggested retry delay
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::Transient { .. } => Some(Duration::from_secs(2)),
            _ => None,
        }
    }

    /// Lock conflict reported by the broker when a message cannot be locked
    pub(crate) fn lock_lost(detail: impl std::fmt::Display) -> Self {
        Self::LockConflict {
            message: format!(
                "Failed to lock one or more specified messages. Either the message is already locked or does not exist. ({})",
                detail
            ),
        }
    }
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("Invalid configuration: {message}")]
    Invalid { message: String },

    #[error("Missing required configuration: {key}")]
    Missing { key: String },

    #[error("Configuration parsing failed: {message}")]
    Parsing { message: String },
}

/// Validation errors
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Required field missing: {field}")]
    Required { field: String },

    #[error("Invalid format for {field}: {message}")]
    InvalidFormat { field: String, message: String },

    #[error("Value out of range for {field}: {message}")]
    OutOfRange { field: String, message: String },
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
