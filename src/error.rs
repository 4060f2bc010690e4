//! Error types for Custodian

use thiserror::Error;

/// Result type alias for Custodian operations
pub type Result<T> = std::result::Result<T, CustodianError>;

/// Main error type for Custodian
#[derive(Error, Debug)]
pub enum CustodianError {
    #[error("Destination error: {0}")]
    Destination(String),

    #[error("Document not found: {0}")]
    NotFound(String),

    #[error("Location not found: {0}")]
    LocationNotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Queue error: {0}")]
    Queue(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CustodianError {
    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            CustodianError::Destination(_) | CustodianError::Queue(_)
        )
    }
}
