// Domain Error Types

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("Invalid queue range: {0}")]
    InvalidQueueRange(String),

    #[error("Invalid payload size: min {min} > max {max}")]
    InvalidPayloadSize { min: usize, max: usize },

    #[error("Validation error: {0}")]
    ValidationError(String),
}

pub type Result<T> = std::result::Result<T, DomainError>;
