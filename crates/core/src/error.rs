// Central Error Type for the Load Generator

use thiserror::Error;

/// Application-level error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Domain error: {0}")]
    Domain(#[from] crate::domain::DomainError),

    /// Malformed rate/range/size inputs. Fatal at startup.
    #[error("Configuration invalid: {0}")]
    Config(String),

    /// Connection, channel or operation failure against the broker.
    #[error("Broker unavailable: {0}")]
    BrokerUnavailable(#[from] crate::port::BrokerError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// True for failures that should abort startup before any worker runs
    pub fn is_config(&self) -> bool {
        matches!(self, AppError::Config(_) | AppError::Domain(_))
    }
}

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;
