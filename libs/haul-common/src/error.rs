//! Error types for haul-common

use thiserror::Error;

/// Result type for settings and logging setup
pub type Result<T> = std::result::Result<T, CommonError>;

#[derive(Debug, Error)]
pub enum CommonError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Logging error: {0}")]
    Logging(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CommonError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn logging(msg: impl Into<String>) -> Self {
        Self::Logging(msg.into())
    }
}

impl From<figment::Error> for CommonError {
    fn from(err: figment::Error) -> Self {
        Self::Config(err.to_string())
    }
}
