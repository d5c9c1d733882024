//! Error types for haul-units

use thiserror::Error;

/// Unit conversion and ratio parsing errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum UnitsError {
    /// A unit symbol missing from the conversion table, with the attempted direction
    #[error("Unknown unit '{unit}' (converting from '{from}' to '{to}')")]
    UnknownUnit {
        unit: String,
        from: String,
        to: String,
    },

    #[error("Unknown unit symbol: {0}")]
    UnknownSymbol(String),

    #[error("Invalid sampling ratio: {0}")]
    InvalidRatio(String),

    #[error("Invalid number: {0}")]
    InvalidNumber(String),
}

impl UnitsError {
    pub fn unknown_unit(unit: impl Into<String>, from: impl Into<String>, to: impl Into<String>) -> Self {
        Self::UnknownUnit {
            unit: unit.into(),
            from: from.into(),
            to: to.into(),
        }
    }

    pub fn invalid_ratio(msg: impl Into<String>) -> Self {
        Self::InvalidRatio(msg.into())
    }

    pub fn invalid_number(msg: impl Into<String>) -> Self {
        Self::InvalidNumber(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, UnitsError>;
