//! Length conversion, anchored at metres

use crate::conversion::{self, impl_unit_traits, ConversionUnit};
use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LengthUnit {
    Millimetre,
    Centimetre,
    Decimetre,
    Metre,
    Kilometre,
}

impl ConversionUnit for LengthUnit {
    const ALL: &'static [Self] = &[
        Self::Millimetre,
        Self::Centimetre,
        Self::Decimetre,
        Self::Metre,
        Self::Kilometre,
    ];
    const CANONICAL: Self = Self::Metre;

    fn as_str(self) -> &'static str {
        match self {
            Self::Millimetre => "mm",
            Self::Centimetre => "cm",
            Self::Decimetre => "dm",
            Self::Metre => "m",
            Self::Kilometre => "km",
        }
    }

    fn factor(self) -> f64 {
        match self {
            Self::Millimetre => 0.001,
            Self::Centimetre => 0.01,
            Self::Decimetre => 0.1,
            Self::Metre => 1.0,
            Self::Kilometre => 1000.0,
        }
    }
}

impl_unit_traits!(LengthUnit);

pub fn is_length_unit_symbol(symbol: &str) -> bool {
    LengthUnit::from_symbol(symbol).is_some()
}

/// Convert a length between two unit symbols; same contract as [`crate::weight::convert`]
pub fn convert(value: f64, from: &str, to: &str) -> Result<f64> {
    conversion::convert_symbols::<LengthUnit>(value, from, to)
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;

    #[test]
    fn test_convert_length() {
        assert!((convert(25.0, "cm", "mm").unwrap() - 250.0).abs() < 1e-9);
        assert!((convert(1.5, "km", "m").unwrap() - 1500.0).abs() < 1e-9);
        assert!((convert(3.0, "dm", "cm").unwrap() - 30.0).abs() < 1e-9);
    }

    #[test]
    fn test_unknown_length_unit() {
        let err = convert(1.0, "in", "cm").unwrap_err();
        assert!(err.to_string().contains("'in'"));
        assert!(convert(1.0, "kg", "m").is_err());
    }

    #[test]
    fn test_length_symbols() {
        assert!(is_length_unit_symbol("mm"));
        assert!(!is_length_unit_symbol("g"));
        assert_eq!(" cm ".parse::<LengthUnit>().unwrap(), LengthUnit::Centimetre);
    }
}
