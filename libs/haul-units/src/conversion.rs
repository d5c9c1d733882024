//! Conversion lattices anchored at a canonical unit
//!
//! A lattice is a fixed table of multiplicative factors relative to one canonical unit
//! (kilograms for weights, metres for lengths). Converting between any two units goes
//! through the canonical unit: `value * factor(from) / factor(to)`.

use crate::error::{Result, UnitsError};
use std::fmt;

/// A unit that belongs to a conversion lattice
pub trait ConversionUnit: Copy + Eq + fmt::Debug + 'static {
    /// Every unit of the lattice, smallest first
    const ALL: &'static [Self];

    /// The unit whose factor is 1
    const CANONICAL: Self;

    /// Display symbol (`kg`, `cm`, ...)
    fn as_str(self) -> &'static str;

    /// Multiplicative factor relative to the canonical unit
    fn factor(self) -> f64;

    /// Lookup by symbol
    fn from_symbol(symbol: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|u| u.as_str() == symbol)
    }
}

/// Factor of a symbol within the lattice of `U`, if known
pub fn factor_of<U: ConversionUnit>(symbol: &str) -> Option<f64> {
    U::from_symbol(symbol).map(ConversionUnit::factor)
}

/// Convert `value` between two unit symbols of the lattice `U`
///
/// Identical symbols short-circuit before any table lookup, so `convert(x, "?", "?")`
/// returns `x` unchanged.
pub fn convert_symbols<U: ConversionUnit>(value: f64, from: &str, to: &str) -> Result<f64> {
    if from == to {
        return Ok(value);
    }
    let factor_from =
        factor_of::<U>(from).ok_or_else(|| UnitsError::unknown_unit(from, from, to))?;
    let factor_to = factor_of::<U>(to).ok_or_else(|| UnitsError::unknown_unit(to, from, to))?;
    Ok(value * factor_from / factor_to)
}

/// Convert between two typed units of the same lattice (infallible)
pub fn convert_units<U: ConversionUnit>(value: f64, from: U, to: U) -> f64 {
    if from == to {
        return value;
    }
    value * from.factor() / to.factor()
}

pub(crate) fn parse_symbol<U: ConversionUnit>(s: &str) -> Result<U> {
    U::from_symbol(s.trim()).ok_or_else(|| UnitsError::UnknownSymbol(s.to_string()))
}

macro_rules! impl_unit_traits {
    ($unit:ty) => {
        impl std::fmt::Display for $unit {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(crate::conversion::ConversionUnit::as_str(*self))
            }
        }

        impl std::str::FromStr for $unit {
            type Err = crate::error::UnitsError;

            fn from_str(s: &str) -> crate::error::Result<Self> {
                crate::conversion::parse_symbol(s)
            }
        }

        impl serde::Serialize for $unit {
            fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
                serializer.serialize_str(crate::conversion::ConversionUnit::as_str(*self))
            }
        }

        impl<'de> serde::Deserialize<'de> for $unit {
            fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
                let symbol = <String as serde::Deserialize>::deserialize(deserializer)?;
                symbol.parse::<Self>().map_err(serde::de::Error::custom)
            }
        }
    };
}

pub(crate) use impl_unit_traits;
