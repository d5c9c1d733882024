//! Weight conversion and display
//!
//! Static factor table anchored at kilograms:
//!
//! | Unit | Factor (kg) |
//! |------|-------------|
//! | `mg` | 1e-6 |
//! | `g`  | 1e-3 |
//! | `kg` | 1 |
//! | `t`  | 1000 |
//!
//! Unknown symbols fail loudly: a silently unconverted weight would corrupt every total
//! computed from it.

use crate::conversion::{self, impl_unit_traits, ConversionUnit};
use crate::error::Result;
use crate::rounding::{render_fixed, render_shortest, round_half_up};
use tracing::trace;

/// Weight units known to the conversion table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WeightUnit {
    Milligram,
    Gram,
    Kilogram,
    Ton,
}

impl ConversionUnit for WeightUnit {
    const ALL: &'static [Self] = &[Self::Milligram, Self::Gram, Self::Kilogram, Self::Ton];
    const CANONICAL: Self = Self::Kilogram;

    fn as_str(self) -> &'static str {
        match self {
            Self::Milligram => "mg",
            Self::Gram => "g",
            Self::Kilogram => "kg",
            Self::Ton => "t",
        }
    }

    fn factor(self) -> f64 {
        match self {
            Self::Milligram => 1.0 / 1000.0 / 1000.0,
            Self::Gram => 1.0 / 1000.0,
            Self::Kilogram => 1.0,
            Self::Ton => 1000.0,
        }
    }
}

impl_unit_traits!(WeightUnit);

impl WeightUnit {
    /// Pick the display unit for a weight expressed in kilograms
    ///
    /// Thresholds: `< 0.001 kg` → mg, `< 1 kg` → g, `< 1000 kg` → kg, otherwise t.
    pub fn for_magnitude_kg(kg: f64) -> Self {
        let magnitude = kg.abs();
        if magnitude < 0.001 {
            Self::Milligram
        } else if magnitude < 1.0 {
            Self::Gram
        } else if magnitude < 1000.0 {
            Self::Kilogram
        } else {
            Self::Ton
        }
    }
}

/// True if the symbol belongs to the weight table
pub fn is_weight_unit_symbol(symbol: &str) -> bool {
    WeightUnit::from_symbol(symbol).is_some()
}

/// Convert a weight between two unit symbols
///
/// ```
/// assert_eq!(haul_units::weight::convert(1500.0, "g", "kg").unwrap(), 1.5);
/// ```
pub fn convert(value: f64, from: &str, to: &str) -> Result<f64> {
    conversion::convert_symbols::<WeightUnit>(value, from, to)
}

/// Display options for [`format_weight`]
#[derive(Debug, Clone, PartialEq)]
pub struct WeightFormatOptions {
    /// Unit symbol appended to the value
    pub unit: Option<String>,
    /// Append the unit (default). Only an explicit `false` hides it.
    pub with_unit: bool,
    /// Round half-up and render with exactly this many decimals
    pub max_decimals: Option<u32>,
}

impl Default for WeightFormatOptions {
    fn default() -> Self {
        Self {
            unit: None,
            with_unit: true,
            max_decimals: None,
        }
    }
}

impl WeightFormatOptions {
    pub fn with_unit(unit: impl Into<String>) -> Self {
        Self {
            unit: Some(unit.into()),
            ..Self::default()
        }
    }

    pub fn max_decimals(mut self, decimals: u32) -> Self {
        self.max_decimals = Some(decimals);
        self
    }

    pub fn hide_unit(mut self) -> Self {
        self.with_unit = false;
        self
    }
}

/// Format a weight value; a missing value formats to the empty string
pub fn format_weight(value: Option<f64>, opts: &WeightFormatOptions) -> String {
    let Some(value) = value else {
        return String::new();
    };

    let mut text = match opts.max_decimals {
        Some(decimals) => render_fixed(round_half_up(value, decimals), decimals),
        None => render_shortest(value),
    };

    if opts.with_unit {
        if let Some(unit) = opts.unit.as_deref().filter(|u| !u.is_empty()) {
            text.push(' ');
            text.push_str(unit);
        }
    }
    text
}

/// Format a weight, choosing the display unit by magnitude
///
/// The value is first normalized to kilograms, then a target unit is selected from the
/// kilogram magnitude and the value converted once more before formatting.
pub fn format_weight_auto(
    value: Option<f64>,
    unit: &str,
    opts: &WeightFormatOptions,
) -> Result<String> {
    let Some(value) = value else {
        return Ok(String::new());
    };

    let kg = convert(value, unit, WeightUnit::CANONICAL.as_str())?;
    let target = WeightUnit::for_magnitude_kg(kg);
    let converted = conversion::convert_units(kg, WeightUnit::CANONICAL, target);
    trace!(value, unit, target = target.as_str(), converted, "auto weight unit");

    let target_opts = WeightFormatOptions {
        unit: Some(target.as_str().to_string()),
        ..opts.clone()
    };
    Ok(format_weight(Some(converted), &target_opts))
}
