//! Sampling ratio presentation
//!
//! A sampling ratio is stored as a fraction in `[0, 1]` and shown either as a percentage
//! (`15%`) or as a raising factor (`1/5`). Parsing inverts the same formulas.

use crate::error::{Result, UnitsError};
use crate::rounding::{render_trimmed, round_half_up};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Decimals kept on a stored ratio
pub const DEFAULT_MAX_DECIMALS: u32 = 6;

/// Decimals shown on a formatted percentage unless the caller asks otherwise
pub const DEFAULT_DISPLAY_DECIMALS: u32 = 2;

/// Decimals of the `w` factor in `1/w`
const RAISING_FACTOR_DECIMALS: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SamplingRatioFormat {
    #[default]
    #[serde(rename = "%")]
    Percent,
    #[serde(rename = "1/w")]
    OneOverW,
}

impl SamplingRatioFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Percent => "%",
            Self::OneOverW => "1/w",
        }
    }
}

impl fmt::Display for SamplingRatioFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SamplingRatioFormat {
    type Err = UnitsError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "%" => Ok(Self::Percent),
            "1/w" => Ok(Self::OneOverW),
            other => Err(UnitsError::invalid_ratio(format!("unknown format '{other}'"))),
        }
    }
}

/// Format a stored ratio for display
///
/// `None` (or NaN) formats to the empty string, as does a missing format.
///
/// ```
/// use haul_units::sampling_ratio::{format_sampling_ratio, SamplingRatioFormat};
/// assert_eq!(format_sampling_ratio(Some(0.2), Some(SamplingRatioFormat::OneOverW), None), "1/5");
/// assert_eq!(format_sampling_ratio(Some(0.155), Some(SamplingRatioFormat::Percent), None), "15.5%");
/// ```
pub fn format_sampling_ratio(
    value: Option<f64>,
    format: Option<SamplingRatioFormat>,
    max_decimals: Option<u32>,
) -> String {
    let (Some(value), Some(format)) = (value, format) else {
        return String::new();
    };
    if value.is_nan() {
        return String::new();
    }

    match format {
        SamplingRatioFormat::Percent => {
            let decimals = max_decimals.unwrap_or(DEFAULT_DISPLAY_DECIMALS);
            let percent = round_half_up(value * 100.0, decimals);
            format!("{}%", render_trimmed(percent, decimals))
        }
        SamplingRatioFormat::OneOverW => {
            let factor = round_half_up(1.0 / value, RAISING_FACTOR_DECIMALS);
            if !factor.is_finite() {
                return String::new();
            }
            format!("1/{}", render_trimmed(factor, RAISING_FACTOR_DECIMALS))
        }
    }
}

/// Detect the format from the text markers, falling back to `default`
pub fn detect_sampling_ratio_format(
    text: &str,
    default: Option<SamplingRatioFormat>,
) -> Option<SamplingRatioFormat> {
    let text = text.trim();
    if text.ends_with('%') {
        Some(SamplingRatioFormat::Percent)
    } else if text.starts_with("1/") {
        Some(SamplingRatioFormat::OneOverW)
    } else {
        default
    }
}

/// True when the displayed text was derived by a computation rather than typed by a user
///
/// A percentage is computed when it lacks the trailing `%` or carries a `/`; a raising factor
/// is computed when it lacks the `1/` prefix. Empty text is never computed.
pub fn is_sampling_ratio_computed(text: &str, format: Option<SamplingRatioFormat>) -> bool {
    if text.is_empty() {
        return false;
    }
    match format.or_else(|| detect_sampling_ratio_format(text, None)) {
        Some(SamplingRatioFormat::Percent) => !text.ends_with('%') || text.contains('/'),
        Some(SamplingRatioFormat::OneOverW) => !text.starts_with("1/"),
        None => false,
    }
}

/// Parse user text back into a stored ratio
///
/// Percent input is divided by 100 and capped at 1; `1/w` input (with or without the `1/`
/// prefix) is inverted. `,` is accepted as decimal separator. Blank text yields `None`.
pub fn parse_sampling_ratio(
    text: &str,
    format: SamplingRatioFormat,
    max_decimals: Option<u32>,
) -> Result<Option<f64>> {
    let decimals = max_decimals.unwrap_or(DEFAULT_MAX_DECIMALS);
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }

    let ratio = match format {
        SamplingRatioFormat::Percent => {
            let number = parse_decimal(trimmed.strip_suffix('%').unwrap_or(trimmed))?;
            if number < 0.0 {
                return Err(UnitsError::invalid_ratio(format!("negative percentage '{text}'")));
            }
            round_half_up(number / 100.0, decimals).min(1.0)
        }
        SamplingRatioFormat::OneOverW => {
            let number = parse_decimal(trimmed.strip_prefix("1/").unwrap_or(trimmed))?;
            if number <= 0.0 {
                return Err(UnitsError::invalid_ratio(format!("raising factor must be positive: '{text}'")));
            }
            round_half_up(1.0 / number, decimals)
        }
    };
    Ok(Some(ratio))
}

fn parse_decimal(text: &str) -> Result<f64> {
    let normalized = text.trim().replace(',', ".");
    let value = normalized
        .parse::<f64>()
        .map_err(|_| UnitsError::invalid_number(text.to_string()))?;
    if value.is_finite() {
        Ok(value)
    } else {
        Err(UnitsError::invalid_number(text.to_string()))
    }
}
