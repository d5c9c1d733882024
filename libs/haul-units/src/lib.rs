//! Unit-safe arithmetic for catch data
//!
//! # Key Components
//!
//! - **weight**: conversion lattice anchored at kilograms, display with optional auto unit
//! - **length**: conversion lattice anchored at metres
//! - **sampling_ratio**: `%` and `1/w` presentation of a sampling fraction
//! - **rounding**: half-up rounding shared by every formatter

pub mod conversion;

pub mod error;

pub mod length;

pub mod rounding;

pub mod sampling_ratio;

pub mod weight;

// Re-exports
pub use conversion::ConversionUnit;
pub use error::{Result, UnitsError};
pub use length::{is_length_unit_symbol, LengthUnit};
pub use rounding::round_half_up;
pub use sampling_ratio::{
    detect_sampling_ratio_format, format_sampling_ratio, is_sampling_ratio_computed,
    parse_sampling_ratio, SamplingRatioFormat, DEFAULT_DISPLAY_DECIMALS, DEFAULT_MAX_DECIMALS,
};
pub use weight::{
    format_weight, format_weight_auto, is_weight_unit_symbol, WeightFormatOptions, WeightUnit,
};
