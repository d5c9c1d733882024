//! Reference identifiers used by the batch model
//!
//! PMFM and qualitative value ids are configuration-dependent: every table below has
//! serde defaults equal to the reference database values, and any field can be overridden
//! from settings. Method and quality flag ids are fixed.

use serde::{Deserialize, Serialize};

/// PMFM ids consulted by the batch model and rule sets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct PmfmIds {
    pub discard_or_landing: i32,
    pub discard_reason: i32,
    pub discard_weight: i32,
    pub batch_sorting: i32,
    pub size_category: i32,
    pub trawl_size_cat: i32,
    pub batch_gear_position: i32,
    pub child_gear: i32,
    pub gear_label: i32,
    pub length_total_cm: i32,
    pub batch_measured_weight: i32,
    pub batch_estimated_weight: i32,
    pub batch_calculated_weight: i32,
    pub batch_calculated_weight_length: i32,
    pub batch_calculated_weight_length_sum: i32,
}

impl Default for PmfmIds {
    fn default() -> Self {
        Self {
            discard_or_landing: 90,
            discard_reason: 95,
            discard_weight: 56,
            batch_sorting: 176,
            size_category: 174,
            trawl_size_cat: 418,
            batch_gear_position: 411,
            child_gear: 400,
            gear_label: 120,
            length_total_cm: 81,
            batch_measured_weight: 91,
            batch_estimated_weight: 92,
            batch_calculated_weight: 93,
            batch_calculated_weight_length: 122,
            batch_calculated_weight_length_sum: 123,
        }
    }
}

/// Qualitative value ids of the sorting PMFMs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct QualitativeValueIds {
    pub landing: i32,
    pub discard: i32,
    pub bulk: i32,
    pub non_bulk: i32,
    pub gear_position_port: i32,
    pub gear_position_starboard: i32,
}

impl Default for QualitativeValueIds {
    fn default() -> Self {
        Self {
            landing: 190,
            discard: 191,
            bulk: 390,
            non_bulk: 391,
            gear_position_port: 473,
            gear_position_starboard: 474,
        }
    }
}

/// Measurement method ids
pub mod method_ids {
    pub const MEASURED_BY_OBSERVER: i32 = 1;
    pub const OBSERVED_BY_OBSERVER: i32 = 2;
    pub const ESTIMATED_BY_OBSERVER: i32 = 3;
    pub const CALCULATED: i32 = 4;
    pub const CALCULATED_WEIGHT_LENGTH: i32 = 47;
    pub const CALCULATED_WEIGHT_LENGTH_SUM: i32 = 283;

    pub fn is_calculated(method_id: i32) -> bool {
        matches!(
            method_id,
            CALCULATED | CALCULATED_WEIGHT_LENGTH | CALCULATED_WEIGHT_LENGTH_SUM
        )
    }
}

/// Data quality flags
pub mod quality_flag_ids {
    pub const NOT_QUALIFIED: i32 = 0;
    pub const GOOD: i32 = 1;
    pub const DOUBTFUL: i32 = 3;
    pub const BAD: i32 = 4;
}

/// Qualitative labels carried in branch label suffixes
pub mod qualitative_labels {
    pub const LANDING: &str = "LAN";
    pub const DISCARD: &str = "DIS";
}
