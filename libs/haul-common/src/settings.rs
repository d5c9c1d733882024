//! Layered settings
//!
//! Priority (highest to lowest):
//! 1. Environment variables prefixed `HAUL_`, nested keys split on `__`
//!    (e.g. `HAUL_REFERENTIAL__PMFM_IDS__SIZE_CATEGORY=1174`)
//! 2. `haul.yaml`
//! 3. `haul.toml`
//! 4. Default values

use std::path::Path;

use figment::{
    providers::{Env, Format, Json, Serialized, Toml, Yaml},
    Figment,
};
use haul_rules::{ConfigBus, ReferentialConfig};
use haul_units::conversion::convert_units;
use haul_units::{
    detect_sampling_ratio_format, format_sampling_ratio, format_weight, parse_sampling_ratio, ConversionUnit,
    SamplingRatioFormat, WeightFormatOptions, WeightUnit, DEFAULT_DISPLAY_DECIMALS, DEFAULT_MAX_DECIMALS,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{CommonError, Result};
use crate::logging::LogConfig;

pub const ENV_PREFIX: &str = "HAUL_";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingRatioSettings {
    pub format: SamplingRatioFormat,
    /// Decimals shown on a percentage
    pub display_decimals: u32,
    /// Decimals kept on a parsed ratio
    pub max_decimals: u32,
}

impl Default for SamplingRatioSettings {
    fn default() -> Self {
        Self {
            format: SamplingRatioFormat::Percent,
            display_decimals: DEFAULT_DISPLAY_DECIMALS,
            max_decimals: DEFAULT_MAX_DECIMALS,
        }
    }
}

impl SamplingRatioSettings {
    pub fn format_ratio(&self, value: Option<f64>) -> String {
        format_sampling_ratio(value, Some(self.format), Some(self.display_decimals))
    }

    /// Parse user text; a `%` or `1/` marker in the text wins over the configured format
    pub fn parse_ratio(&self, text: &str) -> haul_units::Result<Option<f64>> {
        let format = detect_sampling_ratio_format(text, Some(self.format)).unwrap_or(self.format);
        parse_sampling_ratio(text, format, Some(self.max_decimals))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeightSettings {
    pub display_unit: WeightUnit,
    pub max_decimals: u32,
}

impl Default for WeightSettings {
    fn default() -> Self {
        Self {
            display_unit: WeightUnit::Kilogram,
            max_decimals: 3,
        }
    }
}

impl WeightSettings {
    pub fn format_options(&self) -> WeightFormatOptions {
        WeightFormatOptions::with_unit(self.display_unit.as_str()).max_decimals(self.max_decimals)
    }

    /// Format a weight stored in kilograms in the display unit
    pub fn format_kg(&self, kg: Option<f64>) -> String {
        let value = kg.map(|kg| convert_units(kg, WeightUnit::Kilogram, self.display_unit));
        format_weight(value, &self.format_options())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub log: LogConfig,
    pub sampling_ratio: SamplingRatioSettings,
    pub weight: WeightSettings,
    pub referential: ReferentialConfig,
}

impl Settings {
    /// Load from the working directory and the `HAUL_` environment
    pub fn load() -> Result<Self> {
        Self::load_from(Path::new("."), ENV_PREFIX)
    }

    /// Load `haul.toml` and `haul.yaml` from `dir`, then the environment under `env_prefix`
    pub fn load_from(dir: &Path, env_prefix: &str) -> Result<Self> {
        let settings: Self = Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file(dir.join("haul.toml")))
            .merge(Yaml::file(dir.join("haul.yaml")))
            .merge(Env::prefixed(env_prefix).split("__"))
            .extract()
            .map_err(|e| CommonError::config(format!("Failed to load configuration: {e}")))?;
        debug!(dir = %dir.display(), "Settings loaded");
        Ok(settings)
    }

    /// Load a single file over the defaults, by extension
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let extension = path
            .extension()
            .and_then(|s| s.to_str())
            .ok_or_else(|| CommonError::config("Config file must have an extension"))?;

        let figment = Figment::from(Serialized::defaults(Self::default()));
        let figment = match extension {
            "toml" => figment.merge(Toml::file(path)),
            "yaml" | "yml" => figment.merge(Yaml::file(path)),
            "json" => figment.merge(Json::file(path)),
            _ => {
                return Err(CommonError::config(format!(
                    "Unsupported config file format: {extension}"
                )))
            },
        };

        figment
            .extract()
            .map_err(|e| CommonError::config(format!("Failed to load configuration from file: {e}")))
    }

    /// A configuration bus seeded with the referential section
    pub fn config_bus(&self) -> ConfigBus {
        ConfigBus::new(self.referential.clone())
    }

    /// Publish the referential section on an existing bus
    pub fn publish(&self, bus: &ConfigBus) {
        bus.emit(self.referential.clone());
    }
}
