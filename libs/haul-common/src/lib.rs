//! Shared runtime plumbing for haul crates
//!
//! # Key Components
//!
//! - **logging**: `tracing-subscriber` initialisation with an optional daily rolling file
//! - **settings**: `figment`-layered settings (defaults, `haul.toml`, `haul.yaml`, `HAUL_*`)

pub mod error;

pub mod logging;

pub mod settings;

// Re-exports
pub use error::{CommonError, Result};
pub use logging::{init_logging, init_test_logging, LogConfig, LogFormat};
pub use settings::{SamplingRatioSettings, Settings, WeightSettings, ENV_PREFIX};
