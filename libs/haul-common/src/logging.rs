//! Logging initialisation

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry};

use crate::error::{CommonError, Result};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Filter directive (`info`, `haul_tree=debug,warn`, ...)
    pub level: String,
    pub format: LogFormat,
    /// ANSI colors on the console
    pub ansi: bool,
    /// Daily rolling log file, in addition to the console
    pub file: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    #[default]
    Pretty,
    Compact,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
            ansi: true,
            file: None,
        }
    }
}

impl LogConfig {
    pub fn env_filter(&self) -> Result<EnvFilter> {
        EnvFilter::try_new(&self.level)
            .or_else(|_| EnvFilter::try_new("info"))
            .map_err(|e| CommonError::logging(format!("Invalid log level: {e}")))
    }
}

/// Initialize the global subscriber
///
/// Returns the file writer guard, which must outlive logging. A subscriber already set
/// (by a previous call or by a test harness) is reported as an error, never a panic.
pub fn init_logging(config: &LogConfig) -> Result<Option<WorkerGuard>> {
    let mut layers: Vec<BoxedLayer> = Vec::new();
    let mut guard = None;

    let console: BoxedLayer = match config.format {
        LogFormat::Json => fmt::layer().json().with_ansi(config.ansi).with_target(true).boxed(),
        LogFormat::Pretty => fmt::layer().pretty().with_ansi(config.ansi).with_target(true).boxed(),
        LogFormat::Compact => fmt::layer().compact().with_ansi(config.ansi).with_target(true).boxed(),
    };
    layers.push(console.with_filter(config.env_filter()?).boxed());

    if let Some(file_path) = &config.file {
        let path = Path::new(file_path);
        let directory = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
        std::fs::create_dir_all(directory)?;
        let file_name = path.file_name().and_then(|n| n.to_str()).unwrap_or("haul.log");

        let appender = tracing_appender::rolling::daily(directory, file_name);
        let (writer, file_guard) = tracing_appender::non_blocking(appender);
        guard = Some(file_guard);

        let file: BoxedLayer = match config.format {
            LogFormat::Json => fmt::layer().json().with_writer(writer).with_ansi(false).boxed(),
            LogFormat::Pretty | LogFormat::Compact => {
                fmt::layer().compact().with_writer(writer).with_ansi(false).boxed()
            },
        };
        layers.push(file.with_filter(config.env_filter()?).boxed());
    }

    tracing_subscriber::registry()
        .with(layers)
        .try_init()
        .map_err(|e| CommonError::logging(format!("Failed to initialize logging: {e}")))?;

    Ok(guard)
}

/// Debug logging into the test output; repeated calls are ignored
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("debug")
        .with_test_writer()
        .try_init();
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;

    #[test]
    fn test_invalid_level_falls_back() {
        let config = LogConfig {
            level: "[[not a directive".to_string(),
            ..LogConfig::default()
        };
        assert!(config.env_filter().is_ok());
    }

    #[test]
    fn test_format_from_lowercase() {
        let config = config_with_format("json");
        assert_eq!(config.format, LogFormat::Json);
        assert_eq!(config.level, "info");
    }

    fn config_with_format(format: &str) -> LogConfig {
        use figment::{providers::Serialized, Figment};
        Figment::from(Serialized::defaults(LogConfig::default()))
            .merge(Serialized::default("format", format))
            .extract()
            .unwrap()
    }

    #[test]
    fn test_second_init_does_not_panic() {
        init_test_logging();
        init_test_logging();
        assert!(init_logging(&LogConfig::default()).is_err());
    }
}
