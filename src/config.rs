//! YAML configuration for the `analogcast` binary.
//!
//! One file carries the forecast engine settings (see
//! [`ForecastConfig`]) plus the process-level `logging` and `metrics`
//! sections. Every section is optional and falls back to its defaults.
//!
//! ## Example YAML Configuration
//!
//! ```yaml
//! version: "1.0"
//! name: "operational"
//!
//! index:
//!   variant: exact          # or "quantized"
//!   dimension: 256
//!   parallel_threshold: 4096
//!
//! data:
//!   data_dir: "./artifacts"  # holds 6h.aidx, 6h.aout, 12h.aidx, ...
//!   horizons:
//!     48h:
//!       index_path: "/srv/analogs/48h-v2.aidx"
//!
//! search:
//!   latency_budget_ms: 250
//!   max_k: 200
//!
//! validation:
//!   min_k: 5
//!   epsilon: 0.00001
//!   plausibility_tolerance: 0.001
//!
//! fallback:
//!   seed: 42
//!   climatology:
//!     24h:
//!       temperature_2m: { mean: 9.5, stddev: 10.0 }
//!
//! aggregate:
//!   reference_spread:
//!     total_precipitation: 4.0
//!
//! logging:
//!   level: "info"
//!   json: false
//!
//! metrics:
//!   prometheus_listen: "0.0.0.0:9184"
//! ```

use std::fs;
use std::net::SocketAddr;
use std::path::Path;

use forecast::ForecastConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur when loading YAML configuration files
#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("unsupported config version: {0}")]
    UnsupportedVersion(String),
}

impl From<forecast::ConfigError> for ConfigLoadError {
    fn from(err: forecast::ConfigError) -> Self {
        ConfigLoadError::Validation(err.0)
    }
}

/// Top-level YAML configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalogConfig {
    /// Configuration format version
    pub version: String,

    /// Optional configuration name/description
    #[serde(default)]
    pub name: Option<String>,

    /// Engine sections (`index`, `data`, `search`, `validation`, `fallback`, `aggregate`)
    #[serde(flatten)]
    pub engine: ForecastConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl AnalogConfig {
    /// Load a YAML configuration file from the given path.
    ///
    /// A relative `data.data_dir` is resolved against the file's directory.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigLoadError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        let mut config = Self::from_yaml(&content)?;
        if let (Some(dir), Some(base)) = (config.engine.data.data_dir.as_mut(), path.parent()) {
            if dir.is_relative() {
                *dir = base.join(&*dir);
            }
        }
        Ok(config)
    }

    /// Parse YAML configuration from a string
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigLoadError> {
        let config: AnalogConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigLoadError> {
        match self.version.as_str() {
            "1.0" | "1" => Ok(()),
            v => Err(ConfigLoadError::UnsupportedVersion(v.to_string())),
        }?;

        self.engine.validate()?;
        self.logging.validate()?;
        self.metrics.validate()?;
        Ok(())
    }
}

impl Default for AnalogConfig {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            name: None,
            engine: ForecastConfig::default(),
            logging: LoggingConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive; `ANALOGCAST_LOG` overrides it.
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub json: bool,
}

impl LoggingConfig {
    fn validate(&self) -> Result<(), ConfigLoadError> {
        if self.level.trim().is_empty() {
            return Err(ConfigLoadError::Validation(
                "logging.level must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Address for the Prometheus scrape endpoint. Unset disables export.
    #[serde(default)]
    pub prometheus_listen: Option<String>,
}

impl MetricsConfig {
    pub fn listen_addr(&self) -> Result<Option<SocketAddr>, ConfigLoadError> {
        self.prometheus_listen
            .as_deref()
            .map(|addr| {
                addr.parse().map_err(|e| {
                    ConfigLoadError::Validation(format!(
                        "metrics.prometheus_listen {addr:?} is not a socket address: {e}"
                    ))
                })
            })
            .transpose()
    }

    fn validate(&self) -> Result<(), ConfigLoadError> {
        self.listen_addr().map(|_| ())
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use forecast::Horizon;
    use index::IndexVariant;
    use outcomes::Variable;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_valid_yaml() {
        let yaml = r#"
version: "1.0"
name: "test config"
index:
  variant: quantized
search:
  latency_budget_ms: 80
logging:
  level: "debug"
"#;

        let config = AnalogConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.name, Some("test config".to_string()));
        assert_eq!(config.engine.index.variant, IndexVariant::Quantized);
        assert_eq!(config.engine.index.dimension, 256);
        assert_eq!(config.engine.search.latency_budget_ms, 80);
        assert_eq!(config.engine.search.max_k, 200);
        assert_eq!(config.logging.level, "debug");
        assert!(!config.logging.json);
        assert!(config.metrics.prometheus_listen.is_none());
    }

    #[test]
    fn test_load_from_file_resolves_relative_data_dir() {
        let yaml = r#"
version: "1"
data:
  data_dir: "artifacts"
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(yaml.as_bytes()).unwrap();

        let config = AnalogConfig::from_file(temp_file.path()).unwrap();
        let base = temp_file.path().parent().unwrap();
        assert_eq!(
            config.engine.data.index_path(Horizon::H6),
            Some(base.join("artifacts").join("6h.aidx"))
        );
    }

    #[test]
    fn test_default_config() {
        let config = AnalogConfig::default();
        assert_eq!(config.version, "1.0");
        assert_eq!(config.logging.level, "info");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_unsupported_version() {
        let err = AnalogConfig::from_yaml("version: \"2.0\"\n").unwrap_err();
        assert!(matches!(err, ConfigLoadError::UnsupportedVersion(v) if v == "2.0"));
    }

    #[test]
    fn test_engine_validation_surfaces() {
        let yaml = r#"
version: "1.0"
search:
  max_k: 0
"#;
        let err = AnalogConfig::from_yaml(yaml).unwrap_err();
        assert!(err.to_string().contains("max_k"));
    }

    #[test]
    fn test_bad_prometheus_address() {
        let yaml = r#"
version: "1.0"
metrics:
  prometheus_listen: "not-an-address"
"#;
        let err = AnalogConfig::from_yaml(yaml).unwrap_err();
        assert!(err.to_string().contains("prometheus_listen"));
    }

    #[test]
    fn test_full_yaml() {
        let yaml = r#"
version: "1.0"
name: "production"
index:
  variant: exact
  dimension: 256
  parallel_threshold: 1024
data:
  data_dir: "/srv/analogs"
  horizons:
    48h:
      index_path: "/srv/analogs/48h-v2.aidx"
search:
  latency_budget_ms: 250
  max_k: 200
validation:
  min_k: 5
  epsilon: 0.00001
  plausibility_tolerance: 0.001
fallback:
  seed: 42
  climatology:
    24h:
      temperature_2m: { mean: 9.5, stddev: 10.0 }
aggregate:
  reference_spread:
    total_precipitation: 4.0
logging:
  level: "warn"
  json: true
metrics:
  prometheus_listen: "127.0.0.1:9184"
"#;

        let config = AnalogConfig::from_yaml(yaml).unwrap();
        let engine = &config.engine;
        assert_eq!(engine.index.parallel_threshold, 1024);
        assert_eq!(
            engine.data.index_path(Horizon::H48),
            Some("/srv/analogs/48h-v2.aidx".into())
        );
        assert_eq!(
            engine.data.outcome_path(Horizon::H48),
            Some("/srv/analogs/48h.aout".into())
        );
        assert_eq!(engine.validation.min_k, 5);
        assert_eq!(engine.fallback.seed, 42);
        assert_eq!(
            engine
                .fallback
                .climatology(Horizon::H24, Variable::Temperature2m)
                .mean,
            9.5
        );
        assert_eq!(
            engine.aggregate.reference_spread(Variable::TotalPrecipitation),
            4.0
        );
        assert!(config.logging.json);
        assert_eq!(
            config.metrics.listen_addr().unwrap(),
            Some("127.0.0.1:9184".parse().unwrap())
        );
    }
}
