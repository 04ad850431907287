use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use index::IndexConfig;
use outcomes::Variable;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::Horizon;

/// Largest `k` a request may ask for.
pub const MAX_K: usize = 200;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid forecast config: {0}")]
pub struct ConfigError(pub String);

/// Everything the [`Forecaster`](crate::Forecaster) needs besides the artifacts themselves.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForecastConfig {
    pub index: IndexConfig,
    pub data: DataConfig,
    pub search: SearchConfig,
    pub validation: ValidationConfig,
    pub fallback: FallbackConfig,
    pub aggregate: AggregateConfig,
}

impl ForecastConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_index(mut self, index: IndexConfig) -> Self {
        self.index = index;
        self
    }

    pub fn with_data(mut self, data: DataConfig) -> Self {
        self.data = data;
        self
    }

    pub fn with_search(mut self, search: SearchConfig) -> Self {
        self.search = search;
        self
    }

    pub fn with_validation(mut self, validation: ValidationConfig) -> Self {
        self.validation = validation;
        self
    }

    pub fn with_fallback(mut self, fallback: FallbackConfig) -> Self {
        self.fallback = fallback;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.index.dimension == 0 {
            return Err(ConfigError("index.dimension must be greater than zero".into()));
        }
        self.search.validate()?;
        self.validation.validate()?;
        self.fallback.validate()?;
        self.aggregate.validate()
    }
}

/// Where each horizon's artifacts live.
///
/// Explicit per-horizon paths win; otherwise files named `{horizon}.aidx`
/// and `{horizon}.aout` are looked up in `data_dir`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    pub data_dir: Option<PathBuf>,
    pub horizons: BTreeMap<Horizon, HorizonPaths>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HorizonPaths {
    pub index_path: Option<PathBuf>,
    pub outcome_path: Option<PathBuf>,
}

impl DataConfig {
    pub fn from_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: Some(dir.into()),
            horizons: BTreeMap::new(),
        }
    }

    pub fn index_path(&self, horizon: Horizon) -> Option<PathBuf> {
        self.horizons
            .get(&horizon)
            .and_then(|p| p.index_path.clone())
            .or_else(|| {
                self.data_dir
                    .as_ref()
                    .map(|d| d.join(format!("{}.aidx", horizon.label())))
            })
    }

    pub fn outcome_path(&self, horizon: Horizon) -> Option<PathBuf> {
        self.horizons
            .get(&horizon)
            .and_then(|p| p.outcome_path.clone())
            .or_else(|| {
                self.data_dir
                    .as_ref()
                    .map(|d| d.join(format!("{}.aout", horizon.label())))
            })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Searches slower than this are discarded in favour of fallback.
    pub latency_budget_ms: u64,
    pub max_k: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            latency_budget_ms: 250,
            max_k: MAX_K,
        }
    }
}

impl SearchConfig {
    pub fn with_latency_budget_ms(mut self, ms: u64) -> Self {
        self.latency_budget_ms = ms;
        self
    }

    pub fn latency_budget(&self) -> Duration {
        Duration::from_millis(self.latency_budget_ms)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.latency_budget_ms == 0 {
            return Err(ConfigError("search.latency_budget_ms must be greater than zero".into()));
        }
        if self.max_k == 0 || self.max_k > MAX_K {
            return Err(ConfigError(format!(
                "search.max_k must be between 1 and {MAX_K}"
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Minimum number of candidates a real search must return. Requests for
    /// fewer analogs only need as many as they asked for.
    pub min_k: usize,
    /// Slack allowed between consecutive scores before ordering counts as broken.
    pub epsilon: f32,
    /// Slack allowed outside the metric's theoretical score range.
    pub plausibility_tolerance: f32,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            min_k: 1,
            epsilon: 1e-5,
            plausibility_tolerance: 1e-3,
        }
    }
}

impl ValidationConfig {
    pub fn with_min_k(mut self, min_k: usize) -> Self {
        self.min_k = min_k;
        self
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.min_k == 0 {
            return Err(ConfigError("validation.min_k must be at least 1".into()));
        }
        if !(self.epsilon.is_finite() && self.epsilon >= 0.0) {
            return Err(ConfigError("validation.epsilon must be finite and >= 0".into()));
        }
        if !(self.plausibility_tolerance.is_finite() && self.plausibility_tolerance >= 0.0) {
            return Err(ConfigError(
                "validation.plausibility_tolerance must be finite and >= 0".into(),
            ));
        }
        Ok(())
    }
}

/// Normal distribution parameters of one variable.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Climatology {
    pub mean: f32,
    pub stddev: f32,
}

impl Climatology {
    /// Built-in mid-latitude climatology, widened with lead time.
    pub fn default_for(horizon: Horizon, variable: Variable) -> Self {
        let (mean, stddev) = match variable {
            Variable::Temperature2m => (12.0, 8.0),
            Variable::Dewpoint2m => (6.0, 7.0),
            Variable::MeanSeaLevelPressure => (1013.0, 9.0),
            Variable::WindU10m => (1.5, 4.5),
            Variable::WindV10m => (0.5, 4.5),
            Variable::WindSpeed10m => (5.0, 3.0),
            Variable::TotalPrecipitation => (1.2, 2.5),
            Variable::TotalCloudCover => (58.0, 30.0),
            Variable::RelativeHumidity2m => (72.0, 16.0),
        };
        let growth = match horizon {
            Horizon::H6 => 1.0,
            Horizon::H12 => 1.15,
            Horizon::H24 => 1.35,
            Horizon::H48 => 1.6,
        };
        Self {
            mean,
            stddev: stddev * growth,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FallbackConfig {
    /// Base seed; every call mixes in the horizon and `k`.
    pub seed: u64,
    /// Per-horizon overrides of [`Climatology::default_for`].
    pub climatology: BTreeMap<Horizon, BTreeMap<Variable, Climatology>>,
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            seed: 0x00A1_0C45_7F0E_CA57,
            climatology: BTreeMap::new(),
        }
    }
}

impl FallbackConfig {
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn climatology(&self, horizon: Horizon, variable: Variable) -> Climatology {
        self.climatology
            .get(&horizon)
            .and_then(|m| m.get(&variable))
            .copied()
            .unwrap_or_else(|| Climatology::default_for(horizon, variable))
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for (horizon, overrides) in &self.climatology {
            for (variable, c) in overrides {
                if !(c.stddev.is_finite() && c.stddev >= 0.0) {
                    return Err(ConfigError(format!(
                        "fallback.climatology.{horizon}.{variable}.stddev must be finite and >= 0"
                    )));
                }
                if !variable.admits(c.mean) {
                    return Err(ConfigError(format!(
                        "fallback.climatology.{horizon}.{variable}.mean is outside physical bounds"
                    )));
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregateConfig {
    /// Overrides of [`Variable::default_reference_spread`].
    pub reference_spread: BTreeMap<Variable, f32>,
}

impl AggregateConfig {
    pub fn reference_spread(&self, variable: Variable) -> f32 {
        self.reference_spread
            .get(&variable)
            .copied()
            .unwrap_or_else(|| variable.default_reference_spread())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for (variable, spread) in &self.reference_spread {
            if !(spread.is_finite() && *spread > 0.0) {
                return Err(ConfigError(format!(
                    "aggregate.reference_spread.{variable} must be positive"
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn default_config_is_valid() {
        assert!(ForecastConfig::default().validate().is_ok());
    }

    #[test]
    fn invalid_values_are_rejected() {
        let cfg = ForecastConfig::new().with_search(SearchConfig {
            max_k: 500,
            ..SearchConfig::default()
        });
        let err = cfg.validate().unwrap_err();
        assert!(err.0.contains("max_k"));

        let cfg = ForecastConfig::new().with_validation(ValidationConfig::default().with_min_k(0));
        assert!(cfg.validate().unwrap_err().0.contains("min_k"));

        let mut cfg = ForecastConfig::new();
        cfg.aggregate
            .reference_spread
            .insert(Variable::Temperature2m, 0.0);
        assert!(cfg.validate().unwrap_err().0.contains("temperature_2m"));
    }

    #[test]
    fn explicit_paths_override_data_dir() {
        let mut data = DataConfig::from_dir("/srv/analogs");
        data.horizons.insert(
            Horizon::H6,
            HorizonPaths {
                index_path: Some("/tmp/custom.aidx".into()),
                outcome_path: None,
            },
        );
        assert_eq!(
            data.index_path(Horizon::H6).unwrap(),
            Path::new("/tmp/custom.aidx")
        );
        assert_eq!(
            data.outcome_path(Horizon::H6).unwrap(),
            Path::new("/srv/analogs/6h.aout")
        );
        assert_eq!(
            data.index_path(Horizon::H48).unwrap(),
            Path::new("/srv/analogs/48h.aidx")
        );
        assert!(DataConfig::default().index_path(Horizon::H24).is_none());
    }

    #[test]
    fn climatology_spread_grows_with_horizon() {
        let fallback = FallbackConfig::default();
        let short = fallback.climatology(Horizon::H6, Variable::Temperature2m);
        let long = fallback.climatology(Horizon::H48, Variable::Temperature2m);
        assert_eq!(short.mean, long.mean);
        assert!(long.stddev > short.stddev);
    }

    #[test]
    fn climatology_overrides_are_honoured() {
        let mut fallback = FallbackConfig::default();
        let custom = Climatology {
            mean: -5.0,
            stddev: 2.0,
        };
        fallback
            .climatology
            .entry(Horizon::H12)
            .or_default()
            .insert(Variable::Temperature2m, custom);
        assert_eq!(fallback.climatology(Horizon::H12, Variable::Temperature2m), custom);
        assert_ne!(fallback.climatology(Horizon::H24, Variable::Temperature2m), custom);
    }

    #[test]
    fn partial_sections_fill_in_defaults() {
        let cfg: ForecastConfig = serde_json::from_value(serde_json::json!({
            "search": {"latency_budget_ms": 40},
            "fallback": {"seed": 7, "climatology": {"24h": {"temperature_2m": {"mean": 3.0, "stddev": 1.0}}}}
        }))
        .unwrap();
        assert_eq!(cfg.search.latency_budget(), Duration::from_millis(40));
        assert_eq!(cfg.search.max_k, MAX_K);
        assert_eq!(cfg.fallback.seed, 7);
        assert_eq!(
            cfg.fallback.climatology(Horizon::H24, Variable::Temperature2m).mean,
            3.0
        );
    }
}
