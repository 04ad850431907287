//! Workspace umbrella crate for analogcast.
//!
//! Re-exports the engine (`forecast`) together with the artifact crates
//! (`index`, `outcomes`) and adds the YAML configuration and telemetry
//! bootstrap used by the `analogcast` binary.

pub mod config;
pub mod telemetry;

pub use forecast::{
    AggregateConfig, AnalogRef, AnalogSet, AtomicMetrics, Climatology, DataConfig, Embedding,
    EnsembleResult, FallbackConfig, FallbackGenerator, FallbackReason, ForecastConfig,
    ForecastError, ForecastRequest, ForecastResponse, ForecastState, Forecaster, Horizon,
    HorizonPaths, HorizonRegistry, HorizonSlot, HorizonStatus, LoadError, MAX_K, MetricsSink,
    MetricsSnapshot, NoopMetrics, Provenance, RecorderMetrics, SearchConfig, SearchFailure,
    SearchMetadata, ValidationCheck, ValidationConfig, ValidationReport, Validator, aggregate,
    percentile,
};
pub use index::{
    Candidate, ExactIndex, IndexArtifact, IndexConfig, IndexError, IndexVariant, Metric,
    QuantizedIndex, VectorIndex, load_index, write_index_artifact,
};
pub use outcomes::{
    Outcome, OutcomeArtifact, OutcomeError, OutcomeTable, VARIABLE_COUNT, Variable,
    load_outcomes, write_outcome_artifact,
};

pub use crate::config::{AnalogConfig, ConfigLoadError, LoggingConfig, MetricsConfig};

use std::sync::Arc;

/// Build a forecaster from a loaded config, loading every horizon's
/// artifacts. Horizons that fail to load answer from fallback until reloaded.
pub fn build_forecaster(
    config: &AnalogConfig,
    metrics: Arc<dyn MetricsSink>,
) -> Result<Forecaster, ConfigLoadError> {
    let forecaster = Forecaster::new(config.engine.clone())?.with_metrics(metrics);
    let ready = forecaster.status().iter().filter(|s| s.ready).count();
    tracing::info!(
        ready,
        total = Horizon::ALL.len(),
        variant = %config.engine.index.variant,
        "forecaster ready"
    );
    Ok(forecaster)
}
