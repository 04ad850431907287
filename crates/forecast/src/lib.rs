//! # Analog Forecast (`forecast`)
//!
//! ## Purpose
//!
//! `forecast` turns an embedding of the current atmospheric state into a
//! probabilistic multi-variable forecast. It retrieves the `k` most similar
//! historical states from the horizon's vector index (`index`), resolves their
//! recorded outcomes (`outcomes`) and summarizes them into an ensemble per
//! variable.
//!
//! The caller always gets a structurally valid answer. When the index is
//! missing, the search overruns its budget, the candidates fail a quality
//! check, or no outcomes can be resolved, the request is answered from a
//! seeded climatological fallback instead and tagged `provenance: fallback`.
//! Only malformed requests produce an error.
//!
//! ## Request lifecycle
//!
//! ```text
//! EmbeddingReceived -> Searching -> Validating -> AggregatingReal -----> Completed
//!                          |             |
//!                          +-------------+------> AggregatingFallback -> Completed
//! ```
//!
//! The visited states are returned in [`SearchMetadata::states`].
//!
//! ## Core Types
//!
//! - [`Forecaster`]: the orchestrator; sync [`Forecaster::forecast`] and
//!   async [`Forecaster::forecast_async`].
//! - [`HorizonRegistry`] / [`HorizonSlot`]: per-horizon index and outcome
//!   pairs, swapped atomically on reload.
//! - [`Validator`], [`FallbackGenerator`], [`aggregate()`]: the individual stages.
//! - [`MetricsSink`]: injected observer with [`NoopMetrics`],
//!   [`AtomicMetrics`] and [`RecorderMetrics`] implementations.
//!
//! ## Example Usage
//!
//! ```
//! use forecast::{ForecastConfig, ForecastRequest, Forecaster, Horizon, HorizonRegistry, Provenance};
//!
//! // No artifacts loaded: every horizon answers from climatology.
//! let forecaster = Forecaster::with_registry(ForecastConfig::default(), HorizonRegistry::empty())
//!     .expect("valid config");
//!
//! let mut embedding = vec![0.0f32; 256];
//! embedding[0] = 1.0;
//! let resp = forecaster
//!     .forecast(&ForecastRequest::new(Horizon::H24, 50, embedding))
//!     .expect("well-formed request");
//!
//! assert_eq!(resp.provenance, Provenance::Fallback);
//! assert_eq!(resp.k_effective, 50);
//! ```

pub mod aggregate;
pub mod config;
pub mod engine;
pub mod fallback;
pub mod metrics;
pub mod search;
pub mod store;
pub mod types;
pub mod validate;

pub use crate::aggregate::{aggregate, percentile};
pub use crate::config::{
    AggregateConfig, Climatology, ConfigError, DataConfig, FallbackConfig, ForecastConfig,
    HorizonPaths, SearchConfig, ValidationConfig, MAX_K,
};
pub use crate::engine::{FallbackReason, Forecaster};
pub use crate::fallback::FallbackGenerator;
pub use crate::metrics::{
    AtomicMetrics, LatencyHistogram, MetricsSink, MetricsSnapshot, NoopMetrics, RecorderMetrics,
};
pub use crate::search::{perform_search, RawSearchResult, SearchFailure};
pub use crate::store::{HorizonRegistry, HorizonSlot, HorizonStatus, LoadError};
pub use crate::types::{
    AnalogRef, AnalogSet, Embedding, EnsembleResult, ForecastError, ForecastRequest,
    ForecastResponse, ForecastState, Horizon, Provenance, SearchMetadata,
};
pub use crate::validate::{ValidationCheck, ValidationReport, Validator};
