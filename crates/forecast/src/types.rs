use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use index::{Candidate, Metric};
use outcomes::{Outcome, Variable};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Lead time of a forecast.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum Horizon {
    #[serde(rename = "6h")]
    H6,
    #[serde(rename = "12h")]
    H12,
    #[serde(rename = "24h")]
    H24,
    #[serde(rename = "48h")]
    H48,
}

impl Horizon {
    pub const ALL: [Horizon; 4] = [Horizon::H6, Horizon::H12, Horizon::H24, Horizon::H48];

    pub fn label(self) -> &'static str {
        match self {
            Horizon::H6 => "6h",
            Horizon::H12 => "12h",
            Horizon::H24 => "24h",
            Horizon::H48 => "48h",
        }
    }

    pub fn hours(self) -> u32 {
        match self {
            Horizon::H6 => 6,
            Horizon::H12 => 12,
            Horizon::H24 => 24,
            Horizon::H48 => 48,
        }
    }
}

impl fmt::Display for Horizon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Horizon {
    type Err = ForecastError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Horizon::ALL
            .into_iter()
            .find(|h| h.label() == s)
            .ok_or_else(|| ForecastError::UnknownHorizon(s.to_string()))
    }
}

/// Where the analogs behind a forecast came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provenance {
    /// Retrieved from the horizon's index and outcome table.
    Real,
    /// Synthesized from climatology.
    Fallback,
}

impl Provenance {
    pub fn as_str(self) -> &'static str {
        match self {
            Provenance::Real => "real",
            Provenance::Fallback => "fallback",
        }
    }
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Encoded atmospheric state supplied by the upstream embedder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Embedding {
    pub values: Vec<f32>,
    /// Horizon the embedding was produced for.
    pub horizon: String,
    #[serde(default)]
    pub issued_at: Option<DateTime<Utc>>,
}

/// A single forecast request.
///
/// Horizon and variable names are kept as strings so that unknown values
/// surface as [`ForecastError`]s from the engine rather than as parse errors
/// at the transport layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastRequest {
    pub horizon: String,
    /// Catalog variables to report. Empty means the full catalog.
    #[serde(default)]
    pub variables: Vec<String>,
    pub k: usize,
    pub embedding: Embedding,
}

impl ForecastRequest {
    /// Request over the full catalog for an embedding tagged with `horizon`.
    pub fn new(horizon: Horizon, k: usize, values: Vec<f32>) -> Self {
        Self {
            horizon: horizon.label().to_string(),
            variables: Vec::new(),
            k,
            embedding: Embedding {
                values,
                horizon: horizon.label().to_string(),
                issued_at: None,
            },
        }
    }

    pub fn with_variables(mut self, variables: &[Variable]) -> Self {
        self.variables = variables.iter().map(|v| v.name().to_string()).collect();
        self
    }

    pub fn with_issued_at(mut self, issued_at: DateTime<Utc>) -> Self {
        self.embedding.issued_at = Some(issued_at);
        self
    }
}

/// Analogs and their outcomes feeding one aggregation.
///
/// `candidates[i]` and `outcomes[i]` describe the same analog.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalogSet {
    pub horizon: Horizon,
    pub k_requested: usize,
    pub k_effective: usize,
    pub metric: Metric,
    pub candidates: Vec<Candidate>,
    pub outcomes: Vec<Outcome>,
    pub provenance: Provenance,
}

/// Ensemble statistics for one variable.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EnsembleResult {
    pub value: f32,
    pub stddev: f32,
    pub p05: f32,
    pub p50: f32,
    pub p95: f32,
    /// 0 to 100.
    pub confidence: f32,
    pub analog_count: usize,
    pub available: bool,
}

impl EnsembleResult {
    /// Result for a variable with no recorded values.
    pub fn unavailable() -> Self {
        Self {
            value: 0.0,
            stddev: 0.0,
            p05: 0.0,
            p50: 0.0,
            p95: 0.0,
            confidence: 0.0,
            analog_count: 0,
            available: false,
        }
    }
}

/// Request lifecycle states, in the order they can be visited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForecastState {
    EmbeddingReceived,
    Searching,
    Validating,
    AggregatingReal,
    AggregatingFallback,
    Completed,
    Failed,
}

/// Analog that contributed to a real forecast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalogRef {
    pub id: i64,
    pub score: f32,
    pub rank: usize,
    pub valid_time: DateTime<Utc>,
}

/// How the response was produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchMetadata {
    /// `exact`, `quantized` or `fallback`.
    pub method: String,
    pub latency_ms: f64,
    pub candidates_considered: usize,
    pub validation_summary: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback_reason: Option<String>,
    pub states: Vec<ForecastState>,
}

/// Final answer returned to the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastResponse {
    pub horizon: Horizon,
    pub provenance: Provenance,
    pub k_requested: usize,
    pub k_effective: usize,
    pub forecasts: BTreeMap<Variable, EnsembleResult>,
    #[serde(default)]
    pub analogs: Vec<AnalogRef>,
    pub search_metadata: SearchMetadata,
}

/// Errors surfaced to the caller. Every one of them marks malformed input;
/// backend failures are absorbed by the fallback path.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ForecastError {
    #[error("unknown horizon '{0}'")]
    UnknownHorizon(String),
    #[error("embedding was produced for horizon '{embedding}', request is for '{request}'")]
    HorizonMismatch { request: String, embedding: String },
    #[error("embedding is empty")]
    EmptyEmbedding,
    #[error("embedding value at position {0} is not finite")]
    NonFiniteEmbedding(usize),
    #[error("k must be between 1 and {max}, got {k}")]
    InvalidK { k: usize, max: usize },
    #[error("unknown variable '{0}'")]
    UnknownVariable(String),
}

impl From<outcomes::UnknownVariable> for ForecastError {
    fn from(err: outcomes::UnknownVariable) -> Self {
        ForecastError::UnknownVariable(err.0)
    }
}
