use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use outcomes::Variable;

use crate::aggregate::aggregate;
use crate::config::{ConfigError, ForecastConfig};
use crate::fallback::FallbackGenerator;
use crate::metrics::{MetricsSink, NoopMetrics};
use crate::search::{perform_search, RawSearchResult, SearchFailure};
use crate::store::{HorizonRegistry, HorizonSlot, HorizonStatus};
use crate::types::{
    AnalogRef, AnalogSet, ForecastError, ForecastRequest, ForecastResponse, ForecastState,
    Horizon, Provenance, SearchMetadata,
};
use crate::validate::{ValidationReport, Validator};


/// Why a request was answered from climatology.
#[derive(Debug, Clone, PartialEq)]
pub enum FallbackReason {
    Search(SearchFailure),
    Validation(ValidationReport),
    OutcomesUnavailable(String),
    /// None of the retrieved ids had a recorded outcome.
    NoOutcomes { candidates: usize },
}

impl FallbackReason {
    pub fn code(&self) -> String {
        match self {
            FallbackReason::Search(failure) => failure.code().to_string(),
            FallbackReason::Validation(report) => match report.failed_check {
                Some(check) => format!("validation_{check}"),
                None => "validation".to_string(),
            },
            FallbackReason::OutcomesUnavailable(_) => "outcomes_unavailable".to_string(),
            FallbackReason::NoOutcomes { .. } => "no_outcomes".to_string(),
        }
    }
}

impl fmt::Display for FallbackReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FallbackReason::Search(failure) => write!(f, "{}: {failure}", self.code()),
            FallbackReason::Validation(report) => {
                write!(f, "{}: {}", self.code(), report.diagnostic)
            }
            FallbackReason::OutcomesUnavailable(detail) => write!(f, "{}: {detail}", self.code()),
            FallbackReason::NoOutcomes { candidates } => write!(
                f,
                "{}: none of {candidates} candidates has a recorded outcome",
                self.code()
            ),
        }
    }
}

/// Validated view of a [`ForecastRequest`].
#[derive(Debug, Clone, PartialEq)]
struct Admitted {
    horizon: Horizon,
    k: usize,
    variables: Vec<Variable>,
}

/// Search outcome plus what the engine measured around it.
struct Searched {
    result: Result<RawSearchResult, SearchFailure>,
    elapsed: Duration,
}

/// Route chosen after search, validation and outcome lookup.
enum Route {
    Real(AnalogSet),
    Fallback(FallbackReason),
}

/// Analog-ensemble forecaster over per-horizon indices and outcome tables.
pub struct Forecaster {
    config: ForecastConfig,
    registry: HorizonRegistry,
    validator: Validator,
    fallback: FallbackGenerator,
    metrics: Arc<dyn MetricsSink>,
}

impl fmt::Debug for Forecaster {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Forecaster")
            .field("config", &self.config)
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

impl Forecaster {
    /// Validate `config` and load every horizon it points at.
    ///
    /// Horizons whose artifacts fail to load are served from fallback until
    /// [`Forecaster::reload`] succeeds.
    pub fn new(config: ForecastConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let registry = HorizonRegistry::load_all(&config.data, &config.index);
        Ok(Self::assemble(config, registry))
    }

    /// Use an already-populated registry instead of reading files.
    pub fn with_registry(
        config: ForecastConfig,
        registry: HorizonRegistry,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::assemble(config, registry))
    }

    fn assemble(config: ForecastConfig, registry: HorizonRegistry) -> Self {
        Self {
            validator: Validator::new(&config.validation),
            fallback: FallbackGenerator::new(config.fallback.clone()),
            metrics: Arc::new(NoopMetrics),
            config,
            registry,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<dyn MetricsSink>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn config(&self) -> &ForecastConfig {
        &self.config
    }

    pub fn registry(&self) -> &HorizonRegistry {
        &self.registry
    }

    /// Re-read `horizon`'s artifacts and swap them in.
    pub fn reload(&self, horizon: Horizon) -> HorizonStatus {
        self.registry
            .reload(horizon, &self.config.data, &self.config.index)
    }

    /// Swap in a prebuilt slot.
    pub fn install(&self, slot: HorizonSlot) {
        self.registry.install(slot);
    }

    pub fn status(&self) -> Vec<HorizonStatus> {
        self.registry.status()
    }

    /// Run one forecast on the calling thread.
    ///
    /// Only malformed requests return `Err`; every backend or quality failure
    /// is answered with provenance `fallback`.
    pub fn forecast(&self, req: &ForecastRequest) -> Result<ForecastResponse, ForecastError> {
        let admitted = self.admit(req)?;
        let slot = self.registry.slot(admitted.horizon);

        let started = Instant::now();
        let result = perform_search(
            &slot,
            &req.embedding.values,
            admitted.k,
            self.config.search.latency_budget(),
        );
        let searched = Searched {
            result,
            elapsed: started.elapsed(),
        };
        Ok(self.complete(&admitted, &slot, searched))
    }

    /// Run one forecast with the search on tokio's blocking pool, bounded by
    /// the latency budget. A search that overruns is abandoned.
    pub async fn forecast_async(
        &self,
        req: ForecastRequest,
    ) -> Result<ForecastResponse, ForecastError> {
        let admitted = self.admit(&req)?;
        let slot = self.registry.slot(admitted.horizon);
        let budget = self.config.search.latency_budget();

        let started = Instant::now();
        let task_slot = Arc::clone(&slot);
        let k = admitted.k;
        let values = req.embedding.values;
        let handle =
            tokio::task::spawn_blocking(move || perform_search(&task_slot, &values, k, budget));
        let result = match tokio::time::timeout(budget, handle).await {
            Ok(Ok(result)) => result,
            Ok(Err(join)) => Err(SearchFailure::Internal(join.to_string())),
            Err(_) => Err(SearchFailure::Timeout {
                budget_ms: self.config.search.latency_budget_ms,
            }),
        };
        let searched = Searched {
            result,
            elapsed: started.elapsed(),
        };
        Ok(self.complete(&admitted, &slot, searched))
    }

    fn admit(&self, req: &ForecastRequest) -> Result<Admitted, ForecastError> {
        let admitted = self.check_request(req);
        if let Err(err) = &admitted {
            tracing::debug!(
                horizon = %req.horizon,
                k = req.k,
                error = %err,
                state = ?ForecastState::Failed,
                "rejected malformed forecast request"
            );
        }
        admitted
    }

    fn check_request(&self, req: &ForecastRequest) -> Result<Admitted, ForecastError> {
        let horizon: Horizon = req.horizon.parse()?;
        if req.embedding.horizon.parse::<Horizon>().ok() != Some(horizon) {
            return Err(ForecastError::HorizonMismatch {
                request: req.horizon.clone(),
                embedding: req.embedding.horizon.clone(),
            });
        }
        if req.embedding.values.is_empty() {
            return Err(ForecastError::EmptyEmbedding);
        }
        if let Some(pos) = req.embedding.values.iter().position(|v| !v.is_finite()) {
            return Err(ForecastError::NonFiniteEmbedding(pos));
        }
        let max_k = self.config.search.max_k;
        if req.k == 0 || req.k > max_k {
            return Err(ForecastError::InvalidK { k: req.k, max: max_k });
        }

        let variables: Vec<Variable> = if req.variables.is_empty() {
            Variable::ALL.to_vec()
        } else {
            let mut unique = BTreeSet::new();
            for name in &req.variables {
                unique.insert(name.parse::<Variable>()?);
            }
            unique.into_iter().collect()
        };

        Ok(Admitted {
            horizon,
            k: req.k,
            variables,
        })
    }

    fn complete(&self, req: &Admitted, slot: &HorizonSlot, searched: Searched) -> ForecastResponse {
        let mut states = vec![ForecastState::EmbeddingReceived, ForecastState::Searching];
        let Searched { result, elapsed } = searched;

        let (route, raw, report) = match result {
            Err(failure) => (Route::Fallback(FallbackReason::Search(failure)), None, None),
            Ok(raw) => {
                states.push(ForecastState::Validating);
                let min_k = self.config.validation.min_k.min(req.k);
                let report = self
                    .validator
                    .validate(&raw, self.config.index.dimension, min_k);
                let route = if report.passed {
                    match self.resolve_outcomes(req, slot, &raw) {
                        Ok(set) => Route::Real(set),
                        Err(reason) => Route::Fallback(reason),
                    }
                } else {
                    Route::Fallback(FallbackReason::Validation(report.clone()))
                };
                (route, Some(raw), Some(report))
            }
        };

        let latency = raw.as_ref().map_or(elapsed, |r| r.latency);
        let (set, fallback_reason) = match route {
            Route::Real(set) => {
                states.push(ForecastState::AggregatingReal);
                (set, None)
            }
            Route::Fallback(reason) => {
                tracing::warn!(
                    horizon = %req.horizon,
                    k = req.k,
                    reason = %reason,
                    "serving climatological fallback"
                );
                states.push(ForecastState::AggregatingFallback);
                let set = self.fallback.generate(req.horizon, &req.variables, req.k);
                (set, Some(reason.to_string()))
            }
        };

        let forecasts = aggregate(&set, &req.variables, &self.config.aggregate);
        states.push(ForecastState::Completed);

        let method = match (&set.provenance, &raw) {
            (Provenance::Real, Some(raw)) => raw.variant_used.to_string(),
            _ => "fallback".to_string(),
        };
        let validation_summary = match &report {
            Some(report) => report.summary(),
            None => "not run: search failed".to_string(),
        };
        let analogs = match set.provenance {
            Provenance::Real => set
                .candidates
                .iter()
                .zip(&set.outcomes)
                .map(|(c, o)| AnalogRef {
                    id: c.id,
                    score: c.score,
                    rank: c.rank,
                    valid_time: o.valid_time,
                })
                .collect(),
            Provenance::Fallback => Vec::new(),
        };

        self.metrics
            .record_forecast(req.horizon, req.k, set.provenance, latency, set.k_effective);
        tracing::debug!(
            horizon = %req.horizon,
            k = req.k,
            k_effective = set.k_effective,
            provenance = %set.provenance,
            latency_us = latency.as_micros() as u64,
            "forecast completed"
        );

        ForecastResponse {
            horizon: req.horizon,
            provenance: set.provenance,
            k_requested: req.k,
            k_effective: set.k_effective,
            forecasts,
            analogs,
            search_metadata: SearchMetadata {
                method,
                latency_ms: latency.as_secs_f64() * 1_000.0,
                candidates_considered: raw.as_ref().map_or(0, |r| r.candidates.len()),
                validation_summary,
                fallback_reason,
                states,
            },
        }
    }

    /// Pair candidates with outcomes, dropping ids with no recorded outcome.
    fn resolve_outcomes(
        &self,
        req: &Admitted,
        slot: &HorizonSlot,
        raw: &RawSearchResult,
    ) -> Result<AnalogSet, FallbackReason> {
        let table = slot
            .outcomes()
            .map_err(|err| FallbackReason::OutcomesUnavailable(err.to_string()))?;
        let ids: Vec<i64> = raw.candidates.iter().map(|c| c.id).collect();
        let found = table.fetch(&ids);

        let mut candidates = Vec::with_capacity(found.len());
        let mut outcomes = Vec::with_capacity(found.len());
        for candidate in &raw.candidates {
            if let Some(outcome) = found.get(&candidate.id) {
                candidates.push(*candidate);
                outcomes.push(*outcome);
            }
        }

        let missing = raw.candidates.len() - candidates.len();
        if candidates.is_empty() {
            return Err(FallbackReason::NoOutcomes {
                candidates: raw.candidates.len(),
            });
        }
        if missing > 0 {
            tracing::warn!(
                horizon = %req.horizon,
                missing,
                kept = candidates.len(),
                "dropping analogs without recorded outcomes"
            );
        }

        Ok(AnalogSet {
            horizon: req.horizon,
            k_requested: req.k,
            k_effective: candidates.len(),
            metric: raw.metric,
            candidates,
            outcomes,
            provenance: Provenance::Real,
        })
    }
}
