use std::time::{Duration, Instant};

use index::{Candidate, IndexError, IndexVariant, Metric};
use thiserror::Error;

use crate::store::HorizonSlot;

/// Candidates returned by a horizon's index, with timing.
#[derive(Debug, Clone, PartialEq)]
pub struct RawSearchResult {
    pub candidates: Vec<Candidate>,
    pub latency: Duration,
    pub variant_used: IndexVariant,
    pub metric: Metric,
    /// Dimension of the index that answered.
    pub dimension: usize,
    pub index_size: usize,
}

/// Reasons a search produced no usable candidates.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SearchFailure {
    #[error("index unavailable: {0}")]
    IndexUnavailable(String),
    #[error("dimension mismatch: index expects {expected}, embedding has {got}")]
    DimensionMismatch { expected: usize, got: usize },
    #[error("index is empty")]
    EmptyIndex,
    #[error("search exceeded latency budget of {budget_ms} ms")]
    Timeout { budget_ms: u64 },
    #[error("internal search error: {0}")]
    Internal(String),
}

impl SearchFailure {
    /// Stable snake_case code for logs and response metadata.
    pub fn code(&self) -> &'static str {
        match self {
            SearchFailure::IndexUnavailable(_) => "index_unavailable",
            SearchFailure::DimensionMismatch { .. } => "dimension_mismatch",
            SearchFailure::EmptyIndex => "empty_index",
            SearchFailure::Timeout { .. } => "timeout",
            SearchFailure::Internal(_) => "internal",
        }
    }
}

impl From<IndexError> for SearchFailure {
    fn from(err: IndexError) -> Self {
        match err {
            IndexError::DimensionMismatch { expected, got } => {
                SearchFailure::DimensionMismatch { expected, got }
            }
            other => SearchFailure::Internal(other.to_string()),
        }
    }
}

/// Query the slot's index for the top `k` neighbours of `query`.
///
/// The dimension is checked before the index is touched. A search that
/// completes but overruns `budget` is reported as [`SearchFailure::Timeout`].
pub fn perform_search(
    slot: &HorizonSlot,
    query: &[f32],
    k: usize,
    budget: Duration,
) -> Result<RawSearchResult, SearchFailure> {
    let index = slot
        .index()
        .map_err(|err| SearchFailure::IndexUnavailable(err.to_string()))?;
    if query.len() != index.dimension() {
        return Err(SearchFailure::DimensionMismatch {
            expected: index.dimension(),
            got: query.len(),
        });
    }
    if index.is_empty() {
        return Err(SearchFailure::EmptyIndex);
    }

    let started = Instant::now();
    let candidates = index.search(query, k)?;
    let latency = started.elapsed();
    if latency > budget {
        return Err(SearchFailure::Timeout {
            budget_ms: budget.as_millis() as u64,
        });
    }

    Ok(RawSearchResult {
        candidates,
        latency,
        variant_used: index.variant(),
        metric: index.metric(),
        dimension: index.dimension(),
        index_size: index.size(),
    })
}
