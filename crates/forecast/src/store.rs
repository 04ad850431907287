//! Per-horizon pairing of index and outcome table.
//!
//! Each horizon owns one [`HorizonSlot`]. Requests clone the slot's `Arc`
//! once and use it to the end, so a reload replaces index and outcomes
//! together and never exposes a mixed pair.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use index::{load_index, IndexConfig, IndexError, IndexVariant, Metric, VectorIndex};
use outcomes::{load_outcomes, OutcomeError, OutcomeTable};
use serde::Serialize;
use thiserror::Error;

use crate::config::DataConfig;
use crate::types::Horizon;

/// Why half of a slot is unavailable.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LoadError {
    #[error("horizon has not been loaded")]
    NotLoaded,
    #[error("no {0} path configured")]
    NotConfigured(&'static str),
    #[error("artifact labelled '{found}', expected '{expected}'")]
    LabelMismatch { expected: String, found: String },
    #[error("index: {0}")]
    Index(#[from] IndexError),
    #[error("outcomes: {0}")]
    Outcomes(#[from] OutcomeError),
}

/// Index and outcome table of one horizon, each loaded or failed.
#[derive(Debug)]
pub struct HorizonSlot {
    horizon: Horizon,
    index: Result<Arc<dyn VectorIndex>, LoadError>,
    outcomes: Result<Arc<OutcomeTable>, LoadError>,
    loaded_at: DateTime<Utc>,
}

impl HorizonSlot {
    /// Assemble a slot from already-built parts.
    pub fn new(
        horizon: Horizon,
        index: Result<Arc<dyn VectorIndex>, LoadError>,
        outcomes: Result<Arc<OutcomeTable>, LoadError>,
    ) -> Self {
        Self {
            horizon,
            index,
            outcomes,
            loaded_at: Utc::now(),
        }
    }

    pub fn ready(horizon: Horizon, index: Arc<dyn VectorIndex>, outcomes: OutcomeTable) -> Self {
        Self::new(horizon, Ok(index), Ok(Arc::new(outcomes)))
    }

    pub fn unloaded(horizon: Horizon) -> Self {
        Self::new(horizon, Err(LoadError::NotLoaded), Err(LoadError::NotLoaded))
    }

    /// Read both artifacts of `horizon`. Never fails as a whole; each half
    /// records its own error.
    pub fn load(horizon: Horizon, data: &DataConfig, index_cfg: &IndexConfig) -> Self {
        let index = load_index_half(horizon, data, index_cfg);
        let outcomes = load_outcome_half(horizon, data);
        if let Err(err) = &index {
            tracing::warn!(horizon = %horizon, error = %err, "index unavailable, horizon will use fallback");
        }
        if let Err(err) = &outcomes {
            tracing::warn!(horizon = %horizon, error = %err, "outcomes unavailable, horizon will use fallback");
        }
        Self::new(horizon, index, outcomes)
    }

    pub fn horizon(&self) -> Horizon {
        self.horizon
    }

    pub fn index(&self) -> Result<&Arc<dyn VectorIndex>, &LoadError> {
        self.index.as_ref()
    }

    pub fn outcomes(&self) -> Result<&OutcomeTable, &LoadError> {
        self.outcomes.as_deref()
    }

    pub fn is_ready(&self) -> bool {
        self.index.is_ok() && self.outcomes.is_ok()
    }

    pub fn status(&self) -> HorizonStatus {
        let index = self.index.as_ref().ok();
        HorizonStatus {
            horizon: self.horizon,
            ready: self.is_ready(),
            variant: index.map(|i| i.variant()),
            metric: index.map(|i| i.metric()),
            dimension: index.map(|i| i.dimension()),
            index_size: index.map(|i| i.size()),
            outcome_count: self.outcomes.as_ref().ok().map(|o| o.len()),
            index_error: self.index.as_ref().err().map(ToString::to_string),
            outcome_error: self.outcomes.as_ref().err().map(ToString::to_string),
            loaded_at: self.loaded_at,
        }
    }
}

fn load_index_half(
    horizon: Horizon,
    data: &DataConfig,
    cfg: &IndexConfig,
) -> Result<Arc<dyn VectorIndex>, LoadError> {
    let path = data
        .index_path(horizon)
        .ok_or(LoadError::NotConfigured("index"))?;
    let (header, index) = load_index(&path, cfg)?;
    if header.label != horizon.label() {
        return Err(LoadError::LabelMismatch {
            expected: horizon.label().to_string(),
            found: header.label,
        });
    }
    Ok(index)
}

fn load_outcome_half(horizon: Horizon, data: &DataConfig) -> Result<Arc<OutcomeTable>, LoadError> {
    let path = data
        .outcome_path(horizon)
        .ok_or(LoadError::NotConfigured("outcome"))?;
    Ok(Arc::new(load_outcomes(&path, horizon.label())?))
}

/// Snapshot of one horizon's readiness.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HorizonStatus {
    pub horizon: Horizon,
    pub ready: bool,
    pub variant: Option<IndexVariant>,
    pub metric: Option<Metric>,
    pub dimension: Option<usize>,
    pub index_size: Option<usize>,
    pub outcome_count: Option<usize>,
    pub index_error: Option<String>,
    pub outcome_error: Option<String>,
    pub loaded_at: DateTime<Utc>,
}

/// Current slot of every horizon.
#[derive(Debug)]
pub struct HorizonRegistry {
    slots: RwLock<BTreeMap<Horizon, Arc<HorizonSlot>>>,
}

impl Default for HorizonRegistry {
    fn default() -> Self {
        Self::empty()
    }
}

impl HorizonRegistry {
    /// Registry where every horizon is [`LoadError::NotLoaded`].
    pub fn empty() -> Self {
        let slots = Horizon::ALL
            .into_iter()
            .map(|h| (h, Arc::new(HorizonSlot::unloaded(h))))
            .collect();
        Self {
            slots: RwLock::new(slots),
        }
    }

    /// Load every horizon from `data`.
    pub fn load_all(data: &DataConfig, index_cfg: &IndexConfig) -> Self {
        let slots = Horizon::ALL
            .into_iter()
            .map(|h| (h, Arc::new(HorizonSlot::load(h, data, index_cfg))))
            .collect();
        Self {
            slots: RwLock::new(slots),
        }
    }

    /// Current slot for `horizon`.
    pub fn slot(&self, horizon: Horizon) -> Arc<HorizonSlot> {
        let guard = self
            .slots
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        match guard.get(&horizon) {
            Some(slot) => Arc::clone(slot),
            None => Arc::new(HorizonSlot::unloaded(horizon)),
        }
    }

    /// Swap in `slot`, returning the one it replaced.
    pub fn install(&self, slot: HorizonSlot) -> Option<Arc<HorizonSlot>> {
        let horizon = slot.horizon();
        let mut guard = self
            .slots
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        guard.insert(horizon, Arc::new(slot))
    }

    /// Re-read `horizon` from disk and swap it in.
    ///
    /// Artifacts are read before the lock is taken; in-flight requests keep
    /// the slot they already hold.
    pub fn reload(&self, horizon: Horizon, data: &DataConfig, index_cfg: &IndexConfig) -> HorizonStatus {
        let slot = HorizonSlot::load(horizon, data, index_cfg);
        let status = slot.status();
        self.install(slot);
        tracing::info!(horizon = %horizon, ready = status.ready, "horizon reloaded");
        status
    }

    pub fn status(&self) -> Vec<HorizonStatus> {
        let guard = self
            .slots
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        guard.values().map(|slot| slot.status()).collect()
    }
}
