use chrono::{DateTime, Utc};
use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

use crate::{Variable, VARIABLE_COUNT};

/// Observed values of every catalog variable for one analog.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Outcome {
    pub valid_time: DateTime<Utc>,
    /// Catalog-ordered values, `NaN` when not recorded.
    pub values: [f32; VARIABLE_COUNT],
}

impl Outcome {
    pub fn new(valid_time: DateTime<Utc>, values: [f32; VARIABLE_COUNT]) -> Self {
        Self { valid_time, values }
    }

    /// Recorded value of `variable`, `None` when missing.
    pub fn value(&self, variable: Variable) -> Option<f32> {
        let v = self.values[variable.index()];
        v.is_finite().then_some(v)
    }
}

/// Immutable map from analog id to [`Outcome`] for a single horizon.
#[derive(Debug, Clone, Default)]
pub struct OutcomeTable {
    label: String,
    outcomes: HashMap<i64, Outcome>,
}

impl OutcomeTable {
    /// Build a table in memory. Later duplicates overwrite earlier ones.
    pub fn from_outcomes(
        label: impl Into<String>,
        outcomes: impl IntoIterator<Item = (i64, Outcome)>,
    ) -> Self {
        Self {
            label: label.into(),
            outcomes: outcomes.into_iter().collect(),
        }
    }

    /// Horizon label the table was built for.
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn get(&self, id: i64) -> Option<&Outcome> {
        self.outcomes.get(&id)
    }

    pub fn contains(&self, id: i64) -> bool {
        self.outcomes.contains_key(&id)
    }

    /// Resolve `ids` to outcomes. Unknown ids are absent from the result.
    pub fn fetch(&self, ids: &[i64]) -> HashMap<i64, Outcome> {
        let mut found = HashMap::with_capacity(ids.len());
        for &id in ids {
            if let Some(outcome) = self.outcomes.get(&id) {
                found.insert(id, *outcome);
            }
        }
        found
    }
}
