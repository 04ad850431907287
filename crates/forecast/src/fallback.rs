//! Synthetic analogs drawn from climatology.
//!
//! Used whenever the real path cannot produce a trustworthy analog set. Each
//! call seeds its own ChaCha8 stream from `(seed, horizon, k)`, so identical
//! calls give identical sets regardless of what ran before them.

use chrono::{DateTime, Utc};
use index::{Candidate, Metric};
use outcomes::{Outcome, Variable, VARIABLE_COUNT};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal};

use crate::config::FallbackConfig;
use crate::types::{AnalogSet, Horizon, Provenance};

/// Score given to every synthetic candidate.
pub const FALLBACK_SCORE: f32 = 1.0;

#[derive(Debug, Clone)]
pub struct FallbackGenerator {
    config: FallbackConfig,
}

impl FallbackGenerator {
    pub fn new(config: FallbackConfig) -> Self {
        Self { config }
    }

    pub fn seed(&self) -> u64 {
        self.config.seed
    }

    /// Produce exactly `k_requested` synthetic analogs for `horizon`.
    ///
    /// Values are drawn for the whole catalog so the stream does not depend
    /// on which variables were asked for; unrequested ones are then blanked.
    pub fn generate(&self, horizon: Horizon, variables: &[Variable], k_requested: usize) -> AnalogSet {
        let mut rng = ChaCha8Rng::seed_from_u64(stream_seed(self.config.seed, horizon, k_requested));
        let samplers: Vec<(Variable, Option<Normal<f32>>, f32)> = Variable::ALL
            .into_iter()
            .map(|v| {
                let c = self.config.climatology(horizon, v);
                (v, Normal::new(c.mean, c.stddev).ok(), c.mean)
            })
            .collect();

        let mut candidates = Vec::with_capacity(k_requested);
        let mut outcomes = Vec::with_capacity(k_requested);
        for rank in 0..k_requested {
            let mut values = [0.0f32; VARIABLE_COUNT];
            for (variable, normal, mean) in &samplers {
                let raw = match normal {
                    Some(n) => n.sample(&mut rng),
                    None => *mean,
                };
                values[variable.index()] = clamp_to_bounds(*variable, raw);
            }
            make_consistent(&mut values);
            for v in Variable::ALL {
                if !variables.contains(&v) {
                    values[v.index()] = f32::NAN;
                }
            }

            candidates.push(Candidate {
                id: -(rank as i64) - 1,
                score: FALLBACK_SCORE,
                rank,
            });
            outcomes.push(Outcome::new(DateTime::<Utc>::UNIX_EPOCH, values));
        }

        AnalogSet {
            horizon,
            k_requested,
            k_effective: k_requested,
            metric: Metric::InnerProduct,
            candidates,
            outcomes,
            provenance: Provenance::Fallback,
        }
    }
}

fn clamp_to_bounds(variable: Variable, value: f32) -> f32 {
    let (lo, hi) = variable.bounds();
    value.clamp(lo, hi)
}

/// Derive wind speed from its components and keep dewpoint at or below temperature.
fn make_consistent(values: &mut [f32; VARIABLE_COUNT]) {
    let u = values[Variable::WindU10m.index()];
    let v = values[Variable::WindV10m.index()];
    values[Variable::WindSpeed10m.index()] =
        clamp_to_bounds(Variable::WindSpeed10m, (u * u + v * v).sqrt());

    let t = values[Variable::Temperature2m.index()];
    let td = &mut values[Variable::Dewpoint2m.index()];
    *td = td.min(t);
}

/// splitmix64 over the request's identifying fields.
fn stream_seed(seed: u64, horizon: Horizon, k: usize) -> u64 {
    let mut x = seed ^ (u64::from(horizon.hours()) << 32) ^ k as u64;
    x = x.wrapping_add(0x9E37_79B9_7F4A_7C15);
    x = (x ^ (x >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    x = (x ^ (x >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    x ^ (x >> 31)
}
