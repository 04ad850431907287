use std::collections::BTreeMap;

use outcomes::Variable;

use crate::config::AggregateConfig;
use crate::types::{AnalogSet, EnsembleResult};

/// Interpolated percentile of an ascending slice, `p` in `[0, 1]`.
///
/// Uses the `pos = p * (n - 1)` convention. Returns `NaN` for an empty slice.
pub fn percentile(sorted: &[f32], p: f64) -> f32 {
    match sorted.len() {
        0 => f32::NAN,
        1 => sorted[0],
        n => {
            let pos = p.clamp(0.0, 1.0) * (n - 1) as f64;
            let lower = pos.floor() as usize;
            let upper = pos.ceil() as usize;
            let frac = pos - lower as f64;
            let lo = f64::from(sorted[lower]);
            let hi = f64::from(sorted[upper]);
            (lo + (hi - lo) * frac) as f32
        }
    }
}

/// Ensemble statistics of `variables` over an analog set.
///
/// Pure: the same set always yields bit-identical results.
pub fn aggregate(
    set: &AnalogSet,
    variables: &[Variable],
    cfg: &AggregateConfig,
) -> BTreeMap<Variable, EnsembleResult> {
    let weights: Vec<f64> = set
        .candidates
        .iter()
        .map(|c| f64::from(set.metric.similarity(c.score)).max(0.0))
        .collect();

    variables
        .iter()
        .map(|&variable| {
            let samples: Vec<(f32, f64)> = set
                .outcomes
                .iter()
                .zip(&weights)
                .filter_map(|(o, &w)| o.value(variable).map(|v| (v, w)))
                .collect();
            let result = summarize(
                &samples,
                set.k_requested,
                f64::from(cfg.reference_spread(variable)),
            );
            (variable, result)
        })
        .collect()
}

fn summarize(samples: &[(f32, f64)], k_requested: usize, reference_spread: f64) -> EnsembleResult {
    let n = samples.len();
    if n == 0 {
        return EnsembleResult::unavailable();
    }

    let total: f64 = samples.iter().map(|(_, w)| w).sum();
    let normalized: Vec<f64> = if total > 0.0 && total.is_finite() {
        samples.iter().map(|(_, w)| w / total).collect()
    } else {
        vec![1.0 / n as f64; n]
    };

    let mean: f64 = samples
        .iter()
        .zip(&normalized)
        .map(|((v, _), w)| w * f64::from(*v))
        .sum();
    let variance: f64 = samples
        .iter()
        .zip(&normalized)
        .map(|((v, _), w)| {
            let d = f64::from(*v) - mean;
            w * d * d
        })
        .sum();
    let stddev = variance.max(0.0).sqrt();

    let mut sorted: Vec<f32> = samples.iter().map(|(v, _)| *v).collect();
    sorted.sort_by(f32::total_cmp);

    let coverage = if k_requested == 0 {
        0.0
    } else {
        n as f64 / k_requested as f64
    };
    let dispersion = if reference_spread > 0.0 {
        (stddev / reference_spread).min(1.0)
    } else {
        1.0
    };
    let confidence = (100.0 * coverage * (1.0 - dispersion)).clamp(0.0, 100.0);

    EnsembleResult {
        value: mean as f32,
        stddev: stddev as f32,
        p05: percentile(&sorted, 0.05),
        p50: percentile(&sorted, 0.50),
        p95: percentile(&sorted, 0.95),
        confidence: confidence as f32,
        analog_count: n,
        available: true,
    }
}
