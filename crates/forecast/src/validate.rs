use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::ValidationConfig;
use crate::search::RawSearchResult;

/// Quality gates, in evaluation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationCheck {
    /// The searched index has the configured dimension. The embedding itself
    /// is checked against the index before searching.
    DimensionMatch,
    MinCount,
    Monotonicity,
    Plausibility,
}

impl ValidationCheck {
    pub fn as_str(self) -> &'static str {
        match self {
            ValidationCheck::DimensionMatch => "dimension_match",
            ValidationCheck::MinCount => "min_count",
            ValidationCheck::Monotonicity => "monotonicity",
            ValidationCheck::Plausibility => "plausibility",
        }
    }
}

impl fmt::Display for ValidationCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of running the gates over a search result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub passed: bool,
    pub failed_check: Option<ValidationCheck>,
    pub diagnostic: String,
}

impl ValidationReport {
    fn pass(count: usize) -> Self {
        Self {
            passed: true,
            failed_check: None,
            diagnostic: format!("{count} candidates passed all checks"),
        }
    }

    fn fail(check: ValidationCheck, diagnostic: String) -> Self {
        Self {
            passed: false,
            failed_check: Some(check),
            diagnostic,
        }
    }

    /// One-line description for response metadata.
    pub fn summary(&self) -> String {
        match self.failed_check {
            None => format!("passed: {}", self.diagnostic),
            Some(check) => format!("failed {check}: {}", self.diagnostic),
        }
    }
}

/// Stateless quality gate over raw search results.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Validator {
    epsilon: f32,
    tolerance: f32,
}

impl Validator {
    pub fn new(cfg: &ValidationConfig) -> Self {
        Self {
            epsilon: cfg.epsilon,
            tolerance: cfg.plausibility_tolerance,
        }
    }

    /// Run every check in order and stop at the first failure.
    ///
    /// `expected_dim` is the configured dimension; `dimension_match` compares
    /// it with the dimension of the index that produced `result`.
    pub fn validate(
        &self,
        result: &RawSearchResult,
        expected_dim: usize,
        min_k: usize,
    ) -> ValidationReport {
        if result.dimension != expected_dim {
            return ValidationReport::fail(
                ValidationCheck::DimensionMatch,
                format!(
                    "index dimension {} differs from expected {expected_dim}",
                    result.dimension
                ),
            );
        }

        let count = result.candidates.len();
        if count == 0 || count < min_k {
            return ValidationReport::fail(
                ValidationCheck::MinCount,
                format!("{count} candidates, at least {} required", min_k.max(1)),
            );
        }

        let higher_is_closer = result.metric.higher_is_closer();
        for (i, pair) in result.candidates.windows(2).enumerate() {
            let (prev, next) = (pair[0].score, pair[1].score);
            let ordered = if higher_is_closer {
                next <= prev + self.epsilon
            } else {
                next >= prev - self.epsilon
            };
            // NaN comparisons are false, so they fail here too.
            if !ordered {
                return ValidationReport::fail(
                    ValidationCheck::Monotonicity,
                    format!("score order breaks at rank {}: {prev} then {next}", i + 1),
                );
            }
        }

        let (lo, hi) = result.metric.score_range();
        let (lo, hi) = (lo - self.tolerance, hi + self.tolerance);
        if let Some(bad) = result
            .candidates
            .iter()
            .find(|c| !c.score.is_finite() || c.score < lo || c.score > hi)
        {
            return ValidationReport::fail(
                ValidationCheck::Plausibility,
                format!(
                    "score {} of id {} at rank {} is outside the {} range",
                    bad.score, bad.id, bad.rank, result.metric
                ),
            );
        }

        ValidationReport::pass(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use index::{Candidate, IndexVariant, Metric};
    use std::time::Duration;

    fn result(metric: Metric, scores: &[f32]) -> RawSearchResult {
        RawSearchResult {
            candidates: scores
                .iter()
                .enumerate()
                .map(|(rank, &score)| Candidate {
                    id: rank as i64 + 100,
                    score,
                    rank,
                })
                .collect(),
            latency: Duration::from_micros(40),
            variant_used: IndexVariant::Exact,
            metric,
            dimension: 256,
            index_size: 1000,
        }
    }

    fn validator() -> Validator {
        Validator::new(&ValidationConfig::default())
    }

    #[test]
    fn well_formed_result_passes() {
        let report = validator().validate(&result(Metric::InnerProduct, &[0.9, 0.8, 0.8, 0.1]), 256, 3);
        assert!(report.passed);
        assert!(report.failed_check.is_none());
        assert!(report.summary().starts_with("passed"));
    }

    #[test]
    fn dimension_is_checked_first() {
        // Also non-monotonic, but dimension wins.
        let report = validator().validate(&result(Metric::InnerProduct, &[0.1, 0.9]), 255, 1);
        assert_eq!(report.failed_check, Some(ValidationCheck::DimensionMatch));
    }

    #[test]
    fn too_few_candidates_fail_min_count() {
        let v = validator();
        let report = v.validate(&result(Metric::InnerProduct, &[0.9, 0.8]), 256, 5);
        assert_eq!(report.failed_check, Some(ValidationCheck::MinCount));
        let report = v.validate(&result(Metric::InnerProduct, &[]), 256, 0);
        assert_eq!(report.failed_check, Some(ValidationCheck::MinCount));
    }

    #[test]
    fn monotonicity_reports_first_violating_rank() {
        let report = validator().validate(
            &result(Metric::InnerProduct, &[0.9, 0.7, 0.75, 0.2]),
            256,
            1,
        );
        assert_eq!(report.failed_check, Some(ValidationCheck::Monotonicity));
        assert!(report.diagnostic.contains("rank 2"), "{}", report.diagnostic);
    }

    #[test]
    fn monotonicity_tolerates_epsilon_jitter() {
        let report = validator().validate(
            &result(Metric::InnerProduct, &[0.5, 0.500_005, 0.4]),
            256,
            1,
        );
        assert!(report.passed, "{}", report.diagnostic);
    }

    #[test]
    fn distance_metrics_must_ascend() {
        let v = validator();
        assert!(v.validate(&result(Metric::L2, &[0.1, 0.4, 2.0]), 256, 1).passed);
        let report = v.validate(&result(Metric::L2, &[0.4, 0.1]), 256, 1);
        assert_eq!(report.failed_check, Some(ValidationCheck::Monotonicity));
    }

    #[test]
    fn out_of_range_scores_fail_plausibility() {
        let v = validator();
        let report = v.validate(&result(Metric::InnerProduct, &[1.4, 0.5]), 256, 1);
        assert_eq!(report.failed_check, Some(ValidationCheck::Plausibility));

        let report = v.validate(&result(Metric::L2, &[-0.5, 0.2]), 256, 1);
        assert_eq!(report.failed_check, Some(ValidationCheck::Plausibility));

        // Rounding just above 1.0 is absorbed by the tolerance.
        assert!(v.validate(&result(Metric::InnerProduct, &[1.000_2, 0.5]), 256, 1).passed);
    }

    #[test]
    fn nan_scores_never_pass() {
        let report = validator().validate(&result(Metric::InnerProduct, &[f32::NAN]), 256, 1);
        assert_eq!(report.failed_check, Some(ValidationCheck::Plausibility));
        let report = validator().validate(&result(Metric::InnerProduct, &[0.5, f32::NAN]), 256, 1);
        assert_eq!(report.failed_check, Some(ValidationCheck::Monotonicity));
    }
}
