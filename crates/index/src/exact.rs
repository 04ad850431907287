use rayon::prelude::*;

use crate::{
    check_finite, check_layout, select_top_k, Candidate, IndexError, IndexVariant, Metric,
    VectorIndex,
};

/// Brute-force index over full-precision vectors.
///
/// Vectors live in one contiguous row-major buffer. Every query scores all
/// rows; above `parallel_threshold` rows the scan is split across the rayon
/// pool.
#[derive(Debug, Clone)]
pub struct ExactIndex {
    metric: Metric,
    dimension: usize,
    ids: Vec<i64>,
    vectors: Vec<f32>,
    parallel_threshold: usize,
}

impl ExactIndex {
    /// Build an index from ids and a flat `ids.len() * dimension` buffer.
    pub fn new(
        metric: Metric,
        dimension: usize,
        ids: Vec<i64>,
        vectors: Vec<f32>,
    ) -> Result<Self, IndexError> {
        check_layout(dimension, ids.len(), vectors.len())?;
        check_finite(dimension, &vectors)?;
        Ok(Self {
            metric,
            dimension,
            ids,
            vectors,
            parallel_threshold: usize::MAX,
        })
    }

    pub fn with_parallel_threshold(mut self, threshold: usize) -> Self {
        self.parallel_threshold = threshold;
        self
    }

    fn score_all(&self, query: &[f32]) -> Vec<(i64, f32)> {
        let metric = self.metric;
        if self.ids.len() >= self.parallel_threshold {
            self.vectors
                .par_chunks_exact(self.dimension)
                .zip(self.ids.par_iter())
                .map(|(row, &id)| (id, metric.score(query, row)))
                .collect()
        } else {
            self.vectors
                .chunks_exact(self.dimension)
                .zip(self.ids.iter())
                .map(|(row, &id)| (id, metric.score(query, row)))
                .collect()
        }
    }
}

impl VectorIndex for ExactIndex {
    fn variant(&self) -> IndexVariant {
        IndexVariant::Exact
    }

    fn metric(&self) -> Metric {
        self.metric
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn size(&self) -> usize {
        self.ids.len()
    }

    fn search(&self, query: &[f32], k: usize) -> Result<Vec<Candidate>, IndexError> {
        if query.len() != self.dimension {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimension,
                got: query.len(),
            });
        }
        if k == 0 || self.ids.is_empty() {
            return Ok(Vec::new());
        }
        Ok(select_top_k(self.score_all(query), k, self.metric))
    }
}
