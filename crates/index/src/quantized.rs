use serde::{Deserialize, Serialize};

use crate::{
    check_finite, check_layout, select_top_k, Candidate, IndexError, IndexVariant, Metric,
    VectorIndex,
};

/// Chunk size for the unrolled code/weight dot product.
const SIMD_CHUNK_SIZE: usize = 32;

/// Per-dimension linear mapping from `f32` onto `u8` codes.
///
/// Each dimension `i` is calibrated to `[min_i, max_i]` over the stored
/// vectors; a code `c` decodes to `min_i + scale_i * c`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalarQuantizer {
    mins: Vec<f32>,
    scales: Vec<f32>,
}

impl ScalarQuantizer {
    /// Calibrate from a flat row-major buffer of `dimension`-wide rows.
    pub fn fit(dimension: usize, vectors: &[f32]) -> Self {
        let mut mins = vec![f32::INFINITY; dimension];
        let mut maxs = vec![f32::NEG_INFINITY; dimension];
        for row in vectors.chunks_exact(dimension) {
            for (i, &v) in row.iter().enumerate() {
                if !v.is_finite() {
                    continue;
                }
                mins[i] = mins[i].min(v);
                maxs[i] = maxs[i].max(v);
            }
        }
        let mut scales = Vec::with_capacity(dimension);
        for (min, max) in mins.iter_mut().zip(&maxs) {
            if !min.is_finite() {
                // Dimension never saw a finite value.
                *min = 0.0;
                scales.push(0.0);
                continue;
            }
            let range = max - *min;
            scales.push(if range < f32::EPSILON { 0.0 } else { range / 255.0 });
        }
        Self { mins, scales }
    }

    pub fn dimension(&self) -> usize {
        self.mins.len()
    }

    /// Encode one row. Non-finite values encode to 0.
    pub fn quantize(&self, row: &[f32]) -> Vec<u8> {
        row.iter()
            .zip(self.mins.iter().zip(&self.scales))
            .map(|(&v, (&min, &scale))| {
                if scale == 0.0 || !v.is_finite() {
                    0
                } else {
                    ((v - min) / scale).round().clamp(0.0, 255.0) as u8
                }
            })
            .collect()
    }

    /// Decode one row of codes back to approximate `f32` values.
    pub fn dequantize(&self, codes: &[u8]) -> Vec<f32> {
        codes
            .iter()
            .zip(self.mins.iter().zip(&self.scales))
            .map(|(&c, (&min, &scale))| min + scale * f32::from(c))
            .collect()
    }
}

/// Approximate index over int8 scalar-quantized vectors.
///
/// Inner products are computed directly on the codes:
/// `q·x ≈ Σ q_i·min_i + Σ (q_i·scale_i)·c_i`, so the per-query bias and
/// weights are prepared once and each row costs one weighted code sum.
#[derive(Debug, Clone)]
pub struct QuantizedIndex {
    metric: Metric,
    dimension: usize,
    ids: Vec<i64>,
    codes: Vec<u8>,
    quantizer: ScalarQuantizer,
}

impl QuantizedIndex {
    /// Quantize a flat `ids.len() * dimension` buffer into a new index.
    pub fn from_vectors(
        metric: Metric,
        dimension: usize,
        ids: Vec<i64>,
        vectors: &[f32],
    ) -> Result<Self, IndexError> {
        check_layout(dimension, ids.len(), vectors.len())?;
        check_finite(dimension, vectors)?;
        let quantizer = ScalarQuantizer::fit(dimension, vectors);
        let mut codes = Vec::with_capacity(vectors.len());
        for row in vectors.chunks_exact(dimension) {
            codes.extend(quantizer.quantize(row));
        }
        Ok(Self {
            metric,
            dimension,
            ids,
            codes,
            quantizer,
        })
    }

    pub fn quantizer(&self) -> &ScalarQuantizer {
        &self.quantizer
    }

    /// Bytes held by the code buffer.
    pub fn code_bytes(&self) -> usize {
        self.codes.len()
    }

    fn inner_products(&self, query: &[f32]) -> Vec<(i64, f32)> {
        let bias: f32 = query
            .iter()
            .zip(&self.quantizer.mins)
            .map(|(q, m)| q * m)
            .sum();
        let weights: Vec<f32> = query
            .iter()
            .zip(&self.quantizer.scales)
            .map(|(q, s)| q * s)
            .collect();
        // Rounding moves each code by at most half a step.
        let slack: f32 = weights.iter().map(|w| w.abs() * 0.5).sum();

        self.codes
            .chunks_exact(self.dimension)
            .zip(&self.ids)
            .map(|(row, &id)| {
                let score = bias + weighted_code_sum(&weights, row);
                (id, clamp_within_error(score, slack))
            })
            .collect()
    }

    fn distances(&self, query: &[f32]) -> Vec<(i64, f32)> {
        let mins = &self.quantizer.mins;
        let scales = &self.quantizer.scales;
        self.codes
            .chunks_exact(self.dimension)
            .zip(&self.ids)
            .map(|(row, &id)| {
                let mut dist = 0.0f32;
                for i in 0..self.dimension {
                    let d = query[i] - (mins[i] + scales[i] * f32::from(row[i]));
                    dist += d * d;
                }
                (id, dist.max(0.0))
            })
            .collect()
    }
}

/// Pull a score back into `[-1, 1]` only when quantization error can explain
/// the overshoot. Anything further out is returned unchanged.
fn clamp_within_error(score: f32, slack: f32) -> f32 {
    if score.abs() <= 1.0 + slack {
        score.clamp(-1.0, 1.0)
    } else {
        score
    }
}

/// Dot product of `f32` weights with `u8` codes, chunked for auto-vectorization.
#[inline]
fn weighted_code_sum(weights: &[f32], codes: &[u8]) -> f32 {
    let mut total = 0.0f32;
    let mut w_chunks = weights.chunks_exact(SIMD_CHUNK_SIZE);
    let mut c_chunks = codes.chunks_exact(SIMD_CHUNK_SIZE);
    for (w, c) in (&mut w_chunks).zip(&mut c_chunks) {
        total += compute_dot_chunk(w, c);
    }
    total + compute_dot_chunk(w_chunks.remainder(), c_chunks.remainder())
}

#[inline(always)]
fn compute_dot_chunk(weights: &[f32], codes: &[u8]) -> f32 {
    weights
        .iter()
        .zip(codes)
        .map(|(&w, &c)| w * f32::from(c))
        .sum()
}

impl VectorIndex for QuantizedIndex {
    fn variant(&self) -> IndexVariant {
        IndexVariant::Quantized
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
        let scored = match self.metric {
            Metric::InnerProduct => self.inner_products(query),
            Metric::L2 => self.distances(query),
        };
        Ok(select_top_k(scored, k, self.metric))
    }
}
