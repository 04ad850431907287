//! # Analog Index
//!
//! Immutable vector indices used to retrieve historical analogs for a
//! forecast horizon. An index is built offline, written to a single artifact
//! file, and loaded read-only at startup. Nothing in this crate mutates an
//! index after it has been constructed.
//!
//! ## Variants
//!
//! Two interchangeable implementations sit behind the [`VectorIndex`] trait:
//!
//! - [`ExactIndex`]: brute-force scan over the raw `f32` vectors. This is the
//!   primary variant and the reference for result ordering.
//! - [`QuantizedIndex`]: per-dimension int8 scalar quantization. Roughly 4x
//!   smaller in memory, scores are approximate.
//!
//! The variant is selected once through [`IndexConfig::variant`]; callers never
//! branch on it per query.
//!
//! ## Ordering
//!
//! Both variants return candidates ranked by the same convention: descending
//! score for [`Metric::InnerProduct`], ascending score for [`Metric::L2`]. Ties
//! are broken by ascending id so repeated searches are bit-for-bit identical.
//!
//! ## Example Usage
//!
//! ```
//! use index::{ExactIndex, Metric, VectorIndex};
//!
//! let vectors = vec![1.0, 0.0, 0.0, 1.0, 0.6, 0.8];
//! let index = ExactIndex::new(Metric::InnerProduct, 2, vec![10, 20, 30], vectors).unwrap();
//!
//! let hits = index.search(&[1.0, 0.0], 2).unwrap();
//! assert_eq!(hits[0].id, 10);
//! assert_eq!(hits[1].id, 30);
//! ```

mod artifact;
mod exact;
mod quantized;

pub use artifact::{
    load_index, read_index_artifact, write_index_artifact, IndexArtifact, IndexHeader,
    INDEX_FORMAT_VERSION, INDEX_MAGIC,
};
pub use exact::ExactIndex;
pub use quantized::{QuantizedIndex, ScalarQuantizer};

use std::cmp::Ordering;
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Embedding dimension produced by the upstream state encoder.
pub const DEFAULT_DIMENSION: usize = 256;

/// Similarity convention of an index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    /// Inner product over unit vectors. Higher is closer, range `[-1, 1]`.
    #[default]
    InnerProduct,
    /// Squared Euclidean distance. Lower is closer, range `[0, inf)`.
    L2,
}

impl Metric {
    /// Whether a larger score means a closer neighbour.
    pub fn higher_is_closer(self) -> bool {
        matches!(self, Metric::InnerProduct)
    }

    /// Theoretical `(min, max)` bounds of a score under this metric.
    pub fn score_range(self) -> (f32, f32) {
        match self {
            Metric::InnerProduct => (-1.0, 1.0),
            Metric::L2 => (0.0, f32::INFINITY),
        }
    }

    /// Map a raw score onto a "bigger is more similar" scale.
    ///
    /// Inner products are returned unchanged; distances become `1 / (1 + d)`.
    pub fn similarity(self, score: f32) -> f32 {
        match self {
            Metric::InnerProduct => score,
            Metric::L2 => 1.0 / (1.0 + score.max(0.0)),
        }
    }

    /// Ranking order between two scores (closest first).
    pub(crate) fn rank_cmp(self, a: f32, b: f32) -> Ordering {
        if self.higher_is_closer() {
            b.total_cmp(&a)
        } else {
            a.total_cmp(&b)
        }
    }

    #[inline]
    pub(crate) fn score(self, query: &[f32], vector: &[f32]) -> f32 {
        match self {
            Metric::InnerProduct => query.iter().zip(vector).map(|(q, v)| q * v).sum(),
            Metric::L2 => query
                .iter()
                .zip(vector)
                .map(|(q, v)| {
                    let d = q - v;
                    d * d
                })
                .sum(),
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Metric::InnerProduct => f.write_str("inner_product"),
            Metric::L2 => f.write_str("l2"),
        }
    }
}

/// Which index implementation to materialize from an artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum IndexVariant {
    /// Brute-force scan over full-precision vectors.
    #[default]
    Exact,
    /// Int8 scalar-quantized codes, approximate scores.
    Quantized,
}

impl fmt::Display for IndexVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndexVariant::Exact => f.write_str("exact"),
            IndexVariant::Quantized => f.write_str("quantized"),
        }
    }
}

/// One search hit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    /// Analog identifier, shared with the outcome table.
    pub id: i64,
    /// Raw metric score (similarity or distance, see [`Metric`]).
    pub score: f32,
    /// Zero-based rank in the result list.
    pub rank: usize,
}

/// Static configuration for loading an index.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Implementation to build from the artifact.
    pub variant: IndexVariant,
    /// Dimension every artifact must declare.
    pub dimension: usize,
    /// Exact scans use rayon once an index holds at least this many vectors.
    pub parallel_threshold: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            variant: IndexVariant::Exact,
            dimension: DEFAULT_DIMENSION,
            parallel_threshold: 4096,
        }
    }
}

impl IndexConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_variant(mut self, variant: IndexVariant) -> Self {
        self.variant = variant;
        self
    }

    pub fn with_dimension(mut self, dimension: usize) -> Self {
        self.dimension = dimension;
        self
    }

    pub fn with_parallel_threshold(mut self, threshold: usize) -> Self {
        self.parallel_threshold = threshold;
        self
    }
}

/// Errors raised while loading or querying an index.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum IndexError {
    #[error("index file not found: {0}")]
    NotFound(PathBuf),
    #[error("io error reading {path}: {message}")]
    Io { path: PathBuf, message: String },
    #[error("corrupt header: {0}")]
    CorruptHeader(String),
    #[error("unsupported artifact version {found} (expected {expected})")]
    UnsupportedVersion { found: u16, expected: u16 },
    #[error("payload decode error: {0}")]
    Decode(String),
    #[error("payload encode error: {0}")]
    Encode(String),
    #[error("inconsistent artifact: {0}")]
    Inconsistent(String),
    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },
}

impl IndexError {
    pub(crate) fn io(path: impl Into<PathBuf>, err: std::io::Error) -> Self {
        let path = path.into();
        if err.kind() == std::io::ErrorKind::NotFound {
            IndexError::NotFound(path)
        } else {
            IndexError::Io {
                path,
                message: err.to_string(),
            }
        }
    }
}

/// Read-only nearest-neighbour interface shared by every index variant.
pub trait VectorIndex: Send + Sync + fmt::Debug {
    /// Implementation behind this index.
    fn variant(&self) -> IndexVariant;
    /// Similarity convention of the scores.
    fn metric(&self) -> Metric;
    /// Vector dimension.
    fn dimension(&self) -> usize;
    /// Number of stored vectors.
    fn size(&self) -> usize;
    /// Top-`k` neighbours of `query`, closest first. Returns at most
    /// `min(k, size)` candidates.
    fn search(&self, query: &[f32], k: usize) -> Result<Vec<Candidate>, IndexError>;

    fn is_empty(&self) -> bool {
        self.size() == 0
    }
}

/// Keep the `k` best `(id, score)` pairs and turn them into ranked candidates.
pub(crate) fn select_top_k(mut scored: Vec<(i64, f32)>, k: usize, metric: Metric) -> Vec<Candidate> {
    let order = |a: &(i64, f32), b: &(i64, f32)| metric.rank_cmp(a.1, b.1).then(a.0.cmp(&b.0));
    let k = k.min(scored.len());
    if k == 0 {
        return Vec::new();
    }
    if k < scored.len() {
        scored.select_nth_unstable_by(k - 1, order);
        scored.truncate(k);
    }
    scored.sort_unstable_by(order);
    scored
        .into_iter()
        .enumerate()
        .map(|(rank, (id, score))| Candidate { id, score, rank })
        .collect()
}

pub(crate) fn check_layout(dimension: usize, ids: usize, values: usize) -> Result<(), IndexError> {
    if dimension == 0 {
        return Err(IndexError::Inconsistent("dimension must be non-zero".into()));
    }
    if ids.checked_mul(dimension) != Some(values) {
        return Err(IndexError::Inconsistent(format!(
            "{ids} ids x {dimension} dims does not match {values} stored values"
        )));
    }
    Ok(())
}

/// Reject rows holding NaN or infinite components.
pub(crate) fn check_finite(dimension: usize, values: &[f32]) -> Result<(), IndexError> {
    match values.iter().position(|v| !v.is_finite()) {
        None => Ok(()),
        Some(pos) => Err(IndexError::Inconsistent(format!(
            "row {} holds a non-finite value at component {}",
            pos / dimension.max(1),
            pos % dimension.max(1)
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn top_k_orders_similarity_descending_with_id_tiebreak() {
        let scored = vec![(5, 0.2), (3, 0.9), (9, 0.9), (1, -0.4)];
        let top = select_top_k(scored, 3, Metric::InnerProduct);
        let ids: Vec<i64> = top.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![3, 9, 5]);
        assert_eq!(top[2].rank, 2);
    }

    #[test]
    fn top_k_orders_distance_ascending() {
        let scored = vec![(1, 4.0), (2, 0.5), (3, 1.0)];
        let top = select_top_k(scored, 5, Metric::L2);
        let ids: Vec<i64> = top.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![2, 3, 1]);
    }

    #[test]
    fn top_k_zero_is_empty() {
        assert!(select_top_k(vec![(1, 1.0)], 0, Metric::InnerProduct).is_empty());
    }

    #[test]
    fn similarity_maps_distance_into_unit_interval() {
        assert_eq!(Metric::L2.similarity(0.0), 1.0);
        assert!(Metric::L2.similarity(3.0) < 0.5);
        assert_eq!(Metric::InnerProduct.similarity(-0.25), -0.25);
    }

    #[test]
    fn layout_check_rejects_ragged_buffers() {
        assert!(check_layout(4, 3, 12).is_ok());
        assert!(matches!(
            check_layout(4, 3, 11),
            Err(IndexError::Inconsistent(_))
        ));
        assert!(check_layout(0, 0, 0).is_err());
    }
}
