//! On-disk container for a prebuilt index.
//!
//! ```text
//! +-------+---------+--------------------------------------+
//! | AIDX  | u16 LE  | zstd( bincode(IndexArtifact) )       |
//! +-------+---------+--------------------------------------+
//! ```

use std::fs;
use std::path::Path;
use std::sync::Arc;

use bincode::serde::{decode_from_slice, encode_to_vec};
use serde::{Deserialize, Serialize};
use zstd::{decode_all, encode_all};

use crate::{
    check_finite, check_layout, ExactIndex, IndexConfig, IndexError, IndexVariant, Metric,
    QuantizedIndex, VectorIndex,
};

/// Leading bytes of every index file.
pub const INDEX_MAGIC: [u8; 4] = *b"AIDX";

/// Bump whenever the [`IndexArtifact`] layout changes.
pub const INDEX_FORMAT_VERSION: u16 = 1;

const HEADER_LEN: usize = 6;
const ZSTD_LEVEL: i32 = 3;
/// Upper bound on the decoded payload, guards against corrupt length prefixes.
const DECODE_LIMIT: usize = 1 << 31;

/// Serialized form of a prebuilt index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexArtifact {
    /// Free-form label written by the builder (the horizon name in practice).
    pub label: String,
    pub metric: Metric,
    pub dimension: usize,
    pub ids: Vec<i64>,
    /// Row-major `ids.len() * dimension` values.
    pub vectors: Vec<f32>,
}

impl IndexArtifact {
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Write an artifact to `path`, replacing any existing file.
pub fn write_index_artifact(path: &Path, artifact: &IndexArtifact) -> Result<(), IndexError> {
    check_layout(artifact.dimension, artifact.ids.len(), artifact.vectors.len())?;
    let encoded = encode_to_vec(artifact, bincode::config::standard())
        .map_err(|e| IndexError::Encode(e.to_string()))?;
    let compressed = encode_all(encoded.as_slice(), ZSTD_LEVEL).map_err(|e| IndexError::io(path, e))?;

    let mut bytes = Vec::with_capacity(HEADER_LEN + compressed.len());
    bytes.extend_from_slice(&INDEX_MAGIC);
    bytes.extend_from_slice(&INDEX_FORMAT_VERSION.to_le_bytes());
    bytes.extend_from_slice(&compressed);
    fs::write(path, bytes).map_err(|e| IndexError::io(path, e))
}

/// Read and structurally check an artifact without building an index.
pub fn read_index_artifact(path: &Path) -> Result<IndexArtifact, IndexError> {
    let bytes = fs::read(path).map_err(|e| IndexError::io(path, e))?;
    if bytes.len() < HEADER_LEN {
        return Err(IndexError::CorruptHeader(format!(
            "{} bytes is shorter than the {HEADER_LEN}-byte header",
            bytes.len()
        )));
    }
    if bytes[..4] != INDEX_MAGIC {
        return Err(IndexError::CorruptHeader(format!(
            "bad magic {:?}",
            &bytes[..4]
        )));
    }
    let version = u16::from_le_bytes([bytes[4], bytes[5]]);
    if version != INDEX_FORMAT_VERSION {
        return Err(IndexError::UnsupportedVersion {
            found: version,
            expected: INDEX_FORMAT_VERSION,
        });
    }

    let payload = decode_all(&bytes[HEADER_LEN..]).map_err(|e| IndexError::Decode(e.to_string()))?;
    let config = bincode::config::standard().with_limit::<DECODE_LIMIT>();
    let (artifact, _): (IndexArtifact, usize) =
        decode_from_slice(&payload, config).map_err(|e| IndexError::Decode(e.to_string()))?;
    check_layout(artifact.dimension, artifact.ids.len(), artifact.vectors.len())?;
    check_finite(artifact.dimension, &artifact.vectors)?;
    Ok(artifact)
}

/// Descriptive fields of a loaded artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexHeader {
    pub label: String,
    pub metric: Metric,
    pub dimension: usize,
    pub size: usize,
}

/// Load an index file and build the configured variant.
///
/// Fails when the file is missing, the header or payload is corrupt, or the
/// stored dimension differs from [`IndexConfig::dimension`].
pub fn load_index(
    path: &Path,
    cfg: &IndexConfig,
) -> Result<(IndexHeader, Arc<dyn VectorIndex>), IndexError> {
    let IndexArtifact {
        label,
        metric,
        dimension,
        ids,
        vectors,
    } = read_index_artifact(path)?;
    if dimension != cfg.dimension {
        return Err(IndexError::DimensionMismatch {
            expected: cfg.dimension,
            got: dimension,
        });
    }

    let index: Arc<dyn VectorIndex> = match cfg.variant {
        IndexVariant::Exact => Arc::new(
            ExactIndex::new(metric, dimension, ids, vectors)?
                .with_parallel_threshold(cfg.parallel_threshold),
        ),
        IndexVariant::Quantized => Arc::new(QuantizedIndex::from_vectors(
            metric, dimension, ids, &vectors,
        )?),
    };

    tracing::info!(
        path = %path.display(),
        label = %label,
        variant = %cfg.variant,
        metric = %metric,
        size = index.size(),
        dimension,
        "loaded vector index"
    );
    let header = IndexHeader {
        label,
        metric,
        dimension,
        size: index.size(),
    };
    Ok((header, index))
}
