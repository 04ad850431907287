//! On-disk container for an outcome table.
//!
//! Same framing as index artifacts: `AOUT`, a little-endian `u16` version,
//! then a zstd-compressed bincode payload.

use std::fs;
use std::path::Path;

use bincode::serde::{decode_from_slice, encode_to_vec};
use chrono::{DateTime, Utc};
use hashbrown::HashMap;
use serde::{Deserialize, Serialize};
use zstd::{decode_all, encode_all};

use crate::{Outcome, OutcomeError, OutcomeTable, Variable, VARIABLE_COUNT};

/// Leading bytes of every outcome file.
pub const OUTCOME_MAGIC: [u8; 4] = *b"AOUT";

/// Bump whenever the [`OutcomeArtifact`] layout or the catalog changes.
pub const OUTCOME_FORMAT_VERSION: u16 = 1;

const HEADER_LEN: usize = 6;
const ZSTD_LEVEL: i32 = 3;
const DECODE_LIMIT: usize = 1 << 30;

/// One analog's outcome as stored on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutcomeRecord {
    pub id: i64,
    /// Valid time as Unix seconds.
    pub valid_time: i64,
    pub values: Vec<f32>,
}

/// Serialized form of an outcome table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutcomeArtifact {
    /// Horizon label, checked against the slot the table is loaded into.
    pub label: String,
    /// Column names, must equal the catalog names in order.
    pub variables: Vec<String>,
    pub records: Vec<OutcomeRecord>,
}

impl OutcomeArtifact {
    /// Empty artifact with the current catalog header.
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            variables: Variable::ALL.iter().map(|v| v.name().to_string()).collect(),
            records: Vec::new(),
        }
    }

    pub fn push(&mut self, id: i64, valid_time: DateTime<Utc>, values: [f32; VARIABLE_COUNT]) {
        self.records.push(OutcomeRecord {
            id,
            valid_time: valid_time.timestamp(),
            values: values.to_vec(),
        });
    }
}

/// Write an artifact to `path`, replacing any existing file.
pub fn write_outcome_artifact(path: &Path, artifact: &OutcomeArtifact) -> Result<(), OutcomeError> {
    let encoded = encode_to_vec(artifact, bincode::config::standard())
        .map_err(|e| OutcomeError::Encode(e.to_string()))?;
    let compressed =
        encode_all(encoded.as_slice(), ZSTD_LEVEL).map_err(|e| OutcomeError::io(path, e))?;

    let mut bytes = Vec::with_capacity(HEADER_LEN + compressed.len());
    bytes.extend_from_slice(&OUTCOME_MAGIC);
    bytes.extend_from_slice(&OUTCOME_FORMAT_VERSION.to_le_bytes());
    bytes.extend_from_slice(&compressed);
    fs::write(path, bytes).map_err(|e| OutcomeError::io(path, e))
}

/// Read an artifact and check its framing, without validating records.
pub fn read_outcome_artifact(path: &Path) -> Result<OutcomeArtifact, OutcomeError> {
    let bytes = fs::read(path).map_err(|e| OutcomeError::io(path, e))?;
    if bytes.len() < HEADER_LEN {
        return Err(OutcomeError::CorruptHeader(format!(
            "{} bytes is shorter than the {HEADER_LEN}-byte header",
            bytes.len()
        )));
    }
    if bytes[..4] != OUTCOME_MAGIC {
        return Err(OutcomeError::CorruptHeader(format!(
            "bad magic {:?}",
            &bytes[..4]
        )));
    }
    let version = u16::from_le_bytes([bytes[4], bytes[5]]);
    if version != OUTCOME_FORMAT_VERSION {
        return Err(OutcomeError::UnsupportedVersion {
            found: version,
            expected: OUTCOME_FORMAT_VERSION,
        });
    }

    let payload =
        decode_all(&bytes[HEADER_LEN..]).map_err(|e| OutcomeError::Decode(e.to_string()))?;
    let config = bincode::config::standard().with_limit::<DECODE_LIMIT>();
    let (artifact, _): (OutcomeArtifact, usize) =
        decode_from_slice(&payload, config).map_err(|e| OutcomeError::Decode(e.to_string()))?;
    Ok(artifact)
}

/// Load the outcome table for `expected_label` from `path`.
///
/// Values outside a variable's physical bounds are stored as missing.
pub fn load_outcomes(path: &Path, expected_label: &str) -> Result<OutcomeTable, OutcomeError> {
    let artifact = read_outcome_artifact(path)?;
    if artifact.label != expected_label {
        return Err(OutcomeError::LabelMismatch {
            expected: expected_label.to_string(),
            found: artifact.label,
        });
    }
    check_catalog(&artifact.variables)?;

    let mut outcomes = HashMap::with_capacity(artifact.records.len());
    let mut masked = 0usize;
    for record in artifact.records {
        let id = record.id;
        let mut values: [f32; VARIABLE_COUNT] =
            record.values.try_into().map_err(|v: Vec<f32>| OutcomeError::InvalidRecord {
                id,
                reason: format!("{} values, expected {VARIABLE_COUNT}", v.len()),
            })?;
        let valid_time = DateTime::from_timestamp(record.valid_time, 0).ok_or_else(|| {
            OutcomeError::InvalidRecord {
                id,
                reason: format!("valid time {} out of range", record.valid_time),
            }
        })?;

        for variable in Variable::ALL {
            let v = &mut values[variable.index()];
            if v.is_finite() && !variable.admits(*v) {
                *v = f32::NAN;
                masked += 1;
            }
        }

        if outcomes.insert(id, Outcome::new(valid_time, values)).is_some() {
            return Err(OutcomeError::DuplicateId(id));
        }
    }

    if masked > 0 {
        tracing::warn!(
            path = %path.display(),
            label = expected_label,
            masked,
            "outcome values outside physical bounds treated as missing"
        );
    }
    tracing::info!(
        path = %path.display(),
        label = expected_label,
        records = outcomes.len(),
        "loaded outcome table"
    );
    Ok(OutcomeTable::from_outcomes(expected_label, outcomes))
}

fn check_catalog(names: &[String]) -> Result<(), OutcomeError> {
    if names.len() != VARIABLE_COUNT {
        return Err(OutcomeError::CatalogMismatch(format!(
            "{} columns, expected {VARIABLE_COUNT}",
            names.len()
        )));
    }
    for (name, variable) in names.iter().zip(Variable::ALL) {
        if name != variable.name() {
            return Err(OutcomeError::CatalogMismatch(format!(
                "column {} is '{name}', expected '{}'",
                variable.index(),
                variable.name()
            )));
        }
    }
    Ok(())
}
