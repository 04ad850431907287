//! # Analog Outcomes
//!
//! Recorded weather outcomes for every historical analog, keyed by the same
//! integer id the vector index returns. Each horizon has its own table and its
//! own artifact file; a table is immutable once loaded.
//!
//! Outcome vectors follow the fixed [`Variable`] catalog order. A value of
//! `NaN` means the variable was not recorded for that analog.
//!
//! ```
//! use outcomes::{Outcome, OutcomeTable, Variable};
//! use chrono::{TimeZone, Utc};
//!
//! let mut values = [f32::NAN; outcomes::VARIABLE_COUNT];
//! values[Variable::Temperature2m.index()] = 12.5;
//! let valid_time = Utc.with_ymd_and_hms(2021, 3, 4, 12, 0, 0).unwrap();
//!
//! let table = OutcomeTable::from_outcomes("24h", [(7, Outcome::new(valid_time, values))]);
//! let found = table.fetch(&[7, 8]);
//! assert_eq!(found.len(), 1);
//! assert_eq!(found[&7].value(Variable::Temperature2m), Some(12.5));
//! assert_eq!(found[&7].value(Variable::Dewpoint2m), None);
//! ```

mod artifact;
mod catalog;
mod table;

pub use artifact::{
    load_outcomes, read_outcome_artifact, write_outcome_artifact, OutcomeArtifact, OutcomeRecord,
    OUTCOME_FORMAT_VERSION, OUTCOME_MAGIC,
};
pub use catalog::{UnknownVariable, Variable, VARIABLE_COUNT};
pub use table::{Outcome, OutcomeTable};

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while loading or writing an outcome table.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum OutcomeError {
    #[error("outcome file not found: {0}")]
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
    #[error("outcome table labelled '{found}', expected '{expected}'")]
    LabelMismatch { expected: String, found: String },
    #[error("variable catalog mismatch: {0}")]
    CatalogMismatch(String),
    #[error("invalid record for id {id}: {reason}")]
    InvalidRecord { id: i64, reason: String },
    #[error("duplicate outcome id {0}")]
    DuplicateId(i64),
}

impl OutcomeError {
    pub(crate) fn io(path: impl Into<PathBuf>, err: std::io::Error) -> Self {
        let path = path.into();
        if err.kind() == std::io::ErrorKind::NotFound {
            OutcomeError::NotFound(path)
        } else {
            OutcomeError::Io {
                path,
                message: err.to_string(),
            }
        }
    }
}
