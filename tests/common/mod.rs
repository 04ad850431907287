//! Shared artifact fixtures for the integration tests.

#![allow(dead_code)]

use std::path::Path;

use analogcast::{
    DataConfig, ForecastConfig, Horizon, IndexArtifact, Metric, OutcomeArtifact, VARIABLE_COUNT,
    Variable, write_index_artifact, write_outcome_artifact,
};
use chrono::{DateTime, Duration, Utc};
use tempfile::TempDir;

pub const DIM: usize = 256;

/// Deterministic pseudo-random stream (splitmix64).
struct Stream(u64);

impl Stream {
    fn next_f32(&mut self) -> f32 {
        self.0 = self.0.wrapping_add(0x9E37_79B9_7F4A_7C15);
        let mut z = self.0;
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
        z ^= z >> 31;
        (z >> 40) as f32 / (1u64 << 24) as f32 - 0.5
    }
}

/// Unit-norm vector derived from `seed`.
pub fn unit_vector(seed: u64) -> Vec<f32> {
    let mut s = Stream(seed.wrapping_mul(0x2545_F491_4F6C_DD1D) ^ 0xA5A5_5A5A);
    let mut v: Vec<f32> = (0..DIM).map(|_| s.next_f32()).collect();
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    v.iter_mut().for_each(|x| *x /= norm);
    v
}

/// Physically plausible outcome row for analog `id`.
pub fn outcome_values(id: i64) -> [f32; VARIABLE_COUNT] {
    let wobble = (id % 7) as f32;
    let u = 2.0 + wobble * 0.3;
    let v = -1.0 + wobble * 0.2;
    let mut values = [0.0; VARIABLE_COUNT];
    values[Variable::Temperature2m.index()] = 11.0 + wobble * 0.5;
    values[Variable::Dewpoint2m.index()] = 6.0 + wobble * 0.4;
    values[Variable::MeanSeaLevelPressure.index()] = 1012.0 + wobble;
    values[Variable::WindU10m.index()] = u;
    values[Variable::WindV10m.index()] = v;
    values[Variable::WindSpeed10m.index()] = u.hypot(v);
    values[Variable::TotalPrecipitation.index()] = 0.2 * wobble;
    values[Variable::TotalCloudCover.index()] = 40.0 + 3.0 * wobble;
    values[Variable::RelativeHumidity2m.index()] = 65.0 + 2.0 * wobble;
    values
}

/// Write a `rows`-vector index and matching outcomes for `horizon` into `dir`
/// using the default file names.
pub fn write_horizon(dir: &Path, horizon: Horizon, rows: usize) {
    let label = horizon.label();
    let ids: Vec<i64> = (0..rows as i64).map(|i| 1_000_000 + i).collect();
    let vectors: Vec<f32> = ids.iter().flat_map(|&id| unit_vector(id as u64)).collect();

    let artifact = IndexArtifact {
        label: label.to_string(),
        metric: Metric::InnerProduct,
        dimension: DIM,
        ids: ids.clone(),
        vectors,
    };
    write_index_artifact(&dir.join(format!("{label}.aidx")), &artifact).expect("write index");

    let base: DateTime<Utc> = DateTime::<Utc>::UNIX_EPOCH + Duration::days(15_000);
    let mut outcomes = OutcomeArtifact::new(label);
    for &id in &ids {
        outcomes.push(id, base + Duration::hours(id - 1_000_000), outcome_values(id));
    }
    write_outcome_artifact(&dir.join(format!("{label}.aout")), &outcomes).expect("write outcomes");
}

/// Temp directory holding the given horizons, plus a config pointing at it.
pub fn fixture(horizons: &[(Horizon, usize)]) -> (TempDir, ForecastConfig) {
    let dir = TempDir::new().expect("tempdir");
    for &(horizon, rows) in horizons {
        write_horizon(dir.path(), horizon, rows);
    }
    let config = ForecastConfig::new().with_data(DataConfig::from_dir(dir.path()));
    (dir, config)
}

/// Embedding that matches stored row `row` exactly.
pub fn embedding_for_row(row: usize) -> Vec<f32> {
    unit_vector(1_000_000 + row as u64)
}
