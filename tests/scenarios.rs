//! End-to-end forecasts against on-disk artifacts.

mod common;

use analogcast::{
    ForecastConfig, ForecastRequest, ForecastState, Forecaster, Horizon, IndexVariant, Provenance,
    Variable,
};
use common::{DIM, embedding_for_row, fixture};

#[test]
fn full_index_serves_real_ensemble() {
    let (_dir, config) = fixture(&[(Horizon::H24, 13_148)]);
    let forecaster = Forecaster::new(config).expect("forecaster");

    let resp = forecaster
        .forecast(&ForecastRequest::new(Horizon::H24, 50, embedding_for_row(17)))
        .expect("forecast");

    assert_eq!(resp.provenance, Provenance::Real);
    assert_eq!(resp.k_requested, 50);
    assert_eq!(resp.k_effective, 50);
    assert_eq!(resp.analogs.len(), 50);
    assert_eq!(resp.analogs[0].id, 1_000_017);
    assert_eq!(resp.analogs[0].rank, 0);
    assert!(resp.analogs.windows(2).all(|w| w[0].score >= w[1].score));
    assert_eq!(resp.search_metadata.method, "exact");
    assert_eq!(resp.search_metadata.candidates_considered, 50);
    assert!(resp.search_metadata.fallback_reason.is_none());
    assert_eq!(
        resp.search_metadata.states.last(),
        Some(&ForecastState::Completed)
    );
    assert!(
        resp.search_metadata
            .states
            .contains(&ForecastState::AggregatingReal)
    );

    assert_eq!(resp.forecasts.len(), Variable::ALL.len());
    for (variable, result) in &resp.forecasts {
        assert!(result.available, "{variable} unavailable");
        assert_eq!(result.analog_count, 50, "{variable}");
        assert!(result.confidence > 0.0, "{variable}");
        assert!(result.confidence <= 100.0, "{variable}");
        assert!(result.p05 <= result.p50 && result.p50 <= result.p95, "{variable}");
    }
}

#[test]
fn missing_horizon_falls_back() {
    let (_dir, config) = fixture(&[(Horizon::H24, 500)]);
    let forecaster = Forecaster::new(config).expect("forecaster");

    let resp = forecaster
        .forecast(
            &ForecastRequest::new(Horizon::H6, 20, embedding_for_row(0))
                .with_variables(&[Variable::Temperature2m, Variable::WindSpeed10m]),
        )
        .expect("forecast");

    assert_eq!(resp.provenance, Provenance::Fallback);
    assert_eq!(resp.k_effective, 20);
    assert!(resp.analogs.is_empty());
    assert_eq!(resp.search_metadata.method, "fallback");
    let reason = resp.search_metadata.fallback_reason.expect("reason");
    assert!(reason.starts_with("index_unavailable"), "{reason}");
    assert_eq!(resp.forecasts.len(), 2);
    assert!(resp.forecasts.values().all(|r| r.available));
    assert!(
        resp.search_metadata
            .states
            .contains(&ForecastState::AggregatingFallback)
    );
}

#[test]
fn maximum_k_is_served_in_full() {
    let (_dir, config) = fixture(&[(Horizon::H12, 6_574)]);
    let forecaster = Forecaster::new(config).expect("forecaster");

    let resp = forecaster
        .forecast(&ForecastRequest::new(Horizon::H12, 200, embedding_for_row(3)))
        .expect("forecast");

    assert_eq!(resp.provenance, Provenance::Real);
    assert_eq!(resp.k_effective, 200);
    assert_eq!(resp.analogs.len(), 200);
    assert!(
        resp.forecasts
            .values()
            .all(|r| r.analog_count == 200)
    );
}

#[test]
fn repeated_requests_are_byte_identical() {
    let (_dir, config) = fixture(&[(Horizon::H24, 13_148)]);
    let forecaster = Forecaster::new(config).expect("forecaster");
    let req = ForecastRequest::new(Horizon::H24, 50, embedding_for_row(901));

    let first = forecaster.forecast(&req).expect("first");
    let first_json = serde_json::to_string(&first.forecasts).unwrap();
    for _ in 0..3 {
        let again = forecaster.forecast(&req).expect("again");
        assert_eq!(serde_json::to_string(&again.forecasts).unwrap(), first_json);
        assert_eq!(again.analogs, first.analogs);
    }
}

#[test]
fn wrong_dimension_embedding_falls_back() {
    let (_dir, config) = fixture(&[(Horizon::H24, 500)]);
    let forecaster = Forecaster::new(config).expect("forecaster");

    let mut short = embedding_for_row(0);
    short.truncate(DIM - 1);
    let resp = forecaster
        .forecast(&ForecastRequest::new(Horizon::H24, 10, short))
        .expect("forecast");

    assert_eq!(resp.provenance, Provenance::Fallback);
    assert_eq!(resp.k_effective, 10);
    let reason = resp.search_metadata.fallback_reason.expect("reason");
    assert!(reason.starts_with("dimension_mismatch"), "{reason}");
}

#[test]
fn small_index_caps_effective_k() {
    let (_dir, config) = fixture(&[(Horizon::H48, 30)]);
    let forecaster = Forecaster::new(config).expect("forecaster");

    let resp = forecaster
        .forecast(&ForecastRequest::new(Horizon::H48, 100, embedding_for_row(5)))
        .expect("forecast");

    assert_eq!(resp.provenance, Provenance::Real);
    assert_eq!(resp.k_requested, 100);
    assert_eq!(resp.k_effective, 30);
    // Coverage is 30 / 100, so confidence cannot exceed 30.
    assert!(resp.forecasts.values().all(|r| r.confidence <= 30.0 + 1e-3));
}

#[tokio::test]
async fn async_path_matches_sync_path() {
    let (_dir, config) = fixture(&[(Horizon::H6, 2_000)]);
    let forecaster = Forecaster::new(config).expect("forecaster");
    let req = ForecastRequest::new(Horizon::H6, 25, embedding_for_row(44));

    let sync = forecaster.forecast(&req).expect("sync");
    let asynchronous = forecaster.forecast_async(req).await.expect("async");

    assert_eq!(asynchronous.provenance, Provenance::Real);
    assert_eq!(
        serde_json::to_string(&asynchronous.forecasts).unwrap(),
        serde_json::to_string(&sync.forecasts).unwrap()
    );
}

fn with_variant(mut config: ForecastConfig, variant: IndexVariant) -> ForecastConfig {
    config.index = config.index.with_variant(variant);
    config
}

#[test]
fn quantized_variant_serves_real_ensemble() {
    let (_dir, config) = fixture(&[(Horizon::H24, 2_000)]);
    let exact = Forecaster::new(with_variant(config.clone(), IndexVariant::Exact)).expect("exact");
    let quantized =
        Forecaster::new(with_variant(config, IndexVariant::Quantized)).expect("quantized");
    let req = ForecastRequest::new(Horizon::H24, 30, embedding_for_row(123));

    let e = exact.forecast(&req).expect("exact forecast");
    let q = quantized.forecast(&req).expect("quantized forecast");

    assert_eq!(q.provenance, Provenance::Real);
    assert_eq!(q.search_metadata.method, "quantized");
    assert_eq!(q.k_effective, 30);
    assert!(q.analogs.windows(2).all(|w| w[0].score >= w[1].score));
    assert!(q.analogs.iter().all(|a| (-1.0..=1.0).contains(&a.score)));
    assert_eq!(q.analogs[0].id, e.analogs[0].id);
    assert_eq!(q.analogs[0].id, 1_000_123);
}

#[test]
fn out_of_range_scores_fall_back_on_every_variant() {
    let (_dir, config) = fixture(&[(Horizon::H24, 500)]);
    let scaled: Vec<f32> = embedding_for_row(5).iter().map(|v| v * 3.0).collect();

    for variant in [IndexVariant::Exact, IndexVariant::Quantized] {
        let forecaster =
            Forecaster::new(with_variant(config.clone(), variant)).expect("forecaster");
        let resp = forecaster
            .forecast(&ForecastRequest::new(Horizon::H24, 10, scaled.clone()))
            .expect("forecast");

        assert_eq!(resp.provenance, Provenance::Fallback, "{variant}");
        let reason = resp.search_metadata.fallback_reason.expect("reason");
        assert!(reason.starts_with("validation_plausibility"), "{variant}: {reason}");
    }
}
