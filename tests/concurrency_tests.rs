//! Concurrency and thread safety tests for the forecaster

mod common;

use std::sync::Arc;
use std::thread;

use analogcast::{AtomicMetrics, ForecastRequest, Forecaster, Horizon, Provenance};
use common::{embedding_for_row, fixture, write_horizon};

#[test]
fn concurrent_forecasts_share_one_forecaster() {
    let (_dir, config) = fixture(&[(Horizon::H6, 1_000), (Horizon::H24, 1_000)]);
    let metrics = Arc::new(AtomicMetrics::new());
    let forecaster = Arc::new(
        Forecaster::new(config)
            .expect("forecaster")
            .with_metrics(metrics.clone()),
    );

    let expected = forecaster
        .forecast(&ForecastRequest::new(Horizon::H24, 20, embedding_for_row(9)))
        .expect("baseline");

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let forecaster = Arc::clone(&forecaster);
            thread::spawn(move || {
                let horizon = if i % 2 == 0 { Horizon::H24 } else { Horizon::H12 };
                (0..10)
                    .map(|_| {
                        forecaster
                            .forecast(&ForecastRequest::new(horizon, 20, embedding_for_row(9)))
                            .expect("forecast")
                    })
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    for (i, handle) in handles.into_iter().enumerate() {
        for resp in handle.join().expect("thread") {
            if i % 2 == 0 {
                assert_eq!(resp.provenance, Provenance::Real);
                assert_eq!(resp.forecasts, expected.forecasts);
            } else {
                assert_eq!(resp.provenance, Provenance::Fallback);
            }
        }
    }

    assert_eq!(metrics.real_searches(), 41);
    assert_eq!(metrics.fallback_searches(), 40);
    assert_eq!(metrics.latency_count(Horizon::H24, 20), 41);
}

#[test]
fn reload_while_forecasting_never_fails_a_request() {
    let (dir, config) = fixture(&[]);
    let forecaster = Arc::new(Forecaster::new(config).expect("forecaster"));

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let forecaster = Arc::clone(&forecaster);
            thread::spawn(move || {
                for _ in 0..50 {
                    let resp = forecaster
                        .forecast(&ForecastRequest::new(Horizon::H48, 15, embedding_for_row(2)))
                        .expect("forecast");
                    assert_eq!(resp.k_effective, 15);
                    assert!(resp.forecasts.values().all(|r| r.available));
                }
            })
        })
        .collect();

    write_horizon(dir.path(), Horizon::H48, 800);
    let status = forecaster.reload(Horizon::H48);
    assert!(status.ready, "{status:?}");

    for reader in readers {
        reader.join().expect("reader");
    }

    let resp = forecaster
        .forecast(&ForecastRequest::new(Horizon::H48, 15, embedding_for_row(2)))
        .expect("forecast");
    assert_eq!(resp.provenance, Provenance::Real);
    assert_eq!(resp.analogs[0].id, 1_000_002);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_async_forecasts() {
    let (_dir, config) = fixture(&[(Horizon::H12, 1_500)]);
    let forecaster = Arc::new(Forecaster::new(config).expect("forecaster"));

    let tasks: Vec<_> = (0..16)
        .map(|i| {
            let forecaster = Arc::clone(&forecaster);
            tokio::spawn(async move {
                forecaster
                    .forecast_async(ForecastRequest::new(Horizon::H12, 10, embedding_for_row(i)))
                    .await
            })
        })
        .collect();

    for (i, task) in tasks.into_iter().enumerate() {
        let resp = task.await.expect("join").expect("forecast");
        assert_eq!(resp.provenance, Provenance::Real);
        assert_eq!(resp.analogs[0].id, 1_000_000 + i as i64);
    }
}
