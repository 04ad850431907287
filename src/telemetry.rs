//! Process-wide tracing and metrics setup for the binary.

use std::sync::Arc;

use anyhow::Context;
use forecast::{MetricsSink, NoopMetrics, RecorderMetrics};
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing_subscriber::EnvFilter;

use crate::config::{LoggingConfig, MetricsConfig};

/// Environment variable that overrides `logging.level`.
pub const LOG_ENV: &str = "ANALOGCAST_LOG";

/// Install the global tracing subscriber.
///
/// Fails if a subscriber is already installed.
pub fn init_tracing(cfg: &LoggingConfig) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_new(&cfg.level))
        .with_context(|| format!("invalid log filter {:?}", cfg.level))?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    let installed = if cfg.json {
        builder
            .json()
            .with_thread_ids(true)
            .with_thread_names(true)
            .try_init()
    } else {
        builder.try_init()
    };
    installed.map_err(|e| anyhow::anyhow!("failed to install tracing subscriber: {e}"))
}

/// Install the Prometheus exporter when configured and return the sink the
/// forecaster should report to.
pub fn init_metrics(cfg: &MetricsConfig) -> anyhow::Result<Arc<dyn MetricsSink>> {
    let Some(addr) = cfg.listen_addr()? else {
        return Ok(Arc::new(NoopMetrics));
    };

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .with_context(|| format!("failed to start prometheus exporter on {addr}"))?;
    tracing::info!(%addr, "prometheus exporter listening");
    Ok(Arc::new(RecorderMetrics))
}
