use std::fs;
use std::path::PathBuf;

use anyhow::{Context, bail};
use analogcast::telemetry::{init_metrics, init_tracing};
use analogcast::{AnalogConfig, ForecastRequest, build_forecaster};

const USAGE: &str = "usage:
  analogcast <config.yaml> <request.json>   run one forecast and print the response
  analogcast --status <config.yaml>         print per-horizon load status";

enum Command {
    Forecast { config: PathBuf, request: PathBuf },
    Status { config: PathBuf },
}

fn parse_args(mut args: impl Iterator<Item = String>) -> anyhow::Result<Command> {
    match (args.next(), args.next(), args.next()) {
        (Some(flag), Some(config), None) if flag == "--status" => Ok(Command::Status {
            config: config.into(),
        }),
        (Some(config), Some(request), None) if !config.starts_with('-') => Ok(Command::Forecast {
            config: config.into(),
            request: request.into(),
        }),
        _ => bail!("{USAGE}"),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let command = parse_args(std::env::args().skip(1))?;
    let config_path = match &command {
        Command::Forecast { config, .. } | Command::Status { config } => config,
    };

    let config = AnalogConfig::from_file(config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;
    init_tracing(&config.logging)?;
    let sink = init_metrics(&config.metrics)?;
    let forecaster = build_forecaster(&config, sink)?;

    let ready = forecaster.status().iter().filter(|s| s.ready).count();
    metrics::gauge!("analog_horizons_ready").set(ready as f64);

    match command {
        Command::Status { .. } => {
            println!("{}", serde_json::to_string_pretty(&forecaster.status())?);
        }
        Command::Forecast { request, .. } => {
            let body = fs::read_to_string(&request)
                .with_context(|| format!("reading {}", request.display()))?;
            let req: ForecastRequest = serde_json::from_str(&body)
                .with_context(|| format!("parsing {}", request.display()))?;
            let response = forecaster.forecast_async(req).await?;
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
    }
    Ok(())
}
