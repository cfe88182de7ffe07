use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use vitals_aggregator::{
    Aggregator, AggregatorError, Clock, Config, DeviceLink, LinkConfig, MockDataSource,
    MockDeviceLink, PollConfig, PollEvent, Poller, SourceConfig, SystemClock,
};
use vitals_core::{Device, DeviceKind};

#[derive(Parser)]
#[command(name = "vitals-aggregator")]
#[command(about = "Wearable health telemetry aggregator")]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "vitals.toml")]
    config: PathBuf,

    /// Device to connect at startup, overrides the configured list
    #[arg(short, long = "device")]
    devices: Vec<DeviceKind>,

    /// Print the final summary as JSON
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    let filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "tracing=info,vitals_aggregator=info".to_owned());
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_span_events(tracing_subscriber::fmt::format::FmtSpan::CLOSE)
        .init();

    let cli = Cli::parse();

    let mut config = if cli.config.exists() {
        info!(path = ?cli.config, "Loading configuration");
        Config::load(&cli.config)?
    } else {
        info!("No configuration file found, using defaults");
        Config::default()
    };
    if !cli.devices.is_empty() {
        config.poll.devices = cli.devices;
    }
    config.validate()?;

    let link = match config.link {
        LinkConfig::Mock {
            latency_ms,
            failure_percent,
        } => {
            info!(latency_ms, failure_percent, "Using mock device link");
            MockDeviceLink::new(Duration::from_millis(latency_ms), failure_percent)
        }
    };
    let source = match config.source {
        SourceConfig::Mock { failure_percent } => {
            info!(failure_percent, "Using mock data source");
            Arc::new(MockDataSource::new(failure_percent))
        }
    };

    let aggregator = Aggregator::new(link, SystemClock, config.aggregator_settings())?;

    info!(
        devices = ?config.poll.devices,
        retention_days = config.aggregator.retention_days,
        "Starting vitals-aggregator"
    );

    for &kind in &config.poll.devices {
        if let Err(e) = connect_with_retry(&aggregator, kind, &config.poll).await {
            error!(%kind, error = %e, "Giving up on device");
        }
    }

    let cancel = CancellationToken::new();
    let poller = Poller::new(
        aggregator.clone(),
        source,
        Duration::from_secs(config.poll.heart_rate_interval_secs),
        Duration::from_secs(config.poll.sleep_interval_secs),
    );
    let mut events = poller.start(cancel.clone());

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received");
                cancel.cancel();
                break;
            }
            event = events.recv() => {
                let Some(event) = event else { break };
                log_event(&event);
            }
        }
    }

    let summary = aggregator.summary();
    if cli.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        info!(
            samples = summary.sample_count,
            latest_heart_rate = ?summary.latest_heart_rate,
            latest_stress = ?summary.latest_stress,
            latest_sleep = ?summary.latest_sleep,
            mean_heart_rate = ?summary.mean_heart_rate,
            mean_sleep_hours = ?summary.mean_sleep_hours,
            "Final summary"
        );
    }

    Ok(())
}

/// Connect one device, retrying transient failures with doubling backoff.
async fn connect_with_retry<L, C>(
    aggregator: &Aggregator<L, C>,
    kind: DeviceKind,
    poll: &PollConfig,
) -> Result<Device, AggregatorError>
where
    L: DeviceLink,
    C: Clock,
{
    let mut attempt = 1;

    loop {
        match aggregator.connect(kind).await {
            Ok(device) => return Ok(device),
            Err(e) if e.is_retryable() && attempt < poll.connect_attempts => {
                let backoff = poll.retry_backoff(attempt);
                warn!(
                    %kind,
                    attempt,
                    error = %e,
                    ?backoff,
                    "Retrying connection"
                );
                tokio::time::sleep(backoff).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

fn log_event(event: &PollEvent) {
    match event {
        PollEvent::Sampled { metric, sample } => info!(
            %metric,
            heart_rate = ?sample.heart_rate(),
            stress = ?sample.stress_level(),
            sleep = ?sample.sleep_duration(),
            quality = ?sample.sleep_quality(),
            "Sample"
        ),
        PollEvent::NoDevice { metric } => info!(%metric, "No device connected"),
        PollEvent::Failed { metric, error } => warn!(%metric, %error, "Poll failed"),
    }
}
