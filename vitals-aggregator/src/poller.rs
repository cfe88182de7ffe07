use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use vitals_core::Sample;

use crate::aggregator::Aggregator;
use crate::clock::Clock;
use crate::error::AggregatorError;
use crate::link::DeviceLink;
use crate::source::DataSource;

/// Which reading a poll loop collects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    HeartRate,
    Sleep,
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Metric::HeartRate => f.write_str("heart-rate"),
            Metric::Sleep => f.write_str("sleep"),
        }
    }
}

/// Outcome of one scheduled ingestion.
#[derive(Debug, Clone)]
pub enum PollEvent {
    /// A sample was classified and stored.
    Sampled { metric: Metric, sample: Sample },
    /// Nothing is connected. This is the normal idle state.
    NoDevice { metric: Metric },
    /// The read failed or produced an invalid measurement.
    Failed {
        metric: Metric,
        error: AggregatorError,
    },
}

/// Timer-driven ingestion.
///
/// Heart rate and sleep are polled by separate tasks so a slow read of one
/// never delays the other. Both tasks stop when the cancellation token
/// fires or the event receiver is dropped.
pub struct Poller<L, C, S: ?Sized> {
    aggregator: Aggregator<L, C>,
    source: Arc<S>,
    heart_rate_interval: Duration,
    sleep_interval: Duration,
}

impl<L, C, S> Poller<L, C, S>
where
    L: DeviceLink,
    C: Clock,
    S: DataSource + ?Sized,
{
    pub fn new(
        aggregator: Aggregator<L, C>,
        source: Arc<S>,
        heart_rate_interval: Duration,
        sleep_interval: Duration,
    ) -> Self {
        Self {
            aggregator,
            source,
            heart_rate_interval,
            sleep_interval,
        }
    }

    /// Spawn the poll loops. The first poll of each metric happens immediately.
    pub fn start(self, cancel: CancellationToken) -> mpsc::Receiver<PollEvent> {
        let (tx, rx) = mpsc::channel(100);

        info!(
            heart_rate_interval_secs = self.heart_rate_interval.as_secs(),
            sleep_interval_secs = self.sleep_interval.as_secs(),
            "Starting poller"
        );

        tokio::spawn(poll_loop(
            self.aggregator.clone(),
            Arc::clone(&self.source),
            Metric::HeartRate,
            self.heart_rate_interval,
            cancel.clone(),
            tx.clone(),
        ));
        tokio::spawn(poll_loop(
            self.aggregator,
            self.source,
            Metric::Sleep,
            self.sleep_interval,
            cancel,
            tx,
        ));

        rx
    }
}

async fn poll_loop<L, C, S>(
    aggregator: Aggregator<L, C>,
    source: Arc<S>,
    metric: Metric,
    period: Duration,
    cancel: CancellationToken,
    tx: mpsc::Sender<PollEvent>,
) where
    L: DeviceLink,
    C: Clock,
    S: DataSource + ?Sized,
{
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                info!(%metric, "Poller shutting down");
                break;
            }
            _ = interval.tick() => {
                let result = match metric {
                    Metric::HeartRate => aggregator.ingest_heart_rate(&*source).await,
                    Metric::Sleep => aggregator.ingest_sleep(&*source).await,
                };

                let event = match result {
                    Ok(sample) => PollEvent::Sampled { metric, sample },
                    Err(AggregatorError::NoDeviceConnected) => {
                        debug!(%metric, "Skipping poll, no device connected");
                        PollEvent::NoDevice { metric }
                    }
                    Err(error) => {
                        warn!(%metric, %error, "Poll failed");
                        PollEvent::Failed { metric, error }
                    }
                };

                if tx.send(event).await.is_err() {
                    info!(%metric, "Channel closed, poller shutting down");
                    return;
                }
            }
        }
    }
}
