use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use jiff::SignedDuration;
use tracing::{Span, debug, field, info, instrument, warn};
use ulid::Ulid;
use vitals_core::{
    Device, DeviceId, DeviceKind, HeartRate, MeasurementError, Reading, Sample, SampleId,
    SleepDuration, Thresholds,
};

use crate::clock::{Clock, SystemClock};
use crate::error::{AggregatorError, ConnectFailure, SettingsError};
use crate::link::DeviceLink;
use crate::registry::DeviceRegistry;
use crate::source::DataSource;
use crate::storage::{SampleStore, StoreStats};
use crate::summary::HealthSummary;

/// Tunables for an [`Aggregator`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AggregatorSettings {
    /// Upper bound on a single handshake.
    pub handshake_timeout: Duration,
    /// Samples older than this are purged on the next write.
    pub retention: SignedDuration,
    pub thresholds: Thresholds,
    /// Nightly sleep goal used for summary progress.
    pub sleep_target_hours: f64,
}

impl Default for AggregatorSettings {
    fn default() -> Self {
        Self {
            handshake_timeout: Duration::from_secs(5),
            retention: SignedDuration::from_hours(30 * 24),
            thresholds: Thresholds::default(),
            sleep_target_hours: 8.0,
        }
    }
}

impl AggregatorSettings {
    /// Check every setting, thresholds included.
    pub fn validate(&self) -> Result<(), AggregatorError> {
        if self.handshake_timeout.is_zero() {
            return Err(SettingsError::ZeroHandshakeTimeout.into());
        }
        if !self.retention.is_positive() {
            return Err(SettingsError::NonPositiveRetention(self.retention).into());
        }
        if !(self.sleep_target_hours.is_finite() && self.sleep_target_hours > 0.0) {
            return Err(SettingsError::InvalidSleepTarget(self.sleep_target_hours).into());
        }
        self.thresholds.validate()?;
        Ok(())
    }
}

/// Owns the device registry and the sample history.
///
/// Cloning is cheap and every clone refers to the same state. All mutations
/// go through one mutex per aggregator; it is never held across an await
/// point, so the handshake and source reads run unlocked and only their
/// results are published.
pub struct Aggregator<L, C = SystemClock> {
    shared: Arc<Shared<L, C>>,
}

struct Shared<L, C> {
    link: L,
    clock: C,
    handshake_timeout: Duration,
    sleep_target_hours: f64,
    inner: Mutex<Inner>,
}

struct Inner {
    registry: DeviceRegistry,
    store: SampleStore,
    thresholds: Thresholds,
}

impl Inner {
    fn append(
        &mut self,
        device_id: Option<DeviceId>,
        reading: Reading,
        now: jiff::Timestamp,
    ) -> Sample {
        let sample = Sample::classify(
            SampleId(Ulid::new()),
            device_id,
            reading,
            &self.thresholds,
            now,
        );

        let purged = self.store.append(sample.clone(), now);
        if purged > 0 {
            debug!(purged, "Purged samples outside the retention window");
        }

        sample
    }
}

impl<L, C> Clone for Aggregator<L, C> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<L: DeviceLink, C: Clock> Aggregator<L, C> {
    pub fn new(link: L, clock: C, settings: AggregatorSettings) -> Result<Self, AggregatorError> {
        settings.validate()?;

        Ok(Self {
            shared: Arc::new(Shared {
                link,
                clock,
                handshake_timeout: settings.handshake_timeout,
                sleep_target_hours: settings.sleep_target_hours,
                inner: Mutex::new(Inner {
                    registry: DeviceRegistry::default(),
                    store: SampleStore::new(settings.retention),
                    thresholds: settings.thresholds,
                }),
            }),
        })
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.shared
            .inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Pair with a device and register it.
    ///
    /// The device becomes visible only after the handshake succeeds within
    /// the configured timeout. If the timeout fires first the handshake is
    /// dropped, and a success arriving later has nothing to publish into.
    /// Every successful call yields a new device id, including repeated
    /// connects of the same kind.
    #[instrument(skip(self), fields(device_id = field::Empty))]
    pub async fn connect(&self, kind: DeviceKind) -> Result<Device, AggregatorError> {
        let timeout = self.shared.handshake_timeout;
        info!("Connecting device");

        let failure = match tokio::time::timeout(timeout, self.shared.link.handshake(kind)).await {
            Ok(Ok(())) => None,
            Ok(Err(err)) => Some(ConnectFailure::Rejected(err.to_string())),
            Err(_) => Some(ConnectFailure::TimedOut(timeout)),
        };
        if let Some(reason) = failure {
            warn!(%reason, "Connection failed");
            return Err(AggregatorError::ConnectionFailed { kind, reason });
        }

        let now = self.shared.clock.now();
        let (device, connected) = {
            let mut inner = self.lock();
            let device = inner
                .registry
                .register(kind, now)
                .map_err(|reason| AggregatorError::ConnectionFailed { kind, reason })?;
            (device, inner.registry.len())
        };

        Span::current().record("device_id", field::display(device.id));
        info!(name = %device.name, connected, "Device connected");
        Ok(device)
    }

    /// [`connect`](Self::connect) for a kind given by its configuration name,
    /// e.g. `"apple-watch"`.
    pub async fn connect_named(&self, kind: &str) -> Result<Device, AggregatorError> {
        let kind = kind.parse::<DeviceKind>()?;
        self.connect(kind).await
    }

    /// Remove a device. Unknown ids are ignored.
    pub fn disconnect(&self, id: DeviceId) {
        match self.lock().registry.remove(id) {
            Some(device) => info!(device_id = %id, kind = %device.kind, "Device disconnected"),
            None => debug!(device_id = %id, "Disconnect for unknown device ignored"),
        }
    }

    /// Connected devices, oldest connection first.
    pub fn list_connected(&self) -> Vec<Device> {
        self.lock().registry.list()
    }

    /// Read one heart rate from `source`, classify it and store it.
    #[instrument(skip_all)]
    pub async fn ingest_heart_rate<S>(&self, source: &S) -> Result<Sample, AggregatorError>
    where
        S: DataSource + ?Sized,
    {
        self.require_device()?;

        let bpm = source
            .read_heart_rate()
            .await
            .inspect_err(|err| warn!(%err, "Heart rate read failed"))?;
        let heart_rate = HeartRate::new(bpm)
            .inspect_err(|err| warn!(bpm, %err, "Discarding invalid heart rate"))?;

        self.record(Reading::heart_rate(heart_rate))
    }

    /// Read one sleep duration from `source`, classify it and store it.
    #[instrument(skip_all)]
    pub async fn ingest_sleep<S>(&self, source: &S) -> Result<Sample, AggregatorError>
    where
        S: DataSource + ?Sized,
    {
        self.require_device()?;

        let hours = source
            .read_sleep_duration()
            .await
            .inspect_err(|err| warn!(%err, "Sleep read failed"))?;
        let duration = SleepDuration::from_hours(hours)
            .inspect_err(|err| warn!(hours, %err, "Discarding invalid sleep duration"))?;

        self.record(Reading::sleep(duration))
    }

    fn require_device(&self) -> Result<(), AggregatorError> {
        if self.lock().registry.is_empty() {
            debug!("No device connected");
            return Err(AggregatorError::NoDeviceConnected);
        }
        Ok(())
    }

    // The registry may have emptied while the source was being read.
    fn record(&self, reading: Reading) -> Result<Sample, AggregatorError> {
        let now = self.shared.clock.now();
        let mut inner = self.lock();

        let Some(device_id) = inner.registry.primary() else {
            debug!("Device disconnected during read, discarding reading");
            return Err(AggregatorError::NoDeviceConnected);
        };

        inner.registry.touch(device_id, now);
        let sample = inner.append(Some(device_id), reading, now);
        debug!(
            %device_id,
            stress = ?sample.stress_level(),
            sleep = ?sample.sleep_quality(),
            "Sample stored"
        );
        Ok(sample)
    }

    /// Classify and store a reading that did not come through a source.
    ///
    /// The timestamp is taken from the aggregator's clock at append time.
    /// Samples outside the retention window are purged afterwards.
    pub fn store_sample(&self, reading: Reading) -> Result<Sample, AggregatorError> {
        if reading.is_empty() {
            return Err(MeasurementError::EmptyReading.into());
        }

        let now = self.shared.clock.now();
        Ok(self.lock().append(None, reading, now))
    }

    /// Retained samples, oldest first.
    pub fn history(&self) -> Vec<Sample> {
        self.lock().store.history()
    }

    pub fn thresholds(&self) -> Thresholds {
        self.lock().thresholds
    }

    /// Swap classification thresholds and relabel the retained history.
    /// Returns the number of samples whose labels changed.
    pub fn update_thresholds(&self, thresholds: Thresholds) -> Result<usize, AggregatorError> {
        thresholds.validate()?;

        let mut inner = self.lock();
        inner.thresholds = thresholds;
        let changed = inner.store.reclassify(&thresholds);

        info!(changed, "Thresholds updated");
        Ok(changed)
    }

    pub fn summary(&self) -> HealthSummary {
        HealthSummary::from_samples(self.lock().store.samples(), self.shared.sleep_target_hours)
    }

    pub fn stats(&self) -> StoreStats {
        self.lock().store.stats()
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::clock::ManualClock;
    use crate::link::mock::MockDeviceLink;
    use crate::source::SourceUnavailable;

    struct Fixed(i64, f64);

    #[async_trait]
    impl DataSource for Fixed {
        async fn read_heart_rate(&self) -> Result<i64, SourceUnavailable> {
            Ok(self.0)
        }

        async fn read_sleep_duration(&self) -> Result<f64, SourceUnavailable> {
            Ok(self.1)
        }
    }

    fn aggregator() -> Aggregator<MockDeviceLink, ManualClock> {
        let clock = ManualClock::new(jiff::Timestamp::from_second(1_700_000_000).unwrap());
        Aggregator::new(MockDeviceLink::instant(), clock, AggregatorSettings::default()).unwrap()
    }

    #[tokio::test]
    async fn samples_are_attributed_to_latest_device() {
        let agg = aggregator();
        agg.connect(DeviceKind::Fitbit).await.unwrap();
        let watch = agg.connect(DeviceKind::AppleWatch).await.unwrap();

        let sample = agg.ingest_heart_rate(&Fixed(90, 7.0)).await.unwrap();
        assert_eq!(sample.device_id(), Some(watch.id));
    }

    #[tokio::test]
    async fn invalid_reading_is_not_stored() {
        let agg = aggregator();
        agg.connect(DeviceKind::Fitbit).await.unwrap();

        let err = agg.ingest_heart_rate(&Fixed(0, 7.0)).await.unwrap_err();
        assert_eq!(
            err,
            AggregatorError::InvalidMeasurement(MeasurementError::NonPositiveHeartRate(0))
        );

        let err = agg.ingest_sleep(&Fixed(70, -1.0)).await.unwrap_err();
        assert!(matches!(err, AggregatorError::InvalidMeasurement(_)));
        assert!(agg.history().is_empty());
    }

    #[test]
    fn empty_reading_is_rejected() {
        let agg = aggregator();
        let err = agg.store_sample(Reading::default()).unwrap_err();
        assert_eq!(
            err,
            AggregatorError::InvalidMeasurement(MeasurementError::EmptyReading)
        );
    }

    #[test]
    fn invalid_settings_are_rejected() {
        let settings = AggregatorSettings {
            thresholds: Thresholds {
                stress_medium: 120,
                ..Thresholds::default()
            },
            ..AggregatorSettings::default()
        };
        let result = Aggregator::new(
            MockDeviceLink::instant(),
            ManualClock::new(jiff::Timestamp::UNIX_EPOCH),
            settings,
        );
        assert!(matches!(result, Err(AggregatorError::InvalidThresholds(_))));
    }

    #[test]
    fn degenerate_settings_are_rejected() {
        let cases = [
            (
                AggregatorSettings {
                    retention: SignedDuration::ZERO,
                    ..AggregatorSettings::default()
                },
                SettingsError::NonPositiveRetention(SignedDuration::ZERO),
            ),
            (
                AggregatorSettings {
                    retention: SignedDuration::from_hours(-1),
                    ..AggregatorSettings::default()
                },
                SettingsError::NonPositiveRetention(SignedDuration::from_hours(-1)),
            ),
            (
                AggregatorSettings {
                    handshake_timeout: Duration::ZERO,
                    ..AggregatorSettings::default()
                },
                SettingsError::ZeroHandshakeTimeout,
            ),
            (
                AggregatorSettings {
                    sleep_target_hours: 0.0,
                    ..AggregatorSettings::default()
                },
                SettingsError::InvalidSleepTarget(0.0),
            ),
        ];

        for (settings, expected) in cases {
            let result = Aggregator::new(
                MockDeviceLink::instant(),
                ManualClock::new(jiff::Timestamp::UNIX_EPOCH),
                settings,
            );
            assert_eq!(result.err(), Some(AggregatorError::InvalidSettings(expected)));
        }

        let nan = AggregatorSettings {
            sleep_target_hours: f64::NAN,
            ..AggregatorSettings::default()
        };
        assert!(matches!(
            nan.validate(),
            Err(AggregatorError::InvalidSettings(SettingsError::InvalidSleepTarget(_)))
        ));
    }

    #[test]
    fn stored_sample_stays_in_history_with_shortest_retention() {
        let settings = AggregatorSettings {
            retention: SignedDuration::from_secs(1),
            ..AggregatorSettings::default()
        };
        let agg = Aggregator::new(
            MockDeviceLink::instant(),
            ManualClock::new(jiff::Timestamp::UNIX_EPOCH),
            settings,
        )
        .unwrap();

        let sample = agg
            .store_sample(Reading::heart_rate(HeartRate::new(72).unwrap()))
            .unwrap();
        assert_eq!(agg.history(), vec![sample]);
    }
}
