pub mod classify;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use ulid::Ulid;

pub use classify::{
    HeartRate, MeasurementError, SleepDuration, SleepQuality, StressLevel, ThresholdError,
    Thresholds, classify_sleep_quality, classify_stress,
};

// Display names never change after a device is registered, so `Box<str>`
// keeps them compact.
type BoxStr = Box<str>;

/// Unique identifier for a connected wearable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DeviceId(pub Ulid);

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Unique identifier for a stored sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SampleId(pub Ulid);

/// Supported wearables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeviceKind {
    AppleWatch,
    GalaxyWatch,
    Fitbit,
}

impl DeviceKind {
    pub const ALL: [DeviceKind; 3] = [
        DeviceKind::AppleWatch,
        DeviceKind::GalaxyWatch,
        DeviceKind::Fitbit,
    ];

    /// Human readable product name.
    pub fn display_name(self) -> &'static str {
        match self {
            DeviceKind::AppleWatch => "Apple Watch",
            DeviceKind::GalaxyWatch => "Galaxy Watch",
            DeviceKind::Fitbit => "Fitbit",
        }
    }

    /// Identifier used in configuration files and on the wire.
    pub fn as_str(self) -> &'static str {
        match self {
            DeviceKind::AppleWatch => "apple-watch",
            DeviceKind::GalaxyWatch => "galaxy-watch",
            DeviceKind::Fitbit => "fitbit",
        }
    }
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unsupported device type '{0}'")]
pub struct UnknownDeviceKind(pub String);

impl FromStr for DeviceKind {
    type Err = UnknownDeviceKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DeviceKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| UnknownDeviceKind(s.to_owned()))
    }
}

/// A wearable that completed its handshake and is currently connected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Device {
    /// Identity assigned at connection time.
    pub id: DeviceId,
    /// Display name derived from `kind`.
    pub name: BoxStr,
    pub kind: DeviceKind,
    /// True for as long as the device is registered.
    pub connected: bool,
    /// When the handshake completed.
    pub connected_at: jiff::Timestamp,
    /// Most recent successful data pull.
    pub last_sync: Option<jiff::Timestamp>,
}

impl Device {
    /// Build the registry entry for a device whose handshake just succeeded.
    pub fn connected(id: DeviceId, kind: DeviceKind, now: jiff::Timestamp) -> Self {
        Self {
            id,
            name: kind.display_name().into(),
            kind,
            connected: true,
            connected_at: now,
            last_sync: Some(now),
        }
    }
}

/// Validated raw inputs for one sample, before classification.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Reading {
    pub heart_rate: Option<HeartRate>,
    pub sleep_duration: Option<SleepDuration>,
}

impl Reading {
    pub fn heart_rate(heart_rate: HeartRate) -> Self {
        Self {
            heart_rate: Some(heart_rate),
            sleep_duration: None,
        }
    }

    pub fn sleep(duration: SleepDuration) -> Self {
        Self {
            heart_rate: None,
            sleep_duration: Some(duration),
        }
    }

    /// Validate untrusted values. At least one of them must be present.
    pub fn from_raw(
        heart_rate: Option<i64>,
        sleep_hours: Option<f64>,
    ) -> Result<Self, MeasurementError> {
        let reading = Self {
            heart_rate: heart_rate.map(HeartRate::new).transpose()?,
            sleep_duration: sleep_hours.map(SleepDuration::from_hours).transpose()?,
        };

        if reading.is_empty() {
            return Err(MeasurementError::EmptyReading);
        }

        Ok(reading)
    }

    pub fn is_empty(&self) -> bool {
        self.heart_rate.is_none() && self.sleep_duration.is_none()
    }
}

/// One classified telemetry reading.
///
/// Labels are derived from the raw values and cannot be set directly.
/// The raw values are kept so the labels can be recomputed when the
/// thresholds change.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Sample {
    id: SampleId,
    device_id: Option<DeviceId>,
    heart_rate: Option<HeartRate>,
    sleep_duration: Option<SleepDuration>,
    stress_level: Option<StressLevel>,
    sleep_quality: Option<SleepQuality>,
    timestamp: jiff::Timestamp,
}

impl Sample {
    pub fn classify(
        id: SampleId,
        device_id: Option<DeviceId>,
        reading: Reading,
        thresholds: &Thresholds,
        timestamp: jiff::Timestamp,
    ) -> Self {
        Self {
            id,
            device_id,
            heart_rate: reading.heart_rate,
            sleep_duration: reading.sleep_duration,
            stress_level: reading.heart_rate.map(|hr| thresholds.stress_level(hr)),
            sleep_quality: reading.sleep_duration.map(|d| thresholds.sleep_quality(d)),
            timestamp,
        }
    }

    /// Recompute labels from the raw values. Returns whether any label changed.
    pub fn reclassify(&mut self, thresholds: &Thresholds) -> bool {
        let stress_level = self.heart_rate.map(|hr| thresholds.stress_level(hr));
        let sleep_quality = self.sleep_duration.map(|d| thresholds.sleep_quality(d));

        let changed = stress_level != self.stress_level || sleep_quality != self.sleep_quality;
        self.stress_level = stress_level;
        self.sleep_quality = sleep_quality;
        changed
    }

    pub fn id(&self) -> SampleId {
        self.id
    }

    pub fn device_id(&self) -> Option<DeviceId> {
        self.device_id
    }

    pub fn heart_rate(&self) -> Option<HeartRate> {
        self.heart_rate
    }

    pub fn sleep_duration(&self) -> Option<SleepDuration> {
        self.sleep_duration
    }

    pub fn stress_level(&self) -> Option<StressLevel> {
        self.stress_level
    }

    pub fn sleep_quality(&self) -> Option<SleepQuality> {
        self.sleep_quality
    }

    pub fn timestamp(&self) -> jiff::Timestamp {
        self.timestamp
    }

    pub fn reading(&self) -> Reading {
        Reading {
            heart_rate: self.heart_rate,
            sleep_duration: self.sleep_duration,
        }
    }
}
