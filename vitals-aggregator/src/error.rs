use std::time::Duration;

use jiff::SignedDuration;
use vitals_core::{DeviceKind, MeasurementError, ThresholdError, UnknownDeviceKind};

use crate::source::SourceUnavailable;

/// Errors returned by [`Aggregator`](crate::Aggregator) operations.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AggregatorError {
    #[error("unsupported device type '{0}'")]
    UnsupportedDeviceType(String),

    #[error("failed to connect {kind}: {reason}")]
    ConnectionFailed {
        kind: DeviceKind,
        reason: ConnectFailure,
    },

    #[error("no device connected")]
    NoDeviceConnected,

    #[error("invalid measurement: {0}")]
    InvalidMeasurement(#[from] MeasurementError),

    #[error(transparent)]
    SourceUnavailable(#[from] SourceUnavailable),

    #[error("invalid thresholds: {0}")]
    InvalidThresholds(#[from] ThresholdError),

    #[error("invalid settings: {0}")]
    InvalidSettings(#[from] SettingsError),
}

impl AggregatorError {
    /// Transient failures that a caller may retry with backoff.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AggregatorError::ConnectionFailed { .. } | AggregatorError::SourceUnavailable(_)
        )
    }
}

impl From<UnknownDeviceKind> for AggregatorError {
    fn from(err: UnknownDeviceKind) -> Self {
        AggregatorError::UnsupportedDeviceType(err.0)
    }
}

/// Why a handshake did not produce a device.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConnectFailure {
    #[error("handshake timed out after {0:?}")]
    TimedOut(Duration),

    #[error("handshake rejected: {0}")]
    Rejected(String),

    #[error("device id space exhausted")]
    IdsExhausted,
}

/// Aggregator settings that cannot be honoured.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SettingsError {
    #[error("handshake timeout must be non-zero")]
    ZeroHandshakeTimeout,

    #[error("retention window must be positive, got {0}")]
    NonPositiveRetention(SignedDuration),

    #[error("sleep target must be a positive number of hours, got {0}")]
    InvalidSleepTarget(f64),
}
