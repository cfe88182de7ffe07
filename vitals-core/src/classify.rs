//! Measurement validation and the heart-rate / sleep classification rules.
//!
//! Raw values coming off a data source are untrusted. They are turned into
//! [`HeartRate`] and [`SleepDuration`] first, and only validated values are
//! ever classified, so the label functions on [`Thresholds`] are infallible.

use std::fmt;

use ordered_float::NotNan;
use serde::{Deserialize, Serialize};

/// A measurement that cannot be turned into a sample.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MeasurementError {
    #[error("heart rate must be a positive number of beats per minute, got {0}")]
    NonPositiveHeartRate(i64),

    #[error("heart rate {0} bpm is out of range")]
    HeartRateOutOfRange(i64),

    #[error("sleep duration must not be negative, got {0} hours")]
    NegativeSleepDuration(f64),

    #[error("sleep duration is not a number")]
    SleepDurationNaN,

    #[error("sleep duration must be finite")]
    SleepDurationInfinite,

    #[error("reading carries neither a heart rate nor a sleep duration")]
    EmptyReading,
}

/// Thresholds that are inconsistent with each other.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ThresholdError {
    #[error("stress_medium ({medium}) must be below stress_high ({high})")]
    StressOrder { medium: u32, high: u32 },

    #[error("stress_medium must be positive")]
    ZeroStressMedium,

    #[error("sleep_average ({average}) must be below sleep_good ({good})")]
    SleepOrder { average: f64, good: f64 },

    #[error("sleep thresholds must be finite and non-negative")]
    SleepOutOfRange,
}

/// Beats per minute, always positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct HeartRate(u32);

impl HeartRate {
    pub fn new(bpm: i64) -> Result<Self, MeasurementError> {
        if bpm <= 0 {
            return Err(MeasurementError::NonPositiveHeartRate(bpm));
        }

        u32::try_from(bpm)
            .map(Self)
            .map_err(|_| MeasurementError::HeartRateOutOfRange(bpm))
    }

    pub fn bpm(self) -> u32 {
        self.0
    }
}

impl fmt::Display for HeartRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} bpm", self.0)
    }
}

/// Hours of sleep, finite and non-negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct SleepDuration(NotNan<f64>);

impl SleepDuration {
    pub fn from_hours(hours: f64) -> Result<Self, MeasurementError> {
        let hours = NotNan::new(hours).map_err(|_| MeasurementError::SleepDurationNaN)?;

        if hours.is_infinite() {
            return Err(MeasurementError::SleepDurationInfinite);
        }
        if *hours < 0.0 {
            return Err(MeasurementError::NegativeSleepDuration(*hours));
        }

        Ok(Self(hours))
    }

    pub fn hours(self) -> f64 {
        *self.0
    }
}

impl fmt::Display for SleepDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1} h", *self.0)
    }
}

/// Stress derived from heart rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StressLevel {
    Low,
    Medium,
    High,
}

impl StressLevel {
    /// Medium and high stress warrant offering a breathing exercise.
    pub fn suggests_breathing(self) -> bool {
        matches!(self, StressLevel::Medium | StressLevel::High)
    }
}

/// Sleep quality derived from sleep duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SleepQuality {
    Good,
    Average,
    Poor,
}

/// Classification boundaries.
///
/// Stress bands are half-open with an inclusive lower bound:
/// `[0, stress_medium)` is low, `[stress_medium, stress_high)` is medium,
/// anything at or above `stress_high` is high.
///
/// Sleep bands are inclusive at the top: above `sleep_good` is good,
/// `(sleep_average, sleep_good]` is average, the rest is poor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    pub stress_medium: u32,
    pub stress_high: u32,
    pub sleep_good: f64,
    pub sleep_average: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            stress_medium: 80,
            stress_high: 100,
            sleep_good: 7.5,
            sleep_average: 6.5,
        }
    }
}

impl Thresholds {
    pub fn validate(&self) -> Result<(), ThresholdError> {
        if self.stress_medium == 0 {
            return Err(ThresholdError::ZeroStressMedium);
        }
        if self.stress_medium >= self.stress_high {
            return Err(ThresholdError::StressOrder {
                medium: self.stress_medium,
                high: self.stress_high,
            });
        }

        let finite = self.sleep_good.is_finite() && self.sleep_average.is_finite();
        if !finite || self.sleep_average < 0.0 {
            return Err(ThresholdError::SleepOutOfRange);
        }
        if self.sleep_average >= self.sleep_good {
            return Err(ThresholdError::SleepOrder {
                average: self.sleep_average,
                good: self.sleep_good,
            });
        }

        Ok(())
    }

    pub fn stress_level(&self, heart_rate: HeartRate) -> StressLevel {
        let bpm = heart_rate.bpm();
        if bpm < self.stress_medium {
            StressLevel::Low
        } else if bpm < self.stress_high {
            StressLevel::Medium
        } else {
            StressLevel::High
        }
    }

    pub fn sleep_quality(&self, duration: SleepDuration) -> SleepQuality {
        let hours = duration.hours();
        if hours > self.sleep_good {
            SleepQuality::Good
        } else if hours > self.sleep_average {
            SleepQuality::Average
        } else {
            SleepQuality::Poor
        }
    }
}

/// Classify a raw heart rate. Zero and negative rates are rejected.
pub fn classify_stress(bpm: i64, thresholds: &Thresholds) -> Result<StressLevel, MeasurementError> {
    Ok(thresholds.stress_level(HeartRate::new(bpm)?))
}

/// Classify a raw sleep duration in hours. Negative and non-finite
/// durations are rejected.
pub fn classify_sleep_quality(
    hours: f64,
    thresholds: &Thresholds,
) -> Result<SleepQuality, MeasurementError> {
    Ok(thresholds.sleep_quality(SleepDuration::from_hours(hours)?))
}
