use serde::Serialize;
use vitals_core::{HeartRate, Sample, SleepDuration, SleepQuality, StressLevel};

/// Snapshot of the retained history for display.
///
/// An empty history produces the default value, which consumers render as
/// a placeholder rather than an error.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HealthSummary {
    pub sample_count: usize,
    pub latest_heart_rate: Option<HeartRate>,
    pub latest_stress: Option<StressLevel>,
    pub latest_sleep: Option<SleepDuration>,
    pub latest_sleep_quality: Option<SleepQuality>,
    pub mean_heart_rate: Option<f64>,
    pub mean_sleep_hours: Option<f64>,
    /// Latest sleep as a fraction of the sleep target, clamped to `0.0..=1.0`.
    pub sleep_goal_progress: Option<f64>,
    /// The latest stress level calls for a breathing exercise.
    pub suggest_breathing: bool,
}

impl HealthSummary {
    /// `samples` must be ordered oldest first.
    pub fn from_samples(samples: &[Sample], sleep_target_hours: f64) -> Self {
        let latest_hr = samples.iter().rev().find(|s| s.heart_rate().is_some());
        let latest_sleep = samples.iter().rev().find(|s| s.sleep_duration().is_some());

        let latest_stress = latest_hr.and_then(Sample::stress_level);
        let latest_sleep_duration = latest_sleep.and_then(Sample::sleep_duration);

        let sleep_goal_progress = latest_sleep_duration
            .filter(|_| sleep_target_hours > 0.0)
            .map(|d| (d.hours() / sleep_target_hours).clamp(0.0, 1.0));

        Self {
            sample_count: samples.len(),
            latest_heart_rate: latest_hr.and_then(Sample::heart_rate),
            latest_stress,
            latest_sleep: latest_sleep_duration,
            latest_sleep_quality: latest_sleep.and_then(Sample::sleep_quality),
            mean_heart_rate: mean(
                samples
                    .iter()
                    .filter_map(|s| s.heart_rate().map(|hr| f64::from(hr.bpm()))),
            ),
            mean_sleep_hours: mean(
                samples
                    .iter()
                    .filter_map(|s| s.sleep_duration().map(SleepDuration::hours)),
            ),
            sleep_goal_progress,
            suggest_breathing: latest_stress.is_some_and(StressLevel::suggests_breathing),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.sample_count == 0
    }
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values.fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    (count > 0).then(|| sum / count as f64)
}
