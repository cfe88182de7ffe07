use async_trait::async_trait;
use rand::Rng;

use super::{DataSource, SourceUnavailable};

/// Synthetic telemetry.
///
/// Heart rate is uniform in `70..100` bpm. Sleep is uniform in `6.0..9.0`
/// hours, truncated to one decimal so the result stays below 9.0.
#[derive(Debug, Clone, Default)]
pub struct MockDataSource {
    failure_percent: u32,
}

impl MockDataSource {
    pub fn new(failure_percent: u32) -> Self {
        Self {
            failure_percent: failure_percent.min(100),
        }
    }

    fn roll_failure(&self, what: &str) -> Result<(), SourceUnavailable> {
        if self.failure_percent > 0 && rand::rng().random_ratio(self.failure_percent, 100) {
            return Err(SourceUnavailable(format!("simulated {what} read failure")));
        }
        Ok(())
    }
}

#[async_trait]
impl DataSource for MockDataSource {
    async fn read_heart_rate(&self) -> Result<i64, SourceUnavailable> {
        self.roll_failure("heart rate")?;
        Ok(rand::rng().random_range(70..100))
    }

    async fn read_sleep_duration(&self) -> Result<f64, SourceUnavailable> {
        self.roll_failure("sleep")?;
        let hours: f64 = rand::rng().random_range(6.0..9.0);
        Ok((hours * 10.0).floor() / 10.0)
    }
}
