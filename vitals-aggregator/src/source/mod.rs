pub mod mock;

use std::sync::Arc;

use async_trait::async_trait;

/// The data source could not produce a reading.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("data source unavailable: {0}")]
pub struct SourceUnavailable(pub String);

/// Trait for reading raw telemetry from a wearable.
///
/// Values are returned as the device reported them. Validation happens in
/// the aggregator, which rejects zero or negative heart rates and negative
/// or non-finite sleep durations.
#[async_trait]
pub trait DataSource: Send + Sync + 'static {
    /// Latest heart rate in beats per minute.
    async fn read_heart_rate(&self) -> Result<i64, SourceUnavailable>;

    /// Duration of the last sleep session in hours.
    async fn read_sleep_duration(&self) -> Result<f64, SourceUnavailable>;
}

#[async_trait]
impl<T: DataSource + ?Sized> DataSource for Arc<T> {
    async fn read_heart_rate(&self) -> Result<i64, SourceUnavailable> {
        (**self).read_heart_rate().await
    }

    async fn read_sleep_duration(&self) -> Result<f64, SourceUnavailable> {
        (**self).read_sleep_duration().await
    }
}
