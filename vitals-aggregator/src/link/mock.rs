use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use tracing::{debug, info};
use vitals_core::DeviceKind;

use super::{DeviceLink, LinkError};

/// Simulated pairing: waits `latency`, then succeeds unless the configured
/// failure roll says otherwise.
#[derive(Debug, Clone)]
pub struct MockDeviceLink {
    latency: Duration,
    failure_percent: u32,
}

impl MockDeviceLink {
    pub fn new(latency: Duration, failure_percent: u32) -> Self {
        Self {
            latency,
            failure_percent: failure_percent.min(100),
        }
    }

    /// A link that pairs immediately and never fails.
    pub fn instant() -> Self {
        Self::new(Duration::ZERO, 0)
    }
}

impl Default for MockDeviceLink {
    fn default() -> Self {
        Self::new(Duration::from_secs(2), 0)
    }
}

#[async_trait]
impl DeviceLink for MockDeviceLink {
    async fn handshake(&self, kind: DeviceKind) -> Result<(), LinkError> {
        debug!(%kind, latency = ?self.latency, "Mock handshake started");

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let failed = self.failure_percent > 0
            && rand::rng().random_ratio(self.failure_percent, 100);
        if failed {
            return Err(LinkError::Rejected(format!(
                "simulated {} pairing failure",
                kind.display_name()
            )));
        }

        info!(%kind, "Mock handshake completed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn instant_link_always_pairs() {
        let link = MockDeviceLink::instant();
        for kind in DeviceKind::ALL {
            assert!(link.handshake(kind).await.is_ok());
        }
    }

    #[tokio::test]
    async fn full_failure_rate_always_rejects() {
        let link = MockDeviceLink::new(Duration::ZERO, 100);
        let err = link.handshake(DeviceKind::Fitbit).await.unwrap_err();
        assert!(matches!(err, LinkError::Rejected(msg) if msg.contains("Fitbit")));
    }

    #[tokio::test(start_paused = true)]
    async fn very_long_latency_is_cut_short_by_a_timeout() {
        let link = MockDeviceLink::new(Duration::from_secs(u64::MAX), 0);
        let result =
            tokio::time::timeout(Duration::from_secs(5), link.handshake(DeviceKind::Fitbit)).await;
        assert!(result.is_err());
    }

    #[test]
    fn failure_percent_is_capped() {
        let link = MockDeviceLink::new(Duration::ZERO, 250);
        assert_eq!(link.failure_percent, 100);
    }
}
