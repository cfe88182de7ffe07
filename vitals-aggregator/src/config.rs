use std::path::Path;
use std::time::Duration;

use color_eyre::eyre::{bail, eyre};
use jiff::SignedDuration;
use serde::Deserialize;
use vitals_core::{DeviceKind, Thresholds};

use crate::aggregator::AggregatorSettings;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub aggregator: AggregatorConfig,
    pub thresholds: Thresholds,
    pub link: LinkConfig,
    pub source: SourceConfig,
    pub poll: PollConfig,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct AggregatorConfig {
    /// Upper bound on a device handshake, in milliseconds
    pub handshake_timeout_ms: u64,
    /// How many days of samples to keep
    pub retention_days: u32,
    /// Nightly sleep goal, in hours
    pub sleep_target_hours: f64,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum LinkConfig {
    Mock {
        /// Simulated pairing delay in milliseconds
        #[serde(default = "default_link_latency_ms")]
        latency_ms: u64,
        /// Percentage of handshakes that fail
        #[serde(default)]
        failure_percent: u32,
    },
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SourceConfig {
    Mock {
        /// Percentage of reads that fail
        #[serde(default)]
        failure_percent: u32,
    },
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct PollConfig {
    /// Interval in seconds between heart rate reads
    pub heart_rate_interval_secs: u64,
    /// Interval in seconds between sleep reads
    pub sleep_interval_secs: u64,
    /// Devices to connect at startup
    pub devices: Vec<DeviceKind>,
    /// Attempts per device before giving up
    pub connect_attempts: u32,
    /// Delay before the first retry, doubled after each failure
    pub retry_backoff_ms: u64,
}

fn default_link_latency_ms() -> u64 {
    2000
}

impl Config {
    pub fn load(path: &Path) -> color_eyre::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> color_eyre::Result<()> {
        self.aggregator_settings()
            .validate()
            .map_err(|e| eyre!("aggregator: {e}"))?;

        if self.poll.heart_rate_interval_secs == 0 || self.poll.sleep_interval_secs == 0 {
            bail!("poll intervals must be positive");
        }
        if self.poll.connect_attempts == 0 {
            bail!("poll.connect_attempts must be at least 1");
        }

        let LinkConfig::Mock {
            failure_percent: link_failures,
            ..
        } = self.link;
        let SourceConfig::Mock {
            failure_percent: source_failures,
        } = self.source;
        if link_failures > 100 || source_failures > 100 {
            bail!("failure_percent must be between 0 and 100");
        }

        Ok(())
    }

    pub fn aggregator_settings(&self) -> AggregatorSettings {
        AggregatorSettings {
            handshake_timeout: Duration::from_millis(self.aggregator.handshake_timeout_ms),
            retention: SignedDuration::from_hours(i64::from(self.aggregator.retention_days) * 24),
            thresholds: self.thresholds,
            sleep_target_hours: self.aggregator.sleep_target_hours,
        }
    }
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            handshake_timeout_ms: 5000,
            retention_days: 30,
            sleep_target_hours: 8.0,
        }
    }
}

impl Default for LinkConfig {
    fn default() -> Self {
        LinkConfig::Mock {
            latency_ms: default_link_latency_ms(),
            failure_percent: 0,
        }
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        SourceConfig::Mock { failure_percent: 0 }
    }
}

impl PollConfig {
    /// Delay before retry number `retry`, counting from 1. Saturates
    /// instead of overflowing for large attempt counts.
    pub fn retry_backoff(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry.saturating_sub(1));
        Duration::from_millis(self.retry_backoff_ms).saturating_mul(factor)
    }
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            heart_rate_interval_secs: 30,
            sleep_interval_secs: 300,
            devices: vec![DeviceKind::AppleWatch],
            connect_attempts: 3,
            retry_backoff_ms: 500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = Config::default();
        config.validate().unwrap();

        let settings = config.aggregator_settings();
        assert_eq!(settings.handshake_timeout, Duration::from_secs(5));
        assert_eq!(settings.retention, SignedDuration::from_hours(720));
        assert_eq!(settings.thresholds, Thresholds::default());
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let config: Config = toml::from_str(
            r#"
            [thresholds]
            stress_medium = 75

            [link]
            type = "mock"
            latency_ms = 10

            [poll]
            devices = ["fitbit", "galaxy-watch"]
            "#,
        )
        .unwrap();

        assert_eq!(config.thresholds.stress_medium, 75);
        assert_eq!(config.thresholds.stress_high, 100);
        assert!(matches!(
            config.link,
            LinkConfig::Mock {
                latency_ms: 10,
                failure_percent: 0
            }
        ));
        assert_eq!(
            config.poll.devices,
            vec![DeviceKind::Fitbit, DeviceKind::GalaxyWatch]
        );
        assert_eq!(config.poll.heart_rate_interval_secs, 30);
        assert_eq!(config.aggregator.retention_days, 30);
    }

    #[test]
    fn unknown_device_kind_fails_to_parse() {
        let result = toml::from_str::<Config>(
            r#"
            [poll]
            devices = ["pixel-watch"]
            "#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn retry_backoff_doubles_and_saturates() {
        let poll = PollConfig::default();
        assert_eq!(poll.retry_backoff(1), Duration::from_millis(500));
        assert_eq!(poll.retry_backoff(2), Duration::from_millis(1000));
        assert_eq!(poll.retry_backoff(4), Duration::from_millis(4000));

        let poll = PollConfig {
            retry_backoff_ms: u64::MAX,
            ..PollConfig::default()
        };
        assert_eq!(poll.retry_backoff(200), Duration::MAX);
        assert_eq!(poll.retry_backoff(u32::MAX), Duration::MAX);
    }

    #[test]
    fn invalid_values_fail_validation() {
        let mut config = Config::default();
        config.poll.sleep_interval_secs = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.thresholds.sleep_average = 9.0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.source = SourceConfig::Mock {
            failure_percent: 101,
        };
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.aggregator.retention_days = 0;
        assert!(config.validate().is_err());
    }
}
