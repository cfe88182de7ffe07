pub mod aggregator;
pub mod clock;
pub mod config;
pub mod error;
pub mod link;
pub mod poller;
mod registry;
pub mod source;
pub mod storage;
pub mod summary;

pub use aggregator::{Aggregator, AggregatorSettings};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{AggregatorConfig, Config, LinkConfig, PollConfig, SourceConfig};
pub use error::{AggregatorError, ConnectFailure, SettingsError};
pub use link::mock::MockDeviceLink;
pub use link::{DeviceLink, LinkError};
pub use poller::{Metric, PollEvent, Poller};
pub use source::mock::MockDataSource;
pub use source::{DataSource, SourceUnavailable};
pub use storage::StoreStats;
pub use summary::HealthSummary;
