pub mod mock;

use std::sync::Arc;

use async_trait::async_trait;
use vitals_core::DeviceKind;

/// A handshake that did not complete.
#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    #[error("device refused pairing: {0}")]
    Rejected(String),

    #[error("device unreachable: {0}")]
    Unreachable(String),
}

/// Trait for pairing with a wearable.
///
/// The aggregator bounds every handshake with its own timeout and drops the
/// future when that timeout fires, so implementations must not register
/// anything themselves and should be safe to cancel at any await point.
#[async_trait]
pub trait DeviceLink: Send + Sync + 'static {
    async fn handshake(&self, kind: DeviceKind) -> Result<(), LinkError>;
}

#[async_trait]
impl<T: DeviceLink + ?Sized> DeviceLink for Arc<T> {
    async fn handshake(&self, kind: DeviceKind) -> Result<(), LinkError> {
        (**self).handshake(kind).await
    }
}
