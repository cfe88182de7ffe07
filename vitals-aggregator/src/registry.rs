use ulid::Generator;
use vitals_core::{Device, DeviceId, DeviceKind};

use crate::error::ConnectFailure;

/// Connected devices in connection order.
///
/// Not synchronized on its own; the aggregator holds it behind its lock.
pub(crate) struct DeviceRegistry {
    devices: Vec<Device>,
    ids: Generator,
}

impl Default for DeviceRegistry {
    fn default() -> Self {
        Self {
            devices: Vec::new(),
            ids: Generator::new(),
        }
    }
}

impl DeviceRegistry {
    /// Allocate an id and register a device whose handshake already succeeded.
    ///
    /// Ids come from a monotonic generator, so no id is ever handed out twice
    /// by the same registry.
    pub(crate) fn register(
        &mut self,
        kind: DeviceKind,
        now: jiff::Timestamp,
    ) -> Result<Device, ConnectFailure> {
        let id = self
            .ids
            .generate()
            .map_err(|_| ConnectFailure::IdsExhausted)?;

        let device = Device::connected(DeviceId(id), kind, now);
        self.devices.push(device.clone());
        Ok(device)
    }

    /// Remove a device. Returns the removed entry, if any.
    pub(crate) fn remove(&mut self, id: DeviceId) -> Option<Device> {
        let index = self.devices.iter().position(|d| d.id == id)?;
        Some(self.devices.remove(index))
    }

    pub(crate) fn list(&self) -> Vec<Device> {
        self.devices.clone()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    pub(crate) fn len(&self) -> usize {
        self.devices.len()
    }

    /// The device new samples are attributed to: the most recently connected one.
    pub(crate) fn primary(&self) -> Option<DeviceId> {
        self.devices.last().map(|d| d.id)
    }

    /// Record a successful data pull.
    pub(crate) fn touch(&mut self, id: DeviceId, at: jiff::Timestamp) -> bool {
        match self.devices.iter_mut().find(|d| d.id == id) {
            Some(device) => {
                device.last_sync = Some(at);
                true
            }
            None => false,
        }
    }
}
