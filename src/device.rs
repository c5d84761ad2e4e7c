//! Public per-device snapshot.

use crate::capabilities::DeviceCapabilities;
use crate::metadata::DeviceMeta;
use serde::{Deserialize, Serialize};

/// What a driver reports about one connected device.
///
/// Drivers hand out owned clones, so a record stays valid after the device
/// disconnects.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviceRecord {
    pub meta: DeviceMeta,
    pub capabilities: DeviceCapabilities,
    /// The device accepts rumble commands.
    pub ff_supported: bool,
}

impl DeviceRecord {
    pub fn new(meta: DeviceMeta, capabilities: DeviceCapabilities, ff_supported: bool) -> Self {
        Self {
            meta,
            capabilities,
            ff_supported,
        }
    }
}

impl std::fmt::Display for DeviceRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} [{:04x}:{:04x}] {} axes, {} buttons{}",
            self.meta.name,
            self.meta.vendor_id,
            self.meta.product_id,
            self.capabilities.axes.len(),
            self.capabilities.buttons.len(),
            if self.ff_supported { ", rumble" } else { "" }
        )
    }
}
