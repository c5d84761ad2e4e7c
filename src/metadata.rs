//! Device metadata snapshot.
//!
//! [`DeviceMeta`] is a lightweight, cloneable description of a connected device
//! suitable for display, logging and per-model lookups. Drivers fill what the
//! platform reports; unknown numeric fields stay `0`.
//!
//! # Identity string
//! [`DeviceMeta::uuid_simple`] renders 16 bytes as 32 lowercase hex characters:
//!
//! ```text
//! bus(u16 LE) 00 00 | vendor(u16 LE) 00 00 | product(u16 LE) 00 00 | version(u16 LE) 00 00
//! ```
//!
//! This is the layout widely used by SDL-style controller mapping databases,
//! so strings produced here can key existing per-model tables.
//!
//! # Example
//! ```
//! use padbridge::metadata::{DeviceMeta, BUS_USB};
//!
//! let meta = DeviceMeta {
//!     name: "Xbox 360 Controller".into(),
//!     bus: BUS_USB,
//!     vendor_id: 0x045e,
//!     product_id: 0x028e,
//!     ..Default::default()
//! };
//! assert_eq!(meta.uuid_simple(), "030000005e0400008e02000000000000");
//! ```

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Linux `BUS_USB`; also used for USB devices on the other platforms.
pub const BUS_USB: u16 = 0x03;
/// Linux `BUS_BLUETOOTH`.
pub const BUS_BLUETOOTH: u16 = 0x05;
/// Linux `BUS_VIRTUAL`.
pub const BUS_VIRTUAL: u16 = 0x06;

/// Name reported when the platform has none.
pub const UNKNOWN_NAME: &str = "Unknown";

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceMeta {
    /// Human-readable product name.
    pub name: String,

    /// Bus type, Linux `BUS_*` numbering.
    pub bus: u16,

    pub vendor_id: u16,
    pub product_id: u16,

    /// Firmware/product version, if the platform reports one.
    pub version: u16,

    /// OS path or location of the device.
    ///
    /// Diagnostic only; format is platform-specific and not stable across reconnects.
    pub path: Option<String>,
}

impl DeviceMeta {
    /// The 16 identity bytes.
    pub fn identity_bytes(&self) -> [u8; 16] {
        let mut out = [0u8; 16];
        for (i, field) in [self.bus, self.vendor_id, self.product_id, self.version]
            .into_iter()
            .enumerate()
        {
            out[i * 4..i * 4 + 2].copy_from_slice(&field.to_le_bytes());
        }
        out
    }

    pub fn uuid(&self) -> Uuid {
        Uuid::from_bytes(self.identity_bytes())
    }

    /// Identity as 32 lowercase hex characters.
    pub fn uuid_simple(&self) -> String {
        self.uuid().simple().to_string()
    }
}

/// Platform name, or [`UNKNOWN_NAME`] when absent or blank.
pub fn name_or_unknown(name: Option<&str>) -> String {
    match name.map(str::trim) {
        Some(n) if !n.is_empty() => n.to_string(),
        _ => UNKNOWN_NAME.to_string(),
    }
}

/// Map an IOKit transport string to a bus type.
pub fn bus_from_transport(transport: Option<&str>) -> u16 {
    match transport {
        Some(t) if t.eq_ignore_ascii_case("bluetooth") || t.eq_ignore_ascii_case("bluetooth low energy") => {
            BUS_BLUETOOTH
        }
        Some(t) if t.eq_ignore_ascii_case("usb") => BUS_USB,
        _ => 0,
    }
}
