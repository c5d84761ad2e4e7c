//! Events and their wire encoding.
//!
//! Drivers express every input change as a small, fixed-size [`GamepadEvent`]
//! record. Records carry no references into driver state, so they can sit in
//! the [`EventQueue`](crate::queue::EventQueue) indefinitely.
//!
//! ## Value conventions
//! - **Axes:** normalized to `[-1.0, 1.0]`; analog trigger axes use `[0.0, 1.0]`.
//! - **Buttons:** `ButtonPressed` carries `1.0`, `ButtonReleased` carries `0.0`.
//! - **Analog buttons:** `ButtonChanged` carries the pressure in `[0.0, 1.0]`.
//! - **DPad axes:** discrete `-1.0 | 0.0 | 1.0`, up and left negative.
//!
//! ## Wire layout
//! The managed side receives events as a 32-byte little-endian record:
//!
//! | offset | size | field          |
//! |--------|------|----------------|
//! | 0      | 4    | kind tag (u32) |
//! | 4      | 4    | device id      |
//! | 8      | 4    | logical code   |
//! | 12     | 4    | padding (0)    |
//! | 16     | 8    | value (f64)    |
//! | 24     | 8    | time ms (i64)  |
//!
//! An empty buffer means "no event".

use crate::codes::LogicalCode;
use crate::registry::DeviceId;
use serde::{Deserialize, Serialize};

/// Size of one encoded event record.
pub const WIRE_EVENT_LEN: usize = 32;

/// Kind of a [`GamepadEvent`]. Discriminants are the wire tags.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u32)]
pub enum EventKind {
    Connected = 0,
    Disconnected = 1,
    ButtonPressed = 2,
    ButtonReleased = 3,
    AxisChanged = 4,
    ButtonChanged = 5,
}

impl EventKind {
    /// Decode a wire tag.
    pub fn from_tag(tag: u32) -> Option<Self> {
        Some(match tag {
            0 => Self::Connected,
            1 => Self::Disconnected,
            2 => Self::ButtonPressed,
            3 => Self::ButtonReleased,
            4 => Self::AxisChanged,
            5 => Self::ButtonChanged,
            _ => return None,
        })
    }

    #[inline]
    pub fn tag(self) -> u32 {
        self as u32
    }
}

/// One normalized input change.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GamepadEvent {
    pub kind: EventKind,
    pub device_id: DeviceId,
    /// Logical button/axis code; `0` for connection events.
    pub code: LogicalCode,
    pub value: f64,
    /// Capture time in Unix milliseconds.
    pub timestamp_ms: i64,
}

impl GamepadEvent {
    pub fn connected(device_id: DeviceId, timestamp_ms: i64) -> Self {
        Self {
            kind: EventKind::Connected,
            device_id,
            code: 0,
            value: 0.0,
            timestamp_ms,
        }
    }

    pub fn disconnected(device_id: DeviceId, timestamp_ms: i64) -> Self {
        Self {
            kind: EventKind::Disconnected,
            device_id,
            code: 0,
            value: 0.0,
            timestamp_ms,
        }
    }

    /// Press/release edge for a digital button.
    pub fn button(device_id: DeviceId, code: LogicalCode, pressed: bool, timestamp_ms: i64) -> Self {
        Self {
            kind: if pressed {
                EventKind::ButtonPressed
            } else {
                EventKind::ButtonReleased
            },
            device_id,
            code,
            value: if pressed { 1.0 } else { 0.0 },
            timestamp_ms,
        }
    }

    /// Analog button value in `[0, 1]`.
    pub fn button_changed(device_id: DeviceId, code: LogicalCode, value: f64, timestamp_ms: i64) -> Self {
        Self {
            kind: EventKind::ButtonChanged,
            device_id,
            code,
            value,
            timestamp_ms,
        }
    }

    pub fn axis(device_id: DeviceId, code: LogicalCode, value: f64, timestamp_ms: i64) -> Self {
        Self {
            kind: EventKind::AxisChanged,
            device_id,
            code,
            value,
            timestamp_ms,
        }
    }

    /// Encode into the 32-byte wire record.
    pub fn to_bytes(&self) -> [u8; WIRE_EVENT_LEN] {
        let mut out = [0u8; WIRE_EVENT_LEN];
        out[0..4].copy_from_slice(&self.kind.tag().to_le_bytes());
        out[4..8].copy_from_slice(&self.device_id.to_le_bytes());
        out[8..12].copy_from_slice(&self.code.to_le_bytes());
        // 12..16 stays zero (padding)
        out[16..24].copy_from_slice(&self.value.to_le_bytes());
        out[24..32].copy_from_slice(&self.timestamp_ms.to_le_bytes());
        out
    }

    /// Decode a wire record. Returns `None` for short buffers or unknown tags.
    pub fn from_bytes(buf: &[u8]) -> Option<Self> {
        if buf.len() < WIRE_EVENT_LEN {
            return None;
        }
        let u32_at = |at: usize| u32::from_le_bytes([buf[at], buf[at + 1], buf[at + 2], buf[at + 3]]);
        let mut eight = [0u8; 8];

        let kind = EventKind::from_tag(u32_at(0))?;
        eight.copy_from_slice(&buf[16..24]);
        let value = f64::from_le_bytes(eight);
        eight.copy_from_slice(&buf[24..32]);
        let timestamp_ms = i64::from_le_bytes(eight);

        Some(Self {
            kind,
            device_id: u32_at(4),
            code: u32_at(8),
            value,
            timestamp_ms,
        })
    }
}

/// Encode an optional event; `None` becomes the empty buffer.
pub fn encode_event(event: Option<GamepadEvent>) -> Vec<u8> {
    match event {
        Some(ev) => ev.to_bytes().to_vec(),
        None => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codes::{AXIS_LSTICKX, BTN_SOUTH};

    #[test]
    fn layout_matches_wire_contract() {
        let ev = GamepadEvent::axis(7, AXIS_LSTICKX, -0.5, 1_700_000_000_123);
        let b = ev.to_bytes();

        assert_eq!(&b[0..4], &4u32.to_le_bytes());
        assert_eq!(&b[4..8], &7u32.to_le_bytes());
        assert_eq!(&b[8..12], &100u32.to_le_bytes());
        assert_eq!(&b[12..16], &[0, 0, 0, 0]);
        assert_eq!(&b[16..24], &(-0.5f64).to_le_bytes());
        assert_eq!(&b[24..32], &1_700_000_000_123i64.to_le_bytes());
    }

    #[test]
    fn decode_recovers_record() {
        let ev = GamepadEvent::button(3, BTN_SOUTH, true, 42);
        assert_eq!(GamepadEvent::from_bytes(&ev.to_bytes()), Some(ev));
    }

    #[test]
    fn decode_rejects_short_buffer_and_bad_tag() {
        assert_eq!(GamepadEvent::from_bytes(&[]), None);
        let mut b = GamepadEvent::connected(0, 0).to_bytes();
        b[0] = 99;
        assert_eq!(GamepadEvent::from_bytes(&b), None);
    }

    #[test]
    fn none_encodes_as_empty_buffer() {
        assert!(encode_event(None).is_empty());
        assert_eq!(encode_event(Some(GamepadEvent::disconnected(1, 5))).len(), WIRE_EVENT_LEN);
    }

    #[test]
    fn button_edges_carry_unit_values() {
        assert_eq!(GamepadEvent::button(0, BTN_SOUTH, true, 0).value, 1.0);
        let released = GamepadEvent::button(0, BTN_SOUTH, false, 0);
        assert_eq!(released.kind, EventKind::ButtonReleased);
        assert_eq!(released.value, 0.0);
    }
}
