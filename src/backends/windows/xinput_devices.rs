#![cfg(target_os = "windows")]

//! XInput slot state and decoding.
//!
//! XInput exposes four fixed slots queried with `XInputGetState`. There is no
//! enumeration: a slot is connected while the query succeeds. The slot index is
//! used directly as the [`DeviceId`].
//!
//! # Channel conventions
//! - Sticks: `-32768 → -1.0`, otherwise `raw / 32767`. XInput already reports
//!   up as positive, so Y is not inverted.
//! - Triggers: `ButtonChanged` on `LeftTrigger2`/`RightTrigger2` with
//!   `raw / 255`.
//! - Digital buttons, DPad included, emit `Pressed`/`Released` edges.
//!
//! A packet is only decoded when `dwPacketNumber` changes. The connect
//! transition records the state without emitting deltas.

use crate::capabilities::{CapabilityCollector, DeviceCapabilities};
use crate::codes::*;
use crate::device::DeviceRecord;
use crate::error::{BackendError, Result};
use crate::event::GamepadEvent;
use crate::metadata::{DeviceMeta, BUS_USB};
use crate::normalize::{normalize_thumb, normalize_trigger_u8};
use crate::registry::DeviceId;
use crate::rumble::{Motor, RumbleController};

use windows_sys::Win32::Foundation::ERROR_SUCCESS;
use windows_sys::Win32::UI::Input::XboxController::*;

/// Number of XInput slots.
pub const SLOT_COUNT: u32 = 4;

/// Conventional Xbox 360 controller identity.
pub const XINPUT_VENDOR_ID: u16 = 0x045e;
pub const XINPUT_PRODUCT_ID: u16 = 0x028e;

/// XInput has no effect length; rumble runs until stopped.
const MAX_RUMBLE_MS: u32 = i32::MAX as u32;

/// Button bits in emission order.
const BUTTON_MAP: [(u16, LogicalCode); 14] = [
    (XINPUT_GAMEPAD_A, BTN_SOUTH),
    (XINPUT_GAMEPAD_B, BTN_EAST),
    (XINPUT_GAMEPAD_X, BTN_WEST),
    (XINPUT_GAMEPAD_Y, BTN_NORTH),
    (XINPUT_GAMEPAD_BACK, BTN_SELECT),
    (XINPUT_GAMEPAD_START, BTN_START),
    (XINPUT_GAMEPAD_LEFT_SHOULDER, BTN_LT),
    (XINPUT_GAMEPAD_RIGHT_SHOULDER, BTN_RT),
    (XINPUT_GAMEPAD_LEFT_THUMB, BTN_LTHUMB),
    (XINPUT_GAMEPAD_RIGHT_THUMB, BTN_RTHUMB),
    (XINPUT_GAMEPAD_DPAD_UP, BTN_DPAD_UP),
    (XINPUT_GAMEPAD_DPAD_DOWN, BTN_DPAD_DOWN),
    (XINPUT_GAMEPAD_DPAD_LEFT, BTN_DPAD_LEFT),
    (XINPUT_GAMEPAD_DPAD_RIGHT, BTN_DPAD_RIGHT),
];

const STICK_RANGE: (i32, i32) = (-32768, 32767);

/// Copy of one `XINPUT_STATE`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PadState {
    pub packet: u32,
    pub buttons: u16,
    pub left_trigger: u8,
    pub right_trigger: u8,
    pub lx: i16,
    pub ly: i16,
    pub rx: i16,
    pub ry: i16,
}

impl PadState {
    fn from_raw(state: &XINPUT_STATE) -> Self {
        let gp = &state.Gamepad;
        Self {
            packet: state.dwPacketNumber,
            buttons: gp.wButtons,
            left_trigger: gp.bLeftTrigger,
            right_trigger: gp.bRightTrigger,
            lx: gp.sThumbLX,
            ly: gp.sThumbLY,
            rx: gp.sThumbRX,
            ry: gp.sThumbRY,
        }
    }
}

/// Emit the deltas from `old` to `new`: buttons, then triggers, then sticks.
pub fn decode_changes(id: DeviceId, old: &PadState, new: &PadState, t: i64, out: &mut Vec<GamepadEvent>) {
    let changed = old.buttons ^ new.buttons;
    for &(mask, code) in &BUTTON_MAP {
        if changed & mask != 0 {
            out.push(GamepadEvent::button(id, code, new.buttons & mask != 0, t));
        }
    }

    for (code, was, is) in [
        (BTN_LT2, old.left_trigger, new.left_trigger),
        (BTN_RT2, old.right_trigger, new.right_trigger),
    ] {
        if was != is {
            out.push(GamepadEvent::button_changed(id, code, normalize_trigger_u8(is), t));
        }
    }

    for (code, was, is) in [
        (AXIS_LSTICKX, old.lx, new.lx),
        (AXIS_LSTICKY, old.ly, new.ly),
        (AXIS_RSTICKX, old.rx, new.rx),
        (AXIS_RSTICKY, old.ry, new.ry),
    ] {
        if was != is {
            out.push(GamepadEvent::axis(id, code, normalize_thumb(is), t));
        }
    }
}

/// The static channel table shared by every XInput controller.
pub fn capabilities() -> DeviceCapabilities {
    let mut collector = CapabilityCollector::new();
    for (_, code) in BUTTON_MAP {
        collector.add_button(code, code, code);
    }
    collector.add_button(BTN_LT2, BTN_LT2, BTN_LT2);
    collector.add_button(BTN_RT2, BTN_RT2, BTN_RT2);
    for code in [AXIS_LSTICKX, AXIS_LSTICKY, AXIS_RSTICKX, AXIS_RSTICKY] {
        collector.add_axis(code, code, code, STICK_RANGE.0, STICK_RANGE.1);
    }
    collector.finish()
}

pub fn meta(slot: u32) -> DeviceMeta {
    DeviceMeta {
        name: format!("XInput Controller {slot}"),
        bus: BUS_USB,
        vendor_id: XINPUT_VENDOR_ID,
        product_id: XINPUT_PRODUCT_ID,
        version: 0,
        path: Some(format!("xinput:{slot}")),
    }
}

/// Query one slot. `None` when the slot is empty.
fn get_state(slot: u32) -> Option<PadState> {
    // SAFETY: XINPUT_STATE is plain data; the all-zero pattern is valid.
    let mut state: XINPUT_STATE = unsafe { std::mem::zeroed() };
    // SAFETY: `state` is a valid, writable XINPUT_STATE.
    let res = unsafe { XInputGetState(slot, &mut state) };
    (res == ERROR_SUCCESS).then(|| PadState::from_raw(&state))
}

/// Whether the controller in `slot` reports any vibration motor.
fn has_vibration(slot: u32) -> bool {
    // SAFETY: XINPUT_CAPABILITIES is plain data; the all-zero pattern is valid.
    let mut caps: XINPUT_CAPABILITIES = unsafe { std::mem::zeroed() };
    // SAFETY: `caps` is a valid, writable XINPUT_CAPABILITIES.
    let res = unsafe { XInputGetCapabilities(slot, XINPUT_FLAG_GAMEPAD, &mut caps) };
    res == ERROR_SUCCESS && (caps.Vibration.wLeftMotorSpeed != 0 || caps.Vibration.wRightMotorSpeed != 0)
}

struct XInputMotor {
    slot: u32,
}

impl XInputMotor {
    fn set(&self, left: u16, right: u16) -> Result<()> {
        let vibration = XINPUT_VIBRATION {
            wLeftMotorSpeed: left,
            wRightMotorSpeed: right,
        };
        // SAFETY: `vibration` outlives the call.
        let res = unsafe { XInputSetState(self.slot, &vibration) };
        if res == ERROR_SUCCESS {
            Ok(())
        } else {
            Err(BackendError::Platform(format!("XInputSetState({}) returned {res}", self.slot)))
        }
    }
}

impl Motor for XInputMotor {
    fn start(&mut self, strong: u16, weak: u16, _duration_ms: u32) -> Result<()> {
        self.set(strong, weak)
    }

    fn stop(&mut self) -> Result<()> {
        self.set(0, 0)
    }
}

/// What changed on a slot during one poll.
#[derive(Debug, PartialEq, Eq)]
pub enum SlotChange {
    None,
    Connected,
    Disconnected,
}

/// One XInput slot.
pub struct XInputSlot {
    index: u32,
    state: Option<PadState>,
    record: Option<DeviceRecord>,
    rumble: RumbleController,
}

impl XInputSlot {
    pub fn new(index: u32) -> Self {
        Self {
            index,
            state: None,
            record: None,
            rumble: RumbleController::new(MAX_RUMBLE_MS),
        }
    }

    pub fn id(&self) -> DeviceId {
        self.index
    }

    pub fn is_connected(&self) -> bool {
        self.state.is_some()
    }

    pub fn record(&self) -> Option<&DeviceRecord> {
        self.record.as_ref()
    }

    /// Query the slot and decode any new packet into `out`.
    pub fn poll(&mut self, t: i64, out: &mut Vec<GamepadEvent>) -> SlotChange {
        let id = self.id();
        match (self.state, get_state(self.index)) {
            (None, Some(new)) => {
                self.state = Some(new);
                self.record = Some(DeviceRecord::new(meta(self.index), capabilities(), has_vibration(self.index)));
                SlotChange::Connected
            }
            (Some(_), None) => {
                // the pad is gone; the stop command has nowhere to go
                self.rumble = RumbleController::new(MAX_RUMBLE_MS);
                self.state = None;
                self.record = None;
                SlotChange::Disconnected
            }
            (Some(old), Some(new)) => {
                if old.packet != new.packet {
                    log::trace!("xinput {id}: packet {}", new.packet);
                    decode_changes(id, &old, &new, t, out);
                    self.state = Some(new);
                }
                SlotChange::None
            }
            (None, None) => SlotChange::None,
        }
    }

    pub fn set_rumble(&mut self, strong: f64, weak: f64, duration_ms: i32, now_ms: i64) -> bool {
        if !self.record.as_ref().is_some_and(|r| r.ff_supported) {
            return false;
        }
        let mut motor = XInputMotor { slot: self.index };
        self.rumble.set(&mut motor, strong, weak, duration_ms, now_ms)
    }

    pub fn tick_rumble(&mut self, now_ms: i64) {
        if self.is_connected() {
            let mut motor = XInputMotor { slot: self.index };
            self.rumble.tick(&mut motor, now_ms);
        }
    }

    /// Stop rumble and forget the controller.
    pub fn close(&mut self) {
        if self.is_connected() && self.rumble.is_active() {
            let mut motor = XInputMotor { slot: self.index };
            self.rumble.stop(&mut motor);
        }
        self.state = None;
        self.record = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventKind;

    #[test]
    fn buttons_then_triggers_then_sticks() {
        let old = PadState::default();
        let new = PadState {
            packet: 1,
            buttons: XINPUT_GAMEPAD_A | XINPUT_GAMEPAD_DPAD_LEFT,
            left_trigger: 255,
            ly: i16::MIN,
            ..Default::default()
        };
        let mut out = Vec::new();
        decode_changes(3, &old, &new, 9, &mut out);

        let seq: Vec<_> = out.iter().map(|e| (e.kind, e.code, e.value)).collect();
        assert_eq!(
            seq,
            vec![
                (EventKind::ButtonPressed, BTN_SOUTH, 1.0),
                (EventKind::ButtonPressed, BTN_DPAD_LEFT, 1.0),
                (EventKind::ButtonChanged, BTN_LT2, 1.0),
                (EventKind::AxisChanged, AXIS_LSTICKY, -1.0),
            ]
        );
        assert!(out.iter().all(|e| e.device_id == 3 && e.timestamp_ms == 9));
    }

    #[test]
    fn releases_follow_cleared_bits() {
        let old = PadState {
            buttons: XINPUT_GAMEPAD_START,
            ..Default::default()
        };
        let mut out = Vec::new();
        decode_changes(0, &old, &PadState::default(), 0, &mut out);
        assert_eq!(out, vec![GamepadEvent::button(0, BTN_START, false, 0)]);
    }

    #[test]
    fn static_table_and_identity() {
        let caps = capabilities();
        assert_eq!(caps.axes, vec![AXIS_LSTICKX, AXIS_LSTICKY, AXIS_RSTICKX, AXIS_RSTICKY]);
        assert_eq!(caps.buttons.len(), 16);
        assert_eq!(caps.axis_range(AXIS_RSTICKY), Some(STICK_RANGE));

        let m = meta(2);
        assert_eq!(m.name, "XInput Controller 2");
        assert_eq!(m.uuid_simple(), "030000005e0400008e02000000000000");
    }
}
