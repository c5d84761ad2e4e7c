//! HID usage tables, element trees and value decoding.
//!
//! Shared by the IOKit driver and the software driver so both classify and
//! decode HID elements identically.
//!
//! Classification is by `(element kind, usage page, usage)`:
//! - Button page (`0x09`), usages `1..=13` → face, shoulder, trigger,
//!   menu and thumb buttons.
//! - Generic Desktop (`0x01`) `X..Rz` (`0x30..=0x35`) → stick and Z axes.
//! - Generic Desktop hat switch (`0x39`) → hat, decoded into DPad axes plus
//!   DPad button edges.
//! - Generic Desktop D-pad usages (`0x90..=0x93`) → DPad buttons.
//!
//! Everything else is ignored.

use crate::capabilities::{CapabilityCollector, DeviceCapabilities};
use crate::codes::*;
use crate::event::GamepadEvent;
use crate::normalize::{flip_y, hat_to_xy, normalize_axis, DpadState};
use crate::registry::DeviceId;
use serde::{Deserialize, Serialize};

pub const PAGE_GENERIC_DESKTOP: u32 = 0x01;
pub const PAGE_BUTTON: u32 = 0x09;

pub const USAGE_JOYSTICK: u32 = 0x04;
pub const USAGE_GAMEPAD: u32 = 0x05;
pub const USAGE_MULTI_AXIS: u32 = 0x08;
pub const USAGE_HAT_SWITCH: u32 = 0x39;

/// Top-level `(page, usage)` pairs a device must carry to be treated as a gamepad.
pub const MATCHED_USAGES: [(u32, u32); 3] = [
    (PAGE_GENERIC_DESKTOP, USAGE_GAMEPAD),
    (PAGE_GENERIC_DESKTOP, USAGE_JOYSTICK),
    (PAGE_GENERIC_DESKTOP, USAGE_MULTI_AXIS),
];

/// Element class, mirroring the IOKit element type values.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ElementKind {
    Misc,
    Button,
    Axis,
    ScanCodes,
    Collection,
    Other,
}

impl ElementKind {
    /// Map a raw `IOHIDElementType`.
    pub fn from_raw(raw: u32) -> Self {
        match raw {
            1 => Self::Misc,
            2 => Self::Button,
            3 => Self::Axis,
            4 => Self::ScanCodes,
            513 => Self::Collection,
            _ => Self::Other,
        }
    }

    fn is_input_value(self) -> bool {
        matches!(self, Self::Misc | Self::Button | Self::Axis)
    }
}

/// What a recognised element contributes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ElementRole {
    Button(LogicalCode),
    Axis(LogicalCode),
    Hat,
}

pub fn button_code(usage: u32) -> Option<LogicalCode> {
    Some(match usage {
        1 => BTN_SOUTH,
        2 => BTN_EAST,
        3 => BTN_WEST,
        4 => BTN_NORTH,
        5 => BTN_LT,
        6 => BTN_RT,
        7 => BTN_LT2,
        8 => BTN_RT2,
        9 => BTN_SELECT,
        10 => BTN_START,
        11 => BTN_MODE,
        12 => BTN_LTHUMB,
        13 => BTN_RTHUMB,
        _ => return None,
    })
}

pub fn axis_code(usage: u32) -> Option<LogicalCode> {
    Some(match usage {
        0x30 => AXIS_LSTICKX,
        0x31 => AXIS_LSTICKY,
        0x32 => AXIS_LEFTZ,
        0x33 => AXIS_RSTICKX,
        0x34 => AXIS_RSTICKY,
        0x35 => AXIS_RIGHTZ,
        _ => return None,
    })
}

fn dpad_button_code(usage: u32) -> Option<LogicalCode> {
    Some(match usage {
        0x90 => BTN_DPAD_UP,
        0x91 => BTN_DPAD_DOWN,
        0x92 => BTN_DPAD_RIGHT,
        0x93 => BTN_DPAD_LEFT,
        _ => return None,
    })
}

/// Classify a value by usage alone.
pub fn classify_usage(usage_page: u32, usage: u32) -> Option<ElementRole> {
    match usage_page {
        PAGE_BUTTON => button_code(usage).map(ElementRole::Button),
        PAGE_GENERIC_DESKTOP if usage == USAGE_HAT_SWITCH => Some(ElementRole::Hat),
        PAGE_GENERIC_DESKTOP => axis_code(usage)
            .map(ElementRole::Axis)
            .or_else(|| dpad_button_code(usage).map(ElementRole::Button)),
        _ => None,
    }
}

/// Classify an element; only input value elements qualify.
pub fn classify(kind: ElementKind, usage_page: u32, usage: u32) -> Option<ElementRole> {
    if !kind.is_input_value() {
        return None;
    }
    classify_usage(usage_page, usage)
}

/// One node of a device's element tree.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HidElement {
    pub cookie: u32,
    pub kind: ElementKind,
    pub usage_page: u32,
    pub usage: u32,
    pub logical_min: i32,
    pub logical_max: i32,
    #[serde(default)]
    pub children: Vec<HidElement>,
}

impl HidElement {
    pub fn button(cookie: u32, usage: u32) -> Self {
        Self {
            cookie,
            kind: ElementKind::Button,
            usage_page: PAGE_BUTTON,
            usage,
            logical_min: 0,
            logical_max: 1,
            children: Vec::new(),
        }
    }

    pub fn axis(cookie: u32, usage: u32, logical_min: i32, logical_max: i32) -> Self {
        Self {
            cookie,
            kind: ElementKind::Misc,
            usage_page: PAGE_GENERIC_DESKTOP,
            usage,
            logical_min,
            logical_max,
            children: Vec::new(),
        }
    }

    pub fn hat(cookie: u32, logical_min: i32, logical_max: i32) -> Self {
        Self::axis(cookie, USAGE_HAT_SWITCH, logical_min, logical_max)
    }

    pub fn collection(cookie: u32, usage: u32, children: Vec<HidElement>) -> Self {
        Self {
            cookie,
            kind: ElementKind::Collection,
            usage_page: PAGE_GENERIC_DESKTOP,
            usage,
            logical_min: 0,
            logical_max: 0,
            children,
        }
    }

    /// Depth-first search by cookie.
    pub fn find(&self, cookie: u32) -> Option<&HidElement> {
        if self.cookie == cookie && self.kind != ElementKind::Collection {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find(cookie))
    }
}

/// Walk an element tree (collections unwrapped) into capability lists.
pub fn collect_capabilities(roots: &[HidElement]) -> DeviceCapabilities {
    let mut collector = CapabilityCollector::new();
    for el in roots {
        visit(el, &mut collector);
    }
    collector.finish()
}

fn visit(el: &HidElement, collector: &mut CapabilityCollector) {
    if el.kind == ElementKind::Collection {
        for child in &el.children {
            visit(child, collector);
        }
        return;
    }
    match classify(el.kind, el.usage_page, el.usage) {
        Some(ElementRole::Axis(code)) => {
            collector.add_axis(el.cookie, el.usage, code, el.logical_min, el.logical_max)
        }
        Some(ElementRole::Button(code)) => collector.add_button(el.cookie, el.usage, code),
        Some(ElementRole::Hat) => collector.add_hat(el.cookie),
        None => {}
    }
}

/// A single reported element value with its descriptor range.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HidValue {
    pub usage_page: u32,
    pub usage: u32,
    pub value: i32,
    pub logical_min: i32,
    pub logical_max: i32,
}

/// Per-device decode state.
#[derive(Debug, Default)]
pub struct HidDecoder {
    dpad: DpadState,
}

impl HidDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode one value into zero or more events. Unrecognised usages are dropped.
    pub fn decode(&mut self, id: DeviceId, v: &HidValue, t: i64, out: &mut Vec<GamepadEvent>) {
        match classify_usage(v.usage_page, v.usage) {
            Some(ElementRole::Button(code)) => {
                out.push(GamepadEvent::button(id, code, v.value != 0, t));
            }
            Some(ElementRole::Hat) => {
                let (x, y) = hat_to_xy(v.value, v.logical_min);
                self.dpad.apply_hat(x, y, id, t, out);
            }
            Some(ElementRole::Axis(code)) => {
                let mut value = normalize_axis(v.value, v.logical_min, v.logical_max);
                if is_stick_y(code) {
                    value = flip_y(value);
                }
                out.push(GamepadEvent::axis(id, code, value, t));
            }
            None => log::trace!(
                "dropping unmapped usage {:#04x}:{:#04x}",
                v.usage_page,
                v.usage
            ),
        }
    }

    pub fn dpad(&self) -> DpadState {
        self.dpad
    }
}
