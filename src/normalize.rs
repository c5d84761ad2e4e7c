//! Raw sample → normalized value decoding.
//!
//! These helpers are shared by every driver so numeric results are identical
//! across platforms.
//!
//! ## Axis scaling
//! A sample is rescaled from the device's logical `[min, max]`:
//!
//! ```text
//! t = clamp((sample - min) / (max - min), 0, 1)
//! axis    = t * 2 - 1      // [-1, 1]
//! trigger = t              // [0, 1]
//! ```
//!
//! When `max - min` is odd (the device reports an even number of positions,
//! e.g. `0..=255`), numerator and denominator are both bumped by one before
//! dividing. That places an integer sample exactly on the zero crossing
//! (`127` of `0..=255` decodes to `0.0`) at the cost of the lowest position
//! landing one step above `-1`. This matches the reference controller library
//! the managed side was calibrated against, so it must stay bit-exact.
//!
//! ## Hats
//! Hat samples become two discrete axes in `{-1, 0, 1}` (left/up negative).
//! [`DpadState`] diffs them against the previous pair and emits DPad button
//! edges, then the two axis events.

use crate::codes::{
    LogicalCode, AXIS_DPADX, AXIS_DPADY, BTN_DPAD_DOWN, BTN_DPAD_LEFT, BTN_DPAD_RIGHT, BTN_DPAD_UP,
};
use crate::event::GamepadEvent;
use crate::registry::DeviceId;

/// Position of `sample` inside `[min, max]` as a value in `[0, 1]`.
fn unit_interval(sample: i32, min: i32, max: i32) -> f64 {
    let mut range = max as i64 - min as i64;
    if range == 0 {
        return 0.5;
    }
    let mut offset = sample as i64 - min as i64;
    if range % 2 != 0 {
        range += 1;
        offset += 1;
    }
    (offset as f64 / range as f64).clamp(0.0, 1.0)
}

/// Rescale a sample into `[-1, 1]`. A degenerate range decodes to `0.0`.
pub fn normalize_axis(sample: i32, min: i32, max: i32) -> f64 {
    if min == max {
        return 0.0;
    }
    unit_interval(sample, min, max) * 2.0 - 1.0
}

/// Rescale an analog trigger sample into `[0, 1]`.
pub fn normalize_trigger(sample: i32, min: i32, max: i32) -> f64 {
    if min == max {
        return 0.0;
    }
    unit_interval(sample, min, max)
}

/// Negate a stick Y value so up is positive. Never yields `-0.0`.
#[inline]
pub fn flip_y(v: f64) -> f64 {
    if v == 0.0 {
        0.0
    } else {
        -v
    }
}

/// XInput thumbstick: `-32768 → -1`, otherwise `v / 32767`.
#[inline]
pub fn normalize_thumb(v: i16) -> f64 {
    if v == i16::MIN {
        -1.0
    } else {
        v as f64 / 32767.0
    }
}

/// XInput trigger byte into `[0, 1]`.
#[inline]
pub fn normalize_trigger_u8(v: u8) -> f64 {
    v as f64 / 255.0
}

/// Collapse a hat component sample to its sign.
#[inline]
pub fn hat_sign(v: i32) -> i8 {
    v.signum() as i8
}

/// Decode an 8-way HID hat switch into `(x, y)`.
///
/// `value - logical_min` in `0..=7` is a direction, clockwise from up; anything
/// else (commonly `8` or `15`) is neutral. Up yields `y = -1`: this is the HID
/// convention and it is *not* passed through stick-Y inversion.
pub fn hat_to_xy(value: i32, logical_min: i32) -> (i8, i8) {
    match value.wrapping_sub(logical_min) {
        0 => (0, -1),
        1 => (1, -1),
        2 => (1, 0),
        3 => (1, 1),
        4 => (0, 1),
        5 => (-1, 1),
        6 => (-1, 0),
        7 => (-1, -1),
        _ => (0, 0),
    }
}

/// Previous two-axis directional pad state for one device.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DpadState {
    pub x: i8,
    pub y: i8,
}

impl DpadState {
    /// Apply a new horizontal component, pushing release/press edges.
    pub fn set_x(&mut self, x: i8, id: DeviceId, t: i64, out: &mut Vec<GamepadEvent>) {
        let old = std::mem::replace(&mut self.x, x);
        push_edges(old, x, BTN_DPAD_LEFT, BTN_DPAD_RIGHT, id, t, out);
    }

    /// Apply a new vertical component, pushing release/press edges.
    pub fn set_y(&mut self, y: i8, id: DeviceId, t: i64, out: &mut Vec<GamepadEvent>) {
        let old = std::mem::replace(&mut self.y, y);
        push_edges(old, y, BTN_DPAD_UP, BTN_DPAD_DOWN, id, t, out);
    }

    /// Full hat decode step: DPad button edges for both components, then one
    /// `AxisChanged` each for DPadX and DPadY.
    pub fn apply_hat(&mut self, x: i8, y: i8, id: DeviceId, t: i64, out: &mut Vec<GamepadEvent>) {
        self.set_x(x, id, t, out);
        self.set_y(y, id, t, out);
        out.push(GamepadEvent::axis(id, AXIS_DPADX, x as f64, t));
        out.push(GamepadEvent::axis(id, AXIS_DPADY, y as f64, t));
    }
}

fn push_edges(
    old: i8,
    new: i8,
    negative: LogicalCode,
    positive: LogicalCode,
    id: DeviceId,
    t: i64,
    out: &mut Vec<GamepadEvent>,
) {
    if old == new {
        return;
    }
    if old < 0 {
        out.push(GamepadEvent::button(id, negative, false, t));
    } else if old > 0 {
        out.push(GamepadEvent::button(id, positive, false, t));
    }
    if new < 0 {
        out.push(GamepadEvent::button(id, negative, true, t));
    } else if new > 0 {
        out.push(GamepadEvent::button(id, positive, true, t));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventKind;

    #[test]
    fn endpoints_decode_exactly() {
        assert_eq!(normalize_axis(0, 0, 8), -1.0);
        assert_eq!(normalize_axis(8, 0, 8), 1.0);
        assert_eq!(normalize_axis(-32767, -32767, 32767), -1.0);
        assert_eq!(normalize_axis(32767, -32767, 32767), 1.0);
        assert_eq!(normalize_trigger(0, 0, 1022), 0.0);
        assert_eq!(normalize_trigger(1022, 0, 1022), 1.0);
    }

    #[test]
    fn nine_positions_center_without_adjustment() {
        assert_eq!(normalize_axis(4, 0, 8), 0.0);
    }

    #[test]
    fn even_position_count_is_adjusted() {
        // 0..=255: 256 positions, max - min odd
        assert_eq!(normalize_axis(127, 0, 255), 0.0);
        assert_eq!(normalize_axis(255, 0, 255), 1.0);
        assert_eq!(normalize_axis(0, 0, 255), 1.0 / 256.0 * 2.0 - 1.0);
        // 0..=9: (4 + 1) / (9 + 1)
        assert_eq!(normalize_axis(4, 0, 9), 0.0);
        assert_eq!(normalize_trigger(4, 0, 9), 0.5);
    }

    #[test]
    fn output_is_clamped_for_out_of_range_samples() {
        for sample in [-100_000, -129, -1, 0, 37, 255, 256, 100_000] {
            let a = normalize_axis(sample, -128, 127);
            assert!((-1.0..=1.0).contains(&a), "{sample} -> {a}");
            let t = normalize_trigger(sample, 0, 255);
            assert!((0.0..=1.0).contains(&t), "{sample} -> {t}");
        }
        assert_eq!(normalize_axis(i32::MIN, i32::MIN, i32::MAX), 1.0 / 4294967296.0 * 2.0 - 1.0);
    }

    #[test]
    fn degenerate_range_is_zero() {
        assert_eq!(normalize_axis(5, 5, 5), 0.0);
        assert_eq!(normalize_trigger(5, 5, 5), 0.0);
    }

    #[test]
    fn flip_y_keeps_positive_zero() {
        assert_eq!(flip_y(0.5), -0.5);
        assert!(flip_y(0.0).is_sign_positive());
    }

    #[test]
    fn xinput_thumb_and_trigger() {
        assert_eq!(normalize_thumb(i16::MIN), -1.0);
        assert_eq!(normalize_thumb(i16::MAX), 1.0);
        assert_eq!(normalize_thumb(0), 0.0);
        assert_eq!(normalize_trigger_u8(255), 1.0);
        assert_eq!(normalize_trigger_u8(0), 0.0);
    }

    #[test]
    fn hat_directions_are_clockwise_from_up() {
        assert_eq!(hat_to_xy(0, 0), (0, -1));
        assert_eq!(hat_to_xy(2, 0), (1, 0));
        assert_eq!(hat_to_xy(5, 0), (-1, 1));
        assert_eq!(hat_to_xy(8, 0), (0, 0));
        assert_eq!(hat_to_xy(15, 0), (0, 0));
        // 1-based hats
        assert_eq!(hat_to_xy(1, 1), (0, -1));
        assert_eq!(hat_to_xy(0, 1), (0, 0));
    }

    #[test]
    fn hat_right_from_neutral_presses_once() {
        let mut pad = DpadState::default();
        let mut out = Vec::new();
        let (x, y) = hat_to_xy(2, 0);
        pad.apply_hat(x, y, 3, 10, &mut out);

        let kinds: Vec<_> = out.iter().map(|e| (e.kind, e.code)).collect();
        assert_eq!(
            kinds,
            vec![
                (EventKind::ButtonPressed, BTN_DPAD_RIGHT),
                (EventKind::AxisChanged, AXIS_DPADX),
                (EventKind::AxisChanged, AXIS_DPADY),
            ]
        );
        assert_eq!(out[1].value, 1.0);
        assert_eq!(out[2].value, 0.0);
        assert_eq!(pad, DpadState { x: 1, y: 0 });
    }

    #[test]
    fn diagonal_flip_releases_and_presses_both_components() {
        let mut pad = DpadState { x: 1, y: -1 };
        let mut out = Vec::new();
        pad.apply_hat(-1, 1, 0, 0, &mut out);

        let buttons: Vec<_> = out
            .iter()
            .filter(|e| e.kind != EventKind::AxisChanged)
            .map(|e| (e.kind, e.code))
            .collect();
        assert_eq!(
            buttons,
            vec![
                (EventKind::ButtonReleased, BTN_DPAD_RIGHT),
                (EventKind::ButtonPressed, BTN_DPAD_LEFT),
                (EventKind::ButtonReleased, BTN_DPAD_UP),
                (EventKind::ButtonPressed, BTN_DPAD_DOWN),
            ]
        );
        assert_eq!(out.len(), 6);
    }

    #[test]
    fn unchanged_component_emits_no_edges() {
        let mut pad = DpadState { x: 0, y: 1 };
        let mut out = Vec::new();
        pad.set_y(1, 0, 0, &mut out);
        assert!(out.is_empty());
        pad.set_y(0, 0, 0, &mut out);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].code, BTN_DPAD_DOWN);
        assert_eq!(out[0].kind, EventKind::ButtonReleased);
    }
}
