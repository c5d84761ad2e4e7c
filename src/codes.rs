//! Logical button/axis codes.
//!
//! Every driver translates its native codes (HID usages, kernel key/abs codes,
//! XInput bitmasks) into this closed set. The numeric values are part of the
//! wire contract with the managed side and must not change.

/// Platform-independent integer naming a button or axis kind.
pub type LogicalCode = u32;

pub const BTN_SOUTH: LogicalCode = 0;
pub const BTN_EAST: LogicalCode = 1;
pub const BTN_C: LogicalCode = 2;
pub const BTN_NORTH: LogicalCode = 3;
pub const BTN_WEST: LogicalCode = 4;
pub const BTN_Z: LogicalCode = 5;
pub const BTN_LT: LogicalCode = 6;
pub const BTN_RT: LogicalCode = 7;
pub const BTN_LT2: LogicalCode = 8;
pub const BTN_RT2: LogicalCode = 9;
pub const BTN_SELECT: LogicalCode = 10;
pub const BTN_START: LogicalCode = 11;
pub const BTN_MODE: LogicalCode = 12;
pub const BTN_LTHUMB: LogicalCode = 13;
pub const BTN_RTHUMB: LogicalCode = 14;
pub const BTN_DPAD_UP: LogicalCode = 15;
pub const BTN_DPAD_DOWN: LogicalCode = 16;
pub const BTN_DPAD_LEFT: LogicalCode = 17;
pub const BTN_DPAD_RIGHT: LogicalCode = 18;

pub const AXIS_LSTICKX: LogicalCode = 100;
pub const AXIS_LSTICKY: LogicalCode = 101;
pub const AXIS_LEFTZ: LogicalCode = 102;
pub const AXIS_RSTICKX: LogicalCode = 103;
pub const AXIS_RSTICKY: LogicalCode = 104;
pub const AXIS_RIGHTZ: LogicalCode = 105;
pub const AXIS_DPADX: LogicalCode = 106;
pub const AXIS_DPADY: LogicalCode = 107;

/// `true` for codes in the axis half of the table.
#[inline]
pub fn is_axis(code: LogicalCode) -> bool {
    (AXIS_LSTICKX..=AXIS_DPADY).contains(&code)
}

/// Stick Y axes are reported up-positive; drivers whose hardware reports
/// up-negative negate these after normalization.
#[inline]
pub fn is_stick_y(code: LogicalCode) -> bool {
    matches!(code, AXIS_LSTICKY | AXIS_RSTICKY)
}

/// Short human-readable label, used in logs and demos.
pub fn code_name(code: LogicalCode) -> &'static str {
    match code {
        BTN_SOUTH => "South",
        BTN_EAST => "East",
        BTN_C => "C",
        BTN_NORTH => "North",
        BTN_WEST => "West",
        BTN_Z => "Z",
        BTN_LT => "LeftTrigger",
        BTN_RT => "RightTrigger",
        BTN_LT2 => "LeftTrigger2",
        BTN_RT2 => "RightTrigger2",
        BTN_SELECT => "Select",
        BTN_START => "Start",
        BTN_MODE => "Mode",
        BTN_LTHUMB => "LeftThumb",
        BTN_RTHUMB => "RightThumb",
        BTN_DPAD_UP => "DPadUp",
        BTN_DPAD_DOWN => "DPadDown",
        BTN_DPAD_LEFT => "DPadLeft",
        BTN_DPAD_RIGHT => "DPadRight",
        AXIS_LSTICKX => "LeftStickX",
        AXIS_LSTICKY => "LeftStickY",
        AXIS_LEFTZ => "LeftZ",
        AXIS_RSTICKX => "RightStickX",
        AXIS_RSTICKY => "RightStickY",
        AXIS_RIGHTZ => "RightZ",
        AXIS_DPADX => "DPadX",
        AXIS_DPADY => "DPadY",
        _ => "Unknown",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn axis_and_button_halves_do_not_overlap() {
        for code in BTN_SOUTH..=BTN_DPAD_RIGHT {
            assert!(!is_axis(code), "{} classified as axis", code_name(code));
        }
        for code in AXIS_LSTICKX..=AXIS_DPADY {
            assert!(is_axis(code), "{} not classified as axis", code_name(code));
        }
    }

    #[test]
    fn only_stick_y_axes_are_inverted() {
        assert!(is_stick_y(AXIS_LSTICKY));
        assert!(is_stick_y(AXIS_RSTICKY));
        assert!(!is_stick_y(AXIS_DPADY));
        assert!(!is_stick_y(AXIS_LSTICKX));
    }
}
