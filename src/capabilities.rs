//! Per-device capability lists.
//!
//! A [`CapabilityCollector`] is fed elements in discovery order and produces a
//! [`DeviceCapabilities`] snapshot:
//! - axis and button codes are deduplicated, first by element cookie and then
//!   by logical code;
//! - each list is ordered by native usage, ties keeping discovery order;
//! - hat-derived axes (`DPadX`, `DPadY`) come after every directly reported axis;
//! - an axis range is recorded the first time the axis is seen.

use crate::codes::{LogicalCode, AXIS_DPADX, AXIS_DPADY};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// Range reported for hat-derived axes.
pub const HAT_RANGE: (i32, i32) = (-1, 1);

/// Axes, buttons and axis ranges of one device.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviceCapabilities {
    pub axes: Vec<LogicalCode>,
    pub buttons: Vec<LogicalCode>,
    pub ranges: BTreeMap<LogicalCode, (i32, i32)>,
}

impl DeviceCapabilities {
    /// Logical `(min, max)` of an axis, if the device has it.
    pub fn axis_range(&self, code: LogicalCode) -> Option<(i32, i32)> {
        self.ranges.get(&code).copied()
    }

    pub fn has_axis(&self, code: LogicalCode) -> bool {
        self.axes.contains(&code)
    }

    pub fn has_button(&self, code: LogicalCode) -> bool {
        self.buttons.contains(&code)
    }

    pub fn is_empty(&self) -> bool {
        self.axes.is_empty() && self.buttons.is_empty()
    }
}

#[derive(Debug, Default)]
pub struct CapabilityCollector {
    cookies: HashSet<u32>,
    axes: Vec<(u32, LogicalCode)>,
    buttons: Vec<(u32, LogicalCode)>,
    has_hat: bool,
    ranges: BTreeMap<LogicalCode, (i32, i32)>,
}

impl CapabilityCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a directly reported axis.
    pub fn add_axis(&mut self, cookie: u32, usage: u32, code: LogicalCode, min: i32, max: i32) {
        if !self.cookies.insert(cookie) {
            return;
        }
        insert_by_usage(&mut self.axes, usage, code);
        self.ranges.entry(code).or_insert((min, max));
    }

    pub fn add_button(&mut self, cookie: u32, usage: u32, code: LogicalCode) {
        if !self.cookies.insert(cookie) {
            return;
        }
        insert_by_usage(&mut self.buttons, usage, code);
    }

    /// Record a hat; it contributes `DPadX`/`DPadY` at the end of the axis list.
    pub fn add_hat(&mut self, cookie: u32) {
        if !self.cookies.insert(cookie) {
            return;
        }
        self.has_hat = true;
    }

    pub fn finish(self) -> DeviceCapabilities {
        let mut ranges = self.ranges;
        let mut axes: Vec<LogicalCode> = self
            .axes
            .into_iter()
            .map(|(_, code)| code)
            .filter(|&code| !(self.has_hat && (code == AXIS_DPADX || code == AXIS_DPADY)))
            .collect();

        if self.has_hat {
            for code in [AXIS_DPADX, AXIS_DPADY] {
                axes.push(code);
                ranges.entry(code).or_insert(HAT_RANGE);
            }
        }

        DeviceCapabilities {
            axes,
            buttons: self.buttons.into_iter().map(|(_, code)| code).collect(),
            ranges,
        }
    }
}

/// Stable insertion keyed by usage. Duplicate codes are ignored.
fn insert_by_usage(list: &mut Vec<(u32, LogicalCode)>, usage: u32, code: LogicalCode) {
    if list.iter().any(|&(_, c)| c == code) {
        return;
    }
    let at = list.partition_point(|&(u, _)| u <= usage);
    list.insert(at, (usage, code));
}
