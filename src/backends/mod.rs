//! Platform drivers.
//!
//! Exactly one hardware driver is compiled in and exposed as [`PlatformDriver`]:
//! - **macOS**: [`macos::IoKitDriver`], IOKit HID manager on a background run loop.
//! - **Linux**: [`linux::EvdevDriver`], kernel `event*` nodes polled in the caller.
//! - **Windows**: [`windows::XInputDriver`], the four XInput slots.
//!
//! Other targets get [`NullDriver`], which never reports a device.
//!
//! # Feature flags
//! - **`virtual`** (default): [`virtual_pad::VirtualDriver`], a software
//!   driver fed with injected HID values. It runs everywhere and backs the
//!   integration tests.

use crate::device::DeviceRecord;
use crate::driver::{Driver, DriverEnv, PollCtx};
use crate::error::Result;
use crate::registry::DeviceId;

#[cfg(target_os = "linux")]
#[cfg_attr(docsrs, doc(cfg(target_os = "linux")))]
pub mod linux;

#[cfg(target_os = "macos")]
#[cfg_attr(docsrs, doc(cfg(target_os = "macos")))]
pub mod macos;

#[cfg(target_os = "windows")]
#[cfg_attr(docsrs, doc(cfg(target_os = "windows")))]
pub mod windows;

#[cfg(feature = "virtual")]
#[cfg_attr(docsrs, doc(cfg(feature = "virtual")))]
pub mod virtual_pad;

#[cfg(target_os = "linux")]
pub type PlatformDriver = linux::EvdevDriver;

#[cfg(target_os = "macos")]
pub type PlatformDriver = macos::IoKitDriver;

#[cfg(target_os = "windows")]
pub type PlatformDriver = windows::XInputDriver;

#[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
pub type PlatformDriver = NullDriver;

/// Driver for targets without gamepad support.
#[derive(Debug, Default)]
pub struct NullDriver;

impl Driver for NullDriver {
    fn open(_env: DriverEnv) -> Result<Self> {
        log::debug!("no gamepad driver for this target");
        Ok(Self)
    }

    fn poll(&mut self, _ctx: &mut PollCtx<'_>) {}

    fn tick_rumble(&mut self, _now_ms: i64) {}

    fn gamepad_count(&self) -> usize {
        0
    }

    fn device(&self, _id: DeviceId) -> Option<DeviceRecord> {
        None
    }

    fn set_rumble(&mut self, _id: DeviceId, _strong: f64, _weak: f64, _duration_ms: i32, _now_ms: i64) -> bool {
        false
    }

    fn shutdown(&mut self) {}
}
