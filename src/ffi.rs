//! C ABI over the platform [`Backend`].
//!
//! The handle is an opaque pointer from [`padbridge_new`], released with
//! [`padbridge_free`]. Every entry point accepts a null handle and returns the
//! same sentinel an unknown device id would. Panics are caught at the boundary
//! and logged.
//!
//! Strings are copied as UTF-8 without a terminator; the return value is the
//! full length so callers can retry with a larger buffer. Events are written as
//! 32-byte little-endian records (see [`GamepadEvent::to_bytes`](crate::event::GamepadEvent::to_bytes)).

#![allow(clippy::missing_safety_doc)]

use crate::backend::Backend;
use crate::codes::LogicalCode;
use crate::event::WIRE_EVENT_LEN;
use crate::registry::DeviceId;

use std::panic::{self, AssertUnwindSafe};
use std::ptr;

/// Opaque handle type seen by C callers.
pub type PadBridge = Backend;

fn guard<T>(fallback: T, f: impl FnOnce() -> T) -> T {
    panic::catch_unwind(AssertUnwindSafe(f)).unwrap_or_else(|_| {
        log::error!("panic caught at the C boundary");
        fallback
    })
}

/// Copy as much of `src` as fits. Returns `src.len()`.
unsafe fn copy_out<T: Copy>(src: &[T], out: *mut T, out_len: usize) -> usize {
    if !out.is_null() {
        let n = src.len().min(out_len);
        ptr::copy_nonoverlapping(src.as_ptr(), out, n);
    }
    src.len()
}

#[no_mangle]
pub extern "C" fn padbridge_new() -> *mut PadBridge {
    guard(ptr::null_mut(), || match Backend::new() {
        Ok(backend) => Box::into_raw(Box::new(backend)),
        Err(e) => {
            log::error!("cannot open gamepad backend: {e}");
            ptr::null_mut()
        }
    })
}

/// Shut down and free a handle. Null is ignored.
#[no_mangle]
pub unsafe extern "C" fn padbridge_free(handle: *mut PadBridge) {
    if handle.is_null() {
        return;
    }
    guard((), || drop(Box::from_raw(handle)));
}

#[no_mangle]
pub unsafe extern "C" fn padbridge_poll(handle: *mut PadBridge, timeout_ms: i32) {
    if let Some(b) = handle.as_mut() {
        guard((), || b.poll(timeout_ms));
    }
}

/// Write the next event into `out_buf`. Returns 32, or 0 when there is no
/// event or the buffer is too small (the event stays queued).
#[no_mangle]
pub unsafe extern "C" fn padbridge_next_event(handle: *mut PadBridge, out_buf: *mut u8, out_len: usize) -> usize {
    let Some(b) = handle.as_mut() else {
        return 0;
    };
    if out_buf.is_null() || out_len < WIRE_EVENT_LEN {
        return 0;
    }
    guard(0, || match b.next_event() {
        Some(ev) => copy_out(&ev.to_bytes(), out_buf, out_len),
        None => 0,
    })
}

#[no_mangle]
pub unsafe extern "C" fn padbridge_gamepad_count(handle: *const PadBridge) -> i32 {
    handle.as_ref().map_or(0, |b| guard(0, || b.gamepad_count()))
}

#[no_mangle]
pub unsafe extern "C" fn padbridge_name(handle: *const PadBridge, id: DeviceId, out: *mut u8, out_len: usize) -> usize {
    handle
        .as_ref()
        .map_or(0, |b| guard(0, || copy_out(b.name(id).as_bytes(), out, out_len)))
}

#[no_mangle]
pub unsafe extern "C" fn padbridge_uuid_simple(
    handle: *const PadBridge,
    id: DeviceId,
    out: *mut u8,
    out_len: usize,
) -> usize {
    handle
        .as_ref()
        .map_or(0, |b| guard(0, || copy_out(b.uuid_simple(id).as_bytes(), out, out_len)))
}

#[no_mangle]
pub unsafe extern "C" fn padbridge_vendor_id(handle: *const PadBridge, id: DeviceId) -> i32 {
    handle.as_ref().map_or(-1, |b| guard(-1, || b.vendor_id(id)))
}

#[no_mangle]
pub unsafe extern "C" fn padbridge_product_id(handle: *const PadBridge, id: DeviceId) -> i32 {
    handle.as_ref().map_or(-1, |b| guard(-1, || b.product_id(id)))
}

#[no_mangle]
pub unsafe extern "C" fn padbridge_is_ff_supported(handle: *const PadBridge, id: DeviceId) -> bool {
    handle.as_ref().is_some_and(|b| guard(false, || b.is_ff_supported(id)))
}

/// Copy axis codes into `out`. Returns the total count.
#[no_mangle]
pub unsafe extern "C" fn padbridge_axes(handle: *const PadBridge, id: DeviceId, out: *mut u32, out_len: usize) -> usize {
    handle
        .as_ref()
        .map_or(0, |b| guard(0, || copy_out(&b.axes(id), out, out_len)))
}

/// Copy button codes into `out`. Returns the total count.
#[no_mangle]
pub unsafe extern "C" fn padbridge_buttons(
    handle: *const PadBridge,
    id: DeviceId,
    out: *mut u32,
    out_len: usize,
) -> usize {
    handle
        .as_ref()
        .map_or(0, |b| guard(0, || copy_out(&b.buttons(id), out, out_len)))
}

#[no_mangle]
pub unsafe extern "C" fn padbridge_axis_range(
    handle: *const PadBridge,
    id: DeviceId,
    code: LogicalCode,
    min: *mut i32,
    max: *mut i32,
) -> bool {
    let Some((lo, hi)) = handle.as_ref().and_then(|b| guard(None, || b.axis_range(id, code))) else {
        return false;
    };
    if let Some(min) = min.as_mut() {
        *min = lo;
    }
    if let Some(max) = max.as_mut() {
        *max = hi;
    }
    true
}

#[no_mangle]
pub unsafe extern "C" fn padbridge_set_rumble(
    handle: *mut PadBridge,
    id: DeviceId,
    strong: f64,
    weak: f64,
    duration_ms: i32,
) -> bool {
    handle
        .as_mut()
        .is_some_and(|b| guard(false, || b.set_rumble(id, strong, weak, duration_ms)))
}

/// Stop background work and release devices. The handle stays valid for
/// queries and must still be freed.
#[no_mangle]
pub unsafe extern "C" fn padbridge_shutdown(handle: *mut PadBridge) {
    if let Some(b) = handle.as_mut() {
        guard((), || b.shutdown());
    }
}
