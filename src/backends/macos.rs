#![cfg(target_os = "macos")]

//! macOS IOKit HID driver.
//!
//! An `IOHIDManager` runs on a dedicated thread, scheduled on that thread's run
//! loop. Its callbacks do all the work:
//! - **match**: dedupe by registry entry id, assign a new [`DeviceId`], walk
//!   the element list for capabilities, publish the record, push `Connected`.
//! - **removal**: find the device by `LocationID` (pointer equality as a
//!   fallback), drop its record, push `Disconnected`.
//! - **input value**: decode through [`HidDecoder`] and push the events.
//!
//! Shutdown sets a stop flag and stops the thread's `CFRunLoop` directly, so
//! the loop returns at once instead of finishing its current slice.
//!
//! The consumer thread never touches IOKit. It reads device records from a
//! shared snapshot and events from the queue. Rumble is not supported on this
//! platform.

use crate::clock::Clock;
use crate::device::DeviceRecord;
use crate::driver::{Driver, DriverEnv, PollCtx};
use crate::error::{BackendError, Result};
use crate::event::GamepadEvent;
use crate::hid::{collect_capabilities, ElementKind, HidDecoder, HidElement, HidValue, MATCHED_USAGES};
use crate::metadata::{bus_from_transport, name_or_unknown, DeviceMeta};
use crate::queue::SharedEventQueue;
use crate::registry::{DeviceArena, DeviceId};

use core_foundation::array::{CFArray, CFArrayGetCount, CFArrayGetValueAtIndex};
use core_foundation::base::{kCFAllocatorDefault, CFRelease, CFRetain, CFType, CFTypeRef, TCFType};
use core_foundation::dictionary::CFDictionary;
use core_foundation::number::CFNumber;
use core_foundation::runloop::{kCFRunLoopDefaultMode, CFRunLoop};
use core_foundation::string::CFString;

use io_kit_sys::hid::base::{IOHIDDeviceRef, IOHIDElementRef, IOHIDValueRef};
use io_kit_sys::hid::device::*;
use io_kit_sys::hid::element::*;
use io_kit_sys::hid::manager::*;
use io_kit_sys::hid::value::{IOHIDValueGetElement, IOHIDValueGetIntegerValue};
use io_kit_sys::ret::IOReturn;
use io_kit_sys::IORegistryEntryGetRegistryEntryID;

use std::cell::RefCell;
use std::collections::HashMap;
use std::ffi::c_void;
use std::ptr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, SyncSender};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::thread::JoinHandle;
use std::time::Duration;

/// Concurrent devices tracked.
pub const MAX_DEVICES: usize = 32;

/// Run loop slice between stop-flag checks. Only matters when a stop request
/// lands between two slices.
const RUN_LOOP_SLICE: Duration = Duration::from_secs(1);

const OPTIONS_NONE: u32 = 0;

type Records = Arc<RwLock<HashMap<DeviceId, DeviceRecord>>>;

fn read(records: &Records) -> RwLockReadGuard<'_, HashMap<DeviceId, DeviceRecord>> {
    records.read().unwrap_or_else(|e| e.into_inner())
}

fn write(records: &Records) -> RwLockWriteGuard<'_, HashMap<DeviceId, DeviceRecord>> {
    records.write().unwrap_or_else(|e| e.into_inner())
}

/// Handles shared between the driver and its run-loop thread.
#[derive(Clone)]
struct Shared {
    queue: Arc<SharedEventQueue>,
    clock: Arc<dyn Clock>,
    records: Records,
}

struct MacPad {
    /// Retained while tracked.
    device: IOHIDDeviceRef,
    registry_id: Option<u64>,
    location: Option<i64>,
    decoder: HidDecoder,
}

/// The run-loop thread's `CFRunLoop`, used from the consumer thread only to
/// stop it.
struct LoopHandle(CFRunLoop);

// SAFETY: CFRunLoopStop may be called from any thread.
unsafe impl Send for LoopHandle {}
unsafe impl Sync for LoopHandle {}

/// Run-loop thread state. Only touched from IOKit callbacks on that thread.
struct RunLoopState {
    shared: Shared,
    pads: RefCell<DeviceArena<MacPad>>,
}

unsafe fn property(device: IOHIDDeviceRef, key: &str) -> Option<CFType> {
    let key = CFString::new(key);
    let value = IOHIDDeviceGetProperty(device, key.as_concrete_TypeRef());
    (!value.is_null()).then(|| CFType::wrap_under_get_rule(value))
}

unsafe fn string_property(device: IOHIDDeviceRef, key: &str) -> Option<String> {
    property(device, key)?.downcast::<CFString>().map(|s| s.to_string())
}

unsafe fn number_property(device: IOHIDDeviceRef, key: &str) -> Option<i64> {
    property(device, key)?.downcast::<CFNumber>()?.to_i64()
}

unsafe fn registry_id(device: IOHIDDeviceRef) -> Option<u64> {
    let service = IOHIDDeviceGetService(device);
    if service == 0 {
        return None;
    }
    let mut id = 0u64;
    (IORegistryEntryGetRegistryEntryID(service, &mut id) == 0).then_some(id)
}

unsafe fn element_of(el: IOHIDElementRef) -> HidElement {
    HidElement {
        cookie: IOHIDElementGetCookie(el),
        kind: ElementKind::from_raw(IOHIDElementGetType(el)),
        usage_page: IOHIDElementGetUsagePage(el),
        usage: IOHIDElementGetUsage(el),
        logical_min: IOHIDElementGetLogicalMin(el) as i32,
        logical_max: IOHIDElementGetLogicalMax(el) as i32,
        children: Vec::new(),
    }
}

/// Every element of the device, flattened. Collections carry no children since
/// their members are listed individually.
unsafe fn elements_of(device: IOHIDDeviceRef) -> Vec<HidElement> {
    let array = IOHIDDeviceCopyMatchingElements(device, ptr::null(), OPTIONS_NONE);
    if array.is_null() {
        return Vec::new();
    }
    let count = CFArrayGetCount(array);
    let elements = (0..count)
        .map(|i| CFArrayGetValueAtIndex(array, i) as IOHIDElementRef)
        .filter(|el| !el.is_null())
        .map(|el| element_of(el))
        .collect();
    CFRelease(array as CFTypeRef);
    elements
}

unsafe fn meta_of(device: IOHIDDeviceRef, location: Option<i64>) -> DeviceMeta {
    let transport = string_property(device, "Transport");
    DeviceMeta {
        name: name_or_unknown(string_property(device, "Product").as_deref()),
        bus: bus_from_transport(transport.as_deref()),
        vendor_id: number_property(device, "VendorID").unwrap_or(0) as u16,
        product_id: number_property(device, "ProductID").unwrap_or(0) as u16,
        version: number_property(device, "VersionNumber").unwrap_or(0) as u16,
        path: location.map(|l| format!("iokit:{l:#x}")),
    }
}

impl RunLoopState {
    unsafe fn on_match(&self, device: IOHIDDeviceRef) {
        let registry_id = registry_id(device);
        let mut pads = self.pads.borrow_mut();
        let known = pads
            .find(|p| p.device == device || (registry_id.is_some() && p.registry_id == registry_id))
            .is_some();
        if known {
            log::trace!("ignoring duplicate match for registry id {registry_id:?}");
            return;
        }
        if pads.is_full() {
            log::debug!("ignoring HID device, {MAX_DEVICES} already connected");
            return;
        }

        let location = number_property(device, "LocationID");
        let meta = meta_of(device, location);
        let capabilities = collect_capabilities(&elements_of(device));
        let record = DeviceRecord::new(meta, capabilities, false);

        CFRetain(device as CFTypeRef);
        let pad = MacPad {
            device,
            registry_id,
            location,
            decoder: HidDecoder::new(),
        };
        let Some(id) = pads.insert(pad) else {
            CFRelease(device as CFTypeRef);
            return;
        };
        log::debug!("gamepad {id} connected: {record}");
        write(&self.shared.records).insert(id, record);
        self.shared
            .queue
            .push(GamepadEvent::connected(id, self.shared.clock.now_ms()));
    }

    unsafe fn on_removal(&self, device: IOHIDDeviceRef) {
        let location = number_property(device, "LocationID");
        let mut pads = self.pads.borrow_mut();
        let found = location
            .and_then(|l| pads.find(|p| p.location == Some(l)))
            .or_else(|| pads.find(|p| p.device == device));
        let Some(id) = found else {
            return;
        };
        if let Some(pad) = pads.remove(id) {
            CFRelease(pad.device as CFTypeRef);
        }
        write(&self.shared.records).remove(&id);
        log::debug!("gamepad {id} disconnected");
        self.shared
            .queue
            .push(GamepadEvent::disconnected(id, self.shared.clock.now_ms()));
    }

    unsafe fn on_value(&self, device: IOHIDDeviceRef, value: IOHIDValueRef) {
        let el = IOHIDValueGetElement(value);
        if el.is_null() {
            return;
        }
        let mut pads = self.pads.borrow_mut();
        let Some(id) = pads.find(|p| p.device == device) else {
            return;
        };
        let Some(pad) = pads.get_mut(id) else {
            return;
        };
        let v = HidValue {
            usage_page: IOHIDElementGetUsagePage(el),
            usage: IOHIDElementGetUsage(el),
            value: IOHIDValueGetIntegerValue(value) as i32,
            logical_min: IOHIDElementGetLogicalMin(el) as i32,
            logical_max: IOHIDElementGetLogicalMax(el) as i32,
        };
        log::trace!("gamepad {id}: {v:?}");
        let mut out = Vec::new();
        pad.decoder.decode(id, &v, self.shared.clock.now_ms(), &mut out);
        if !out.is_empty() {
            self.shared.queue.extend(out);
        }
    }

    /// Release every retained device.
    unsafe fn release_all(&self) {
        for (_, pad) in self.pads.borrow_mut().drain() {
            CFRelease(pad.device as CFTypeRef);
        }
        write(&self.shared.records).clear();
    }
}

extern "C" fn on_match(context: *mut c_void, _result: IOReturn, _sender: *mut c_void, device: IOHIDDeviceRef) {
    // SAFETY: `context` is the RunLoopState that outlives the manager.
    if let Some(state) = unsafe { (context as *const RunLoopState).as_ref() } {
        if !device.is_null() {
            unsafe { state.on_match(device) };
        }
    }
}

extern "C" fn on_removal(context: *mut c_void, _result: IOReturn, _sender: *mut c_void, device: IOHIDDeviceRef) {
    // SAFETY: as in `on_match`.
    if let Some(state) = unsafe { (context as *const RunLoopState).as_ref() } {
        if !device.is_null() {
            unsafe { state.on_removal(device) };
        }
    }
}

extern "C" fn on_value(context: *mut c_void, _result: IOReturn, sender: *mut c_void, value: IOHIDValueRef) {
    // SAFETY: as in `on_match`; `sender` is the device that produced the value.
    if let Some(state) = unsafe { (context as *const RunLoopState).as_ref() } {
        if !value.is_null() {
            unsafe { state.on_value(sender as IOHIDDeviceRef, value) };
        }
    }
}

fn matching_dictionaries() -> CFArray<CFDictionary<CFString, CFNumber>> {
    let dicts: Vec<_> = MATCHED_USAGES
        .iter()
        .map(|&(page, usage)| {
            CFDictionary::from_CFType_pairs(&[
                (CFString::new("DeviceUsagePage"), CFNumber::from(page as i32)),
                (CFString::new("DeviceUsage"), CFNumber::from(usage as i32)),
            ])
        })
        .collect();
    CFArray::from_CFTypes(&dicts)
}

/// Body of the run-loop thread.
fn run(shared: Shared, stop: Arc<AtomicBool>, started: SyncSender<LoopHandle>) {
    let run_loop = CFRunLoop::get_current();
    if started.send(LoopHandle(run_loop.clone())).is_err() {
        return;
    }
    let state = RunLoopState {
        shared,
        pads: RefCell::new(DeviceArena::with_limit(MAX_DEVICES)),
    };

    // SAFETY: plain IOKit calls; the manager is released before `state` drops.
    unsafe {
        let manager = IOHIDManagerCreate(kCFAllocatorDefault, OPTIONS_NONE);
        if manager.is_null() {
            log::error!("IOHIDManagerCreate failed");
            return;
        }
        let matching = matching_dictionaries();
        let context = &state as *const RunLoopState as *mut c_void;

        IOHIDManagerSetDeviceMatchingMultiple(manager, matching.as_concrete_TypeRef());
        IOHIDManagerRegisterDeviceMatchingCallback(manager, on_match, context);
        IOHIDManagerRegisterDeviceRemovalCallback(manager, on_removal, context);
        IOHIDManagerRegisterInputValueCallback(manager, on_value, context);
        IOHIDManagerScheduleWithRunLoop(manager, run_loop.as_concrete_TypeRef(), kCFRunLoopDefaultMode);
        let res = IOHIDManagerOpen(manager, OPTIONS_NONE);
        if res != 0 {
            log::error!("IOHIDManagerOpen failed: {res:#x}");
        }

        while !stop.load(Ordering::Acquire) {
            CFRunLoop::run_in_mode(kCFRunLoopDefaultMode, RUN_LOOP_SLICE, false);
        }

        IOHIDManagerUnscheduleFromRunLoop(manager, run_loop.as_concrete_TypeRef(), kCFRunLoopDefaultMode);
        IOHIDManagerClose(manager, OPTIONS_NONE);
        CFRelease(manager as CFTypeRef);
        state.release_all();
    }
    log::debug!("IOKit run loop stopped");
}

pub struct IoKitDriver {
    shared: Shared,
    stop: Arc<AtomicBool>,
    run_loop: Option<LoopHandle>,
    thread: Option<JoinHandle<()>>,
}

impl Driver for IoKitDriver {
    fn open(env: DriverEnv) -> Result<Self> {
        let shared = Shared {
            queue: env.queue,
            clock: env.clock,
            records: Arc::default(),
        };
        let stop = Arc::new(AtomicBool::new(false));
        let (started, loop_rx) = mpsc::sync_channel(1);
        let thread = std::thread::Builder::new()
            .name("padbridge-iokit".into())
            .spawn({
                let shared = shared.clone();
                let stop = Arc::clone(&stop);
                move || run(shared, stop, started)
            })
            .map_err(|e| {
                log::error!("cannot start IOKit thread: {e}");
                BackendError::ThreadStart(e.to_string())
            })?;
        let run_loop = loop_rx.recv().map_err(|_| {
            log::error!("IOKit thread exited before its run loop started");
            BackendError::ThreadStart("run loop did not start".into())
        })?;
        Ok(Self {
            shared,
            stop,
            run_loop: Some(run_loop),
            thread: Some(thread),
        })
    }

    /// Events arrive from the run-loop thread; nothing to do here.
    fn poll(&mut self, _ctx: &mut PollCtx<'_>) {}

    fn wait(&mut self, queue: &SharedEventQueue, timeout_ms: i32) {
        queue.wait(timeout_ms);
    }

    fn tick_rumble(&mut self, _now_ms: i64) {}

    fn gamepad_count(&self) -> usize {
        read(&self.shared.records).len()
    }

    fn device(&self, id: DeviceId) -> Option<DeviceRecord> {
        read(&self.shared.records).get(&id).cloned()
    }

    fn set_rumble(&mut self, _id: DeviceId, _strong: f64, _weak: f64, _duration_ms: i32, _now_ms: i64) -> bool {
        false
    }

    fn shutdown(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(run_loop) = self.run_loop.take() {
            run_loop.0.stop();
        }
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                log::warn!("IOKit thread panicked");
            }
        }
        write(&self.shared.records).clear();
    }
}
