//! Software gamepads.
//!
//! [`VirtualDriver`] behaves like the callback-driven HID platform but takes
//! its input from a [`VirtualHub`]: tests and headless hosts plug pads described
//! by HID element trees, inject raw element values, and read back the motor
//! commands issued by rumble requests. Values go through the same
//! [`HidDecoder`] and capability walk as real HID devices.
//!
//! Hub commands are applied in order on the next poll. [`VirtualHub::fail`]
//! simulates a read error: the pad is dropped exactly as a hardware driver
//! drops a node whose descriptor failed.
//!
//! ```
//! use padbridge::backends::virtual_pad::{VirtualDriver, VirtualPadSpec};
//! use padbridge::{Backend, BackendConfig, EventKind};
//!
//! let mut backend = Backend::<VirtualDriver>::with_config(BackendConfig::default()).unwrap();
//! let hub = backend.driver().hub();
//! let pad = hub.plug(VirtualPadSpec::gamepad("Test Pad"));
//! hub.press(pad, 1);
//! backend.poll(0);
//!
//! assert_eq!(backend.next_event().map(|e| e.kind), Some(EventKind::Connected));
//! assert_eq!(backend.next_event().map(|e| e.kind), Some(EventKind::ButtonPressed));
//! ```

use crate::device::DeviceRecord;
use crate::driver::{Driver, DriverEnv, PollCtx};
use crate::error::Result;
use crate::event::GamepadEvent;
use crate::hid::{collect_capabilities, HidDecoder, HidElement, HidValue, USAGE_GAMEPAD};
use crate::metadata::{DeviceMeta, BUS_VIRTUAL};
use crate::registry::{DeviceArena, DeviceId};
use crate::rumble::{Motor, RumbleController};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

/// Concurrent pads, same bound as the IOKit driver.
pub const MAX_DEVICES: usize = 32;

/// Longest effect, matching a kernel replay length.
const MAX_RUMBLE_MS: u32 = u16::MAX as u32;

/// Hub-side handle for one plugged pad.
pub type PadToken = u64;

/// Description of a pad to plug.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VirtualPadSpec {
    pub meta: DeviceMeta,
    pub elements: Vec<HidElement>,
    pub rumble: bool,
}

impl VirtualPadSpec {
    /// An empty pad with no elements.
    pub fn new(name: &str) -> Self {
        Self {
            meta: DeviceMeta {
                name: name.to_string(),
                bus: BUS_VIRTUAL,
                ..Default::default()
            },
            elements: Vec::new(),
            rumble: false,
        }
    }

    /// A conventional HID gamepad. Element cookies equal their usages:
    /// buttons `1..=13`, axes `0x30..=0x35` (logical `0..=255`), hat `0x39`
    /// (logical `0..=7`, `8` neutral).
    pub fn gamepad(name: &str) -> Self {
        let mut children: Vec<HidElement> = (1..=13).map(|u| HidElement::button(u, u)).collect();
        children.extend((0x30..=0x35).map(|u| HidElement::axis(u, u, 0, 255)));
        children.push(HidElement::hat(0x39, 0, 7));
        Self::new(name)
            .ids(0x1209, 0x0001)
            .element(HidElement::collection(0x1000, USAGE_GAMEPAD, children))
    }

    pub fn ids(mut self, vendor_id: u16, product_id: u16) -> Self {
        self.meta.vendor_id = vendor_id;
        self.meta.product_id = product_id;
        self
    }

    pub fn element(mut self, el: HidElement) -> Self {
        self.elements.push(el);
        self
    }

    pub fn with_rumble(mut self, rumble: bool) -> Self {
        self.rumble = rumble;
        self
    }
}

/// Motor command observed by the hub.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MotorCommand {
    Start {
        pad: PadToken,
        strong: u16,
        weak: u16,
        duration_ms: u32,
    },
    Stop {
        pad: PadToken,
    },
}

#[derive(Debug)]
enum HubCommand {
    Plug(PadToken, VirtualPadSpec),
    Unplug(PadToken),
    Fail(PadToken),
    Value(PadToken, u32, i32),
}

#[derive(Debug, Default)]
struct HubState {
    next_token: PadToken,
    pending: VecDeque<HubCommand>,
    motor_log: Vec<MotorCommand>,
}

/// Cloneable control handle for a [`VirtualDriver`].
#[derive(Clone, Debug, Default)]
pub struct VirtualHub {
    inner: Arc<Mutex<HubState>>,
}

impl VirtualHub {
    fn lock(&self) -> MutexGuard<'_, HubState> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Queue a connection. The pad gets its device id on the next poll.
    pub fn plug(&self, spec: VirtualPadSpec) -> PadToken {
        let mut state = self.lock();
        let token = state.next_token;
        state.next_token += 1;
        state.pending.push_back(HubCommand::Plug(token, spec));
        token
    }

    pub fn unplug(&self, pad: PadToken) {
        self.lock().pending.push_back(HubCommand::Unplug(pad));
    }

    /// Make the pad's next read fail. Commands queued after this one for the
    /// same pad are discarded.
    pub fn fail(&self, pad: PadToken) {
        self.lock().pending.push_back(HubCommand::Fail(pad));
    }

    /// Report a raw value for the element with `cookie`.
    pub fn set_value(&self, pad: PadToken, cookie: u32, value: i32) {
        self.lock().pending.push_back(HubCommand::Value(pad, cookie, value));
    }

    pub fn press(&self, pad: PadToken, cookie: u32) {
        self.set_value(pad, cookie, 1);
    }

    pub fn release(&self, pad: PadToken, cookie: u32) {
        self.set_value(pad, cookie, 0);
    }

    pub fn motor_log(&self) -> Vec<MotorCommand> {
        self.lock().motor_log.clone()
    }

    pub fn take_motor_log(&self) -> Vec<MotorCommand> {
        std::mem::take(&mut self.lock().motor_log)
    }

    fn drain(&self) -> Vec<HubCommand> {
        self.lock().pending.drain(..).collect()
    }

    fn record(&self, cmd: MotorCommand) {
        self.lock().motor_log.push(cmd);
    }
}

struct HubMotor<'a> {
    hub: &'a VirtualHub,
    pad: PadToken,
}

impl Motor for HubMotor<'_> {
    fn start(&mut self, strong: u16, weak: u16, duration_ms: u32) -> Result<()> {
        self.hub.record(MotorCommand::Start {
            pad: self.pad,
            strong,
            weak,
            duration_ms,
        });
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        self.hub.record(MotorCommand::Stop { pad: self.pad });
        Ok(())
    }
}

struct VirtualPad {
    token: PadToken,
    record: DeviceRecord,
    elements: Vec<HidElement>,
    decoder: HidDecoder,
    rumble: RumbleController,
}

pub struct VirtualDriver {
    hub: VirtualHub,
    pads: DeviceArena<VirtualPad>,
}

impl VirtualDriver {
    pub fn hub(&self) -> VirtualHub {
        self.hub.clone()
    }

    /// Device id currently assigned to a plugged pad.
    pub fn id_of(&self, pad: PadToken) -> Option<DeviceId> {
        self.pads.find(|p| p.token == pad)
    }

    fn connect(&mut self, token: PadToken, spec: VirtualPadSpec, ctx: &PollCtx<'_>) {
        let record = DeviceRecord::new(spec.meta, collect_capabilities(&spec.elements), spec.rumble);
        let name = record.meta.name.clone();
        let pad = VirtualPad {
            token,
            record,
            elements: spec.elements,
            decoder: HidDecoder::new(),
            rumble: RumbleController::new(MAX_RUMBLE_MS),
        };
        match self.pads.insert(pad) {
            Some(id) => {
                log::debug!("virtual pad {token} connected as {id}: {name}");
                ctx.push(GamepadEvent::connected(id, ctx.now_ms()));
            }
            None => log::debug!("virtual pad {token} ignored, {MAX_DEVICES} devices connected"),
        }
    }

    fn disconnect(&mut self, token: PadToken, ctx: &PollCtx<'_>) {
        let Some(id) = self.id_of(token) else {
            return;
        };
        if let Some(mut pad) = self.pads.remove(id) {
            release(&self.hub, &mut pad);
            log::debug!("virtual pad {token} disconnected ({id})");
            ctx.push(GamepadEvent::disconnected(id, ctx.now_ms()));
        }
    }

    fn read_failed(&mut self, token: PadToken, ctx: &PollCtx<'_>) {
        if self.id_of(token).is_some() {
            log::warn!("virtual pad {token}: read failed, disconnecting");
            self.disconnect(token, ctx);
        }
    }

    fn input(&mut self, token: PadToken, cookie: u32, value: i32, ctx: &PollCtx<'_>) {
        let Some(id) = self.id_of(token) else {
            return;
        };
        let Some(pad) = self.pads.get_mut(id) else {
            return;
        };
        let Some(el) = pad.elements.iter().find_map(|e| e.find(cookie)) else {
            log::trace!("virtual pad {token}: no element with cookie {cookie}");
            return;
        };
        let v = HidValue {
            usage_page: el.usage_page,
            usage: el.usage,
            value,
            logical_min: el.logical_min,
            logical_max: el.logical_max,
        };
        let mut out = Vec::new();
        pad.decoder.decode(id, &v, ctx.now_ms(), &mut out);
        ctx.extend(out);
    }
}

fn release(hub: &VirtualHub, pad: &mut VirtualPad) {
    if pad.rumble.is_active() {
        pad.rumble.stop(&mut HubMotor { hub, pad: pad.token });
    }
}

impl Driver for VirtualDriver {
    fn open(_env: DriverEnv) -> Result<Self> {
        Ok(Self {
            hub: VirtualHub::default(),
            pads: DeviceArena::with_limit(MAX_DEVICES),
        })
    }

    fn poll(&mut self, ctx: &mut PollCtx<'_>) {
        for cmd in self.hub.drain() {
            match cmd {
                HubCommand::Plug(token, spec) => self.connect(token, spec, ctx),
                HubCommand::Unplug(token) => self.disconnect(token, ctx),
                HubCommand::Fail(token) => self.read_failed(token, ctx),
                HubCommand::Value(token, cookie, value) => self.input(token, cookie, value, ctx),
            }
        }
    }

    fn tick_rumble(&mut self, now_ms: i64) {
        let hub = &self.hub;
        for (_, pad) in self.pads.iter_mut() {
            pad.rumble.tick(&mut HubMotor { hub, pad: pad.token }, now_ms);
        }
    }

    fn gamepad_count(&self) -> usize {
        self.pads.len()
    }

    fn device(&self, id: DeviceId) -> Option<DeviceRecord> {
        self.pads.get(id).map(|p| p.record.clone())
    }

    fn set_rumble(&mut self, id: DeviceId, strong: f64, weak: f64, duration_ms: i32, now_ms: i64) -> bool {
        let Some(pad) = self.pads.get_mut(id) else {
            return false;
        };
        if !pad.record.ff_supported {
            return false;
        }
        let mut motor = HubMotor {
            hub: &self.hub,
            pad: pad.token,
        };
        pad.rumble.set(&mut motor, strong, weak, duration_ms, now_ms)
    }

    fn shutdown(&mut self) {
        for (_, mut pad) in self.pads.drain() {
            release(&self.hub, &mut pad);
        }
    }
}
