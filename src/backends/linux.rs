#![cfg(target_os = "linux")]

//! Linux evdev driver.
//!
//! Every poll rescans the input directory for `event*` nodes, opens new ones
//! non-blocking and keeps those that look like gamepads:
//! - at least one gamepad button (`BTN_SOUTH`, `BTN_TL`, `BTN_START`, `BTN_DPAD_*`, …), and
//! - either both `ABS_X`/`ABS_Y` or a `ABS_HAT0*` axis.
//!
//! A node rejected as a non-gamepad is skipped on later scans only while its
//! identity (device number, inode and change time) is unchanged, so a gamepad
//! that reuses the path of an unplugged keyboard is still opened.
//!
//! Tracked nodes are then polled with `poll(2)` and drained with
//! `fetch_events`. An error condition on the descriptor, or a read error that is
//! not `EWOULDBLOCK`, disconnects the device; its rumble effect is stopped and
//! removed first.
//!
//! Nodes are opened read-write when permitted so rumble effects can be
//! uploaded, and read-only otherwise. Read-only nodes never report rumble
//! support.
//!
//! ## Normalization
//! - Stick and Z axes use the node's `absinfo` range; stick Y is inverted so
//!   up is positive.
//! - `ABS_Z`/`ABS_RZ` are analog triggers and decode to `[0, 1]`.
//! - `ABS_HAT0X`/`ABS_HAT0Y` decode to `-1 | 0 | 1` and also drive DPad
//!   button edges.

use crate::capabilities::{CapabilityCollector, DeviceCapabilities};
use crate::codes::*;
use crate::device::DeviceRecord;
use crate::driver::{Driver, DriverEnv, PollCtx};
use crate::error::Result;
use crate::event::GamepadEvent;
use crate::metadata::{name_or_unknown, DeviceMeta};
use crate::normalize::{flip_y, hat_sign, normalize_axis, normalize_trigger, DpadState};
use crate::registry::{DeviceArena, DeviceId};
use crate::rumble::{Motor, RumbleController};

use evdev::{
    AbsoluteAxisCode, Device, EventType, FFEffect, FFEffectCode, FFEffectData, FFEffectKind,
    FFReplay, FFTrigger, KeyCode,
};
use nix::fcntl::OFlag;
use nix::poll::{poll, PollFd, PollFlags, PollTimeout};
use nix::sys::stat::stat;

use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io;
use std::os::fd::{AsRawFd, BorrowedFd, OwnedFd};
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};

/// Concurrent devices tracked.
pub const MAX_DEVICES: usize = 64;

/// Replay length is a `u16` in milliseconds.
const MAX_RUMBLE_MS: u32 = u16::MAX as u32;

/// Range assumed for an axis whose absinfo could not be read.
const FALLBACK_RANGE: (i32, i32) = (-32768, 32767);

/// Upper bound on reads per device per pass.
const MAX_READS_PER_PASS: usize = 16;

/// Capability cookies: keys use their code, axes are offset past the key space.
const ABS_COOKIE_BASE: u32 = 0x1_0000;

const GAMEPAD_KEYS: [KeyCode; 16] = [
    KeyCode::BTN_SOUTH,
    KeyCode::BTN_TRIGGER,
    KeyCode::BTN_EAST,
    KeyCode::BTN_NORTH,
    KeyCode::BTN_WEST,
    KeyCode::BTN_TL,
    KeyCode::BTN_TR,
    KeyCode::BTN_START,
    KeyCode::BTN_SELECT,
    KeyCode::BTN_MODE,
    KeyCode::BTN_DPAD_UP,
    KeyCode::BTN_DPAD_DOWN,
    KeyCode::BTN_DPAD_LEFT,
    KeyCode::BTN_DPAD_RIGHT,
    KeyCode::BTN_THUMBL,
    KeyCode::BTN_THUMBR,
];

pub fn map_key(key: KeyCode) -> Option<LogicalCode> {
    Some(match key {
        KeyCode::BTN_SOUTH => BTN_SOUTH,
        KeyCode::BTN_EAST => BTN_EAST,
        KeyCode::BTN_C => BTN_C,
        KeyCode::BTN_NORTH => BTN_NORTH,
        KeyCode::BTN_WEST => BTN_WEST,
        KeyCode::BTN_Z => BTN_Z,
        KeyCode::BTN_TL => BTN_LT,
        KeyCode::BTN_TR => BTN_RT,
        KeyCode::BTN_TL2 => BTN_LT2,
        KeyCode::BTN_TR2 => BTN_RT2,
        KeyCode::BTN_SELECT => BTN_SELECT,
        KeyCode::BTN_START => BTN_START,
        KeyCode::BTN_MODE => BTN_MODE,
        KeyCode::BTN_THUMBL => BTN_LTHUMB,
        KeyCode::BTN_THUMBR => BTN_RTHUMB,
        KeyCode::BTN_DPAD_UP => BTN_DPAD_UP,
        KeyCode::BTN_DPAD_DOWN => BTN_DPAD_DOWN,
        KeyCode::BTN_DPAD_LEFT => BTN_DPAD_LEFT,
        KeyCode::BTN_DPAD_RIGHT => BTN_DPAD_RIGHT,
        _ => return None,
    })
}

pub fn map_abs(axis: AbsoluteAxisCode) -> Option<LogicalCode> {
    Some(match axis {
        AbsoluteAxisCode::ABS_X => AXIS_LSTICKX,
        AbsoluteAxisCode::ABS_Y => AXIS_LSTICKY,
        AbsoluteAxisCode::ABS_Z => AXIS_LEFTZ,
        AbsoluteAxisCode::ABS_RX => AXIS_RSTICKX,
        AbsoluteAxisCode::ABS_RY => AXIS_RSTICKY,
        AbsoluteAxisCode::ABS_RZ => AXIS_RIGHTZ,
        AbsoluteAxisCode::ABS_HAT0X => AXIS_DPADX,
        AbsoluteAxisCode::ABS_HAT0Y => AXIS_DPADY,
        _ => return None,
    })
}

fn is_hat(axis: AbsoluteAxisCode) -> bool {
    matches!(axis, AbsoluteAxisCode::ABS_HAT0X | AbsoluteAxisCode::ABS_HAT0Y)
}

/// Gamepad acceptance test on a node's capability bits.
fn is_gamepad(device: &Device) -> bool {
    let has_key = device
        .supported_keys()
        .is_some_and(|keys| GAMEPAD_KEYS.iter().any(|k| keys.contains(*k)));
    let (has_sticks, has_hat) = match device.supported_absolute_axes() {
        Some(abs) => (
            abs.contains(AbsoluteAxisCode::ABS_X) && abs.contains(AbsoluteAxisCode::ABS_Y),
            abs.contains(AbsoluteAxisCode::ABS_HAT0X) || abs.contains(AbsoluteAxisCode::ABS_HAT0Y),
        ),
        None => (false, false),
    };
    has_key && (has_sticks || has_hat)
}

/// Decode state for one node. Kept apart from the handle so it can be tested
/// without a kernel device.
#[derive(Debug, Default)]
struct EvdevDecoder {
    ranges: HashMap<u16, (i32, i32)>,
    dpad: DpadState,
}

impl EvdevDecoder {
    fn decode(
        &mut self,
        id: DeviceId,
        ev_type: EventType,
        code: u16,
        value: i32,
        t: i64,
        out: &mut Vec<GamepadEvent>,
    ) {
        match ev_type {
            EventType::KEY => {
                // value 2 is autorepeat
                if value == 2 {
                    return;
                }
                if let Some(code) = map_key(KeyCode(code)) {
                    out.push(GamepadEvent::button(id, code, value != 0, t));
                }
            }
            EventType::ABSOLUTE => self.decode_abs(id, AbsoluteAxisCode(code), value, t, out),
            _ => {}
        }
    }

    fn decode_abs(
        &mut self,
        id: DeviceId,
        axis: AbsoluteAxisCode,
        value: i32,
        t: i64,
        out: &mut Vec<GamepadEvent>,
    ) {
        let Some(code) = map_abs(axis) else {
            return;
        };
        match axis {
            AbsoluteAxisCode::ABS_HAT0X => {
                let x = hat_sign(value);
                self.dpad.set_x(x, id, t, out);
                out.push(GamepadEvent::axis(id, code, x as f64, t));
            }
            AbsoluteAxisCode::ABS_HAT0Y => {
                let y = hat_sign(value);
                self.dpad.set_y(y, id, t, out);
                out.push(GamepadEvent::axis(id, code, y as f64, t));
            }
            _ => {
                let (min, max) = self.ranges.get(&axis.0).copied().unwrap_or(FALLBACK_RANGE);
                let v = match code {
                    AXIS_LEFTZ | AXIS_RIGHTZ => normalize_trigger(value, min, max),
                    c if is_stick_y(c) => flip_y(normalize_axis(value, min, max)),
                    _ => normalize_axis(value, min, max),
                };
                out.push(GamepadEvent::axis(id, code, v, t));
            }
        }
    }
}

struct EvdevMotor<'a> {
    device: &'a mut Device,
    effect: &'a mut Option<FFEffect>,
}

impl Motor for EvdevMotor<'_> {
    fn start(&mut self, strong: u16, weak: u16, duration_ms: u32) -> Result<()> {
        let data = FFEffectData {
            direction: 0,
            trigger: FFTrigger {
                button: 0,
                interval: 0,
            },
            replay: FFReplay {
                length: duration_ms.min(MAX_RUMBLE_MS) as u16,
                delay: 0,
            },
            kind: FFEffectKind::Rumble {
                strong_magnitude: strong,
                weak_magnitude: weak,
            },
        };
        match self.effect.as_mut() {
            Some(effect) => {
                log::trace!("updating rumble effect {}", effect.id());
                effect.update(data)?;
            }
            None => {
                log::trace!("uploading rumble effect");
                *self.effect = Some(self.device.upload_ff_effect(data)?);
            }
        }
        if let Some(effect) = self.effect.as_mut() {
            effect.play(1)?;
        }
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        if let Some(effect) = self.effect.as_mut() {
            effect.stop()?;
        }
        Ok(())
    }
}

struct EvdevPad {
    path: PathBuf,
    device: Device,
    record: DeviceRecord,
    decoder: EvdevDecoder,
    effect: Option<FFEffect>,
    rumble: RumbleController,
}

impl EvdevPad {
    /// Open `path` and keep it only if it is a gamepad.
    fn open(path: &Path) -> io::Result<Option<Self>> {
        let (device, writable) = open_node(path)?;
        if !is_gamepad(&device) {
            return Ok(None);
        }

        let mut ranges = HashMap::new();
        match device.get_absinfo() {
            Ok(infos) => {
                for (axis, info) in infos {
                    ranges.insert(axis.0, (info.minimum(), info.maximum()));
                }
            }
            Err(e) => log::debug!("{}: no absinfo: {e}", path.display()),
        }

        let id = device.input_id();
        let meta = DeviceMeta {
            name: name_or_unknown(device.name()),
            bus: id.bus_type().0,
            vendor_id: id.vendor(),
            product_id: id.product(),
            version: id.version(),
            path: Some(path.display().to_string()),
        };
        let ff = writable
            && device
                .supported_ff()
                .is_some_and(|ff| ff.contains(FFEffectCode::FF_RUMBLE));
        let record = DeviceRecord::new(meta, capabilities(&device, &ranges), ff);

        Ok(Some(Self {
            path: path.to_path_buf(),
            device,
            record,
            decoder: EvdevDecoder {
                ranges,
                dpad: DpadState::default(),
            },
            effect: None,
            rumble: RumbleController::new(MAX_RUMBLE_MS),
        }))
    }

    /// Read everything pending. Returns `false` once the node is gone.
    fn drain(&mut self, id: DeviceId, t: i64, out: &mut Vec<GamepadEvent>) -> bool {
        for _ in 0..MAX_READS_PER_PASS {
            let batch: Vec<(EventType, u16, i32)> = match self.device.fetch_events() {
                Ok(events) => events.map(|e| (e.event_type(), e.code(), e.value())).collect(),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return true,
                Err(e) => {
                    log::warn!("{}: read failed, disconnecting: {e}", self.path.display());
                    return false;
                }
            };
            if batch.is_empty() {
                return true;
            }
            for (ev_type, code, value) in batch {
                self.decoder.decode(id, ev_type, code, value, t, out);
            }
        }
        true
    }

    /// Stop and remove the rumble effect.
    fn release(&mut self) {
        if self.effect.is_some() {
            let mut motor = EvdevMotor {
                device: &mut self.device,
                effect: &mut self.effect,
            };
            self.rumble.stop(&mut motor);
        }
        // dropping the handle erases the effect from the device
        self.effect = None;
    }
}

/// Identity of the node behind a path. A device that reappears under the same
/// name differs in at least one field.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct NodeIdentity {
    rdev: u64,
    ino: u64,
    ctime: (i64, i64),
}

impl NodeIdentity {
    fn of(path: &Path) -> Option<Self> {
        let st = stat(path).ok()?;
        Some(Self {
            rdev: st.st_rdev as u64,
            ino: st.st_ino as u64,
            ctime: (st.st_ctime as i64, st.st_ctime_nsec as i64),
        })
    }
}

/// Nodes seen and rejected as non-gamepads.
#[derive(Debug, Default)]
struct RejectedNodes(HashMap<PathBuf, NodeIdentity>);

impl RejectedNodes {
    /// Forget entries whose path vanished or now names a different node.
    fn retain_current(&mut self, nodes: &[(PathBuf, Option<NodeIdentity>)]) {
        self.0
            .retain(|path, ident| nodes.iter().any(|(p, i)| p == path && *i == Some(*ident)));
    }

    fn contains(&self, path: &Path, ident: Option<NodeIdentity>) -> bool {
        ident.is_some_and(|i| self.0.get(path) == Some(&i))
    }

    /// Nodes that cannot be identified are not remembered.
    fn insert(&mut self, path: PathBuf, ident: Option<NodeIdentity>) {
        if let Some(i) = ident {
            self.0.insert(path, i);
        }
    }

    fn clear(&mut self) {
        self.0.clear();
    }
}

fn open_node(path: &Path) -> io::Result<(Device, bool)> {
    let nonblock = OFlag::O_NONBLOCK.bits();
    let (file, writable) = match OpenOptions::new()
        .read(true)
        .write(true)
        .custom_flags(nonblock)
        .open(path)
    {
        Ok(file) => (file, true),
        Err(_) => (
            OpenOptions::new().read(true).custom_flags(nonblock).open(path)?,
            false,
        ),
    };
    let device = Device::from_fd(OwnedFd::from(file))?;
    Ok((device, writable))
}

fn capabilities(device: &Device, ranges: &HashMap<u16, (i32, i32)>) -> DeviceCapabilities {
    let mut collector = CapabilityCollector::new();
    if let Some(keys) = device.supported_keys() {
        for key in keys.iter() {
            if let Some(code) = map_key(key) {
                collector.add_button(key.0 as u32, key.0 as u32, code);
            }
        }
    }
    if let Some(axes) = device.supported_absolute_axes() {
        for axis in axes.iter() {
            if is_hat(axis) {
                collector.add_hat(ABS_COOKIE_BASE | AbsoluteAxisCode::ABS_HAT0X.0 as u32);
            } else if let Some(code) = map_abs(axis) {
                let (min, max) = ranges.get(&axis.0).copied().unwrap_or(FALLBACK_RANGE);
                collector.add_axis(ABS_COOKIE_BASE | axis.0 as u32, axis.0 as u32, code, min, max);
            }
        }
    }
    collector.finish()
}

pub struct EvdevDriver {
    input_dir: PathBuf,
    pads: DeviceArena<EvdevPad>,
    rejected: RejectedNodes,
}

impl EvdevDriver {
    fn scan(&mut self, ctx: &PollCtx<'_>) {
        let entries = match fs::read_dir(&self.input_dir) {
            Ok(entries) => entries,
            Err(e) => {
                log::trace!("cannot read {}: {e}", self.input_dir.display());
                return;
            }
        };
        let mut nodes: Vec<(PathBuf, Option<NodeIdentity>)> = entries
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_str().is_some_and(|n| n.starts_with("event")))
            .map(|e| {
                let path = e.path();
                let ident = NodeIdentity::of(&path);
                (path, ident)
            })
            .collect();
        nodes.sort_by(|a, b| a.0.cmp(&b.0));
        self.rejected.retain_current(&nodes);

        for (path, ident) in nodes {
            if self.pads.is_full() {
                break;
            }
            if self.rejected.contains(&path, ident) || self.pads.find(|p| p.path == path).is_some() {
                continue;
            }
            match EvdevPad::open(&path) {
                Ok(Some(pad)) => {
                    let name = pad.record.meta.name.clone();
                    if let Some(id) = self.pads.insert(pad) {
                        log::debug!("gamepad {id} connected: {name} ({})", path.display());
                        ctx.push(GamepadEvent::connected(id, ctx.now_ms()));
                    }
                }
                Ok(None) => {
                    log::trace!("{}: not a gamepad", path.display());
                    self.rejected.insert(path, ident);
                }
                Err(e) => log::trace!("{}: cannot open: {e}", path.display()),
            }
        }
    }

    fn disconnect(&mut self, id: DeviceId, ctx: &PollCtx<'_>) {
        if let Some(mut pad) = self.pads.remove(id) {
            pad.release();
            log::debug!("gamepad {id} disconnected ({})", pad.path.display());
            ctx.push(GamepadEvent::disconnected(id, ctx.now_ms()));
        }
    }
}

impl Driver for EvdevDriver {
    fn open(env: DriverEnv) -> Result<Self> {
        let mut driver = Self {
            input_dir: env.config.input_dir.clone(),
            pads: DeviceArena::with_limit(MAX_DEVICES),
            rejected: RejectedNodes::default(),
        };
        driver.scan(&PollCtx::new(&env.queue, env.clock.as_ref()));
        Ok(driver)
    }

    fn poll(&mut self, ctx: &mut PollCtx<'_>) {
        self.scan(ctx);
        if self.pads.is_empty() {
            return;
        }

        let ids = self.pads.ids();
        let ready: Vec<(DeviceId, PollFlags)> = {
            let mut fds: Vec<PollFd<'_>> = self
                .pads
                .iter()
                .map(|(_, pad)| {
                    // SAFETY: the descriptor is owned by `pad.device`, which
                    // outlives this block.
                    let fd = unsafe { BorrowedFd::borrow_raw(pad.device.as_raw_fd()) };
                    PollFd::new(fd, PollFlags::POLLIN)
                })
                .collect();
            match poll(&mut fds, PollTimeout::ZERO) {
                Ok(0) => return,
                Ok(_) => ids
                    .iter()
                    .zip(fds.iter())
                    .filter_map(|(&id, fd)| fd.revents().filter(|r| !r.is_empty()).map(|r| (id, r)))
                    .collect(),
                Err(e) => {
                    log::warn!("poll failed: {e}");
                    return;
                }
            }
        };

        let lost = PollFlags::POLLERR | PollFlags::POLLHUP | PollFlags::POLLNVAL;
        for (id, revents) in ready {
            if revents.intersects(lost) {
                log::warn!("gamepad {id}: descriptor error {revents:?}");
                self.disconnect(id, ctx);
                continue;
            }
            if !revents.contains(PollFlags::POLLIN) {
                continue;
            }
            let t = ctx.now_ms();
            let mut out = Vec::new();
            let alive = match self.pads.get_mut(id) {
                Some(pad) => pad.drain(id, t, &mut out),
                None => continue,
            };
            ctx.extend(out);
            if !alive {
                self.disconnect(id, ctx);
            }
        }
    }

    fn tick_rumble(&mut self, now_ms: i64) {
        for (_, pad) in self.pads.iter_mut() {
            let mut motor = EvdevMotor {
                device: &mut pad.device,
                effect: &mut pad.effect,
            };
            pad.rumble.tick(&mut motor, now_ms);
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
        let mut motor = EvdevMotor {
            device: &mut pad.device,
            effect: &mut pad.effect,
        };
        pad.rumble.set(&mut motor, strong, weak, duration_ms, now_ms)
    }

    fn shutdown(&mut self) {
        for (id, mut pad) in self.pads.drain() {
            pad.release();
            log::debug!("gamepad {id} closed");
        }
        self.rejected.clear();
    }
}
