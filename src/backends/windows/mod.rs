#![cfg(target_os = "windows")]

//! Windows driver over the four XInput slots.
//!
//! Every poll queries all slots. Connection and disconnection are inferred
//! from the per-slot status, and [`gamepad_count`](Driver::gamepad_count) is the
//! number of slots that answered on the last pass.

pub mod xinput_devices;

use crate::device::DeviceRecord;
use crate::driver::{Driver, DriverEnv, PollCtx};
use crate::error::Result;
use crate::event::GamepadEvent;
use crate::registry::DeviceId;

use xinput_devices::{SlotChange, XInputSlot, SLOT_COUNT};

pub struct XInputDriver {
    slots: Vec<XInputSlot>,
}

impl XInputDriver {
    fn slot_mut(&mut self, id: DeviceId) -> Option<&mut XInputSlot> {
        self.slots.get_mut(id as usize).filter(|s| s.is_connected())
    }

    fn poll_slots(&mut self, ctx: &PollCtx<'_>) {
        for slot in &mut self.slots {
            let t = ctx.now_ms();
            let mut out = Vec::new();
            match slot.poll(t, &mut out) {
                SlotChange::Connected => {
                    log::debug!("xinput slot {} connected", slot.id());
                    ctx.push(GamepadEvent::connected(slot.id(), t));
                }
                SlotChange::Disconnected => {
                    log::debug!("xinput slot {} disconnected", slot.id());
                    ctx.push(GamepadEvent::disconnected(slot.id(), t));
                }
                SlotChange::None => ctx.extend(out),
            }
        }
    }
}

impl Driver for XInputDriver {
    fn open(env: DriverEnv) -> Result<Self> {
        let mut driver = Self {
            slots: (0..SLOT_COUNT).map(XInputSlot::new).collect(),
        };
        driver.poll_slots(&PollCtx::new(&env.queue, env.clock.as_ref()));
        Ok(driver)
    }

    fn poll(&mut self, ctx: &mut PollCtx<'_>) {
        self.poll_slots(ctx);
    }

    fn tick_rumble(&mut self, now_ms: i64) {
        for slot in &mut self.slots {
            slot.tick_rumble(now_ms);
        }
    }

    fn gamepad_count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_connected()).count()
    }

    fn device(&self, id: DeviceId) -> Option<DeviceRecord> {
        self.slots.get(id as usize)?.record().cloned()
    }

    fn set_rumble(&mut self, id: DeviceId, strong: f64, weak: f64, duration_ms: i32, now_ms: i64) -> bool {
        self.slot_mut(id)
            .is_some_and(|slot| slot.set_rumble(strong, weak, duration_ms, now_ms))
    }

    fn shutdown(&mut self) {
        for slot in &mut self.slots {
            slot.close();
        }
    }
}
