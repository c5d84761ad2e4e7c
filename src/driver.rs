//! The seam between the portable backend and one platform.
//!
//! A [`Driver`] owns every hardware handle. It pushes finished events into the
//! shared queue through a [`PollCtx`] and answers metadata queries with owned
//! [`DeviceRecord`] clones. Exactly one platform driver is compiled in and
//! aliased as [`PlatformDriver`](crate::backends::PlatformDriver).

use crate::clock::Clock;
use crate::config::BackendConfig;
use crate::device::DeviceRecord;
use crate::error::Result;
use crate::event::GamepadEvent;
use crate::queue::SharedEventQueue;
use crate::registry::DeviceId;
use std::sync::Arc;
use std::time::Duration;

/// Everything a driver needs at construction.
#[derive(Clone)]
pub struct DriverEnv {
    pub config: BackendConfig,
    pub queue: Arc<SharedEventQueue>,
    pub clock: Arc<dyn Clock>,
}

/// Per-pass handle given to [`Driver::poll`].
pub struct PollCtx<'a> {
    queue: &'a SharedEventQueue,
    clock: &'a dyn Clock,
}

impl<'a> PollCtx<'a> {
    pub fn new(queue: &'a SharedEventQueue, clock: &'a dyn Clock) -> Self {
        Self { queue, clock }
    }

    /// Timestamp for the current decode step.
    pub fn now_ms(&self) -> i64 {
        self.clock.now_ms()
    }

    pub fn push(&self, ev: GamepadEvent) {
        self.queue.push(ev);
    }

    /// Push a decode step's events in order.
    pub fn extend(&self, events: Vec<GamepadEvent>) {
        if !events.is_empty() {
            self.queue.extend(events);
        }
    }
}

pub trait Driver: Send {
    /// Open the platform and report devices already present.
    fn open(env: DriverEnv) -> Result<Self>
    where
        Self: Sized;

    /// One synchronous decode pass.
    fn poll(&mut self, ctx: &mut PollCtx<'_>);

    /// Block for up to `timeout_ms` between decode passes.
    ///
    /// The default sleeps. Drivers with a producer thread wait on the queue
    /// instead so a push wakes the consumer early.
    fn wait(&mut self, queue: &SharedEventQueue, timeout_ms: i32) {
        let _ = queue;
        if timeout_ms > 0 {
            std::thread::sleep(Duration::from_millis(timeout_ms as u64));
        }
    }

    /// Stop rumble effects whose expiry is at or before `now_ms`.
    fn tick_rumble(&mut self, now_ms: i64);

    fn gamepad_count(&self) -> usize;

    fn device(&self, id: DeviceId) -> Option<DeviceRecord>;

    /// Start, update or stop rumble. `false` for unknown or incapable devices.
    fn set_rumble(&mut self, id: DeviceId, strong: f64, weak: f64, duration_ms: i32, now_ms: i64) -> bool;

    /// Release every handle. Must be idempotent.
    fn shutdown(&mut self);
}
