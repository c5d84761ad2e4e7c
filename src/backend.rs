//! The consumer-facing backend.
//!
//! [`Backend`] composes one [`Driver`] with the event queue, a clock and the
//! configuration. Queries for unknown ids never fail; they return sentinels:
//!
//! | query            | sentinel |
//! |------------------|----------|
//! | `name`           | `""`     |
//! | `uuid_simple`    | `""`     |
//! | `vendor_id`      | `-1`     |
//! | `product_id`     | `-1`     |
//! | `axes`/`buttons` | empty    |
//! | `axis_range`     | `None`   |
//! | `is_ff_supported`, `set_rumble` | `false` |
//!
//! # Example
//! ```no_run
//! use padbridge::Backend;
//!
//! let mut backend = Backend::new().expect("open gamepad backend");
//! loop {
//!     backend.poll(16);
//!     while let Some(ev) = backend.next_event() {
//!         println!("{:?}", ev);
//!     }
//! }
//! ```

use crate::backends::PlatformDriver;
use crate::clock::{Clock, SystemClock};
use crate::codes::LogicalCode;
use crate::config::BackendConfig;
use crate::device::DeviceRecord;
use crate::driver::{Driver, DriverEnv, PollCtx};
use crate::error::Result;
use crate::event::{encode_event, GamepadEvent};
use crate::queue::SharedEventQueue;
use crate::registry::DeviceId;
use std::sync::Arc;
use std::time::{Duration, Instant};

pub struct Backend<D: Driver = PlatformDriver> {
    driver: D,
    queue: Arc<SharedEventQueue>,
    clock: Arc<dyn Clock>,
    config: BackendConfig,
    closed: bool,
}

impl Backend<PlatformDriver> {
    /// Open the platform driver with default configuration.
    pub fn new() -> Result<Self> {
        Self::with_config(BackendConfig::default())
    }
}

impl<D: Driver> Backend<D> {
    /// Open `D` with `config`. The driver type is not inferred from the
    /// default parameter, so name it:
    ///
    /// ```no_run
    /// use padbridge::backends::PlatformDriver;
    /// use padbridge::{Backend, BackendConfig};
    ///
    /// let config = BackendConfig { queue_capacity: 256, ..Default::default() };
    /// let backend = Backend::<PlatformDriver>::with_config(config)?;
    /// # Ok::<(), padbridge::BackendError>(())
    /// ```
    pub fn with_config(config: BackendConfig) -> Result<Self> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Open with an explicit clock; tests pass a [`ManualClock`](crate::clock::ManualClock).
    pub fn with_clock(config: BackendConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        let queue = Arc::new(SharedEventQueue::with_capacity(config.effective_capacity()));
        let driver = D::open(DriverEnv {
            config: config.clone(),
            queue: Arc::clone(&queue),
            clock: Arc::clone(&clock),
        })?;
        log::debug!("backend open, queue capacity {}", queue.capacity());
        Ok(Self {
            driver,
            queue,
            clock,
            config,
            closed: false,
        })
    }

    /// Run one rumble tick, then decode until an event is queued or the
    /// timeout passes.
    ///
    /// - `timeout_ms == 0`: a single decode pass.
    /// - `timeout_ms < 0`: keep decoding until an event is queued.
    /// - `timeout_ms > 0`: keep decoding for at most that long.
    pub fn poll(&mut self, timeout_ms: i32) {
        if self.closed {
            return;
        }
        self.driver.tick_rumble(self.clock.now_ms());

        let deadline = (timeout_ms > 0).then(|| Instant::now() + Duration::from_millis(timeout_ms as u64));
        let slice = self.config.granularity_ms();
        loop {
            {
                let mut ctx = PollCtx::new(&self.queue, self.clock.as_ref());
                self.driver.poll(&mut ctx);
            }
            if timeout_ms == 0 || !self.queue.is_empty() {
                return;
            }
            let wait = match deadline {
                None => slice,
                Some(deadline) => {
                    let left = deadline.saturating_duration_since(Instant::now());
                    if left.is_zero() {
                        return;
                    }
                    (left.as_millis().max(1) as i32).min(slice)
                }
            };
            self.driver.wait(&self.queue, wait);
        }
    }

    pub fn next_event(&mut self) -> Option<GamepadEvent> {
        self.queue.pop()
    }

    /// Next event as a 32-byte wire record, or an empty buffer.
    pub fn next_event_bytes(&mut self) -> Vec<u8> {
        encode_event(self.next_event())
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    pub fn gamepad_count(&self) -> i32 {
        self.driver.gamepad_count() as i32
    }

    /// Owned snapshot of a connected device.
    pub fn device(&self, id: DeviceId) -> Option<DeviceRecord> {
        self.driver.device(id)
    }

    pub fn name(&self, id: DeviceId) -> String {
        self.device(id).map(|d| d.meta.name).unwrap_or_default()
    }

    pub fn uuid_simple(&self, id: DeviceId) -> String {
        self.device(id).map(|d| d.meta.uuid_simple()).unwrap_or_default()
    }

    pub fn vendor_id(&self, id: DeviceId) -> i32 {
        self.device(id).map_or(-1, |d| d.meta.vendor_id as i32)
    }

    pub fn product_id(&self, id: DeviceId) -> i32 {
        self.device(id).map_or(-1, |d| d.meta.product_id as i32)
    }

    pub fn is_ff_supported(&self, id: DeviceId) -> bool {
        self.config.rumble && self.device(id).is_some_and(|d| d.ff_supported)
    }

    pub fn axes(&self, id: DeviceId) -> Vec<LogicalCode> {
        self.device(id).map(|d| d.capabilities.axes).unwrap_or_default()
    }

    pub fn buttons(&self, id: DeviceId) -> Vec<LogicalCode> {
        self.device(id).map(|d| d.capabilities.buttons).unwrap_or_default()
    }

    pub fn axis_range(&self, id: DeviceId, code: LogicalCode) -> Option<(i32, i32)> {
        self.device(id)?.capabilities.axis_range(code)
    }

    /// Start or stop rumble. See [`RumbleController::set`](crate::rumble::RumbleController::set).
    pub fn set_rumble(&mut self, id: DeviceId, strong: f64, weak: f64, duration_ms: i32) -> bool {
        if self.closed || !self.config.rumble {
            return false;
        }
        let now = self.clock.now_ms();
        self.driver.set_rumble(id, strong, weak, duration_ms, now)
    }

    /// Stop background work and release every device handle. Idempotent.
    pub fn shutdown(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.driver.shutdown();
        log::debug!("backend shut down");
    }

    pub fn config(&self) -> &BackendConfig {
        &self.config
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub fn driver_mut(&mut self) -> &mut D {
        &mut self.driver
    }
}

impl<D: Driver> Drop for Backend<D> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
