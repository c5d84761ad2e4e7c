//! padbridge: native gamepad backend.
//!
//! Discovers gamepads through the platform's native API (IOKit HID on macOS,
//! evdev on Linux, XInput on Windows), normalizes their input into a single
//! logical event model and exposes rumble, all behind a small polling API and
//! a C ABI.
//!
//! ```no_run
//! use padbridge::{Backend, EventKind};
//!
//! let mut backend = Backend::new()?;
//! backend.poll(100);
//! while let Some(ev) = backend.next_event() {
//!     if ev.kind == EventKind::Connected {
//!         println!("{} connected", backend.name(ev.device_id));
//!     }
//! }
//! # Ok::<(), padbridge::BackendError>(())
//! ```

pub mod backend;
pub mod backends;
pub mod capabilities;
pub mod clock;
pub mod codes;
pub mod config;
pub mod device;
pub mod driver;
pub mod error;
pub mod event;
pub mod ffi;
pub mod hid;
pub mod metadata;
pub mod normalize;
pub mod queue;
pub mod registry;
pub mod rumble;

pub use backend::Backend;
pub use capabilities::DeviceCapabilities;
pub use clock::{Clock, ManualClock, SystemClock};
pub use codes::LogicalCode;
pub use config::BackendConfig;
pub use device::DeviceRecord;
pub use driver::Driver;
pub use error::{BackendError, Result};
pub use event::{EventKind, GamepadEvent, WIRE_EVENT_LEN};
pub use metadata::DeviceMeta;
pub use registry::DeviceId;
