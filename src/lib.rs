//! Linux joystick devices as asynchronously pollable, owner-monitored resources.
//!
//! Opens `/dev/input/js<N>`, caches its capabilities, and delivers decoded
//! events without ever blocking the caller. Waiting is left to a host
//! readiness multiplexer; see [`session`] for the resource lifecycle.

pub mod codec;
pub mod config;
pub mod device;
pub mod error;
pub mod invariant;
pub mod session;

pub use codec::{AxisScaling, EventKind, InputEvent, RawEvent, Rounding};
pub use config::Config;
pub use device::{DeviceHandle, DeviceInfo, DeviceSource, LinuxJoystickSource};
pub use error::{ConfigError, JoystickError, MultiplexerError};
pub use session::{
    Inbox, Notification, Owner, OwnerId, Readiness, ReadinessMultiplexer, Registry,
    ResourceHandle, TokioMultiplexer,
};
