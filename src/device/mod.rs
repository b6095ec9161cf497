//! Joystick devices
//!
//! [`DeviceHandle`] owns the descriptor and capability snapshot of one open
//! device. Where that descriptor comes from is behind [`DeviceSource`], so the
//! session layer can run against the kernel driver ([`LinuxJoystickSource`]) or
//! any other readable fd that speaks the joystick event format.

pub mod handle;
pub mod linux;

pub use handle::{DeviceHandle, DeviceInfo, MAX_NAME_LEN, NAME_BUFFER_LEN};
pub use linux::{device_path, LinuxJoystickSource, DEFAULT_DEVICE_DIR};

use crate::error::JoystickError;

/// Opens joystick devices by index
pub trait DeviceSource: Send + Sync {
    /// Opens device `index` non-blocking and reads its capabilities
    fn open(&self, index: u32) -> Result<DeviceHandle, JoystickError>;
}
