//! Linux joystick API (`/dev/input/jsN`) opener
//!
//! Opening goes through a small typestate pipeline so a handle can only be
//! produced once every capability query succeeded:
//!
//! ```text
//! DeviceProbe<Opened> ─query_capabilities()─► DeviceProbe<Probed> ─into_handle()─► DeviceHandle
//! ```

use super::handle::{DeviceHandle, DeviceInfo, NAME_BUFFER_LEN};
use super::DeviceSource;
use crate::error::JoystickError;
use statum::{machine, state};
use std::fs::{File, OpenOptions};
use std::os::fd::AsRawFd;
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Directory holding the `js<N>` nodes on a stock system
pub const DEFAULT_DEVICE_DIR: &str = "/dev/input";

// <linux/joystick.h>
mod ioctl {
    nix::ioctl_read!(jsiocgversion, b'j', 0x01, u32);
    nix::ioctl_read!(jsiocgaxes, b'j', 0x11, u8);
    nix::ioctl_read!(jsiocgbuttons, b'j', 0x12, u8);
    nix::ioctl_read_buf!(jsiocgname, b'j', 0x13, u8);
}

/// Path of joystick `index` below `dir`
pub fn device_path(dir: &Path, index: u32) -> PathBuf {
    dir.join(format!("js{}", index))
}

#[state]
#[derive(Debug, Clone)]
pub enum ProbeState {
    Opened, // fd acquired, capabilities unknown
    Probed, // all four capability queries answered
}

#[machine]
#[derive(Debug)]
pub struct DeviceProbe<S: ProbeState> {
    path: PathBuf,
    file: File,
    info: DeviceInfo,
}

impl DeviceProbe<Opened> {
    /// Opens `path` read-only and non-blocking
    ///
    /// The OS error is returned as is.
    pub fn open(path: &Path) -> Result<Self, JoystickError> {
        debug!("Opening joystick device {}", path.display());
        let file = OpenOptions::new()
            .read(true)
            .custom_flags(libc::O_NONBLOCK)
            .open(path)?;

        Ok(Self::new(path.to_path_buf(), file, DeviceInfo::default()))
    }

    /// Runs the name/version/axes/buttons ioctls
    pub fn query_capabilities(mut self) -> Result<DeviceProbe<Probed>, JoystickError> {
        let fd = self.file.as_raw_fd();

        let mut name = [0u8; NAME_BUFFER_LEN];
        let mut version: u32 = 0;
        let mut axes: u8 = 0;
        let mut buttons: u8 = 0;

        // SAFETY: fd is open for the lifetime of `self.file`; every pointer
        // refers to a local of the size encoded in the request.
        unsafe {
            ioctl::jsiocgname(fd, &mut name)?;
            ioctl::jsiocgversion(fd, &mut version)?;
            ioctl::jsiocgaxes(fd, &mut axes)?;
            ioctl::jsiocgbuttons(fd, &mut buttons)?;
        }

        self.info = DeviceInfo {
            name: DeviceInfo::name_from_buffer(&name),
            version,
            axes,
            buttons,
        };
        Ok(self.transition())
    }
}

impl DeviceProbe<Probed> {
    pub fn into_handle(self) -> DeviceHandle {
        info!(
            "Opened: {} Version: 0x{:04X} Buttons: {} Axes: {} ({})",
            self.info.name,
            self.info.version,
            self.info.buttons,
            self.info.axes,
            self.path.display()
        );
        DeviceHandle::new(self.file, self.info)
    }
}

/// [`DeviceSource`] backed by the kernel joystick driver
#[derive(Debug, Clone)]
pub struct LinuxJoystickSource {
    device_dir: PathBuf,
}

impl LinuxJoystickSource {
    pub fn new(device_dir: impl Into<PathBuf>) -> Self {
        Self {
            device_dir: device_dir.into(),
        }
    }

    pub fn device_dir(&self) -> &Path {
        &self.device_dir
    }
}

impl Default for LinuxJoystickSource {
    fn default() -> Self {
        Self::new(DEFAULT_DEVICE_DIR)
    }
}

impl DeviceSource for LinuxJoystickSource {
    fn open(&self, index: u32) -> Result<DeviceHandle, JoystickError> {
        let path = device_path(&self.device_dir, index);
        let probe = DeviceProbe::open(&path)?.query_capabilities()?;
        Ok(probe.into_handle())
    }
}
