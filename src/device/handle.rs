//! Open device descriptor plus its cached capabilities

use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{self, Read};
use std::os::fd::{AsRawFd, RawFd};
use tracing::debug;

/// Name buffer handed to `JSIOCGNAME`, including the terminator
pub const NAME_BUFFER_LEN: usize = 256;

/// Longest device name kept, in bytes
pub const MAX_NAME_LEN: usize = NAME_BUFFER_LEN - 1;

/// Capability snapshot of a joystick device
///
/// Taken once at open and never refreshed; callers get a copy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    /// Device name as reported by the driver, at most [`MAX_NAME_LEN`] bytes
    pub name: String,
    /// Joystick driver protocol version (e.g. `0x020100`)
    pub version: u32,
    /// Number of axes
    pub axes: u8,
    /// Number of buttons
    pub buttons: u8,
}

impl DeviceInfo {
    /// Builds a snapshot, cutting `name` down to [`MAX_NAME_LEN`] bytes
    pub fn new(name: impl Into<String>, version: u32, axes: u8, buttons: u8) -> Self {
        Self {
            name: truncate_name(name.into()),
            version,
            axes,
            buttons,
        }
    }

    /// Decodes a NUL-terminated name buffer as filled in by the driver
    pub fn name_from_buffer(buf: &[u8]) -> String {
        let end = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
        let bytes = &buf[..end.min(MAX_NAME_LEN)];
        truncate_name(String::from_utf8_lossy(bytes).into_owned())
    }
}

fn truncate_name(mut name: String) -> String {
    if name.len() > MAX_NAME_LEN {
        let mut end = MAX_NAME_LEN;
        while !name.is_char_boundary(end) {
            end -= 1;
        }
        name.truncate(end);
    }
    name
}

/// An open joystick file descriptor and the capabilities read from it
///
/// `open` flips from true to false exactly once ([`DeviceHandle::mark_closing`]).
/// The descriptor itself is only released by [`DeviceHandle::close`], which the
/// session calls after the multiplexer confirmed it no longer watches the fd.
#[derive(Debug)]
pub struct DeviceHandle {
    file: Option<File>,
    open: bool,
    info: DeviceInfo,
}

impl DeviceHandle {
    /// Wraps an already opened, non-blocking descriptor
    pub fn new(file: File, info: DeviceInfo) -> Self {
        Self {
            file: Some(file),
            open: true,
            info,
        }
    }

    /// Cached capability snapshot; still valid after close
    pub fn info(&self) -> DeviceInfo {
        self.info.clone()
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Raw descriptor while it has not been released
    pub fn raw_fd(&self) -> Option<RawFd> {
        self.file.as_ref().map(AsRawFd::as_raw_fd)
    }

    /// Flips the open flag; returns `true` only for the first caller
    pub fn mark_closing(&mut self) -> bool {
        std::mem::replace(&mut self.open, false)
    }

    /// Releases the descriptor. Later calls are no-ops.
    pub fn close(&mut self) {
        self.open = false;
        if let Some(file) = self.file.take() {
            debug!(fd = file.as_raw_fd(), name = %self.info.name, "Closing joystick fd");
        }
    }

    /// One `read(2)` into `buf`; never retried
    pub fn read_into(&self, buf: &mut [u8]) -> io::Result<usize> {
        match self.file.as_ref() {
            Some(mut file) => file.read(buf),
            None => Err(io::Error::from_raw_os_error(libc::EBADF)),
        }
    }
}
