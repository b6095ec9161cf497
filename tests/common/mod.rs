#![allow(dead_code)]

use joystick_session::session::{ReadyCallback, StopCallback};
use joystick_session::{
    DeviceHandle, DeviceInfo, DeviceSource, JoystickError, MultiplexerError, RawEvent,
    ReadinessMultiplexer,
};
use std::collections::HashMap;
use std::fs::File;
use std::io::{self, Read, Write};
use std::os::fd::{AsRawFd, OwnedFd, RawFd};
use std::os::unix::net::UnixStream;
use std::sync::{Arc, Mutex};

/// Multiplexer driven by the test: readiness fires only on [`ManualMultiplexer::fire`]
#[derive(Default)]
pub struct ManualMultiplexer {
    state: Mutex<ManualState>,
}

#[derive(Default)]
struct ManualState {
    pending: HashMap<RawFd, ReadyCallback>,
    deferred: Vec<StopCallback>,
    defer_stops: bool,
    registrations: usize,
    deregistrations: usize,
}

impl ManualMultiplexer {
    /// Confirms deregistration before `deregister` returns
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Holds deregistration confirmations until [`ManualMultiplexer::confirm_stops`]
    pub fn deferring() -> Arc<Self> {
        let mux = Self::default();
        mux.state.lock().unwrap().defer_stops = true;
        Arc::new(mux)
    }

    /// Delivers readiness for `fd`; false if nothing was registered
    pub fn fire(&self, fd: RawFd) -> bool {
        match self.take_pending(fd) {
            Some(on_ready) => {
                on_ready();
                true
            }
            None => false,
        }
    }

    /// Removes a pending callback without running it, as if already in flight
    pub fn take_pending(&self, fd: RawFd) -> Option<ReadyCallback> {
        self.state.lock().unwrap().pending.remove(&fd)
    }

    pub fn confirm_stops(&self) -> usize {
        let deferred = std::mem::take(&mut self.state.lock().unwrap().deferred);
        let count = deferred.len();
        for on_stopped in deferred {
            on_stopped();
        }
        count
    }

    pub fn is_registered(&self, fd: RawFd) -> bool {
        self.state.lock().unwrap().pending.contains_key(&fd)
    }

    pub fn pending(&self) -> usize {
        self.state.lock().unwrap().pending.len()
    }

    pub fn registrations(&self) -> usize {
        self.state.lock().unwrap().registrations
    }

    pub fn deregistrations(&self) -> usize {
        self.state.lock().unwrap().deregistrations
    }
}

impl ReadinessMultiplexer for ManualMultiplexer {
    fn register_read(&self, fd: RawFd, on_ready: ReadyCallback) -> Result<(), MultiplexerError> {
        let mut state = self.state.lock().unwrap();
        if state.pending.contains_key(&fd) {
            return Err(MultiplexerError::AlreadyRegistered(fd));
        }
        state.pending.insert(fd, on_ready);
        state.registrations += 1;
        Ok(())
    }

    fn deregister(&self, fd: RawFd, on_stopped: StopCallback) -> Result<(), MultiplexerError> {
        let cancelled = {
            let mut state = self.state.lock().unwrap();
            state.deregistrations += 1;
            let cancelled = state.pending.remove(&fd);
            if state.defer_stops {
                state.deferred.push(on_stopped);
                return Ok(());
            }
            cancelled
        };
        drop(cancelled);
        on_stopped();
        Ok(())
    }
}

struct PairDevice {
    fd: RawFd,
    writer: UnixStream,
}

/// Stands in for `/dev/input/js<N>`: each opened index is the read end of a
/// socket pair whose write end the test keeps
#[derive(Default)]
pub struct PairSource {
    infos: Mutex<HashMap<u32, DeviceInfo>>,
    devices: Mutex<HashMap<u32, PairDevice>>,
}

impl PairSource {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Makes `index` openable with the given capabilities
    pub fn plug(&self, index: u32, info: DeviceInfo) {
        self.infos.lock().unwrap().insert(index, info);
    }

    pub fn fd(&self, index: u32) -> RawFd {
        self.devices.lock().unwrap()[&index].fd
    }

    pub fn inject(&self, index: u32, event: RawEvent) {
        self.write_raw(index, &event.to_bytes());
    }

    pub fn write_raw(&self, index: u32, bytes: &[u8]) {
        let mut devices = self.devices.lock().unwrap();
        let device = devices.get_mut(&index).expect("device not opened");
        device.writer.write_all(bytes).expect("write to device");
    }

    /// True once the session side of the pair has been closed
    pub fn is_closed(&self, index: u32) -> bool {
        let mut devices = self.devices.lock().unwrap();
        let device = devices.get_mut(&index).expect("device not opened");
        let mut buf = [0u8; 1];
        match device.writer.read(&mut buf) {
            Ok(0) => true,
            Ok(_) => false,
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => false,
            Err(e) => panic!("unexpected error probing device: {}", e),
        }
    }
}

impl DeviceSource for PairSource {
    fn open(&self, index: u32) -> Result<DeviceHandle, JoystickError> {
        let info = self
            .infos
            .lock()
            .unwrap()
            .get(&index)
            .cloned()
            .ok_or_else(|| JoystickError::Os(io::Error::from_raw_os_error(libc::ENOENT)))?;

        let (reader, writer) = UnixStream::pair()?;
        reader.set_nonblocking(true)?;
        writer.set_nonblocking(true)?;
        let fd = reader.as_raw_fd();

        self.devices
            .lock()
            .unwrap()
            .insert(index, PairDevice { fd, writer });
        Ok(DeviceHandle::new(File::from(OwnedFd::from(reader)), info))
    }
}

pub fn test_pad() -> DeviceInfo {
    DeviceInfo::new("TestPad", 0x0100, 2, 8)
}
