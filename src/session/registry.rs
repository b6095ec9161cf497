//! Resource registry
//!
//! Callers never touch a device directly. They hold [`ResourceHandle`]s, plain
//! ids that the registry resolves on every call. An id that was never issued,
//! or whose references were all released, resolves to
//! [`JoystickError::InvalidHandle`].
//!
//! Each entry lives as long as its longest holder: caller references counted
//! by the registry, plus the pending multiplexer callback while armed or
//! closing. Owner bindings are weak. The descriptor is closed when the entry
//! is stopped, or at the latest when the last holder lets go.

use super::monitor::{Inbox, Monitors, Notification, Owner, OwnerId};
use super::multiplexer::ReadinessMultiplexer;
use super::notifier::Readiness;
use crate::codec::{AxisScaling, InputEvent};
use crate::config::Config;
use crate::device::{DeviceHandle, DeviceInfo, DeviceSource, LinuxJoystickSource};
use crate::error::JoystickError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Opaque reference to an open joystick session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceHandle(u64);

impl ResourceHandle {
    /// Raw id, for hosts that pass handles through foreign code
    pub fn as_raw(self) -> u64 {
        self.0
    }

    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for ResourceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#Joystick<{}>", self.0)
    }
}

pub(crate) struct EntryState {
    pub(crate) device: DeviceHandle,
    pub(crate) readiness: Readiness,
}

/// One open device plus its readiness state
pub(crate) struct ResourceEntry {
    pub(crate) handle: ResourceHandle,
    pub(crate) owner: OwnerId,
    pub(crate) info: DeviceInfo,
    pub(crate) scaling: AxisScaling,
    pub(crate) multiplexer: Arc<dyn ReadinessMultiplexer>,
    pub(crate) notify: mpsc::UnboundedSender<Notification>,
    state: Mutex<EntryState>,
}

impl ResourceEntry {
    pub(crate) fn lock(&self) -> MutexGuard<'_, EntryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for ResourceEntry {
    fn drop(&mut self) {
        let state = self.state.get_mut().unwrap_or_else(PoisonError::into_inner);
        if state.device.raw_fd().is_some() {
            debug!("{} destroyed while open, closing fd", self.handle);
            state.device.close();
        }
        info!("Destroyed {} ({})", self.handle, self.info.name);
    }
}

struct Slot {
    entry: Arc<ResourceEntry>,
    refs: usize,
}

struct Inner {
    source: Arc<dyn DeviceSource>,
    multiplexer: Arc<dyn ReadinessMultiplexer>,
    scaling: AxisScaling,
    slots: Mutex<HashMap<ResourceHandle, Slot>>,
    monitors: Arc<Monitors>,
    next_handle: AtomicU64,
    next_owner: AtomicU64,
}

/// Caller-owned table of joystick sessions
///
/// Created once at startup; clones share the same table.
#[derive(Clone)]
pub struct Registry {
    inner: Arc<Inner>,
}

impl Registry {
    pub fn new(
        source: Arc<dyn DeviceSource>,
        multiplexer: Arc<dyn ReadinessMultiplexer>,
        scaling: AxisScaling,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                source,
                multiplexer,
                scaling,
                slots: Mutex::new(HashMap::new()),
                monitors: Arc::new(Monitors::default()),
                next_handle: AtomicU64::new(1),
                next_owner: AtomicU64::new(1),
            }),
        }
    }

    /// Registry over `/dev/input/js*` as described by `config`
    pub fn linux(config: &Config, multiplexer: Arc<dyn ReadinessMultiplexer>) -> Self {
        Self::new(
            Arc::new(LinuxJoystickSource::new(config.device_dir.clone())),
            multiplexer,
            config.axis,
        )
    }

    fn slots(&self) -> MutexGuard<'_, HashMap<ResourceHandle, Slot>> {
        self.inner.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn resolve(&self, handle: ResourceHandle) -> Result<Arc<ResourceEntry>, JoystickError> {
        self.slots()
            .get(&handle)
            .map(|slot| Arc::clone(&slot.entry))
            .ok_or(JoystickError::InvalidHandle(handle))
    }

    /// Creates a new owner and the inbox its notifications arrive in
    pub fn new_owner(&self) -> (Owner, Inbox) {
        let id = OwnerId(self.inner.next_owner.fetch_add(1, Ordering::Relaxed));
        debug!("New owner {}", id);
        Owner::new(id, Arc::clone(&self.inner.monitors))
    }

    /// Runs `f` as a tokio task that owns a fresh [`Owner`]
    ///
    /// When the task finishes or panics, the owner terminates and any resource
    /// it left open is stopped.
    pub fn spawn_owned<F, Fut>(&self, f: F) -> JoinHandle<Fut::Output>
    where
        F: FnOnce(Owner, Inbox) -> Fut,
        Fut: Future + Send + 'static,
        Fut::Output: Send + 'static,
    {
        let (owner, inbox) = self.new_owner();
        tokio::spawn(f(owner, inbox))
    }

    /// Opens joystick `index` on behalf of `owner`
    ///
    /// The returned handle carries one reference.
    pub fn open(&self, index: u32, owner: &Owner) -> Result<ResourceHandle, JoystickError> {
        if !owner.watched_by(&self.inner.monitors) {
            return Err(JoystickError::ForeignOwner(owner.id()));
        }
        let device = self.inner.source.open(index)?;
        self.wrap(device, owner)
    }

    /// Registers an already opened device on behalf of `owner`
    ///
    /// Fails with [`JoystickError::ForeignOwner`] if `owner` came from another
    /// registry; the device is closed in that case.
    pub fn wrap(
        &self,
        device: DeviceHandle,
        owner: &Owner,
    ) -> Result<ResourceHandle, JoystickError> {
        if !owner.watched_by(&self.inner.monitors) {
            warn!("Refusing {} from another registry", owner.id());
            return Err(JoystickError::ForeignOwner(owner.id()));
        }

        let handle = ResourceHandle(self.inner.next_handle.fetch_add(1, Ordering::Relaxed));
        let entry = Arc::new(ResourceEntry {
            handle,
            owner: owner.id(),
            info: device.info(),
            scaling: self.inner.scaling,
            multiplexer: Arc::clone(&self.inner.multiplexer),
            notify: owner.sender(),
            state: Mutex::new(EntryState {
                device,
                readiness: Readiness::Unarmed,
            }),
        });

        if !self.inner.monitors.bind(owner.id(), handle, &entry) {
            return Err(JoystickError::ForeignOwner(owner.id()));
        }
        self.slots().insert(handle, Slot { entry, refs: 1 });
        info!("Registered {} for {}", handle, owner.id());
        Ok(handle)
    }

    /// Adds a caller reference
    pub fn retain(&self, handle: ResourceHandle) -> Result<(), JoystickError> {
        let mut slots = self.slots();
        let slot = slots
            .get_mut(&handle)
            .ok_or(JoystickError::InvalidHandle(handle))?;
        slot.refs += 1;
        Ok(())
    }

    /// Drops a caller reference
    ///
    /// After the last one the handle stops resolving. The entry itself is
    /// finalized once a pending readiness registration, if any, lets go too.
    /// The owner binding stays, so termination of the owner still stops an
    /// entry kept alive by such a registration.
    pub fn release(&self, handle: ResourceHandle) -> Result<(), JoystickError> {
        let released = {
            let mut slots = self.slots();
            let slot = slots
                .get_mut(&handle)
                .ok_or(JoystickError::InvalidHandle(handle))?;
            slot.refs -= 1;
            if slot.refs > 0 {
                return Ok(());
            }
            slots.remove(&handle)
        };

        if released.is_some() {
            debug!("Last caller reference to {} released", handle);
        }
        Ok(())
    }

    /// Stops the resource: cancels readiness interest and closes the fd
    ///
    /// Idempotent; stopping a stopped resource succeeds without effect.
    pub fn stop(&self, handle: ResourceHandle) -> Result<(), JoystickError> {
        let entry = self.resolve(handle)?;
        if entry.request_stop() {
            self.inner.monitors.unbind(entry.owner, handle);
        } else {
            debug!("{} already stopped", handle);
        }
        Ok(())
    }

    /// Requests one [`Notification::Readable`] for this resource
    pub fn arm(&self, handle: ResourceHandle) -> Result<(), JoystickError> {
        self.resolve(handle)?.arm()
    }

    /// Reads one event without blocking
    pub fn drain(&self, handle: ResourceHandle) -> Result<InputEvent, JoystickError> {
        self.resolve(handle)?.drain()
    }

    /// Capability snapshot, also served after stop
    pub fn info(&self, handle: ResourceHandle) -> Result<DeviceInfo, JoystickError> {
        Ok(self.resolve(handle)?.info.clone())
    }

    pub fn readiness(&self, handle: ResourceHandle) -> Result<Readiness, JoystickError> {
        Ok(self.resolve(handle)?.readiness())
    }

    /// Owner the resource was opened for
    pub fn owner_of(&self, handle: ResourceHandle) -> Result<OwnerId, JoystickError> {
        Ok(self.resolve(handle)?.owner)
    }

    /// Live resources bound to `owner`
    pub fn bound_to(&self, owner: OwnerId) -> usize {
        self.inner.monitors.bound(owner)
    }

    /// Number of handles that still resolve
    pub fn len(&self) -> usize {
        self.slots().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("handles", &self.len())
            .field("scaling", &self.inner.scaling)
            .finish()
    }
}
