//! Lifecycle monitor: ties resources to the owner that opened them
//!
//! An [`Owner`] stands for one logical process. Resources opened on its behalf
//! are bound to it weakly; when the owner terminates (the token is dropped,
//! usually because its task ended or panicked) every still-open resource goes
//! through the same stop path as an explicit [`Registry::stop`].
//!
//! Bindings never keep a resource alive, and a termination that races with or
//! follows an explicit stop is a no-op because stopping is idempotent.
//!
//! [`Registry::stop`]: super::Registry::stop

use super::registry::{ResourceEntry, ResourceHandle};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tokio::sync::mpsc;
use tracing::{debug, info};

/// Identity of a logical owner process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OwnerId(pub(super) u64);

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<owner {}>", self.0)
    }
}

/// Out-of-band messages delivered to an owner's [`Inbox`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notification {
    /// The armed resource became readable; drain it, then re-arm
    Readable(ResourceHandle),
}

/// Receiving side of an owner's notifications
pub type Inbox = mpsc::UnboundedReceiver<Notification>;

/// Termination watches, keyed by owner
#[derive(Default)]
pub(crate) struct Monitors {
    bindings: Mutex<HashMap<OwnerId, Vec<(ResourceHandle, Weak<ResourceEntry>)>>>,
}

impl Monitors {
    fn lock(&self) -> MutexGuard<'_, HashMap<OwnerId, Vec<(ResourceHandle, Weak<ResourceEntry>)>>> {
        self.bindings.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Starts watching `owner`
    pub(crate) fn watch(&self, owner: OwnerId) {
        self.lock().entry(owner).or_default();
    }

    /// Binds `entry` to `owner`; returns `false` if the owner already terminated
    pub(crate) fn bind(
        &self,
        owner: OwnerId,
        handle: ResourceHandle,
        entry: &Arc<ResourceEntry>,
    ) -> bool {
        let mut bindings = self.lock();
        match bindings.get_mut(&owner) {
            Some(list) => {
                list.retain(|(_, weak)| weak.strong_count() > 0);
                list.push((handle, Arc::downgrade(entry)));
                debug!("Bound {} to {}", handle, owner);
                true
            }
            None => false,
        }
    }

    pub(crate) fn unbind(&self, owner: OwnerId, handle: ResourceHandle) {
        if let Some(list) = self.lock().get_mut(&owner) {
            list.retain(|(h, _)| *h != handle);
        }
    }

    /// Termination of `owner`: stops every resource still bound to it
    ///
    /// Returns how many resources were actually stopped by this call.
    pub(crate) fn owner_down(&self, owner: OwnerId) -> usize {
        let bound = self.lock().remove(&owner).unwrap_or_default();
        info!("Owner {} down, {} binding(s)", owner, bound.len());

        bound
            .into_iter()
            .filter_map(|(_, weak)| weak.upgrade())
            .filter(|entry| entry.request_stop())
            .count()
    }

    pub(crate) fn bound(&self, owner: OwnerId) -> usize {
        self.lock()
            .get(&owner)
            .map(|list| list.iter().filter(|(_, w)| w.strong_count() > 0).count())
            .unwrap_or(0)
    }
}

/// A logical owner process
///
/// Not clonable: dropping it, or calling [`Owner::terminate`], is the owner's
/// termination.
pub struct Owner {
    id: OwnerId,
    sender: mpsc::UnboundedSender<Notification>,
    monitors: Arc<Monitors>,
}

impl Owner {
    pub(crate) fn new(id: OwnerId, monitors: Arc<Monitors>) -> (Self, Inbox) {
        let (sender, inbox) = mpsc::unbounded_channel();
        monitors.watch(id);
        (
            Self {
                id,
                sender,
                monitors,
            },
            inbox,
        )
    }

    pub fn id(&self) -> OwnerId {
        self.id
    }

    /// Whether termination of this owner is reported to `monitors`
    pub(crate) fn watched_by(&self, monitors: &Arc<Monitors>) -> bool {
        Arc::ptr_eq(&self.monitors, monitors)
    }

    pub(crate) fn sender(&self) -> mpsc::UnboundedSender<Notification> {
        self.sender.clone()
    }

    /// Terminates the owner now instead of at drop
    pub fn terminate(self) {}
}

impl fmt::Debug for Owner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Owner").field("id", &self.id).finish()
    }
}

impl Drop for Owner {
    fn drop(&mut self) {
        let stopped = self.monitors.owner_down(self.id);
        if stopped > 0 {
            info!("Stopped {} resource(s) left open by {}", stopped, self.id);
        }
    }
}
