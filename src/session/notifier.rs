//! Readiness notifier
//!
//! Per-resource state machine bridging one-shot multiplexer registrations into
//! [`Notification::Readable`] messages:
//!
//! ```text
//! Unarmed ──arm──► Armed ──(readable)──► Unarmed      (caller re-arms)
//!    │               │
//!    └─────stop──────┴──► Closing ──(deregistered)──► Closed
//! ```
//!
//! Arming never blocks and never re-arms on its own. Arming an armed resource
//! is a no-op, so the multiplexer sees at most one registration per fd.

use super::monitor::Notification;
use super::registry::ResourceEntry;
use crate::assert_invariant;
use crate::codec::{self, InputEvent};
use crate::error::JoystickError;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Readiness {
    Unarmed,
    Armed,
    Closing,
    Closed,
}

impl ResourceEntry {
    /// Registers for the next read readiness
    pub(crate) fn arm(self: &Arc<Self>) -> Result<(), JoystickError> {
        let mut state = self.lock();
        match state.readiness {
            Readiness::Armed => {
                debug!("{} already armed", self.handle);
                return Ok(());
            }
            Readiness::Closing | Readiness::Closed => {
                return Err(JoystickError::Closed(self.handle))
            }
            Readiness::Unarmed => {}
        }
        let fd = state.device.raw_fd().ok_or(JoystickError::Closed(self.handle))?;

        // Held across the call: a concurrent stop must see the registration.
        let entry = Arc::clone(self);
        assert_invariant!(self
            .multiplexer
            .register_read(fd, Box::new(move || entry.on_ready())));
        state.readiness = Readiness::Armed;
        debug!(fd, "Armed {}", self.handle);
        Ok(())
    }

    fn on_ready(&self) {
        let mut state = self.lock();
        if state.readiness != Readiness::Armed {
            debug!("Ignoring readiness for {} in state {:?}", self.handle, state.readiness);
            return;
        }
        state.readiness = Readiness::Unarmed;
        drop(state);

        if self.notify.send(Notification::Readable(self.handle)).is_err() {
            warn!("Owner inbox for {} is gone, readiness dropped", self.handle);
        }
    }

    /// Starts teardown; only the first call has any effect
    ///
    /// Returns whether this call initiated the stop.
    pub(crate) fn request_stop(self: &Arc<Self>) -> bool {
        let fd = {
            let mut state = self.lock();
            if !state.device.mark_closing() {
                return false;
            }
            state.readiness = Readiness::Closing;
            state.device.raw_fd()
        };

        match fd {
            Some(fd) => {
                info!("Closing fd={} ({})", fd, self.handle);
                // Lock released: deregister may confirm synchronously.
                let entry = Arc::clone(self);
                assert_invariant!(self
                    .multiplexer
                    .deregister(fd, Box::new(move || entry.on_stopped())));
            }
            None => self.on_stopped(),
        }
        true
    }

    fn on_stopped(&self) {
        let mut state = self.lock();
        state.device.close();
        state.readiness = Readiness::Closed;
        debug!("{} closed", self.handle);
    }

    /// Reads one event; the resource must still be open
    pub(crate) fn drain(&self) -> Result<InputEvent, JoystickError> {
        let state = self.lock();
        if !state.device.is_open() {
            return Err(JoystickError::Closed(self.handle));
        }
        codec::read(&state.device, &self.scaling)
    }

    pub(crate) fn readiness(&self) -> Readiness {
        self.lock().readiness
    }
}
