//! Host readiness multiplexer seam
//!
//! The session layer never waits on a descriptor itself. It hands the fd to a
//! [`ReadinessMultiplexer`] together with a one-shot callback and returns
//! immediately; the wait happens in the host's event loop.
//!
//! [`TokioMultiplexer`] is the host implementation used by `jsmon`: one tokio
//! task per pending registration, parked on an edge-triggered [`AsyncFd`].

use crate::error::MultiplexerError;
use std::collections::HashMap;
use std::os::fd::{AsRawFd, RawFd};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::io::unix::AsyncFd;
use tokio::io::Interest;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Invoked at most once, when the registered fd becomes readable
pub type ReadyCallback = Box<dyn FnOnce() + Send + 'static>;

/// Invoked exactly once, when the multiplexer no longer references the fd
pub type StopCallback = Box<dyn FnOnce() + Send + 'static>;

/// Host facility that reports fd readability
///
/// Implementations must uphold:
/// - at most one pending read registration per fd; a second
///   `register_read` for the same fd fails with
///   [`MultiplexerError::AlreadyRegistered`]
/// - `on_ready` is never called from inside `register_read`
/// - `deregister` drops any pending `on_ready` without calling it, then calls
///   `on_stopped` exactly once, either before returning (nothing was
///   registered) or after the registration is fully torn down
pub trait ReadinessMultiplexer: Send + Sync {
    fn register_read(&self, fd: RawFd, on_ready: ReadyCallback) -> Result<(), MultiplexerError>;

    fn deregister(&self, fd: RawFd, on_stopped: StopCallback) -> Result<(), MultiplexerError>;
}

/// Borrowed fd for [`AsyncFd`]; dropping it does not close anything
struct WatchedFd(RawFd);

impl AsRawFd for WatchedFd {
    fn as_raw_fd(&self) -> RawFd {
        self.0
    }
}

struct Pending {
    generation: u64,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

type PendingMap = Arc<Mutex<HashMap<RawFd, Pending>>>;

fn lock(pending: &PendingMap) -> MutexGuard<'_, HashMap<RawFd, Pending>> {
    pending.lock().unwrap_or_else(PoisonError::into_inner)
}

/// [`ReadinessMultiplexer`] running on a tokio runtime
pub struct TokioMultiplexer {
    runtime: Handle,
    pending: PendingMap,
    generation: AtomicU64,
}

impl TokioMultiplexer {
    pub fn new(runtime: Handle) -> Self {
        Self {
            runtime,
            pending: Arc::new(Mutex::new(HashMap::new())),
            generation: AtomicU64::new(0),
        }
    }

    /// Uses the runtime of the calling task
    ///
    /// # Panics
    ///
    /// Outside of a tokio runtime.
    pub fn current() -> Self {
        Self::new(Handle::current())
    }

    /// Number of fds with a pending read registration
    pub fn pending(&self) -> usize {
        lock(&self.pending).len()
    }
}

impl ReadinessMultiplexer for TokioMultiplexer {
    fn register_read(&self, fd: RawFd, on_ready: ReadyCallback) -> Result<(), MultiplexerError> {
        let mut pending = lock(&self.pending);
        if pending.contains_key(&fd) {
            return Err(MultiplexerError::AlreadyRegistered(fd));
        }

        // Registration happens here, synchronously, so failures reach the caller.
        let watched = {
            let _enter = self.runtime.enter();
            AsyncFd::with_interest(WatchedFd(fd), Interest::READABLE)
                .map_err(|source| MultiplexerError::Register { fd, source })?
        };

        let generation = self.generation.fetch_add(1, Ordering::Relaxed);
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let table = Arc::clone(&self.pending);

        let task = self.runtime.spawn(async move {
            let fired = tokio::select! {
                ready = watched.readable() => {
                    if let Err(e) = ready {
                        warn!(fd, "Readiness wait failed: {}", e);
                    }
                    true
                }
                _ = token.cancelled() => false,
            };
            // Leave epoll before anyone may close the fd.
            drop(watched);

            if fired {
                {
                    let mut pending = lock(&table);
                    if pending.get(&fd).is_some_and(|p| p.generation == generation) {
                        pending.remove(&fd);
                    }
                }
                debug!(fd, "fd readable");
                on_ready();
            } else {
                drop(on_ready);
                debug!(fd, "Read registration cancelled");
            }
        });

        pending.insert(
            fd,
            Pending {
                generation,
                cancel,
                task,
            },
        );
        debug!(fd, "Registered fd for read readiness");
        Ok(())
    }

    fn deregister(&self, fd: RawFd, on_stopped: StopCallback) -> Result<(), MultiplexerError> {
        let entry = lock(&self.pending).remove(&fd);
        match entry {
            Some(pending) => {
                pending.cancel.cancel();
                self.runtime.spawn(async move {
                    // The task drops its AsyncFd before finishing.
                    let _ = pending.task.await;
                    debug!(fd, "Deregistration confirmed");
                    on_stopped();
                });
            }
            None => {
                debug!(fd, "Nothing registered, stop confirmed directly");
                on_stopped();
            }
        }
        Ok(())
    }
}
