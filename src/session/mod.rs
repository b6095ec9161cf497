//! Joystick sessions exposed as pollable, owner-monitored resources
//!
//! # Architecture
//!
//! ```text
//! Registry ──open──► ResourceEntry ──arm──► ReadinessMultiplexer
//!    │                  │   ▲                      │
//!    │             weak │   └──── on_ready ────────┘──► Inbox (Notification::Readable)
//!    ▼                  │
//!  Owner ── drop ──► Monitors ──► request_stop ──► deregister ──► fd closed
//! ```
//!
//! 1. [`registry`] - handle table, reference counting, caller-facing API
//! 2. [`notifier`] - per-resource readiness state machine
//! 3. [`monitor`] - owner termination watches
//! 4. [`multiplexer`] - host readiness seam and its tokio implementation
//!
//! A typical owner loop:
//!
//! ```rust,no_run
//! # use joystick_session::session::{Notification, Registry};
//! # use joystick_session::JoystickError;
//! # async fn run(registry: Registry) -> Result<(), JoystickError> {
//! let (owner, mut inbox) = registry.new_owner();
//! let js = registry.open(0, &owner)?;
//! registry.arm(js)?;
//! while let Some(Notification::Readable(handle)) = inbox.recv().await {
//!     loop {
//!         match registry.drain(handle) {
//!             Ok(event) => println!("{:?}", event),
//!             Err(JoystickError::WouldBlock) => break,
//!             Err(e) => return Err(e),
//!         }
//!     }
//!     registry.arm(handle)?;
//! }
//! # Ok(())
//! # }
//! ```

pub mod monitor;
pub mod multiplexer;
pub mod notifier;
pub mod registry;

pub use monitor::{Inbox, Notification, Owner, OwnerId};
pub use multiplexer::{ReadinessMultiplexer, ReadyCallback, StopCallback, TokioMultiplexer};
pub use notifier::Readiness;
pub use registry::{Registry, ResourceHandle};
