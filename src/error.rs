//! Error types for joystick sessions

use crate::session::{OwnerId, ResourceHandle};
use std::io;
use thiserror::Error;

/// Recoverable errors returned to the caller of a session operation
///
/// Invariant violations in the readiness multiplexer are not represented here;
/// they abort the process (see [`crate::invariant`]).
#[derive(Debug, Error)]
pub enum JoystickError {
    /// Open, ioctl or read failure, carrying the OS error unmodified
    #[error("OS error: {0}")]
    Os(#[from] io::Error),

    /// The handle does not resolve to a live resource
    #[error("Invalid handle: {0}")]
    InvalidHandle(ResourceHandle),

    /// No complete event record is available; re-arm and wait
    #[error("No event available")]
    WouldBlock,

    /// The resource was stopped; only `info` is still served
    #[error("Resource {0} is closed")]
    Closed(ResourceHandle),

    /// The owner was created by a different registry, which would never
    /// report its termination here
    #[error("{0} is not watched by this registry")]
    ForeignOwner(OwnerId),
}

impl JoystickError {
    /// Raw errno for [`JoystickError::Os`], if the OS reported one
    pub fn os_code(&self) -> Option<i32> {
        match self {
            JoystickError::Os(e) => e.raw_os_error(),
            _ => None,
        }
    }
}

impl From<nix::errno::Errno> for JoystickError {
    fn from(errno: nix::errno::Errno) -> Self {
        JoystickError::Os(io::Error::from(errno))
    }
}

/// Failures reported by a [`ReadinessMultiplexer`](crate::session::ReadinessMultiplexer)
#[derive(Debug, Error)]
pub enum MultiplexerError {
    #[error("fd {0} already has a pending read registration")]
    AlreadyRegistered(i32),

    #[error("Failed to register fd {fd}: {source}")]
    Register {
        fd: i32,
        #[source]
        source: io::Error,
    },

    #[error("Multiplexer shut down")]
    Shutdown,
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}
