//! Joystick event codec
//!
//! The kernel delivers `struct js_event` records:
//!
//! ```text
//! offset 0  u32  time    device clock in ms, wraps at 2^32
//! offset 4  i16  value
//! offset 6  u8   type    0x01 button, 0x02 axis, bit 7 = init
//! offset 7  u8   number  channel index
//! ```
//!
//! Fields are in native byte order with no padding. Axis samples are scaled by
//! [`AxisScaling`]; the default divisor of 32.767 maps ±32767 onto ±1000.

use crate::device::DeviceHandle;
use crate::error::JoystickError;
use serde::{Deserialize, Serialize};
use std::io;
use tracing::debug;

/// Size of one `struct js_event`
pub const EVENT_SIZE: usize = 8;

pub const JS_EVENT_BUTTON: u8 = 0x01;
pub const JS_EVENT_AXIS: u8 = 0x02;
pub const JS_EVENT_INIT: u8 = 0x80;

/// Divisor applied to raw axis samples unless configured otherwise
pub const DEFAULT_AXIS_DIVISOR: f64 = 32.767;

/// Undecoded `struct js_event`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawEvent {
    pub time: u32,
    pub value: i16,
    pub kind: u8,
    pub number: u8,
}

impl RawEvent {
    pub fn from_bytes(buf: &[u8; EVENT_SIZE]) -> Self {
        Self {
            time: u32::from_ne_bytes([buf[0], buf[1], buf[2], buf[3]]),
            value: i16::from_ne_bytes([buf[4], buf[5]]),
            kind: buf[6],
            number: buf[7],
        }
    }

    /// Kernel layout, as a device would write it
    pub fn to_bytes(&self) -> [u8; EVENT_SIZE] {
        let mut buf = [0u8; EVENT_SIZE];
        buf[..4].copy_from_slice(&self.time.to_ne_bytes());
        buf[4..6].copy_from_slice(&self.value.to_ne_bytes());
        buf[6] = self.kind;
        buf[7] = self.number;
        buf
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    Button,
    Axis,
    /// Synthetic button state sent right after open
    InitButton,
    /// Synthetic axis state sent right after open
    InitAxis,
}

impl EventKind {
    /// Classifies a type tag. Any tag without the axis bit counts as a button.
    pub fn from_tag(tag: u8) -> Self {
        let init = tag & JS_EVENT_INIT != 0;
        let axis = tag & JS_EVENT_AXIS != 0;
        match (axis, init) {
            (true, false) => EventKind::Axis,
            (true, true) => EventKind::InitAxis,
            (false, false) => EventKind::Button,
            (false, true) => EventKind::InitButton,
        }
    }

    pub fn is_axis(self) -> bool {
        matches!(self, EventKind::Axis | EventKind::InitAxis)
    }

    pub fn is_init(self) -> bool {
        matches!(self, EventKind::InitAxis | EventKind::InitButton)
    }
}

/// Decoded joystick event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputEvent {
    /// Device clock in milliseconds
    pub timestamp: u32,
    pub kind: EventKind,
    pub raw_value: i16,
    /// Axis value after [`AxisScaling`], or the raw button state
    pub value: i32,
    /// Axis or button index
    pub number: u8,
}

/// How a fractional scaled axis value becomes an integer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rounding {
    /// Round half away from zero
    #[default]
    Nearest,
    /// Drop the fraction
    TowardZero,
}

/// Axis scaling: `value = round(raw / divisor)`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AxisScaling {
    pub divisor: f64,
    pub rounding: Rounding,
}

impl Default for AxisScaling {
    fn default() -> Self {
        Self {
            divisor: DEFAULT_AXIS_DIVISOR,
            rounding: Rounding::Nearest,
        }
    }
}

impl AxisScaling {
    pub fn scale(&self, raw: i16) -> i32 {
        let quotient = f64::from(raw) / self.divisor;
        let value = match self.rounding {
            Rounding::Nearest => quotient.round(),
            Rounding::TowardZero => quotient.trunc(),
        };
        // saturating float-to-int conversion
        value as i32
    }
}

/// Decodes one record. The init bit is kept as a distinct kind.
///
/// Only live axis events are scaled; init records report the raw value.
pub fn decode(raw: RawEvent, scaling: &AxisScaling) -> InputEvent {
    let kind = EventKind::from_tag(raw.kind);
    let value = if kind == EventKind::Axis {
        scaling.scale(raw.value)
    } else {
        i32::from(raw.value)
    };

    InputEvent {
        timestamp: raw.time,
        kind,
        raw_value: raw.value,
        value,
        number: raw.number,
    }
}

/// Reads and decodes exactly one record from `device`
///
/// `EAGAIN` and short reads map to [`JoystickError::WouldBlock`]; a partial
/// record is discarded, never kept for the next call. Other OS errors pass
/// through unchanged.
pub fn read(device: &DeviceHandle, scaling: &AxisScaling) -> Result<InputEvent, JoystickError> {
    let mut buf = [0u8; EVENT_SIZE];
    match device.read_into(&mut buf) {
        Ok(EVENT_SIZE) => {
            let event = decode(RawEvent::from_bytes(&buf), scaling);
            debug!("Decoded event: {:?}", event);
            Ok(event)
        }
        Ok(n) => {
            debug!("Short read of {} bytes, treating as no data", n);
            Err(JoystickError::WouldBlock)
        }
        Err(e) if e.kind() == io::ErrorKind::WouldBlock => Err(JoystickError::WouldBlock),
        Err(e) => Err(JoystickError::Os(e)),
    }
}
