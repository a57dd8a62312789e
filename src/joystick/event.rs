//! Joystick event records and their decoded form
//!
//! The kernel joystick API hands out `struct js_event` records of exactly
//! eight bytes in native byte order:
//!
//! ```text
//! offset  size  field
//! 0       4     time    (u32, milliseconds)
//! 4       2     value   (i16)
//! 6       1     type    (u8 bitmask)
//! 7       1     number  (u8 axis/button index)
//! ```

use serde::{Deserialize, Serialize};

/// Button pressed/released
pub const JS_EVENT_BUTTON: u8 = 0x01;
/// Joystick moved
pub const JS_EVENT_AXIS: u8 = 0x02;
/// Initial state of device, OR-ed with one of the above
pub const JS_EVENT_INIT: u8 = 0x80;

/// One undecoded record as read from the device
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RawEvent {
    pub time: u32,
    pub value: i16,
    pub event_type: u8,
    pub number: u8,
}

impl RawEvent {
    /// Size of a record on the wire
    pub const SIZE: usize = 8;

    pub fn from_bytes(bytes: [u8; Self::SIZE]) -> Self {
        Self {
            time: u32::from_ne_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
            value: i16::from_ne_bytes([bytes[4], bytes[5]]),
            event_type: bytes[6],
            number: bytes[7],
        }
    }

    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut bytes = [0u8; Self::SIZE];
        bytes[0..4].copy_from_slice(&self.time.to_ne_bytes());
        bytes[4..6].copy_from_slice(&self.value.to_ne_bytes());
        bytes[6] = self.event_type;
        bytes[7] = self.number;
        bytes
    }

    /// Whether the device flagged this record as part of its initial state dump
    pub fn is_init(&self) -> bool {
        self.event_type & JS_EVENT_INIT != 0
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Button,
    Axis,
}

/// Semantic form of a [`RawEvent`]
///
/// Field order and serde names define the published JSON layout, see
/// [`crate::mqtt::payload`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecodedEvent {
    #[serde(rename = "time")]
    pub timestamp_ms: u32,
    pub value: i16,
    #[serde(rename = "type")]
    pub kind: EventKind,
    #[serde(rename = "number")]
    pub index: u8,
}

/// Classify a raw record.
///
/// Records carrying neither the button nor the axis bit are dropped. If both
/// bits are set the record is reported as a button. Numeric fields are copied
/// as-is.
pub fn decode(raw: &RawEvent) -> Option<DecodedEvent> {
    let kind = if raw.event_type & JS_EVENT_BUTTON != 0 {
        EventKind::Button
    } else if raw.event_type & JS_EVENT_AXIS != 0 {
        EventKind::Axis
    } else {
        return None;
    };

    Some(DecodedEvent {
        timestamp_ms: raw.time,
        value: raw.value,
        kind,
        index: raw.number,
    })
}
