//! Wire payload for published joystick events
//!
//! Each event is published as one compact JSON object:
//!
//! ```text
//! {"time":123456,"value":-32767,"type":"axis","number":2}
//! ```

use std::fmt;
use std::io;

use crate::joystick::DecodedEvent;

/// Capacity of a [`Payload`] buffer in bytes
pub const PAYLOAD_CAPACITY: usize = 256;

/// Longest rendering any event can produce
pub const MAX_ENCODED_LEN: usize =
    r#"{"time":4294967295,"value":-32768,"type":"button","number":255}"#.len();

const _: () = assert!(MAX_ENCODED_LEN <= PAYLOAD_CAPACITY);

#[derive(Debug, thiserror::Error)]
pub enum PayloadError {
    #[error("Payload exceeds {capacity} bytes")]
    Overflow { capacity: usize },

    #[error("Cannot serialize event: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Serialized event with its exact length
#[derive(Clone, PartialEq, Eq)]
pub struct Payload {
    bytes: heapless::Vec<u8, PAYLOAD_CAPACITY>,
}

impl Payload {
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl fmt::Display for Payload {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(&self.bytes))
    }
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Payload({})", self)
    }
}

// io::Write adapter that refuses to grow past the buffer capacity
struct BoundedWriter<'a> {
    buf: &'a mut heapless::Vec<u8, PAYLOAD_CAPACITY>,
}

impl io::Write for BoundedWriter<'_> {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.buf
            .extend_from_slice(data)
            .map_err(|_| io::Error::new(io::ErrorKind::WriteZero, "payload buffer full"))?;
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Serialize a decoded event into a payload
pub fn encode(event: &DecodedEvent) -> Result<Payload, PayloadError> {
    let mut bytes = heapless::Vec::new();
    serde_json::to_writer(BoundedWriter { buf: &mut bytes }, event).map_err(|e| {
        if e.is_io() {
            PayloadError::Overflow {
                capacity: PAYLOAD_CAPACITY,
            }
        } else {
            PayloadError::Serialize(e)
        }
    })?;

    Ok(Payload { bytes })
}
