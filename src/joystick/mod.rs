//! Linux joystick input
//!
//! Reads records from a `/dev/input/jsN` character device and turns them into
//! button or axis events. See
//! <https://www.kernel.org/doc/Documentation/input/joystick-api.txt>.
//!
//! ```text
//! /dev/input/js0 ──► JoystickReader ──► RawEvent ──► decode() ──► DecodedEvent
//! ```

pub mod event;
pub mod reader;

pub use event::{decode, DecodedEvent, EventKind, RawEvent};
pub use reader::{EventSource, JoystickReader, ReaderError};
