//! # MQTT Publishing
//!
//! Turns decoded joystick events into MQTT messages. The module is split in
//! three parts:
//!
//! ```text
//! mqtt/
//! ├── config.rs        - Broker settings and the publish target
//! ├── payload.rs       - JSON wire format in a bounded buffer
//! └── mqtt_handler.rs  - rumqttc session, event loop task and Publisher
//! ```
//!
//! ## Delivery
//!
//! Events go out with QoS 1 (at-least-once) and without the retain flag.
//! The client buffers a bounded number of requests; once that buffer is full
//! `publish` waits, which holds back the read loop instead of growing an
//! unbounded backlog. Reconnection is handled by the event loop task, the
//! pipeline never sees it.

pub mod config;
pub mod mqtt_handler;
pub mod payload;

pub use config::{MqttSettings, PublishTarget};
pub use mqtt_handler::{ConnectionState, MqttPublisher, MqttSession, PublishError, Publisher};
pub use payload::{encode, Payload, PayloadError};
