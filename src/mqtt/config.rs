use std::time::Duration;

use rumqttc::QoS;

pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_PORT: u16 = 1883;
pub const DEFAULT_TOPIC: &str = "/joystick";
pub const DEFAULT_KEEP_ALIVE_SECS: u64 = 60;
pub const DEFAULT_QUEUE_CAPACITY: usize = 10;

/// Broker connection settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MqttSettings {
    pub host: String,
    pub port: u16,
    pub topic: String,
    pub client_id: String,
    pub keep_alive_secs: u64,
    /// Number of requests the client buffers before `publish` waits
    pub queue_capacity: usize,
}

impl Default for MqttSettings {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            topic: DEFAULT_TOPIC.to_string(),
            client_id: format!("js2mqtt-{}", std::process::id()),
            keep_alive_secs: DEFAULT_KEEP_ALIVE_SECS,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

impl MqttSettings {
    pub fn keep_alive(&self) -> Duration {
        Duration::from_secs(self.keep_alive_secs)
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn publish_target(&self) -> PublishTarget {
        PublishTarget::new(self.topic.clone())
    }
}

/// Where and how events are published
///
/// Delivery is always at-least-once and never retained: subscribers only see
/// events published after they joined.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishTarget {
    topic: String,
}

impl PublishTarget {
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn qos(&self) -> QoS {
        QoS::AtLeastOnce
    }

    pub fn retain(&self) -> bool {
        false
    }
}
