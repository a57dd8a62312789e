use std::time::Duration;

use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::config::{MqttSettings, PublishTarget};
use super::payload::Payload;

/// Pause between a connection error and the next reconnect attempt
const RECONNECT_DELAY: Duration = Duration::from_secs(1);

#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
}

#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("MQTT client rejected publish on {topic}: {source}")]
    Client {
        topic: String,
        #[source]
        source: rumqttc::ClientError,
    },

    #[error("MQTT event loop is not running")]
    NotRunning,
}

/// Delivery side of the pipeline
#[allow(async_fn_in_trait)]
pub trait Publisher {
    /// Whether the publisher can accept messages
    fn is_ready(&self) -> bool;

    /// Hand one payload to the transport. Exactly one send attempt, no retry.
    async fn publish(
        &mut self,
        target: &PublishTarget,
        payload: &Payload,
    ) -> Result<(), PublishError>;
}

/// Running broker session
///
/// Owns the background task that drives the rumqttc event loop. The session is
/// usable as soon as it is created; publishes queue in the client until the
/// connection is established.
pub struct MqttSession {
    client: AsyncClient,
    state: watch::Receiver<ConnectionState>,
    service: JoinHandle<()>,
}

impl MqttSession {
    /// Start connecting to the broker in the background
    pub fn connect(settings: &MqttSettings) -> Self {
        let mut options = MqttOptions::new(
            settings.client_id.clone(),
            settings.host.clone(),
            settings.port,
        );
        options.set_keep_alive(settings.keep_alive());

        let (client, eventloop) = AsyncClient::new(options, settings.queue_capacity);
        let (state_tx, state_rx) = watch::channel(ConnectionState::Connecting);

        info!(
            "Connecting to MQTT broker {} as {}",
            settings.address(),
            settings.client_id
        );
        let service = tokio::spawn(run_event_loop(eventloop, state_tx));

        Self {
            client,
            state: state_rx,
            service,
        }
    }

    pub fn publisher(&self) -> MqttPublisher {
        MqttPublisher {
            client: self.client.clone(),
            state: self.state.clone(),
        }
    }

    pub fn state(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }

    pub fn is_running(&self) -> bool {
        !self.service.is_finished()
    }
}

impl Drop for MqttSession {
    fn drop(&mut self) {
        self.service.abort();
    }
}

async fn run_event_loop(mut eventloop: EventLoop, state: watch::Sender<ConnectionState>) {
    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                info!("Connected to MQTT broker ({:?})", ack.code);
                state.send_replace(ConnectionState::Connected);
            }
            Ok(Event::Incoming(Packet::PubAck(ack))) => {
                debug!("Broker acknowledged packet {}", ack.pkid);
            }
            Ok(Event::Incoming(Packet::Disconnect)) => {
                warn!("Broker closed the session");
                state.send_replace(ConnectionState::Disconnected);
            }
            Ok(event) => {
                debug!("MQTT event: {:?}", event);
            }
            Err(e) => {
                if *state.borrow() != ConnectionState::Reconnecting {
                    warn!("MQTT connection error: {}, reconnecting", e);
                }
                state.send_replace(ConnectionState::Reconnecting);
                tokio::time::sleep(RECONNECT_DELAY).await;
            }
        }
    }
}

/// [`Publisher`] backed by a rumqttc client
#[derive(Clone)]
pub struct MqttPublisher {
    client: AsyncClient,
    state: watch::Receiver<ConnectionState>,
}

impl Publisher for MqttPublisher {
    fn is_ready(&self) -> bool {
        // The watch sender lives in the event loop task.
        self.state.has_changed().is_ok()
    }

    async fn publish(
        &mut self,
        target: &PublishTarget,
        payload: &Payload,
    ) -> Result<(), PublishError> {
        if !self.is_ready() {
            return Err(PublishError::NotRunning);
        }

        self.client
            .publish(
                target.topic(),
                target.qos(),
                target.retain(),
                payload.as_bytes().to_vec(),
            )
            .await
            .map_err(|source| PublishError::Client {
                topic: target.topic().to_string(),
                source,
            })
    }
}
