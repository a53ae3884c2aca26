//! Thin adapter over the MQTT broker connection.
//!
//! Wraps a rumqttc client in the two operations the bridge needs (publish,
//! subscribe) and pumps transport events into the controller's
//! event channel. Reconnection is the transport's job: after a poll error
//! the pump sleeps for the configured backoff and polls again, which makes
//! rumqttc re-handshake; every successful handshake surfaces as a fresh
//! `Connected` event so the controller re-announces everything.

use rumqttc::{AsyncClient, Event, MqttOptions, Packet, QoS};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::bridge::BridgeEvent;
use crate::config::MqttConfig;

/// Broker adapter errors.
#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("MQTT client error: {0}")]
    Client(#[from] rumqttc::ClientError),
}

/// Cloneable handle for publishing and subscribing.
///
/// Publications are best-effort: they are queued on the client and no
/// delivery confirmation is surfaced upward.
#[derive(Clone)]
pub struct MqttHandle {
    client: AsyncClient,
}

impl MqttHandle {
    /// Publish a message, optionally retained.
    pub async fn publish(
        &self,
        topic: &str,
        payload: Vec<u8>,
        retained: bool,
    ) -> Result<(), BrokerError> {
        self.client
            .publish(topic, QoS::AtMostOnce, retained, payload)
            .await?;
        Ok(())
    }

    /// Subscribe to a topic; inbound messages arrive as
    /// [`BridgeEvent::Command`] on the event channel.
    pub async fn subscribe(&self, topic: &str) -> Result<(), BrokerError> {
        self.client.subscribe(topic, QoS::AtMostOnce).await?;
        Ok(())
    }
}

/// Connect to the broker and spawn the event pump.
///
/// The pump translates transport events into [`BridgeEvent`]s:
/// - every `ConnAck` (initial connect and every re-handshake) -> `Connected`
/// - every inbound publish -> `Command`
/// - a poll error -> `Disconnected`, then a fixed backoff sleep before the
///   next poll; retries are unbounded.
pub fn connect(config: &MqttConfig, events: mpsc::Sender<BridgeEvent>) -> MqttHandle {
    let mut options = MqttOptions::new(&config.client_id, &config.host, config.port);
    options.set_keep_alive(Duration::from_secs(config.keep_alive_secs));

    let (client, mut event_loop) = AsyncClient::new(options, 16);
    let backoff = Duration::from_secs(config.reconnect_secs);

    tokio::spawn(async move {
        loop {
            match event_loop.poll().await {
                Ok(Event::Incoming(Packet::ConnAck(_))) => {
                    if events.send(BridgeEvent::Connected).await.is_err() {
                        break;
                    }
                }
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    let event = BridgeEvent::Command {
                        topic: publish.topic,
                        payload: publish.payload.to_vec(),
                    };
                    if events.send(event).await.is_err() {
                        break;
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    warn!("Broker connection lost: {}; retrying in {:?}", e, backoff);
                    if events.send(BridgeEvent::Disconnected).await.is_err() {
                        break;
                    }
                    tokio::time::sleep(backoff).await;
                }
            }
        }
        debug!("MQTT event pump stopped");
    });

    MqttHandle { client }
}
