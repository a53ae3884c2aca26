//! Bridge controller: the event loop tying the bus to the broker.
//!
//! All connect/disconnect/command callbacks and bus signals are funneled
//! into one channel of tagged [`BridgeEvent`]s and dispatched by a single
//! control loop. The loop owns the registry, so there is exactly one reader
//! and no concurrent writer; the connect-time synchronization sequence is
//! one procedure, run identically on the first handshake and on every
//! reconnect.
//!
//! Known race, inherited from the design: a reconnect's bulk republish and
//! a concurrently arriving live brightness signal are ordered only by their
//! arrival on the event channel, so either may overwrite the other on the
//! broker. Per-entity ordering otherwise follows bus signal order.

use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::bus::BrightnessBus;
use crate::config::LightPattern;
use crate::hass::{self, LightDiscovery, LightState, PowerState};
use crate::mqtt::{BrokerError, MqttHandle};
use crate::registry::{DisplayInfo, Registry};
use crate::scale;

/// Everything the control loop reacts to.
#[derive(Debug)]
pub enum BridgeEvent {
    /// Broker handshake completed (initial connect or reconnect).
    Connected,
    /// Broker transport lost; the adapter is retrying.
    Disconnected,
    /// Inbound message on a subscribed topic.
    Command { topic: String, payload: Vec<u8> },
    /// Bus reported a display's native brightness changed.
    BrightnessChanged { device: String, value: i32 },
    /// Bus reported a display was added or removed.
    TopologyChanged,
}

/// Controller errors. All are terminal for the process.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("display topology changed; exiting so the supervisor restarts discovery")]
    TopologyChanged,
    #[error(transparent)]
    Broker(#[from] BrokerError),
}

/// One planned broker publication.
#[derive(Debug, PartialEq, Eq)]
struct Publication {
    topic: String,
    payload: Vec<u8>,
    retained: bool,
}

/// Bridge controller. Owns the registry for the lifetime of the process.
pub struct Bridge {
    registry: Registry,
    patterns: Vec<LightPattern>,
    bus: BrightnessBus,
    mqtt: MqttHandle,
    connected: bool,
}

impl Bridge {
    pub fn new(
        registry: Registry,
        patterns: Vec<LightPattern>,
        bus: BrightnessBus,
        mqtt: MqttHandle,
    ) -> Self {
        Self {
            registry,
            patterns,
            bus,
            mqtt,
            connected: false,
        }
    }

    /// Run the control loop until the event channel closes or a terminal
    /// error occurs.
    pub async fn run(mut self, mut events: mpsc::Receiver<BridgeEvent>) -> Result<(), BridgeError> {
        while let Some(event) = events.recv().await {
            match event {
                BridgeEvent::Connected => {
                    info!("Connected to broker");
                    self.connected = true;
                    self.synchronize().await?;
                }
                BridgeEvent::Disconnected => {
                    self.connected = false;
                    info!("Broker connection lost; awaiting reconnect");
                }
                BridgeEvent::Command { topic, payload } => {
                    self.handle_command(&topic, &payload).await;
                }
                BridgeEvent::BrightnessChanged { device, value } => {
                    self.handle_brightness_changed(&device, value).await;
                }
                BridgeEvent::TopologyChanged => {
                    error!("Display added or removed; exiting for a clean restart");
                    // Reconciling live subscriptions against a changed entity
                    // set in place is riskier than a supervisor restart that
                    // re-runs discovery from scratch.
                    return Err(BridgeError::TopologyChanged);
                }
            }
        }

        debug!("Event channel closed; controller stopping");
        Ok(())
    }

    /// Bring the broker up to date after a handshake: re-announce every
    /// entity, republish current state, publish OFF for configured entities
    /// with no display, then install the command subscriptions.
    async fn synchronize(&self) -> Result<(), BridgeError> {
        let mut readings = Vec::with_capacity(self.registry.len());
        for entry in self.registry.entries() {
            let value = match self.bus.brightness(&entry.device).await {
                Ok(value) => Some(value),
                Err(e) => {
                    warn!(
                        "Failed to read brightness of '{}': {}; announcing without state",
                        entry.device, e
                    );
                    None
                }
            };
            readings.push((entry.clone(), value));
        }

        let publications = sync_publications(&readings, &self.patterns);
        debug!("Publishing {} retained messages", publications.len());
        for publication in publications {
            self.mqtt
                .publish(&publication.topic, publication.payload, publication.retained)
                .await?;
        }

        for topic in command_subscriptions(self.registry.entries()) {
            self.mqtt.subscribe(&topic).await?;
        }

        Ok(())
    }

    /// Handle an inbound light command: decode, scale, call the bus.
    /// Malformed payloads and unknown entities are logged and dropped.
    async fn handle_command(&self, topic: &str, payload: &[u8]) {
        let Some(entity) = hass::entity_from_command_topic(topic) else {
            debug!("Ignoring message on unexpected topic '{}'", topic);
            return;
        };

        let Some(entry) = self.registry.by_entity(entity) else {
            warn!("Dropping command for unknown entity '{}'", entity);
            return;
        };

        let command: LightState = match serde_json::from_slice(payload) {
            Ok(command) => command,
            Err(e) => {
                warn!("Dropping malformed command for '{}': {}", entity, e);
                return;
            }
        };

        let raw = command_to_native(&command, entry.max_brightness);
        info!(
            "Command for '{}': {:?} -> native {}",
            entity, command, raw
        );

        if let Err(e) = self.bus.set_brightness(&entry.device, raw).await {
            error!("Failed to set brightness of '{}': {}", entry.device, e);
        }
    }

    /// Forward a bus brightness signal to the broker, once per registry
    /// entry backed by the device. Dropped while disconnected and for
    /// devices missing from the registry.
    async fn handle_brightness_changed(&self, device: &str, value: i32) {
        if !self.connected {
            debug!("Broker offline; dropping brightness update for '{}'", device);
            return;
        }

        let mut found = false;
        for entry in self.registry.by_device(device) {
            found = true;
            let state = LightState::for_native(value, entry.max_brightness);
            match serde_json::to_vec(&state) {
                Ok(payload) => {
                    let topic = hass::state_topic(&entry.entity);
                    debug!("Publishing {:?} to {}", state, topic);
                    if let Err(e) = self.mqtt.publish(&topic, payload, true).await {
                        error!("Failed to publish state for '{}': {}", entry.entity, e);
                    }
                }
                Err(e) => error!("Failed to encode state for '{}': {}", entry.entity, e),
            }
        }

        if !found {
            debug!(
                "Brightness update for unregistered display '{}' dropped",
                device
            );
        }
    }
}

/// Translate a light command into a native brightness value.
fn command_to_native(command: &LightState, native_max: i32) -> i32 {
    match command.state {
        PowerState::Off => 0,
        PowerState::On => scale::to_native(command.brightness, native_max),
    }
}

/// Plan the retained publications for one connect-time synchronization:
/// per registry entry one announcement and (when a reading is available)
/// one state, plus one OFF state per configured entity with no entry.
fn sync_publications(
    readings: &[(DisplayInfo, Option<i32>)],
    patterns: &[LightPattern],
) -> Vec<Publication> {
    let mut publications = Vec::new();

    for (entry, reading) in readings {
        let discovery = LightDiscovery::for_display(&entry.entity, &entry.label);
        match serde_json::to_vec(&discovery) {
            Ok(payload) => publications.push(Publication {
                topic: hass::config_topic(&entry.entity),
                payload,
                retained: true,
            }),
            Err(e) => error!("Failed to encode announcement for '{}': {}", entry.entity, e),
        }

        if let Some(raw) = reading {
            let state = LightState::for_native(*raw, entry.max_brightness);
            match serde_json::to_vec(&state) {
                Ok(payload) => publications.push(Publication {
                    topic: hass::state_topic(&entry.entity),
                    payload,
                    retained: true,
                }),
                Err(e) => error!("Failed to encode state for '{}': {}", entry.entity, e),
            }
        }
    }

    // Configured entities with no display still get a retained placeholder
    // so the automation side never shows a stale or missing entity.
    for light in patterns {
        if !readings.iter().any(|(entry, _)| entry.entity == light.entity) {
            match serde_json::to_vec(&LightState::off()) {
                Ok(payload) => publications.push(Publication {
                    topic: hass::state_topic(&light.entity),
                    payload,
                    retained: true,
                }),
                Err(e) => error!("Failed to encode state for '{}': {}", light.entity, e),
            }
        }
    }

    publications
}

/// Command topics to subscribe for the registry, deduplicated (one pattern
/// matching several displays yields several entries with the same entity).
fn command_subscriptions(entries: &[DisplayInfo]) -> Vec<String> {
    let mut topics = Vec::new();
    for entry in entries {
        let topic = hass::command_topic(&entry.entity);
        if !topics.contains(&topic) {
            topics.push(topic);
        }
    }
    topics
}
