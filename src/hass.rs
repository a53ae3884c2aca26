//! Home Assistant MQTT wire payloads and topic layout.
//!
//! Every entity lives under `homeassistant/light/<entity>` with the
//! standard `config` / `state` / `set` leaves. Announcements use the
//! abbreviated discovery keys (`uniq_id`, `cmd_t`, `stat_t`, `~`) so Home
//! Assistant resolves the command and state topics against the base topic.

use serde::{Deserialize, Serialize};

use crate::scale;

/// Topic prefix shared by all entities published by this bridge.
pub const DISCOVERY_PREFIX: &str = "homeassistant/light";

/// Base topic for an entity (the `~` of its announcement).
pub fn base_topic(entity: &str) -> String {
    format!("{}/{}", DISCOVERY_PREFIX, entity)
}

/// Retained announcement topic for an entity.
pub fn config_topic(entity: &str) -> String {
    format!("{}/{}/config", DISCOVERY_PREFIX, entity)
}

/// Retained state topic for an entity.
pub fn state_topic(entity: &str) -> String {
    format!("{}/{}/state", DISCOVERY_PREFIX, entity)
}

/// Command topic subscribed for an entity.
pub fn command_topic(entity: &str) -> String {
    format!("{}/{}/set", DISCOVERY_PREFIX, entity)
}

/// Extract the entity identifier from a command topic.
///
/// Inverse of [`command_topic`]; returns `None` for any other topic shape.
pub fn entity_from_command_topic(topic: &str) -> Option<&str> {
    let entity = topic
        .strip_prefix(DISCOVERY_PREFIX)?
        .strip_prefix('/')?
        .strip_suffix("/set")?;

    if entity.is_empty() || entity.contains('/') {
        return None;
    }
    Some(entity)
}

/// Power state of a light, as it appears on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PowerState {
    On,
    Off,
}

/// JSON-schema light state, used both for state publications and commands.
///
/// A command may omit `brightness`; it then decodes as 0, which the bridge
/// treats as a request for minimum brightness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LightState {
    #[serde(default)]
    pub brightness: u8,
    pub state: PowerState,
}

impl LightState {
    /// Build the reported state for a native brightness reading.
    ///
    /// A native reading of zero maps to `OFF`.
    pub fn for_native(raw: i32, native_max: i32) -> Self {
        Self {
            brightness: scale::to_normalized(raw, native_max),
            state: if raw == 0 {
                PowerState::Off
            } else {
                PowerState::On
            },
        }
    }

    /// The retained placeholder for a configured entity with no display.
    pub fn off() -> Self {
        Self {
            brightness: 0,
            state: PowerState::Off,
        }
    }
}

/// Entity announcement published (retained) to the `config` topic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LightDiscovery {
    pub name: String,
    #[serde(rename = "uniq_id")]
    pub unique_id: String,
    #[serde(rename = "cmd_t")]
    pub command_topic: String,
    #[serde(rename = "stat_t")]
    pub state_topic: String,
    pub schema: String,
    pub brightness: bool,
    #[serde(rename = "~")]
    pub base_topic: String,
}

impl LightDiscovery {
    /// Build the announcement for an entity backed by a display label.
    pub fn for_display(entity: &str, label: &str) -> Self {
        Self {
            name: format!("{} Brightness", label),
            unique_id: format!("{}_brightness", entity),
            command_topic: "~/set".to_string(),
            state_topic: "~/state".to_string(),
            schema: "json".to_string(),
            brightness: true,
            base_topic: base_topic(entity),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_topic_builders() {
        assert_eq!(base_topic("laptop"), "homeassistant/light/laptop");
        assert_eq!(config_topic("laptop"), "homeassistant/light/laptop/config");
        assert_eq!(state_topic("laptop"), "homeassistant/light/laptop/state");
        assert_eq!(command_topic("laptop"), "homeassistant/light/laptop/set");
    }

    #[test]
    fn test_entity_from_command_topic() {
        assert_eq!(
            entity_from_command_topic("homeassistant/light/laptop/set"),
            Some("laptop")
        );
        assert_eq!(
            entity_from_command_topic(&command_topic("external")),
            Some("external")
        );

        assert_eq!(
            entity_from_command_topic("homeassistant/light/laptop/state"),
            None
        );
        assert_eq!(entity_from_command_topic("homeassistant/light//set"), None);
        assert_eq!(
            entity_from_command_topic("homeassistant/light/a/b/set"),
            None
        );
        assert_eq!(entity_from_command_topic("homeassistant/switch/x/set"), None);
    }

    #[test]
    fn test_state_serialization() {
        let state = LightState {
            brightness: 128,
            state: PowerState::On,
        };
        assert_eq!(
            serde_json::to_string(&state).unwrap(),
            r#"{"brightness":128,"state":"ON"}"#
        );

        assert_eq!(
            serde_json::to_string(&LightState::off()).unwrap(),
            r#"{"brightness":0,"state":"OFF"}"#
        );
    }

    #[test]
    fn test_command_decoding() {
        let cmd: LightState = serde_json::from_str(r#"{"brightness":200,"state":"ON"}"#).unwrap();
        assert_eq!(cmd.brightness, 200);
        assert_eq!(cmd.state, PowerState::On);

        // Home Assistant may omit brightness from a bare power command.
        let cmd: LightState = serde_json::from_str(r#"{"state":"OFF"}"#).unwrap();
        assert_eq!(cmd.brightness, 0);
        assert_eq!(cmd.state, PowerState::Off);

        assert!(serde_json::from_str::<LightState>(r#"{"state":"on"}"#).is_err());
        assert!(serde_json::from_str::<LightState>("not json").is_err());
    }

    #[test]
    fn test_for_native() {
        let state = LightState::for_native(5000, 10000);
        assert_eq!(state.brightness, 128);
        assert_eq!(state.state, PowerState::On);

        let state = LightState::for_native(0, 10000);
        assert_eq!(state.brightness, 0);
        assert_eq!(state.state, PowerState::Off);
    }

    #[test]
    fn test_discovery_field_names() {
        let discovery = LightDiscovery::for_display("laptop", "eDP-1");
        let value: serde_json::Value = serde_json::to_value(&discovery).unwrap();

        assert_eq!(value["name"], "eDP-1 Brightness");
        assert_eq!(value["uniq_id"], "laptop_brightness");
        assert_eq!(value["cmd_t"], "~/set");
        assert_eq!(value["stat_t"], "~/state");
        assert_eq!(value["schema"], "json");
        assert_eq!(value["brightness"], true);
        assert_eq!(value["~"], "homeassistant/light/laptop");
    }
}
