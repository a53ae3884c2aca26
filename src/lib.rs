//! MQTT bridge for the KDE ScreenBrightness D-Bus service.
//!
//! This bridge discovers the displays exposed by `org.kde.ScreenBrightness`
//! on the session bus and announces each one to Home Assistant as a
//! JSON-schema light over MQTT. Brightness changes on the bus are forwarded
//! to the broker as retained state publications; light commands coming back
//! from the broker are translated into `SetBrightness` calls on the bus.
//!
//! # Topics
//!
//! ```text
//! homeassistant/light/<entity>/config   (retained) entity announcement
//! homeassistant/light/<entity>/state    (retained) {"brightness": 0-255, "state": "ON"|"OFF"}
//! homeassistant/light/<entity>/set      (subscribed) command, same schema as state
//! ```
//!
//! Where `<entity>` is a key of the `lights` table in the configuration
//! file, mapped to displays by matching its regular expression against the
//! display labels reported on the bus.

pub mod bridge;
pub mod bus;
pub mod config;
pub mod hass;
pub mod mqtt;
pub mod registry;
pub mod scale;

use config::{ConfigError, LogFormat, LoggingConfig};

/// Initialize tracing with the given configuration.
///
/// The `RUST_LOG` environment variable takes precedence over the configured
/// level. Output is human-readable text by default, or structured JSON when
/// `logging.format = "json"`.
pub fn init_tracing(config: &LoggingConfig) -> Result<(), ConfigError> {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let result = match config.format {
        LogFormat::Text => tracing_subscriber::registry()
            .with(fmt::layer())
            .with(filter)
            .try_init(),
        LogFormat::Json => tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(filter)
            .try_init(),
    };

    result.map_err(|e| ConfigError::Tracing(e.to_string()))
}
