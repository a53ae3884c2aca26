//! MQTT bridge for the KDE ScreenBrightness D-Bus service.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tokio::sync::mpsc;
use tracing::{info, warn};

use mqtt_bridge_brightness::bridge::Bridge;
use mqtt_bridge_brightness::bus::BrightnessBus;
use mqtt_bridge_brightness::config::{self, BridgeConfig};
use mqtt_bridge_brightness::{init_tracing, mqtt, registry};

/// MQTT bridge exposing KDE ScreenBrightness displays as Home Assistant lights.
#[derive(Parser, Debug)]
#[command(name = "mqtt-bridge-brightness")]
#[command(about = "Bridges org.kde.ScreenBrightness displays to Home Assistant over MQTT")]
#[command(version)]
struct Args {
    /// Path to configuration file (JSON5 format); defaults to
    /// mqtt-bridge-brightness/bridge.json5 under the user config directory
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override log level (trace, debug, info, warn, error).
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Load configuration
    let config_path = match args.config {
        Some(path) => path,
        None => config::default_config_path()
            .context("Could not determine the user configuration directory")?,
    };
    let config = BridgeConfig::load_from_file(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;

    // Initialize logging
    let mut log_config = config.logging.clone();
    if let Some(level) = args.log_level {
        log_config.level = level;
    }
    init_tracing(&log_config)?;

    info!("Starting mqtt-bridge-brightness");
    info!("Loaded configuration from {:?}", config_path);

    let patterns = config.compiled_patterns()?;

    // Discover displays on the session bus
    let bus = BrightnessBus::connect()
        .await
        .context("Failed to connect to the session bus")?;
    let registry = registry::discover(&bus, &patterns)
        .await
        .context("Display discovery failed")?;
    if registry.is_empty() {
        // Still worth running: configured entities get retained OFF states.
        warn!("No display matched any configured pattern");
    }
    info!(
        "Bridging {} display entity(ies) to {}:{}",
        registry.len(),
        config.mqtt.host,
        config.mqtt.port
    );

    // Wire the event channel: bus signals and broker events feed one loop
    let (events_tx, events_rx) = mpsc::channel(32);
    bus.spawn_signal_pump(events_tx.clone())
        .await
        .context("Failed to subscribe to bus signals")?;
    let mqtt = mqtt::connect(&config.mqtt, events_tx);

    let bridge = Bridge::new(registry, patterns, bus, mqtt);

    tokio::select! {
        result = bridge.run(events_rx) => {
            result.context("Bridge controller terminated")?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal");
        }
    }

    Ok(())
}
