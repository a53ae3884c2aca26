//! Thin adapter over the org.kde.ScreenBrightness D-Bus service.
//!
//! Displays live under `/org/kde/ScreenBrightness/<device>` and expose the
//! `org.kde.ScreenBrightness.Display` interface; the service root lists the
//! device names and emits the brightness and topology signals. This module
//! performs no business logic: it reads properties, invokes the
//! `SetBrightness` method and pumps service signals into the controller's
//! event channel.

use futures::StreamExt;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, warn};
use zbus::Connection;

use crate::bridge::BridgeEvent;
use crate::registry::ProbedDisplay;

/// Object path of the service root.
pub const ROOT_PATH: &str = "/org/kde/ScreenBrightness";

/// Bus adapter errors.
#[derive(Debug, Error)]
pub enum BusError {
    #[error("D-Bus error: {0}")]
    Zbus(#[from] zbus::Error),
}

#[zbus::proxy(
    interface = "org.kde.ScreenBrightness",
    default_service = "org.kde.ScreenBrightness",
    default_path = "/org/kde/ScreenBrightness"
)]
trait ScreenBrightness {
    /// Bus-local names of all controllable displays.
    #[zbus(property)]
    fn displays_d_bus_names(&self) -> zbus::Result<Vec<String>>;

    /// Emitted when a display's brightness changes, whoever changed it.
    #[zbus(signal)]
    fn brightness_changed(&self, display_name: String, brightness: i32) -> zbus::Result<()>;

    #[zbus(signal)]
    fn display_added(&self, display_name: String) -> zbus::Result<()>;

    #[zbus(signal)]
    fn display_removed(&self, display_name: String) -> zbus::Result<()>;
}

#[zbus::proxy(
    interface = "org.kde.ScreenBrightness.Display",
    default_service = "org.kde.ScreenBrightness"
)]
trait Display {
    #[zbus(property)]
    fn label(&self) -> zbus::Result<String>;

    #[zbus(property)]
    fn brightness(&self) -> zbus::Result<i32>;

    #[zbus(property)]
    fn max_brightness(&self) -> zbus::Result<i32>;

    fn set_brightness(&self, brightness: i32, flags: u32) -> zbus::Result<()>;
}

/// Handle to the brightness service on the session bus.
pub struct BrightnessBus {
    conn: Connection,
}

impl BrightnessBus {
    /// Connect to the session bus.
    pub async fn connect() -> Result<Self, BusError> {
        let conn = Connection::session().await?;
        Ok(Self { conn })
    }

    async fn display_proxy(&self, device: &str) -> Result<DisplayProxy<'_>, BusError> {
        let proxy = DisplayProxy::builder(&self.conn)
            .path(format!("{}/{}", ROOT_PATH, device))?
            .build()
            .await?;
        Ok(proxy)
    }

    /// List the device names of all displays known to the service.
    pub async fn display_names(&self) -> Result<Vec<String>, BusError> {
        let proxy = ScreenBrightnessProxy::new(&self.conn).await?;
        Ok(proxy.displays_d_bus_names().await?)
    }

    /// Fetch the label and maximum brightness of one display.
    pub async fn probe_display(&self, device: &str) -> Result<ProbedDisplay, BusError> {
        let proxy = self.display_proxy(device).await?;
        Ok(ProbedDisplay {
            device: device.to_string(),
            label: proxy.label().await?,
            max_brightness: proxy.max_brightness().await?,
        })
    }

    /// Read the current native brightness of one display.
    pub async fn brightness(&self, device: &str) -> Result<i32, BusError> {
        let proxy = self.display_proxy(device).await?;
        Ok(proxy.brightness().await?)
    }

    /// Set the native brightness of one display.
    pub async fn set_brightness(&self, device: &str, raw: i32) -> Result<(), BusError> {
        let proxy = self.display_proxy(device).await?;
        // flags=1 asks the service to show the on-screen brightness indicator
        proxy.set_brightness(raw, 1).await?;
        Ok(())
    }

    /// Spawn a task forwarding service signals into the event channel.
    ///
    /// `BrightnessChanged` becomes [`BridgeEvent::BrightnessChanged`];
    /// `DisplayAdded` and `DisplayRemoved` both become
    /// [`BridgeEvent::TopologyChanged`] (the controller treats any topology
    /// change as fatal, so their payload is irrelevant).
    pub async fn spawn_signal_pump(
        &self,
        events: mpsc::Sender<BridgeEvent>,
    ) -> Result<(), BusError> {
        let proxy = ScreenBrightnessProxy::new(&self.conn).await?;
        let mut brightness_changed = proxy.receive_brightness_changed().await?;
        let mut display_added = proxy.receive_display_added().await?;
        let mut display_removed = proxy.receive_display_removed().await?;

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    Some(signal) = brightness_changed.next() => {
                        match signal.args() {
                            Ok(args) => {
                                let event = BridgeEvent::BrightnessChanged {
                                    device: args.display_name().to_string(),
                                    value: args.brightness().to_owned(),
                                };
                                if events.send(event).await.is_err() {
                                    break;
                                }
                            }
                            Err(e) => warn!("Malformed BrightnessChanged signal: {}", e),
                        }
                    }
                    Some(_) = display_added.next() => {
                        if events.send(BridgeEvent::TopologyChanged).await.is_err() {
                            break;
                        }
                    }
                    Some(_) = display_removed.next() => {
                        if events.send(BridgeEvent::TopologyChanged).await.is_err() {
                            break;
                        }
                    }
                    else => break,
                }
            }
            debug!("Bus signal pump stopped");
        });

        Ok(())
    }
}
