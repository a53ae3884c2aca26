//! Display discovery and the entity registry.
//!
//! Discovery probes every display the bus reports, then matches each label
//! against the configured patterns. The resulting registry is an ordered
//! snapshot, rebuilt wholesale on every run; a label matching several
//! patterns yields one entry per pattern, each treated as an independent
//! entity.

use tracing::{info, warn};

use crate::bus::{BrightnessBus, BusError};
use crate::config::LightPattern;

/// A display registered against a configured entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayInfo {
    /// Bus-local display name (e.g. "display0")
    pub device: String,
    /// Entity identifier from the configuration
    pub entity: String,
    /// Human-readable display label
    pub label: String,
    /// Native maximum brightness, always > 0
    pub max_brightness: i32,
}

/// A display as probed from the bus, before pattern matching.
#[derive(Debug, Clone)]
pub struct ProbedDisplay {
    pub device: String,
    pub label: String,
    pub max_brightness: i32,
}

/// Ordered snapshot of all registered displays.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    entries: Vec<DisplayInfo>,
}

impl Registry {
    /// Match probed displays against the configured patterns.
    ///
    /// Displays whose label matches no pattern, and displays reporting a
    /// non-positive maximum brightness, are excluded with a warning.
    pub fn from_probed(probed: &[ProbedDisplay], patterns: &[LightPattern]) -> Self {
        let mut entries = Vec::new();

        for probed_display in probed {
            if probed_display.max_brightness <= 0 {
                warn!(
                    "Display '{}' reports maximum brightness {}; skipping",
                    probed_display.device, probed_display.max_brightness
                );
                continue;
            }

            let mut matched = false;
            for light in patterns {
                if light.pattern.is_match(&probed_display.label) {
                    entries.push(DisplayInfo {
                        device: probed_display.device.clone(),
                        entity: light.entity.clone(),
                        label: probed_display.label.clone(),
                        max_brightness: probed_display.max_brightness,
                    });
                    matched = true;
                }
            }

            if !matched {
                warn!(
                    "No configured pattern matches display '{}' with label \"{}\"",
                    probed_display.device, probed_display.label
                );
            }
        }

        Self { entries }
    }

    pub fn entries(&self) -> &[DisplayInfo] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All entries backed by the given bus device.
    pub fn by_device<'a>(&'a self, device: &'a str) -> impl Iterator<Item = &'a DisplayInfo> {
        self.entries.iter().filter(move |e| e.device == device)
    }

    /// First entry registered for the given entity, if any.
    pub fn by_entity(&self, entity: &str) -> Option<&DisplayInfo> {
        self.entries.iter().find(|e| e.entity == entity)
    }

    /// Configured entities with no registered display.
    pub fn missing_entities<'a>(&self, patterns: &'a [LightPattern]) -> Vec<&'a str> {
        patterns
            .iter()
            .filter(|light| self.by_entity(&light.entity).is_none())
            .map(|light| light.entity.as_str())
            .collect()
    }
}

/// Discover displays on the bus and build the registry.
///
/// Failing to read the display-name list is fatal; a property-fetch failure
/// for a single display only skips that display.
pub async fn discover(
    bus: &BrightnessBus,
    patterns: &[LightPattern],
) -> Result<Registry, BusError> {
    let names = bus.display_names().await?;
    let mut probed = Vec::with_capacity(names.len());

    for name in names {
        match bus.probe_display(&name).await {
            Ok(display) => probed.push(display),
            Err(e) => warn!("Failed to probe display '{}': {}; skipping", name, e),
        }
    }

    let registry = Registry::from_probed(&probed, patterns);
    for entry in registry.entries() {
        info!(
            "Registered display '{}' as entity '{}' (label \"{}\", max brightness {})",
            entry.device, entry.entity, entry.label, entry.max_brightness
        );
    }

    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use regex::Regex;

    fn pattern(entity: &str, pattern: &str) -> LightPattern {
        LightPattern {
            entity: entity.to_string(),
            pattern: Regex::new(pattern).unwrap(),
        }
    }

    fn probed(device: &str, label: &str, max: i32) -> ProbedDisplay {
        ProbedDisplay {
            device: device.to_string(),
            label: label.to_string(),
            max_brightness: max,
        }
    }

    #[test]
    fn test_single_match() {
        let registry = Registry::from_probed(
            &[probed("display0", "eDP-1", 10000)],
            &[pattern("laptop", "eDP.*")],
        );

        assert_eq!(
            registry.entries(),
            &[DisplayInfo {
                device: "display0".to_string(),
                entity: "laptop".to_string(),
                label: "eDP-1".to_string(),
                max_brightness: 10000,
            }]
        );
    }

    #[test]
    fn test_unmatched_label_excluded() {
        let registry = Registry::from_probed(
            &[
                probed("display0", "eDP-1", 10000),
                probed("display1", "HDMI-A-1", 100),
            ],
            &[pattern("laptop", "eDP.*")],
        );

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.entries()[0].device, "display0");
    }

    #[test]
    fn test_label_matching_two_patterns_yields_two_entries() {
        let registry = Registry::from_probed(
            &[probed("display0", "eDP-1", 10000)],
            &[pattern("laptop", "eDP.*"), pattern("panel", ".*-1$")],
        );

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.entries()[0].device, "display0");
        assert_eq!(registry.entries()[1].device, "display0");
        assert_eq!(registry.entries()[0].entity, "laptop");
        assert_eq!(registry.entries()[1].entity, "panel");
    }

    #[test]
    fn test_zero_max_brightness_rejected() {
        let registry = Registry::from_probed(
            &[probed("display0", "eDP-1", 0)],
            &[pattern("laptop", "eDP.*")],
        );

        assert!(registry.is_empty());
    }

    #[test]
    fn test_by_device_multiple_entries() {
        let registry = Registry::from_probed(
            &[probed("display0", "eDP-1", 10000)],
            &[pattern("laptop", "eDP.*"), pattern("panel", "eDP-1")],
        );

        let entities: Vec<_> = registry
            .by_device("display0")
            .map(|e| e.entity.as_str())
            .collect();
        assert_eq!(entities, ["laptop", "panel"]);
        assert_eq!(registry.by_device("display9").count(), 0);
    }

    #[test]
    fn test_missing_entities() {
        let patterns = [pattern("laptop", "eDP.*"), pattern("external", "DP-.*")];
        let registry = Registry::from_probed(&[probed("display0", "eDP-1", 10000)], &patterns);

        assert_eq!(registry.missing_entities(&patterns), ["external"]);
    }
}
