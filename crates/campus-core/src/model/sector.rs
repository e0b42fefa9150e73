// ── Campus sectors and sensors ───────────────────────────────────────

use std::net::{IpAddr, Ipv4Addr};

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Connectivity {
    Online,
    Offline,
}

/// Requested sensor state for a control command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum SensorAction {
    On,
    Off,
}

impl SensorAction {
    pub fn is_on(self) -> bool {
        matches!(self, Self::On)
    }
}

impl From<bool> for SensorAction {
    fn from(on: bool) -> Self {
        if on { Self::On } else { Self::Off }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorState {
    pub active: bool,
    pub value: f64,
    pub unit: String,
    /// `None` until the sensor has reported at least once.
    pub last_update: Option<DateTime<Utc>>,
}

impl SensorState {
    /// A sensor known from the layout that has not reported yet.
    pub fn unreported(unit: &str) -> Self {
        Self {
            active: false,
            value: 0.0,
            unit: unit.to_owned(),
            last_update: None,
        }
    }

    /// Relative age label, e.g. `"3s ago"`.
    pub fn last_update_label(&self, now: DateTime<Utc>) -> String {
        let Some(at) = self.last_update else {
            return "never".to_owned();
        };
        let secs = (now - at).num_seconds().max(0);
        match secs {
            0..60 => format!("{secs}s ago"),
            60..3600 => format!("{}m ago", secs / 60),
            3600..86_400 => format!("{}h ago", secs / 3600),
            _ => format!("{}d ago", secs / 86_400),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectorState {
    pub name: String,
    pub ip_address: Option<IpAddr>,
    pub esp32_node_id: Option<String>,
    pub connectivity: Connectivity,
    pub sensors: IndexMap<String, SensorState>,
}

impl SectorState {
    /// A sector reported by the backend that is not part of the layout.
    pub fn placeholder(key: &str) -> Self {
        Self {
            name: key.to_owned(),
            ip_address: None,
            esp32_node_id: None,
            connectivity: Connectivity::Offline,
            sensors: IndexMap::new(),
        }
    }

    pub fn active_sensor_count(&self) -> usize {
        self.sensors.values().filter(|s| s.active).count()
    }
}

// ── Campus layout ────────────────────────────────────────────────────

struct SectorSpec {
    key: &'static str,
    name: &'static str,
    ip: [u8; 4],
    node: &'static str,
    sensors: &'static [(&'static str, &'static str)],
}

const LAYOUT: &[SectorSpec] = &[
    SectorSpec {
        key: "buildingA",
        name: "Building A",
        ip: [192, 168, 1, 101],
        node: "ESP32-Node-01",
        sensors: &[("motion", ""), ("light", "%"), ("temperature", "°C"), ("smoke", "ppm")],
    },
    SectorSpec {
        key: "buildingB",
        name: "Building B",
        ip: [192, 168, 1, 102],
        node: "ESP32-Node-02",
        sensors: &[("motion", ""), ("light", "%"), ("temperature", "°C"), ("smoke", "ppm")],
    },
    SectorSpec {
        key: "parking",
        name: "Parking Area",
        ip: [192, 168, 1, 103],
        node: "ESP32-Node-03",
        sensors: &[("ultrasonic", "cm"), ("ir", ""), ("light", "%"), ("gate", "")],
    },
    SectorSpec {
        key: "park",
        name: "Park Zone",
        ip: [192, 168, 1, 104],
        node: "ESP32-Node-04",
        sensors: &[("soilMoisture", "%"), ("light", "%"), ("sound", "dB"), ("temperature", "°C")],
    },
];

/// The four campus sectors with their ESP32 nodes and sensor sets, none of
/// which has reported yet.
pub fn campus_layout() -> IndexMap<String, SectorState> {
    LAYOUT
        .iter()
        .map(|spec| {
            let [a, b, c, d] = spec.ip;
            let sector = SectorState {
                name: spec.name.to_owned(),
                ip_address: Some(IpAddr::V4(Ipv4Addr::new(a, b, c, d))),
                esp32_node_id: Some(spec.node.to_owned()),
                connectivity: Connectivity::Offline,
                sensors: spec
                    .sensors
                    .iter()
                    .map(|(key, unit)| ((*key).to_owned(), SensorState::unreported(unit)))
                    .collect(),
            };
            (spec.key.to_owned(), sector)
        })
        .collect()
}

/// Layout entry for `key`, or a placeholder for sectors outside it.
pub fn sector_template(key: &str) -> SectorState {
    LAYOUT
        .iter()
        .position(|spec| spec.key == key)
        .and_then(|idx| campus_layout().swap_remove_index(idx))
        .map_or_else(
            || SectorState::placeholder(key),
            |(_, mut sector)| {
                sector.sensors.clear();
                sector
            },
        )
}

/// Normalize a backend key (`building_a`, `soil_moisture`) to the
/// camelCase form the layout uses (`buildingA`, `soilMoisture`).
pub fn normalize_key(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut upper_next = false;
    for ch in raw.trim().chars() {
        if ch == '_' || ch == '-' || ch == ' ' {
            upper_next = !out.is_empty();
        } else if upper_next {
            out.extend(ch.to_uppercase());
            upper_next = false;
        } else {
            out.push(ch);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    #[test]
    fn layout_has_four_sectors_in_order() {
        let layout = campus_layout();
        let keys: Vec<_> = layout.keys().map(String::as_str).collect();
        assert_eq!(keys, ["buildingA", "buildingB", "parking", "park"]);
        assert_eq!(layout["parking"].sensors.len(), 4);
        assert_eq!(
            layout["park"].esp32_node_id.as_deref(),
            Some("ESP32-Node-04")
        );
        assert!(
            layout
                .values()
                .all(|s| s.connectivity == Connectivity::Offline)
        );
    }

    #[test]
    fn keys_normalize_to_camel_case() {
        assert_eq!(normalize_key("building_a"), "buildingA");
        assert_eq!(normalize_key("soil_moisture"), "soilMoisture");
        assert_eq!(normalize_key("buildingA"), "buildingA");
        assert_eq!(normalize_key("parking"), "parking");
        assert_eq!(normalize_key("_gate"), "gate");
    }

    #[test]
    fn template_keeps_metadata_without_sensors() {
        let tpl = sector_template("buildingB");
        assert_eq!(tpl.name, "Building B");
        assert!(tpl.sensors.is_empty());

        let unknown = sector_template("library");
        assert_eq!(unknown.name, "library");
        assert!(unknown.ip_address.is_none());
    }

    #[test]
    fn last_update_labels() {
        let now = Utc::now();
        let mut sensor = SensorState::unreported("%");
        assert_eq!(sensor.last_update_label(now), "never");
        sensor.last_update = Some(now - Duration::seconds(3));
        assert_eq!(sensor.last_update_label(now), "3s ago");
        sensor.last_update = Some(now - Duration::minutes(5));
        assert_eq!(sensor.last_update_label(now), "5m ago");
    }

    #[test]
    fn sensor_action_parsing() {
        assert_eq!("ON".parse::<SensorAction>().ok(), Some(SensorAction::On));
        assert_eq!(SensorAction::from(false), SensorAction::Off);
        assert_eq!(SensorAction::Off.to_string(), "off");
    }
}
