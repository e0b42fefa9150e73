// Backend wire types
//
// Every REST response is wrapped in the `Envelope<T>` shape. Push payloads
// reuse the same record types. Fields use `#[serde(default)]` liberally:
// the push channel sends partial stats and hand-written simulators omit
// fields the Python backend always sets.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

// ── Response Envelope ────────────────────────────────────────────────

/// Standard backend response envelope.
///
/// ```json
/// { "success": true, "data": {...} }
/// { "success": false, "error": "..." }
/// { "success": true, "message": "Firewall enabled" }
/// ```
#[derive(Debug, Deserialize)]
pub struct Envelope<T> {
    pub success: bool,
    pub data: Option<T>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl<T> Envelope<T> {
    /// Best human-readable explanation carried by the envelope.
    pub fn reason(&self) -> Option<&str> {
        self.error.as_deref().or(self.message.as_deref())
    }
}

/// Confirmation returned by command endpoints (`{success, message}`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Ack {
    #[serde(default)]
    pub message: Option<String>,
}

// ── Service root ─────────────────────────────────────────────────────

/// Payload of `GET /` on the service root.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceStatus {
    pub status: String,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub mqtt_connected: bool,
}

// ── Security ─────────────────────────────────────────────────────────

/// One detected attack, as stored in the backend's attack log and as
/// emitted by the `attack_detected` push event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttackRecord {
    /// `critical` | `warning` | `info`
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    /// Display category, e.g. `"SQL Injection"`.
    pub category: String,
    pub message: String,
    /// Wall-clock label `HH:MM:SS`, or an ISO-8601 timestamp.
    #[serde(default)]
    pub time: Option<String>,
    /// `CRITICAL` | `HIGH` | `MEDIUM` | `INFO`
    #[serde(default)]
    pub severity: Option<String>,
    /// Offending address, when the detector knows it.
    #[serde(default)]
    pub source: Option<String>,
}

/// Payload of `ip_blocked` pushes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockedIp {
    pub ip: String,
    #[serde(default)]
    pub time: Option<String>,
}

// ── System ───────────────────────────────────────────────────────────

/// Host resource statistics (`GET /system/stats`, `system_stats` push).
///
/// Every field is optional so partial push payloads parse; the caller
/// decides whether a payload counts as a full snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SystemStats {
    #[serde(default)]
    pub cpu: Option<f64>,
    #[serde(default)]
    pub memory: Option<f64>,
    #[serde(default)]
    pub disk: Option<f64>,
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub network: Option<NetworkCounters>,
    #[serde(default)]
    pub connections: Option<u64>,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub warnings: Vec<String>,
}

/// Cumulative interface counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkCounters {
    #[serde(default)]
    pub bytes_sent: u64,
    #[serde(default)]
    pub bytes_recv: u64,
    #[serde(default)]
    pub packets_sent: u64,
    #[serde(default)]
    pub packets_recv: u64,
}

/// Payload of `system_warning` pushes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WarningPayload {
    pub warnings: Vec<String>,
    #[serde(default)]
    pub stats: Option<SystemStats>,
}

// ── Sensors ──────────────────────────────────────────────────────────

/// Latest reading of one sensor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorReading {
    #[serde(default)]
    pub value: f64,
    #[serde(default)]
    pub unit: String,
    #[serde(default = "default_active")]
    pub active: bool,
    /// ISO-8601 timestamp set by the backend when the reading arrived.
    #[serde(default)]
    pub timestamp: Option<String>,
}

fn default_active() -> bool {
    true
}

/// `GET /sensors` payload: sector key → sensor key → reading.
pub type SensorMap = HashMap<String, HashMap<String, SensorReading>>;

/// Payload of `sensor_update` pushes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensorUpdate {
    pub sector: String,
    pub sensor: String,
    pub data: SensorReading,
}

// ── Request bodies ───────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub(crate) struct SensorControlRequest<'a> {
    pub sector: &'a str,
    pub sensor: &'a str,
    pub action: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct MitigationRequest<'a> {
    pub measure: &'a str,
    pub enabled: bool,
}

#[derive(Debug, Serialize)]
pub(crate) struct AddressRequest<'a> {
    pub ip: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct ToggleRequest {
    pub enabled: bool,
}
