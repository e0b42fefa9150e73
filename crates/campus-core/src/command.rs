// ── Command API ──────────────────────────────────────────────────────
//
// Every operator action flows through `Command`. The reconciler sends it to
// the data source and only touches the view model once the source has
// confirmed it; `ResetLogs` is purely local.

use std::fmt;
use std::net::IpAddr;

use crate::model::{AlertEvent, MitigationControl, SensorAction};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    // ── Sensors ──────────────────────────────────────────────────────
    ControlSensor {
        sector: String,
        sensor: String,
        action: SensorAction,
    },

    // ── Mitigation ───────────────────────────────────────────────────
    ToggleMitigation {
        control: MitigationControl,
        enabled: bool,
    },
    RestartNetworkServices,

    // ── Firewall ─────────────────────────────────────────────────────
    BlockAddress(IpAddr),
    UnblockAddress(IpAddr),

    // ── Email ────────────────────────────────────────────────────────
    SendEmailReport,
    ToggleEmailAlerts { enabled: bool },

    // ── Local ────────────────────────────────────────────────────────
    ResetLogs,
}

impl Command {
    /// Whether the command needs a source round trip.
    pub fn is_remote(&self) -> bool {
        !matches!(self, Self::ResetLogs)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ControlSensor {
                sector,
                sensor,
                action,
            } => write!(f, "turn {sector}/{sensor} {action}"),
            Self::ToggleMitigation { control, enabled } => {
                write!(f, "{} {control}", if *enabled { "enable" } else { "disable" })
            }
            Self::RestartNetworkServices => f.write_str("restart network services"),
            Self::BlockAddress(ip) => write!(f, "block {ip}"),
            Self::UnblockAddress(ip) => write!(f, "unblock {ip}"),
            Self::SendEmailReport => f.write_str("send email report"),
            Self::ToggleEmailAlerts { enabled } => {
                write!(f, "{} email alerts", if *enabled { "enable" } else { "disable" })
            }
            Self::ResetLogs => f.write_str("reset logs"),
        }
    }
}

/// Result of a confirmed command.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandOutcome {
    /// Whether the view model changed.
    pub changed: bool,
    /// Local feed entry recorded for the action, if any.
    pub alert: Option<AlertEvent>,
}
