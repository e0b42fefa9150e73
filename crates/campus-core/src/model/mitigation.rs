// ── Mitigation controls ──────────────────────────────────────────────

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoEnumIterator};

/// Operator-toggleable defenses. The string form is the key the backend's
/// `/mitigation/toggle` endpoint expects.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase", ascii_case_insensitive)]
pub enum MitigationControl {
    Firewall,
    Fail2ban,
    RateLimit,
    ArpProtection,
    PortSecurity,
}

impl MitigationControl {
    pub fn label(self) -> &'static str {
        match self {
            Self::Firewall => "UFW Firewall",
            Self::Fail2ban => "Fail2Ban",
            Self::RateLimit => "Rate Limiting",
            Self::ArpProtection => "ARP Protection",
            Self::PortSecurity => "Port Security",
        }
    }

    /// State the dashboard assumes before the operator touches anything.
    pub fn default_enabled(self) -> bool {
        matches!(self, Self::Firewall | Self::Fail2ban | Self::PortSecurity)
    }
}

/// Local cache of the backend's mitigation flags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MitigationStatus {
    flags: BTreeMap<MitigationControl, bool>,
}

impl Default for MitigationStatus {
    fn default() -> Self {
        Self {
            flags: MitigationControl::iter()
                .map(|c| (c, c.default_enabled()))
                .collect(),
        }
    }
}

impl MitigationStatus {
    pub fn is_enabled(&self, control: MitigationControl) -> bool {
        self.flags.get(&control).copied().unwrap_or(false)
    }

    /// Returns `true` if the flag changed.
    pub fn set(&mut self, control: MitigationControl, enabled: bool) -> bool {
        self.flags.insert(control, enabled) != Some(enabled)
    }

    pub fn iter(&self) -> impl Iterator<Item = (MitigationControl, bool)> + '_ {
        self.flags.iter().map(|(c, on)| (*c, *on))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn wire_keys_are_camel_case() {
        assert_eq!(MitigationControl::Fail2ban.to_string(), "fail2ban");
        assert_eq!(MitigationControl::RateLimit.to_string(), "rateLimit");
        assert_eq!(
            "arpprotection".parse::<MitigationControl>().unwrap(),
            MitigationControl::ArpProtection
        );
    }

    #[test]
    fn defaults_match_dashboard() {
        let status = MitigationStatus::default();
        assert!(status.is_enabled(MitigationControl::Firewall));
        assert!(status.is_enabled(MitigationControl::Fail2ban));
        assert!(!status.is_enabled(MitigationControl::RateLimit));
        assert!(!status.is_enabled(MitigationControl::ArpProtection));
        assert!(status.is_enabled(MitigationControl::PortSecurity));
    }

    #[test]
    fn set_reports_change() {
        let mut status = MitigationStatus::default();
        assert!(!status.set(MitigationControl::Firewall, true));
        assert!(status.set(MitigationControl::Firewall, false));
        assert!(!status.is_enabled(MitigationControl::Firewall));
    }
}
