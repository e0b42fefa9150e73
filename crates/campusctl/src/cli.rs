//! Clap derive structures for the `campusctl` CLI.
//!
//! Defines the complete command tree, global flags, and shared types.

use std::net::IpAddr;

use clap::{Args, Parser, Subcommand, ValueEnum};

use campus_core::MitigationControl;

// ── Top-Level CLI ────────────────────────────────────────────────────

/// campusctl -- operate the Smart Campus security backend from a terminal
#[derive(Debug, Parser)]
#[command(
    name = "campusctl",
    version,
    about = "Monitor and control the Smart Campus network from the command line",
    long_about = "Live view of campus sensors, attack detection and system health.\n\n\
        Talks to the campus backend over REST and Socket.IO, or to a built-in\n\
        simulation with --simulate.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Backend profile to use
    #[arg(long, short = 'p', env = "CAMPUS_PROFILE", global = true)]
    pub profile: Option<String>,

    /// REST API root (overrides profile)
    #[arg(long, env = "CAMPUS_API_URL", global = true)]
    pub api_url: Option<String>,

    /// Socket.IO origin (overrides profile; derived from --api-url if omitted)
    #[arg(long, env = "CAMPUS_SOCKET_URL", global = true)]
    pub socket_url: Option<String>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "CAMPUS_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Skip confirmation prompts
    #[arg(long, short = 'y', global = true)]
    pub yes: bool,

    /// Accept self-signed TLS certificates
    #[arg(long, short = 'k', env = "CAMPUS_INSECURE", global = true)]
    pub insecure: bool,

    /// Request timeout, e.g. `10s` (overrides profile)
    #[arg(long, env = "CAMPUS_TIMEOUT", global = true)]
    pub timeout: Option<String>,

    /// Use the built-in simulated backend instead of a real one
    #[arg(long, global = true)]
    pub simulate: bool,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
    /// Plain text, one value per line (scripting)
    Plain,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

/// Two-state switch argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Switch {
    On,
    Off,
}

impl Switch {
    pub fn is_on(self) -> bool {
        matches!(self, Self::On)
    }
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Inspect and switch sector sensors
    #[command(alias = "sensor", alias = "s")]
    Sensors(SensorsArgs),

    /// Attack log and per-category counters
    #[command(alias = "a")]
    Attacks(AttacksArgs),

    /// System health and backend status
    #[command(alias = "sys")]
    System(SystemArgs),

    /// Block and unblock IP addresses
    #[command(alias = "sec")]
    Security(SecurityArgs),

    /// Mitigation controls (firewall, fail2ban, rate limiting, ...)
    #[command(alias = "mit")]
    Mitigation(MitigationArgs),

    /// Email reports and alert notifications
    Email(EmailArgs),

    /// Follow live alerts, health and link state until Ctrl-C
    Watch(WatchArgs),

    /// Manage CLI configuration and profiles
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Sensors ──────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct SensorsArgs {
    #[command(subcommand)]
    pub command: SensorsCommand,
}

#[derive(Debug, Subcommand)]
pub enum SensorsCommand {
    /// List sensors grouped by sector
    #[command(alias = "ls")]
    List {
        /// Only show this sector (e.g. `parking`, `buildingA`)
        #[arg(long)]
        sector: Option<String>,
    },

    /// Switch a sensor on or off
    Set {
        /// Sector key
        sector: String,
        /// Sensor name within the sector
        sensor: String,
        /// Desired state
        state: Switch,
    },
}

// ── Attacks ──────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct AttacksArgs {
    #[command(subcommand)]
    pub command: AttacksCommand,
}

#[derive(Debug, Subcommand)]
pub enum AttacksCommand {
    /// Show the attack log, newest first
    #[command(alias = "ls")]
    List {
        /// Max entries to show
        #[arg(long, short = 'l')]
        limit: Option<usize>,
    },

    /// Per-category attack counters
    Stats,
}

// ── System ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct SystemArgs {
    #[command(subcommand)]
    pub command: SystemCommand,
}

#[derive(Debug, Subcommand)]
pub enum SystemCommand {
    /// Current resource gauges
    Stats,

    /// Backend reachability per data family
    Status,
}

// ── Security ─────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct SecurityArgs {
    #[command(subcommand)]
    pub command: SecurityCommand,
}

#[derive(Debug, Subcommand)]
pub enum SecurityCommand {
    /// Block an address at the firewall
    Block {
        /// IPv4 or IPv6 address
        ip: IpAddr,
    },

    /// Remove a firewall block
    Unblock {
        /// IPv4 or IPv6 address
        ip: IpAddr,
    },
}

// ── Mitigation ───────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct MitigationArgs {
    #[command(subcommand)]
    pub command: MitigationCommand,
}

#[derive(Debug, Subcommand)]
pub enum MitigationCommand {
    /// Show the last known state of every control
    #[command(alias = "ls")]
    List,

    /// Enable or disable a control
    Set {
        /// firewall, fail2ban, rateLimit, arpProtection or portSecurity
        #[arg(value_parser = parse_control)]
        control: MitigationControl,
        /// Desired state
        state: Switch,
    },

    /// Restart network services on the gateway
    RestartNetwork,
}

fn parse_control(raw: &str) -> Result<MitigationControl, String> {
    let normalized: String = raw.chars().filter(|c| *c != '-' && *c != '_').collect();
    normalized.parse().map_err(|_| {
        format!(
            "unknown control '{raw}' (expected firewall, fail2ban, rateLimit, arpProtection, portSecurity)"
        )
    })
}

// ── Email ────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct EmailArgs {
    #[command(subcommand)]
    pub command: EmailCommand,
}

#[derive(Debug, Subcommand)]
pub enum EmailCommand {
    /// Mail a security report now
    Report,

    /// Turn automatic alert mails on or off
    Alerts {
        /// Desired state
        state: Switch,
    },
}

// ── Watch ────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Poll period for counters and health, e.g. `5s` (`off` to disable)
    #[arg(long)]
    pub interval: Option<String>,

    /// Do not subscribe to live push events
    #[arg(long)]
    pub no_push: bool,

    /// Do not print health lines
    #[arg(long)]
    pub alerts_only: bool,
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Create initial config file with guided setup
    Init,

    /// Display current resolved configuration
    Show,

    /// Print the config file location
    Path,
}

// ── Completions ──────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn command_tree_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn control_names_accept_common_spellings() {
        assert_eq!(parse_control("rateLimit").unwrap(), MitigationControl::RateLimit);
        assert_eq!(parse_control("rate-limit").unwrap(), MitigationControl::RateLimit);
        assert_eq!(parse_control("FAIL2BAN").unwrap(), MitigationControl::Fail2ban);
        assert!(parse_control("selinux").is_err());
    }

    #[test]
    fn sensor_set_parses_switch() {
        let cli = Cli::try_parse_from(["campusctl", "sensors", "set", "parking", "gate", "off"])
            .unwrap();
        let Command::Sensors(SensorsArgs {
            command: SensorsCommand::Set { sector, sensor, state },
        }) = cli.command
        else {
            panic!("expected sensors set");
        };
        assert_eq!((sector.as_str(), sensor.as_str(), state), ("parking", "gate", Switch::Off));
    }

    #[test]
    fn block_rejects_bad_address() {
        assert!(Cli::try_parse_from(["campusctl", "security", "block", "10.0.0"]).is_err());
        assert!(Cli::try_parse_from(["campusctl", "security", "block", "10.0.0.7"]).is_ok());
    }
}
