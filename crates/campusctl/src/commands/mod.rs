//! Command dispatch: bridges CLI args -> reconciler commands -> output formatting.

pub mod attacks;
pub mod config_cmd;
pub mod email;
pub mod mitigation;
pub mod security;
pub mod sensors;
pub mod system;
pub mod util;
pub mod watch;

use campus_core::{DataSource, Reconciler};

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

/// Dispatch a one-shot, backend-bound command to its handler.
pub async fn dispatch<S: DataSource>(
    cmd: Command,
    reconciler: &Reconciler<S>,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match cmd {
        Command::Sensors(args) => sensors::handle(reconciler, args, global).await,
        Command::Attacks(args) => attacks::handle(reconciler, args, global).await,
        Command::System(args) => system::handle(reconciler, args, global).await,
        Command::Security(args) => security::handle(reconciler, args, global).await,
        Command::Mitigation(args) => mitigation::handle(reconciler, args, global).await,
        Command::Email(args) => email::handle(reconciler, args, global).await,
        Command::Watch(_) | Command::Config(_) | Command::Completions(_) => Err(
            CliError::Internal("command is not dispatched through a one-shot session".into()),
        ),
    }
}
