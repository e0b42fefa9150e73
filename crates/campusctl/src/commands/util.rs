//! Shared helpers for command handlers.

use std::io::IsTerminal;

use campus_core::CommandOutcome;

use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::output;

/// Prompt for confirmation, auto-approving if `--yes` was passed.
///
/// Without a terminal to prompt on, refuses instead of hanging.
pub fn confirm(action: &str, message: &str, yes_flag: bool) -> Result<bool, CliError> {
    if yes_flag {
        return Ok(true);
    }
    if !std::io::stdin().is_terminal() {
        return Err(CliError::NonInteractiveRequiresYes {
            action: action.into(),
        });
    }
    let confirmed = dialoguer::Confirm::new()
        .with_prompt(message)
        .default(false)
        .interact()
        .map_err(|e| CliError::Io(std::io::Error::other(e)))?;
    Ok(confirmed)
}

/// Report a confirmed command: its feed entry if it made one, else `fallback`.
pub fn report_outcome(outcome: &CommandOutcome, fallback: &str, global: &GlobalOpts) {
    let message = outcome
        .alert
        .as_ref()
        .map_or(fallback, |alert| alert.message.as_str());
    output::print_done(message, global.quiet);
}
