//! Config subcommand handlers.

use std::io::IsTerminal;

use dialoguer::{Confirm, Input};

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::config::{self, Config, Profile};
use crate::error::CliError;
use crate::output;

/// Map a dialoguer / interactive I/O failure into CliError.
fn prompt_err(e: impl std::fmt::Display) -> CliError {
    CliError::Validation {
        field: "interactive".into(),
        reason: format!("prompt failed: {e}"),
    }
}

/// Ask for a profile; `None` when the user declines to overwrite.
fn prompt_profile(global: &GlobalOpts, existing: &Config) -> Result<Option<(String, Profile)>, CliError> {
    let name: String = Input::new()
        .with_prompt("Profile name")
        .default(global.profile.clone().unwrap_or_else(|| "default".into()))
        .interact_text()
        .map_err(prompt_err)?;

    if existing.profiles.contains_key(&name)
        && !Confirm::new()
            .with_prompt(format!("Profile '{name}' exists. Overwrite?"))
            .default(false)
            .interact()
            .map_err(prompt_err)?
    {
        return Ok(None);
    }

    let api_url: String = Input::new()
        .with_prompt("Backend API URL")
        .default(
            global
                .api_url
                .clone()
                .unwrap_or_else(|| Profile::default().api_url),
        )
        .interact_text()
        .map_err(prompt_err)?;

    let socket_url: String = Input::new()
        .with_prompt("Socket.IO URL (blank: same host as the API)")
        .allow_empty(true)
        .default(global.socket_url.clone().unwrap_or_default())
        .interact_text()
        .map_err(prompt_err)?;

    let auto_report = Confirm::new()
        .with_prompt("Mail a report automatically on critical alerts?")
        .default(true)
        .interact()
        .map_err(prompt_err)?;

    Ok(Some((
        name,
        Profile {
            api_url,
            socket_url: (!socket_url.trim().is_empty()).then_some(socket_url),
            auto_report: Some(auto_report),
            ..Profile::default()
        },
    )))
}

/// Profile built from flags alone, for `-y` or non-interactive runs.
fn flag_profile(global: &GlobalOpts) -> (String, Profile) {
    let name = global.profile.clone().unwrap_or_else(|| "default".into());
    (name, config::apply_overrides(Profile::default(), global))
}

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Init => {
            let config_path = config::config_path();
            let mut cfg = config::load_config()?;

            let interactive = !global.yes && std::io::stdin().is_terminal();
            let (name, profile) = if interactive {
                eprintln!("campusctl configuration");
                eprintln!("   Config path: {}\n", config_path.display());
                match prompt_profile(global, &cfg)? {
                    Some(chosen) => chosen,
                    None => return Ok(()),
                }
            } else {
                flag_profile(global)
            };

            // validate before writing anything
            campus_config::profile_to_backend_config(&profile, &cfg.defaults)?;

            cfg.profiles.insert(name.clone(), profile);
            cfg.default_profile = Some(name.clone());
            let path = config::save_config(&cfg)?;

            output::print_done(
                &format!("Configuration written to {} (profile '{name}')", path.display()),
                global.quiet,
            );
            Ok(())
        }

        ConfigCommand::Show => {
            let cfg = config::load_config()?;
            let out = output::render_single(
                &global.output,
                &cfg,
                |c| toml::to_string_pretty(c).unwrap_or_else(|e| format!("<unprintable: {e}>")),
                |c| c.profiles.keys().cloned().collect::<Vec<_>>().join("\n"),
            )?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        ConfigCommand::Path => {
            output::print_output(&config::config_path().display().to_string(), false);
            Ok(())
        }
    }
}
