mod cli;
mod commands;
mod config;
mod error;
mod output;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use campus_core::{
    DataSource, Reconciler, ReconcilerConfig, RemoteSource, SimulatedSource, SimulationConfig,
};

use crate::cli::{Cli, Command, GlobalOpts};
use crate::error::CliError;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_tracing(cli.global.verbose);

    // miette renders the diagnostic; the variant picks the exit status
    if let Err(err) = run(cli).await {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}

fn init_tracing(verbosity: u8) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let Cli { global, command } = cli;
    match command {
        // No backend session for local-only commands
        Command::Config(args) => commands::config_cmd::handle(args, &global),

        Command::Completions(args) => {
            use clap::CommandFactory;
            use clap_complete::generate;

            let mut cmd = Cli::command();
            generate(args.shell, &mut cmd, "campusctl", &mut std::io::stdout());
            Ok(())
        }

        cmd => {
            let resolved = config::resolve(&global)?;
            if global.simulate {
                let source = SimulatedSource::new(SimulationConfig::default());
                drive(source, resolved.reconciler, cmd, &global).await
            } else {
                let source = RemoteSource::new(resolved.backend)?;
                drive(source, resolved.reconciler, cmd, &global).await
            }
        }
    }
}

/// Run `cmd` against `source`: a live session for `watch`, otherwise a
/// one-shot session that is torn down before returning.
async fn drive<S: DataSource>(
    source: S,
    config: ReconcilerConfig,
    cmd: Command,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    if let Command::Watch(args) = cmd {
        return commands::watch::run(source, config, args, global).await;
    }

    tracing::debug!(command = ?cmd, backend = %source.describe(), "dispatching command");
    Reconciler::oneshot(config, source, |reconciler| async move {
        commands::dispatch(cmd, &reconciler, global).await
    })
    .await
}
