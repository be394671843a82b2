#![warn(clippy::indexing_slicing)]

use clap::Parser;
use meshsync_sidecar::{connect_sidecar, SidecarError};
use miette::Diagnostic;
use thiserror::Error;
use tracing::{error, info};

use crate::config::{normalize_flags, Cli, Commands};

mod config;
mod logging;

#[derive(Debug, Error, Diagnostic)]
enum CliError {
    #[error("failed to start the tokio runtime: {0}")]
    RuntimeError(#[source] std::io::Error),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Sidecar(#[from] SidecarError),
}

type CliResult<T, E = CliError> = core::result::Result<T, E>;

async fn run(cli: Cli) -> CliResult<()> {
    match cli.commands {
        Commands::ConnectSidecar(args) => {
            logging::init_tracing_registry(args.log_level.as_deref());

            let report = connect_sidecar(*args).await?;

            if report.teardown.is_clean() {
                info!(attempts = report.attempts, "connect-sidecar exiting successfully.");
            } else {
                // Shutdown still counts as successful, the agent drops the services with the pod.
                error!(teardown = ?report.teardown, "connect-sidecar could not deregister services.");
            }
        }
    }

    Ok(())
}

fn main() -> miette::Result<()> {
    let cli = Cli::parse_from(normalize_flags(std::env::args_os()));

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(CliError::RuntimeError)?;

    rt.block_on(run(cli)).map_err(Into::into)
}
