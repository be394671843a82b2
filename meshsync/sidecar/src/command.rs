//! The `connect-sidecar` command: resolves its flags, builds the sync loop and runs it until the
//! process receives SIGINT or SIGTERM.

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use clap::Args;
use meshsync_config::ServiceSet;
use meshsync_registry::{agent::DEFAULT_AGENT_ADDRESS, AgentClient, RegistryClient};
use tokio::signal::unix::{signal, SignalKind};
use tracing::{debug, info};

use crate::{
    controller::{InterruptHandle, LifecycleController, ShutdownReport},
    engine::SyncEngine,
    error::{SidecarError, SidecarResult},
};

/// Environment variable holding the agent address, set by the injected container spec.
pub const REGISTRY_HTTP_ADDR_ENV: &str = "REGISTRY_HTTP_ADDR";

pub const DEFAULT_SYNC_PERIOD: &str = "10s";

/// Keep the workload's service and its proxy registered with the local agent.
#[derive(Args, Debug, Clone)]
pub struct ConnectSidecarArgs {
    /// Address of the registry agent's HTTP API, `host:port` or a full URL.
    #[arg(long, env = REGISTRY_HTTP_ADDR_ENV, default_value = DEFAULT_AGENT_ADDRESS)]
    pub http_addr: String,

    /// HCL file declaring the service and its connect proxy.
    #[arg(long)]
    pub service_config: Option<PathBuf>,

    /// Time between registrations, e.g. `10s`.
    #[arg(long, default_value = DEFAULT_SYNC_PERIOD)]
    pub sync_period: String,

    /// File holding the ACL token sent with every registry request.
    #[arg(long)]
    pub token_file: Option<PathBuf>,

    /// Log filter, overrides `RUST_LOG` (e.g. `info` or `meshsync_sidecar=debug`).
    #[arg(long)]
    pub log_level: Option<String>,
}

/// Everything `connect-sidecar` needs, validated.
#[derive(Debug, Clone)]
pub struct SidecarConfig {
    pub http_addr: String,
    pub services: ServiceSet,
    pub sync_period: Duration,
    pub token: Option<String>,
}

impl ConnectSidecarArgs {
    /// Validates the flags and loads every file they point at.
    ///
    /// Performs no registry calls, so any error returned here happens before the loop starts.
    pub fn resolve(&self) -> SidecarResult<SidecarConfig> {
        let service_config = self
            .service_config
            .as_ref()
            .filter(|path| !path.as_os_str().is_empty())
            .ok_or(SidecarError::MissingServiceConfig)?;

        let sync_period = parse_sync_period(&self.sync_period)?;
        let services = ServiceSet::load(service_config)?;

        let token = self
            .token_file
            .as_deref()
            .map(read_token)
            .transpose()?;

        Ok(SidecarConfig {
            http_addr: self.http_addr.clone(),
            services,
            sync_period,
            token,
        })
    }
}

fn parse_sync_period(value: &str) -> SidecarResult<Duration> {
    let sync_period =
        humantime::parse_duration(value.trim()).map_err(|source| SidecarError::InvalidSyncPeriod {
            value: value.to_owned(),
            source,
        })?;

    if sync_period.is_zero() {
        Err(SidecarError::ZeroSyncPeriod)
    } else {
        Ok(sync_period)
    }
}

fn read_token(path: &Path) -> SidecarResult<String> {
    let token = std::fs::read_to_string(path)
        .map_err(|source| SidecarError::TokenFile {
            path: path.to_path_buf(),
            source,
        })?
        .trim()
        .to_owned();

    if token.is_empty() {
        Err(SidecarError::EmptyTokenFile(path.to_path_buf()))
    } else {
        Ok(token)
    }
}

/// Builds the controller for `config` on top of any [`RegistryClient`].
pub fn sidecar_controller<C>(config: SidecarConfig, client: C) -> LifecycleController<C>
where
    C: RegistryClient,
{
    LifecycleController::new(SyncEngine::new(client, config.services), config.sync_period)
}

/// Builds the [`AgentClient`] for `config`.
pub fn agent_client(config: &SidecarConfig) -> SidecarResult<AgentClient> {
    Ok(AgentClient::new(&config.http_addr)?.with_token(config.token.clone()))
}

/// Forwards SIGINT and SIGTERM to `interrupt` for as long as the process runs.
///
/// Handlers are installed before returning, so a signal arriving right after is not lost.
fn forward_signals(interrupt: InterruptHandle) -> SidecarResult<()> {
    let mut sigint = signal(SignalKind::interrupt()).map_err(SidecarError::Signal)?;
    let mut sigterm = signal(SignalKind::terminate()).map_err(SidecarError::Signal)?;

    tokio::spawn(async move {
        loop {
            let received = tokio::select! {
                received = sigint.recv() => received.map(|()| "SIGINT"),
                received = sigterm.recv() => received.map(|()| "SIGTERM"),
            };

            let Some(signal) = received else {
                debug!("Signal stream closed.");
                break;
            };

            debug!(signal, "Signal received.");
            interrupt.interrupt();
        }
    });

    Ok(())
}

/// Entry point of `connect-sidecar`.
///
/// Returns an error only for configuration problems found before the first registration. Once
/// the loop runs, the command always finishes with a [`ShutdownReport`].
#[tracing::instrument(level = "trace", ret)]
pub async fn connect_sidecar(args: ConnectSidecarArgs) -> SidecarResult<ShutdownReport> {
    let config = args.resolve()?;
    let client = agent_client(&config)?;

    info!(
        address = %client.address(),
        sync_period = ?config.sync_period,
        services = ?config.services.ids().collect::<Vec<_>>(),
        "Starting connect sidecar."
    );

    let controller = sidecar_controller(config, client);
    forward_signals(controller.interrupt_handle())?;

    Ok(controller.run().await)
}
