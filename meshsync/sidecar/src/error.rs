use std::path::PathBuf;

use meshsync_config::ConfigError;
use meshsync_registry::RegistryError;
use miette::Diagnostic;
use thiserror::Error;

pub type SidecarResult<T, E = SidecarError> = std::result::Result<T, E>;

/// Errors that stop `connect-sidecar` before the sync loop starts.
///
/// Nothing that happens inside the loop ends up here: registry failures are retried and teardown
/// failures are only logged.
#[derive(Debug, Error, Diagnostic)]
pub enum SidecarError {
    #[error("-service-config must be set")]
    #[diagnostic(help("Pass the path of the HCL file declaring the service and its proxy."))]
    MissingServiceConfig,

    #[error("-service-config file {0:?} not found")]
    ServiceConfigNotFound(PathBuf),

    #[error("failed to load -service-config: {0}")]
    ServiceConfig(#[source] ConfigError),

    #[error("-sync-period is invalid: {value}: {source}")]
    #[diagnostic(help("Use a duration such as `10s`, `500ms` or `1m`."))]
    InvalidSyncPeriod {
        value: String,
        #[source]
        source: humantime::DurationError,
    },

    #[error("-sync-period must be greater than zero")]
    ZeroSyncPeriod,

    #[error("failed to read -token-file {path:?}: {source}")]
    TokenFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("-token-file {0:?} is empty")]
    EmptyTokenFile(PathBuf),

    #[error("failed to create registry client: {0}")]
    Registry(#[from] RegistryError),

    #[error("failed to install signal handlers: {0}")]
    Signal(#[source] std::io::Error),
}

impl From<ConfigError> for SidecarError {
    fn from(fail: ConfigError) -> Self {
        match fail {
            ConfigError::NotFound(path) => SidecarError::ServiceConfigNotFound(path),
            other => SidecarError::ServiceConfig(other),
        }
    }
}
