use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("service config file {0:?} not found")]
    NotFound(PathBuf),

    #[error("failed to read service config file {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse service config: {0}")]
    Parse(#[from] hcl::Error),

    #[error("expected 2 services to be defined, found {0}")]
    ServiceCount(usize),

    #[error("service #{index} is invalid: {reason}")]
    InvalidService { index: usize, reason: String },

    #[error("service id `{0}` is declared more than once")]
    DuplicateId(String),
}

pub type Result<T, E = ConfigError> = std::result::Result<T, E>;
