use reqwest::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("invalid registry address `{address}`: {reason}")]
    InvalidAddress { address: String, reason: String },

    #[error("failed to build registry HTTP client: {0}")]
    ClientBuild(#[source] reqwest::Error),

    #[error("registry request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("registry responded with {status}: {body}")]
    Status { status: StatusCode, body: String },
}

pub type Result<T, E = RegistryError> = std::result::Result<T, E>;
