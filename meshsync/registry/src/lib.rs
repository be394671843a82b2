#![warn(clippy::indexing_slicing)]

//! Client side of the registry agent's service API.
//!
//! The sidecar only needs two operations from the agent, captured by [`RegistryClient`]:
//! registering a [`ServiceDeclaration`](meshsync_config::ServiceDeclaration) and deregistering a
//! service by id. [`AgentClient`] implements them over the agent's HTTP API.

pub mod agent;
pub mod error;
mod wire;

use std::sync::Arc;

use async_trait::async_trait;
use meshsync_config::ServiceDeclaration;

pub use reqwest::StatusCode;

pub use crate::{
    agent::AgentClient,
    error::{RegistryError, Result},
};

/// The registry operations the sync loop relies on.
///
/// Both calls must be idempotent on the registry side: registering an identical declaration
/// twice leaves a single entry.
#[async_trait]
pub trait RegistryClient: Send + Sync {
    async fn register_service(&self, service: &ServiceDeclaration) -> Result<()>;

    async fn deregister_service(&self, service_id: &str) -> Result<()>;
}

#[async_trait]
impl<C> RegistryClient for Arc<C>
where
    C: RegistryClient + ?Sized,
{
    async fn register_service(&self, service: &ServiceDeclaration) -> Result<()> {
        self.as_ref().register_service(service).await
    }

    async fn deregister_service(&self, service_id: &str) -> Result<()> {
        self.as_ref().deregister_service(service_id).await
    }
}
