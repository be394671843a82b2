use std::time::Duration;

use async_trait::async_trait;
use meshsync_config::ServiceDeclaration;
use reqwest::{Client, RequestBuilder, Url};
use tracing::debug;

use crate::{
    error::{RegistryError, Result},
    wire::ServiceRegistration,
    RegistryClient,
};

/// Address of the local agent when none is configured.
pub const DEFAULT_AGENT_ADDRESS: &str = "127.0.0.1:8500";

/// Header carrying the ACL token, when the sidecar was given one.
pub const TOKEN_HEADER: &str = "X-Consul-Token";

/// Upper bound for a single agent call. The sync loop imposes no timeout of its own.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// [`RegistryClient`] talking to the agent's HTTP API.
///
/// The underlying [`Client`] keeps its connection pool, so a single instance should be reused
/// for the whole run.
#[derive(Debug, Clone)]
pub struct AgentClient {
    http: Client,
    base: Url,
    token: Option<String>,
}

impl AgentClient {
    /// Accepts either `host:port` (plain HTTP is assumed) or a full `http(s)://` URL.
    pub fn new(address: &str) -> Result<Self> {
        let base = parse_address(address)?;

        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(RegistryError::ClientBuild)?;

        Ok(Self {
            http,
            base,
            token: None,
        })
    }

    /// Sends `token` in [`TOKEN_HEADER`] on every request.
    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token;
        self
    }

    pub fn address(&self) -> &Url {
        &self.base
    }

    fn endpoint<'s, I>(&self, segments: I) -> Result<Url>
    where
        I: IntoIterator<Item = &'s str>,
    {
        let mut url = self.base.clone();

        url.path_segments_mut()
            .map_err(|()| RegistryError::InvalidAddress {
                address: self.base.to_string(),
                reason: "address cannot be used as a base URL".to_owned(),
            })?
            .pop_if_empty()
            .extend(segments);

        Ok(url)
    }

    async fn send(&self, request: RequestBuilder) -> Result<()> {
        let request = match self.token.as_deref() {
            Some(token) => request.header(TOKEN_HEADER, token),
            None => request,
        };

        let response = request.send().await?;
        let status = response.status();

        if status.is_success() {
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(RegistryError::Status {
                status,
                body: body.trim().to_owned(),
            })
        }
    }
}

#[async_trait]
impl RegistryClient for AgentClient {
    #[tracing::instrument(level = "debug", skip_all, fields(service_id = %service.id), err)]
    async fn register_service(&self, service: &ServiceDeclaration) -> Result<()> {
        let url = self.endpoint(["v1", "agent", "service", "register"])?;
        debug!(%url, port = service.port, kind = %service.kind, "Registering service.");

        self.send(self.http.put(url).json(&ServiceRegistration::from(service)))
            .await
    }

    #[tracing::instrument(level = "debug", skip(self), err)]
    async fn deregister_service(&self, service_id: &str) -> Result<()> {
        let url = self.endpoint(["v1", "agent", "service", "deregister", service_id])?;
        debug!(%url, "Deregistering service.");

        self.send(self.http.put(url)).await
    }
}

fn parse_address(address: &str) -> Result<Url> {
    let invalid = |reason: String| RegistryError::InvalidAddress {
        address: address.to_owned(),
        reason,
    };

    let address = address.trim();
    if address.is_empty() {
        return Err(invalid("address is empty".to_owned()));
    }

    let url = if address.contains("://") {
        Url::parse(address)
    } else {
        Url::parse(&format!("http://{address}"))
    }
    .map_err(|error| invalid(error.to_string()))?;

    match url.scheme() {
        "http" | "https" => {}
        other => return Err(invalid(format!("unsupported scheme `{other}`"))),
    }

    if url.cannot_be_a_base() || url.host().is_none() {
        return Err(invalid("address has no host".to_owned()));
    }

    Ok(url)
}
