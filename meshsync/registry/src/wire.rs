//! JSON bodies of the agent service API.

use meshsync_config::{ProxyConfig, ServiceDeclaration};
use serde::Serialize;

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct ServiceRegistration<'s> {
    #[serde(rename = "ID")]
    pub id: &'s str,
    pub name: &'s str,
    pub port: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proxy: Option<ProxyRegistration<'s>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct ProxyRegistration<'s> {
    pub destination_service_name: &'s str,
    #[serde(rename = "DestinationServiceID")]
    pub destination_service_id: &'s str,
    pub local_service_port: u16,
}

impl<'s> From<&'s ServiceDeclaration> for ServiceRegistration<'s> {
    fn from(service: &'s ServiceDeclaration) -> Self {
        ServiceRegistration {
            id: &service.id,
            name: &service.name,
            port: service.port,
            kind: service.kind.as_registry_kind(),
            proxy: service.proxy.as_ref().map(ProxyRegistration::from),
        }
    }
}

impl<'s> From<&'s ProxyConfig> for ProxyRegistration<'s> {
    fn from(proxy: &'s ProxyConfig) -> Self {
        ProxyRegistration {
            destination_service_name: &proxy.destination_service_name,
            destination_service_id: &proxy.destination_service_id,
            local_service_port: proxy.local_service_port,
        }
    }
}
