//! Walks the parsed HCL body and turns `services` blocks into [`ServiceDeclaration`]s.
//!
//! Only structural validation happens here (attribute types, required keys); semantic checks are
//! done by [`ServiceSet::new`](crate::ServiceSet::new).

use hcl::{Body, Expression};

use crate::{
    error::{ConfigError, Result},
    service::{ProxyConfig, ServiceDeclaration, ServiceKind},
};

const SERVICES_BLOCK: &str = "services";
const PROXY_BLOCK: &str = "proxy";

pub(crate) fn parse_services(input: &str) -> Result<Vec<ServiceDeclaration>> {
    let body = hcl::parse(input)?;

    body.blocks()
        .filter(|block| block.identifier() == SERVICES_BLOCK)
        .enumerate()
        .map(|(index, block)| {
            service_from_body(block.body())
                .map_err(|reason| ConfigError::InvalidService { index, reason })
        })
        .collect()
}

fn service_from_body(body: &Body) -> Result<ServiceDeclaration, String> {
    let kind = optional_string(body, "kind")?
        .map(|kind| kind.parse::<ServiceKind>())
        .transpose()?
        .unwrap_or_default();

    let mut proxy_blocks = body
        .blocks()
        .filter(|block| block.identifier() == PROXY_BLOCK);

    let proxy = proxy_blocks
        .next()
        .map(|block| proxy_from_body(block.body()))
        .transpose()?;

    if proxy_blocks.next().is_some() {
        return Err("only one `proxy` block is allowed".to_owned());
    }

    Ok(ServiceDeclaration {
        id: required_string(body, "id")?,
        name: required_string(body, "name")?,
        port: required_port(body, "port")?,
        kind,
        proxy,
    })
}

fn proxy_from_body(body: &Body) -> Result<ProxyConfig, String> {
    Ok(ProxyConfig {
        destination_service_name: required_string(body, "destination_service_name")?,
        destination_service_id: required_string(body, "destination_service_id")?,
        local_service_port: required_port(body, "local_service_port")?,
    })
}

fn attribute<'b>(body: &'b Body, key: &str) -> Option<&'b Expression> {
    body.attributes()
        .find(|attribute| attribute.key() == key)
        .map(|attribute| attribute.expr())
}

fn optional_string(body: &Body, key: &str) -> Result<Option<String>, String> {
    match attribute(body, key) {
        None => Ok(None),
        Some(Expression::String(value)) => Ok(Some(value.clone())),
        Some(_) => Err(format!("`{key}` must be a string")),
    }
}

fn required_string(body: &Body, key: &str) -> Result<String, String> {
    optional_string(body, key)?.ok_or_else(|| format!("`{key}` is required"))
}

fn required_port(body: &Body, key: &str) -> Result<u16, String> {
    match attribute(body, key) {
        None => Err(format!("`{key}` is required")),
        Some(Expression::Number(number)) => number
            .as_u64()
            .and_then(|port| u16::try_from(port).ok())
            .ok_or_else(|| format!("`{key}` must be in range 1..=65535")),
        Some(_) => Err(format!("`{key}` must be a number")),
    }
}
