use std::{fmt, path::Path, str::FromStr};

use tracing::warn;

use crate::{
    error::{ConfigError, Result},
    loader,
};

/// Number of declarations a sidecar config must contain: the workload service and its proxy.
pub const EXPECTED_SERVICES: usize = 2;

/// Kind of a registry entry.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceKind {
    /// A regular workload service.
    #[default]
    Normal,

    /// A sidecar proxy fronting another service, registered with kind `connect-proxy`.
    ConnectProxy,
}

impl ServiceKind {
    const CONNECT_PROXY: &'static str = "connect-proxy";

    /// Value of the `Kind` field sent to the registry, [`None`] for normal services.
    pub fn as_registry_kind(&self) -> Option<&'static str> {
        match self {
            ServiceKind::Normal => None,
            ServiceKind::ConnectProxy => Some(Self::CONNECT_PROXY),
        }
    }
}

impl FromStr for ServiceKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "" => Ok(ServiceKind::Normal),
            Self::CONNECT_PROXY => Ok(ServiceKind::ConnectProxy),
            other => Err(format!("unsupported service kind `{other}`")),
        }
    }
}

impl fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_registry_kind().unwrap_or("normal"))
    }
}

/// The `proxy` block of a `connect-proxy` declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyConfig {
    pub destination_service_name: String,
    pub destination_service_id: String,
    pub local_service_port: u16,
}

/// One `services` block of the sidecar config.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceDeclaration {
    pub id: String,
    pub name: String,
    pub port: u16,
    pub kind: ServiceKind,
    pub proxy: Option<ProxyConfig>,
}

impl ServiceDeclaration {
    pub(crate) fn validate(&self) -> Result<(), String> {
        if self.id.is_empty() {
            return Err("`id` must not be empty".to_owned());
        }

        if self.name.is_empty() {
            return Err("`name` must not be empty".to_owned());
        }

        if self.port == 0 {
            return Err("`port` must be in range 1..=65535".to_owned());
        }

        match (&self.kind, &self.proxy) {
            (ServiceKind::ConnectProxy, None) => {
                Err("`connect-proxy` services require a `proxy` block".to_owned())
            }
            (
                ServiceKind::ConnectProxy,
                Some(ProxyConfig {
                    destination_service_name,
                    destination_service_id,
                    ..
                }),
            ) if destination_service_name.is_empty() || destination_service_id.is_empty() => {
                Err("`proxy` block must name its destination service".to_owned())
            }
            (
                _,
                Some(ProxyConfig {
                    local_service_port: 0,
                    ..
                }),
            ) => Err("`local_service_port` must be in range 1..=65535".to_owned()),
            _ => Ok(()),
        }
    }
}

/// The validated, ordered pair of declarations a sidecar keeps registered.
///
/// Registration follows declaration order, so the workload service is expected first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceSet {
    services: Vec<ServiceDeclaration>,
}

impl ServiceSet {
    /// Reads and validates the HCL file at `path`.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let contents = std::fs::read_to_string(path).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                ConfigError::NotFound(path.to_path_buf())
            } else {
                ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                }
            }
        })?;

        Self::from_hcl(&contents)
    }

    pub fn from_hcl(input: &str) -> Result<Self> {
        Self::new(loader::parse_services(input)?)
    }

    /// Validates `services` and wraps them.
    pub fn new(services: Vec<ServiceDeclaration>) -> Result<Self> {
        if services.len() != EXPECTED_SERVICES {
            return Err(ConfigError::ServiceCount(services.len()));
        }

        for (index, service) in services.iter().enumerate() {
            service
                .validate()
                .map_err(|reason| ConfigError::InvalidService { index, reason })?;
        }

        if let [first, second] = services.as_slice() {
            if first.id == second.id {
                return Err(ConfigError::DuplicateId(first.id.clone()));
            }
        }

        let set = Self { services };
        set.check_service_kinds();
        set.check_proxy_destination();

        Ok(set)
    }

    /// `true` when the set holds one workload service and one connect proxy.
    pub fn is_service_with_proxy(&self) -> bool {
        let proxies = self
            .services
            .iter()
            .filter(|service| service.kind == ServiceKind::ConnectProxy)
            .count();

        proxies == 1
    }

    /// The agent accepts any two services, so a pair of the same kind still gets registered.
    fn check_service_kinds(&self) {
        if !self.is_service_with_proxy() {
            warn!(
                kinds = ?self.services.iter().map(|service| service.kind).collect::<Vec<_>>(),
                "Expected one service and one connect proxy."
            );
        }
    }

    /// The proxy is allowed to point elsewhere, but that is almost always a templating mistake.
    fn check_proxy_destination(&self) {
        for proxy_service in &self.services {
            let Some(proxy) = proxy_service.proxy.as_ref() else {
                continue;
            };

            let points_at_sibling = self.services.iter().any(|service| {
                service.id != proxy_service.id && service.id == proxy.destination_service_id
            });

            if !points_at_sibling {
                warn!(
                    proxy_id = %proxy_service.id,
                    destination_service_id = %proxy.destination_service_id,
                    "Proxy destination is not declared in the same config."
                );
            }
        }
    }

    /// Declarations in registration order.
    pub fn services(&self) -> &[ServiceDeclaration] {
        &self.services
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.services.iter().map(|service| service.id.as_str())
    }
}

#[cfg(test)]
mod test {
    use rstest::rstest;

    use super::*;

    fn service(id: &str, port: u16) -> ServiceDeclaration {
        ServiceDeclaration {
            id: id.to_owned(),
            name: "service".to_owned(),
            port,
            kind: ServiceKind::Normal,
            proxy: None,
        }
    }

    fn proxy(id: &str, destination: &str) -> ServiceDeclaration {
        ServiceDeclaration {
            id: id.to_owned(),
            name: "service-sidecar-proxy".to_owned(),
            port: 2000,
            kind: ServiceKind::ConnectProxy,
            proxy: Some(ProxyConfig {
                destination_service_name: "service".to_owned(),
                destination_service_id: destination.to_owned(),
                local_service_port: 80,
            }),
        }
    }

    #[rstest]
    #[case("", Ok(ServiceKind::Normal))]
    #[case("connect-proxy", Ok(ServiceKind::ConnectProxy))]
    #[case("mesh-gateway", Err(()))]
    fn kind_from_str(#[case] input: &str, #[case] expected: Result<ServiceKind, ()>) {
        assert_eq!(input.parse::<ServiceKind>().map_err(|_| ()), expected);
    }

    #[test]
    fn valid_pair() {
        let set = ServiceSet::new(vec![
            service("service-id", 80),
            proxy("service-id-sidecar-proxy", "service-id"),
        ])
        .unwrap();

        assert_eq!(
            set.ids().collect::<Vec<_>>(),
            ["service-id", "service-id-sidecar-proxy"]
        );
    }

    #[rstest]
    #[case(vec![])]
    #[case(vec![service("a", 80)])]
    #[case(vec![service("a", 80), service("b", 81), service("c", 82)])]
    fn wrong_count(#[case] services: Vec<ServiceDeclaration>) {
        let expected = services.len();
        assert!(matches!(
            ServiceSet::new(services),
            Err(ConfigError::ServiceCount(count)) if count == expected
        ));
    }

    #[test]
    fn zero_port_is_rejected() {
        assert!(matches!(
            ServiceSet::new(vec![service("a", 0), proxy("a-proxy", "a")]),
            Err(ConfigError::InvalidService { index: 0, .. })
        ));
    }

    #[test]
    fn proxy_without_block_is_rejected() {
        let mut broken = proxy("a-proxy", "a");
        broken.proxy = None;

        assert!(matches!(
            ServiceSet::new(vec![service("a", 80), broken]),
            Err(ConfigError::InvalidService { index: 1, .. })
        ));
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        assert!(matches!(
            ServiceSet::new(vec![service("a", 80), proxy("a", "a")]),
            Err(ConfigError::DuplicateId(id)) if id == "a"
        ));
    }

    #[test]
    fn zero_local_service_port_is_rejected() {
        let mut broken = proxy("a-proxy", "a");
        if let Some(proxy) = broken.proxy.as_mut() {
            proxy.local_service_port = 0;
        }

        assert!(matches!(
            ServiceSet::new(vec![service("a", 80), broken]),
            Err(ConfigError::InvalidService { index: 1, reason }) if reason.contains("local_service_port")
        ));
    }

    #[rstest]
    #[case(vec![service("a", 80), proxy("a-proxy", "a")], true)]
    #[case(vec![proxy("a-proxy", "a"), service("a", 80)], true)]
    #[case(vec![service("a", 80), service("b", 81)], false)]
    #[case(vec![proxy("a-proxy", "a"), proxy("b-proxy", "a")], false)]
    fn same_kind_pairs_are_allowed(
        #[case] services: Vec<ServiceDeclaration>,
        #[case] expected: bool,
    ) {
        let set = ServiceSet::new(services).unwrap();

        assert_eq!(set.is_service_with_proxy(), expected);
    }

    #[test]
    fn mismatched_proxy_destination_is_allowed() {
        assert!(ServiceSet::new(vec![service("a", 80), proxy("a-proxy", "elsewhere")]).is_ok());
    }

    #[test]
    fn load_missing_file() {
        let error = ServiceSet::load("/does/not/exist").unwrap_err();

        assert!(matches!(error, ConfigError::NotFound(_)));
        assert_eq!(
            error.to_string(),
            r#"service config file "/does/not/exist" not found"#
        );
    }

    #[test]
    fn load_from_file() {
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(
            file.path(),
            r#"
            services {
              id   = "web"
              name = "web"
              port = 8080
            }
            services {
              id   = "web-sidecar-proxy"
              name = "web-sidecar-proxy"
              port = 20000
              kind = "connect-proxy"
              proxy {
                destination_service_name = "web"
                destination_service_id   = "web"
                local_service_port       = 8080
              }
            }
            "#,
        )
        .unwrap();

        let set = ServiceSet::load(file.path()).unwrap();
        assert_eq!(set.services()[1].port, 20000);
    }
}
