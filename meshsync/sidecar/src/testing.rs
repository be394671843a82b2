//! In-memory registry used by the unit tests.

use std::{
    collections::BTreeMap,
    sync::{
        atomic::{AtomicBool, Ordering},
        Mutex,
    },
    time::Duration,
};

use async_trait::async_trait;
use meshsync_config::{ServiceDeclaration, ServiceSet};
use meshsync_registry::{RegistryClient, RegistryError, StatusCode};
use tokio::time::{self, Instant};

pub(crate) const SERVICES_REGISTRATION: &str = r#"
services {
  id   = "service-id"
  name = "service"
  port = 80
}
services {
  id   = "service-id-sidecar-proxy"
  name = "service-sidecar-proxy"
  port = 2000
  kind = "connect-proxy"
  proxy {
    destination_service_name = "service"
    destination_service_id   = "service-id"
    local_service_port       = 80
  }
}"#;

pub(crate) fn service_set() -> ServiceSet {
    ServiceSet::from_hcl(SERVICES_REGISTRATION).unwrap()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Call {
    Register(String),
    Deregister(String),
}

/// Registry keyed by service id, so registering the same declaration twice keeps one entry.
#[derive(Debug)]
pub(crate) struct FakeRegistry {
    services: Mutex<BTreeMap<String, ServiceDeclaration>>,
    /// Every call with the (tokio) time it was made at.
    calls: Mutex<Vec<(Call, Instant)>>,
    available: AtomicBool,
    stalled: AtomicBool,
    delay: Mutex<Duration>,
}

impl Default for FakeRegistry {
    fn default() -> Self {
        Self {
            services: Default::default(),
            calls: Default::default(),
            available: AtomicBool::new(true),
            stalled: AtomicBool::new(false),
            delay: Mutex::new(Duration::ZERO),
        }
    }
}

impl FakeRegistry {
    pub(crate) fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Makes every following call hang forever.
    pub(crate) fn set_stalled(&self, stalled: bool) {
        self.stalled.store(stalled, Ordering::SeqCst);
    }

    /// Makes every following call take `delay` before answering.
    pub(crate) fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = delay;
    }

    pub(crate) fn calls(&self) -> Vec<Call> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(call, _)| call.clone())
            .collect()
    }

    pub(crate) fn timed_calls(&self) -> Vec<(Call, Instant)> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn registered_ids(&self) -> Vec<String> {
        self.services.lock().unwrap().keys().cloned().collect()
    }

    pub(crate) fn service(&self, id: &str) -> Option<ServiceDeclaration> {
        self.services.lock().unwrap().get(id).cloned()
    }

    async fn record(&self, call: Call) -> Result<(), RegistryError> {
        self.calls.lock().unwrap().push((call, Instant::now()));

        let delay = *self.delay.lock().unwrap();
        if !delay.is_zero() {
            time::sleep(delay).await;
        }

        if self.stalled.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }

        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(RegistryError::Status {
                status: StatusCode::SERVICE_UNAVAILABLE,
                body: "agent unavailable".to_owned(),
            })
        }
    }
}

#[async_trait]
impl RegistryClient for FakeRegistry {
    async fn register_service(&self, service: &ServiceDeclaration) -> Result<(), RegistryError> {
        self.record(Call::Register(service.id.clone())).await?;
        self.services
            .lock()
            .unwrap()
            .insert(service.id.clone(), service.clone());

        Ok(())
    }

    async fn deregister_service(&self, service_id: &str) -> Result<(), RegistryError> {
        self.record(Call::Deregister(service_id.to_owned())).await?;
        self.services.lock().unwrap().remove(service_id);

        Ok(())
    }
}
