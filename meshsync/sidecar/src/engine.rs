//! Keeps the declared services present in the registry.
//!
//! [`SyncEngine`] owns the desired state (a validated [`ServiceSet`]) and the
//! [`RegistryClient`] used to assert it. It does not own any timing: the
//! [`LifecycleController`](crate::controller::LifecycleController) decides when to call
//! [`SyncEngine::run_once`] and when to [`SyncEngine::stop`].

use std::{fmt, time::Duration};

use meshsync_config::ServiceSet;
use meshsync_registry::{RegistryClient, RegistryError};
use tracing::{debug, error, info, warn};

/// Lifecycle of a [`SyncEngine`].
///
/// `Idle -> Running -> Stopping -> Stopped`, where `Stopped` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Idle,
    Running,
    Stopping,
    Stopped,
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self {
            EngineState::Idle => "idle",
            EngineState::Running => "running",
            EngineState::Stopping => "stopping",
            EngineState::Stopped => "stopped",
        };

        f.write_str(state)
    }
}

/// Result of the single deregistration pass done on shutdown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TeardownOutcome {
    /// Every declared service was removed from the registry.
    Deregistered,

    /// Some deregistration calls failed; holds the ids that could not be removed.
    Failed(Vec<String>),

    /// The teardown did not finish in time.
    TimedOut,

    /// The engine was not running, so there was nothing to tear down.
    Skipped,
}

impl TeardownOutcome {
    pub fn is_clean(&self) -> bool {
        matches!(self, TeardownOutcome::Deregistered | TeardownOutcome::Skipped)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AttemptOutcome {
    Registered,
    Failed,
}

/// Registers a [`ServiceSet`] as one logical unit.
pub struct SyncEngine<C> {
    client: C,
    services: ServiceSet,
    state: EngineState,
    /// Only used to avoid logging the same transition on every tick.
    last_outcome: Option<AttemptOutcome>,
}

impl<C> SyncEngine<C>
where
    C: RegistryClient,
{
    pub fn new(client: C, services: ServiceSet) -> Self {
        Self {
            client,
            services,
            state: EngineState::Idle,
            last_outcome: None,
        }
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn services(&self) -> &ServiceSet {
        &self.services
    }

    fn transition(&mut self, from: EngineState, to: EngineState) -> bool {
        if self.state != from {
            warn!(
                current = %self.state,
                expected = %from,
                requested = %to,
                "Ignoring invalid sync engine transition."
            );
            return false;
        }

        debug!(%from, %to, "Sync engine transition.");
        self.state = to;
        true
    }

    /// Moves the engine from `Idle` to `Running`.
    pub fn start(&mut self) -> bool {
        self.transition(EngineState::Idle, EngineState::Running)
    }

    /// Registers every declared service, in declaration order.
    ///
    /// Stops at the first failing call and fails the whole attempt; the next attempt registers
    /// everything again, which heals a partially applied one.
    #[tracing::instrument(level = "trace", skip(self), fields(state = %self.state))]
    pub async fn run_once(&mut self) -> Result<(), RegistryError> {
        let result = self.register_all().await;

        let outcome = match &result {
            Ok(()) => AttemptOutcome::Registered,
            Err(..) => AttemptOutcome::Failed,
        };

        match (&result, self.last_outcome) {
            (Ok(()), Some(AttemptOutcome::Registered)) => {
                debug!("Services are still registered.")
            }
            (Ok(()), _) => info!(
                services = ?self.services.ids().collect::<Vec<_>>(),
                "Services registered."
            ),
            (Err(fail), _) => warn!(%fail, "Failed to register services, will retry."),
        }

        self.last_outcome = Some(outcome);
        result
    }

    async fn register_all(&self) -> Result<(), RegistryError> {
        for service in self.services.services() {
            self.client.register_service(service).await?;
        }

        Ok(())
    }

    /// Removes every declared service from the registry, once.
    ///
    /// Every service is attempted even if an earlier call failed. Failures are logged and
    /// returned, never retried.
    pub async fn deregister_all(&self) -> TeardownOutcome {
        let mut failed = Vec::new();

        for service_id in self.services.ids() {
            if let Err(fail) = self.client.deregister_service(service_id).await {
                error!(%service_id, %fail, "Failed to deregister service.");
                failed.push(service_id.to_owned());
            }
        }

        if failed.is_empty() {
            info!("Services deregistered.");
            TeardownOutcome::Deregistered
        } else {
            TeardownOutcome::Failed(failed)
        }
    }

    /// Runs the shutdown sequence: `Running -> Stopping`, one bounded [`Self::deregister_all`],
    /// then `Stopped`.
    ///
    /// Calling this on an engine that is not running does nothing.
    pub async fn stop(&mut self, timeout: Duration) -> TeardownOutcome {
        if !self.transition(EngineState::Running, EngineState::Stopping) {
            return TeardownOutcome::Skipped;
        }

        let outcome = tokio::time::timeout(timeout, self.deregister_all())
            .await
            .unwrap_or_else(|_| {
                error!(?timeout, "Timed out deregistering services.");
                TeardownOutcome::TimedOut
            });

        self.transition(EngineState::Stopping, EngineState::Stopped);
        outcome
    }
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use meshsync_config::ServiceKind;

    use super::*;
    use crate::testing::{service_set, Call, FakeRegistry};

    #[tokio::test]
    async fn registers_both_services_in_order() {
        let registry = Arc::new(FakeRegistry::default());
        let mut engine = SyncEngine::new(registry.clone(), service_set());

        engine.start();
        engine.run_once().await.unwrap();

        assert_eq!(
            registry.calls(),
            [
                Call::Register("service-id".to_owned()),
                Call::Register("service-id-sidecar-proxy".to_owned()),
            ]
        );

        let service = registry.service("service-id").unwrap();
        assert_eq!(service.port, 80);
        assert_eq!(service.kind, ServiceKind::Normal);

        let proxy = registry.service("service-id-sidecar-proxy").unwrap();
        assert_eq!(proxy.port, 2000);
        assert_eq!(proxy.kind, ServiceKind::ConnectProxy);
        assert_eq!(
            proxy.proxy.unwrap().destination_service_id,
            "service-id".to_owned()
        );
    }

    #[tokio::test]
    async fn run_once_is_idempotent() {
        let registry = Arc::new(FakeRegistry::default());
        let mut engine = SyncEngine::new(registry.clone(), service_set());

        engine.start();
        for _ in 0..3 {
            engine.run_once().await.unwrap();
        }

        assert_eq!(registry.registered_ids(), ["service-id", "service-id-sidecar-proxy"]);
        assert_eq!(registry.calls().len(), 6);
    }

    #[tokio::test]
    async fn unavailable_registry_fails_attempt() {
        let registry = Arc::new(FakeRegistry::default());
        registry.set_available(false);
        let mut engine = SyncEngine::new(registry.clone(), service_set());

        engine.start();
        assert!(engine.run_once().await.is_err());
        assert!(registry.registered_ids().is_empty());

        registry.set_available(true);
        engine.run_once().await.unwrap();
        assert_eq!(registry.registered_ids().len(), 2);
    }

    #[tokio::test]
    async fn stop_deregisters_and_is_terminal() {
        let registry = Arc::new(FakeRegistry::default());
        let mut engine = SyncEngine::new(registry.clone(), service_set());

        assert_eq!(engine.state(), EngineState::Idle);
        engine.start();
        assert_eq!(engine.state(), EngineState::Running);
        engine.run_once().await.unwrap();

        assert_eq!(
            engine.stop(Duration::from_secs(1)).await,
            TeardownOutcome::Deregistered
        );
        assert_eq!(engine.state(), EngineState::Stopped);
        assert!(registry.registered_ids().is_empty());

        assert_eq!(
            engine.stop(Duration::from_secs(1)).await,
            TeardownOutcome::Skipped
        );
        assert!(!engine.start());
        assert_eq!(engine.state(), EngineState::Stopped);
    }

    #[tokio::test]
    async fn failed_deregistration_still_attempts_every_service() {
        let registry = Arc::new(FakeRegistry::default());
        let mut engine = SyncEngine::new(registry.clone(), service_set());

        engine.start();
        engine.run_once().await.unwrap();
        registry.set_available(false);

        assert_eq!(
            engine.stop(Duration::from_secs(1)).await,
            TeardownOutcome::Failed(vec![
                "service-id".to_owned(),
                "service-id-sidecar-proxy".to_owned()
            ])
        );
        assert_eq!(engine.state(), EngineState::Stopped);
        assert_eq!(
            registry.calls()[2..],
            [
                Call::Deregister("service-id".to_owned()),
                Call::Deregister("service-id-sidecar-proxy".to_owned()),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_teardown_times_out() {
        let registry = Arc::new(FakeRegistry::default());
        let mut engine = SyncEngine::new(registry.clone(), service_set());

        engine.start();
        engine.run_once().await.unwrap();
        registry.set_stalled(true);

        assert_eq!(
            engine.stop(Duration::from_secs(5)).await,
            TeardownOutcome::TimedOut
        );
        assert_eq!(engine.state(), EngineState::Stopped);
    }
}
