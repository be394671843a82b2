use std::time::Duration;

use meshsync_registry::RegistryClient;
use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::engine::{EngineState, SyncEngine, TeardownOutcome};

/// How long a registration attempt that is in flight when the interrupt arrives may keep going
/// before it is dropped.
pub const IN_FLIGHT_GRACE: Duration = Duration::from_secs(2);

/// Upper bound for the deregistration pass done on shutdown.
pub const TEARDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Cloneable handle that stops a running [`LifecycleController`].
///
/// Interrupting is idempotent: only the first call has an effect.
#[derive(Debug, Clone)]
pub struct InterruptHandle(CancellationToken);

impl InterruptHandle {
    pub fn interrupt(&self) {
        if self.0.is_cancelled() {
            debug!("Shutdown already in progress, ignoring interrupt.");
        } else {
            info!("Interrupt received, shutting down.");
        }

        self.0.cancel();
    }

    pub fn is_interrupted(&self) -> bool {
        self.0.is_cancelled()
    }
}

/// What happened during a run, returned once the controller is done.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShutdownReport {
    /// Registration attempts started, including one abandoned on interrupt.
    pub attempts: u64,
    pub teardown: TeardownOutcome,
}

/// Drives a [`SyncEngine`]: one attempt right away, then another `sync_period` after each attempt
/// finishes, until interrupted.
pub struct LifecycleController<C> {
    engine: SyncEngine<C>,
    sync_period: Duration,
    cancellation_token: CancellationToken,
}

impl<C> LifecycleController<C>
where
    C: RegistryClient,
{
    /// `sync_period` must be non-zero, otherwise attempts run back to back.
    pub fn new(engine: SyncEngine<C>, sync_period: Duration) -> Self {
        Self {
            engine,
            sync_period,
            cancellation_token: CancellationToken::new(),
        }
    }

    pub fn interrupt_handle(&self) -> InterruptHandle {
        InterruptHandle(self.cancellation_token.clone())
    }

    /// Runs until the [`InterruptHandle`] fires, then tears down and reports.
    ///
    /// Attempts never overlap, and the wait before the next one only starts once the previous
    /// attempt is done, so a slow agent still gets a full `sync_period` of rest.
    #[tracing::instrument(level = "debug", skip(self), fields(sync_period = ?self.sync_period))]
    pub async fn run(mut self) -> ShutdownReport {
        let cancellation_token = self.cancellation_token.clone();
        let mut attempts = 0;

        self.engine.start();

        let mut delay = Duration::ZERO;

        loop {
            tokio::select! {
                biased;

                _ = cancellation_token.cancelled() => break,

                _ = time::sleep(delay) => {}
            }

            delay = self.sync_period;
            attempts += 1;

            let attempt = self.engine.run_once();
            tokio::pin!(attempt);

            let finished = tokio::select! {
                biased;

                // Errors were already logged by the engine, the next attempt retries.
                _ = &mut attempt => true,

                _ = cancellation_token.cancelled() => false,
            };

            if !finished {
                if time::timeout(IN_FLIGHT_GRACE, &mut attempt).await.is_err() {
                    warn!(grace = ?IN_FLIGHT_GRACE, "Abandoning in-flight registration attempt.");
                }

                break;
            }
        }

        debug_assert_eq!(self.engine.state(), EngineState::Running);

        let teardown = self.engine.stop(TEARDOWN_TIMEOUT).await;
        info!(attempts, ?teardown, "Sync loop stopped.");

        ShutdownReport { attempts, teardown }
    }
}
