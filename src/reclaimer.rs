//! Periodic stale-lease reclamation.
//!
//! One reclaimer runs per process on its own cancellable execution context,
//! independent of any request-handling worker. Each tick sweeps the tenant's
//! expired leases back to the pool; shutdown is signalled through a watch
//! channel and joined with a bounded wait so process exit never hangs on a
//! sweep.

use crate::queue::ports::QueueRepository;
use crate::task::domain::TenantId;
use crate::task::ports::{TaskEventSink, TaskRepository};
use crate::task::services::LeaseService;
use chrono::Duration;
use mockable::Clock;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Tuning knobs for the reclaimer loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReclaimerConfig {
    /// Delay between sweeps.
    pub interval: std::time::Duration,
    /// Lease age that counts as stale.
    pub stale_after: Duration,
}

impl Default for ReclaimerConfig {
    fn default() -> Self {
        Self {
            interval: std::time::Duration::from_secs(60),
            stale_after: Duration::minutes(30),
        }
    }
}

/// Handle to a running stale-lease reclaimer.
pub struct StaleLeaseReclaimer {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl StaleLeaseReclaimer {
    /// Spawns the reclaimer loop on the current tokio runtime.
    #[must_use]
    pub fn spawn<T, Q, E, C>(
        lease: LeaseService<T, Q, E, C>,
        tenant: TenantId,
        config: ReclaimerConfig,
    ) -> Self
    where
        T: TaskRepository + 'static,
        Q: QueueRepository + 'static,
        E: TaskEventSink + 'static,
        C: Clock + Send + Sync + 'static,
    {
        let (shutdown, mut observe) = watch::channel(false);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(config.interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        match lease.release_stale(tenant, config.stale_after).await {
                            Ok(0) => {}
                            Ok(reclaimed) => {
                                info!(reclaimed, "reclaimed stale leases");
                            }
                            Err(err) => {
                                warn!(error = %err, "stale-lease sweep failed; will retry next tick");
                            }
                        }
                    }
                    changed = observe.changed() => {
                        if changed.is_err() || *observe.borrow() {
                            break;
                        }
                    }
                }
            }
        });
        Self { shutdown, handle }
    }

    /// Signals shutdown and waits for the loop to finish, bounded by
    /// `wait_for`.
    pub async fn shutdown_and_join(self, wait_for: std::time::Duration) {
        if self.shutdown.send(true).is_err() {
            warn!("reclaimer loop already exited before the shutdown signal");
        }
        if tokio::time::timeout(wait_for, self.handle).await.is_err() {
            warn!("reclaimer did not stop within the shutdown window");
        }
    }
}
