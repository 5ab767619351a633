//! Scheduled stale-record sweep
//!
//! An offline timer lives only as long as the process that armed it. Records left
//! live by a process that went away are repaired here: every interval the sweeper
//! lists the tenants holding records and runs [`HeartbeatSupervisor::sweep`] inside
//! each tenant's scope.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::instrument;

use presence_cache::PresenceStore;
use presence_core::run_with_tenant;

use super::error::ServiceResult;
use super::heartbeat::{HeartbeatSupervisor, SweepReport};

/// Keys read per scan round trip
pub const SWEEP_PAGE: usize = 100;

/// Runs the supervisor's sweep across all tenants
#[derive(Clone)]
pub struct PresenceSweeper {
    store: PresenceStore,
    supervisor: HeartbeatSupervisor,
    page_size: usize,
}

impl PresenceSweeper {
    pub fn new(store: PresenceStore, supervisor: HeartbeatSupervisor) -> Self {
        Self {
            store,
            supervisor,
            page_size: SWEEP_PAGE,
        }
    }

    /// Sweep every tenant once and add up the results.
    ///
    /// A tenant whose sweep fails is logged and skipped.
    #[instrument(skip(self))]
    pub async fn sweep_all(&self) -> ServiceResult<SweepReport> {
        let tenants = self.store.tenants_with_records(self.page_size).await?;
        let mut total = SweepReport::default();

        for tenant_id in tenants {
            if !self.supervisor.is_accepting() {
                break;
            }
            match run_with_tenant(tenant_id.clone(), self.supervisor.sweep(self.page_size)).await {
                Ok(report) => total += report,
                Err(e) => {
                    tracing::warn!(tenant_id = %tenant_id, error = %e, "Tenant sweep failed");
                }
            }
        }
        Ok(total)
    }

    /// Sweep once per `interval` until `shutdown` fires. The first sweep runs one
    /// interval after start.
    pub async fn run(self, interval: Duration, shutdown: CancellationToken) {
        let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tracing::info!(interval_secs = interval.as_secs(), "Presence sweeper started");

        loop {
            tokio::select! {
                biased;
                () = shutdown.cancelled() => break,
                _ = ticker.tick() => {}
            }
            if !self.supervisor.is_accepting() {
                break;
            }

            tokio::select! {
                biased;
                () = shutdown.cancelled() => break,
                result = self.sweep_all() => match result {
                    Ok(report) if report.expired + report.repaired > 0 => {
                        tracing::info!(
                            scanned = report.scanned,
                            expired = report.expired,
                            repaired = report.repaired,
                            "Stale presence repaired"
                        );
                    }
                    Ok(_) => {}
                    Err(e) => tracing::warn!(error = %e, "Presence sweep failed"),
                },
            }
        }
        tracing::info!("Presence sweeper stopped");
    }

    pub fn spawn(self, interval: Duration, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(interval, shutdown))
    }
}
