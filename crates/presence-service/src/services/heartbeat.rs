//! Heartbeat supervisor
//!
//! Per-user liveness watchdog. Every heartbeat rewrites the user's record with a
//! short expiry and re-arms an offline timer; the timer, not the record expiry, is
//! what takes a silent user offline. State changes are pushed to the broadcast
//! coordinator over an mpsc channel.
//!
//! Timers run as spawned tasks, so they start without a tenant binding. Each one
//! captures its `TenantId` when armed and re-enters that scope before touching the
//! store.
//!
//! Work on one user's presence (heartbeat, explicit offline, timer expiry, sweep)
//! runs under that user's gate, so a read-then-write on the store is never split
//! by another writer for the same user.

use std::ops::AddAssign;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use chrono::Utc;
use dashmap::DashMap;
use tokio::sync::{mpsc, Mutex, OwnedMutexGuard};
use tokio::task::AbortHandle;
use tracing::instrument;

use presence_cache::{KeyTtl, PresenceStore};
use presence_common::PresenceConfig;
use presence_core::{
    require_tenant, run_with_tenant, DeviceInfo, DomainError, PresenceRecord, PresenceStatus,
    TenantId, UserId,
};

use super::error::{ServiceError, ServiceResult};
use super::transition::{PresenceTransition, TransitionKind};

type TimerKey = (TenantId, UserId);

struct OfflineTimer {
    generation: u64,
    /// Status written by the heartbeat that armed this timer
    status: PresenceStatus,
    handle: AbortHandle,
}

/// Result of one [`HeartbeatSupervisor::sweep`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Records examined
    pub scanned: usize,
    /// Stale live records taken offline
    pub expired: usize,
    /// Records that had lost their expiry and got one back
    pub repaired: usize,
}

impl AddAssign for SweepReport {
    fn add_assign(&mut self, other: Self) {
        self.scanned += other.scanned;
        self.expired += other.expired;
        self.repaired += other.repaired;
    }
}

/// Exclusive hold on one user's presence, released on drop
struct UserGate<'a> {
    gates: &'a DashMap<TimerKey, Arc<Mutex<()>>>,
    key: TimerKey,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for UserGate<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        // Only the map still holds the gate once nobody is using or waiting on it
        self.gates.remove_if(&self.key, |_, gate| Arc::strong_count(gate) == 1);
    }
}

struct Inner {
    store: PresenceStore,
    config: PresenceConfig,
    timers: DashMap<TimerKey, OfflineTimer>,
    gates: DashMap<TimerKey, Arc<Mutex<()>>>,
    next_generation: AtomicU64,
    accepting: AtomicBool,
    transitions: mpsc::Sender<PresenceTransition>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        for timer in self.timers.iter() {
            timer.handle.abort();
        }
    }
}

/// Liveness watchdog over the presence store
#[derive(Clone)]
pub struct HeartbeatSupervisor {
    inner: Arc<Inner>,
}

impl HeartbeatSupervisor {
    pub fn new(
        store: PresenceStore,
        config: PresenceConfig,
        transitions: mpsc::Sender<PresenceTransition>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                config,
                timers: DashMap::new(),
                gates: DashMap::new(),
                next_generation: AtomicU64::new(1),
                accepting: AtomicBool::new(true),
                transitions,
            }),
        }
    }

    pub fn config(&self) -> &PresenceConfig {
        &self.inner.config
    }

    /// Record a heartbeat for `user_id` in the current tenant.
    ///
    /// Returns the transition it caused, if any. A repeated status only refreshes the
    /// record expiry and the timer. Store outages are logged and absorbed.
    #[instrument(skip(self, device_info), fields(user_id = %user_id, status = %status))]
    pub async fn process_heartbeat(
        &self,
        user_id: &UserId,
        status: PresenceStatus,
        device_info: DeviceInfo,
    ) -> ServiceResult<Option<PresenceTransition>> {
        if !self.inner.accepting.load(Ordering::SeqCst) {
            return Err(ServiceError::ShuttingDown);
        }
        let tenant_id = require_tenant("process heartbeat")?;
        if !status.is_live() {
            return self.set_offline(user_id).await;
        }

        let key = (tenant_id.clone(), user_id.clone());
        let _gate = self.inner.lock_user(&key).await;
        if !self.inner.accepting.load(Ordering::SeqCst) {
            return Err(ServiceError::ShuttingDown);
        }

        // The pending timer must not fire while this heartbeat is in flight
        let local = self.inner.disarm(&key);
        let previous = match self.inner.store.get_presence(user_id).await {
            Ok(Some(record)) => Some(record.status),
            Ok(None) => local,
            Err(e) => {
                if let Err(e) = absorb("read presence", e) {
                    self.inner.restore(key, local);
                    return Err(e);
                }
                local
            }
        };

        let record = PresenceRecord::new(user_id.clone(), status, device_info);
        if let Err(e) = self
            .inner
            .store
            .set_presence(user_id, &record, self.inner.config.online_ttl_secs)
            .await
        {
            if let Err(e) = absorb("write presence", e) {
                self.inner.restore(key, local);
                return Err(e);
            }
        }

        self.inner.arm(key, status);

        let Some(kind) = TransitionKind::between(previous, status) else {
            return Ok(None);
        };
        let transition = PresenceTransition::new(tenant_id, user_id.clone(), kind, status, previous);
        self.inner.emit(transition.clone()).await;
        Ok(Some(transition))
    }

    /// Take `user_id` offline now and clear its timer. A no-op if already offline.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn set_offline(&self, user_id: &UserId) -> ServiceResult<Option<PresenceTransition>> {
        let tenant_id = require_tenant("set offline")?;
        let key = (tenant_id.clone(), user_id.clone());
        let _gate = self.inner.lock_user(&key).await;
        let local = self.inner.disarm(&key);
        self.inner.go_offline(tenant_id, user_id, local).await
    }

    /// Reconcile the current tenant's records with the timers held here.
    ///
    /// Live records idle past the timeout window with no local timer are taken
    /// offline; records without an expiry get one back.
    #[instrument(skip(self))]
    pub async fn sweep(&self, page_size: usize) -> ServiceResult<SweepReport> {
        let tenant_id = require_tenant("sweep presence")?;
        let inner = &self.inner;
        let window = i64::try_from(inner.config.timeout_window_secs).unwrap_or(i64::MAX);
        let mut report = SweepReport::default();
        let mut cursor = 0;

        loop {
            let page = inner
                .store
                .scan_records("sweep presence", cursor, page_size.max(1))
                .await?;

            for record in page.records {
                report.scanned += 1;
                let key = (tenant_id.clone(), record.user_id.clone());

                if record.status.is_live()
                    && !inner.timers.contains_key(&key)
                    && record.idle_seconds(Utc::now()) > window
                {
                    let _gate = inner.lock_user(&key).await;
                    // A heartbeat may have landed while the page was read
                    if !inner.timers.contains_key(&key)
                        && inner
                            .go_offline(tenant_id.clone(), &record.user_id, None)
                            .await?
                            .is_some()
                    {
                        report.expired += 1;
                    }
                    continue;
                }

                if inner.store.ttl(&record.user_id).await? == KeyTtl::Persistent {
                    let ttl = if record.status.is_live() {
                        inner.config.online_ttl_secs
                    } else {
                        inner.config.offline_ttl_secs
                    };
                    if inner.store.set_expiry(&record.user_id, ttl).await? {
                        report.repaired += 1;
                    }
                }
            }

            cursor = page.next_cursor;
            if cursor == 0 || !inner.accepting.load(Ordering::SeqCst) {
                break;
            }
        }

        tracing::info!(
            tenant_id = %tenant_id,
            scanned = report.scanned,
            expired = report.expired,
            repaired = report.repaired,
            "Presence sweep finished"
        );
        Ok(report)
    }

    /// Stop accepting heartbeats and cancel every pending timer. Returns how many were cancelled.
    pub fn shutdown(&self) -> usize {
        self.inner.accepting.store(false, Ordering::SeqCst);
        let cancelled = self.inner.timers.len();
        for timer in self.inner.timers.iter() {
            timer.handle.abort();
        }
        self.inner.timers.clear();
        tracing::info!(cancelled, "Heartbeat supervisor stopped");
        cancelled
    }

    pub fn is_accepting(&self) -> bool {
        self.inner.accepting.load(Ordering::SeqCst)
    }

    /// Whether an offline timer is pending for the user
    pub fn is_tracking(&self, tenant_id: &TenantId, user_id: &UserId) -> bool {
        self.inner
            .timers
            .contains_key(&(tenant_id.clone(), user_id.clone()))
    }

    /// Number of pending offline timers
    pub fn tracked_count(&self) -> usize {
        self.inner.timers.len()
    }
}

impl Inner {
    /// Wait for exclusive use of the user's presence
    async fn lock_user(&self, key: &TimerKey) -> UserGate<'_> {
        let mut held = UserGate {
            gates: &self.gates,
            key: key.clone(),
            guard: None,
        };
        let gate = self.gates.entry(key.clone()).or_default().clone();
        held.guard = Some(gate.lock_owned().await);
        held
    }

    /// Cancel the user's pending timer, returning the status it was armed with
    fn disarm(&self, key: &TimerKey) -> Option<PresenceStatus> {
        self.timers.remove(key).map(|(_, timer)| {
            timer.handle.abort();
            timer.status
        })
    }

    /// Re-arm a timer taken by `disarm` when the heartbeat did not go through
    fn restore(self: &Arc<Self>, key: TimerKey, local: Option<PresenceStatus>) {
        if let Some(status) = local {
            self.arm(key, status);
        }
    }

    /// Replace the user's timer with a fresh one
    fn arm(self: &Arc<Self>, key: TimerKey, status: PresenceStatus) {
        let generation = self.next_generation.fetch_add(1, Ordering::SeqCst);
        let window = self.config.timeout_window();
        let weak: Weak<Self> = Arc::downgrade(self);
        let (tenant_id, user_id) = key.clone();

        let task = tokio::spawn(run_with_tenant(tenant_id, async move {
            tokio::time::sleep(window).await;
            if let Some(inner) = weak.upgrade() {
                inner.expire(user_id, generation).await;
            }
        }));

        let timer = OfflineTimer {
            generation,
            status,
            handle: task.abort_handle(),
        };
        if let Some(stale) = self.timers.insert(key, timer) {
            stale.handle.abort();
        }
    }

    /// Timer body; runs inside the tenant scope captured by `arm`
    async fn expire(&self, user_id: UserId, generation: u64) {
        if !self.accepting.load(Ordering::SeqCst) {
            return;
        }
        let Ok(tenant_id) = require_tenant("expire presence") else {
            return;
        };
        let key = (tenant_id.clone(), user_id.clone());
        let _gate = self.lock_user(&key).await;
        // Superseded while waiting for the gate
        let Some((_, timer)) = self
            .timers
            .remove_if(&key, |_, t| t.generation == generation)
        else {
            return;
        };

        tracing::debug!(tenant_id = %tenant_id, user_id = %user_id, "Heartbeat window elapsed");
        if let Err(e) = self.go_offline(tenant_id, &user_id, Some(timer.status)).await {
            tracing::warn!(user_id = %user_id, error = %e, "Failed to expire presence");
        }
    }

    async fn go_offline(
        &self,
        tenant_id: TenantId,
        user_id: &UserId,
        local: Option<PresenceStatus>,
    ) -> ServiceResult<Option<PresenceTransition>> {
        let record = match self.store.get_presence(user_id).await {
            Ok(record) => record,
            Err(e) => {
                absorb("read presence", e)?;
                None
            }
        };
        let previous = record.as_ref().map(|r| r.status).or(local);
        if !previous.is_some_and(PresenceStatus::is_live) {
            return Ok(None);
        }

        let offline = record.map_or_else(
            || PresenceRecord::new(user_id.clone(), PresenceStatus::Offline, DeviceInfo::default()),
            |r| r.to_offline(),
        );
        if let Err(e) = self
            .store
            .set_presence(user_id, &offline, self.config.offline_ttl_secs)
            .await
        {
            absorb("write offline presence", e)?;
        }

        let transition = PresenceTransition::new(
            tenant_id,
            user_id.clone(),
            TransitionKind::Offline,
            PresenceStatus::Offline,
            previous,
        );
        self.emit(transition.clone()).await;
        Ok(Some(transition))
    }

    async fn emit(&self, transition: PresenceTransition) {
        if self.transitions.send(transition).await.is_err() {
            tracing::debug!("Transition receiver closed; dropping transition");
        }
    }
}

/// Swallow transient store failures; anything else surfaces
fn absorb(operation: &'static str, err: DomainError) -> ServiceResult<()> {
    if err.is_transient() {
        tracing::warn!(operation, error = %err, "Presence store unavailable");
        Ok(())
    } else {
        Err(err.into())
    }
}
