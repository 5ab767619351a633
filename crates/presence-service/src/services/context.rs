//! Service context - dependency container for the presence services
//!
//! Wiring runs leaf to root: connection graph, presence store, heartbeat
//! supervisor, broadcast coordinator. The supervisor and coordinator are joined
//! by a bounded mpsc channel created here. The sweeper runs beside them when the
//! config gives it an interval.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use presence_cache::{PresenceStore, SharedKeyValueStore};
use presence_common::PresenceConfig;
use presence_core::SharedEdgeCollection;

use super::broadcast::{PresenceBroadcastCoordinator, PresenceTransport};
use super::error::{ServiceError, ServiceResult};
use super::graph::ConnectionGraphService;
use super::heartbeat::HeartbeatSupervisor;
use super::query::PresenceQueryService;
use super::sweep::PresenceSweeper;

/// Service context containing all presence services
#[derive(Clone)]
pub struct ServiceContext {
    config: PresenceConfig,
    graph: ConnectionGraphService,
    presence_store: PresenceStore,
    supervisor: HeartbeatSupervisor,
    queries: PresenceQueryService,
    coordinator: PresenceBroadcastCoordinator,
    sweeper: PresenceSweeper,
}

impl ServiceContext {
    pub fn builder() -> ServiceContextBuilder {
        ServiceContextBuilder::new()
    }

    pub fn config(&self) -> &PresenceConfig {
        &self.config
    }

    /// Get the connection graph service
    pub fn graph(&self) -> &ConnectionGraphService {
        &self.graph
    }

    /// Get the presence store
    pub fn presence_store(&self) -> &PresenceStore {
        &self.presence_store
    }

    /// Get the heartbeat supervisor
    pub fn supervisor(&self) -> &HeartbeatSupervisor {
        &self.supervisor
    }

    /// Get the presence read service
    pub fn queries(&self) -> &PresenceQueryService {
        &self.queries
    }

    /// Get the broadcast coordinator
    pub fn coordinator(&self) -> &PresenceBroadcastCoordinator {
        &self.coordinator
    }

    /// Get the stale-record sweeper
    pub fn sweeper(&self) -> &PresenceSweeper {
        &self.sweeper
    }

    /// Stop the supervisor; the coordinator follows once its shutdown token fires
    pub fn shutdown(&self) -> usize {
        self.supervisor.shutdown()
    }
}

impl std::fmt::Debug for ServiceContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceContext")
            .field("config", &self.config)
            .field("tracked", &self.supervisor.tracked_count())
            .finish_non_exhaustive()
    }
}

/// Builder for creating ServiceContext
pub struct ServiceContextBuilder {
    config: PresenceConfig,
    edges: Option<SharedEdgeCollection>,
    key_value: Option<SharedKeyValueStore>,
    transport: Option<Arc<dyn PresenceTransport>>,
}

impl ServiceContextBuilder {
    pub fn new() -> Self {
        Self {
            config: PresenceConfig::default(),
            edges: None,
            key_value: None,
            transport: None,
        }
    }

    pub fn config(mut self, config: PresenceConfig) -> Self {
        self.config = config;
        self
    }

    /// Raw edge collection; the graph service puts the isolation guard in front of it
    pub fn edges(mut self, edges: SharedEdgeCollection) -> Self {
        self.edges = Some(edges);
        self
    }

    pub fn key_value(mut self, store: SharedKeyValueStore) -> Self {
        self.key_value = Some(store);
        self
    }

    pub fn transport(mut self, transport: Arc<dyn PresenceTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Wire the services and start the coordinator loop and the sweeper.
    ///
    /// Both stop when `shutdown` is cancelled; the returned handle completes once
    /// they have.
    ///
    /// # Errors
    /// Returns `ServiceError::Validation` if any required dependency is missing
    pub fn build(self, shutdown: CancellationToken) -> ServiceResult<(ServiceContext, JoinHandle<()>)> {
        let edges = self
            .edges
            .ok_or_else(|| ServiceError::validation("edges is required"))?;
        let key_value = self
            .key_value
            .ok_or_else(|| ServiceError::validation("key_value is required"))?;
        let transport = self
            .transport
            .ok_or_else(|| ServiceError::validation("transport is required"))?;

        let graph = ConnectionGraphService::new(edges);
        let presence_store = PresenceStore::new(key_value);
        let (tx, rx) = mpsc::channel(self.config.transition_buffer.max(1));
        let supervisor = HeartbeatSupervisor::new(presence_store.clone(), self.config.clone(), tx);
        let coordinator = PresenceBroadcastCoordinator::new(graph.clone(), transport);
        let queries = PresenceQueryService::new(presence_store.clone(), &self.config);
        let sweeper = PresenceSweeper::new(presence_store.clone(), supervisor.clone());

        let coordinator_task = coordinator.clone().spawn(rx, shutdown.clone());
        let sweeper_task = self
            .config
            .sweep_interval()
            .map(|interval| sweeper.clone().spawn(interval, shutdown));
        let handle = tokio::spawn(async move {
            for task in std::iter::once(coordinator_task).chain(sweeper_task) {
                if let Err(e) = task.await {
                    tracing::error!(error = %e, "Presence background task failed");
                }
            }
        });
        tracing::info!(
            timeout_window_secs = self.config.timeout_window_secs,
            transition_buffer = self.config.transition_buffer,
            sweep_interval_secs = self.config.sweep_interval_secs,
            "Presence services started"
        );

        Ok((
            ServiceContext {
                config: self.config,
                graph,
                presence_store,
                supervisor,
                queries,
                coordinator,
                sweeper,
            },
            handle,
        ))
    }
}

impl Default for ServiceContextBuilder {
    fn default() -> Self {
        Self::new()
    }
}
