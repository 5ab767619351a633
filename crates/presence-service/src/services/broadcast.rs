//! Presence broadcast coordinator
//!
//! Consumes transitions from the heartbeat supervisor, resolves the audience from
//! the connection graph and hands one event per audience member to the transport.
//! Delivery is best effort: a failed emit is logged and not retried.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::instrument;

use presence_core::run_with_tenant;

use super::error::ServiceResult;
use super::graph::ConnectionGraphService;
use super::transition::PresenceTransition;

/// Event sent to each audience member's room
pub const PRESENCE_UPDATE: &str = "presence_update";

/// Room names. Every room carries its tenant, so two tenants never share one.
pub mod room {
    use presence_core::{TenantId, UserId};

    /// Room joined by every connection of one user
    pub fn user(tenant_id: &TenantId, user_id: &UserId) -> String {
        format!("tenant:{tenant_id}:user:{user_id}")
    }

    /// Room for the tenant's monitoring consumers
    pub fn presence(tenant_id: &TenantId) -> String {
        format!("tenant:{tenant_id}:presence")
    }
}

/// Transport failure
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Transport closed")]
    Closed,

    #[error("Send failed: {0}")]
    Failed(String),
}

/// Outbound side of the real-time transport
#[async_trait]
pub trait PresenceTransport: Send + Sync {
    /// Deliver `event` to every connection in `room`. Returns how many received it.
    async fn emit_to_room(&self, room: &str, event: &str, data: Value)
        -> Result<usize, TransportError>;
}

/// Outcome of one broadcast
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    pub audience: usize,
    pub delivered: usize,
    pub failed: usize,
}

/// Fans presence transitions out to connected users
#[derive(Clone)]
pub struct PresenceBroadcastCoordinator {
    graph: ConnectionGraphService,
    transport: Arc<dyn PresenceTransport>,
}

impl PresenceBroadcastCoordinator {
    pub fn new(graph: ConnectionGraphService, transport: Arc<dyn PresenceTransport>) -> Self {
        Self { graph, transport }
    }

    /// Broadcast one transition inside its own tenant scope
    #[instrument(skip(self, transition), fields(
        tenant_id = %transition.tenant_id,
        user_id = %transition.user_id,
        kind = transition.kind.event_name(),
    ))]
    pub async fn on_transition(&self, transition: &PresenceTransition) -> ServiceResult<BroadcastReport> {
        run_with_tenant(transition.tenant_id.clone(), self.broadcast(transition)).await
    }

    async fn broadcast(&self, transition: &PresenceTransition) -> ServiceResult<BroadcastReport> {
        let t = transition;
        let taxonomy = json!({
            "userId": t.user_id,
            "status": t.status,
            "previousStatus": t.previous,
            "timestamp": t.at,
        });
        if let Err(e) = self
            .transport
            .emit_to_room(&room::presence(&t.tenant_id), t.kind.event_name(), taxonomy)
            .await
        {
            tracing::debug!(error = %e, "Monitoring event not delivered");
        }

        let audience = self.graph.get_connections(&t.user_id, None).await?;
        let update = json!({
            "userId": t.user_id,
            "status": t.status,
            "lastSeen": t.at,
        });

        let mut report = BroadcastReport {
            audience: audience.len(),
            ..BroadcastReport::default()
        };
        for member in &audience {
            match self
                .transport
                .emit_to_room(&room::user(&t.tenant_id, member), PRESENCE_UPDATE, update.clone())
                .await
            {
                Ok(_) => report.delivered += 1,
                Err(e) => {
                    report.failed += 1;
                    tracing::warn!(member = %member, error = %e, "Presence update not delivered");
                }
            }
        }

        tracing::debug!(
            audience = report.audience,
            delivered = report.delivered,
            failed = report.failed,
            "Presence broadcast"
        );
        Ok(report)
    }

    /// Consume transitions until the channel closes or `shutdown` fires
    pub async fn run(self, mut transitions: mpsc::Receiver<PresenceTransition>, shutdown: CancellationToken) {
        tracing::info!("Presence broadcast coordinator started");
        loop {
            tokio::select! {
                biased;
                () = shutdown.cancelled() => break,
                next = transitions.recv() => {
                    let Some(transition) = next else { break };
                    if let Err(e) = self.on_transition(&transition).await {
                        tracing::warn!(
                            user_id = %transition.user_id,
                            error = %e,
                            "Presence broadcast failed"
                        );
                    }
                }
            }
        }
        transitions.close();
        tracing::info!("Presence broadcast coordinator stopped");
    }

    pub fn spawn(
        self,
        transitions: mpsc::Receiver<PresenceTransition>,
        shutdown: CancellationToken,
    ) -> JoinHandle<()> {
        tokio::spawn(self.run(transitions, shutdown))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::services::transition::TransitionKind;
    use parking_lot::Mutex;
    use presence_core::{PresenceStatus, TenantId, UserId};
    use presence_db::MemoryEdgeCollection;

    /// Transport that records every emit
    #[derive(Default)]
    pub(crate) struct RecordingTransport {
        pub(crate) sent: Mutex<Vec<(String, String, Value)>>,
        pub(crate) failing_room: Mutex<Option<String>>,
    }

    impl RecordingTransport {
        pub(crate) fn rooms_for(&self, event: &str) -> Vec<String> {
            self.sent
                .lock()
                .iter()
                .filter(|(_, e, _)| e == event)
                .map(|(room, _, _)| room.clone())
                .collect()
        }
    }

    #[async_trait]
    impl PresenceTransport for RecordingTransport {
        async fn emit_to_room(
            &self,
            room: &str,
            event: &str,
            data: Value,
        ) -> Result<usize, TransportError> {
            if self.failing_room.lock().as_deref() == Some(room) {
                return Err(TransportError::Failed("socket reset".into()));
            }
            self.sent.lock().push((room.to_string(), event.to_string(), data));
            Ok(1)
        }
    }

    fn uid(raw: &str) -> UserId {
        UserId::parse(raw).unwrap()
    }

    fn tid(raw: &str) -> TenantId {
        TenantId::parse(raw).unwrap()
    }

    async fn coordinator() -> (Arc<RecordingTransport>, PresenceBroadcastCoordinator) {
        let graph = ConnectionGraphService::new(Arc::new(MemoryEdgeCollection::new()));
        run_with_tenant(tid("acme"), async {
            graph
                .add_channel_member_edges("ch-1", &[uid("alice"), uid("bob"), uid("carol")])
                .await
                .unwrap();
        })
        .await;
        let transport = Arc::new(RecordingTransport::default());
        (transport.clone(), PresenceBroadcastCoordinator::new(graph, transport))
    }

    fn online(tenant: &str, user: &str) -> PresenceTransition {
        PresenceTransition::new(
            tid(tenant),
            uid(user),
            TransitionKind::Online,
            PresenceStatus::Online,
            None,
        )
    }

    #[test]
    fn test_room_names() {
        assert_eq!(room::user(&tid("acme"), &uid("alice")), "tenant:acme:user:alice");
        assert_eq!(room::presence(&tid("acme")), "tenant:acme:presence");
    }

    #[tokio::test]
    async fn test_update_reaches_each_connection() {
        let (transport, coordinator) = coordinator().await;
        let report = coordinator.on_transition(&online("acme", "alice")).await.unwrap();

        assert_eq!(report, BroadcastReport { audience: 2, delivered: 2, failed: 0 });
        let mut rooms = transport.rooms_for(PRESENCE_UPDATE);
        rooms.sort();
        assert_eq!(rooms, vec!["tenant:acme:user:bob", "tenant:acme:user:carol"]);
        assert_eq!(transport.rooms_for("user_online"), vec!["tenant:acme:presence"]);

        let sent = transport.sent.lock();
        let (_, _, data) = sent.iter().find(|(_, e, _)| e == PRESENCE_UPDATE).unwrap();
        assert_eq!(data["userId"], "alice");
        assert_eq!(data["status"], "online");
    }

    #[tokio::test]
    async fn test_other_tenant_has_no_audience() {
        let (transport, coordinator) = coordinator().await;
        let report = coordinator.on_transition(&online("globex", "alice")).await.unwrap();

        assert_eq!(report.audience, 0);
        assert!(transport.rooms_for(PRESENCE_UPDATE).is_empty());
    }

    #[tokio::test]
    async fn test_failed_emit_does_not_stop_fan_out() {
        let (transport, coordinator) = coordinator().await;
        *transport.failing_room.lock() = Some("tenant:acme:user:bob".into());

        let report = coordinator.on_transition(&online("acme", "alice")).await.unwrap();
        assert_eq!(report, BroadcastReport { audience: 2, delivered: 1, failed: 1 });
    }

    #[tokio::test]
    async fn test_run_stops_on_cancel() {
        let (transport, coordinator) = coordinator().await;
        let (tx, rx) = mpsc::channel(8);
        let shutdown = CancellationToken::new();
        let handle = coordinator.spawn(rx, shutdown.clone());

        tx.send(online("acme", "bob")).await.unwrap();
        tokio::task::yield_now().await;
        while transport.rooms_for(PRESENCE_UPDATE).len() < 2 {
            tokio::task::yield_now().await;
        }

        shutdown.cancel();
        handle.await.unwrap();
        assert!(tx.send(online("acme", "bob")).await.is_err());
    }
}
