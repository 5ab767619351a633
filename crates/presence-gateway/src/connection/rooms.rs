//! Room registry
//!
//! Tracks live connections and the named rooms they have joined, and delivers
//! presence events to rooms. Room names carry their tenant, so a registry shared
//! by all tenants never mixes their audiences.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;

use presence_service::{PresenceTransport, TransportError};

use super::{Connection, ConnectionError};
use crate::protocol::ServerFrame;

/// Live connections and room membership
#[derive(Default)]
pub struct RoomRegistry {
    /// Active connections by connection id
    connections: DashMap<String, Arc<Connection>>,

    /// Room name to connection ids
    rooms: DashMap<String, HashSet<String>>,
}

impl RoomRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn new_shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Register a new connection
    pub fn register(&self, connection: Arc<Connection>) {
        tracing::debug!(connection_id = %connection.id(), "Connection added");
        self.connections
            .insert(connection.id().to_string(), connection);
    }

    pub fn get(&self, connection_id: &str) -> Option<Arc<Connection>> {
        self.connections.get(connection_id).map(|c| c.clone())
    }

    /// Add a registered connection to a room. Returns false for unknown connections.
    pub fn join(&self, connection_id: &str, room: &str) -> bool {
        let Some(connection) = self.get(connection_id) else {
            return false;
        };
        self.rooms
            .entry(room.to_string())
            .or_default()
            .insert(connection_id.to_string());
        connection.track_room(room);
        true
    }

    pub fn leave(&self, connection_id: &str, room: &str) {
        self.rooms.alter(room, |_, mut members| {
            members.remove(connection_id);
            members
        });
        self.rooms.remove_if(room, |_, members| members.is_empty());
        if let Some(connection) = self.get(connection_id) {
            connection.untrack_room(room);
        }
    }

    /// Drop a connection and its room memberships
    pub fn remove(&self, connection_id: &str) -> Option<Arc<Connection>> {
        let (_, connection) = self.connections.remove(connection_id)?;
        for room in connection.rooms() {
            self.rooms.alter(&room, |_, mut members| {
                members.remove(connection_id);
                members
            });
            self.rooms.remove_if(&room, |_, members| members.is_empty());
        }
        tracing::debug!(connection_id = %connection_id, "Connection removed");
        Some(connection)
    }

    /// Connections currently in the room
    pub fn room_size(&self, room: &str) -> usize {
        self.rooms.get(room).map_or(0, |members| members.len())
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// Drop every connection and room
    pub fn clear(&self) {
        self.rooms.clear();
        self.connections.clear();
    }
}

#[async_trait]
impl PresenceTransport for RoomRegistry {
    async fn emit_to_room(&self, room: &str, event: &str, data: Value) -> Result<usize, TransportError> {
        let members: Vec<String> = match self.rooms.get(room) {
            Some(members) => members.iter().cloned().collect(),
            None => return Ok(0),
        };

        let frame = ServerFrame::event(event, data);
        let mut delivered = 0;
        let mut last_error = None;
        for id in &members {
            let Some(connection) = self.get(id) else {
                continue;
            };
            match connection.try_send(frame.clone()) {
                Ok(()) => delivered += 1,
                Err(e) => {
                    tracing::debug!(connection_id = %id, error = %e, "Dropping event for slow connection");
                    last_error = Some(e);
                }
            }
        }

        match last_error {
            Some(e) if delivered == 0 => Err(match e {
                ConnectionError::Closed => TransportError::Closed,
                ConnectionError::QueueFull => TransportError::Failed(e.to_string()),
            }),
            _ => Ok(delivered),
        }
    }
}

impl std::fmt::Debug for RoomRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoomRegistry")
            .field("connections", &self.connections.len())
            .field("rooms", &self.rooms.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use presence_common::Session;
    use presence_core::{TenantId, UserId};
    use tokio::sync::mpsc;

    fn connect(registry: &RoomRegistry, user: &str) -> (Arc<Connection>, mpsc::Receiver<ServerFrame>) {
        let (tx, rx) = mpsc::channel(4);
        let session = Session {
            user_id: UserId::parse(user).unwrap(),
            tenant_id: TenantId::parse("acme").unwrap(),
        };
        let connection = Connection::new(session, tx);
        registry.register(connection.clone());
        (connection, rx)
    }

    #[tokio::test]
    async fn test_emit_reaches_room_members_only() {
        let registry = RoomRegistry::new();
        let (a, mut rx_a) = connect(&registry, "alice");
        let (_b, mut rx_b) = connect(&registry, "bob");
        registry.join(a.id(), "tenant:acme:user:alice");

        let delivered = registry
            .emit_to_room("tenant:acme:user:alice", "presence_update", serde_json::json!({}))
            .await
            .unwrap();
        assert_eq!(delivered, 1);
        assert!(matches!(rx_a.try_recv(), Ok(ServerFrame::Event { .. })));
        assert!(rx_b.try_recv().is_err());

        assert_eq!(
            registry
                .emit_to_room("tenant:acme:user:nobody", "presence_update", serde_json::json!({}))
                .await
                .unwrap(),
            0
        );
    }

    #[tokio::test]
    async fn test_remove_leaves_rooms() {
        let registry = RoomRegistry::new();
        let (a, _rx_a) = connect(&registry, "alice");
        let (a2, _rx_a2) = connect(&registry, "alice");
        for conn in [&a, &a2] {
            registry.join(conn.id(), "tenant:acme:user:alice");
        }
        assert_eq!(registry.room_size("tenant:acme:user:alice"), 2);

        registry.remove(a.id());
        assert_eq!(registry.room_size("tenant:acme:user:alice"), 1);
        registry.remove(a2.id());
        assert_eq!(registry.room_size("tenant:acme:user:alice"), 0);
        assert_eq!(registry.room_count(), 0);
        assert_eq!(registry.connection_count(), 0);
    }

    #[tokio::test]
    async fn test_closed_connection_is_reported() {
        let registry = RoomRegistry::new();
        let (a, rx_a) = connect(&registry, "alice");
        registry.join(a.id(), "room");
        drop(rx_a);

        let err = registry
            .emit_to_room("room", "presence_update", serde_json::json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Closed));
    }

    #[test]
    fn test_join_unknown_connection() {
        let registry = RoomRegistry::new();
        assert!(!registry.join("missing", "room"));
        assert_eq!(registry.room_count(), 0);
    }
}
