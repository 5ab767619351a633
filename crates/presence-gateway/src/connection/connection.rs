//! Individual WebSocket connection

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use tokio::sync::mpsc;

use presence_common::Session;
use presence_core::{DeviceInfo, PresenceStatus, TenantId, UserId};

use crate::protocol::ServerFrame;

/// Outbound queue failure
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConnectionError {
    #[error("Outbound queue full")]
    QueueFull,

    #[error("Connection closed")]
    Closed,
}

/// A single authenticated-at-upgrade WebSocket connection
pub struct Connection {
    /// Unique connection id
    id: String,

    /// Identity verified at upgrade
    session: Session,

    /// Set by `authenticate_presence`
    authenticated: AtomicBool,

    /// Status last reported by this connection
    status: Mutex<PresenceStatus>,

    device_info: Mutex<DeviceInfo>,

    /// Rooms this connection has joined
    rooms: Mutex<HashSet<String>>,

    /// Channel to the socket writer
    sender: mpsc::Sender<ServerFrame>,

    connected_at: Instant,
}

impl Connection {
    pub fn new(session: Session, sender: mpsc::Sender<ServerFrame>) -> Arc<Self> {
        let id = uuid::Uuid::new_v4().simple().to_string();
        Arc::new(Self {
            device_info: Mutex::new(DeviceInfo::default().with_connection_id(id.clone())),
            id,
            session,
            authenticated: AtomicBool::new(false),
            status: Mutex::new(PresenceStatus::Online),
            rooms: Mutex::new(HashSet::new()),
            sender,
            connected_at: Instant::now(),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn user_id(&self) -> &UserId {
        &self.session.user_id
    }

    pub fn tenant_id(&self) -> &TenantId {
        &self.session.tenant_id
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated.load(Ordering::SeqCst)
    }

    /// Mark the connection authenticated. Returns false if it already was.
    pub fn mark_authenticated(&self) -> bool {
        !self.authenticated.swap(true, Ordering::SeqCst)
    }

    pub fn status(&self) -> PresenceStatus {
        *self.status.lock()
    }

    pub fn set_status(&self, status: PresenceStatus) {
        *self.status.lock() = status;
    }

    pub fn device_info(&self) -> DeviceInfo {
        self.device_info.lock().clone()
    }

    /// Replace the device info, keeping this connection's id on it
    pub fn set_device_info(&self, device_info: DeviceInfo) {
        *self.device_info.lock() = device_info.with_connection_id(self.id.clone());
    }

    pub(crate) fn track_room(&self, room: &str) {
        self.rooms.lock().insert(room.to_string());
    }

    pub(crate) fn untrack_room(&self, room: &str) {
        self.rooms.lock().remove(room);
    }

    pub fn rooms(&self) -> Vec<String> {
        self.rooms.lock().iter().cloned().collect()
    }

    /// Queue a frame, waiting for space
    pub async fn send(&self, frame: ServerFrame) -> Result<(), ConnectionError> {
        self.sender
            .send(frame)
            .await
            .map_err(|_| ConnectionError::Closed)
    }

    /// Queue a frame without waiting
    pub fn try_send(&self, frame: ServerFrame) -> Result<(), ConnectionError> {
        self.sender.try_send(frame).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => ConnectionError::QueueFull,
            mpsc::error::TrySendError::Closed(_) => ConnectionError::Closed,
        })
    }

    pub fn connected_for(&self) -> std::time::Duration {
        self.connected_at.elapsed()
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("user_id", &self.session.user_id)
            .field("tenant_id", &self.session.tenant_id)
            .field("authenticated", &self.is_authenticated())
            .finish_non_exhaustive()
    }
}
