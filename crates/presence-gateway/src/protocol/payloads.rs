//! Request payloads and acknowledgement bodies

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use presence_core::{DeviceInfo, PresenceRecord, PresenceStatus, UserId};

/// Page size used when `get_online_users` names no limit
pub const DEFAULT_PAGE: usize = 50;

// ============================================================================
// Requests
// ============================================================================

/// `authenticate_presence`; identity comes from the verified session
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticatePayload {
    /// Initial status, `online` when absent
    #[serde(default)]
    pub status: Option<String>,

    #[serde(default)]
    pub device_info: Option<DeviceInfo>,

    /// Also receive the tenant's `user_online` / `user_offline` / `status_changed` events
    #[serde(default)]
    pub monitor: bool,
}

/// `heartbeat`
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HeartbeatPayload {
    /// Keeps the connection's current status when absent
    #[serde(default)]
    pub status: Option<String>,
}

/// `change_status`
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ChangeStatusPayload {
    #[validate(length(min = 1, max = 16, message = "Status is required"))]
    pub status: String,
}

/// `get_presence`; the id count is bounded by the configured batch size
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GetPresencePayload {
    pub user_ids: Vec<String>,
}

/// `get_online_users`
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GetOnlineUsersPayload {
    /// Must lie in `1..=max_batch`; [`DEFAULT_PAGE`] capped at `max_batch` when absent
    #[serde(default)]
    pub limit: Option<usize>,

    /// Opaque cursor from a previous page; absent or `"0"` starts a new scan
    #[serde(default)]
    pub cursor: Option<String>,
}

// ============================================================================
// Acknowledgements
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticatedAck {
    pub success: bool,
    pub user_id: UserId,
    pub heartbeat_interval_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeartbeatAck {
    pub success: bool,
    pub timestamp: DateTime<Utc>,
    pub status: PresenceStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusAck {
    pub success: bool,
    pub status: PresenceStatus,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceAck {
    pub success: bool,
    pub presence: HashMap<String, PresenceRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OnlineUsersAck {
    pub success: bool,
    pub users: Vec<PresenceRecord>,
    /// `"0"` once the scan is complete
    pub next_cursor: String,
}
