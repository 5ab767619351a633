//! Presence entity - a user's liveness status and last-seen time

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::value_objects::UserId;

/// User presence status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PresenceStatus {
    /// Connected and active
    Online,
    /// Connected but idle
    Away,
    /// Connected, do not disturb
    Busy,
    /// Not connected
    #[default]
    Offline,
}

impl PresenceStatus {
    /// All statuses, in wire order
    pub const ALL: [Self; 4] = [Self::Online, Self::Away, Self::Busy, Self::Offline];

    /// Whether the status counts as live (anything but offline)
    #[must_use]
    pub fn is_live(self) -> bool {
        !matches!(self, Self::Offline)
    }

    /// Wire name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Online => "online",
            Self::Away => "away",
            Self::Busy => "busy",
            Self::Offline => "offline",
        }
    }
}

impl std::fmt::Display for PresenceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error when parsing a status string
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid status: {0} (expected online, away, busy or offline)")]
pub struct StatusParseError(pub String);

impl std::str::FromStr for PresenceStatus {
    type Err = StatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "online" => Ok(Self::Online),
            "away" | "idle" => Ok(Self::Away),
            "busy" | "dnd" => Ok(Self::Busy),
            "offline" => Ok(Self::Offline),
            _ => Err(StatusParseError(s.to_string())),
        }
    }
}

/// Client device that produced the heartbeat
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceInfo {
    /// Device class (`web`, `desktop`, `mobile`, ...)
    #[serde(rename = "type")]
    pub device_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    /// Transport connection that reported the heartbeat
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection_id: Option<String>,
}

impl DeviceInfo {
    /// Create device info of the given type
    #[must_use]
    pub fn new(device_type: impl Into<String>) -> Self {
        Self {
            device_type: device_type.into(),
            user_agent: None,
            connection_id: None,
        }
    }

    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    #[must_use]
    pub fn with_connection_id(mut self, connection_id: impl Into<String>) -> Self {
        self.connection_id = Some(connection_id.into());
        self
    }
}

impl Default for DeviceInfo {
    fn default() -> Self {
        Self::new("web")
    }
}

/// Presence record as kept in the key-value store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceRecord {
    pub user_id: UserId,
    pub status: PresenceStatus,
    pub last_seen: DateTime<Utc>,
    pub device_info: DeviceInfo,
}

impl PresenceRecord {
    /// Create a record stamped with the current time
    #[must_use]
    pub fn new(user_id: UserId, status: PresenceStatus, device_info: DeviceInfo) -> Self {
        Self {
            user_id,
            status,
            last_seen: Utc::now(),
            device_info,
        }
    }

    /// Copy of this record marked offline, keeping the device that was last seen
    #[must_use]
    pub fn to_offline(&self) -> Self {
        Self {
            user_id: self.user_id.clone(),
            status: PresenceStatus::Offline,
            last_seen: Utc::now(),
            device_info: self.device_info.clone(),
        }
    }

    /// Seconds since `last_seen`
    #[must_use]
    pub fn idle_seconds(&self, now: DateTime<Utc>) -> i64 {
        (now - self.last_seen).num_seconds().max(0)
    }
}
