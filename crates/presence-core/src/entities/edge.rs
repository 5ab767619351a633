//! Connection edge entity - "user A should see user B's presence"
//!
//! Edges are directed. Creating a direct-message pair or a channel writes both
//! directions, so `get_connections(u)` only has to read edges where `user_id = u`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::traits::{TenantFilter, TenantOwned, TenantPatch};
use crate::value_objects::{TenantId, UserId};

/// Why two users are connected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionType {
    DirectMessage,
    ChannelMember,
}

impl ConnectionType {
    /// Column / wire value
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::DirectMessage => "direct_message",
            Self::ChannelMember => "channel_member",
        }
    }
}

impl std::fmt::Display for ConnectionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ConnectionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "direct_message" => Ok(Self::DirectMessage),
            "channel_member" => Ok(Self::ChannelMember),
            other => Err(format!("unknown connection type: {other}")),
        }
    }
}

/// A directed presence-visibility edge
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionEdge {
    /// Owning tenant. Left empty by callers and filled in by the isolation guard.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<TenantId>,
    pub user_id: UserId,
    pub connection_id: UserId,
    pub connection_type: ConnectionType,
    /// Conversation or channel id that produced the edge
    pub context_id: String,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_interaction_at: Option<DateTime<Utc>>,
}

impl ConnectionEdge {
    /// New edge without a tenant, created now
    #[must_use]
    pub fn new(
        user_id: UserId,
        connection_id: UserId,
        connection_type: ConnectionType,
        context_id: impl Into<String>,
    ) -> Self {
        Self {
            tenant_id: None,
            user_id,
            connection_id,
            connection_type,
            context_id: context_id.into(),
            created_at: Utc::now(),
            last_interaction_at: None,
        }
    }

    /// Edge pointing the other way, same context and timestamps
    #[must_use]
    pub fn reversed(&self) -> Self {
        Self {
            tenant_id: self.tenant_id.clone(),
            user_id: self.connection_id.clone(),
            connection_id: self.user_id.clone(),
            connection_type: self.connection_type,
            context_id: self.context_id.clone(),
            created_at: self.created_at,
            last_interaction_at: self.last_interaction_at,
        }
    }
}

impl TenantOwned for ConnectionEdge {
    fn tenant_id(&self) -> Option<&TenantId> {
        self.tenant_id.as_ref()
    }

    fn set_tenant_id(&mut self, tenant_id: TenantId) {
        self.tenant_id = Some(tenant_id);
    }
}

/// Equality filter over edges; unset fields match anything
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EdgeFilter {
    pub tenant_id: Option<TenantId>,
    pub user_id: Option<UserId>,
    pub connection_id: Option<UserId>,
    pub connection_type: Option<ConnectionType>,
    pub context_id: Option<String>,
}

impl EdgeFilter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn user(mut self, user_id: UserId) -> Self {
        self.user_id = Some(user_id);
        self
    }

    #[must_use]
    pub fn connection(mut self, connection_id: UserId) -> Self {
        self.connection_id = Some(connection_id);
        self
    }

    #[must_use]
    pub fn of_type(mut self, connection_type: ConnectionType) -> Self {
        self.connection_type = Some(connection_type);
        self
    }

    #[must_use]
    pub fn context(mut self, context_id: impl Into<String>) -> Self {
        self.context_id = Some(context_id.into());
        self
    }

    /// Whether `edge` satisfies every set field
    #[must_use]
    pub fn matches(&self, edge: &ConnectionEdge) -> bool {
        self.tenant_id
            .as_ref()
            .map_or(true, |t| edge.tenant_id.as_ref() == Some(t))
            && self.user_id.as_ref().map_or(true, |u| &edge.user_id == u)
            && self
                .connection_id
                .as_ref()
                .map_or(true, |c| &edge.connection_id == c)
            && self
                .connection_type
                .map_or(true, |t| edge.connection_type == t)
            && self
                .context_id
                .as_deref()
                .map_or(true, |c| edge.context_id == c)
    }
}

impl TenantFilter for EdgeFilter {
    fn tenant_id(&self) -> Option<&TenantId> {
        self.tenant_id.as_ref()
    }

    fn set_tenant_id(&mut self, tenant_id: TenantId) {
        self.tenant_id = Some(tenant_id);
    }

    fn for_tenant(tenant_id: TenantId) -> Self {
        Self {
            tenant_id: Some(tenant_id),
            ..Self::default()
        }
    }
}

/// Fields an update may set
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EdgePatch {
    pub last_interaction_at: Option<DateTime<Utc>>,
    /// Only accepted when equal to the bound tenant
    pub tenant_id: Option<TenantId>,
}

impl EdgePatch {
    #[must_use]
    pub fn touch(at: DateTime<Utc>) -> Self {
        Self {
            last_interaction_at: Some(at),
            tenant_id: None,
        }
    }

    /// Write the set fields onto `edge`
    pub fn apply(&self, edge: &mut ConnectionEdge) {
        if let Some(at) = self.last_interaction_at {
            edge.last_interaction_at = Some(at);
        }
        if let Some(tenant_id) = &self.tenant_id {
            edge.tenant_id = Some(tenant_id.clone());
        }
    }
}

impl TenantPatch for EdgePatch {
    fn tenant_id(&self) -> Option<&TenantId> {
        self.tenant_id.as_ref()
    }
}

/// Edge columns an aggregate can group by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EdgeField {
    UserId,
    ConnectionId,
    ConnectionType,
    ContextId,
}

impl EdgeField {
    /// Storage column name
    #[must_use]
    pub const fn column(self) -> &'static str {
        match self {
            Self::UserId => "user_id",
            Self::ConnectionId => "connection_id",
            Self::ConnectionType => "connection_type",
            Self::ContextId => "context_id",
        }
    }

    /// The field's value on `edge`, as a grouping key
    #[must_use]
    pub fn value_of(self, edge: &ConnectionEdge) -> String {
        match self {
            Self::UserId => edge.user_id.to_string(),
            Self::ConnectionId => edge.connection_id.to_string(),
            Self::ConnectionType => edge.connection_type.to_string(),
            Self::ContextId => edge.context_id.clone(),
        }
    }
}
