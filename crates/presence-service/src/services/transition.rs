//! Presence transitions passed from the supervisor to the coordinator

use chrono::{DateTime, Utc};
use presence_core::{PresenceStatus, TenantId, UserId};

/// What changed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransitionKind {
    Online,
    Offline,
    StatusChanged,
}

impl TransitionKind {
    /// Monitoring event name
    pub const fn event_name(self) -> &'static str {
        match self {
            Self::Online => "user_online",
            Self::Offline => "user_offline",
            Self::StatusChanged => "status_changed",
        }
    }

    /// Kind implied by moving from `previous` to `next`, if the move is a transition
    pub fn between(previous: Option<PresenceStatus>, next: PresenceStatus) -> Option<Self> {
        let was_live = previous.is_some_and(PresenceStatus::is_live);
        match (was_live, next.is_live()) {
            (false, true) => Some(Self::Online),
            (true, false) => Some(Self::Offline),
            (true, true) if previous != Some(next) => Some(Self::StatusChanged),
            _ => None,
        }
    }
}

/// A user's liveness change, carrying its tenant so the consumer can re-enter scope
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresenceTransition {
    pub tenant_id: TenantId,
    pub user_id: UserId,
    pub kind: TransitionKind,
    pub status: PresenceStatus,
    pub previous: Option<PresenceStatus>,
    pub at: DateTime<Utc>,
}

impl PresenceTransition {
    pub fn new(
        tenant_id: TenantId,
        user_id: UserId,
        kind: TransitionKind,
        status: PresenceStatus,
        previous: Option<PresenceStatus>,
    ) -> Self {
        Self {
            tenant_id,
            user_id,
            kind,
            status,
            previous,
            at: Utc::now(),
        }
    }
}
