//! Inbound event names

/// Events a client may send
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClientEvent {
    AuthenticatePresence,
    Heartbeat,
    ChangeStatus,
    GetPresence,
    GetOnlineUsers,
}

impl ClientEvent {
    pub const ALL: [Self; 5] = [
        Self::AuthenticatePresence,
        Self::Heartbeat,
        Self::ChangeStatus,
        Self::GetPresence,
        Self::GetOnlineUsers,
    ];

    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|event| event.as_str() == name)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AuthenticatePresence => "authenticate_presence",
            Self::Heartbeat => "heartbeat",
            Self::ChangeStatus => "change_status",
            Self::GetPresence => "get_presence",
            Self::GetOnlineUsers => "get_online_users",
        }
    }

    /// Whether the event may arrive before `authenticate_presence`
    #[must_use]
    pub const fn allowed_unauthenticated(self) -> bool {
        matches!(self, Self::AuthenticatePresence)
    }
}

impl std::fmt::Display for ClientEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_name() {
        for event in ClientEvent::ALL {
            assert_eq!(ClientEvent::from_name(event.as_str()), Some(event));
        }
        assert_eq!(ClientEvent::from_name("typing_start"), None);
    }
}
