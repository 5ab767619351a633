//! Wire protocol
//!
//! JSON text frames: `{"event", "id", "data"}` inbound, acknowledgements and
//! pushed events outbound.

mod close_codes;
mod events;
mod frames;
mod payloads;

pub use close_codes::CloseCode;
pub use events::ClientEvent;
pub use frames::{ClientFrame, ServerFrame};
pub use payloads::{
    AuthenticatePayload, AuthenticatedAck, ChangeStatusPayload, GetOnlineUsersPayload,
    GetPresencePayload, HeartbeatAck, HeartbeatPayload, OnlineUsersAck, PresenceAck, StatusAck,
    DEFAULT_PAGE,
};
