//! # presence-service
//!
//! Application layer: the connection graph, the heartbeat supervisor, the
//! stale-record sweeper and the broadcast coordinator, wired together by
//! [`ServiceContext`].

pub mod services;

pub use services::{
    room, BroadcastReport, ConnectionGraphService, HeartbeatSupervisor,
    PresenceBroadcastCoordinator, PresenceQueryService, PresenceSweeper, PresenceTransition,
    PresenceTransport, ServiceContext, ServiceContextBuilder, ServiceError, ServiceResult,
    SweepReport, TransitionKind, TransportError, PRESENCE_UPDATE,
};
