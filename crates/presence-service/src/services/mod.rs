//! Presence services
//!
//! Dependencies resolve leaf to root: connection graph, presence store, heartbeat
//! supervisor, broadcast coordinator. [`ServiceContextBuilder`] performs that wiring.

pub mod broadcast;
pub mod context;
pub mod error;
pub mod graph;
pub mod heartbeat;
pub mod query;
pub mod sweep;
pub mod transition;

// Re-export all services for convenience
pub use broadcast::{
    room, BroadcastReport, PresenceBroadcastCoordinator, PresenceTransport, TransportError,
    PRESENCE_UPDATE,
};
pub use context::{ServiceContext, ServiceContextBuilder};
pub use error::{ServiceError, ServiceResult};
pub use graph::ConnectionGraphService;
pub use heartbeat::{HeartbeatSupervisor, SweepReport};
pub use query::PresenceQueryService;
pub use sweep::{PresenceSweeper, SWEEP_PAGE};
pub use transition::{PresenceTransition, TransitionKind};
