//! # presence-core
//!
//! Domain layer for the presence subsystem: the ambient tenant carrier, presence and
//! connection-edge entities, domain errors, and the tenant-scoped persistence port.
//! Infrastructure (PostgreSQL, Redis, WebSocket) lives in the other crates.

pub mod entities;
pub mod error;
pub mod tenant;
pub mod traits;
pub mod value_objects;

// Re-export commonly used types at crate root
pub use entities::{
    ConnectionEdge, ConnectionType, DeviceInfo, EdgeField, EdgeFilter, EdgePatch, PresenceRecord,
    PresenceStatus, StatusParseError,
};
pub use error::{DomainError, DomainResult};
pub use tenant::{current_tenant, require_tenant, run_with_tenant, sync_with_tenant};
pub use traits::{
    GroupRow, Pipeline, RepoResult, SharedEdgeCollection, Stage, TenantCollection, TenantFilter,
    TenantOwned, TenantPatch,
};
pub use value_objects::{IdParseError, TenantId, UserId};
