//! Domain entities

mod edge;
mod presence;

pub use edge::{ConnectionEdge, ConnectionType, EdgeField, EdgeFilter, EdgePatch};
pub use presence::{DeviceInfo, PresenceRecord, PresenceStatus, StatusParseError};
