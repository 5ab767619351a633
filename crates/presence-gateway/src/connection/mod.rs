//! Connection management
//!
//! Live sockets and the rooms they have joined.

mod connection;
mod rooms;

pub use connection::{Connection, ConnectionError};
pub use rooms::RoomRegistry;
