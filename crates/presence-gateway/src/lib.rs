//! # presence-gateway
//!
//! WebSocket gateway for presence: authenticates sockets, routes presence events
//! into the service layer and fans transitions back out through per-user rooms.

pub mod connection;
pub mod handlers;
pub mod protocol;
pub mod server;

pub use server::{create_app, create_gateway_state, create_router, run, run_server, GatewayState};
