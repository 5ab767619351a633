//! Integration test utilities for the presence gateway
//!
//! This crate runs the gateway in-process over in-memory stores and drives it
//! through real WebSocket clients.

pub mod fixtures;
pub mod helpers;

pub use fixtures::*;
pub use helpers::*;
