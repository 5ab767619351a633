//! `heartbeat` and `change_status`

use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;
use validator::Validate;

use presence_core::PresenceStatus;

use super::{ack_body, HandlerResult};
use crate::connection::Connection;
use crate::protocol::{ChangeStatusPayload, HeartbeatAck, HeartbeatPayload, StatusAck};
use crate::server::GatewayState;

/// Handles liveness and status updates
pub struct StatusHandler;

impl StatusHandler {
    /// Keep the user alive, optionally with a new status
    pub async fn heartbeat(
        state: &GatewayState,
        connection: &Arc<Connection>,
        payload: HeartbeatPayload,
    ) -> HandlerResult<Value> {
        let status = match payload.status.as_deref() {
            Some(raw) => raw.parse::<PresenceStatus>()?,
            None => connection.status(),
        };
        Self::apply(state, connection, status).await?;

        tracing::trace!(connection_id = %connection.id(), status = %status, "Heartbeat received");
        ack_body(&HeartbeatAck {
            success: true,
            timestamp: Utc::now(),
            status,
        })
    }

    /// Explicit status change
    pub async fn change_status(
        state: &GatewayState,
        connection: &Arc<Connection>,
        payload: ChangeStatusPayload,
    ) -> HandlerResult<Value> {
        payload.validate()?;
        let status = payload.status.parse::<PresenceStatus>()?;
        Self::apply(state, connection, status).await?;

        tracing::debug!(
            connection_id = %connection.id(),
            user_id = %connection.user_id(),
            status = %status,
            "Status changed"
        );
        ack_body(&StatusAck {
            success: true,
            status,
            timestamp: Utc::now(),
        })
    }

    async fn apply(
        state: &GatewayState,
        connection: &Arc<Connection>,
        status: PresenceStatus,
    ) -> HandlerResult<()> {
        connection.set_status(status);
        state
            .services()
            .supervisor()
            .process_heartbeat(connection.user_id(), status, connection.device_info())
            .await?;
        Ok(())
    }
}
