//! Session lifecycle: `authenticate_presence` and socket close

use std::sync::Arc;

use serde_json::Value;

use presence_core::{run_with_tenant, PresenceStatus};
use presence_service::room;

use super::{ack_body, HandlerError, HandlerResult};
use crate::connection::Connection;
use crate::protocol::{AuthenticatePayload, AuthenticatedAck};
use crate::server::GatewayState;

/// Handles session start and end
pub struct SessionHandler;

impl SessionHandler {
    /// Bind the verified session to presence: join the user's room and go online
    pub async fn authenticate(
        state: &GatewayState,
        connection: &Arc<Connection>,
        payload: AuthenticatePayload,
    ) -> HandlerResult<Value> {
        let status = match payload.status.as_deref() {
            Some(raw) => raw.parse::<PresenceStatus>()?,
            None => PresenceStatus::Online,
        };
        if !connection.mark_authenticated() {
            return Err(HandlerError::AlreadyAuthenticated);
        }

        let tenant_id = connection.tenant_id();
        let user_id = connection.user_id();
        state
            .rooms()
            .join(connection.id(), &room::user(tenant_id, user_id));
        if payload.monitor {
            state
                .rooms()
                .join(connection.id(), &room::presence(tenant_id));
        }

        if let Some(device_info) = payload.device_info {
            connection.set_device_info(device_info);
        }
        connection.set_status(status);
        state
            .services()
            .supervisor()
            .process_heartbeat(user_id, status, connection.device_info())
            .await?;

        tracing::info!(
            connection_id = %connection.id(),
            tenant_id = %tenant_id,
            user_id = %user_id,
            "Presence session started"
        );

        ack_body(&AuthenticatedAck {
            success: true,
            user_id: user_id.clone(),
            heartbeat_interval_ms: state.services().config().heartbeat_interval_ms,
        })
    }

    /// Socket closed. The user goes offline only when this was their last connection.
    pub async fn disconnect(state: &GatewayState, connection: &Arc<Connection>) {
        state.rooms().remove(connection.id());
        if !connection.is_authenticated() {
            return;
        }

        let tenant_id = connection.tenant_id();
        let user_id = connection.user_id();
        let remaining = state.rooms().room_size(&room::user(tenant_id, user_id));
        if remaining > 0 {
            tracing::debug!(
                user_id = %user_id,
                remaining,
                "User still connected elsewhere"
            );
            return;
        }

        let supervisor = state.services().supervisor();
        match run_with_tenant(tenant_id.clone(), supervisor.set_offline(user_id)).await {
            Ok(_) => tracing::debug!(user_id = %user_id, "User presence set to offline"),
            Err(e) => tracing::warn!(user_id = %user_id, error = %e, "Failed to set presence offline"),
        }
    }
}
