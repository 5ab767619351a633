//! Event handlers
//!
//! Every inbound frame is handled inside its connection's tenant scope and
//! answered with exactly one acknowledgement.

mod error;
mod heartbeat;
mod query;
mod session;

pub use error::{HandlerError, HandlerResult};
pub use heartbeat::StatusHandler;
pub use query::QueryHandler;
pub use session::SessionHandler;

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tracing::instrument;

use presence_core::run_with_tenant;

use crate::connection::Connection;
use crate::protocol::{ClientEvent, ClientFrame, ServerFrame};
use crate::server::GatewayState;

/// Routes client frames to handlers
pub struct EventDispatcher;

impl EventDispatcher {
    /// Handle one frame and build its acknowledgement
    #[instrument(skip_all, fields(connection_id = %connection.id(), event = %frame.event))]
    pub async fn dispatch(
        state: &GatewayState,
        connection: &Arc<Connection>,
        frame: ClientFrame,
    ) -> ServerFrame {
        let id = frame.id;
        let tenant_id = connection.tenant_id().clone();

        match run_with_tenant(tenant_id, Self::route(state, connection, frame)).await {
            Ok(data) => ServerFrame::ack(id, data),
            Err(e) => {
                if e.is_security() {
                    tracing::error!(security_incident = true, error = %e, "Rejected event");
                } else {
                    tracing::debug!(code = e.code(), error = %e, "Event failed");
                }
                ServerFrame::error(id, e.code(), e.client_message())
            }
        }
    }

    async fn route(
        state: &GatewayState,
        connection: &Arc<Connection>,
        frame: ClientFrame,
    ) -> HandlerResult<Value> {
        let event = ClientEvent::from_name(&frame.event)
            .ok_or_else(|| HandlerError::UnknownEvent(frame.event.clone()))?;

        if !event.allowed_unauthenticated() && !connection.is_authenticated() {
            return Err(HandlerError::NotAuthenticated);
        }

        match event {
            ClientEvent::AuthenticatePresence => {
                SessionHandler::authenticate(state, connection, frame.payload()?).await
            }
            ClientEvent::Heartbeat => {
                StatusHandler::heartbeat(state, connection, frame.payload()?).await
            }
            ClientEvent::ChangeStatus => {
                StatusHandler::change_status(state, connection, frame.payload()?).await
            }
            ClientEvent::GetPresence => QueryHandler::get_presence(state, frame.payload()?).await,
            ClientEvent::GetOnlineUsers => {
                QueryHandler::get_online_users(state, frame.payload()?).await
            }
        }
    }
}

/// Serialize an acknowledgement body
pub(crate) fn ack_body<T: Serialize>(body: &T) -> HandlerResult<Value> {
    serde_json::to_value(body).map_err(|e| HandlerError::Internal(e.to_string()))
}
