//! `get_presence` and `get_online_users`

use serde_json::Value;

use presence_core::UserId;

use super::{ack_body, HandlerError, HandlerResult};
use crate::protocol::{
    GetOnlineUsersPayload, GetPresencePayload, OnlineUsersAck, PresenceAck, DEFAULT_PAGE,
};
use crate::server::GatewayState;

/// Handles presence reads. Batch bounds are checked by the query service.
pub struct QueryHandler;

impl QueryHandler {
    pub async fn get_presence(state: &GatewayState, payload: GetPresencePayload) -> HandlerResult<Value> {
        let user_ids = payload
            .user_ids
            .iter()
            .map(|raw| UserId::parse(raw.as_str()))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| HandlerError::InvalidPayload(e.to_string()))?;

        let records = state.services().queries().get_presence(&user_ids).await?;
        ack_body(&PresenceAck {
            success: true,
            presence: records
                .into_iter()
                .map(|(user_id, record)| (user_id.into_inner(), record))
                .collect(),
        })
    }

    pub async fn get_online_users(
        state: &GatewayState,
        payload: GetOnlineUsersPayload,
    ) -> HandlerResult<Value> {
        let cursor = parse_cursor(payload.cursor.as_deref())?;
        let queries = state.services().queries();
        let limit = payload
            .limit
            .unwrap_or_else(|| DEFAULT_PAGE.min(queries.max_batch()));

        let page = queries.get_online_users(limit, cursor).await?;
        ack_body(&OnlineUsersAck {
            success: true,
            users: page.records,
            next_cursor: page.next_cursor.to_string(),
        })
    }
}

fn parse_cursor(raw: Option<&str>) -> HandlerResult<u64> {
    match raw {
        None | Some("") => Ok(0),
        Some(raw) => raw
            .parse()
            .map_err(|_| HandlerError::InvalidPayload(format!("Invalid cursor: {raw}"))),
    }
}
