//! WebSocket handler
//!
//! Verifies the session on upgrade, then pumps frames between the socket and
//! the event dispatcher until either side goes away.

use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{
        ws::{CloseFrame, Message, WebSocket},
        Query, State, WebSocketUpgrade,
    },
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use futures_util::{
    stream::{SplitSink, SplitStream},
    SinkExt, StreamExt,
};
use tokio::sync::{mpsc, oneshot};

use presence_common::{AppError, ErrorResponse, Session};

use crate::connection::Connection;
use crate::handlers::{EventDispatcher, SessionHandler};
use crate::protocol::{ClientFrame, CloseCode, ServerFrame};
use crate::server::GatewayState;

/// Channel buffer size for outgoing frames
const OUTBOUND_BUFFER: usize = 100;

/// Presence socket upgrade
pub async fn presence_handler(
    State(state): State<GatewayState>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Response {
    let Some(token) = extract_token(&headers, &params) else {
        return reject(&AppError::MissingAuth);
    };

    let session = match state.verifier().verify(&token).await {
        Ok(session) => session,
        Err(e) => {
            tracing::debug!(error = %e, "Rejected presence upgrade");
            return reject(&e);
        }
    };

    ws.on_upgrade(move |socket| handle_socket(state, socket, session))
}

/// Bearer header first, then the `token` query parameter
fn extract_token(headers: &HeaderMap, params: &HashMap<String, String>) -> Option<String> {
    headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(String::from)
        .or_else(|| params.get("token").filter(|t| !t.is_empty()).cloned())
}

fn reject(err: &AppError) -> Response {
    let status =
        StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(ErrorResponse::from(err))).into_response()
}

/// Handle an upgraded WebSocket connection
async fn handle_socket(state: GatewayState, socket: WebSocket, session: Session) {
    let (tx, rx) = mpsc::channel::<ServerFrame>(OUTBOUND_BUFFER);
    let connection = Connection::new(session, tx);
    state.rooms().register(connection.clone());

    tracing::info!(
        connection_id = %connection.id(),
        tenant_id = %connection.tenant_id(),
        user_id = %connection.user_id(),
        "WebSocket connection established"
    );

    let (sink, stream) = socket.split();
    let (close_tx, close_rx) = oneshot::channel();
    let send_task = tokio::spawn(write_loop(
        sink,
        rx,
        close_rx,
        connection.id().to_string(),
    ));

    let close_code = read_loop(&state, &connection, stream).await;

    SessionHandler::disconnect(&state, &connection).await;
    let _ = close_tx.send(close_code);
    let _ = send_task.await;

    tracing::info!(
        connection_id = %connection.id(),
        close_code = ?close_code,
        connected_ms = connection.connected_for().as_millis(),
        "WebSocket connection closed"
    );
}

/// Dispatch inbound frames until the client leaves or the connection must close
async fn read_loop(
    state: &GatewayState,
    connection: &Arc<Connection>,
    mut stream: SplitStream<WebSocket>,
) -> Option<CloseCode> {
    loop {
        let message = tokio::select! {
            () = state.shutdown_token().cancelled() => return Some(CloseCode::ServerShutdown),
            message = stream.next() => message,
        };

        match message {
            Some(Ok(Message::Text(text))) => {
                let frame = match ClientFrame::from_json(&text) {
                    Ok(frame) => frame,
                    Err(e) => {
                        tracing::debug!(
                            connection_id = %connection.id(),
                            error = %e,
                            "Failed to parse frame"
                        );
                        return Some(CloseCode::DecodeError);
                    }
                };

                let reply = EventDispatcher::dispatch(state, connection, frame).await;
                if connection.send(reply).await.is_err() {
                    return None;
                }
            }
            Some(Ok(Message::Binary(_))) => {
                tracing::debug!(connection_id = %connection.id(), "Binary frames not supported");
                return Some(CloseCode::DecodeError);
            }
            Some(Ok(Message::Ping(_) | Message::Pong(_))) => {
                tracing::trace!(connection_id = %connection.id(), "Ping/pong received");
            }
            Some(Ok(Message::Close(_))) | None => {
                tracing::debug!(connection_id = %connection.id(), "Client closed connection");
                return None;
            }
            Some(Err(e)) => {
                tracing::warn!(connection_id = %connection.id(), error = %e, "WebSocket error");
                return Some(CloseCode::UnknownError);
            }
        }
    }
}

/// Drain queued frames to the socket; close it when the read side finishes
async fn write_loop(
    mut sink: SplitSink<WebSocket, Message>,
    mut rx: mpsc::Receiver<ServerFrame>,
    mut close_rx: oneshot::Receiver<Option<CloseCode>>,
    connection_id: String,
) {
    loop {
        tokio::select! {
            biased;
            frame = rx.recv() => {
                let Some(frame) = frame else { break };
                let json = match frame.to_json() {
                    Ok(json) => json,
                    Err(e) => {
                        tracing::error!(connection_id = %connection_id, error = %e, "Failed to encode frame");
                        continue;
                    }
                };
                if sink.send(Message::Text(json)).await.is_err() {
                    tracing::debug!(connection_id = %connection_id, "Failed to write to WebSocket");
                    return;
                }
            }
            code = &mut close_rx => {
                let frame = code.ok().flatten().map(|code| CloseFrame {
                    code: code.as_u16(),
                    reason: Cow::Borrowed(code.description()),
                });
                let _ = sink.send(Message::Close(frame)).await;
                break;
            }
        }
    }

    let _ = sink.close().await;
}
