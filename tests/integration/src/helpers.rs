//! Test helpers for integration tests
//!
//! Provides an in-process gateway and a small WebSocket client that speaks the
//! presence protocol.

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Result};
use futures_util::{SinkExt, StreamExt};
use reqwest::Client;
use serde_json::{json, Value};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;

use presence_cache::MemoryStore;
use presence_common::{JwtService, PresenceConfig};
use presence_core::{run_with_tenant, TenantId, UserId};
use presence_db::MemoryEdgeCollection;
use presence_gateway::connection::RoomRegistry;
use presence_gateway::{create_app, GatewayState};
use presence_service::ServiceContext;

const TEST_SECRET: &str = "integration-test-secret";

/// How long to wait for a frame that should arrive
pub const EVENT_TIMEOUT: Duration = Duration::from_secs(3);

/// How long to listen when asserting that nothing arrives
pub const QUIET_PERIOD: Duration = Duration::from_millis(300);

/// Presence settings with a window long enough that no test times out by accident
pub fn test_presence_config() -> PresenceConfig {
    PresenceConfig {
        timeout_window_secs: 5,
        heartbeat_interval_ms: 250,
        ..PresenceConfig::default()
    }
}

/// Presence settings with a one-second timeout window
pub fn short_window_config() -> PresenceConfig {
    PresenceConfig {
        timeout_window_secs: 1,
        ..test_presence_config()
    }
}

/// Gateway running on an ephemeral port; stops when dropped
pub struct TestServer {
    pub addr: SocketAddr,
    pub client: Client,
    pub state: GatewayState,
    jwt: JwtService,
    shutdown: CancellationToken,
}

impl TestServer {
    /// Start a new test server
    pub async fn start() -> Result<Self> {
        Self::start_with_config(test_presence_config()).await
    }

    /// Start a test server with custom presence settings
    pub async fn start_with_config(config: PresenceConfig) -> Result<Self> {
        let shutdown = CancellationToken::new();
        let rooms = RoomRegistry::new_shared();
        let (services, _coordinator) = ServiceContext::builder()
            .config(config)
            .edges(Arc::new(MemoryEdgeCollection::new()))
            .key_value(Arc::new(MemoryStore::new()))
            .transport(rooms.clone())
            .build(shutdown.clone())?;

        let jwt = JwtService::new(TEST_SECRET, 3600);
        let state = GatewayState::new(services, rooms, Arc::new(jwt.clone()), shutdown.clone());

        let listener = TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0))).await?;
        let addr = listener.local_addr()?;
        let app = create_app(state.clone());
        let stop = shutdown.clone();
        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move { stop.cancelled().await })
                .await
                .ok();
        });

        let client = Client::builder().timeout(Duration::from_secs(10)).build()?;

        Ok(Self {
            addr,
            client,
            state,
            jwt,
            shutdown,
        })
    }

    /// Get base URL for the server
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Issue an access token for a user in a tenant
    pub fn token(&self, tenant: &TenantId, user: &UserId) -> String {
        self.jwt.issue(user, tenant).expect("token encodes")
    }

    /// Open a socket for the user without authenticating presence
    pub async fn connect(&self, tenant: &TenantId, user: &UserId) -> Result<WsClient> {
        let url = format!("ws://{}/presence?token={}", self.addr, self.token(tenant, user));
        WsClient::connect(&url).await
    }

    /// Open a socket and send `authenticate_presence`
    pub async fn connect_online(&self, tenant: &TenantId, user: &UserId) -> Result<WsClient> {
        let mut client = self.connect(tenant, user).await?;
        let ack = client.request("authenticate_presence", json!({})).await?;
        if ack["success"] != true {
            bail!("authenticate_presence failed: {ack}");
        }
        Ok(client)
    }

    /// Record a direct-message connection between two users
    pub async fn link(&self, tenant: &TenantId, a: &UserId, b: &UserId) -> Result<()> {
        let graph = self.state.services().graph();
        run_with_tenant(tenant.clone(), graph.add_direct_message_edge(a, b, "dm-test")).await?;
        Ok(())
    }

    /// Make a GET request
    pub async fn get(&self, path: &str) -> Result<reqwest::Response> {
        let url = format!("{}{}", self.base_url(), path);
        Ok(self.client.get(&url).send().await?)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// Minimal presence-protocol client
pub struct WsClient {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    next_id: u64,
    /// Events received while waiting for an acknowledgement
    pending: VecDeque<(String, Value)>,
}

impl WsClient {
    pub async fn connect(url: &str) -> Result<Self> {
        let (stream, _) = connect_async(url).await?;
        Ok(Self {
            stream,
            next_id: 1,
            pending: VecDeque::new(),
        })
    }

    /// Send an event and wait for its acknowledgement body
    pub async fn request(&mut self, event: &str, data: Value) -> Result<Value> {
        let id = self.next_id;
        self.next_id += 1;
        let frame = json!({ "event": event, "id": id, "data": data });
        self.stream.send(Message::Text(frame.to_string())).await?;

        loop {
            let frame = self.read(EVENT_TIMEOUT).await?.ok_or_else(|| anyhow!("no ack for {event}"))?;
            if frame.get("ack").and_then(Value::as_u64) == Some(id) {
                return Ok(frame["data"].clone());
            }
            if let Some(name) = frame.get("event").and_then(Value::as_str) {
                self.pending.push_back((name.to_string(), frame["data"].clone()));
            }
        }
    }

    /// Next event with the given name, or `None` if none arrives within `wait`
    pub async fn next_event(&mut self, name: &str, wait: Duration) -> Result<Option<Value>> {
        if let Some(pos) = self.pending.iter().position(|(event, _)| event == name) {
            return Ok(self.pending.remove(pos).map(|(_, data)| data));
        }

        let deadline = tokio::time::Instant::now() + wait;
        loop {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            let Some(frame) = self.read(remaining).await? else {
                return Ok(None);
            };
            match frame.get("event").and_then(Value::as_str) {
                Some(event) if event == name => return Ok(Some(frame["data"].clone())),
                Some(event) => self.pending.push_back((event.to_string(), frame["data"].clone())),
                None => {}
            }
        }
    }

    /// Every event with the given name that arrives within `wait`
    pub async fn collect_events(&mut self, name: &str, wait: Duration) -> Result<Vec<Value>> {
        let deadline = tokio::time::Instant::now() + wait;
        let mut events = Vec::new();
        loop {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            match self.next_event(name, remaining).await? {
                Some(data) => events.push(data),
                None => return Ok(events),
            }
        }
    }

    pub async fn close(mut self) -> Result<()> {
        self.stream.close(None).await?;
        // Wait for the server side to finish its cleanup
        while let Ok(Some(Ok(_))) = tokio::time::timeout(EVENT_TIMEOUT, self.stream.next()).await {}
        Ok(())
    }

    /// Next JSON text frame; `None` on timeout or close
    async fn read(&mut self, wait: Duration) -> Result<Option<Value>> {
        loop {
            let message = match tokio::time::timeout(wait, self.stream.next()).await {
                Err(_) | Ok(None) => return Ok(None),
                Ok(Some(message)) => message?,
            };
            match message {
                Message::Text(text) => return Ok(Some(serde_json::from_str(&text)?)),
                Message::Close(_) => return Ok(None),
                _ => {}
            }
        }
    }
}
