//! Gateway server setup
//!
//! Routes, dependency wiring and the serve loop with graceful shutdown.

mod handler;
mod health;
mod state;

pub use handler::presence_handler;
pub use health::{health_check, HealthReport};
pub use state::GatewayState;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{routing::get, Router};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

use presence_cache::RedisPool;
use presence_common::{AppConfig, AppError, AppResult, JwtService};
use presence_db::PgEdgeCollection;
use presence_service::ServiceContext;

use crate::connection::RoomRegistry;

/// Create the gateway router
pub fn create_router() -> Router<GatewayState> {
    Router::new()
        .route("/presence", get(presence_handler))
        .route("/health", get(health_check))
}

/// Build the complete application
pub fn create_app(state: GatewayState) -> Router {
    create_router()
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Connect to PostgreSQL and Redis and start the presence services.
///
/// The returned handle finishes once `shutdown` is cancelled and the
/// coordinator has drained.
pub async fn create_gateway_state(
    config: &AppConfig,
    shutdown: CancellationToken,
) -> AppResult<(GatewayState, JoinHandle<()>)> {
    tracing::info!("Connecting to PostgreSQL...");
    let pool = presence_db::create_pool(&presence_db::DatabaseConfig::from(&config.database))
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;
    presence_db::ensure_schema(&pool).await?;
    tracing::info!("PostgreSQL connection established");

    tracing::info!("Connecting to Redis...");
    let redis = RedisPool::from_config(&config.redis).map_err(|e| AppError::Cache(e.to_string()))?;
    tracing::info!("Redis pool created");

    let verifier = Arc::new(JwtService::new(
        &config.jwt.secret,
        config.jwt.access_token_expiry,
    ));
    let rooms = RoomRegistry::new_shared();

    let (services, coordinator) = ServiceContext::builder()
        .config(config.presence.clone())
        .edges(Arc::new(PgEdgeCollection::new(pool.clone())))
        .key_value(Arc::new(redis))
        .transport(rooms.clone())
        .build(shutdown.clone())?;

    let state = GatewayState::new(services, rooms, verifier, shutdown).with_pool(pool);
    Ok((state, coordinator))
}

/// Serve until `shutdown` is cancelled
pub async fn run_server(app: Router, addr: SocketAddr, shutdown: CancellationToken) -> AppResult<()> {
    tracing::info!("Starting Gateway server on {}", addr);

    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| AppError::internal(anyhow::anyhow!("Failed to bind to {addr}: {e}")))?;

    tracing::info!("Gateway listening on ws://{}/presence", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .map_err(|e| AppError::internal(anyhow::anyhow!("Server error: {e}")))?;

    Ok(())
}

/// Run the complete gateway server with configuration
pub async fn run(config: AppConfig) -> AppResult<()> {
    let addr: SocketAddr = config
        .gateway
        .address()
        .parse()
        .map_err(|e| AppError::validation(format!("Invalid gateway address: {e}")))?;

    let shutdown = CancellationToken::new();
    let (state, coordinator) = create_gateway_state(&config, shutdown.clone()).await?;

    let signal = shutdown.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for shutdown signal");
            return;
        }
        tracing::info!("Shutdown signal received");
        signal.cancel();
    });

    let app = create_app(state.clone());
    let served = run_server(app, addr, shutdown.clone()).await;

    shutdown.cancel();
    let cancelled = state.services().shutdown();
    if let Err(e) = coordinator.await {
        tracing::warn!(error = %e, "Broadcast coordinator ended abnormally");
    }
    state.rooms().clear();
    tracing::info!(cancelled_timers = cancelled, "Gateway stopped");

    served
}
