//! Gateway state
//!
//! Application state for the gateway server.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use presence_common::SessionVerifier;
use presence_db::PgPool;
use presence_service::ServiceContext;

use crate::connection::RoomRegistry;

/// Gateway application state
///
/// Holds all shared dependencies for the gateway server.
#[derive(Clone)]
pub struct GatewayState {
    /// Presence services
    services: Arc<ServiceContext>,
    /// Live connections and their rooms; also the coordinator's transport
    rooms: Arc<RoomRegistry>,
    /// Verifies the credential presented on upgrade
    verifier: Arc<dyn SessionVerifier>,
    /// Graph database, when the edges live in PostgreSQL
    pool: Option<PgPool>,
    /// Cancelled when the server begins shutting down
    shutdown: CancellationToken,
}

impl GatewayState {
    pub fn new(
        services: ServiceContext,
        rooms: Arc<RoomRegistry>,
        verifier: Arc<dyn SessionVerifier>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            services: Arc::new(services),
            rooms,
            verifier,
            pool: None,
            shutdown,
        }
    }

    /// Attach the graph database so health checks can reach it
    #[must_use]
    pub fn with_pool(mut self, pool: PgPool) -> Self {
        self.pool = Some(pool);
        self
    }

    pub fn services(&self) -> &ServiceContext {
        &self.services
    }

    pub fn rooms(&self) -> &Arc<RoomRegistry> {
        &self.rooms
    }

    pub fn verifier(&self) -> &dyn SessionVerifier {
        self.verifier.as_ref()
    }

    pub fn pool(&self) -> Option<&PgPool> {
        self.pool.as_ref()
    }

    pub fn shutdown_token(&self) -> &CancellationToken {
        &self.shutdown
    }
}

impl std::fmt::Debug for GatewayState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayState")
            .field("rooms", &self.rooms)
            .field("postgres", &self.pool.is_some())
            .field("shutting_down", &self.shutdown.is_cancelled())
            .finish_non_exhaustive()
    }
}
