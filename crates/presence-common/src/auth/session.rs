//! Verified session identity

use async_trait::async_trait;
use presence_core::{TenantId, UserId};

use crate::error::AppError;

/// Identity established by the authentication service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub user_id: UserId,
    pub tenant_id: TenantId,
}

/// Turns a bearer credential into a session.
///
/// The gateway depends on this trait rather than on a concrete token format.
#[async_trait]
pub trait SessionVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> Result<Session, AppError>;
}
