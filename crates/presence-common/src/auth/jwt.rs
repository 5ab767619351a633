//! JWT session tokens
//!
//! Access tokens carry the user in `sub` and the tenant in `tid`.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use presence_core::{TenantId, UserId};
use serde::{Deserialize, Serialize};

use super::session::{Session, SessionVerifier};
use crate::error::AppError;

/// JWT claims structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: String,
    /// Tenant ID
    pub tid: String,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
}

impl Claims {
    /// Validate the identifiers and build a session
    ///
    /// # Errors
    /// Returns `InvalidToken` if either id is malformed
    pub fn session(&self) -> Result<Session, AppError> {
        let user_id = UserId::parse(self.sub.as_str()).map_err(|_| AppError::InvalidToken)?;
        let tenant_id = TenantId::parse(self.tid.as_str()).map_err(|_| AppError::InvalidToken)?;
        Ok(Session { user_id, tenant_id })
    }
}

/// Encodes and verifies access tokens with a shared secret
#[derive(Clone)]
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    access_token_expiry: i64,
}

impl JwtService {
    #[must_use]
    pub fn new(secret: &str, access_token_expiry: i64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            access_token_expiry,
        }
    }

    /// Issue an access token for a user within a tenant
    ///
    /// # Errors
    /// Returns an error if token encoding fails
    pub fn issue(&self, user_id: &UserId, tenant_id: &TenantId) -> Result<String, AppError> {
        let now = Utc::now();
        let claims = Claims {
            sub: user_id.to_string(),
            tid: tenant_id.to_string(),
            iat: now.timestamp(),
            exp: (now + Duration::seconds(self.access_token_expiry)).timestamp(),
        };

        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|_| AppError::Internal(anyhow::anyhow!("Failed to encode JWT")))
    }

    /// Decode and validate a token
    ///
    /// # Errors
    /// Returns an error if the token is invalid or expired
    pub fn decode_token(&self, token: &str) -> Result<Claims, AppError> {
        let token_data = decode::<Claims>(token, &self.decoding_key, &Validation::default())
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => AppError::TokenExpired,
                _ => AppError::InvalidToken,
            })?;

        Ok(token_data.claims)
    }
}

#[async_trait]
impl SessionVerifier for JwtService {
    async fn verify(&self, token: &str) -> Result<Session, AppError> {
        self.decode_token(token)?.session()
    }
}

impl std::fmt::Debug for JwtService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtService")
            .field("access_token_expiry", &self.access_token_expiry)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_service() -> JwtService {
        JwtService::new("test-secret-key-that-is-long-enough", 900)
    }

    fn ids() -> (UserId, TenantId) {
        (UserId::parse("alice").unwrap(), TenantId::parse("acme").unwrap())
    }

    #[test]
    fn test_issue_and_decode() {
        let service = create_test_service();
        let (user, tenant) = ids();

        let token = service.issue(&user, &tenant).unwrap();
        let claims = service.decode_token(&token).unwrap();

        assert_eq!(claims.sub, "alice");
        assert_eq!(claims.tid, "acme");
        assert_eq!(claims.exp - claims.iat, 900);
    }

    #[tokio::test]
    async fn test_verify_builds_session() {
        let service = create_test_service();
        let (user, tenant) = ids();

        let token = service.issue(&user, &tenant).unwrap();
        let session = service.verify(&token).await.unwrap();

        assert_eq!(session.user_id, user);
        assert_eq!(session.tenant_id, tenant);
    }

    #[tokio::test]
    async fn test_wrong_secret_rejected() {
        let (user, tenant) = ids();
        let token = create_test_service().issue(&user, &tenant).unwrap();

        let other = JwtService::new("a-different-secret-key-entirely", 900);
        assert!(matches!(other.verify(&token).await, Err(AppError::InvalidToken)));
    }

    #[test]
    fn test_invalid_token() {
        let service = create_test_service();
        let result = service.decode_token("invalid.token.here");
        assert!(matches!(result, Err(AppError::InvalidToken)));
    }

    #[test]
    fn test_expired_token() {
        let service = JwtService::new("test-secret-key-that-is-long-enough", -3600);
        let (user, tenant) = ids();

        let token = service.issue(&user, &tenant).unwrap();
        assert!(matches!(service.decode_token(&token), Err(AppError::TokenExpired)));
    }

    #[test]
    fn test_malformed_tenant_claim() {
        let claims = Claims {
            sub: "alice".to_string(),
            tid: "acme:evil".to_string(),
            iat: 0,
            exp: i64::MAX,
        };
        assert!(matches!(claims.session(), Err(AppError::InvalidToken)));
    }
}
