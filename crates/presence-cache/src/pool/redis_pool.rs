//! Redis connection pool using deadpool-redis.
//!
//! The pool is shared across tenants and implements [`KeyValueStore`].

use async_trait::async_trait;
use deadpool_redis::{Config, Pool, Runtime};
use presence_core::DomainError;
use redis::AsyncCommands;

use crate::store::{KeyTtl, KeyValueStore, ScanPage};

/// Redis pool configuration
#[derive(Debug, Clone)]
pub struct RedisPoolConfig {
    /// Redis connection URL (e.g., `redis://localhost:6379`)
    pub url: String,
    /// Maximum number of connections in the pool
    pub max_connections: usize,
}

impl Default for RedisPoolConfig {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1:6379".to_string(),
            max_connections: 16,
        }
    }
}

impl From<&presence_common::RedisConfig> for RedisPoolConfig {
    fn from(config: &presence_common::RedisConfig) -> Self {
        Self {
            url: config.url.clone(),
            max_connections: config.max_connections as usize,
        }
    }
}

/// Error type for key-value operations
#[derive(Debug, thiserror::Error)]
pub enum RedisPoolError {
    #[error("Failed to create Redis pool: {0}")]
    CreatePool(String),

    #[error("Failed to get connection from pool: {0}")]
    GetConnection(#[from] deadpool_redis::PoolError),

    #[error("Redis command error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Connection not available")]
    ConnectionNotAvailable,
}

/// Bad arguments and undecodable payloads are bugs, not outages
impl From<RedisPoolError> for DomainError {
    fn from(err: RedisPoolError) -> Self {
        match err {
            RedisPoolError::InvalidArgument(_) | RedisPoolError::Serialization(_) => {
                DomainError::InternalError(err.to_string())
            }
            _ => DomainError::StoreUnavailable(err.to_string()),
        }
    }
}

/// Result type for key-value operations
pub type RedisResult<T> = Result<T, RedisPoolError>;

/// Managed Redis connection pool
#[derive(Clone)]
pub struct RedisPool {
    pool: Pool,
}

impl std::fmt::Debug for RedisPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisPool")
            .field("status", &self.pool.status())
            .finish()
    }
}

impl RedisPool {
    /// Create a new Redis pool with the given configuration
    pub fn new(config: RedisPoolConfig) -> RedisResult<Self> {
        let pool = Config::from_url(&config.url)
            .builder()
            .map_err(|e| RedisPoolError::CreatePool(e.to_string()))?
            .max_size(config.max_connections)
            .runtime(Runtime::Tokio1)
            .build()
            .map_err(|e| RedisPoolError::CreatePool(e.to_string()))?;

        // Redact credentials from URL for logging
        let safe_url = config.url.split('@').next_back().unwrap_or(&config.url);
        tracing::info!(
            url = %safe_url,
            max_connections = config.max_connections,
            "Redis pool created"
        );

        Ok(Self { pool })
    }

    /// Create a pool from application config
    pub fn from_config(config: &presence_common::RedisConfig) -> RedisResult<Self> {
        Self::new(RedisPoolConfig::from(config))
    }

    async fn conn(&self) -> RedisResult<deadpool_redis::Connection> {
        self.pool.get().await.map_err(RedisPoolError::GetConnection)
    }

    /// Current pool status
    #[must_use]
    pub fn status(&self) -> deadpool_redis::Status {
        self.pool.status()
    }
}

fn seconds(ttl_secs: u64) -> RedisResult<i64> {
    i64::try_from(ttl_secs)
        .map_err(|_| RedisPoolError::InvalidArgument(format!("TTL {ttl_secs} too large")))
}

#[async_trait]
impl KeyValueStore for RedisPool {
    async fn get(&self, key: &str) -> RedisResult<Option<String>> {
        let mut conn = self.conn().await?;
        let value: Option<String> = conn.get(key).await?;
        Ok(value)
    }

    async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> RedisResult<()> {
        if ttl_secs == 0 {
            return Err(RedisPoolError::InvalidArgument("TTL must be positive".to_string()));
        }
        let mut conn = self.conn().await?;
        conn.set_ex::<_, _, ()>(key, value, ttl_secs).await?;
        Ok(())
    }

    async fn mget(&self, keys: &[String]) -> RedisResult<Vec<Option<String>>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let mut conn = self.conn().await?;
        // MGET always replies with an array, even for a single key
        let values: Vec<Option<String>> = redis::cmd("MGET")
            .arg(keys)
            .query_async(&mut conn)
            .await?;
        Ok(values)
    }

    async fn scan(&self, cursor: u64, pattern: &str, count: usize) -> RedisResult<ScanPage> {
        let mut conn = self.conn().await?;
        let (cursor, keys): (u64, Vec<String>) = redis::cmd("SCAN")
            .arg(cursor)
            .arg("MATCH")
            .arg(pattern)
            .arg("COUNT")
            .arg(count.max(1))
            .query_async(&mut conn)
            .await?;
        Ok(ScanPage { cursor, keys })
    }

    async fn expire(&self, key: &str, ttl_secs: u64) -> RedisResult<bool> {
        let ttl = seconds(ttl_secs)?;
        let mut conn = self.conn().await?;
        let applied: bool = conn.expire(key, ttl).await?;
        Ok(applied)
    }

    async fn ttl(&self, key: &str) -> RedisResult<KeyTtl> {
        let mut conn = self.conn().await?;
        let reply: i64 = conn.ttl(key).await?;
        Ok(KeyTtl::from_redis(reply))
    }

    async fn del(&self, key: &str) -> RedisResult<bool> {
        let mut conn = self.conn().await?;
        let deleted: i32 = conn.del(key).await?;
        Ok(deleted > 0)
    }

    async fn ping(&self) -> RedisResult<()> {
        let mut conn = self.conn().await?;
        redis::cmd("PING").query_async::<String>(&mut conn).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RedisPoolConfig::default();
        assert_eq!(config.url, "redis://127.0.0.1:6379");
        assert_eq!(config.max_connections, 16);
    }

    #[test]
    fn test_config_from_redis_config() {
        let redis_config = presence_common::RedisConfig {
            url: "redis://localhost:6380".to_string(),
            max_connections: 32,
        };
        let pool_config = RedisPoolConfig::from(&redis_config);
        assert_eq!(pool_config.url, "redis://localhost:6380");
        assert_eq!(pool_config.max_connections, 32);
    }

    #[test]
    fn test_error_maps_to_store_unavailable() {
        let err: DomainError = RedisPoolError::ConnectionNotAvailable.into();
        assert!(err.is_transient());
        assert_eq!(err.code(), "STORE_UNAVAILABLE");
    }

    #[test]
    fn test_invalid_argument_is_not_an_outage() {
        let err: DomainError = RedisPoolError::InvalidArgument("TTL must be positive".into()).into();
        assert!(!err.is_transient());
        assert!(matches!(err, DomainError::InternalError(_)));
    }

    #[test]
    fn test_ttl_bounds() {
        assert_eq!(seconds(60).unwrap(), 60);
        assert!(seconds(u64::MAX).is_err());
    }
}
