//! Key-value store port

use std::sync::Arc;

use async_trait::async_trait;

use crate::pool::RedisResult;

/// Remaining lifetime of a key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyTtl {
    /// Key does not exist
    Missing,
    /// Key exists and never expires
    Persistent,
    /// Key expires in this many seconds
    Seconds(u64),
}

impl KeyTtl {
    /// Decode a Redis `TTL` reply (`-2` missing, `-1` no expiry)
    #[must_use]
    pub fn from_redis(reply: i64) -> Self {
        match reply {
            -2 => Self::Missing,
            r if r < 0 => Self::Persistent,
            r => Self::Seconds(r as u64),
        }
    }
}

/// One page of a cursor scan. A returned cursor of `0` means the scan is complete.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanPage {
    pub cursor: u64,
    pub keys: Vec<String>,
}

/// String key-value store with expiry.
///
/// Shared by every tenant; callers scope access through their key layout.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> RedisResult<Option<String>>;

    /// Write `value` expiring after `ttl_secs`
    async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> RedisResult<()>;

    /// Batched get in one round trip; the result is positional
    async fn mget(&self, keys: &[String]) -> RedisResult<Vec<Option<String>>>;

    /// Examine about `count` keys from `cursor`, returning those matching `pattern`
    async fn scan(&self, cursor: u64, pattern: &str, count: usize) -> RedisResult<ScanPage>;

    /// Set a key's expiry. Returns false when the key does not exist.
    async fn expire(&self, key: &str, ttl_secs: u64) -> RedisResult<bool>;

    async fn ttl(&self, key: &str) -> RedisResult<KeyTtl>;

    async fn del(&self, key: &str) -> RedisResult<bool>;

    async fn ping(&self) -> RedisResult<()>;
}

/// Shared key-value store handle
pub type SharedKeyValueStore = Arc<dyn KeyValueStore>;
