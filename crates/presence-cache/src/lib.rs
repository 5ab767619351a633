//! # presence-cache
//!
//! Key-value layer for ephemeral presence records.
//!
//! ## Features
//!
//! - **Store port**: [`KeyValueStore`] with get / set-with-expiry / batched get / cursor scan / ttl
//! - **Redis**: [`RedisPool`] implements the port over a deadpool-managed connection pool
//! - **In-memory**: [`MemoryStore`] implements the port for tests and single-node runs
//! - **Presence**: [`PresenceStore`] keeps one record per user under a tenant-prefixed key
//!
//! ## Example
//!
//! ```ignore
//! use presence_cache::{PresenceStore, RedisPool, RedisPoolConfig};
//!
//! let pool = RedisPool::new(RedisPoolConfig::default())?;
//! let store = PresenceStore::new(Arc::new(pool));
//!
//! run_with_tenant(tenant, async {
//!     store.set_presence(&user_id, &record, 60).await
//! })
//! .await?;
//! ```

pub mod pool;
pub mod presence;
pub mod store;

// Re-export pool types
pub use pool::{RedisPool, RedisPoolConfig, RedisPoolError, RedisResult};

// Re-export store types
pub use store::{KeyTtl, KeyValueStore, MemoryStore, ScanPage, SharedKeyValueStore};

// Re-export presence types
pub use presence::{OnlinePage, PresenceStore, PRESENCE_PREFIX};
