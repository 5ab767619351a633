//! # presence-db
//!
//! Persistence for the connection graph.
//!
//! ## Overview
//!
//! - [`TenantIsolationGuard`] wraps any [`TenantCollection`](presence_core::TenantCollection)
//!   and scopes every call to the ambient tenant
//! - [`PgEdgeCollection`] stores edges in PostgreSQL via SQLx
//! - [`MemoryEdgeCollection`] keeps edges in memory for tests and single-node runs
//!
//! ## Usage
//!
//! ```rust,ignore
//! use presence_db::{create_pool, ensure_schema, DatabaseConfig, PgEdgeCollection, TenantIsolationGuard};
//!
//! let pool = create_pool(&DatabaseConfig::from(&app_config.database)).await?;
//! ensure_schema(&pool).await?;
//! let edges = TenantIsolationGuard::new(PgEdgeCollection::new(pool));
//! ```

pub mod guard;
pub mod mappers;
pub mod models;
pub mod pool;
pub mod repositories;
pub mod schema;

// Re-export commonly used types
pub use guard::TenantIsolationGuard;
pub use pool::{create_pool, ping, DatabaseConfig, PgPool};
pub use repositories::{MemoryEdgeCollection, PgEdgeCollection};
pub use schema::ensure_schema;
