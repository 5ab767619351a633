//! Edge collection implementations
//!
//! Both implement [`TenantCollection`](presence_core::TenantCollection) without any
//! tenant enforcement of their own; wrap them in the isolation guard.

mod edge;
mod error;
mod memory;
mod plan;

pub use edge::PgEdgeCollection;
pub use error::map_db_error;
pub use memory::MemoryEdgeCollection;
