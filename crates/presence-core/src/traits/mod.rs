//! Persistence ports

mod collection;

pub use collection::{
    GroupRow, Pipeline, RepoResult, SharedEdgeCollection, Stage, TenantCollection, TenantFilter,
    TenantOwned, TenantPatch,
};
