//! Tenant-scoped collection port
//!
//! Every persistent collection the presence system owns is reached through
//! [`TenantCollection`]. Implementations in the infrastructure layer translate
//! filters and pipelines into their store; the isolation guard wraps any of
//! them and enforces the tenant boundary before a call reaches the store.

use std::sync::Arc;

use async_trait::async_trait;

use crate::entities::{ConnectionEdge, EdgeField, EdgeFilter, EdgePatch};
use crate::error::DomainError;
use crate::value_objects::TenantId;

/// Result type for repository operations
pub type RepoResult<T> = Result<T, DomainError>;

// ============================================================================
// Tenant accessors
// ============================================================================

/// An entity that belongs to a tenant
pub trait TenantOwned {
    fn tenant_id(&self) -> Option<&TenantId>;
    fn set_tenant_id(&mut self, tenant_id: TenantId);
}

/// A query filter with a tenant clause
pub trait TenantFilter: Sized {
    fn tenant_id(&self) -> Option<&TenantId>;
    fn set_tenant_id(&mut self, tenant_id: TenantId);

    /// Filter that matches everything in `tenant_id` and nothing else
    fn for_tenant(tenant_id: TenantId) -> Self;
}

/// An update patch that may try to set the tenant
pub trait TenantPatch {
    fn tenant_id(&self) -> Option<&TenantId>;
}

// ============================================================================
// Aggregation
// ============================================================================

/// One aggregation stage
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stage<F, K> {
    /// Keep only entities matching the filter
    Match(F),
    /// Count entities per distinct value of the field
    GroupBy(K),
    /// Keep at most n rows
    Limit(usize),
}

/// Ordered aggregation stages
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pipeline<F, K> {
    stages: Vec<Stage<F, K>>,
}

impl<F, K> Default for Pipeline<F, K> {
    fn default() -> Self {
        Self { stages: Vec::new() }
    }
}

impl<F, K> Pipeline<F, K> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn matching(mut self, filter: F) -> Self {
        self.stages.push(Stage::Match(filter));
        self
    }

    #[must_use]
    pub fn group_by(mut self, field: K) -> Self {
        self.stages.push(Stage::GroupBy(field));
        self
    }

    #[must_use]
    pub fn limit(mut self, n: usize) -> Self {
        self.stages.push(Stage::Limit(n));
        self
    }

    /// Insert a stage ahead of all others
    pub fn prepend(&mut self, stage: Stage<F, K>) {
        self.stages.insert(0, stage);
    }

    pub fn stages(&self) -> &[Stage<F, K>] {
        &self.stages
    }

    pub fn into_stages(self) -> Vec<Stage<F, K>> {
        self.stages
    }
}

/// A grouped count. Ungrouped pipelines yield a single row keyed `*`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupRow {
    pub key: String,
    pub count: u64,
}

impl GroupRow {
    pub const TOTAL_KEY: &'static str = "*";

    pub fn new(key: impl Into<String>, count: u64) -> Self {
        Self {
            key: key.into(),
            count,
        }
    }
}

// ============================================================================
// Collection
// ============================================================================

#[async_trait]
pub trait TenantCollection: Send + Sync {
    type Entity: TenantOwned + Clone + Send + Sync + 'static;
    type Filter: TenantFilter + Clone + Send + Sync + 'static;
    type Patch: TenantPatch + Send + Sync + 'static;
    type Field: Copy + Send + Sync + 'static;

    /// Collection name, for logs
    fn name(&self) -> &'static str;

    /// Entities matching the filter
    async fn find(&self, filter: Self::Filter) -> RepoResult<Vec<Self::Entity>>;

    /// Insert entities, skipping duplicates. Returns how many were new.
    async fn insert_many(&self, entities: Vec<Self::Entity>) -> RepoResult<u64>;

    /// Apply the patch to every match. Returns how many changed.
    async fn update(&self, filter: Self::Filter, patch: Self::Patch) -> RepoResult<u64>;

    /// Delete every match. Returns how many were removed.
    async fn delete(&self, filter: Self::Filter) -> RepoResult<u64>;

    /// Run an aggregation pipeline
    async fn aggregate(
        &self,
        pipeline: Pipeline<Self::Filter, Self::Field>,
    ) -> RepoResult<Vec<GroupRow>>;
}

#[async_trait]
impl<T> TenantCollection for Arc<T>
where
    T: TenantCollection + ?Sized,
{
    type Entity = T::Entity;
    type Filter = T::Filter;
    type Patch = T::Patch;
    type Field = T::Field;

    fn name(&self) -> &'static str {
        (**self).name()
    }

    async fn find(&self, filter: Self::Filter) -> RepoResult<Vec<Self::Entity>> {
        (**self).find(filter).await
    }

    async fn insert_many(&self, entities: Vec<Self::Entity>) -> RepoResult<u64> {
        (**self).insert_many(entities).await
    }

    async fn update(&self, filter: Self::Filter, patch: Self::Patch) -> RepoResult<u64> {
        (**self).update(filter, patch).await
    }

    async fn delete(&self, filter: Self::Filter) -> RepoResult<u64> {
        (**self).delete(filter).await
    }

    async fn aggregate(
        &self,
        pipeline: Pipeline<Self::Filter, Self::Field>,
    ) -> RepoResult<Vec<GroupRow>> {
        (**self).aggregate(pipeline).await
    }
}

/// Type-erased connection-edge collection
pub type SharedEdgeCollection = Arc<
    dyn TenantCollection<
        Entity = ConnectionEdge,
        Filter = EdgeFilter,
        Patch = EdgePatch,
        Field = EdgeField,
    >,
>;
