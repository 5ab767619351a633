//! Tenant isolation guard
//!
//! Decorates a [`TenantCollection`] so that nothing reaches the store without a
//! tenant binding:
//!
//! - filters that already name a tenant pass through unchanged
//! - filters without one get the ambient tenant, or the call fails with
//!   `SecurityViolation` and never runs unscoped
//! - new entities without a tenant get the ambient tenant
//! - updates may not move rows to another tenant
//! - aggregations always start with a match on the ambient tenant

use async_trait::async_trait;
use tracing::instrument;

use presence_core::{
    require_tenant, DomainError, GroupRow, Pipeline, RepoResult, Stage, TenantCollection,
    TenantFilter, TenantId, TenantOwned, TenantPatch,
};

/// Tenant-enforcing wrapper around a collection
#[derive(Debug, Clone)]
pub struct TenantIsolationGuard<C> {
    inner: C,
}

impl<C: TenantCollection> TenantIsolationGuard<C> {
    pub fn new(inner: C) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &C {
        &self.inner
    }

    fn violation(&self, operation: &'static str, err: DomainError) -> DomainError {
        tracing::error!(
            security_incident = true,
            collection = self.inner.name(),
            operation,
            error = %err,
            "Tenant isolation violation"
        );
        err
    }

    fn ambient_tenant(&self, operation: &'static str) -> RepoResult<TenantId> {
        require_tenant(operation).map_err(|err| self.violation(operation, err))
    }

    fn scope_filter(&self, operation: &'static str, mut filter: C::Filter) -> RepoResult<C::Filter> {
        if filter.tenant_id().is_none() {
            filter.set_tenant_id(self.ambient_tenant(operation)?);
        }
        Ok(filter)
    }
}

#[async_trait]
impl<C: TenantCollection> TenantCollection for TenantIsolationGuard<C> {
    type Entity = C::Entity;
    type Filter = C::Filter;
    type Patch = C::Patch;
    type Field = C::Field;

    fn name(&self) -> &'static str {
        self.inner.name()
    }

    async fn find(&self, filter: Self::Filter) -> RepoResult<Vec<Self::Entity>> {
        let filter = self.scope_filter("find", filter)?;
        self.inner.find(filter).await
    }

    #[instrument(skip_all, fields(collection = self.inner.name(), count = entities.len()))]
    async fn insert_many(&self, mut entities: Vec<Self::Entity>) -> RepoResult<u64> {
        if entities.iter().any(|entity| entity.tenant_id().is_none()) {
            let tenant_id = self.ambient_tenant("insert")?;
            for entity in entities.iter_mut().filter(|e| e.tenant_id().is_none()) {
                entity.set_tenant_id(tenant_id.clone());
            }
        }
        self.inner.insert_many(entities).await
    }

    async fn update(&self, filter: Self::Filter, patch: Self::Patch) -> RepoResult<u64> {
        let filter = self.scope_filter("update", filter)?;
        if let Some(target) = patch.tenant_id() {
            if filter.tenant_id() != Some(target) {
                return Err(self.violation("update", DomainError::tenant_mutation("update")));
            }
        }
        self.inner.update(filter, patch).await
    }

    async fn delete(&self, filter: Self::Filter) -> RepoResult<u64> {
        let filter = self.scope_filter("delete", filter)?;
        self.inner.delete(filter).await
    }

    async fn aggregate(
        &self,
        mut pipeline: Pipeline<Self::Filter, Self::Field>,
    ) -> RepoResult<Vec<GroupRow>> {
        let tenant_id = self.ambient_tenant("aggregate")?;
        pipeline.prepend(Stage::Match(<C::Filter as TenantFilter>::for_tenant(tenant_id)));
        self.inner.aggregate(pipeline).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::MemoryEdgeCollection;
    use presence_core::{
        run_with_tenant, ConnectionEdge, ConnectionType, EdgeField, EdgeFilter, EdgePatch,
        UserId,
    };
    use std::sync::Arc;

    fn uid(raw: &str) -> UserId {
        UserId::parse(raw).unwrap()
    }

    fn tid(raw: &str) -> TenantId {
        TenantId::parse(raw).unwrap()
    }

    fn bare(a: &str, b: &str, ctx: &str) -> ConnectionEdge {
        ConnectionEdge::new(uid(a), uid(b), ConnectionType::ChannelMember, ctx)
    }

    fn guarded() -> (Arc<MemoryEdgeCollection>, TenantIsolationGuard<Arc<MemoryEdgeCollection>>) {
        let raw = Arc::new(MemoryEdgeCollection::new());
        (raw.clone(), TenantIsolationGuard::new(raw))
    }

    #[tokio::test]
    async fn test_every_operation_requires_tenant() {
        let (raw, guard) = guarded();

        assert!(guard.find(EdgeFilter::new()).await.unwrap_err().is_security());
        assert!(guard
            .insert_many(vec![bare("a", "b", "c")])
            .await
            .unwrap_err()
            .is_security());
        assert!(guard
            .update(EdgeFilter::new(), EdgePatch::touch(chrono::Utc::now()))
            .await
            .unwrap_err()
            .is_security());
        assert!(guard.delete(EdgeFilter::new()).await.unwrap_err().is_security());
        assert!(guard
            .aggregate(Pipeline::new().group_by(EdgeField::UserId))
            .await
            .unwrap_err()
            .is_security());

        assert!(raw.is_empty());
    }

    #[tokio::test]
    async fn test_insert_injects_ambient_tenant() {
        let (raw, guard) = guarded();
        run_with_tenant(tid("acme"), async {
            guard.insert_many(vec![bare("a", "b", "c")]).await.unwrap();
        })
        .await;

        let stored = raw.snapshot();
        assert_eq!(stored[0].tenant_id, Some(tid("acme")));
    }

    #[tokio::test]
    async fn test_reads_are_scoped_to_ambient_tenant() {
        let (_, guard) = guarded();
        run_with_tenant(tid("acme"), async {
            guard.insert_many(vec![bare("a", "b", "c")]).await.unwrap();
        })
        .await;

        let seen = run_with_tenant(tid("globex"), async {
            guard.find(EdgeFilter::new().user(uid("a"))).await.unwrap()
        })
        .await;
        assert!(seen.is_empty());

        let removed = run_with_tenant(tid("globex"), async {
            guard.delete(EdgeFilter::new()).await.unwrap()
        })
        .await;
        assert_eq!(removed, 0);
    }

    #[tokio::test]
    async fn test_explicit_filter_passes_through() {
        let (_, guard) = guarded();
        run_with_tenant(tid("acme"), async {
            guard.insert_many(vec![bare("a", "b", "c")]).await.unwrap();
        })
        .await;

        let found = guard
            .find(EdgeFilter::for_tenant(tid("acme")))
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
    }

    #[tokio::test]
    async fn test_update_cannot_change_tenant() {
        let (raw, guard) = guarded();
        run_with_tenant(tid("acme"), async {
            guard.insert_many(vec![bare("a", "b", "c")]).await.unwrap();

            let patch = EdgePatch {
                last_interaction_at: None,
                tenant_id: Some(tid("globex")),
            };
            let err = guard.update(EdgeFilter::new(), patch).await.unwrap_err();
            assert!(err.is_security());

            let same = EdgePatch {
                last_interaction_at: Some(chrono::Utc::now()),
                tenant_id: Some(tid("acme")),
            };
            assert_eq!(guard.update(EdgeFilter::new(), same).await.unwrap(), 1);
        })
        .await;

        assert_eq!(raw.snapshot()[0].tenant_id, Some(tid("acme")));
    }

    #[tokio::test]
    async fn test_aggregate_never_crosses_tenants() {
        let (_, guard) = guarded();
        for tenant in ["acme", "globex"] {
            run_with_tenant(tid(tenant), async {
                guard
                    .insert_many(vec![bare("a", "b", "c"), bare("a", "d", "c")])
                    .await
                    .unwrap();
            })
            .await;
        }

        let rows = run_with_tenant(tid("acme"), async {
            guard
                .aggregate(Pipeline::new().group_by(EdgeField::UserId))
                .await
                .unwrap()
        })
        .await;
        assert_eq!(rows, vec![GroupRow::new("a", 2)]);
    }
}
