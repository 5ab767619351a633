//! In-memory edge collection

use std::collections::BTreeMap;

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::instrument;

use presence_core::{
    ConnectionEdge, DomainError, EdgeField, EdgeFilter, EdgePatch, GroupRow, Pipeline,
    RepoResult, TenantCollection,
};

use super::plan::AggregatePlan;

fn same_identity(a: &ConnectionEdge, b: &ConnectionEdge) -> bool {
    a.tenant_id == b.tenant_id
        && a.user_id == b.user_id
        && a.connection_id == b.connection_id
        && a.connection_type == b.connection_type
        && a.context_id == b.context_id
}

/// Edge collection held in memory with the same uniqueness rule as the table
#[derive(Debug, Default)]
pub struct MemoryEdgeCollection {
    edges: RwLock<Vec<ConnectionEdge>>,
}

impl MemoryEdgeCollection {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every stored edge regardless of tenant
    pub fn snapshot(&self) -> Vec<ConnectionEdge> {
        self.edges.read().clone()
    }

    pub fn len(&self) -> usize {
        self.edges.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.read().is_empty()
    }
}

fn group(edges: &[ConnectionEdge], field: EdgeField) -> Vec<GroupRow> {
    let mut counts: BTreeMap<String, u64> = BTreeMap::new();
    for edge in edges {
        *counts.entry(field.value_of(edge)).or_default() += 1;
    }

    let mut rows: Vec<GroupRow> = counts
        .into_iter()
        .map(|(key, count)| GroupRow { key, count })
        .collect();
    // keys are already ascending; stable sort keeps that order within equal counts
    rows.sort_by(|a, b| b.count.cmp(&a.count));
    rows
}

#[async_trait]
impl TenantCollection for MemoryEdgeCollection {
    type Entity = ConnectionEdge;
    type Filter = EdgeFilter;
    type Patch = EdgePatch;
    type Field = EdgeField;

    fn name(&self) -> &'static str {
        "connection_edges"
    }

    #[instrument(skip(self))]
    async fn find(&self, filter: EdgeFilter) -> RepoResult<Vec<ConnectionEdge>> {
        Ok(self
            .edges
            .read()
            .iter()
            .filter(|edge| filter.matches(edge))
            .cloned()
            .collect())
    }

    #[instrument(skip(self, entities), fields(count = entities.len()))]
    async fn insert_many(&self, entities: Vec<ConnectionEdge>) -> RepoResult<u64> {
        if entities.iter().any(|edge| edge.tenant_id.is_none()) {
            return Err(DomainError::missing_tenant("insert connection edge"));
        }

        let mut edges = self.edges.write();
        let mut inserted = 0;
        for edge in entities {
            if !edges.iter().any(|existing| same_identity(existing, &edge)) {
                edges.push(edge);
                inserted += 1;
            }
        }
        Ok(inserted)
    }

    #[instrument(skip(self))]
    async fn update(&self, filter: EdgeFilter, patch: EdgePatch) -> RepoResult<u64> {
        let mut edges = self.edges.write();
        let mut updated = 0;
        for edge in edges.iter_mut().filter(|edge| filter.matches(edge)) {
            patch.apply(edge);
            updated += 1;
        }
        Ok(updated)
    }

    #[instrument(skip(self))]
    async fn delete(&self, filter: EdgeFilter) -> RepoResult<u64> {
        let mut edges = self.edges.write();
        let before = edges.len();
        edges.retain(|edge| !filter.matches(edge));
        Ok((before - edges.len()) as u64)
    }

    #[instrument(skip(self))]
    async fn aggregate(&self, pipeline: Pipeline<EdgeFilter, EdgeField>) -> RepoResult<Vec<GroupRow>> {
        let plan = AggregatePlan::from_pipeline(pipeline)?;

        let mut selected: Vec<ConnectionEdge> = self
            .edges
            .read()
            .iter()
            .filter(|edge| plan.filters.iter().all(|f| f.matches(edge)))
            .cloned()
            .collect();
        if let Some(n) = plan.row_limit {
            selected.truncate(n);
        }

        let mut rows = match plan.group_by {
            Some(field) => group(&selected, field),
            None => vec![GroupRow::new(GroupRow::TOTAL_KEY, selected.len() as u64)],
        };
        if let Some(n) = plan.group_limit {
            rows.truncate(n);
        }
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use presence_core::{ConnectionType, TenantFilter, TenantId, TenantOwned, UserId};

    fn uid(raw: &str) -> UserId {
        UserId::parse(raw).unwrap()
    }

    fn tid(raw: &str) -> TenantId {
        TenantId::parse(raw).unwrap()
    }

    fn edge(tenant: &str, a: &str, b: &str, ctx: &str) -> ConnectionEdge {
        let mut edge = ConnectionEdge::new(uid(a), uid(b), ConnectionType::ChannelMember, ctx);
        edge.set_tenant_id(tid(tenant));
        edge
    }

    #[tokio::test]
    async fn test_insert_ignores_duplicates() {
        let collection = MemoryEdgeCollection::new();
        let first = collection
            .insert_many(vec![edge("t", "a", "b", "c1"), edge("t", "b", "a", "c1")])
            .await
            .unwrap();
        let again = collection
            .insert_many(vec![edge("t", "a", "b", "c1"), edge("u", "a", "b", "c1")])
            .await
            .unwrap();

        assert_eq!(first, 2);
        assert_eq!(again, 1);
        assert_eq!(collection.len(), 3);
    }

    #[tokio::test]
    async fn test_insert_rejects_untenanted() {
        let collection = MemoryEdgeCollection::new();
        let bare = ConnectionEdge::new(uid("a"), uid("b"), ConnectionType::DirectMessage, "dm");
        let err = collection.insert_many(vec![bare]).await.unwrap_err();

        assert!(err.is_security());
        assert!(collection.is_empty());
    }

    #[tokio::test]
    async fn test_update_and_delete_by_filter() {
        let collection = MemoryEdgeCollection::new();
        collection
            .insert_many(vec![edge("t", "a", "b", "c1"), edge("t", "a", "c", "c2")])
            .await
            .unwrap();

        let at = chrono::Utc::now();
        let touched = collection
            .update(EdgeFilter::for_tenant(tid("t")).context("c1"), EdgePatch::touch(at))
            .await
            .unwrap();
        assert_eq!(touched, 1);

        let removed = collection
            .delete(EdgeFilter::for_tenant(tid("t")).connection(uid("c")))
            .await
            .unwrap();
        assert_eq!(removed, 1);

        let left = collection.snapshot();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].last_interaction_at, Some(at));
    }

    #[tokio::test]
    async fn test_aggregate_groups_and_orders() {
        let collection = MemoryEdgeCollection::new();
        collection
            .insert_many(vec![
                edge("t", "a", "b", "c1"),
                edge("t", "a", "c", "c1"),
                edge("t", "b", "a", "c1"),
                edge("t", "c", "a", "c1"),
                edge("t", "c", "b", "c1"),
                edge("other", "z", "y", "c1"),
            ])
            .await
            .unwrap();

        let rows = collection
            .aggregate(
                Pipeline::new()
                    .matching(EdgeFilter::for_tenant(tid("t")))
                    .group_by(EdgeField::UserId),
            )
            .await
            .unwrap();
        assert_eq!(
            rows,
            vec![GroupRow::new("a", 2), GroupRow::new("c", 2), GroupRow::new("b", 1)]
        );

        let total = collection
            .aggregate(Pipeline::new().matching(EdgeFilter::for_tenant(tid("t"))))
            .await
            .unwrap();
        assert_eq!(total, vec![GroupRow::new("*", 5)]);
    }
}
