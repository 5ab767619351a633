//! Connection graph service
//!
//! Maintains the tenant-scoped edges that define who may see whose presence.
//! Every call goes through a [`TenantIsolationGuard`], so the ambient tenant of
//! the calling task decides which slice of the graph is touched.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use tracing::instrument;

use presence_core::{
    ConnectionEdge, ConnectionType, DomainError, DomainResult, EdgeField, EdgeFilter, EdgePatch,
    GroupRow, Pipeline, SharedEdgeCollection, TenantCollection, UserId,
};
use presence_db::TenantIsolationGuard;

/// Member count above which channel fan-out is logged
const LARGE_CHANNEL: usize = 256;

/// Service for connection-graph operations
#[derive(Clone)]
pub struct ConnectionGraphService {
    edges: SharedEdgeCollection,
}

impl ConnectionGraphService {
    /// Build the service over a raw collection; the isolation guard is always applied
    pub fn new<C>(collection: C) -> Self
    where
        C: TenantCollection<
                Entity = ConnectionEdge,
                Filter = EdgeFilter,
                Patch = EdgePatch,
                Field = EdgeField,
            > + 'static,
    {
        Self {
            edges: Arc::new(TenantIsolationGuard::new(collection)),
        }
    }

    /// Record a direct-message pair. Returns how many edges were new (0..=2).
    #[instrument(skip(self))]
    pub async fn add_direct_message_edge(
        &self,
        user_a: &UserId,
        user_b: &UserId,
        dm_id: &str,
    ) -> DomainResult<u64> {
        if user_a == user_b {
            return Err(DomainError::validation("direct message needs two distinct users"));
        }
        let edge = ConnectionEdge::new(
            user_a.clone(),
            user_b.clone(),
            ConnectionType::DirectMessage,
            dm_id,
        );
        let reverse = edge.reversed();
        self.edges.insert_many(vec![edge, reverse]).await
    }

    /// Connect every pair of channel members in both directions
    #[instrument(skip(self, members), fields(members = members.len()))]
    pub async fn add_channel_member_edges(
        &self,
        channel_id: &str,
        members: &[UserId],
    ) -> DomainResult<u64> {
        let members = distinct(members);
        if members.len() > LARGE_CHANNEL {
            tracing::warn!(
                channel_id,
                members = members.len(),
                edges = members.len() * (members.len() - 1),
                "Large channel fan-out"
            );
        }

        let mut edges = Vec::with_capacity(members.len() * members.len().saturating_sub(1));
        for a in &members {
            for b in &members {
                if a != b {
                    edges.push(ConnectionEdge::new(
                        (*a).clone(),
                        (*b).clone(),
                        ConnectionType::ChannelMember,
                        channel_id,
                    ));
                }
            }
        }
        if edges.is_empty() {
            return Ok(0);
        }
        self.edges.insert_many(edges).await
    }

    /// Connect a newcomer with everyone the channel's edges already name
    #[instrument(skip(self))]
    pub async fn add_member_to_existing_channel(
        &self,
        channel_id: &str,
        new_member: &UserId,
    ) -> DomainResult<u64> {
        let existing = self
            .edges
            .find(
                EdgeFilter::new()
                    .of_type(ConnectionType::ChannelMember)
                    .context(channel_id),
            )
            .await?;

        let mut seen = HashSet::new();
        let mut edges = Vec::new();
        for member in existing
            .iter()
            .flat_map(|edge| [&edge.user_id, &edge.connection_id])
        {
            if member == new_member || !seen.insert(member.clone()) {
                continue;
            }
            let edge = ConnectionEdge::new(
                new_member.clone(),
                member.clone(),
                ConnectionType::ChannelMember,
                channel_id,
            );
            edges.push(edge.reversed());
            edges.push(edge);
        }

        if edges.is_empty() {
            tracing::debug!(channel_id, "Channel has no recorded members");
            return Ok(0);
        }
        self.edges.insert_many(edges).await
    }

    /// Remove the edge between two users in both directions
    #[instrument(skip(self))]
    pub async fn remove_edge(
        &self,
        user_id: &UserId,
        connection_id: &UserId,
        connection_type: Option<ConnectionType>,
        context_id: Option<&str>,
    ) -> DomainResult<u64> {
        let mut removed = 0;
        for (from, to) in [(user_id, connection_id), (connection_id, user_id)] {
            let mut filter = EdgeFilter::new().user(from.clone()).connection(to.clone());
            filter.connection_type = connection_type;
            filter.context_id = context_id.map(str::to_string);
            removed += self.edges.delete(filter).await?;
        }
        Ok(removed)
    }

    /// Drop every channel edge that touches the member
    #[instrument(skip(self))]
    pub async fn remove_channel_member(
        &self,
        channel_id: &str,
        member: &UserId,
    ) -> DomainResult<u64> {
        let scope = EdgeFilter::new()
            .of_type(ConnectionType::ChannelMember)
            .context(channel_id);
        let outgoing = self.edges.delete(scope.clone().user(member.clone())).await?;
        let incoming = self.edges.delete(scope.connection(member.clone())).await?;
        Ok(outgoing + incoming)
    }

    /// Distinct users connected to `user_id`, in first-seen order
    #[instrument(skip(self))]
    pub async fn get_connections(
        &self,
        user_id: &UserId,
        connection_type: Option<ConnectionType>,
    ) -> DomainResult<Vec<UserId>> {
        let mut filter = EdgeFilter::new().user(user_id.clone());
        filter.connection_type = connection_type;

        let edges = self.edges.find(filter).await?;
        let mut seen = HashSet::new();
        Ok(edges
            .into_iter()
            .map(|edge| edge.connection_id)
            .filter(|id| seen.insert(id.clone()))
            .collect())
    }

    /// Whether `user_id` has an outgoing edge to `connection_id`
    pub async fn are_connected(
        &self,
        user_id: &UserId,
        connection_id: &UserId,
        connection_type: Option<ConnectionType>,
    ) -> DomainResult<bool> {
        let mut filter = EdgeFilter::new()
            .user(user_id.clone())
            .connection(connection_id.clone());
        filter.connection_type = connection_type;
        Ok(!self.edges.find(filter).await?.is_empty())
    }

    /// Delete a whole DM or channel
    #[instrument(skip(self))]
    pub async fn remove_context(
        &self,
        connection_type: ConnectionType,
        context_id: &str,
    ) -> DomainResult<u64> {
        self.edges
            .delete(EdgeFilter::new().of_type(connection_type).context(context_id))
            .await
    }

    /// Stamp both directions of a pair with the current time
    #[instrument(skip(self))]
    pub async fn record_interaction(&self, user_a: &UserId, user_b: &UserId) -> DomainResult<u64> {
        let now = Utc::now();
        let mut touched = 0;
        for (from, to) in [(user_a, user_b), (user_b, user_a)] {
            touched += self
                .edges
                .update(
                    EdgeFilter::new().user(from.clone()).connection(to.clone()),
                    EdgePatch::touch(now),
                )
                .await?;
        }
        Ok(touched)
    }

    /// Outgoing edge count per user within one context, largest first
    pub async fn connection_counts(&self, context_id: &str) -> DomainResult<Vec<GroupRow>> {
        self.edges
            .aggregate(
                Pipeline::new()
                    .matching(EdgeFilter::new().context(context_id))
                    .group_by(EdgeField::UserId),
            )
            .await
    }
}

fn distinct(members: &[UserId]) -> Vec<&UserId> {
    let mut seen = HashSet::new();
    members.iter().filter(|m| seen.insert(*m)).collect()
}
