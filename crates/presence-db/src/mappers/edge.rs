//! ConnectionEdge entity <-> model mapper

use chrono::{DateTime, Utc};
use presence_core::{ConnectionEdge, DomainError, TenantId, UserId};

use crate::models::EdgeModel;

fn corrupt(column: &str, detail: impl std::fmt::Display) -> DomainError {
    DomainError::DatabaseError(format!("connection_edges.{column}: {detail}"))
}

impl TryFrom<EdgeModel> for ConnectionEdge {
    type Error = DomainError;

    fn try_from(model: EdgeModel) -> Result<Self, Self::Error> {
        Ok(ConnectionEdge {
            tenant_id: Some(TenantId::parse(model.tenant_id).map_err(|e| corrupt("tenant_id", e))?),
            user_id: UserId::parse(model.user_id).map_err(|e| corrupt("user_id", e))?,
            connection_id: UserId::parse(model.connection_id)
                .map_err(|e| corrupt("connection_id", e))?,
            connection_type: model
                .connection_type
                .parse()
                .map_err(|e: String| corrupt("connection_type", e))?,
            context_id: model.context_id,
            created_at: model.created_at,
            last_interaction_at: model.last_interaction_at,
        })
    }
}

/// Column values for inserting an edge
#[derive(Debug, Clone)]
pub struct EdgeInsert {
    pub tenant_id: String,
    pub user_id: String,
    pub connection_id: String,
    pub connection_type: &'static str,
    pub context_id: String,
    pub created_at: DateTime<Utc>,
    pub last_interaction_at: Option<DateTime<Utc>>,
}

impl EdgeInsert {
    /// Values for `edge`; the edge must already carry its tenant
    pub fn new(edge: &ConnectionEdge) -> Result<Self, DomainError> {
        let tenant_id = edge
            .tenant_id
            .as_ref()
            .ok_or_else(|| DomainError::missing_tenant("insert connection edge"))?;

        Ok(Self {
            tenant_id: tenant_id.to_string(),
            user_id: edge.user_id.to_string(),
            connection_id: edge.connection_id.to_string(),
            connection_type: edge.connection_type.as_str(),
            context_id: edge.context_id.clone(),
            created_at: edge.created_at,
            last_interaction_at: edge.last_interaction_at,
        })
    }
}
