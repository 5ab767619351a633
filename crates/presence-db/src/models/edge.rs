//! Connection edge database model

use chrono::{DateTime, Utc};
use sqlx::FromRow;

/// Database model for connection_edges table
#[derive(Debug, Clone, FromRow)]
pub struct EdgeModel {
    pub tenant_id: String,
    pub user_id: String,
    pub connection_id: String,
    pub connection_type: String,
    pub context_id: String,
    pub created_at: DateTime<Utc>,
    pub last_interaction_at: Option<DateTime<Utc>>,
}

/// One row of a grouped count
#[derive(Debug, Clone, FromRow)]
pub struct GroupRowModel {
    pub key: String,
    pub count: i64,
}
