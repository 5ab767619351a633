//! Schema bootstrap

use presence_core::DomainResult;
use sqlx::PgPool;

use crate::repositories::map_db_error;

/// DDL for the edge table and its indexes; every statement is idempotent
pub const CONNECTION_EDGES_SCHEMA: &str = include_str!("connection_edges.sql");

/// Create the tables this crate needs if they do not exist yet
pub async fn ensure_schema(pool: &PgPool) -> DomainResult<()> {
    sqlx::raw_sql(CONNECTION_EDGES_SCHEMA)
        .execute(pool)
        .await
        .map_err(map_db_error)?;

    tracing::info!("connection_edges schema ensured");
    Ok(())
}
