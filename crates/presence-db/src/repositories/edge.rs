//! PostgreSQL implementation of the connection-edge collection

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder};
use tracing::instrument;

use presence_core::{
    ConnectionEdge, EdgeField, EdgeFilter, EdgePatch, GroupRow, Pipeline, RepoResult,
    TenantCollection,
};

use crate::mappers::EdgeInsert;
use crate::models::{EdgeModel, GroupRowModel};

use super::error::map_db_error;
use super::plan::AggregatePlan;

/// Rows per INSERT statement; seven binds each keeps well under the 65535 parameter cap
const INSERT_CHUNK: usize = 1000;

const EDGE_COLUMNS: &str =
    "tenant_id, user_id, connection_id, connection_type, context_id, created_at, last_interaction_at";

/// Append ` AND column = $n` for every field the filter sets
fn push_filter(qb: &mut QueryBuilder<'_, Postgres>, filter: &EdgeFilter) {
    if let Some(tenant_id) = &filter.tenant_id {
        qb.push(" AND tenant_id = ")
            .push_bind(tenant_id.to_string());
    }
    if let Some(user_id) = &filter.user_id {
        qb.push(" AND user_id = ")
            .push_bind(user_id.to_string());
    }
    if let Some(connection_id) = &filter.connection_id {
        qb.push(" AND connection_id = ")
            .push_bind(connection_id.to_string());
    }
    if let Some(connection_type) = filter.connection_type {
        qb.push(" AND connection_type = ")
            .push_bind(connection_type.as_str());
    }
    if let Some(context_id) = &filter.context_id {
        qb.push(" AND context_id = ")
            .push_bind(context_id.clone());
    }
}

/// PostgreSQL edge collection over the `connection_edges` table
#[derive(Clone)]
pub struct PgEdgeCollection {
    pool: PgPool,
}

impl PgEdgeCollection {
    /// Create a new PgEdgeCollection
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TenantCollection for PgEdgeCollection {
    type Entity = ConnectionEdge;
    type Filter = EdgeFilter;
    type Patch = EdgePatch;
    type Field = EdgeField;

    fn name(&self) -> &'static str {
        "connection_edges"
    }

    #[instrument(skip(self))]
    async fn find(&self, filter: EdgeFilter) -> RepoResult<Vec<ConnectionEdge>> {
        let mut qb = QueryBuilder::<Postgres>::new(format!(
            "SELECT {EDGE_COLUMNS} FROM connection_edges WHERE TRUE"
        ));
        push_filter(&mut qb, &filter);
        qb.push(" ORDER BY created_at, id");

        let rows = qb
            .build_query_as::<EdgeModel>()
            .fetch_all(&self.pool)
            .await
            .map_err(map_db_error)?;

        rows.into_iter().map(ConnectionEdge::try_from).collect()
    }

    #[instrument(skip(self, entities), fields(count = entities.len()))]
    async fn insert_many(&self, entities: Vec<ConnectionEdge>) -> RepoResult<u64> {
        let rows = entities
            .iter()
            .map(EdgeInsert::new)
            .collect::<RepoResult<Vec<_>>>()?;
        if rows.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await.map_err(map_db_error)?;
        let mut inserted = 0;
        for chunk in rows.chunks(INSERT_CHUNK) {
            let mut qb = QueryBuilder::<Postgres>::new(format!(
                "INSERT INTO connection_edges ({EDGE_COLUMNS}) "
            ));
            qb.push_values(chunk, |mut b, row| {
                b.push_bind(row.tenant_id.clone())
                    .push_bind(row.user_id.clone())
                    .push_bind(row.connection_id.clone())
                    .push_bind(row.connection_type)
                    .push_bind(row.context_id.clone())
                    .push_bind(row.created_at)
                    .push_bind(row.last_interaction_at);
            });
            qb.push(
                " ON CONFLICT (tenant_id, user_id, connection_id, connection_type, context_id) DO NOTHING",
            );

            inserted += qb
                .build()
                .execute(&mut *tx)
                .await
                .map_err(map_db_error)?
                .rows_affected();
        }
        tx.commit().await.map_err(map_db_error)?;

        Ok(inserted)
    }

    #[instrument(skip(self))]
    async fn update(&self, filter: EdgeFilter, patch: EdgePatch) -> RepoResult<u64> {
        let mut qb = QueryBuilder::<Postgres>::new("UPDATE connection_edges SET ");
        let mut set = qb.separated(", ");
        let mut assigned = false;
        if let Some(at) = patch.last_interaction_at {
            set.push("last_interaction_at = ").push_bind_unseparated(at);
            assigned = true;
        }
        if let Some(tenant_id) = &patch.tenant_id {
            set.push("tenant_id = ").push_bind_unseparated(tenant_id.to_string());
            assigned = true;
        }
        if !assigned {
            return Ok(0);
        }

        qb.push(" WHERE TRUE");
        push_filter(&mut qb, &filter);

        let result = qb
            .build()
            .execute(&self.pool)
            .await
            .map_err(map_db_error)?;
        Ok(result.rows_affected())
    }

    #[instrument(skip(self))]
    async fn delete(&self, filter: EdgeFilter) -> RepoResult<u64> {
        let mut qb = QueryBuilder::<Postgres>::new("DELETE FROM connection_edges WHERE TRUE");
        push_filter(&mut qb, &filter);

        let result = qb
            .build()
            .execute(&self.pool)
            .await
            .map_err(map_db_error)?;
        Ok(result.rows_affected())
    }

    #[instrument(skip(self))]
    async fn aggregate(&self, pipeline: Pipeline<EdgeFilter, EdgeField>) -> RepoResult<Vec<GroupRow>> {
        let plan = AggregatePlan::from_pipeline(pipeline)?;

        let key = match plan.group_by {
            Some(field) => format!("e.{}::TEXT", field.column()),
            None => format!("'{}'", GroupRow::TOTAL_KEY),
        };
        let mut qb = QueryBuilder::<Postgres>::new(format!(
            "SELECT {key} AS key, COUNT(*)::BIGINT AS count FROM (SELECT * FROM connection_edges WHERE TRUE"
        ));
        for filter in &plan.filters {
            push_filter(&mut qb, filter);
        }
        if let Some(n) = plan.row_limit {
            qb.push(" ORDER BY id LIMIT ").push_bind(n as i64);
        }
        qb.push(") e");
        if plan.group_by.is_some() {
            qb.push(" GROUP BY 1 ORDER BY count DESC, key");
        }
        if let Some(n) = plan.group_limit {
            qb.push(" LIMIT ").push_bind(n as i64);
        }

        let rows = qb
            .build_query_as::<GroupRowModel>()
            .fetch_all(&self.pool)
            .await
            .map_err(map_db_error)?;

        Ok(rows
            .into_iter()
            .map(|row| GroupRow::new(row.key, row.count.max(0) as u64))
            .collect())
    }
}
