//! PostgreSQL row store.

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use sqlx::PgPool;
use tracing::debug;

use super::{Row, RowStore};
use crate::error::{QueryError, QueryResult};
use crate::plan::{Mutation, SelectPlan};

/// [`RowStore`] over an sqlx connection pool.
///
/// Rows come back through `row_to_json`, so column aliases become the keys of
/// each returned object.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn json_rows(&self, table: &str, sql: &str) -> QueryResult<Vec<Row>> {
        let rows: Vec<JsonValue> = sqlx::query_scalar(sql).fetch_all(&self.pool).await?;

        rows.into_iter()
            .map(|row| match row {
                JsonValue::Object(map) => Ok(map),
                other => Err(QueryError::InvalidRow(format!("{table} returned {other}"))),
            })
            .collect()
    }
}

#[async_trait]
impl RowStore for PgStore {
    async fn fetch_all(&self, plan: &SelectPlan) -> QueryResult<Vec<Row>> {
        let sql = plan.to_sql();
        debug!(table = %plan.table, sql = %sql, "executing select");

        self.json_rows(&plan.table, &format!("SELECT row_to_json(t) FROM ({sql}) t"))
            .await
    }

    async fn execute(&self, mutation: &Mutation) -> QueryResult<Vec<Row>> {
        let sql = mutation.to_sql()?;
        debug!(table = %mutation.table(), sql = %sql, "executing write");

        // Data-modifying statements are only allowed as a CTE, not a subquery.
        self.json_rows(
            mutation.table(),
            &format!("WITH t AS ({sql}) SELECT row_to_json(t) FROM t"),
        )
        .await
    }

    async fn ping(&self) -> QueryResult<()> {
        if crate::db::check_health(&self.pool).await {
            Ok(())
        } else {
            Err(QueryError::Connection(
                "database health check failed".to_string(),
            ))
        }
    }
}
