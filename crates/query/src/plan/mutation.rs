//! Write statements.

use sea_query::{Alias, PostgresQueryBuilder, Query};
use serde_json::Value as JsonValue;

use super::Predicate;
use crate::error::QueryResult;
use crate::filter::literal;

/// One INSERT, UPDATE or DELETE. Each returns every column of the rows it
/// touched (`RETURNING *`), keyed by database column.
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    Insert {
        table: String,
        /// `(column, value)` pairs; empty inserts a row of defaults.
        values: Vec<(String, JsonValue)>,
    },
    Update {
        table: String,
        values: Vec<(String, JsonValue)>,
        predicate: Predicate,
    },
    Delete {
        table: String,
        predicate: Predicate,
    },
}

impl Mutation {
    pub fn table(&self) -> &str {
        match self {
            Mutation::Insert { table, .. }
            | Mutation::Update { table, .. }
            | Mutation::Delete { table, .. } => table,
        }
    }

    /// Render PostgreSQL with inlined values.
    pub fn to_sql(&self) -> QueryResult<String> {
        let sql = match self {
            Mutation::Insert { table, values } => {
                let mut insert = Query::insert();
                insert.into_table(Alias::new(table));
                if values.is_empty() {
                    insert.or_default_values();
                } else {
                    insert.columns(values.iter().map(|(column, _)| Alias::new(column)));
                    insert
                        .values(values.iter().map(|(_, value)| literal(value)))
                        .map_err(anyhow::Error::from)?;
                }
                insert.returning_all().to_string(PostgresQueryBuilder)
            }
            Mutation::Update {
                table,
                values,
                predicate,
            } => Query::update()
                .table(Alias::new(table))
                .values(
                    values
                        .iter()
                        .map(|(column, value)| (Alias::new(column), literal(value))),
                )
                .cond_where(predicate.to_condition(table))
                .returning_all()
                .to_string(PostgresQueryBuilder),
            Mutation::Delete { table, predicate } => Query::delete()
                .from_table(Alias::new(table))
                .cond_where(predicate.to_condition(table))
                .returning_all()
                .to_string(PostgresQueryBuilder),
        };
        Ok(sql)
    }
}
