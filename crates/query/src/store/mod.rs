//! Row stores execute select plans and record writes.

mod postgres;

pub use postgres::PgStore;

use async_trait::async_trait;
use serde_json::{Map, Value as JsonValue};

use crate::error::QueryResult;
use crate::plan::{Mutation, SelectPlan};

/// A result row keyed by attribute name.
pub type Row = Map<String, JsonValue>;

/// Executes [`SelectPlan`]s and [`Mutation`]s against a data store.
///
/// Implementations must allow concurrent calls; relationship includes issue
/// their batched queries in parallel.
#[async_trait]
pub trait RowStore: Send + Sync {
    /// Run the plan and return every row, keyed by projection alias.
    async fn fetch_all(&self, plan: &SelectPlan) -> QueryResult<Vec<Row>>;

    /// Run a write and return the rows it touched, keyed by database column.
    /// An update or delete that matched nothing returns no rows.
    async fn execute(&self, mutation: &Mutation) -> QueryResult<Vec<Row>>;

    /// Verify the store is reachable.
    async fn ping(&self) -> QueryResult<()>;
}
