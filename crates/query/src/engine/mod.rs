//! Query engine.
//!
//! Runs the request pipeline for one model: filter, fields, page, sort,
//! single-row limit, execute, then batched relationship includes. Each call
//! builds its own plan; the engine itself only holds shared read-only state
//! (the registry and the row store). Record writes go through the same store
//! as single INSERT/UPDATE/DELETE statements.

mod include;

pub use include::{IncludeTarget, include, resolve_includes};

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde_json::{Map, Value as JsonValue};
use tracing::{debug, trace, warn};

use crate::dropped::Dropped;
use crate::error::{QueryError, QueryResult};
use crate::filter::translate;
use crate::model::{ModelDescriptor, ModelRegistry, Relationship};
use crate::options::QueryOptions;
use crate::plan::{
    Mutation, Predicate, Projection, SelectPlan, paginate, parse_sort, projection, select_fields,
};
use crate::store::{Row, RowStore};

/// Whether a query returns a list or at most one row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Many,
    Single,
}

/// A query assembled but not executed.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedQuery {
    /// Base SELECT.
    pub plan: SelectPlan,

    /// Relationships to load after the base query.
    pub includes: Vec<IncludeTarget>,

    /// Request fragments left out.
    pub dropped: Vec<Dropped>,
}

/// Result of [`QueryEngine::fetch_related`].
#[derive(Debug, Clone, PartialEq)]
pub enum Related {
    /// belongsTo: the related row, if any.
    One(Option<Row>),
    /// hasMany: every related row.
    Many(Vec<Row>),
}

/// Executes model queries against a [`RowStore`].
#[derive(Clone)]
pub struct QueryEngine {
    store: Arc<dyn RowStore>,
    registry: Arc<ModelRegistry>,
    timeout: Option<Duration>,
}

impl std::fmt::Debug for QueryEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryEngine")
            .field("models", &self.registry.len())
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl QueryEngine {
    pub fn new(store: Arc<dyn RowStore>, registry: Arc<ModelRegistry>) -> Self {
        Self {
            store,
            registry,
            timeout: None,
        }
    }

    /// Bound each top-level query (includes included) by `timeout`.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    /// Look up a model by name.
    pub fn model(&self, name: &str) -> Option<Arc<ModelDescriptor>> {
        self.registry.model(name)
    }

    /// Assemble the plan for `options` without executing it.
    pub fn plan(
        &self,
        model: &ModelDescriptor,
        options: &QueryOptions,
        mode: Mode,
    ) -> PlannedQuery {
        plan_query(&self.registry, model, options, mode)
    }

    /// Rows matching `options`.
    pub async fn query(
        &self,
        model: &ModelDescriptor,
        options: &QueryOptions,
    ) -> QueryResult<Vec<Row>> {
        trace!(model = %model.name, "query");
        self.bounded(self.run(model, options, Mode::Many)).await
    }

    /// First row matching `options`, or `None`.
    pub async fn query_record(
        &self,
        model: &ModelDescriptor,
        options: &QueryOptions,
    ) -> QueryResult<Option<Row>> {
        trace!(model = %model.name, "query_record");
        let rows = self.bounded(self.run(model, options, Mode::Single)).await?;
        Ok(rows.into_iter().next())
    }

    /// Every row of `model` with all attributes.
    pub async fn find_all(&self, model: &ModelDescriptor) -> QueryResult<Vec<Row>> {
        trace!(model = %model.name, "find_all");
        self.query(model, &QueryOptions::default()).await
    }

    /// Row whose id equals `id`. Page and sort are ignored; fields and
    /// include still apply.
    pub async fn find_record(
        &self,
        model: &ModelDescriptor,
        id: impl Into<JsonValue>,
        options: &QueryOptions,
    ) -> QueryResult<Option<Row>> {
        trace!(model = %model.name, "find_record");
        let options = record_options(model, id.into(), options);
        self.query_record(model, &options).await
    }

    /// Load one relationship for a single row.
    ///
    /// Returns `None` when `relation` is not a relationship of `model` or its
    /// related model is not registered.
    pub async fn fetch_related(
        &self,
        model: &ModelDescriptor,
        row: &Row,
        relation: &str,
    ) -> QueryResult<Option<Related>> {
        trace!(model = %model.name, relation, "fetch_related");

        let Some(relationship) = model.relationship(relation) else {
            let fragment = Dropped::UnknownRelationship(relation.to_string());
            debug!(model = %model.name, dropped = %fragment, "fragment dropped");
            return Ok(None);
        };
        let keys = relationship.keys();
        let Some(related) = self.registry.model(&keys.model_to) else {
            let fragment = Dropped::UnresolvedModel(keys.model_to.clone());
            debug!(model = %model.name, dropped = %fragment, "fragment dropped");
            return Ok(None);
        };

        let key = row.get(&keys.key_from).filter(|value| !value.is_null());
        let options =
            key.map(|key| QueryOptions::new().filter(eq_filter(&keys.key_to, key.clone())));

        let result = match (relationship, options) {
            (Relationship::BelongsTo(_), None) => Related::One(None),
            (Relationship::HasMany(_), None) => Related::Many(Vec::new()),
            (Relationship::BelongsTo(_), Some(options)) => {
                Related::One(self.query_record(&related, &options).await?)
            }
            (Relationship::HasMany(_), Some(options)) => {
                Related::Many(self.query(&related, &options).await?)
            }
        };
        Ok(Some(result))
    }

    /// Insert a row from `data` (attribute name to value) and return it.
    pub async fn create_record(&self, model: &ModelDescriptor, data: &JsonValue) -> QueryResult<Row> {
        trace!(model = %model.name, "create_record");
        let mutation = Mutation::Insert {
            table: model.table_name.clone(),
            values: assignments(model, data),
        };

        let rows = self.bounded(self.store.execute(&mutation)).await?;
        rows.first()
            .map(|row| model.attributes_from_columns(row))
            .ok_or_else(|| {
                QueryError::InvalidRow(format!("insert into {} returned no row", model.table_name))
            })
    }

    /// Apply `data` to the row whose id equals `id` and return the updated row.
    ///
    /// Fails with [`QueryError::NotFound`] when no row has that id.
    pub async fn update_record(
        &self,
        model: &ModelDescriptor,
        id: impl Into<JsonValue>,
        data: &JsonValue,
    ) -> QueryResult<Row> {
        trace!(model = %model.name, "update_record");
        let id = id.into();
        let values = assignments(model, data);
        if values.is_empty() {
            return self
                .find_record(model, id.clone(), &QueryOptions::default())
                .await?
                .ok_or_else(|| not_found(model, &id));
        }

        let mutation = Mutation::Update {
            table: model.table_name.clone(),
            values,
            predicate: id_predicate(model, id.clone()),
        };
        let rows = self.bounded(self.store.execute(&mutation)).await?;
        rows.first()
            .map(|row| model.attributes_from_columns(row))
            .ok_or_else(|| not_found(model, &id))
    }

    /// Delete the row whose id equals `id`.
    ///
    /// Fails with [`QueryError::NotFound`] when no row has that id.
    pub async fn delete_record(
        &self,
        model: &ModelDescriptor,
        id: impl Into<JsonValue>,
    ) -> QueryResult<()> {
        trace!(model = %model.name, "delete_record");
        let id = id.into();
        let mutation = Mutation::Delete {
            table: model.table_name.clone(),
            predicate: id_predicate(model, id.clone()),
        };

        let rows = self.bounded(self.store.execute(&mutation)).await?;
        if rows.is_empty() {
            return Err(not_found(model, &id));
        }
        Ok(())
    }

    /// Verify the row store is reachable.
    pub async fn check_connection(&self) -> QueryResult<()> {
        self.store.ping().await.map_err(|e| match e {
            QueryError::Connection(_) => e,
            other => QueryError::Connection(other.to_string()),
        })
    }

    async fn run(
        &self,
        model: &ModelDescriptor,
        options: &QueryOptions,
        mode: Mode,
    ) -> QueryResult<Vec<Row>> {
        let PlannedQuery {
            plan,
            includes,
            dropped,
        } = self.plan(model, options, mode);

        for fragment in &dropped {
            debug!(model = %model.name, dropped = %fragment, "fragment dropped");
        }
        debug!(model = %model.name, sql = %plan.to_sql(), "planned select");

        let mut rows = self.store.fetch_all(&plan).await?;
        include(self.store.as_ref(), &mut rows, &includes).await?;
        Ok(rows)
    }

    async fn bounded<T>(&self, fut: impl Future<Output = QueryResult<T>>) -> QueryResult<T> {
        let Some(limit) = self.timeout else {
            return fut.await;
        };
        match tokio::time::timeout(limit, fut).await {
            Ok(result) => result,
            Err(_) => {
                warn!(timeout = ?limit, "query timed out");
                Err(QueryError::Timeout(limit))
            }
        }
    }
}

/// Assemble the plan for `options` without executing it.
///
/// `registry` resolves the related models named by `options.include`.
pub fn plan_query(
    registry: &ModelRegistry,
    model: &ModelDescriptor,
    options: &QueryOptions,
    mode: Mode,
) -> PlannedQuery {
    let mut dropped = Vec::new();
    let mut plan = SelectPlan::new(&model.table_name);

    if let Some(filter) = &options.filter {
        let translation = translate(model, filter);
        plan.predicate = translation.predicate;
        dropped.extend(translation.dropped);
    }

    let selection = select_fields(
        model,
        options.fields.get(&model.type_name).map(String::as_str),
    );
    plan.columns = projection(model, &selection.fields);
    dropped.extend(selection.dropped);

    if let Some(page) = &options.page {
        let pagination = paginate(page);
        plan.limit = Some(pagination.limit);
        plan.offset = Some(pagination.offset);
    }

    if let Some(sort) = &options.sort {
        plan.order = parse_sort(model, sort);
    }

    if mode == Mode::Single {
        plan.limit = Some(1);
    }

    let includes = match &options.include {
        Some(spec) => {
            let (targets, include_dropped) =
                resolve_includes(registry, model, spec, &options.fields);
            dropped.extend(include_dropped);
            targets
        }
        None => Vec::new(),
    };

    // Parents need their side of every included relationship to be matched.
    for target in &includes {
        let key_from = &target.relationship.keys().key_from;
        if model.has_attribute(key_from) && !plan.columns.iter().any(|c| &c.alias == key_from) {
            plan.columns
                .push(Projection::new(model.column_for(key_from), key_from.clone()));
        }
    }

    PlannedQuery {
        plan,
        includes,
        dropped,
    }
}

/// Options for an id lookup: `{idField: id}` replaces the filter, page and
/// sort are cleared.
pub fn record_options(
    model: &ModelDescriptor,
    id: JsonValue,
    options: &QueryOptions,
) -> QueryOptions {
    QueryOptions {
        filter: Some(eq_filter(&model.id_field, id)),
        page: None,
        sort: None,
        ..options.clone()
    }
}

/// `(column, value)` pairs for the declared attributes in `data`; anything
/// else is dropped.
fn assignments(model: &ModelDescriptor, data: &JsonValue) -> Vec<(String, JsonValue)> {
    let Some(data) = data.as_object() else {
        debug!(model = %model.name, "write data is not an object");
        return Vec::new();
    };

    data.iter()
        .filter_map(|(name, value)| {
            if model.has_attribute(name) {
                Some((model.column_for(name), value.clone()))
            } else {
                let fragment = Dropped::UnknownColumn(name.clone());
                debug!(model = %model.name, dropped = %fragment, "fragment dropped");
                None
            }
        })
        .collect()
}

fn id_predicate(model: &ModelDescriptor, id: JsonValue) -> Predicate {
    Predicate::eq(model.column_for(&model.id_field), id)
}

fn not_found(model: &ModelDescriptor, id: &JsonValue) -> QueryError {
    QueryError::NotFound {
        model: model.name.clone(),
        id: id.to_string(),
    }
}

/// `{column: value}`.
fn eq_filter(column: &str, value: JsonValue) -> JsonValue {
    let mut filter = Map::new();
    filter.insert(column.to_string(), value);
    JsonValue::Object(filter)
}
