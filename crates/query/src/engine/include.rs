//! Batched relationship loading.
//!
//! Each requested relationship costs one query for the whole parent result
//! set: the distinct parent `key_from` values go into a single
//! `WHERE key_to IN (...)`, the related rows are grouped by `key_to`, and
//! every parent picks its group up by its own `key_from`. Queries for
//! different relationships run concurrently; merging starts once all of
//! them are back.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use futures::future::try_join_all;
use serde_json::Value as JsonValue;
use tracing::debug;

use crate::dropped::Dropped;
use crate::error::{QueryError, QueryResult};
use crate::model::{ModelDescriptor, ModelRegistry, Relationship};
use crate::plan::{Predicate, Projection, SelectPlan, projection, select_fields};
use crate::store::{Row, RowStore};

/// One resolved entry of an include list.
#[derive(Debug, Clone, PartialEq)]
pub struct IncludeTarget {
    /// Relationship name; the key the related data is stored under.
    pub name: String,
    pub relationship: Relationship,
    pub related: Arc<ModelDescriptor>,

    /// Related attributes to return.
    pub fields: Vec<String>,
}

impl IncludeTarget {
    /// Projection for the batched query. `key_to` is always selected so rows
    /// can be grouped even when a fieldset leaves it out.
    pub fn projection(&self) -> Vec<Projection> {
        let mut columns = projection(&self.related, &self.fields);
        let key_to = &self.relationship.keys().key_to;
        if !self.fields.contains(key_to) {
            columns.push(Projection::new(self.related.column_for(key_to), key_to.clone()));
        }
        columns
    }

    /// Batched query for `parents`, or `None` when no parent has a key value.
    pub fn batch_plan(&self, parents: &[Row]) -> Option<SelectPlan> {
        let keys = self.relationship.keys();

        let mut seen = HashSet::new();
        let values: Vec<JsonValue> = parents
            .iter()
            .filter_map(|row| row.get(&keys.key_from))
            .filter(|value| json_value_to_string(value).is_some_and(|key| seen.insert(key)))
            .cloned()
            .collect();

        if values.is_empty() {
            return None;
        }

        let mut plan = SelectPlan::new(&self.related.table_name);
        plan.columns = self.projection();
        plan.predicate = Some(Predicate::is_in(
            self.related.column_for(&keys.key_to),
            values,
        ));
        Some(plan)
    }
}

/// Resolve a comma-separated include list against `model`.
///
/// Dotted paths, unknown relationship names and relationships to
/// unregistered models are dropped. Repeated names are resolved once.
pub fn resolve_includes(
    registry: &ModelRegistry,
    model: &ModelDescriptor,
    spec: &str,
    fields: &HashMap<String, String>,
) -> (Vec<IncludeTarget>, Vec<Dropped>) {
    let mut targets: Vec<IncludeTarget> = Vec::new();
    let mut dropped = Vec::new();

    for name in spec.split(',').map(str::trim).filter(|name| !name.is_empty()) {
        if name.contains('.') {
            dropped.push(Dropped::NestedInclude(name.to_string()));
            continue;
        }
        if targets.iter().any(|target| target.name == name) {
            continue;
        }
        let Some(relationship) = model.relationship(name) else {
            dropped.push(Dropped::UnknownRelationship(name.to_string()));
            continue;
        };
        let Some(related) = registry.model(&relationship.keys().model_to) else {
            dropped.push(Dropped::UnresolvedModel(relationship.keys().model_to.clone()));
            continue;
        };

        let selection = select_fields(
            &related,
            fields.get(&related.type_name).map(String::as_str),
        );
        dropped.extend(selection.dropped);

        targets.push(IncludeTarget {
            name: name.to_string(),
            relationship: relationship.clone(),
            related,
            fields: selection.fields,
        });
    }

    (targets, dropped)
}

/// Load every target for `rows` and attach the results in place.
pub async fn include(
    store: &dyn RowStore,
    rows: &mut [Row],
    targets: &[IncludeTarget],
) -> QueryResult<()> {
    if rows.is_empty() || targets.is_empty() {
        return Ok(());
    }

    let parents: &[Row] = &*rows;
    let batches = targets.iter().map(|target| async move {
        let Some(plan) = target.batch_plan(parents) else {
            debug!(include = %target.name, "no parent keys, skipping batched query");
            return Ok(HashMap::new());
        };
        let related = store.fetch_all(&plan).await?;
        debug!(include = %target.name, rows = related.len(), "loaded related rows");
        Ok::<_, QueryError>(group_by_key(related, &target.relationship.keys().key_to))
    });
    let groups = try_join_all(batches).await?;

    for (target, group) in targets.iter().zip(&groups) {
        merge(rows, target, group);
    }
    Ok(())
}

/// Bucket related rows by their `key_to` value, keeping fetch order.
fn group_by_key(rows: Vec<Row>, key_to: &str) -> HashMap<String, Vec<Row>> {
    let mut groups: HashMap<String, Vec<Row>> = HashMap::new();
    for row in rows {
        if let Some(key) = row.get(key_to).and_then(json_value_to_string) {
            groups.entry(key).or_default().push(row);
        }
    }
    groups
}

fn merge(rows: &mut [Row], target: &IncludeTarget, groups: &HashMap<String, Vec<Row>>) {
    let key_from = &target.relationship.keys().key_from;
    for row in rows.iter_mut() {
        let group = row
            .get(key_from)
            .and_then(json_value_to_string)
            .and_then(|key| groups.get(&key));

        let value = if target.relationship.is_singular() {
            group
                .and_then(|rows| rows.first())
                .map(|related| JsonValue::Object(related.clone()))
                .unwrap_or(JsonValue::Null)
        } else {
            JsonValue::Array(
                group
                    .map(|rows| rows.iter().cloned().map(JsonValue::Object).collect())
                    .unwrap_or_default(),
            )
        };
        row.insert(target.name.clone(), value);
    }
}

/// Key used to match parent and related rows. `null` never matches.
pub(crate) fn json_value_to_string(value: &JsonValue) -> Option<String> {
    match value {
        JsonValue::String(s) => Some(s.clone()),
        JsonValue::Number(n) => Some(n.to_string()),
        JsonValue::Bool(b) => Some(b.to_string()),
        JsonValue::Null => None,
        other => Some(other.to_string()),
    }
}
