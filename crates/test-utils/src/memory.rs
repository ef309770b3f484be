//! In-memory row store.
//!
//! Evaluates [`SelectPlan`]s over JSON rows keyed by database column, the way
//! PostgreSQL would for the operators the engine emits: predicates (with
//! NULL never matching a comparison), ORDER BY (NULLS LAST ascending),
//! LIMIT/OFFSET and aliased projection. Every executed plan is recorded.
//! Writes change the tables in place; inserted rows without an `id` get the
//! next integer id.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use ash_query::filter::OperatorKind;
use ash_query::plan::{Join, Mutation, Predicate, SelectPlan, SortDirection, SortKey};
use ash_query::{QueryError, QueryResult, Row, RowStore};
use async_trait::async_trait;
use serde_json::Value as JsonValue;

/// Row store backed by in-memory tables.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<HashMap<String, Vec<Row>>>,
    executed: Mutex<Vec<SelectPlan>>,
    mutations: Mutex<Vec<Mutation>>,
    delay: Option<Duration>,
    failure: Option<String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a table. `rows` must be a JSON array of objects keyed by column.
    pub fn with_table(mut self, table: &str, rows: JsonValue) -> Self {
        let rows = match rows {
            JsonValue::Array(items) => items
                .into_iter()
                .filter_map(|item| match item {
                    JsonValue::Object(row) => Some(row),
                    _ => None,
                })
                .collect(),
            _ => Vec::new(),
        };
        if let Ok(tables) = self.tables.get_mut() {
            tables.insert(table.to_string(), rows);
        }
        self
    }

    /// Sleep before answering each query.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Fail every query and ping with `message`.
    pub fn failing(mut self, message: &str) -> Self {
        self.failure = Some(message.to_string());
        self
    }

    /// Plans executed so far, in order.
    pub fn executed(&self) -> Vec<SelectPlan> {
        self.executed
            .lock()
            .map(|plans| plans.clone())
            .unwrap_or_default()
    }

    /// Number of queries executed against `table`.
    pub fn query_count(&self, table: &str) -> usize {
        self.executed()
            .iter()
            .filter(|plan| plan.table == table)
            .count()
    }

    /// Writes executed so far, in order.
    pub fn mutations(&self) -> Vec<Mutation> {
        self.mutations
            .lock()
            .map(|mutations| mutations.clone())
            .unwrap_or_default()
    }

    /// Current contents of `table`, keyed by column.
    pub fn rows(&self, table: &str) -> Vec<Row> {
        self.tables
            .lock()
            .ok()
            .and_then(|tables| tables.get(table).cloned())
            .unwrap_or_default()
    }

    fn record(&self, plan: &SelectPlan) {
        if let Ok(mut plans) = self.executed.lock() {
            plans.push(plan.clone());
        }
    }

    /// Evaluate `plan` without recording it.
    pub fn evaluate(&self, plan: &SelectPlan) -> QueryResult<Vec<Row>> {
        if let Some(offset) = plan.offset.filter(|offset| *offset < 0) {
            return Err(QueryError::Internal(anyhow::anyhow!(
                "OFFSET must not be negative (got {offset})"
            )));
        }

        let tables = self.lock_tables()?;
        let mut rows: Vec<&Row> = tables
            .get(&plan.table)
            .map(|rows| rows.iter().collect())
            .unwrap_or_default();

        if let Some(predicate) = &plan.predicate {
            rows.retain(|row| matches(predicate, row));
        }

        rows.sort_by(|a, b| compare_rows(&plan.order, a, b));

        let offset = plan.offset.map_or(0, |offset| offset.unsigned_abs() as usize);
        let limit = plan.limit.map_or(usize::MAX, |limit| limit as usize);

        Ok(rows
            .into_iter()
            .skip(offset)
            .take(limit)
            .map(|row| project(plan, row))
            .collect())
    }

    /// Apply `mutation` without recording it.
    pub fn apply(&self, mutation: &Mutation) -> QueryResult<Vec<Row>> {
        let mut tables = self.lock_tables()?;
        let rows = tables.entry(mutation.table().to_string()).or_default();

        match mutation {
            Mutation::Insert { values, .. } => {
                let mut row: Row = rows
                    .first()
                    .map(|first| first.keys().map(|k| (k.clone(), JsonValue::Null)).collect())
                    .unwrap_or_default();
                row.extend(values.iter().cloned());
                if row.get("id").is_none_or(JsonValue::is_null) {
                    let next = rows
                        .iter()
                        .filter_map(|row| row.get("id").and_then(JsonValue::as_i64))
                        .max()
                        .unwrap_or(0)
                        + 1;
                    row.insert("id".to_string(), JsonValue::from(next));
                }
                rows.push(row.clone());
                Ok(vec![row])
            }
            Mutation::Update {
                values, predicate, ..
            } => Ok(rows
                .iter_mut()
                .filter(|row| matches(predicate, row))
                .map(|row| {
                    row.extend(values.iter().cloned());
                    row.clone()
                })
                .collect()),
            Mutation::Delete { predicate, .. } => {
                let (removed, kept): (Vec<Row>, Vec<Row>) = std::mem::take(rows)
                    .into_iter()
                    .partition(|row| matches(predicate, row));
                *rows = kept;
                Ok(removed)
            }
        }
    }

    fn lock_tables(&self) -> QueryResult<MutexGuard<'_, HashMap<String, Vec<Row>>>> {
        self.tables
            .lock()
            .map_err(|_| QueryError::Internal(anyhow::anyhow!("memory store lock poisoned")))
    }

    async fn simulate(&self) -> QueryResult<()> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match &self.failure {
            Some(message) => Err(QueryError::Connection(message.clone())),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl RowStore for MemoryStore {
    async fn fetch_all(&self, plan: &SelectPlan) -> QueryResult<Vec<Row>> {
        self.record(plan);
        self.simulate().await?;
        self.evaluate(plan)
    }

    async fn execute(&self, mutation: &Mutation) -> QueryResult<Vec<Row>> {
        if let Ok(mut mutations) = self.mutations.lock() {
            mutations.push(mutation.clone());
        }
        self.simulate().await?;
        self.apply(mutation)
    }

    async fn ping(&self) -> QueryResult<()> {
        match &self.failure {
            Some(message) => Err(QueryError::Connection(message.clone())),
            None => Ok(()),
        }
    }
}

fn project(plan: &SelectPlan, row: &Row) -> Row {
    if plan.columns.is_empty() {
        return row.clone();
    }
    plan.columns
        .iter()
        .map(|projection| {
            let value = row.get(&projection.column).cloned().unwrap_or(JsonValue::Null);
            (projection.alias.clone(), value)
        })
        .collect()
}

fn matches(predicate: &Predicate, row: &Row) -> bool {
    match predicate {
        Predicate::Group {
            join: Join::And,
            children,
        } => children.iter().all(|child| matches(child, row)),
        Predicate::Group {
            join: Join::Or,
            children,
        } => children.iter().any(|child| matches(child, row)),
        Predicate::Compare {
            column,
            operator,
            value,
        } => {
            let cell = row.get(column).unwrap_or(&JsonValue::Null);
            compare(cell, *operator, value)
        }
    }
}

/// `cell <operator> value`; a NULL cell only matches the null checks.
fn compare(cell: &JsonValue, operator: OperatorKind, value: &JsonValue) -> bool {
    match operator {
        OperatorKind::Null => cell.is_null() == value.as_bool().unwrap_or(true),
        OperatorKind::Eq if value.is_null() => cell.is_null(),
        OperatorKind::Ne | OperatorKind::Not if value.is_null() => !cell.is_null(),
        _ if cell.is_null() => false,
        OperatorKind::Eq => equals(cell, value),
        OperatorKind::Ne | OperatorKind::Not => !equals(cell, value),
        OperatorKind::Gt => order(cell, value) == Some(Ordering::Greater),
        OperatorKind::Gte => matches!(order(cell, value), Some(Ordering::Greater | Ordering::Equal)),
        OperatorKind::Lt => order(cell, value) == Some(Ordering::Less),
        OperatorKind::Lte => matches!(order(cell, value), Some(Ordering::Less | Ordering::Equal)),
        OperatorKind::Between => between(cell, value),
        OperatorKind::NotBetween => !between(cell, value),
        OperatorKind::In => list(value).iter().any(|item| equals(cell, item)),
        OperatorKind::NotIn => !list(value).iter().any(|item| equals(cell, item)),
        OperatorKind::Like => like(cell, value, false),
        OperatorKind::NotLike => !like(cell, value, false),
        OperatorKind::ILike => like(cell, value, true),
        OperatorKind::NotILike => !like(cell, value, true),
        OperatorKind::Overlap => {
            let items = list(value);
            list(cell).iter().any(|c| items.iter().any(|v| equals(c, v)))
        }
        OperatorKind::Contains => {
            let held = list(cell);
            list(value).iter().all(|v| held.iter().any(|c| equals(c, v)))
        }
        OperatorKind::Contained => {
            let allowed = list(value);
            list(cell).iter().all(|c| allowed.iter().any(|v| equals(c, v)))
        }
    }
}

fn equals(a: &JsonValue, b: &JsonValue) -> bool {
    order(a, b) == Some(Ordering::Equal)
}

fn order(a: &JsonValue, b: &JsonValue) -> Option<Ordering> {
    match (a, b) {
        (JsonValue::Number(x), JsonValue::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (JsonValue::String(x), JsonValue::String(y)) => Some(x.cmp(y)),
        (JsonValue::Bool(x), JsonValue::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

fn between(cell: &JsonValue, bounds: &JsonValue) -> bool {
    match bounds.as_array().map(Vec::as_slice) {
        Some([low, high]) => {
            matches!(order(cell, low), Some(Ordering::Greater | Ordering::Equal))
                && matches!(order(cell, high), Some(Ordering::Less | Ordering::Equal))
        }
        _ => false,
    }
}

fn list(value: &JsonValue) -> Vec<JsonValue> {
    match value {
        JsonValue::Array(items) => items.clone(),
        JsonValue::Null => Vec::new(),
        other => vec![other.clone()],
    }
}

fn like(cell: &JsonValue, pattern: &JsonValue, case_insensitive: bool) -> bool {
    let (Some(text), Some(pattern)) = (cell.as_str(), pattern.as_str()) else {
        return false;
    };
    if case_insensitive {
        like_match(&text.to_lowercase(), &pattern.to_lowercase())
    } else {
        like_match(text, pattern)
    }
}

/// SQL LIKE: `%` matches any run, `_` one character, `\` escapes.
fn like_match(text: &str, pattern: &str) -> bool {
    let text: Vec<char> = text.chars().collect();
    let pattern: Vec<char> = pattern.chars().collect();

    // matched[j]: text[..i] matches pattern[..j]
    let mut matched = vec![false; pattern.len() + 1];
    matched[0] = true;
    let mut tokens = Vec::new();
    let mut p = 0;
    while p < pattern.len() {
        match pattern[p] {
            '\\' if p + 1 < pattern.len() => {
                tokens.push(Token::Literal(pattern[p + 1]));
                p += 2;
            }
            '%' => {
                tokens.push(Token::Any);
                p += 1;
            }
            '_' => {
                tokens.push(Token::One);
                p += 1;
            }
            c => {
                tokens.push(Token::Literal(c));
                p += 1;
            }
        }
    }

    matched.truncate(tokens.len() + 1);
    for j in 0..tokens.len() {
        matched[j + 1] = matched[j] && tokens[j] == Token::Any;
    }

    for ch in text {
        let mut next = vec![false; tokens.len() + 1];
        for j in 0..tokens.len() {
            next[j + 1] = match tokens[j] {
                Token::Any => next[j] || matched[j + 1],
                Token::One => matched[j],
                Token::Literal(c) => matched[j] && c == ch,
            };
        }
        matched = next;
    }
    matched[tokens.len()]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Token {
    Any,
    One,
    Literal(char),
}

fn compare_rows(order_by: &[SortKey], a: &Row, b: &Row) -> Ordering {
    for key in order_by {
        let left = a.get(&key.column).unwrap_or(&JsonValue::Null);
        let right = b.get(&key.column).unwrap_or(&JsonValue::Null);
        let ordering = match (left.is_null(), right.is_null()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Greater,
            (false, true) => Ordering::Less,
            (false, false) => order(left, right).unwrap_or(Ordering::Equal),
        };
        let ordering = match key.direction {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn like_patterns() {
        assert!(like_match("My Post 2", "%Post 2"));
        assert!(like_match("My Post 2", "My%"));
        assert!(like_match("My Post 2", "My_Post_2"));
        assert!(like_match("100%", "100\\%"));
        assert!(!like_match("My Post 2", "Post%"));
        assert!(!like_match("abc", "ab"));
        assert!(like_match("", "%"));
    }

    #[test]
    fn null_never_matches_comparisons() {
        assert!(!compare(&JsonValue::Null, OperatorKind::Eq, &json!(1)));
        assert!(!compare(&JsonValue::Null, OperatorKind::Ne, &json!(1)));
        assert!(!compare(&JsonValue::Null, OperatorKind::NotIn, &json!([1])));
        assert!(compare(&JsonValue::Null, OperatorKind::Eq, &JsonValue::Null));
        assert!(compare(&JsonValue::Null, OperatorKind::Null, &json!(true)));
        assert!(compare(&json!(3), OperatorKind::Null, &json!(false)));
    }

    #[test]
    fn array_operators() {
        let tags = json!(["rust", "sql"]);
        assert!(compare(&tags, OperatorKind::Overlap, &json!(["go", "rust"])));
        assert!(compare(&tags, OperatorKind::Contains, &json!(["sql"])));
        assert!(!compare(&tags, OperatorKind::Contained, &json!(["sql"])));
        assert!(compare(&tags, OperatorKind::Contained, &json!(["rust", "sql", "go"])));
    }

    #[test]
    fn nulls_sort_last_ascending() {
        let mut plan = SelectPlan::new("t");
        plan.order = vec![SortKey {
            column: "n".to_string(),
            direction: SortDirection::Asc,
        }];
        let store = MemoryStore::new().with_table("t", json!([{"n": null}, {"n": 2}, {"n": 1}]));
        let rows = store.evaluate(&plan).unwrap();
        let values: Vec<&JsonValue> = rows.iter().map(|row| &row["n"]).collect();
        assert_eq!(values, [&json!(1), &json!(2), &JsonValue::Null]);
    }

    #[test]
    fn writes_change_the_table() {
        let store = MemoryStore::new();
        let inserted = store
            .apply(&Mutation::Insert {
                table: "t".to_string(),
                values: vec![("n".to_string(), json!(7))],
            })
            .unwrap();
        assert_eq!(inserted[0]["id"], json!(1));

        let updated = store
            .apply(&Mutation::Update {
                table: "t".to_string(),
                values: vec![("n".to_string(), json!(8))],
                predicate: Predicate::eq("id", json!(1)),
            })
            .unwrap();
        assert_eq!(updated[0]["n"], json!(8));

        let removed = store
            .apply(&Mutation::Delete {
                table: "t".to_string(),
                predicate: Predicate::eq("id", json!(2)),
            })
            .unwrap();
        assert!(removed.is_empty());
        assert_eq!(store.rows("t").len(), 1);
    }
}
