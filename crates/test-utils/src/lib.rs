//! Ash query test utilities.
//!
//! Helpers for integration testing: an in-memory row store that evaluates
//! select plans, fixture registries and rows, and assertion helpers.

mod memory;

pub use memory::MemoryStore;

use std::sync::Arc;

use ash_query::{ModelRegistry, QueryEngine};

/// Engine over `store` and `registry`; the store handle is returned so tests
/// can inspect executed plans.
pub fn engine(registry: ModelRegistry, store: MemoryStore) -> (QueryEngine, Arc<MemoryStore>) {
    let store = Arc::new(store);
    let engine = QueryEngine::new(store.clone(), Arc::new(registry));
    (engine, store)
}

/// Model registries used across the integration tests.
pub mod fixtures {
    use ash_query::model::AttributeType;
    use ash_query::{ModelBuilder, ModelRegistry};
    use serde_json::{Value, json};

    use crate::MemoryStore;

    /// `post { title, description }` with no relationships.
    pub fn post_registry() -> ModelRegistry {
        ModelRegistry::builder()
            .model(
                ModelBuilder::new("post")
                    .attr("title", AttributeType::String)
                    .attr("description", AttributeType::String),
            )
            .build()
            .unwrap_or_default()
    }

    /// Blog models:
    /// - `author { name }` has many posts
    /// - `post { title, description, tags }` belongs to author, has many comments
    /// - `comment { body, createdAt }` belongs to post
    pub fn blog_registry() -> ModelRegistry {
        ModelRegistry::builder()
            .model(
                ModelBuilder::new("author")
                    .attr("name", AttributeType::String)
                    .has_many("post"),
            )
            .model(
                ModelBuilder::new("post")
                    .attr("title", AttributeType::String)
                    .attr("description", AttributeType::String)
                    .attr("tags", AttributeType::Array)
                    .belongs_to("author")
                    .has_many("comment"),
            )
            .model(
                ModelBuilder::new("comment")
                    .attr("body", AttributeType::String)
                    .attr("createdAt", AttributeType::Date)
                    .belongs_to("post"),
            )
            .build()
            .unwrap_or_default()
    }

    /// `posts` rows keyed by column.
    pub fn post_rows() -> Value {
        json!([
            {"id": 1, "title": "My Post 1", "description": "first", "tags": ["rust"], "author_id": 1},
            {"id": 2, "title": "My Post 2", "description": null, "tags": ["rust", "sql"], "author_id": 2},
            {"id": 3, "title": "Another post", "description": "third", "tags": [], "author_id": 1},
            {"id": 4, "title": "Draft", "description": null, "tags": ["sql"], "author_id": null}
        ])
    }

    /// `comments` rows keyed by column.
    pub fn comment_rows() -> Value {
        json!([
            {"id": 10, "body": "first!", "created_at": "2024-01-01", "post_id": 1},
            {"id": 11, "body": "nice", "created_at": "2024-01-02", "post_id": 1},
            {"id": 12, "body": "hmm", "created_at": "2024-01-03", "post_id": 2},
            {"id": 13, "body": "orphan", "created_at": "2024-01-04", "post_id": 99}
        ])
    }

    /// `authors` rows keyed by column.
    pub fn author_rows() -> Value {
        json!([
            {"id": 1, "name": "Ada"},
            {"id": 2, "name": "Grace"}
        ])
    }

    /// Store holding every blog table.
    pub fn blog_store() -> MemoryStore {
        MemoryStore::new()
            .with_table("posts", post_rows())
            .with_table("comments", comment_rows())
            .with_table("authors", author_rows())
    }
}

/// Assertion helpers for rows and SQL.
pub mod assert {
    use ash_query::Row;
    use serde_json::Value;

    /// Assert that rows carry exactly these ids, in order.
    pub fn ids(rows: &[Row], expected: &[i64]) {
        let actual: Vec<Option<i64>> = rows
            .iter()
            .map(|row| row.get("id").and_then(Value::as_i64))
            .collect();
        let expected: Vec<Option<i64>> = expected.iter().copied().map(Some).collect();
        assert_eq!(actual, expected, "row ids differ");
    }

    /// Assert that a string contains a substring.
    pub fn contains(haystack: &str, needle: &str) {
        assert!(
            haystack.contains(needle),
            "Expected string to contain '{needle}'\nActual: {haystack}"
        );
    }

    /// Assert that a string does not contain a substring.
    pub fn not_contains(haystack: &str, needle: &str) {
        assert!(
            !haystack.contains(needle),
            "Expected string to NOT contain '{needle}'\nActual: {haystack}"
        );
    }
}
