//! Integration tests for batched relationship includes.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::time::{Duration, Instant};

use ash_query::plan::Predicate;
use ash_query::{QueryOptions, Related, Row};
use ash_query_test_utils::{MemoryStore, assert, engine, fixtures};
use serde_json::{Value, json};

fn related_ids(row: &Row, relation: &str) -> Vec<i64> {
    row[relation]
        .as_array()
        .unwrap()
        .iter()
        .map(|item| item["id"].as_i64().unwrap())
        .collect()
}

#[tokio::test]
async fn has_many_groups_rows_under_each_parent() {
    let (engine, _) = engine(fixtures::blog_registry(), fixtures::blog_store());
    let post = engine.model("post").unwrap();

    let options = QueryOptions::new()
        .filter(json!({"id": {"$in": [1, 2, 3]}}))
        .sort("id")
        .include("comments");
    let rows = engine.query(&post, &options).await.unwrap();

    assert::ids(&rows, &[1, 2, 3]);
    assert_eq!(related_ids(&rows[0], "comments"), [10, 11]);
    assert_eq!(related_ids(&rows[1], "comments"), [12]);
    assert_eq!(rows[2]["comments"], json!([]));
}

#[tokio::test]
async fn one_batched_query_per_relationship() {
    let (engine, store) = engine(fixtures::blog_registry(), fixtures::blog_store());
    let post = engine.model("post").unwrap();

    let options = QueryOptions::new().sort("id").include("comments,author");
    let rows = engine.query(&post, &options).await.unwrap();
    assert_eq!(rows.len(), 4);

    assert_eq!(store.query_count("posts"), 1);
    assert_eq!(store.query_count("comments"), 1);
    assert_eq!(store.query_count("authors"), 1);

    let comments = store
        .executed()
        .into_iter()
        .find(|plan| plan.table == "comments")
        .unwrap();
    assert_eq!(
        comments.predicate,
        Some(Predicate::is_in(
            "post_id",
            vec![json!(1), json!(2), json!(3), json!(4)]
        ))
    );

    // Null foreign keys are left out of the batch and repeated keys are sent once.
    let authors = store
        .executed()
        .into_iter()
        .find(|plan| plan.table == "authors")
        .unwrap();
    assert_eq!(
        authors.predicate,
        Some(Predicate::is_in("id", vec![json!(1), json!(2)]))
    );
}

#[tokio::test]
async fn belongs_to_assigns_a_single_row_or_null() {
    let (engine, _) = engine(fixtures::blog_registry(), fixtures::blog_store());
    let post = engine.model("post").unwrap();

    let options = QueryOptions::new().sort("id").include("author");
    let rows = engine.query(&post, &options).await.unwrap();

    assert_eq!(rows[0]["author"], json!({"id": 1, "name": "Ada"}));
    assert_eq!(rows[1]["author"]["name"], json!("Grace"));
    assert_eq!(rows[2]["author"]["name"], json!("Ada"));
    assert_eq!(rows[3]["author"], Value::Null);
}

#[tokio::test]
async fn belongs_to_takes_the_first_matching_row() {
    let store = fixtures::blog_store().with_table(
        "authors",
        json!([
            {"id": 1, "name": "first"},
            {"id": 1, "name": "second"}
        ]),
    );
    let (engine, _) = engine(fixtures::blog_registry(), store);
    let post = engine.model("post").unwrap();

    let options = QueryOptions::new().filter(json!({"id": 1})).include("author");
    let rows = engine.query(&post, &options).await.unwrap();
    assert_eq!(rows[0]["author"]["name"], json!("first"));
}

#[tokio::test]
async fn has_many_from_the_other_side() {
    let (engine, _) = engine(fixtures::blog_registry(), fixtures::blog_store());
    let author = engine.model("author").unwrap();

    let options = QueryOptions::new().sort("id").include("posts");
    let rows = engine.query(&author, &options).await.unwrap();

    assert_eq!(related_ids(&rows[0], "posts"), [1, 3]);
    assert_eq!(related_ids(&rows[1], "posts"), [2]);
}

#[tokio::test]
async fn nested_and_unknown_includes_are_skipped() {
    let (engine, store) = engine(fixtures::blog_registry(), fixtures::blog_store());
    let post = engine.model("post").unwrap();

    let options = QueryOptions::new().include("comments.author, bogus");
    let rows = engine.query(&post, &options).await.unwrap();

    assert_eq!(rows.len(), 4);
    assert!(rows.iter().all(|row| !row.contains_key("comments")));
    assert!(rows.iter().all(|row| !row.contains_key("bogus")));
    assert_eq!(store.executed().len(), 1);
}

#[tokio::test]
async fn no_parent_keys_means_no_batched_query() {
    let (engine, store) = engine(fixtures::blog_registry(), fixtures::blog_store());
    let post = engine.model("post").unwrap();

    let options = QueryOptions::new().filter(json!({"id": 4})).include("author");
    let rows = engine.query(&post, &options).await.unwrap();
    assert_eq!(rows[0]["author"], Value::Null);
    assert_eq!(store.query_count("authors"), 0);

    let options = QueryOptions::new().filter(json!({"id": 99})).include("comments");
    let rows = engine.query(&post, &options).await.unwrap();
    assert!(rows.is_empty());
    assert_eq!(store.query_count("comments"), 0);
}

#[tokio::test]
async fn related_fieldsets_keep_the_grouping_key() {
    let (engine, _) = engine(fixtures::blog_registry(), fixtures::blog_store());
    let post = engine.model("post").unwrap();

    let options = QueryOptions::new()
        .filter(json!({"id": 1}))
        .fields("comments", "body")
        .include("comments");
    let rows = engine.query(&post, &options).await.unwrap();

    let comment = rows[0]["comments"][0].as_object().unwrap();
    let keys: Vec<&str> = comment.keys().map(String::as_str).collect();
    assert_eq!(keys, ["body", "id", "postId"]);
}

#[tokio::test]
async fn single_record_keeps_its_shape() {
    let (engine, _) = engine(fixtures::blog_registry(), fixtures::blog_store());
    let post = engine.model("post").unwrap();

    let options = QueryOptions::new().include("comments,author");
    let row = engine.find_record(&post, 1, &options).await.unwrap().unwrap();
    assert_eq!(related_ids(&row, "comments"), [10, 11]);
    assert_eq!(row["author"]["name"], json!("Ada"));
}

#[tokio::test]
async fn fetch_related_for_one_row() {
    let (engine, _) = engine(fixtures::blog_registry(), fixtures::blog_store());
    let post = engine.model("post").unwrap();

    let first = engine
        .find_record(&post, 1, &QueryOptions::new())
        .await
        .unwrap()
        .unwrap();
    match engine.fetch_related(&post, &first, "comments").await.unwrap() {
        Some(Related::Many(rows)) => assert::ids(&rows, &[10, 11]),
        other => panic!("expected comments, got {other:?}"),
    }
    match engine.fetch_related(&post, &first, "author").await.unwrap() {
        Some(Related::One(Some(author))) => assert_eq!(author["name"], json!("Ada")),
        other => panic!("expected an author, got {other:?}"),
    }

    let draft = engine
        .find_record(&post, 4, &QueryOptions::new())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        engine.fetch_related(&post, &draft, "author").await.unwrap(),
        Some(Related::One(None))
    );
    assert_eq!(
        engine.fetch_related(&post, &draft, "tags").await.unwrap(),
        None
    );
}

#[tokio::test]
async fn unregistered_related_model_is_skipped() {
    use ash_query::model::{AttributeType, RelationOptions};
    use ash_query::{ModelBuilder, ModelRegistry};

    let registry = ModelRegistry::builder()
        .model(
            ModelBuilder::new("post")
                .attr("title", AttributeType::String)
                .has_many_with(
                    "reaction",
                    RelationOptions {
                        name: Some("reactions".to_string()),
                        key_from: Some("id".to_string()),
                        key_to: Some("postId".to_string()),
                    },
                ),
        )
        .build()
        .unwrap();
    let store = MemoryStore::new().with_table("posts", fixtures::post_rows());
    let (engine, store) = engine(registry, store);
    let post = engine.model("post").unwrap();

    let rows = engine
        .query(&post, &QueryOptions::new().include("reactions"))
        .await
        .unwrap();
    assert_eq!(rows.len(), 4);
    assert!(!rows[0].contains_key("reactions"));
    assert_eq!(store.executed().len(), 1);
}

#[tokio::test]
async fn parent_fieldsets_keep_the_relationship_key() {
    let (engine, store) = engine(fixtures::blog_registry(), fixtures::blog_store());
    let post = engine.model("post").unwrap();

    let options = QueryOptions::new()
        .filter(json!({"id": 1}))
        .fields("posts", "title")
        .include("author");
    let rows = engine.query(&post, &options).await.unwrap();

    assert_eq!(rows[0]["author"], json!({"id": 1, "name": "Ada"}));
    assert_eq!(rows[0]["authorId"], json!(1));
    assert_eq!(store.query_count("authors"), 1);
}

#[tokio::test]
async fn relationship_batches_run_concurrently() {
    let delay = Duration::from_millis(200);
    let (engine, store) = engine(
        fixtures::blog_registry(),
        fixtures::blog_store().with_delay(delay),
    );
    // Base query plus two batches: run one after another they need 3 * delay.
    let engine = engine.with_timeout(Some(delay * 2 + Duration::from_millis(150)));
    let post = engine.model("post").unwrap();

    let started = Instant::now();
    let rows = engine
        .query(&post, &QueryOptions::new().sort("id").include("comments,author"))
        .await
        .unwrap();
    let elapsed = started.elapsed();

    assert_eq!(rows.len(), 4);
    assert_eq!(related_ids(&rows[0], "comments"), [10, 11]);
    assert_eq!(rows[0]["author"]["name"], json!("Ada"));
    assert_eq!(store.executed().len(), 3);
    assert!(elapsed < delay * 3, "includes ran sequentially: {elapsed:?}");
}
