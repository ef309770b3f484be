//! Integration tests for filter translation against the in-memory store.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use ash_query::{Dropped, Mode, QueryEngine, QueryOptions, Row};
use ash_query_test_utils::{assert, engine, fixtures};
use serde_json::{Value, json};

fn blog() -> QueryEngine {
    engine(fixtures::blog_registry(), fixtures::blog_store()).0
}

async fn filtered(engine: &QueryEngine, filter: Value) -> Vec<Row> {
    let post = engine.model("post").unwrap();
    let options = QueryOptions::new().filter(filter).sort("id");
    engine.query(&post, &options).await.unwrap()
}

fn sql_for(engine: &QueryEngine, filter: Value) -> String {
    let post = engine.model("post").unwrap();
    let options = QueryOptions::new().filter(filter);
    engine.plan(&post, &options, Mode::Many).plan.to_sql()
}

#[tokio::test]
async fn sibling_keys_are_anded() {
    let engine = blog();
    let rows = filtered(&engine, json!({"id": {"$gt": 1}, "title": "My Post 2"})).await;
    assert::ids(&rows, &[2]);
}

#[tokio::test]
async fn or_array_matches_any_branch() {
    let engine = blog();
    let rows = filtered(
        &engine,
        json!({"$or": [{"id": 1}, {"title": {"$ilike": "%another%"}}]}),
    )
    .await;
    assert::ids(&rows, &[1, 3]);
}

#[tokio::test]
async fn or_branch_with_several_keys_is_anded_inside() {
    let engine = blog();
    let rows = filtered(
        &engine,
        json!({"$or": [{"title": "My Post 1"}, {"id": {"$gte": 3, "$lte": 3}}]}),
    )
    .await;
    assert::ids(&rows, &[1, 3]);
}

#[tokio::test]
async fn or_group_combines_with_sibling_columns() {
    let engine = blog();
    let rows = filtered(
        &engine,
        json!({"title": {"$like": "My%"}, "$or": [{"id": 1}, {"id": 3}]}),
    )
    .await;
    assert::ids(&rows, &[1]);
}

#[tokio::test]
async fn operator_case_is_ignored() {
    let engine = blog();
    let upper = filtered(&engine, json!({"title": {"$ILIKE": "my post%"}})).await;
    let lower = filtered(&engine, json!({"title": {"$ilike": "my post%"}})).await;
    assert::ids(&upper, &[1, 2]);
    assert_eq!(upper, lower);

    assert_eq!(
        sql_for(&engine, json!({"title": {"$iLike": "x"}})),
        sql_for(&engine, json!({"title": {"$ilike": "x"}}))
    );
}

#[tokio::test]
async fn unknown_column_is_no_filter() {
    let engine = blog();
    let rows = filtered(&engine, json!({"doesNotExist": 1})).await;
    assert::ids(&rows, &[1, 2, 3, 4]);

    let sql = sql_for(&engine, json!({"doesNotExist": 1}));
    assert::not_contains(&sql, "WHERE");
}

#[tokio::test]
async fn unknown_operator_is_ignored() {
    let engine = blog();
    let rows = filtered(&engine, json!({"title": {"$regex": "^My"}})).await;
    assert::ids(&rows, &[1, 2, 3, 4]);

    let post = engine.model("post").unwrap();
    let options = QueryOptions::new().filter(json!({"title": {"$regex": "^My"}}));
    let planned = engine.plan(&post, &options, Mode::Many);
    assert_eq!(
        planned.dropped,
        vec![Dropped::UnknownOperator {
            column: "title".to_string(),
            operator: "$regex".to_string(),
        }]
    );
}

#[tokio::test]
async fn null_checks() {
    let engine = blog();
    assert::ids(&filtered(&engine, json!({"description": null})).await, &[2, 4]);
    assert::ids(
        &filtered(&engine, json!({"description": {"$ne": null}})).await,
        &[1, 3],
    );
    assert::ids(
        &filtered(&engine, json!({"description": {"$null": false}})).await,
        &[1, 3],
    );
    assert::ids(
        &filtered(&engine, json!({"description": {"$null": true}})).await,
        &[2, 4],
    );
}

#[tokio::test]
async fn comparison_and_negation() {
    let engine = blog();
    assert::ids(&filtered(&engine, json!({"id": {"$lt": 2}})).await, &[1]);
    assert::ids(&filtered(&engine, json!({"id": {"$lte": 2}})).await, &[1, 2]);
    assert::ids(&filtered(&engine, json!({"id": {"$ne": 2}})).await, &[1, 3, 4]);
    assert::ids(
        &filtered(&engine, json!({"title": {"$not": "Draft"}})).await,
        &[1, 2, 3],
    );
}

#[tokio::test]
async fn ranges_and_lists() {
    let engine = blog();
    assert::ids(
        &filtered(&engine, json!({"id": {"$between": [2, 3]}})).await,
        &[2, 3],
    );
    assert::ids(
        &filtered(&engine, json!({"id": {"$notBetween": [2, 3]}})).await,
        &[1, 4],
    );
    assert::ids(&filtered(&engine, json!({"id": {"$in": [1, 4]}})).await, &[1, 4]);
    assert::ids(
        &filtered(&engine, json!({"id": {"$notIn": [1, 4]}})).await,
        &[2, 3],
    );
}

#[tokio::test]
async fn pattern_operators() {
    let engine = blog();
    assert::ids(
        &filtered(&engine, json!({"title": {"$notlike": "My%"}})).await,
        &[3, 4],
    );
    assert::ids(
        &filtered(&engine, json!({"title": {"$notilike": "%POST%"}})).await,
        &[4],
    );
}

#[tokio::test]
async fn array_operators() {
    let engine = blog();
    assert::ids(
        &filtered(&engine, json!({"tags": {"$contains": ["sql"]}})).await,
        &[2, 4],
    );
    assert::ids(
        &filtered(&engine, json!({"tags": {"$overlap": ["rust"]}})).await,
        &[1, 2],
    );

    let sql = sql_for(&engine, json!({"tags": {"$contains": ["sql"]}}));
    assert::contains(&sql, r#""posts"."tags" @> ARRAY ['sql']"#);
    assert::not_contains(&sql, "$1");
}

#[test]
fn single_clause_is_not_parenthesized() {
    let engine = blog();
    let sql = sql_for(&engine, json!({"title": "x"}));
    assert::contains(&sql, r#"WHERE "posts"."title" = 'x'"#);
    assert::not_contains(&sql, "(");
}

#[test]
fn or_renders_between_branches() {
    let engine = blog();
    let sql = sql_for(&engine, json!({"$or": [{"id": 1}, {"id": 2}]}));
    assert::contains(&sql, r#""posts"."id" = 1 OR "posts"."id" = 2"#);

    let sql = sql_for(&engine, json!({"title": "x", "$or": [{"id": 1}, {"id": 2}]}));
    assert::contains(
        &sql,
        r#""posts"."title" = 'x' AND ("posts"."id" = 1 OR "posts"."id" = 2)"#,
    );
}
