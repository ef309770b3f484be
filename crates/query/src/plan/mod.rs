//! Select plans.
//!
//! A [`SelectPlan`] is the dialect-neutral form of one SELECT: projected
//! columns, an optional predicate tree, ordering and limit/offset. The
//! engine assembles plans from request options; a [`crate::store::RowStore`]
//! executes them. Plans lower to SeaQuery for PostgreSQL rendering.
//!
//! This module provides:
//! - SelectPlan / Projection / SortKey: the plan itself
//! - Predicate / Join: the WHERE tree
//! - select_fields / paginate / parse_sort: option → plan pieces
//! - Mutation: INSERT / UPDATE / DELETE for the record write paths

mod fields;
mod mutation;
mod paginate;
mod sort;

pub use fields::{FieldSelection, projection, select_fields};
pub use mutation::Mutation;
pub use paginate::{DEFAULT_PAGE_SIZE, Pagination, paginate};
pub use sort::parse_sort;

use sea_query::{
    Alias, Asterisk, Cond, Condition, Expr, Order, PostgresQueryBuilder, Query, SelectStatement,
    SimpleExpr,
};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::filter::OperatorKind;

/// How the children of a predicate group are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Join {
    And,
    Or,
}

/// WHERE-clause tree over database column names.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Compare {
        column: String,
        operator: OperatorKind,
        value: JsonValue,
    },
    Group {
        join: Join,
        children: Vec<Predicate>,
    },
}

impl Predicate {
    /// `column = value`.
    pub fn eq(column: impl Into<String>, value: JsonValue) -> Self {
        Predicate::Compare {
            column: column.into(),
            operator: OperatorKind::Eq,
            value,
        }
    }

    /// `column IN (values)`.
    pub fn is_in(column: impl Into<String>, values: Vec<JsonValue>) -> Self {
        Predicate::Compare {
            column: column.into(),
            operator: OperatorKind::In,
            value: JsonValue::Array(values),
        }
    }

    /// Lower to a SeaQuery condition with columns qualified by `table`.
    pub fn to_condition(&self, table: &str) -> Condition {
        match self {
            Predicate::Compare {
                column,
                operator,
                value,
            } => {
                let col: SimpleExpr = Expr::col((Alias::new(table), Alias::new(column))).into();
                Cond::all().add_option(operator.to_expr(col, value))
            }
            Predicate::Group { join, children } => {
                let cond = match join {
                    Join::And => Cond::all(),
                    Join::Or => Cond::any(),
                };
                children
                    .iter()
                    .fold(cond, |cond, child| cond.add(child.to_condition(table)))
            }
        }
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

/// One ORDER BY entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey {
    /// Database column.
    pub column: String,
    pub direction: SortDirection,
}

/// One projected column, returned under `alias`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Projection {
    /// Database column.
    pub column: String,

    /// Key of the value in result rows (the attribute name).
    pub alias: String,
}

impl Projection {
    pub fn new(column: impl Into<String>, alias: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            alias: alias.into(),
        }
    }
}

/// A single SELECT against one table.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectPlan {
    pub table: String,

    /// Projected columns; empty selects `*`.
    pub columns: Vec<Projection>,

    pub predicate: Option<Predicate>,

    /// ORDER BY keys, primary first.
    pub order: Vec<SortKey>,

    pub limit: Option<u64>,

    /// May be negative (page 0); rendered verbatim.
    pub offset: Option<i64>,
}

impl SelectPlan {
    /// `SELECT * FROM table`.
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            columns: Vec::new(),
            predicate: None,
            order: Vec::new(),
            limit: None,
            offset: None,
        }
    }

    /// Lower to a SeaQuery statement.
    ///
    /// A negative offset has no SeaQuery representation and is left out
    /// here; [`Self::to_sql`] appends it.
    pub fn to_statement(&self) -> SelectStatement {
        let table = Alias::new(&self.table);
        let mut query = Query::select();

        if self.columns.is_empty() {
            query.column(Asterisk);
        }
        for projection in &self.columns {
            query.expr_as(
                Expr::col((table.clone(), Alias::new(&projection.column))),
                Alias::new(&projection.alias),
            );
        }

        query.from(table.clone());

        if let Some(predicate) = &self.predicate {
            query.cond_where(predicate.to_condition(&self.table));
        }

        for key in &self.order {
            let order = match key.direction {
                SortDirection::Asc => Order::Asc,
                SortDirection::Desc => Order::Desc,
            };
            query.order_by((table.clone(), Alias::new(&key.column)), order);
        }

        if let Some(limit) = self.limit {
            query.limit(limit);
        }
        if let Some(offset) = self.offset.filter(|offset| *offset >= 0) {
            query.offset(offset.unsigned_abs());
        }

        query
    }

    /// Render PostgreSQL with inlined values.
    pub fn to_sql(&self) -> String {
        let mut sql = self.to_statement().to_string(PostgresQueryBuilder);
        if let Some(offset) = self.offset.filter(|offset| *offset < 0) {
            sql.push_str(&format!(" OFFSET {offset}"));
        }
        sql
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn compare(column: &str, operator: OperatorKind, value: JsonValue) -> Predicate {
        Predicate::Compare {
            column: column.to_string(),
            operator,
            value,
        }
    }

    #[test]
    fn bare_plan_selects_everything() {
        let sql = SelectPlan::new("posts").to_sql();
        assert_eq!(sql, r#"SELECT * FROM "posts""#);
    }

    #[test]
    fn projections_are_aliased_to_attribute_names() {
        let mut plan = SelectPlan::new("posts");
        plan.columns = vec![Projection::new("id", "id"), Projection::new("my_title", "myTitle")];
        let sql = plan.to_sql();
        assert!(sql.contains(r#""posts"."id" AS "id""#), "{sql}");
        assert!(sql.contains(r#""posts"."my_title" AS "myTitle""#), "{sql}");
    }

    #[test]
    fn and_group_renders_with_and() {
        let mut plan = SelectPlan::new("posts");
        plan.predicate = Some(Predicate::Group {
            join: Join::And,
            children: vec![
                compare("id", OperatorKind::Gt, json!(1)),
                compare("title", OperatorKind::Eq, json!("My Post 2")),
            ],
        });
        let sql = plan.to_sql();
        assert!(sql.contains(r#""posts"."id" > 1"#), "{sql}");
        assert!(sql.contains(" AND "), "{sql}");
        assert!(sql.contains(r#""posts"."title" = 'My Post 2'"#), "{sql}");
    }

    #[test]
    fn or_group_renders_with_or() {
        let mut plan = SelectPlan::new("posts");
        plan.predicate = Some(Predicate::Group {
            join: Join::Or,
            children: vec![
                compare("id", OperatorKind::Eq, json!(1)),
                compare("id", OperatorKind::Eq, json!(2)),
            ],
        });
        let sql = plan.to_sql();
        assert!(sql.contains(r#""posts"."id" = 1 OR "posts"."id" = 2"#), "{sql}");
    }

    #[test]
    fn single_comparison_has_no_parentheses() {
        let mut plan = SelectPlan::new("posts");
        plan.predicate = Some(compare("title", OperatorKind::Eq, json!("x")));
        let sql = plan.to_sql();
        assert!(sql.ends_with(r#"WHERE "posts"."title" = 'x'"#), "{sql}");
    }

    #[test]
    fn order_limit_offset() {
        let mut plan = SelectPlan::new("posts");
        plan.order = vec![
            SortKey {
                column: "title".to_string(),
                direction: SortDirection::Desc,
            },
            SortKey {
                column: "id".to_string(),
                direction: SortDirection::Asc,
            },
        ];
        plan.limit = Some(2);
        plan.offset = Some(2);
        let sql = plan.to_sql();
        assert!(
            sql.contains(r#"ORDER BY "posts"."title" DESC, "posts"."id" ASC"#),
            "{sql}"
        );
        assert!(sql.ends_with("LIMIT 2 OFFSET 2"), "{sql}");
    }

    #[test]
    fn negative_offset_is_rendered_verbatim() {
        let mut plan = SelectPlan::new("posts");
        plan.limit = Some(20);
        plan.offset = Some(-20);
        let sql = plan.to_sql();
        assert!(sql.ends_with("LIMIT 20 OFFSET -20"), "{sql}");
    }

    #[test]
    fn in_predicate() {
        let mut plan = SelectPlan::new("comments");
        plan.predicate = Some(Predicate::is_in("post_id", vec![json!(1), json!(2)]));
        let sql = plan.to_sql();
        assert!(sql.contains(r#""comments"."post_id" IN (1, 2)"#), "{sql}");
    }
}
