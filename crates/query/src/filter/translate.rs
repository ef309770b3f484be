//! Compile a parsed filter against a model into a [`Predicate`].

use serde_json::Value as JsonValue;

use super::parse::{FilterNode, parse};
use crate::dropped::Dropped;
use crate::model::ModelDescriptor;
use crate::plan::Predicate;

/// Outcome of translating a filter for one model.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Translation {
    /// Effective predicate; `None` means "no filter".
    pub predicate: Option<Predicate>,

    /// Fragments left out of the predicate.
    pub dropped: Vec<Dropped>,
}

/// Translate a filter document for `model`.
///
/// Columns not declared on the model, unknown operators and unusable values
/// are dropped; a filter with nothing left translates to no predicate.
pub fn translate(model: &ModelDescriptor, filter: &JsonValue) -> Translation {
    let parsed = parse(filter);
    let mut dropped = parsed.dropped;
    let predicate = parsed
        .root
        .and_then(|root| compile(model, root, &mut dropped));
    Translation { predicate, dropped }
}

fn compile(
    model: &ModelDescriptor,
    node: FilterNode,
    dropped: &mut Vec<Dropped>,
) -> Option<Predicate> {
    match node {
        FilterNode::Compare {
            column,
            operator,
            value,
        } => {
            if !model.has_attribute(&column) {
                dropped.push(Dropped::UnknownColumn(column));
                return None;
            }
            if !operator.accepts(&value) {
                dropped.push(Dropped::InvalidValue {
                    column,
                    operator: operator.token().to_string(),
                });
                return None;
            }
            Some(Predicate::Compare {
                column: model.column_for(&column),
                operator,
                value,
            })
        }
        FilterNode::Group { join, children } => {
            let children: Vec<Predicate> = children
                .into_iter()
                .filter_map(|child| compile(model, child, dropped))
                .collect();
            if children.is_empty() {
                None
            } else {
                Some(Predicate::Group { join, children })
            }
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::OperatorKind;
    use crate::model::{AttributeType, ModelBuilder, ModelRegistry};
    use crate::plan::Join;
    use serde_json::json;
    use std::sync::Arc;

    fn post() -> Arc<ModelDescriptor> {
        ModelRegistry::builder()
            .model(
                ModelBuilder::new("post")
                    .attr("title", AttributeType::String)
                    .attr("myTitle", AttributeType::String)
                    .attr("description", AttributeType::String),
            )
            .build()
            .unwrap()
            .model("post")
            .unwrap()
    }

    fn compare(column: &str, operator: OperatorKind, value: JsonValue) -> Predicate {
        Predicate::Compare {
            column: column.to_string(),
            operator,
            value,
        }
    }

    #[test]
    fn unknown_column_yields_no_filter() {
        let translation = translate(&post(), &json!({"doesNotExist": 1}));
        assert_eq!(translation.predicate, None);
        assert_eq!(
            translation.dropped,
            vec![Dropped::UnknownColumn("doesNotExist".to_string())]
        );
    }

    #[test]
    fn unknown_column_is_removed_from_its_group() {
        let translation = translate(&post(), &json!({"title": "a", "bogus": {"$gt": 1}}));
        assert_eq!(
            translation.predicate,
            Some(Predicate::Group {
                join: Join::And,
                children: vec![compare("title", OperatorKind::Eq, json!("a"))],
            })
        );
        assert_eq!(translation.dropped.len(), 1);
    }

    #[test]
    fn columns_map_to_database_names() {
        let translation = translate(&post(), &json!({"myTitle": {"$ILIKE": "%x%"}}));
        assert_eq!(
            translation.predicate,
            Some(compare("my_title", OperatorKind::ILike, json!("%x%")))
        );
    }

    #[test]
    fn operator_case_does_not_change_the_predicate() {
        let upper = translate(&post(), &json!({"title": {"$ILIKE": "x"}}));
        let lower = translate(&post(), &json!({"title": {"$ilike": "x"}}));
        assert_eq!(upper, lower);
    }

    #[test]
    fn invalid_values_are_dropped() {
        let translation = translate(&post(), &json!({"id": {"$between": [1]}}));
        assert_eq!(translation.predicate, None);
        assert_eq!(
            translation.dropped,
            vec![Dropped::InvalidValue {
                column: "id".to_string(),
                operator: "$between".to_string(),
            }]
        );
    }

    #[test]
    fn or_branches_with_nothing_valid_disappear() {
        let translation = translate(
            &post(),
            &json!({"$or": [{"nope": 1}, {"title": "a"}], "id": 3}),
        );
        assert_eq!(
            translation.predicate,
            Some(Predicate::Group {
                join: Join::And,
                children: vec![
                    Predicate::Group {
                        join: Join::Or,
                        children: vec![compare("title", OperatorKind::Eq, json!("a"))],
                    },
                    compare("id", OperatorKind::Eq, json!(3)),
                ],
            })
        );
    }
}
