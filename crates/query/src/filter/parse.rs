//! Filter documents to an immutable expression tree.
//!
//! Parsing is purely structural: column names are not checked against a
//! model here (see [`super::translate`]). Operator tokens are resolved to
//! [`OperatorKind`] up front so unknown tokens never reach compilation.

use serde_json::{Map, Value as JsonValue};

use super::operator::OperatorKind;
use crate::dropped::Dropped;
use crate::plan::Join;

/// One node of a parsed filter.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterNode {
    /// `column <operator> value`, keyed by attribute name.
    Compare {
        column: String,
        operator: OperatorKind,
        value: JsonValue,
    },
    /// Siblings joined by AND (multi-key objects) or OR (`$or` arrays).
    Group { join: Join, children: Vec<FilterNode> },
}

/// Result of parsing a filter document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedFilter {
    pub root: Option<FilterNode>,
    pub dropped: Vec<Dropped>,
}

/// Parse a filter document.
///
/// Anything other than a JSON object is treated as "no filter".
pub fn parse(filter: &JsonValue) -> ParsedFilter {
    let mut dropped = Vec::new();
    let root = match filter {
        JsonValue::Object(map) => parse_object(map, None, &mut dropped),
        _ => None,
    };
    ParsedFilter { root, dropped }
}

/// A single-key object yields its one clause directly; several keys form an
/// AND group in key order.
fn parse_object(
    map: &Map<String, JsonValue>,
    column: Option<&str>,
    dropped: &mut Vec<Dropped>,
) -> Option<FilterNode> {
    let mut children: Vec<FilterNode> = map
        .iter()
        .filter_map(|(key, value)| parse_entry(key, value, column, dropped))
        .collect();

    match map.len() {
        0 => None,
        1 => children.pop(),
        _ if children.is_empty() => None,
        _ => Some(FilterNode::Group {
            join: Join::And,
            children,
        }),
    }
}

fn parse_entry(
    key: &str,
    value: &JsonValue,
    column: Option<&str>,
    dropped: &mut Vec<Dropped>,
) -> Option<FilterNode> {
    if key.eq_ignore_ascii_case("$or") {
        return parse_or(value, column, dropped);
    }

    if key.starts_with('$') {
        let Some(column) = column else {
            dropped.push(Dropped::OperatorWithoutColumn(key.to_string()));
            return None;
        };
        let Some(operator) = OperatorKind::parse(key) else {
            dropped.push(Dropped::UnknownOperator {
                column: column.to_string(),
                operator: key.to_string(),
            });
            return None;
        };
        return Some(FilterNode::Compare {
            column: column.to_string(),
            operator,
            value: value.clone(),
        });
    }

    match value {
        JsonValue::Object(nested) => parse_object(nested, Some(key), dropped),
        JsonValue::Array(_) => {
            dropped.push(Dropped::InvalidValue {
                column: key.to_string(),
                operator: OperatorKind::Eq.token().to_string(),
            });
            None
        }
        scalar => Some(FilterNode::Compare {
            column: key.to_string(),
            operator: OperatorKind::Eq,
            value: scalar.clone(),
        }),
    }
}

/// `$or` always produces a group, even for a single element.
fn parse_or(
    value: &JsonValue,
    column: Option<&str>,
    dropped: &mut Vec<Dropped>,
) -> Option<FilterNode> {
    let JsonValue::Array(items) = value else {
        dropped.push(Dropped::MalformedOr);
        return None;
    };

    let mut children = Vec::with_capacity(items.len());
    for item in items {
        match item {
            JsonValue::Object(map) => children.extend(parse_object(map, column, dropped)),
            _ => dropped.push(Dropped::MalformedOr),
        }
    }

    if children.is_empty() {
        return None;
    }
    Some(FilterNode::Group {
        join: Join::Or,
        children,
    })
}
