//! Filter operator table.
//!
//! Operator tokens (`$eq`, `$gt`, ...) are matched case-insensitively and
//! mapped to a closed [`OperatorKind`]. Each kind knows which values it
//! accepts and how to build its SeaQuery predicate. `$or` is structural and
//! handled by the parser, never by this table.

use sea_query::{ArrayType, BinOper, ExprTrait, SimpleExpr, Value};
use serde_json::Value as JsonValue;

/// Comparison operators understood by the filter translator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperatorKind {
    /// `=` (a bare value is `$eq`).
    Eq,
    Gt,
    Gte,
    Lt,
    Lte,
    /// `!=`.
    Ne,
    /// Negated equality: `NOT col = value`.
    Not,
    /// Inclusive range with two bounds.
    Between,
    NotBetween,
    /// Membership in a list.
    In,
    NotIn,
    Like,
    NotLike,
    /// Case-insensitive LIKE.
    ILike,
    NotILike,
    /// Array/range overlap (`&&`).
    Overlap,
    /// `@>`.
    Contains,
    /// `<@`.
    Contained,
    /// `IS NULL` for `true`, `IS NOT NULL` for `false`.
    Null,
}

impl OperatorKind {
    /// Every operator, in table order.
    pub const ALL: [OperatorKind; 19] = [
        OperatorKind::Eq,
        OperatorKind::Gt,
        OperatorKind::Gte,
        OperatorKind::Lt,
        OperatorKind::Lte,
        OperatorKind::Ne,
        OperatorKind::Not,
        OperatorKind::Between,
        OperatorKind::NotBetween,
        OperatorKind::In,
        OperatorKind::NotIn,
        OperatorKind::Like,
        OperatorKind::NotLike,
        OperatorKind::ILike,
        OperatorKind::NotILike,
        OperatorKind::Overlap,
        OperatorKind::Contains,
        OperatorKind::Contained,
        OperatorKind::Null,
    ];

    /// Look up an operator token, ignoring case. Unknown tokens yield `None`.
    pub fn parse(token: &str) -> Option<Self> {
        let token = token.to_ascii_lowercase();
        Self::ALL.into_iter().find(|op| op.token() == token)
    }

    /// Canonical lower-case token.
    pub fn token(self) -> &'static str {
        match self {
            OperatorKind::Eq => "$eq",
            OperatorKind::Gt => "$gt",
            OperatorKind::Gte => "$gte",
            OperatorKind::Lt => "$lt",
            OperatorKind::Lte => "$lte",
            OperatorKind::Ne => "$ne",
            OperatorKind::Not => "$not",
            OperatorKind::Between => "$between",
            OperatorKind::NotBetween => "$notbetween",
            OperatorKind::In => "$in",
            OperatorKind::NotIn => "$notin",
            OperatorKind::Like => "$like",
            OperatorKind::NotLike => "$notlike",
            OperatorKind::ILike => "$ilike",
            OperatorKind::NotILike => "$notilike",
            OperatorKind::Overlap => "$overlap",
            OperatorKind::Contains => "$contains",
            OperatorKind::Contained => "$contained",
            OperatorKind::Null => "$null",
        }
    }

    /// Whether `value` is usable with this operator.
    pub fn accepts(self, value: &JsonValue) -> bool {
        match self {
            OperatorKind::Eq | OperatorKind::Ne | OperatorKind::Not => is_scalar(value),
            OperatorKind::Gt
            | OperatorKind::Gte
            | OperatorKind::Lt
            | OperatorKind::Lte
            | OperatorKind::Like
            | OperatorKind::NotLike
            | OperatorKind::ILike
            | OperatorKind::NotILike => is_scalar(value) && !value.is_null(),
            OperatorKind::Between | OperatorKind::NotBetween => bounds(value).is_some(),
            OperatorKind::In | OperatorKind::NotIn => match value {
                JsonValue::Array(items) => items.iter().all(is_scalar),
                other => is_scalar(other) && !other.is_null(),
            },
            OperatorKind::Overlap | OperatorKind::Contains | OperatorKind::Contained => {
                match value {
                    JsonValue::Array(items) => items.iter().all(is_scalar),
                    other => is_scalar(other) && !other.is_null(),
                }
            }
            OperatorKind::Null => value.is_boolean(),
        }
    }

    /// Build the predicate for `column <op> value`.
    ///
    /// Returns `None` when the value is not accepted (see [`Self::accepts`]).
    pub fn to_expr(self, column: SimpleExpr, value: &JsonValue) -> Option<SimpleExpr> {
        if !self.accepts(value) {
            return None;
        }

        let expr = match self {
            OperatorKind::Eq if value.is_null() => column.is_null(),
            OperatorKind::Eq => column.binary(BinOper::Equal, scalar(value)),
            OperatorKind::Ne if value.is_null() => column.is_not_null(),
            OperatorKind::Ne => column.binary(BinOper::NotEqual, scalar(value)),
            OperatorKind::Gt => column.binary(BinOper::GreaterThan, scalar(value)),
            OperatorKind::Gte => column.binary(BinOper::GreaterThanOrEqual, scalar(value)),
            OperatorKind::Lt => column.binary(BinOper::SmallerThan, scalar(value)),
            OperatorKind::Lte => column.binary(BinOper::SmallerThanOrEqual, scalar(value)),
            OperatorKind::Not if value.is_null() => column.is_null().not(),
            OperatorKind::Not => column.binary(BinOper::Equal, scalar(value)).not(),
            OperatorKind::Between => {
                let (low, high) = bounds(value)?;
                column.between(scalar(low), scalar(high))
            }
            OperatorKind::NotBetween => {
                let (low, high) = bounds(value)?;
                column.not_between(scalar(low), scalar(high))
            }
            OperatorKind::In => column.is_in(list(value)),
            OperatorKind::NotIn => column.is_not_in(list(value)),
            OperatorKind::Like => column.binary(BinOper::Like, scalar(value)),
            OperatorKind::NotLike => column.binary(BinOper::NotLike, scalar(value)),
            OperatorKind::ILike => column.binary(BinOper::Custom("ILIKE"), scalar(value)),
            OperatorKind::NotILike => {
                column.binary(BinOper::Custom("NOT ILIKE"), scalar(value))
            }
            OperatorKind::Overlap => column.binary(BinOper::Custom("&&"), literal(value)),
            OperatorKind::Contains => column.binary(BinOper::Custom("@>"), literal(value)),
            OperatorKind::Contained => column.binary(BinOper::Custom("<@"), literal(value)),
            OperatorKind::Null if value.as_bool() == Some(false) => column.is_not_null(),
            OperatorKind::Null => column.is_null(),
        };
        Some(expr)
    }
}

fn is_scalar(value: &JsonValue) -> bool {
    !matches!(value, JsonValue::Array(_) | JsonValue::Object(_))
}

fn bounds(value: &JsonValue) -> Option<(&JsonValue, &JsonValue)> {
    match value.as_array().map(Vec::as_slice) {
        Some([low, high]) if is_scalar(low) && is_scalar(high) => Some((low, high)),
        _ => None,
    }
}

/// Convert a JSON scalar to a bound SQL value.
pub(crate) fn sql_value(value: &JsonValue) -> Value {
    match value {
        JsonValue::Null => Value::String(None),
        JsonValue::Bool(b) => (*b).into(),
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                i.into()
            } else if let Some(u) = n.as_u64() {
                u.into()
            } else {
                n.as_f64().unwrap_or_default().into()
            }
        }
        JsonValue::String(s) => s.clone().into(),
        other => other.to_string().into(),
    }
}

fn scalar(value: &JsonValue) -> SimpleExpr {
    SimpleExpr::Value(sql_value(value))
}

fn list(value: &JsonValue) -> Vec<SimpleExpr> {
    match value {
        JsonValue::Array(items) => items.iter().map(scalar).collect(),
        other => vec![scalar(other)],
    }
}

/// Inline SQL value. JSON arrays become `ARRAY [..]` literals typed by their
/// first element; everything else is a scalar.
pub(crate) fn literal(value: &JsonValue) -> SimpleExpr {
    match value {
        JsonValue::Array(items) => {
            let values: Vec<Value> = items.iter().map(sql_value).collect();
            let element = values.first().map_or(ArrayType::String, element_type);
            SimpleExpr::Value(Value::Array(element, Some(Box::new(values))))
        }
        other => scalar(other),
    }
}

fn element_type(value: &Value) -> ArrayType {
    match value {
        Value::Bool(_) => ArrayType::Bool,
        Value::BigInt(_) => ArrayType::BigInt,
        Value::BigUnsigned(_) => ArrayType::BigUnsigned,
        Value::Double(_) => ArrayType::Double,
        _ => ArrayType::String,
    }
}
