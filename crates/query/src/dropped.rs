//! Request fragments left out of the effective query.

use std::fmt;

/// A fragment of the caller's options that was silently left out.
///
/// Dropping is the contract: the query runs as if the fragment were absent.
/// The list is kept so operators and tests can see what was ignored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dropped {
    /// Filter column not declared on the model.
    UnknownColumn(String),
    /// Filter operator token not in the operator table.
    UnknownOperator { column: String, operator: String },
    /// Operator key with no enclosing column.
    OperatorWithoutColumn(String),
    /// Value unusable with its operator (e.g. `$between` without two bounds).
    InvalidValue { column: String, operator: String },
    /// `$or` whose value is not an array of filter objects.
    MalformedOr,
    /// Sparse fieldset entry not declared on the model.
    UnknownField { type_name: String, field: String },
    /// Include token naming no relationship on the model.
    UnknownRelationship(String),
    /// Multi-level include path (`comments.author`).
    NestedInclude(String),
    /// Relationship whose related model is not registered.
    UnresolvedModel(String),
}

impl fmt::Display for Dropped {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dropped::UnknownColumn(column) => write!(f, "unknown filter column '{column}'"),
            Dropped::UnknownOperator { column, operator } => {
                write!(f, "unknown operator '{operator}' on column '{column}'")
            }
            Dropped::OperatorWithoutColumn(operator) => {
                write!(f, "operator '{operator}' has no column")
            }
            Dropped::InvalidValue { column, operator } => {
                write!(f, "invalid value for '{operator}' on column '{column}'")
            }
            Dropped::MalformedOr => write!(f, "'$or' requires an array of filters"),
            Dropped::UnknownField { type_name, field } => {
                write!(f, "unknown field '{field}' for type '{type_name}'")
            }
            Dropped::UnknownRelationship(name) => write!(f, "unknown relationship '{name}'"),
            Dropped::NestedInclude(path) => write!(f, "nested include '{path}' not supported"),
            Dropped::UnresolvedModel(name) => write!(f, "related model '{name}' not registered"),
        }
    }
}
