//! Filter translation.
//!
//! Filter documents are parsed into a [`FilterNode`] tree, then compiled
//! against a model into a [`crate::plan::Predicate`]. Unknown columns,
//! unknown operators and unusable values are dropped and reported.

mod operator;
mod parse;
mod translate;

pub use operator::OperatorKind;
pub(crate) use operator::literal;
pub use parse::{FilterNode, ParsedFilter, parse};
pub use translate::{Translation, translate};
