//! Sort strings to ORDER BY keys.

use super::{SortDirection, SortKey};
use crate::model::ModelDescriptor;

/// Parse `"-title,id"` style sort strings.
///
/// Tokens are trimmed; a leading `-` means descending. Names are mapped to
/// columns but not checked against the model's attributes.
pub fn parse_sort(model: &ModelDescriptor, spec: &str) -> Vec<SortKey> {
    spec.split(',')
        .map(str::trim)
        .filter_map(|token| {
            let (name, direction) = match token.strip_prefix('-') {
                Some(name) => (name.trim(), SortDirection::Desc),
                None => (token, SortDirection::Asc),
            };
            (!name.is_empty()).then(|| SortKey {
                column: model.column_for(name),
                direction,
            })
        })
        .collect()
}
