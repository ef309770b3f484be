//! Sparse fieldsets.

use super::Projection;
use crate::dropped::Dropped;
use crate::model::ModelDescriptor;

/// Attributes to project for one model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSelection {
    /// Attribute names, in declaration order; always contains the id field.
    pub fields: Vec<String>,
    pub dropped: Vec<Dropped>,
}

/// Resolve a comma-separated fieldset against `model`.
///
/// Without a fieldset (or with a blank one) every declared attribute is
/// selected. Otherwise the result keeps the model's declaration order, not
/// the requested order, and the id field is appended when it was not asked
/// for.
pub fn select_fields(model: &ModelDescriptor, spec: Option<&str>) -> FieldSelection {
    let requested: Vec<&str> = spec
        .map(|spec| {
            spec.split(',')
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .collect()
        })
        .unwrap_or_default();

    if requested.is_empty() {
        return FieldSelection {
            fields: model.attribute_names().map(str::to_string).collect(),
            dropped: Vec::new(),
        };
    }

    let dropped = requested
        .iter()
        .filter(|name| !model.has_attribute(name))
        .map(|name| Dropped::UnknownField {
            type_name: model.type_name.clone(),
            field: name.to_string(),
        })
        .collect();

    let mut fields: Vec<String> = model
        .attribute_names()
        .filter(|name| requested.contains(name))
        .map(str::to_string)
        .collect();
    if !fields.contains(&model.id_field) {
        fields.push(model.id_field.clone());
    }

    FieldSelection { fields, dropped }
}

/// Projections for `fields`, each returned under its attribute name.
pub fn projection(model: &ModelDescriptor, fields: &[String]) -> Vec<Projection> {
    fields
        .iter()
        .map(|field| Projection::new(model.column_for(field), field.clone()))
        .collect()
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AttributeType, ModelBuilder, ModelRegistry};
    use std::sync::Arc;

    fn post() -> Arc<ModelDescriptor> {
        ModelRegistry::builder()
            .model(
                ModelBuilder::new("post")
                    .attr("title", AttributeType::String)
                    .attr("description", AttributeType::String)
                    .attr("createdAt", AttributeType::Date),
            )
            .build()
            .unwrap()
            .model("post")
            .unwrap()
    }

    #[test]
    fn no_spec_selects_all_in_declared_order() {
        let selection = select_fields(&post(), None);
        assert_eq!(selection.fields, ["id", "title", "description", "createdAt"]);
        assert_eq!(select_fields(&post(), Some("  ")).fields.len(), 4);
    }

    #[test]
    fn declared_order_wins_and_id_is_appended() {
        let selection = select_fields(&post(), Some(" createdAt , title"));
        assert_eq!(selection.fields, ["title", "createdAt", "id"]);
        assert!(selection.dropped.is_empty());
    }

    #[test]
    fn requested_id_is_not_duplicated() {
        let selection = select_fields(&post(), Some("title,id"));
        assert_eq!(selection.fields, ["id", "title"]);
    }

    #[test]
    fn unknown_fields_are_dropped() {
        let selection = select_fields(&post(), Some("title,secret"));
        assert_eq!(selection.fields, ["title", "id"]);
        assert_eq!(
            selection.dropped,
            vec![Dropped::UnknownField {
                type_name: "posts".to_string(),
                field: "secret".to_string(),
            }]
        );
    }

    #[test]
    fn projection_maps_columns() {
        let fields = vec!["id".to_string(), "createdAt".to_string()];
        assert_eq!(
            projection(&post(), &fields),
            vec![
                Projection::new("id", "id"),
                Projection::new("created_at", "createdAt"),
            ]
        );
    }
}
