//! Model descriptor types.
//!
//! A [`ModelDescriptor`] is the read-only metadata record the engine consumes:
//! table name, primary key, declared attributes (in declaration order) and
//! relationship definitions. Descriptors are built once, shared behind an
//! `Arc`, and never mutated by a query.

use heck::ToSnakeCase;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

/// Declared attribute type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttributeType {
    String,
    #[default]
    Number,
    Boolean,
    Date,
    Object,
    Array,
}

/// A declared model attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    /// Declared type.
    pub ty: AttributeType,

    /// Database column backing the attribute.
    pub column: String,
}

impl Attribute {
    /// Attribute stored in the conventional column for `name`.
    pub fn new(name: &str, ty: AttributeType) -> Self {
        Self {
            ty,
            column: column_name(name),
        }
    }

    /// Attribute stored in an explicitly named column.
    pub fn with_column(ty: AttributeType, column: impl Into<String>) -> Self {
        Self {
            ty,
            column: column.into(),
        }
    }
}

/// Conventional database column for an attribute name (`myTitle` → `my_title`).
pub fn column_name(attribute: &str) -> String {
    attribute.to_snake_case()
}

/// Keys linking the owning model to the related one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationKeys {
    /// Name of the owning model.
    pub model_from: String,

    /// Name of the related model.
    pub model_to: String,

    /// Attribute on the owning row.
    pub key_from: String,

    /// Attribute on the related row used for grouping.
    pub key_to: String,
}

/// Relationship between two models.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Relationship {
    /// To-one: the owning row carries the foreign key (`key_from`).
    BelongsTo(RelationKeys),
    /// To-many: the related rows carry the foreign key (`key_to`).
    HasMany(RelationKeys),
}

impl Relationship {
    pub fn keys(&self) -> &RelationKeys {
        match self {
            Relationship::BelongsTo(keys) | Relationship::HasMany(keys) => keys,
        }
    }

    /// Whether the relationship resolves to a single row.
    pub fn is_singular(&self) -> bool {
        matches!(self, Relationship::BelongsTo(_))
    }
}

/// Read-only metadata describing one entity type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelDescriptor {
    /// Model name used for registry lookups (e.g. `post`).
    pub name: String,

    /// Resource type used to key sparse fieldsets (e.g. `posts`).
    pub type_name: String,

    /// Backing table.
    pub table_name: String,

    /// Primary key attribute.
    pub id_field: String,

    /// Declared attributes, in declaration order.
    pub attributes: IndexMap<String, Attribute>,

    /// Declared relationships by name.
    pub relationships: IndexMap<String, Relationship>,
}

impl ModelDescriptor {
    pub fn has_attribute(&self, name: &str) -> bool {
        self.attributes.contains_key(name)
    }

    /// Attribute names in declaration order.
    pub fn attribute_names(&self) -> impl Iterator<Item = &str> {
        self.attributes.keys().map(String::as_str)
    }

    /// Database column for `name`; undeclared names use the conventional mapping.
    pub fn column_for(&self, name: &str) -> String {
        self.attributes
            .get(name)
            .map(|attr| attr.column.clone())
            .unwrap_or_else(|| column_name(name))
    }

    pub fn relationship(&self, name: &str) -> Option<&Relationship> {
        self.relationships.get(name)
    }

    /// Re-key a row read by database column (e.g. from `RETURNING *`) by
    /// attribute name. Columns with no declared attribute are left out.
    pub fn attributes_from_columns(&self, row: &Map<String, JsonValue>) -> Map<String, JsonValue> {
        self.attributes
            .iter()
            .filter_map(|(name, attr)| Some((name.clone(), row.get(&attr.column)?.clone())))
            .collect()
    }
}
