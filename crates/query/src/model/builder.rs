//! Model declaration and registry assembly.
//!
//! Relationship names and keys follow the usual conventions unless given
//! explicitly:
//! - `has_many("comment")` on `post` is named `comments`, keyed
//!   `post.id` → `comment.postId`;
//! - `belongs_to("author")` on `post` is named `author`, keyed
//!   `post.authorId` → `author.id`.
//!
//! Key attributes introduced by a relationship are declared on the model that
//! carries them when they were not declared explicitly.

use std::collections::HashMap;
use std::sync::Arc;

use heck::{ToLowerCamelCase, ToSnakeCase};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::registry::ModelRegistry;
use super::types::{Attribute, AttributeType, ModelDescriptor, RelationKeys, Relationship};
use crate::error::SchemaError;

/// Relationship flavour in a declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RelationKind {
    BelongsTo,
    HasMany,
}

/// Overrides for a declared relationship.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationOptions {
    pub name: Option<String>,
    pub key_from: Option<String>,
    pub key_to: Option<String>,
}

impl RelationOptions {
    fn is_explicit(&self) -> bool {
        self.name.is_some() && self.key_from.is_some() && self.key_to.is_some()
    }
}

#[derive(Debug, Clone)]
struct RelationDecl {
    kind: RelationKind,
    model: String,
    options: RelationOptions,
}

/// Declares one model.
#[derive(Debug, Clone)]
pub struct ModelBuilder {
    name: String,
    type_name: Option<String>,
    table_name: Option<String>,
    id_field: String,
    attributes: IndexMap<String, Attribute>,
    relations: Vec<RelationDecl>,
}

impl ModelBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: None,
            table_name: None,
            id_field: "id".to_string(),
            attributes: IndexMap::new(),
            relations: Vec::new(),
        }
    }

    /// Override the resource type (defaults to the plural model name).
    pub fn type_name(mut self, type_name: impl Into<String>) -> Self {
        self.type_name = Some(type_name.into());
        self
    }

    /// Override the table (defaults to the plural model name).
    pub fn table_name(mut self, table_name: impl Into<String>) -> Self {
        self.table_name = Some(table_name.into());
        self
    }

    /// Override the primary key attribute (defaults to `id`).
    pub fn id_field(mut self, id_field: impl Into<String>) -> Self {
        self.id_field = id_field.into();
        self
    }

    /// Declare an attribute stored in its conventional column.
    pub fn attr(mut self, name: &str, ty: AttributeType) -> Self {
        self.attributes
            .insert(name.to_string(), Attribute::new(name, ty));
        self
    }

    /// Declare an attribute stored in an explicit column.
    pub fn attr_in_column(mut self, name: &str, ty: AttributeType, column: &str) -> Self {
        self.attributes
            .insert(name.to_string(), Attribute::with_column(ty, column));
        self
    }

    pub fn has_many(self, model: impl Into<String>) -> Self {
        self.has_many_with(model, RelationOptions::default())
    }

    pub fn has_many_with(mut self, model: impl Into<String>, options: RelationOptions) -> Self {
        self.relations.push(RelationDecl {
            kind: RelationKind::HasMany,
            model: model.into(),
            options,
        });
        self
    }

    pub fn belongs_to(self, model: impl Into<String>) -> Self {
        self.belongs_to_with(model, RelationOptions::default())
    }

    pub fn belongs_to_with(mut self, model: impl Into<String>, options: RelationOptions) -> Self {
        self.relations.push(RelationDecl {
            kind: RelationKind::BelongsTo,
            model: model.into(),
            options,
        });
        self
    }

    fn descriptor(&self) -> ModelDescriptor {
        let plural = pluralizer::pluralize(&self.name.to_snake_case(), 2, false);
        let mut attributes = self.attributes.clone();
        if !attributes.contains_key(&self.id_field) {
            attributes.shift_insert(
                0,
                self.id_field.clone(),
                Attribute::new(&self.id_field, AttributeType::Number),
            );
        }

        ModelDescriptor {
            name: self.name.clone(),
            type_name: self.type_name.clone().unwrap_or_else(|| plural.clone()),
            table_name: self.table_name.clone().unwrap_or(plural),
            id_field: self.id_field.clone(),
            attributes,
            relationships: IndexMap::new(),
        }
    }
}

/// Collects model declarations and resolves them into a [`ModelRegistry`].
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    models: Vec<ModelBuilder>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn model(mut self, model: ModelBuilder) -> Self {
        self.models.push(model);
        self
    }

    /// Resolve relationship defaults and build the registry.
    pub fn build(self) -> Result<ModelRegistry, SchemaError> {
        let mut descriptors: IndexMap<String, ModelDescriptor> = IndexMap::new();
        for model in &self.models {
            if descriptors.contains_key(&model.name) {
                return Err(SchemaError::DuplicateModel(model.name.clone()));
            }
            descriptors.insert(model.name.clone(), model.descriptor());
        }

        // (model, relationship name, relationship)
        let mut resolved = Vec::new();
        // (model, attribute) pairs implied by relationship keys
        let mut implied = Vec::new();

        for model in &self.models {
            for decl in &model.relations {
                let related = descriptors.get(&decl.model);
                if related.is_none() && !decl.options.is_explicit() {
                    return Err(SchemaError::UnknownModel {
                        model: model.name.clone(),
                        related: decl.model.clone(),
                    });
                }
                let (name, relationship) = resolve_relation(model, decl, related);

                match &relationship {
                    Relationship::BelongsTo(keys) => {
                        implied.push((model.name.clone(), keys.key_from.clone()));
                    }
                    Relationship::HasMany(keys) => {
                        implied.push((keys.model_to.clone(), keys.key_to.clone()));
                    }
                }
                resolved.push((model.name.clone(), name, relationship));
            }
        }

        for (model, name, relationship) in resolved {
            if let Some(descriptor) = descriptors.get_mut(&model) {
                descriptor.relationships.insert(name, relationship);
            }
        }

        for (model, attribute) in implied {
            if let Some(descriptor) = descriptors.get_mut(&model) {
                descriptor
                    .attributes
                    .entry(attribute.clone())
                    .or_insert_with(|| Attribute::new(&attribute, AttributeType::Number));
            }
        }

        let models: HashMap<String, Arc<ModelDescriptor>> = descriptors
            .into_iter()
            .map(|(name, descriptor)| (name, Arc::new(descriptor)))
            .collect();

        Ok(ModelRegistry::from_models(models))
    }
}

fn resolve_relation(
    model: &ModelBuilder,
    decl: &RelationDecl,
    related: Option<&ModelDescriptor>,
) -> (String, Relationship) {
    let options = &decl.options;
    let related_type = related
        .map(|r| r.type_name.clone())
        .unwrap_or_else(|| decl.model.clone());
    let related_id = related
        .map(|r| r.id_field.clone())
        .unwrap_or_else(|| "id".to_string());

    match decl.kind {
        RelationKind::HasMany => {
            let name = options
                .name
                .clone()
                .unwrap_or_else(|| related_type.to_lower_camel_case());
            let keys = RelationKeys {
                model_from: model.name.clone(),
                model_to: decl.model.clone(),
                key_from: options
                    .key_from
                    .clone()
                    .unwrap_or_else(|| model.id_field.to_lower_camel_case()),
                key_to: options
                    .key_to
                    .clone()
                    .unwrap_or_else(|| format!("{}Id", model.name.to_lower_camel_case())),
            };
            (name, Relationship::HasMany(keys))
        }
        RelationKind::BelongsTo => {
            let name = options
                .name
                .clone()
                .unwrap_or_else(|| decl.model.to_lower_camel_case());
            let keys = RelationKeys {
                model_from: model.name.clone(),
                model_to: decl.model.clone(),
                key_from: options
                    .key_from
                    .clone()
                    .unwrap_or_else(|| format!("{}Id", decl.model.to_lower_camel_case())),
                key_to: options
                    .key_to
                    .clone()
                    .unwrap_or_else(|| related_id.to_lower_camel_case()),
            };
            (name, Relationship::BelongsTo(keys))
        }
    }
}

// ---------------------------------------------------------------------------
// Schema documents
// ---------------------------------------------------------------------------

/// Schema document listing model declarations (TOML or JSON).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchemaFile {
    #[serde(default)]
    pub models: Vec<ModelSchema>,
}

/// One model in a schema document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelSchema {
    pub name: String,

    #[serde(rename = "type")]
    pub type_name: Option<String>,

    pub table: Option<String>,

    pub id_field: Option<String>,

    #[serde(default)]
    pub attributes: Vec<AttributeSchema>,

    #[serde(default)]
    pub relationships: Vec<RelationSchema>,
}

/// One attribute in a schema document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttributeSchema {
    pub name: String,

    #[serde(rename = "type", default)]
    pub ty: AttributeType,

    pub column: Option<String>,
}

/// One relationship in a schema document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationSchema {
    pub kind: RelationKind,

    pub model: String,

    #[serde(flatten)]
    pub options: RelationOptions,
}

impl From<ModelSchema> for ModelBuilder {
    fn from(schema: ModelSchema) -> Self {
        let mut builder = ModelBuilder::new(schema.name);
        if let Some(type_name) = schema.type_name {
            builder = builder.type_name(type_name);
        }
        if let Some(table) = schema.table {
            builder = builder.table_name(table);
        }
        if let Some(id_field) = schema.id_field {
            builder = builder.id_field(id_field);
        }
        for attr in schema.attributes {
            builder = match attr.column {
                Some(column) => builder.attr_in_column(&attr.name, attr.ty, &column),
                None => builder.attr(&attr.name, attr.ty),
            };
        }
        for rel in schema.relationships {
            builder = match rel.kind {
                RelationKind::HasMany => builder.has_many_with(rel.model, rel.options),
                RelationKind::BelongsTo => builder.belongs_to_with(rel.model, rel.options),
            };
        }
        builder
    }
}
