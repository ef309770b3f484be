//! Model metadata consumed by the query engine.
//!
//! This module provides:
//! - ModelDescriptor: table, primary key, attributes and relationships
//! - ModelRegistry: name → descriptor lookup
//! - ModelBuilder / RegistryBuilder: declarations with conventional defaults
//! - SchemaFile: TOML/JSON schema documents

mod builder;
mod registry;
mod types;

pub use builder::{
    AttributeSchema, ModelBuilder, ModelSchema, RegistryBuilder, RelationKind, RelationOptions,
    RelationSchema, SchemaFile,
};
pub use registry::ModelRegistry;
pub use types::{
    Attribute, AttributeType, ModelDescriptor, RelationKeys, Relationship, column_name,
};
