//! Model registry: resolves model names to shared descriptors.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use super::builder::{ModelBuilder, RegistryBuilder, SchemaFile};
use super::types::ModelDescriptor;
use crate::error::SchemaError;

/// Read-only lookup of model descriptors by name.
#[derive(Debug, Clone, Default)]
pub struct ModelRegistry {
    models: HashMap<String, Arc<ModelDescriptor>>,
}

impl ModelRegistry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    pub(crate) fn from_models(models: HashMap<String, Arc<ModelDescriptor>>) -> Self {
        Self { models }
    }

    /// Build a registry from a parsed schema document.
    pub fn from_schema(schema: SchemaFile) -> Result<Self, SchemaError> {
        schema
            .models
            .into_iter()
            .map(ModelBuilder::from)
            .fold(RegistryBuilder::new(), RegistryBuilder::model)
            .build()
    }

    /// Load a schema document; `.toml` files are parsed as TOML, anything else as JSON.
    pub fn load(path: &Path) -> Result<Self, SchemaError> {
        let raw = std::fs::read_to_string(path)?;
        let schema: SchemaFile = if path.extension().is_some_and(|ext| ext == "toml") {
            toml::from_str(&raw).map_err(|e| SchemaError::Parse(e.to_string()))?
        } else {
            serde_json::from_str(&raw).map_err(|e| SchemaError::Parse(e.to_string()))?
        };
        Self::from_schema(schema)
    }

    /// Look up a model by name.
    pub fn model(&self, name: &str) -> Option<Arc<ModelDescriptor>> {
        self.models.get(name).cloned()
    }

    /// All registered models.
    pub fn models(&self) -> impl Iterator<Item = &Arc<ModelDescriptor>> {
        self.models.values()
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}
