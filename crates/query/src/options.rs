//! Per-request query options.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Page descriptor. Zero or missing values fall back to the defaults
/// (number 0, size 20).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    #[serde(default)]
    pub number: Option<u32>,
    #[serde(default)]
    pub size: Option<u32>,
}

impl Page {
    pub fn new(number: u32, size: u32) -> Self {
        Self {
            number: Some(number),
            size: Some(size),
        }
    }
}

/// Options for one query: filter, sparse fieldsets, sort, page and include.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryOptions {
    /// Filter document (`{"title": {"$ilike": "%x%"}}`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<JsonValue>,

    /// Comma-separated attribute lists keyed by resource type.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub fields: HashMap<String, String>,

    /// Comma-separated sort keys, `-` prefix for descending.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<Page>,

    /// Comma-separated relationship names (one level).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include: Option<String>,
}

impl QueryOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, filter: JsonValue) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn fields(mut self, type_name: impl Into<String>, fields: impl Into<String>) -> Self {
        self.fields.insert(type_name.into(), fields.into());
        self
    }

    pub fn sort(mut self, sort: impl Into<String>) -> Self {
        self.sort = Some(sort.into());
        self
    }

    pub fn page(mut self, number: u32, size: u32) -> Self {
        self.page = Some(Page::new(number, size));
        self
    }

    pub fn include(mut self, include: impl Into<String>) -> Self {
        self.include = Some(include.into());
        self
    }
}
