use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const SCHEMA_TITLE: &str = "Generated Schema";
pub const SCHEMA_TYPE: &str = "object";

/// One named field the worker should extract
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaField {
    pub title: String,
    #[serde(rename = "type")]
    pub field_type: String,
    pub description: String,
}

impl SchemaField {
    pub fn new(
        title: impl Into<String>,
        field_type: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            field_type: field_type.into(),
            description: description.into(),
        }
    }
}

/// JSON-schema-shaped description of what a worker extracts.
///
/// `required` always lists every key of `properties` exactly once, in the
/// order the fields were added. The whole value is handed to the worker as
/// its `SCHEMA` environment variable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionSchema {
    pub properties: HashMap<String, SchemaField>,
    pub required: Vec<String>,
    pub title: String,
    #[serde(rename = "type")]
    pub schema_type: String,
}

impl ExtractionSchema {
    pub fn new() -> Self {
        Self {
            properties: HashMap::new(),
            required: Vec::new(),
            title: SCHEMA_TITLE.to_string(),
            schema_type: SCHEMA_TYPE.to_string(),
        }
    }

    /// Insert a field under `key` as given. A repeated key replaces the
    /// earlier field without duplicating it in `required`.
    pub fn insert(&mut self, key: impl Into<String>, field: SchemaField) {
        let key = key.into();
        if self.properties.insert(key.clone(), field).is_none() {
            self.required.push(key);
        }
    }

    /// Insert a field keyed by its normalized title.
    pub fn insert_normalized(&mut self, field: SchemaField) {
        let key = normalize_field_name(&field.title);
        self.insert(key, field);
    }

    pub fn len(&self) -> usize {
        self.properties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    /// Serialized form passed to the worker
    pub fn to_env_value(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

impl Default for ExtractionSchema {
    fn default() -> Self {
        Self::new()
    }
}

/// Lowercase, spaces become hyphens
pub fn normalize_field_name(name: &str) -> String {
    name.to_lowercase().replace(' ', "-")
}
