use crate::{ExtractionSchema, SchemaField, ValidationError, Workflow};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Upper bound on the `numberFields` counter a form may claim
pub const MAX_FORM_FIELDS: usize = 256;

/// Build a workflow from the fields of a create form.
///
/// The form carries `numberFields` plus `fieldName_i`, `fieldType_i` and
/// `fieldDesc_i` for `i` in `0..=numberFields`. The counter never shrinks
/// when a field row is removed client-side, so any index with a blank
/// component is skipped rather than rejected.
pub fn parse_create_form(form: &HashMap<String, String>) -> Result<Workflow, ValidationError> {
    let get = |key: &str| form.get(key).map(|v| v.trim()).unwrap_or("");

    let name = get("name");
    if name.is_empty() {
        return Err(ValidationError::MissingField("name".to_string()));
    }

    let raw_count = get("numberFields");
    let field_count: usize = raw_count
        .parse()
        .map_err(|_| ValidationError::InvalidFieldCount(raw_count.to_string()))?;
    if field_count > MAX_FORM_FIELDS {
        return Err(ValidationError::InvalidFieldCount(raw_count.to_string()));
    }

    let mut schema = ExtractionSchema::new();
    for i in 0..=field_count {
        let field_name = get(&format!("fieldName_{}", i));
        let field_type = get(&format!("fieldType_{}", i));
        let field_desc = get(&format!("fieldDesc_{}", i));

        if field_name.is_empty() || field_type.is_empty() || field_desc.is_empty() {
            continue;
        }

        schema.insert_normalized(SchemaField::new(field_name, field_type, field_desc));
    }

    Ok(Workflow::new(
        name,
        get("website"),
        get("cron"),
        get("prompt"),
        schema,
        field_count,
    ))
}

/// One entry of the bootstrap configuration file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowDescriptor {
    pub name: String,
    #[serde(default)]
    pub prompt: String,
    #[serde(default)]
    pub cron: String,
    #[serde(default)]
    pub website: String,
    #[serde(default)]
    pub schema: BTreeMap<String, SchemaField>,
}

impl WorkflowDescriptor {
    /// Convert into an unprovisioned workflow. Schema keys are used as
    /// written, in sorted order.
    pub fn into_workflow(self) -> Result<Workflow, ValidationError> {
        if self.schema.is_empty() {
            return Err(ValidationError::EmptySchema);
        }

        let number_fields = self.schema.len();
        let mut schema = ExtractionSchema::new();
        for (key, field) in self.schema {
            schema.insert(key, field);
        }

        Ok(Workflow::new(
            &self.name,
            self.website,
            self.cron,
            self.prompt,
            schema,
            number_fields,
        ))
    }
}
