use crate::ExtractionSchema;
use serde::{Deserialize, Serialize};

/// The persisted record of a workflow and the worker backing it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workflow {
    pub name: String,
    /// Base URI of the running worker, empty until a backend assigns it
    #[serde(default)]
    pub worker_address: String,
    pub prompt: String,
    pub cron: String,
    pub schema: ExtractionSchema,
    pub request: WorkflowRequest,
}

/// The inputs a workflow was created from
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WorkflowRequest {
    pub workflow_name: String,
    pub website: String,
    pub cron: String,
    pub prompt: String,
    pub number_fields: usize,
}

impl Workflow {
    /// Build an unprovisioned workflow. The name is normalized here so every
    /// entry point agrees on the record key.
    pub fn new(
        name: &str,
        website: impl Into<String>,
        cron: impl Into<String>,
        prompt: impl Into<String>,
        schema: ExtractionSchema,
        number_fields: usize,
    ) -> Self {
        let name = normalize_workflow_name(name);
        let cron = cron.into();
        let prompt = prompt.into();
        Self {
            request: WorkflowRequest {
                workflow_name: name.clone(),
                website: website.into(),
                cron: cron.clone(),
                prompt: prompt.clone(),
                number_fields,
            },
            name,
            worker_address: String::new(),
            prompt,
            cron,
            schema,
        }
    }

    pub fn website(&self) -> &str {
        &self.request.website
    }

    pub fn with_worker_address(mut self, address: impl Into<String>) -> Self {
        self.worker_address = address.into();
        self
    }

    pub fn is_provisioned(&self) -> bool {
        !self.worker_address.is_empty()
    }
}

/// Lowercase, spaces become underscores
pub fn normalize_workflow_name(name: &str) -> String {
    name.to_lowercase().replace(' ', "_")
}
