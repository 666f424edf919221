//! Core abstractions for scavenger
//!
//! This crate provides the workflow data model, the record store seam and
//! the shared liveness counters that the provider backends, the relay and
//! the server all depend on. It knows nothing about containers or sockets.

mod apikey;
mod counters;
mod error;
mod form;
mod schema;
mod store;
mod workflow;

pub use apikey::{generate_token, hash_token, ApiKey, ApiKeyVerifier};
pub use counters::{ConnectionGuard, CountersSnapshot, LivenessCounters};
pub use error::{ProviderError, RelayError, ScavengerError, StoreError, ValidationError};
pub use form::{parse_create_form, WorkflowDescriptor};
pub use schema::{normalize_field_name, ExtractionSchema, SchemaField};
pub use store::{ApiKeyStore, JsonFileStore, MemoryStore, WorkflowStore};
pub use workflow::{normalize_workflow_name, Workflow, WorkflowRequest};

/// Result type for scavenger operations
pub type Result<T> = std::result::Result<T, ScavengerError>;
