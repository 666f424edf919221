use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScavengerError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Relay error: {0}")]
    Relay(#[from] RelayError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Rejected input. The message is safe to show to the caller.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("missing required field: {0}")]
    MissingField(String),

    #[error("invalid field count: {0:?}")]
    InvalidFieldCount(String),

    #[error("workflow has no schema fields")]
    EmptySchema,
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Workflow already exists: {0}")]
    Duplicate(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Workflow already exists: {0}")]
    AlreadyExists(String),

    #[error("Container runtime error: {0}")]
    Runtime(String),

    #[error("Cloud control plane error: {0}")]
    ControlPlane(String),

    #[error("Port binding not found for container {container_id}")]
    MissingPortBinding { container_id: String },

    #[error("Failed to persist workflow after provisioning {instance}: {source}")]
    Persistence {
        instance: String,
        #[source]
        source: StoreError,
    },

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum RelayError {
    #[error("Workflow not found: {0}")]
    WorkflowNotFound(String),

    #[error("Workflow {0} has no worker address")]
    NoWorkerAddress(String),

    #[error("Invalid worker address {address:?}: {reason}")]
    InvalidAddress { address: String, reason: String },

    #[error("Failed to dial worker at {url}: {reason}")]
    Dial { url: String, reason: String },

    #[error("Socket error: {0}")]
    Socket(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}
