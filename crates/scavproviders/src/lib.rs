//! Provider backends
//!
//! A provider turns a workflow description into a running worker and
//! keeps the record store in step with it. Two backends exist: `local`
//! drives a Docker daemon and `cloud` drives Cloud Run. The process picks
//! one at startup and talks to it only through [`ServiceProvider`].

mod cloud;
mod cloudrun;
mod docker;
mod local;
mod service_id;
mod worker;

pub use cloud::{CloudConfig, CloudProvider};
pub use cloudrun::{
    Binding, CloudRunClient, ControlPlane, IamPolicy, Operation, OperationStatus, ServiceSpec,
    ServiceSummary, TokenSource,
};
pub use docker::{ContainerRuntime, ContainerSpec, DockerRuntime, OwnedContainer};
pub use local::{LocalConfig, LocalProvider};
pub use service_id::{generate_service_id, MAX_SERVICE_ID_LENGTH, MIN_SERVICE_ID_LENGTH};
pub use worker::{WorkerEnv, DEFAULT_WORKER_IMAGE, WORKER_HEALTH_PATH, WORKER_PORT};

use async_trait::async_trait;
use scavcore::{ProviderError, Workflow};
use std::str::FromStr;

/// The operations every backend supports
#[async_trait]
pub trait ServiceProvider: Send + Sync {
    /// Start a worker for an operator-submitted workflow and persist its
    /// record. Returns the stored record with its worker address.
    async fn create_workflow(&self, workflow: Workflow) -> Result<Workflow, ProviderError>;

    /// Same as `create_workflow` for a bootstrap descriptor. A workflow that
    /// already exists is left alone.
    async fn create_from_config(&self, workflow: Workflow) -> Result<(), ProviderError>;

    /// Tear down the worker, if any, and remove the record
    async fn delete_workflow(&self, name: &str) -> Result<(), ProviderError>;

    /// Number of workers the backend currently knows about
    async fn running_count(&self) -> Result<usize, ProviderError>;

    fn kind(&self) -> ProviderKind;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    Local,
    Cloud,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Cloud => "cloud",
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "cloud" | "gcp" => Ok(Self::Cloud),
            other => Err(format!("unknown provider {:?}, expected \"local\" or \"cloud\"", other)),
        }
    }
}

/// The backend selected for this process
pub enum Provider {
    Local(LocalProvider),
    Cloud(CloudProvider),
}

#[async_trait]
impl ServiceProvider for Provider {
    async fn create_workflow(&self, workflow: Workflow) -> Result<Workflow, ProviderError> {
        match self {
            Self::Local(p) => p.create_workflow(workflow).await,
            Self::Cloud(p) => p.create_workflow(workflow).await,
        }
    }

    async fn create_from_config(&self, workflow: Workflow) -> Result<(), ProviderError> {
        match self {
            Self::Local(p) => p.create_from_config(workflow).await,
            Self::Cloud(p) => p.create_from_config(workflow).await,
        }
    }

    async fn delete_workflow(&self, name: &str) -> Result<(), ProviderError> {
        match self {
            Self::Local(p) => p.delete_workflow(name).await,
            Self::Cloud(p) => p.delete_workflow(name).await,
        }
    }

    async fn running_count(&self) -> Result<usize, ProviderError> {
        match self {
            Self::Local(p) => p.running_count().await,
            Self::Cloud(p) => p.running_count().await,
        }
    }

    fn kind(&self) -> ProviderKind {
        match self {
            Self::Local(_) => ProviderKind::Local,
            Self::Cloud(_) => ProviderKind::Cloud,
        }
    }
}
