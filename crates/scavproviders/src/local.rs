use crate::docker::{ContainerRuntime, ContainerSpec};
use crate::worker::{WorkerEnv, DEFAULT_WORKER_IMAGE, WORKER_PORT};
use crate::{ProviderKind, ServiceProvider};
use async_trait::async_trait;
use scavcore::{ProviderError, Workflow, WorkflowStore};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Label every worker container carries
pub const OWNER_LABEL: &str = "app.scavenger";
pub const OWNER_LABEL_VALUE: &str = "workflow-worker";
/// Label holding the workflow name
pub const WORKFLOW_LABEL: &str = "app.scavenger.workflow";

#[derive(Debug, Clone)]
pub struct LocalConfig {
    pub image: String,
    pub gemini_api_key: String,
    pub stop_timeout_secs: i64,
    pub memory_bytes: i64,
}

impl Default for LocalConfig {
    fn default() -> Self {
        Self {
            image: DEFAULT_WORKER_IMAGE.to_string(),
            gemini_api_key: String::new(),
            stop_timeout_secs: 10,
            memory_bytes: 1536 * 1024 * 1024,
        }
    }
}

/// Backend that runs each worker as a container on the local Docker daemon.
///
/// Keeps an in-process map of workflow name to container id. The map is
/// seeded from the daemon on startup so a restart does not orphan workers
/// that are still running.
pub struct LocalProvider {
    config: LocalConfig,
    runtime: Arc<dyn ContainerRuntime>,
    store: Arc<dyn WorkflowStore>,
    running: Mutex<HashMap<String, String>>,
}

impl LocalProvider {
    /// Check the runtime is reachable and restore tracking of running workers
    pub async fn connect(
        config: LocalConfig,
        runtime: Arc<dyn ContainerRuntime>,
        store: Arc<dyn WorkflowStore>,
    ) -> Result<Self, ProviderError> {
        runtime.ping().await.map_err(|e| {
            tracing::error!(error = %e, "Failed to ping container runtime");
            e
        })?;
        tracing::info!("Connected to container runtime");

        let provider = Self {
            config,
            runtime,
            store,
            running: Mutex::new(HashMap::new()),
        };
        provider.restore_running().await;

        Ok(provider)
    }

    async fn restore_running(&self) {
        tracing::info!("Restoring running workflows from container runtime");

        let containers = match self.runtime.list_labelled(OWNER_LABEL).await {
            Ok(containers) => containers,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to list containers, no workflows restored");
                return;
            }
        };

        let mut running = self.running.lock().await;
        for container in containers {
            match container.labels.get(WORKFLOW_LABEL).filter(|n| !n.is_empty()) {
                Some(name) => {
                    tracing::info!(workflow = %name, container_id = %container.id, "Restored running workflow");
                    running.insert(name.clone(), container.id);
                }
                None => {
                    tracing::warn!(
                        container_id = %container.id,
                        labels = ?container.labels,
                        "Running container has our label but no workflow name"
                    );
                }
            }
        }
        tracing::info!(restored = running.len(), "Finished workflow restoration");
    }

    /// Names of the workflows with a tracked container
    pub async fn running_workflows(&self) -> Vec<String> {
        let mut names: Vec<_> = self.running.lock().await.keys().cloned().collect();
        names.sort();
        names
    }

    fn container_spec(&self, workflow: &Workflow) -> Result<ContainerSpec, ProviderError> {
        let env = WorkerEnv::for_workflow(workflow, &self.config.gemini_api_key)?.with_port(WORKER_PORT);

        let mut labels = HashMap::new();
        labels.insert(OWNER_LABEL.to_string(), OWNER_LABEL_VALUE.to_string());
        labels.insert(WORKFLOW_LABEL.to_string(), workflow.name.clone());

        Ok(ContainerSpec {
            name: format!("scavenger-workflow-{}", workflow.name.replace(' ', "-")),
            image: self.config.image.clone(),
            env: env.to_docker_env(),
            labels,
            exposed_port: exposed_port(),
            memory_bytes: self.config.memory_bytes,
        })
    }

    /// Start a container for `workflow` and persist the record. On any
    /// failure after the container exists, the container is removed again
    /// before the error is returned.
    async fn provision(&self, workflow: Workflow) -> Result<Workflow, ProviderError> {
        let spec = self.container_spec(&workflow)?;

        let id = self.runtime.create_container(&spec).await?;
        tracing::info!(workflow = %workflow.name, container = %spec.name, container_id = %id, "Container created");

        if let Err(e) = self.runtime.start_container(&id).await {
            tracing::error!(workflow = %workflow.name, container_id = %id, error = %e, "Failed to start container");
            self.rollback(&id, false).await;
            return Err(e);
        }
        tracing::info!(workflow = %workflow.name, container_id = %id, "Container started");

        let host_port = match self.runtime.host_port(&id, &spec.exposed_port).await {
            Ok(Some(port)) => port,
            Ok(None) => {
                tracing::error!(workflow = %workflow.name, container_id = %id, port = %spec.exposed_port, "Port binding not found");
                self.rollback(&id, true).await;
                return Err(ProviderError::MissingPortBinding { container_id: id });
            }
            Err(e) => {
                tracing::error!(workflow = %workflow.name, container_id = %id, error = %e, "Failed to inspect container");
                self.rollback(&id, true).await;
                return Err(e);
            }
        };

        let workflow = workflow.with_worker_address(format!("http://localhost:{}", host_port));

        if let Err(e) = self.store.insert_workflow(&workflow).await {
            tracing::error!(workflow = %workflow.name, container_id = %id, error = %e, "Failed to persist workflow after starting container");
            self.rollback(&id, true).await;
            return Err(ProviderError::Persistence {
                instance: id,
                source: e,
            });
        }

        self.running.lock().await.insert(workflow.name.clone(), id);

        Ok(workflow)
    }

    /// Best-effort stop and force removal; failures are only logged
    async fn rollback(&self, id: &str, stop_first: bool) {
        tracing::warn!(container_id = %id, "Rolling back container");

        if stop_first {
            if let Err(e) = self.runtime.stop_container(id, self.config.stop_timeout_secs).await {
                tracing::error!(container_id = %id, error = %e, "Failed to stop container during rollback");
            }
        }

        if let Err(e) = self.runtime.remove_container(id, false).await {
            tracing::error!(container_id = %id, error = %e, "Failed to remove container during rollback");
        }
    }
}

fn exposed_port() -> String {
    format!("{}/tcp", WORKER_PORT)
}

#[async_trait]
impl ServiceProvider for LocalProvider {
    async fn create_workflow(&self, workflow: Workflow) -> Result<Workflow, ProviderError> {
        if self.store.find_workflow(&workflow.name).await?.is_some() {
            return Err(ProviderError::AlreadyExists(workflow.name));
        }
        self.provision(workflow).await
    }

    async fn create_from_config(&self, workflow: Workflow) -> Result<(), ProviderError> {
        if self.store.find_workflow(&workflow.name).await?.is_some() {
            tracing::info!(workflow = %workflow.name, "Workflow already exists, skipping");
            return Ok(());
        }
        self.provision(workflow).await.map(|_| ())
    }

    async fn delete_workflow(&self, name: &str) -> Result<(), ProviderError> {
        let container_id = self.running.lock().await.get(name).cloned();

        match container_id {
            Some(id) => {
                tracing::info!(workflow = %name, container_id = %id, "Stopping container");
                match self.runtime.stop_container(&id, self.config.stop_timeout_secs).await {
                    Ok(()) => tracing::info!(container_id = %id, "Container stopped"),
                    Err(e) => tracing::error!(container_id = %id, error = %e, "Failed to stop container gracefully"),
                }

                match self.runtime.remove_container(&id, true).await {
                    Ok(()) => tracing::info!(container_id = %id, "Container removed"),
                    Err(e) => tracing::error!(container_id = %id, error = %e, "Failed to remove container"),
                }

                self.running.lock().await.remove(name);
            }
            None => {
                tracing::warn!(workflow = %name, "No running container tracked for workflow");
            }
        }

        if self.store.delete_workflow(name).await? {
            tracing::info!(workflow = %name, "Workflow record deleted");
        } else {
            tracing::warn!(workflow = %name, "Workflow record not found");
        }

        Ok(())
    }

    async fn running_count(&self) -> Result<usize, ProviderError> {
        Ok(self.running.lock().await.len())
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Local
    }
}
