use async_trait::async_trait;
use bollard::container::{
    Config, CreateContainerOptions, InspectContainerOptions, ListContainersOptions,
    RemoveContainerOptions, StartContainerOptions, StopContainerOptions,
};
use bollard::models::{HostConfig, PortBinding};
use bollard::Docker;
use scavcore::ProviderError;
use std::collections::HashMap;

/// What the local backend needs to start one worker container
#[derive(Debug, Clone)]
pub struct ContainerSpec {
    pub name: String,
    pub image: String,
    pub env: Vec<String>,
    pub labels: HashMap<String, String>,
    /// Internal port in Docker's `port/proto` form, published on an ephemeral host port
    pub exposed_port: String,
    pub memory_bytes: i64,
}

/// A running container carrying our ownership label
#[derive(Debug, Clone)]
pub struct OwnedContainer {
    pub id: String,
    pub labels: HashMap<String, String>,
}

/// The slice of a container runtime the local backend drives
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    async fn ping(&self) -> Result<(), ProviderError>;

    /// Create a container and return its id
    async fn create_container(&self, spec: &ContainerSpec) -> Result<String, ProviderError>;

    async fn start_container(&self, id: &str) -> Result<(), ProviderError>;

    /// Inspect the container and return the host port bound to
    /// `exposed_port`, or `None` when no binding exists
    async fn host_port(&self, id: &str, exposed_port: &str) -> Result<Option<String>, ProviderError>;

    async fn stop_container(&self, id: &str, timeout_secs: i64) -> Result<(), ProviderError>;

    async fn remove_container(&self, id: &str, remove_volumes: bool) -> Result<(), ProviderError>;

    /// Running containers that carry `label`
    async fn list_labelled(&self, label: &str) -> Result<Vec<OwnedContainer>, ProviderError>;
}

/// Docker Engine API client
pub struct DockerRuntime {
    docker: Docker,
}

impl DockerRuntime {
    /// Connect using `DOCKER_HOST` or the platform's default socket
    pub fn connect() -> Result<Self, ProviderError> {
        let docker = Docker::connect_with_local_defaults().map_err(runtime_err)?;
        Ok(Self { docker })
    }

    pub fn from_client(docker: Docker) -> Self {
        Self { docker }
    }
}

fn runtime_err(e: bollard::errors::Error) -> ProviderError {
    ProviderError::Runtime(e.to_string())
}

#[async_trait]
impl ContainerRuntime for DockerRuntime {
    async fn ping(&self) -> Result<(), ProviderError> {
        self.docker.ping().await.map_err(runtime_err)?;
        Ok(())
    }

    async fn create_container(&self, spec: &ContainerSpec) -> Result<String, ProviderError> {
        let mut port_bindings = HashMap::new();
        port_bindings.insert(
            spec.exposed_port.clone(),
            Some(vec![PortBinding {
                host_ip: Some("0.0.0.0".to_string()),
                host_port: Some(String::new()),
            }]),
        );

        let mut exposed_ports = HashMap::new();
        exposed_ports.insert(spec.exposed_port.clone(), HashMap::new());

        let host_config = HostConfig {
            port_bindings: Some(port_bindings),
            memory: Some(spec.memory_bytes),
            ..Default::default()
        };

        let config = Config {
            image: Some(spec.image.clone()),
            env: Some(spec.env.clone()),
            exposed_ports: Some(exposed_ports),
            labels: Some(spec.labels.clone()),
            host_config: Some(host_config),
            ..Default::default()
        };

        let options = CreateContainerOptions {
            name: spec.name.clone(),
            ..Default::default()
        };

        let response = self
            .docker
            .create_container(Some(options), config)
            .await
            .map_err(runtime_err)?;

        for warning in &response.warnings {
            tracing::warn!(container_id = %response.id, warning = %warning, "Docker create warning");
        }

        Ok(response.id)
    }

    async fn start_container(&self, id: &str) -> Result<(), ProviderError> {
        self.docker
            .start_container(id, None::<StartContainerOptions<String>>)
            .await
            .map_err(runtime_err)
    }

    async fn host_port(&self, id: &str, exposed_port: &str) -> Result<Option<String>, ProviderError> {
        let inspect = self
            .docker
            .inspect_container(id, None::<InspectContainerOptions>)
            .await
            .map_err(runtime_err)?;

        let port = inspect
            .network_settings
            .and_then(|settings| settings.ports)
            .and_then(|mut ports| ports.remove(exposed_port))
            .flatten()
            .and_then(|bindings| bindings.into_iter().find_map(|b| b.host_port))
            .filter(|port| !port.is_empty());

        Ok(port)
    }

    async fn stop_container(&self, id: &str, timeout_secs: i64) -> Result<(), ProviderError> {
        self.docker
            .stop_container(id, Some(StopContainerOptions { t: timeout_secs }))
            .await
            .map_err(runtime_err)
    }

    async fn remove_container(&self, id: &str, remove_volumes: bool) -> Result<(), ProviderError> {
        self.docker
            .remove_container(
                id,
                Some(RemoveContainerOptions {
                    force: true,
                    v: remove_volumes,
                    ..Default::default()
                }),
            )
            .await
            .map_err(runtime_err)
    }

    async fn list_labelled(&self, label: &str) -> Result<Vec<OwnedContainer>, ProviderError> {
        let mut filters = HashMap::new();
        filters.insert("status".to_string(), vec!["running".to_string()]);
        filters.insert("label".to_string(), vec![label.to_string()]);

        let containers = self
            .docker
            .list_containers(Some(ListContainersOptions {
                all: false,
                filters,
                ..Default::default()
            }))
            .await
            .map_err(runtime_err)?;

        Ok(containers
            .into_iter()
            .filter_map(|c| {
                Some(OwnedContainer {
                    id: c.id?,
                    labels: c.labels.unwrap_or_default(),
                })
            })
            .collect())
    }
}
