use async_trait::async_trait;
use scavcore::{LivenessCounters, MemoryStore, ProviderError};
use scavproviders::{ContainerRuntime, ContainerSpec, LocalConfig, LocalProvider, OwnedContainer};
use scavserver::AppState;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Container runtime that keeps containers in memory. Images listed in
/// `failing_images` fail to start.
#[derive(Default)]
pub struct FakeRuntime {
    next_port: Mutex<u16>,
    pub containers: Mutex<HashMap<String, ContainerSpec>>,
    pub failing_images: Vec<String>,
}

impl FakeRuntime {
    pub fn new() -> Self {
        Self {
            next_port: Mutex::new(32768),
            ..Default::default()
        }
    }

    pub fn container_count(&self) -> usize {
        self.containers.lock().unwrap().len()
    }
}

#[async_trait]
impl ContainerRuntime for FakeRuntime {
    async fn ping(&self) -> Result<(), ProviderError> {
        Ok(())
    }

    async fn create_container(&self, spec: &ContainerSpec) -> Result<String, ProviderError> {
        let mut port = self.next_port.lock().unwrap();
        let id = format!("c{}", *port);
        *port += 1;
        self.containers.lock().unwrap().insert(id.clone(), spec.clone());
        Ok(id)
    }

    async fn start_container(&self, id: &str) -> Result<(), ProviderError> {
        let containers = self.containers.lock().unwrap();
        match containers.get(id) {
            Some(spec) if self.failing_images.contains(&spec.image) => {
                Err(ProviderError::Runtime("image pull failed".to_string()))
            }
            Some(_) => Ok(()),
            None => Err(ProviderError::Runtime(format!("no such container {}", id))),
        }
    }

    async fn host_port(&self, id: &str, _exposed_port: &str) -> Result<Option<String>, ProviderError> {
        Ok(id.strip_prefix('c').map(str::to_string))
    }

    async fn stop_container(&self, _id: &str, _timeout_secs: i64) -> Result<(), ProviderError> {
        Ok(())
    }

    async fn remove_container(&self, id: &str, _remove_volumes: bool) -> Result<(), ProviderError> {
        self.containers.lock().unwrap().remove(id);
        Ok(())
    }

    async fn list_labelled(&self, _label: &str) -> Result<Vec<OwnedContainer>, ProviderError> {
        Ok(Vec::new())
    }
}

pub struct TestContext {
    pub runtime: Arc<FakeRuntime>,
    pub store: Arc<MemoryStore>,
    pub counters: Arc<LivenessCounters>,
    pub provider: Arc<LocalProvider>,
}

impl TestContext {
    pub async fn new() -> Self {
        Self::with_runtime(FakeRuntime::new()).await
    }

    pub async fn with_runtime(runtime: FakeRuntime) -> Self {
        let runtime = Arc::new(runtime);
        let store = Arc::new(MemoryStore::new());
        let provider = LocalProvider::connect(LocalConfig::default(), runtime.clone(), store.clone())
            .await
            .unwrap();

        Self {
            runtime,
            store,
            counters: Arc::new(LivenessCounters::new()),
            provider: Arc::new(provider),
        }
    }

    pub fn state(&self, admin_token: Option<&str>) -> AppState {
        AppState::new(
            self.provider.clone(),
            self.store.clone(),
            self.store.clone(),
            self.counters.clone(),
            admin_token.map(str::to_string),
        )
    }
}
