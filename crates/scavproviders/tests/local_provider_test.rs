// crates/scavproviders/tests/local_provider_test.rs

use async_trait::async_trait;
use scavcore::{
    ExtractionSchema, MemoryStore, ProviderError, SchemaField, StoreError, Workflow, WorkflowStore,
};
use scavproviders::{
    ContainerRuntime, ContainerSpec, LocalConfig, LocalProvider, OwnedContainer, ServiceProvider,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct FakeState {
    next_port: u16,
    containers: HashMap<String, FakeContainer>,
    preexisting: Vec<OwnedContainer>,
    ping_fails: bool,
    start_fails: bool,
    inspect_fails: bool,
    no_binding: bool,
    stop_fails: bool,
    stopped: Vec<String>,
}

struct FakeContainer {
    spec: ContainerSpec,
    running: bool,
    host_port: String,
}

/// In-memory stand-in for the Docker daemon
#[derive(Default)]
struct FakeRuntime {
    state: Mutex<FakeState>,
}

impl FakeRuntime {
    fn new() -> Arc<Self> {
        let runtime = Self::default();
        runtime.state.lock().unwrap().next_port = 49153;
        Arc::new(runtime)
    }

    fn with<F: FnOnce(&mut FakeState)>(self: &Arc<Self>, f: F) -> Arc<Self> {
        f(&mut self.state.lock().unwrap());
        Arc::clone(self)
    }

    fn container_count(&self) -> usize {
        self.state.lock().unwrap().containers.len()
    }

    fn running_with_port(&self, port: &str) -> bool {
        self.state
            .lock()
            .unwrap()
            .containers
            .values()
            .any(|c| c.running && c.host_port == port)
    }

    fn spec_for(&self, workflow: &str) -> Option<ContainerSpec> {
        self.state
            .lock()
            .unwrap()
            .containers
            .values()
            .find(|c| c.spec.labels.get("app.scavenger.workflow").map(String::as_str) == Some(workflow))
            .map(|c| c.spec.clone())
    }
}

#[async_trait]
impl ContainerRuntime for FakeRuntime {
    async fn ping(&self) -> Result<(), ProviderError> {
        if self.state.lock().unwrap().ping_fails {
            return Err(ProviderError::Runtime("daemon unreachable".to_string()));
        }
        Ok(())
    }

    async fn create_container(&self, spec: &ContainerSpec) -> Result<String, ProviderError> {
        let mut state = self.state.lock().unwrap();
        if state.containers.values().any(|c| c.spec.name == spec.name) {
            return Err(ProviderError::Runtime(format!("name {} in use", spec.name)));
        }
        let id = format!("container-{}", state.next_port);
        let host_port = state.next_port.to_string();
        state.next_port += 1;
        state.containers.insert(
            id.clone(),
            FakeContainer {
                spec: spec.clone(),
                running: false,
                host_port,
            },
        );
        Ok(id)
    }

    async fn start_container(&self, id: &str) -> Result<(), ProviderError> {
        let mut state = self.state.lock().unwrap();
        if state.start_fails {
            return Err(ProviderError::Runtime("start failed".to_string()));
        }
        state
            .containers
            .get_mut(id)
            .ok_or_else(|| ProviderError::Runtime(format!("no such container {}", id)))?
            .running = true;
        Ok(())
    }

    async fn host_port(&self, id: &str, exposed_port: &str) -> Result<Option<String>, ProviderError> {
        let state = self.state.lock().unwrap();
        if state.inspect_fails {
            return Err(ProviderError::Runtime("inspect failed".to_string()));
        }
        if state.no_binding {
            return Ok(None);
        }
        let container = state
            .containers
            .get(id)
            .ok_or_else(|| ProviderError::Runtime(format!("no such container {}", id)))?;
        assert_eq!(exposed_port, container.spec.exposed_port);
        Ok(Some(container.host_port.clone()))
    }

    async fn stop_container(&self, id: &str, timeout_secs: i64) -> Result<(), ProviderError> {
        assert_eq!(timeout_secs, 10);
        let mut state = self.state.lock().unwrap();
        state.stopped.push(id.to_string());
        if state.stop_fails {
            return Err(ProviderError::Runtime("stop timed out".to_string()));
        }
        if let Some(c) = state.containers.get_mut(id) {
            c.running = false;
        }
        Ok(())
    }

    async fn remove_container(&self, id: &str, _remove_volumes: bool) -> Result<(), ProviderError> {
        self.state.lock().unwrap().containers.remove(id);
        Ok(())
    }

    async fn list_labelled(&self, label: &str) -> Result<Vec<OwnedContainer>, ProviderError> {
        assert_eq!(label, "app.scavenger");
        Ok(self.state.lock().unwrap().preexisting.clone())
    }
}

/// Store whose inserts always fail
struct FailingStore;

#[async_trait]
impl WorkflowStore for FailingStore {
    async fn insert_workflow(&self, _workflow: &Workflow) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("disk full".to_string()))
    }

    async fn find_workflow(&self, _name: &str) -> Result<Option<Workflow>, StoreError> {
        Ok(None)
    }

    async fn delete_workflow(&self, _name: &str) -> Result<bool, StoreError> {
        Ok(false)
    }

    async fn list_workflows(&self) -> Result<Vec<Workflow>, StoreError> {
        Ok(Vec::new())
    }
}

fn workflow(name: &str) -> Workflow {
    let mut schema = ExtractionSchema::new();
    schema.insert_normalized(SchemaField::new("Debt", "number", "total debt"));
    Workflow::new(name, "https://www.usdebtclock.org", "*/5 * * * *", "Extract the debt", schema, 1)
}

fn config() -> LocalConfig {
    LocalConfig {
        gemini_api_key: "test-key".to_string(),
        ..LocalConfig::default()
    }
}

async fn provider(runtime: Arc<FakeRuntime>, store: Arc<dyn WorkflowStore>) -> LocalProvider {
    LocalProvider::connect(config(), runtime, store).await.unwrap()
}

#[tokio::test]
async fn test_create_persists_reachable_worker() {
    let runtime = FakeRuntime::new();
    let store = Arc::new(MemoryStore::new());
    let provider = provider(Arc::clone(&runtime), store.clone()).await;

    let created = provider.create_workflow(workflow("Debt Clock")).await.unwrap();

    assert_eq!(created.name, "debt_clock");
    assert_eq!(created.worker_address, "http://localhost:49153");
    assert!(runtime.running_with_port("49153"));
    assert_eq!(store.find_workflow("debt_clock").await.unwrap(), Some(created));
    assert_eq!(provider.running_count().await.unwrap(), 1);

    let spec = runtime.spec_for("debt_clock").unwrap();
    assert_eq!(spec.name, "scavenger-workflow-debt_clock");
    assert_eq!(spec.image, "sthanguy/scavenger-scraper");
    assert_eq!(spec.exposed_port, "8765/tcp");
    assert_eq!(spec.labels.get("app.scavenger").unwrap(), "workflow-worker");
    assert!(spec.env.contains(&"CRONTAB=*/5 * * * *".to_string()));
    assert!(spec.env.contains(&"GEMINI_API_KEY=test-key".to_string()));
    assert!(spec.env.contains(&"WEBPAGE_URL=https://www.usdebtclock.org".to_string()));
    assert!(spec.env.contains(&"PORT=8765".to_string()));
    assert!(spec.env.iter().any(|e| e.starts_with("SCHEMA={") && e.contains("\"debt\"")));
}

#[tokio::test]
async fn test_start_failure_leaves_nothing_behind() {
    let runtime = FakeRuntime::new().with(|s| s.start_fails = true);
    let store = Arc::new(MemoryStore::new());
    let provider = provider(Arc::clone(&runtime), store.clone()).await;

    let result = provider.create_workflow(workflow("debt")).await;

    assert!(matches!(result, Err(ProviderError::Runtime(_))));
    assert_eq!(runtime.container_count(), 0);
    assert!(store.list_workflows().await.unwrap().is_empty());
    assert_eq!(provider.running_count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_inspect_failure_rolls_back() {
    let runtime = FakeRuntime::new().with(|s| s.inspect_fails = true);
    let store = Arc::new(MemoryStore::new());
    let provider = provider(Arc::clone(&runtime), store.clone()).await;

    assert!(provider.create_workflow(workflow("debt")).await.is_err());

    assert_eq!(runtime.container_count(), 0);
    assert_eq!(runtime.state.lock().unwrap().stopped.len(), 1, "rollback should stop first");
    assert!(store.list_workflows().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_missing_port_binding_rolls_back() {
    let runtime = FakeRuntime::new().with(|s| s.no_binding = true);
    let store = Arc::new(MemoryStore::new());
    let provider = provider(Arc::clone(&runtime), store.clone()).await;

    let result = provider.create_workflow(workflow("debt")).await;

    assert!(matches!(result, Err(ProviderError::MissingPortBinding { .. })));
    assert_eq!(runtime.container_count(), 0);
    assert!(store.list_workflows().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_persistence_failure_rolls_back_container() {
    let runtime = FakeRuntime::new();
    let provider = provider(Arc::clone(&runtime), Arc::new(FailingStore)).await;

    let result = provider.create_workflow(workflow("debt")).await;

    match result {
        Err(ProviderError::Persistence { instance, .. }) => assert_eq!(instance, "container-49153"),
        other => panic!("expected persistence error, got {:?}", other),
    }
    assert_eq!(runtime.container_count(), 0);
    assert_eq!(provider.running_count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_duplicate_create_is_rejected_before_provisioning() {
    let runtime = FakeRuntime::new();
    let store = Arc::new(MemoryStore::new());
    let provider = provider(Arc::clone(&runtime), store.clone()).await;

    provider.create_workflow(workflow("debt")).await.unwrap();
    let result = provider.create_workflow(workflow("Debt")).await;

    assert!(matches!(result, Err(ProviderError::AlreadyExists(name)) if name == "debt"));
    assert_eq!(runtime.container_count(), 1);
}

#[tokio::test]
async fn test_create_from_config_skips_existing_record() {
    let runtime = FakeRuntime::new();
    let store = Arc::new(MemoryStore::new());
    let provider = provider(Arc::clone(&runtime), store.clone()).await;

    provider.create_from_config(workflow("debt")).await.unwrap();
    provider.create_from_config(workflow("debt")).await.unwrap();

    assert_eq!(runtime.container_count(), 1);
    assert_eq!(store.list_workflows().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_delete_removes_record_without_live_instance() {
    let runtime = FakeRuntime::new();
    let store = Arc::new(MemoryStore::new());
    let provider = provider(Arc::clone(&runtime), store.clone()).await;

    // A record left over from another process, with no tracked container
    store
        .insert_workflow(&workflow("orphan").with_worker_address("http://localhost:1"))
        .await
        .unwrap();

    provider.delete_workflow("orphan").await.unwrap();

    assert_eq!(store.find_workflow("orphan").await.unwrap(), None);
    assert!(runtime.state.lock().unwrap().stopped.is_empty());
}

#[tokio::test]
async fn test_delete_survives_stop_failure() {
    let runtime = FakeRuntime::new();
    let store = Arc::new(MemoryStore::new());
    let provider = provider(Arc::clone(&runtime), store.clone()).await;

    provider.create_workflow(workflow("debt")).await.unwrap();
    runtime.with(|s| s.stop_fails = true);

    provider.delete_workflow("debt").await.unwrap();

    assert_eq!(runtime.container_count(), 0);
    assert_eq!(store.find_workflow("debt").await.unwrap(), None);
    assert_eq!(provider.running_count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_running_count_tracks_creates_and_deletes() {
    let runtime = FakeRuntime::new();
    let store = Arc::new(MemoryStore::new());
    let provider = provider(Arc::clone(&runtime), store.clone()).await;

    let k = 5;
    let j = 2;
    for i in 0..k {
        provider.create_workflow(workflow(&format!("wf {}", i))).await.unwrap();
    }
    for i in 0..j {
        provider.delete_workflow(&format!("wf_{}", i)).await.unwrap();
    }

    assert_eq!(provider.running_count().await.unwrap(), k - j);
    assert_eq!(runtime.container_count(), k - j);
    assert_eq!(provider.running_workflows().await, vec!["wf_2", "wf_3", "wf_4"]);
}

#[tokio::test]
async fn test_concurrent_creates_are_all_tracked() {
    let runtime = FakeRuntime::new();
    let store = Arc::new(MemoryStore::new());
    let provider = Arc::new(provider(Arc::clone(&runtime), store.clone()).await);

    let mut handles = Vec::new();
    for i in 0..8 {
        let provider = Arc::clone(&provider);
        handles.push(tokio::spawn(async move {
            provider.create_workflow(workflow(&format!("parallel {}", i))).await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(provider.running_count().await.unwrap(), 8);
    assert_eq!(store.list_workflows().await.unwrap().len(), 8);
}

#[tokio::test]
async fn test_connect_restores_labelled_containers() {
    let mut labels = HashMap::new();
    labels.insert("app.scavenger".to_string(), "workflow-worker".to_string());
    labels.insert("app.scavenger.workflow".to_string(), "debt".to_string());

    let mut unnamed = HashMap::new();
    unnamed.insert("app.scavenger".to_string(), "workflow-worker".to_string());

    let runtime = FakeRuntime::new().with(|s| {
        s.preexisting = vec![
            OwnedContainer {
                id: "restored-1".to_string(),
                labels,
            },
            OwnedContainer {
                id: "unnamed-1".to_string(),
                labels: unnamed,
            },
        ];
    });
    let store = Arc::new(MemoryStore::new());
    let provider = provider(Arc::clone(&runtime), store.clone()).await;

    assert_eq!(provider.running_count().await.unwrap(), 1);
    assert_eq!(provider.running_workflows().await, vec!["debt"]);

    provider.delete_workflow("debt").await.unwrap();
    assert_eq!(runtime.state.lock().unwrap().stopped, vec!["restored-1".to_string()]);
    assert_eq!(provider.running_count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_connect_fails_when_runtime_unreachable() {
    let runtime = FakeRuntime::new().with(|s| s.ping_fails = true);
    let result = LocalProvider::connect(config(), runtime, Arc::new(MemoryStore::new())).await;
    assert!(result.is_err());
}
