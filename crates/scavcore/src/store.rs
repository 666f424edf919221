use crate::{ApiKey, StoreError, Workflow};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;

/// Persistence for workflow records. Names are unique.
#[async_trait]
pub trait WorkflowStore: Send + Sync {
    /// Insert a new record, failing with `Duplicate` if the name is taken
    async fn insert_workflow(&self, workflow: &Workflow) -> Result<(), StoreError>;

    async fn find_workflow(&self, name: &str) -> Result<Option<Workflow>, StoreError>;

    /// Remove a record. Returns whether anything was removed.
    async fn delete_workflow(&self, name: &str) -> Result<bool, StoreError>;

    async fn list_workflows(&self) -> Result<Vec<Workflow>, StoreError>;
}

/// Persistence for hashed API keys
#[async_trait]
pub trait ApiKeyStore: Send + Sync {
    async fn insert_api_key(&self, key: ApiKey) -> Result<(), StoreError>;

    async fn api_keys(&self) -> Result<Vec<ApiKey>, StoreError>;
}

/// Everything a store holds, in its on-disk shape
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct StoreDocument {
    #[serde(default)]
    workflows: Vec<Workflow>,
    #[serde(default)]
    api_keys: Vec<ApiKey>,
}

impl StoreDocument {
    fn insert_workflow(&mut self, workflow: &Workflow) -> Result<(), StoreError> {
        if self.workflows.iter().any(|w| w.name == workflow.name) {
            return Err(StoreError::Duplicate(workflow.name.clone()));
        }
        self.workflows.push(workflow.clone());
        Ok(())
    }

    fn find_workflow(&self, name: &str) -> Option<Workflow> {
        self.workflows.iter().find(|w| w.name == name).cloned()
    }

    fn delete_workflow(&mut self, name: &str) -> bool {
        let before = self.workflows.len();
        self.workflows.retain(|w| w.name != name);
        self.workflows.len() != before
    }
}

/// In-process store, lost on restart
#[derive(Default)]
pub struct MemoryStore {
    doc: RwLock<StoreDocument>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl WorkflowStore for MemoryStore {
    async fn insert_workflow(&self, workflow: &Workflow) -> Result<(), StoreError> {
        self.doc.write().await.insert_workflow(workflow)
    }

    async fn find_workflow(&self, name: &str) -> Result<Option<Workflow>, StoreError> {
        Ok(self.doc.read().await.find_workflow(name))
    }

    async fn delete_workflow(&self, name: &str) -> Result<bool, StoreError> {
        Ok(self.doc.write().await.delete_workflow(name))
    }

    async fn list_workflows(&self) -> Result<Vec<Workflow>, StoreError> {
        Ok(self.doc.read().await.workflows.clone())
    }
}

#[async_trait]
impl ApiKeyStore for MemoryStore {
    async fn insert_api_key(&self, key: ApiKey) -> Result<(), StoreError> {
        self.doc.write().await.api_keys.push(key);
        Ok(())
    }

    async fn api_keys(&self) -> Result<Vec<ApiKey>, StoreError> {
        Ok(self.doc.read().await.api_keys.clone())
    }
}

/// Store backed by a single JSON document on disk.
///
/// Every mutation is applied to a copy, written to a sibling temp file and
/// renamed over the original; the in-memory state only changes once the
/// write succeeded.
pub struct JsonFileStore {
    path: PathBuf,
    doc: RwLock<StoreDocument>,
}

impl JsonFileStore {
    /// Open the store at `path`, starting empty if the file does not exist
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let doc = match tokio::fs::read(&path).await {
            Ok(bytes) if bytes.is_empty() => StoreDocument::default(),
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => StoreDocument::default(),
            Err(e) => return Err(e.into()),
        };

        tracing::info!(
            path = %path.display(),
            workflows = doc.workflows.len(),
            api_keys = doc.api_keys.len(),
            "Opened record store"
        );

        Ok(Self {
            path,
            doc: RwLock::new(doc),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn flush(&self, doc: &StoreDocument) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec_pretty(doc)?;
        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }

    async fn mutate<T>(
        &self,
        f: impl FnOnce(&mut StoreDocument) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut guard = self.doc.write().await;
        let mut next = guard.clone();
        let out = f(&mut next)?;
        self.flush(&next).await?;
        *guard = next;
        Ok(out)
    }
}

#[async_trait]
impl WorkflowStore for JsonFileStore {
    async fn insert_workflow(&self, workflow: &Workflow) -> Result<(), StoreError> {
        self.mutate(|doc| doc.insert_workflow(workflow)).await
    }

    async fn find_workflow(&self, name: &str) -> Result<Option<Workflow>, StoreError> {
        Ok(self.doc.read().await.find_workflow(name))
    }

    async fn delete_workflow(&self, name: &str) -> Result<bool, StoreError> {
        self.mutate(|doc| Ok(doc.delete_workflow(name))).await
    }

    async fn list_workflows(&self) -> Result<Vec<Workflow>, StoreError> {
        Ok(self.doc.read().await.workflows.clone())
    }
}

#[async_trait]
impl ApiKeyStore for JsonFileStore {
    async fn insert_api_key(&self, key: ApiKey) -> Result<(), StoreError> {
        self.mutate(|doc| {
            doc.api_keys.push(key);
            Ok(())
        })
        .await
    }

    async fn api_keys(&self) -> Result<Vec<ApiKey>, StoreError> {
        Ok(self.doc.read().await.api_keys.clone())
    }
}
