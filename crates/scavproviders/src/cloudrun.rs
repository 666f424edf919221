use async_trait::async_trait;
use scavcore::ProviderError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

const CLOUD_RUN_BASE_URL: &str = "https://run.googleapis.com";
const METADATA_TOKEN_URL: &str =
    "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";

/// Service definition sent to `services.create`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceSpec {
    pub template: RevisionTemplate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevisionTemplate {
    #[serde(default)]
    pub labels: HashMap<String, String>,
    pub containers: Vec<Container>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Container {
    pub image: String,
    pub ports: Vec<ContainerPort>,
    pub resources: ResourceRequirements,
    pub startup_probe: Probe,
    pub env: Vec<EnvVar>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerPort {
    pub container_port: u16,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceRequirements {
    pub limits: HashMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Probe {
    pub initial_delay_seconds: u32,
    pub period_seconds: u32,
    pub failure_threshold: u32,
    pub http_get: HttpGetAction,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpGetAction {
    pub path: String,
    pub port: u16,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvVar {
    pub name: String,
    pub value: String,
}

/// The parts of a Cloud Run service we read back
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceSummary {
    pub name: String,
    pub uri: String,
    pub labels: HashMap<String, String>,
}

/// A long-running operation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Operation {
    pub name: String,
    pub done: bool,
    pub error: Option<OperationStatus>,
    pub response: Option<ServiceSummary>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OperationStatus {
    pub code: i32,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IamPolicy {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<i32>,
    pub bindings: Vec<Binding>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Binding {
    pub role: String,
    pub members: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct ListServicesResponse {
    services: Vec<ServiceSummary>,
    next_page_token: Option<String>,
}

/// The Cloud Run calls the cloud backend makes
#[async_trait]
pub trait ControlPlane: Send + Sync {
    /// Every service under `parent`, across all pages
    async fn list_services(&self, parent: &str) -> Result<Vec<ServiceSummary>, ProviderError>;

    async fn create_service(
        &self,
        parent: &str,
        service_id: &str,
        service: &ServiceSpec,
    ) -> Result<Operation, ProviderError>;

    /// Block until `operation` finishes and return the created service
    async fn wait_operation(&self, operation: Operation) -> Result<ServiceSummary, ProviderError>;

    async fn get_iam_policy(&self, resource: &str) -> Result<IamPolicy, ProviderError>;

    async fn set_iam_policy(&self, resource: &str, policy: &IamPolicy) -> Result<IamPolicy, ProviderError>;

    /// Start deleting the service `name`; does not wait for the operation
    async fn delete_service(&self, name: &str) -> Result<(), ProviderError>;
}

/// Where the client gets its OAuth bearer token
pub enum TokenSource {
    Static(String),
    /// The GCE metadata server, cached until shortly before expiry
    Metadata(Mutex<Option<(String, Instant)>>),
}

impl TokenSource {
    pub fn metadata() -> Self {
        Self::Metadata(Mutex::new(None))
    }

    async fn token(&self, http: &reqwest::Client) -> Result<String, ProviderError> {
        match self {
            Self::Static(token) => Ok(token.clone()),
            Self::Metadata(cache) => {
                let mut cache = cache.lock().await;
                if let Some((token, expires)) = cache.as_ref() {
                    if Instant::now() < *expires {
                        return Ok(token.clone());
                    }
                }

                #[derive(Deserialize)]
                struct MetadataToken {
                    access_token: String,
                    expires_in: u64,
                }

                let response = http
                    .get(METADATA_TOKEN_URL)
                    .header("Metadata-Flavor", "Google")
                    .send()
                    .await
                    .map_err(control_plane_err)?;
                let token: MetadataToken = check_status(response)
                    .await?
                    .json()
                    .await
                    .map_err(control_plane_err)?;

                let expires = Instant::now() + Duration::from_secs(token.expires_in.saturating_sub(60));
                *cache = Some((token.access_token.clone(), expires));
                Ok(token.access_token)
            }
        }
    }
}

/// Cloud Run Admin API v2 client
pub struct CloudRunClient {
    http: reqwest::Client,
    base_url: String,
    tokens: TokenSource,
    poll_interval: Duration,
}

impl CloudRunClient {
    pub fn new(tokens: TokenSource) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: CLOUD_RUN_BASE_URL.to_string(),
            tokens,
            poll_interval: Duration::from_secs(2),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}/v2/{}", self.base_url, path)
    }

    async fn get<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, ProviderError> {
        let token = self.tokens.token(&self.http).await?;
        let response = self
            .http
            .get(self.url(path))
            .query(query)
            .bearer_auth(token)
            .send()
            .await
            .map_err(control_plane_err)?;
        check_status(response)
            .await?
            .json()
            .await
            .map_err(control_plane_err)
    }

    async fn post<B: Serialize + ?Sized, T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
        body: &B,
    ) -> Result<T, ProviderError> {
        let token = self.tokens.token(&self.http).await?;
        let response = self
            .http
            .post(self.url(path))
            .query(query)
            .bearer_auth(token)
            .json(body)
            .send()
            .await
            .map_err(control_plane_err)?;
        check_status(response)
            .await?
            .json()
            .await
            .map_err(control_plane_err)
    }

    async fn delete(&self, path: &str) -> Result<(), ProviderError> {
        let token = self.tokens.token(&self.http).await?;
        let response = self
            .http
            .delete(self.url(path))
            .bearer_auth(token)
            .send()
            .await
            .map_err(control_plane_err)?;
        check_status(response).await.map(|_| ())
    }
}

fn control_plane_err(e: reqwest::Error) -> ProviderError {
    ProviderError::ControlPlane(e.to_string())
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ProviderError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let url = response.url().to_string();
    let body = response.text().await.unwrap_or_default();
    Err(ProviderError::ControlPlane(format!("{} returned {}: {}", url, status, body)))
}

#[async_trait]
impl ControlPlane for CloudRunClient {
    async fn list_services(&self, parent: &str) -> Result<Vec<ServiceSummary>, ProviderError> {
        let path = format!("{}/services", parent);
        let mut services = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let query: Vec<(&str, &str)> = match page_token.as_deref() {
                Some(token) => vec![("pageToken", token)],
                None => Vec::new(),
            };
            let page: ListServicesResponse = self.get(&path, &query).await?;
            services.extend(page.services);

            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(next) => page_token = Some(next),
                None => break,
            }
        }

        Ok(services)
    }

    async fn create_service(
        &self,
        parent: &str,
        service_id: &str,
        service: &ServiceSpec,
    ) -> Result<Operation, ProviderError> {
        self.post(
            &format!("{}/services", parent),
            &[("serviceId", service_id)],
            service,
        )
        .await
    }

    async fn wait_operation(&self, mut operation: Operation) -> Result<ServiceSummary, ProviderError> {
        loop {
            if operation.done {
                if let Some(status) = operation.error {
                    return Err(ProviderError::ControlPlane(format!(
                        "operation {} failed ({}): {}",
                        operation.name, status.code, status.message
                    )));
                }
                return operation.response.ok_or_else(|| {
                    ProviderError::ControlPlane(format!("operation {} finished without a service", operation.name))
                });
            }

            tokio::time::sleep(self.poll_interval).await;
            tracing::debug!(operation = %operation.name, "Polling operation");
            operation = self.get(&operation.name, &[]).await?;
        }
    }

    async fn get_iam_policy(&self, resource: &str) -> Result<IamPolicy, ProviderError> {
        self.get(&format!("{}:getIamPolicy", resource), &[]).await
    }

    async fn set_iam_policy(&self, resource: &str, policy: &IamPolicy) -> Result<IamPolicy, ProviderError> {
        self.post(
            &format!("{}:setIamPolicy", resource),
            &[],
            &serde_json::json!({ "policy": policy }),
        )
        .await
    }

    async fn delete_service(&self, name: &str) -> Result<(), ProviderError> {
        self.delete(name).await
    }
}
