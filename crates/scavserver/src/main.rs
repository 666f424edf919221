use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpServer};
use anyhow::Context;
use clap::Parser;
use scavcore::{ApiKeyStore, JsonFileStore, LivenessCounters, MemoryStore, WorkflowStore};
use scavproviders::{
    CloudConfig, CloudProvider, CloudRunClient, DockerRuntime, LocalConfig, LocalProvider, Provider,
    ProviderKind, ServiceProvider, TokenSource,
};
use scavserver::config::ServerConfig;
use scavserver::{bootstrap, routes, AppState};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

async fn build_provider(config: &ServerConfig, store: Arc<dyn WorkflowStore>) -> anyhow::Result<Provider> {
    match config.provider {
        ProviderKind::Local => {
            let runtime = DockerRuntime::connect().context("Failed to create Docker client")?;
            let local = LocalConfig {
                image: config.worker_image.clone(),
                gemini_api_key: config.gemini_api_key.clone(),
                ..LocalConfig::default()
            };
            let provider = LocalProvider::connect(local, Arc::new(runtime), store)
                .await
                .context("Docker daemon is not reachable")?;
            Ok(Provider::Local(provider))
        }
        ProviderKind::Cloud => {
            let project_id = config
                .gcp_project_id
                .clone()
                .context("GCP_PROJECT_ID is required for the cloud provider")?;

            let tokens = match &config.gcp_access_token {
                Some(token) if !token.is_empty() => TokenSource::Static(token.clone()),
                _ => {
                    info!("No GCP_ACCESS_TOKEN set, using the metadata server");
                    TokenSource::metadata()
                }
            };

            let mut cloud = CloudConfig::new(project_id, config.gcp_location.clone());
            cloud.image = config.worker_image.clone();
            cloud.gemini_api_key = config.gemini_api_key.clone();

            let client = CloudRunClient::new(tokens);
            Ok(Provider::Cloud(CloudProvider::new(cloud, Arc::new(client), store)))
        }
    }
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = ServerConfig::parse();
    info!(provider = %config.provider, "Starting Scavenger server");

    if config.gemini_api_key.is_empty() {
        warn!("GEMINI_API_KEY is not set, workers will not be able to extract");
    }
    if config.admin_token.is_none() {
        warn!("ADMIN_TOKEN is not set, operator routes are open");
    }

    let (workflows, keys): (Arc<dyn WorkflowStore>, Arc<dyn ApiKeyStore>) = match &config.data_file {
        Some(path) => {
            let store = Arc::new(
                JsonFileStore::open(path)
                    .await
                    .with_context(|| format!("Failed to open data file {}", path.display()))?,
            );
            info!(path = %path.display(), "Using file store");
            (store.clone(), store)
        }
        None => {
            warn!("DATA_FILE is not set, records are kept in memory only");
            let store = Arc::new(MemoryStore::new());
            (store.clone(), store)
        }
    };

    let provider = build_provider(&config, Arc::clone(&workflows)).await?;
    info!(provider = %provider.kind(), "Provider ready");

    if let Some(path) = &config.bootstrap_config {
        if provider.kind() == ProviderKind::Local {
            bootstrap::run(&provider, path)
                .await
                .with_context(|| format!("Failed to load bootstrap file {}", path.display()))?;
        } else {
            warn!("BOOTSTRAP_CONFIG is ignored for the cloud provider");
        }
    }

    let counters = Arc::new(LivenessCounters::new());
    let state = web::Data::new(AppState::new(
        Arc::new(provider),
        workflows,
        keys,
        counters,
        config.admin_token.clone(),
    ));

    info!("Server starting on http://{}", config.bind_address);

    HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);

        App::new()
            .app_data(state.clone())
            .wrap(cors)
            .wrap(Logger::default())
            .configure(routes::configure)
    })
    .bind(&config.bind_address)?
    .run()
    .await?;

    Ok(())
}
