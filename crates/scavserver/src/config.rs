use clap::Parser;
use scavproviders::{ProviderKind, DEFAULT_WORKER_IMAGE};
use std::path::PathBuf;

/// Scavenger control plane server
#[derive(Parser, Debug, Clone)]
#[command(name = "scavserver", version, about)]
pub struct ServerConfig {
    /// Backend that runs workers: local (Docker) or cloud (Cloud Run)
    #[arg(long, env = "PROVIDER", default_value = "local")]
    pub provider: ProviderKind,

    #[arg(long, env = "BIND_ADDRESS", default_value = "0.0.0.0:8080")]
    pub bind_address: String,

    /// JSON file holding workflow records and api key hashes. Records are
    /// kept in memory when unset.
    #[arg(long, env = "DATA_FILE")]
    pub data_file: Option<PathBuf>,

    #[arg(long, env = "WORKER_IMAGE", default_value = DEFAULT_WORKER_IMAGE)]
    pub worker_image: String,

    /// Model credential handed to every worker
    #[arg(long, env = "GEMINI_API_KEY", default_value = "", hide_env_values = true)]
    pub gemini_api_key: String,

    #[arg(long, env = "GCP_PROJECT_ID")]
    pub gcp_project_id: Option<String>,

    #[arg(long, env = "GCP_LOCATION", default_value = "us-central1")]
    pub gcp_location: String,

    /// Static Cloud Run access token; the metadata server is used when unset
    #[arg(long, env = "GCP_ACCESS_TOKEN", hide_env_values = true)]
    pub gcp_access_token: Option<String>,

    /// Bearer token required on operator routes
    #[arg(long, env = "ADMIN_TOKEN", hide_env_values = true)]
    pub admin_token: Option<String>,

    /// Workflows to create at startup (local provider only)
    #[arg(long, env = "BOOTSTRAP_CONFIG")]
    pub bootstrap_config: Option<PathBuf>,
}
