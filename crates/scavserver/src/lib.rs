//! HTTP surface of the Scavenger control plane

pub mod auth;
pub mod bootstrap;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod routes;
pub mod ws;

use scavcore::{ApiKeyStore, LivenessCounters, WorkflowStore};
use scavproviders::ServiceProvider;
use scavrelay::RelayEngine;
use std::sync::Arc;

/// Application state shared across handlers
pub struct AppState {
    pub provider: Arc<dyn ServiceProvider>,
    pub workflows: Arc<dyn WorkflowStore>,
    pub keys: Arc<dyn ApiKeyStore>,
    pub counters: Arc<LivenessCounters>,
    pub relay: RelayEngine,
    /// Bearer token for operator routes; `None` leaves them open
    pub admin_token: Option<String>,
}

impl AppState {
    pub fn new(
        provider: Arc<dyn ServiceProvider>,
        workflows: Arc<dyn WorkflowStore>,
        keys: Arc<dyn ApiKeyStore>,
        counters: Arc<LivenessCounters>,
        admin_token: Option<String>,
    ) -> Self {
        let relay = RelayEngine::new(Arc::clone(&workflows), Arc::clone(&counters));
        Self {
            provider,
            workflows,
            keys,
            counters,
            relay,
            admin_token: admin_token.filter(|t| !t.is_empty()),
        }
    }
}
