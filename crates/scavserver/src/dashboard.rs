use scavcore::LivenessCounters;
use scavproviders::ServiceProvider;
use serde::Serialize;

/// Operator view of the system's liveness
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DashboardSummary {
    pub running_workflows: usize,
    pub documents_scraped: u64,
    pub client_connections: u64,
}

/// Gather the summary. A backend that cannot report its worker count is
/// shown as running none.
pub async fn summarize(provider: &dyn ServiceProvider, counters: &LivenessCounters) -> DashboardSummary {
    let running_workflows = match provider.running_count().await {
        Ok(count) => count,
        Err(e) => {
            tracing::error!(provider = %provider.kind(), error = %e, "Failed to count running workflows");
            0
        }
    };
    let snapshot = counters.snapshot();

    DashboardSummary {
        running_workflows,
        documents_scraped: snapshot.documents_scraped,
        client_connections: snapshot.active_connections,
    }
}
