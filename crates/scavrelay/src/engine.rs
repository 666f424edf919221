use crate::session::{RelaySession, SessionReport};
use crate::tunnel::{dial_worker, tunnel_url, FrameSink, FrameSource, WorkerSink};
use crate::Frame;
use futures::Stream;
use scavcore::{LivenessCounters, RelayError, WorkflowStore};
use std::sync::Arc;
use url::Url;

/// Opens tunnels from clients to the workers named in the record store
pub struct RelayEngine {
    store: Arc<dyn WorkflowStore>,
    counters: Arc<LivenessCounters>,
}

impl RelayEngine {
    pub fn new(store: Arc<dyn WorkflowStore>, counters: Arc<LivenessCounters>) -> Self {
        Self { store, counters }
    }

    pub fn counters(&self) -> &Arc<LivenessCounters> {
        &self.counters
    }

    /// Tunnel URL of the worker backing `workflow`
    pub async fn resolve(&self, workflow: &str) -> Result<Url, RelayError> {
        let record = self
            .store
            .find_workflow(workflow)
            .await?
            .ok_or_else(|| RelayError::WorkflowNotFound(workflow.to_string()))?;

        if !record.is_provisioned() {
            return Err(RelayError::NoWorkerAddress(record.name));
        }
        tunnel_url(&record.worker_address)
    }

    /// Resolve and dial the worker. The returned tunnel is waiting for a
    /// client; nothing is counted until it is paired.
    pub async fn connect(&self, workflow: &str) -> Result<PendingTunnel, RelayError> {
        let url = self.resolve(workflow).await?;
        tracing::info!(workflow = %workflow, url = %url, "Dialing worker");

        let (worker_source, worker_sink) = dial_worker(&url).await.map_err(|e| {
            tracing::error!(workflow = %workflow, error = %e, "Failed to dial worker");
            e
        })?;

        Ok(PendingTunnel {
            session: RelaySession::new(workflow, Arc::clone(&self.counters)),
            url,
            worker_source,
            worker_sink,
        })
    }
}

/// A dialed worker waiting for its client
pub struct PendingTunnel {
    session: RelaySession,
    url: Url,
    worker_source: FrameSource<'static>,
    worker_sink: WorkerSink,
}

impl PendingTunnel {
    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn session_id(&self) -> uuid::Uuid {
        self.session.id()
    }

    /// Attach the client and run the session to completion
    pub async fn pair<CS, CK>(self, client_source: CS, client_sink: CK) -> SessionReport
    where
        CS: Stream<Item = Result<Frame, RelayError>> + Unpin,
        CK: FrameSink,
    {
        self.session
            .run(client_source, client_sink, self.worker_source, self.worker_sink)
            .await
    }
}
