use crate::frame::Frame;
use crate::tunnel::FrameSink;
use futures::{Stream, StreamExt};
use scavcore::{LivenessCounters, RelayError};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// How long teardown waits on each peer for the close handshake
pub const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Worker dialed, client not yet attached
    Pending,
    /// Both pumps running
    Paired,
    /// One side ended, the other pump is being released
    Draining,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Client,
    Worker,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Client => "client",
            Side::Worker => "worker",
        }
    }

    fn other(self) -> Side {
        match self {
            Side::Client => Side::Worker,
            Side::Worker => Side::Client,
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a pump stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PumpEnd {
    /// Source stream finished without a close frame
    Eof,
    /// Source sent a close frame
    Closed,
    ReadError,
    WriteError,
    /// The other pump ended first
    Cancelled,
}

#[derive(Debug, Clone, Copy)]
struct PumpOutcome {
    from: Side,
    frames: u64,
    end: PumpEnd,
}

impl PumpOutcome {
    /// The peer responsible for ending this pump, if it ended on its own
    fn ended_by(&self) -> Option<Side> {
        match self.end {
            PumpEnd::Cancelled => None,
            PumpEnd::WriteError => Some(self.from.other()),
            PumpEnd::Eof | PumpEnd::Closed | PumpEnd::ReadError => Some(self.from),
        }
    }
}

/// What happened during one tunnel session
#[derive(Debug, Clone)]
pub struct SessionReport {
    pub session_id: Uuid,
    pub workflow: String,
    pub client_to_worker: u64,
    pub worker_to_client: u64,
    pub client_end: PumpEnd,
    pub worker_end: PumpEnd,
    pub ended_by: Side,
}

/// One client paired with one worker.
///
/// Two pumps copy frames in each direction. Whichever ends first cancels
/// the shared token, which releases the other even when it is parked on a
/// read from a silent peer. Frames from the worker are counted as scraped
/// documents, and the session holds one active connection from pairing
/// until it is closed.
pub struct RelaySession {
    id: Uuid,
    workflow: String,
    state: SessionState,
    counters: Arc<LivenessCounters>,
    close_timeout: Duration,
}

impl RelaySession {
    pub fn new(workflow: impl Into<String>, counters: Arc<LivenessCounters>) -> Self {
        let session = Self {
            id: Uuid::new_v4(),
            workflow: workflow.into(),
            state: SessionState::Pending,
            counters,
            close_timeout: CLOSE_TIMEOUT,
        };
        tracing::debug!(session_id = %session.id, workflow = %session.workflow, "Session pending");
        session
    }

    pub fn with_close_timeout(mut self, close_timeout: Duration) -> Self {
        self.close_timeout = close_timeout;
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    fn transition(&mut self, next: SessionState) {
        tracing::debug!(
            session_id = %self.id,
            workflow = %self.workflow,
            from = ?self.state,
            to = ?next,
            "Session state change"
        );
        self.state = next;
    }

    /// Pump frames between the peers until either side ends, then close both
    pub async fn run<CS, CK, WS, WK>(
        mut self,
        mut client_source: CS,
        mut client_sink: CK,
        mut worker_source: WS,
        mut worker_sink: WK,
    ) -> SessionReport
    where
        CS: Stream<Item = Result<Frame, RelayError>> + Unpin,
        CK: FrameSink,
        WS: Stream<Item = Result<Frame, RelayError>> + Unpin,
        WK: FrameSink,
    {
        let guard = self.counters.connect();
        self.transition(SessionState::Paired);
        tracing::info!(
            session_id = %self.id,
            workflow = %self.workflow,
            active_connections = self.counters.active_connections(),
            "Client paired with worker"
        );

        let cancel = CancellationToken::new();
        let (upstream, downstream) = tokio::join!(
            pump(self.id, Side::Client, &mut client_source, &mut worker_sink, &cancel, None),
            pump(
                self.id,
                Side::Worker,
                &mut worker_source,
                &mut client_sink,
                &cancel,
                Some(self.counters.as_ref()),
            ),
        );

        self.transition(SessionState::Draining);
        close_peer(self.id, Side::Client, &mut client_sink, self.close_timeout).await;
        close_peer(self.id, Side::Worker, &mut worker_sink, self.close_timeout).await;

        drop(guard);
        self.transition(SessionState::Closed);

        let ended_by = upstream
            .ended_by()
            .or_else(|| downstream.ended_by())
            .unwrap_or(Side::Client);

        let report = SessionReport {
            session_id: self.id,
            workflow: self.workflow.clone(),
            client_to_worker: upstream.frames,
            worker_to_client: downstream.frames,
            client_end: upstream.end,
            worker_end: downstream.end,
            ended_by,
        };
        tracing::info!(
            session_id = %report.session_id,
            workflow = %report.workflow,
            ended_by = %report.ended_by,
            client_to_worker = report.client_to_worker,
            worker_to_client = report.worker_to_client,
            "Session closed"
        );
        report
    }
}

async fn pump<S, K>(
    session_id: Uuid,
    from: Side,
    source: &mut S,
    sink: &mut K,
    cancel: &CancellationToken,
    documents: Option<&LivenessCounters>,
) -> PumpOutcome
where
    S: Stream<Item = Result<Frame, RelayError>> + Unpin,
    K: FrameSink,
{
    let mut frames = 0u64;

    let end = loop {
        let next = tokio::select! {
            _ = cancel.cancelled() => break PumpEnd::Cancelled,
            next = source.next() => next,
        };

        let frame = match next {
            None => break PumpEnd::Eof,
            Some(Err(e)) => {
                tracing::warn!(session_id = %session_id, from = %from, error = %e, "Read failed");
                break PumpEnd::ReadError;
            }
            Some(Ok(frame)) if frame.is_close() => {
                tracing::debug!(session_id = %session_id, from = %from, "Peer sent close");
                break PumpEnd::Closed;
            }
            Some(Ok(frame)) => frame,
        };

        frames += 1;
        if let Some(counters) = documents {
            counters.record_document();
        }

        let sent = tokio::select! {
            _ = cancel.cancelled() => break PumpEnd::Cancelled,
            sent = sink.send(frame) => sent,
        };
        if let Err(e) = sent {
            tracing::warn!(session_id = %session_id, to = %from.other(), error = %e, "Write failed");
            break PumpEnd::WriteError;
        }
    };

    cancel.cancel();
    PumpOutcome { from, frames, end }
}

/// Send a normal-closure frame and close the sink, giving up after `limit`
/// so a peer that stopped reading cannot hold the session open.
async fn close_peer<K: FrameSink>(session_id: Uuid, side: Side, sink: &mut K, limit: Duration) {
    let handshake = async {
        if let Err(e) = sink.send(Frame::normal_close()).await {
            tracing::debug!(session_id = %session_id, peer = %side, error = %e, "Close frame not delivered");
        }
        if let Err(e) = sink.close().await {
            tracing::debug!(session_id = %session_id, peer = %side, error = %e, "Close failed");
        }
    };
    if tokio::time::timeout(limit, handshake).await.is_err() {
        tracing::warn!(session_id = %session_id, peer = %side, "Close timed out, dropping peer");
    }
}
