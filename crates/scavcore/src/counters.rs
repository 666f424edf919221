use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Figures shared by every relay session in the process.
///
/// Both counters are atomics: sessions on different tasks update them
/// without a lock and no increment is lost.
#[derive(Debug, Default)]
pub struct LivenessCounters {
    active_connections: AtomicU64,
    documents_scraped: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CountersSnapshot {
    pub active_connections: u64,
    pub documents_scraped: u64,
}

impl LivenessCounters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one open tunnel until the returned guard is dropped
    pub fn connect(self: &Arc<Self>) -> ConnectionGuard {
        self.active_connections.fetch_add(1, Ordering::SeqCst);
        ConnectionGuard {
            counters: Arc::clone(self),
        }
    }

    pub fn record_document(&self) {
        self.documents_scraped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn active_connections(&self) -> u64 {
        self.active_connections.load(Ordering::SeqCst)
    }

    pub fn documents_scraped(&self) -> u64 {
        self.documents_scraped.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> CountersSnapshot {
        CountersSnapshot {
            active_connections: self.active_connections(),
            documents_scraped: self.documents_scraped(),
        }
    }
}

/// Holds one unit of `active_connections`
#[derive(Debug)]
pub struct ConnectionGuard {
    counters: Arc<LivenessCounters>,
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.counters
            .active_connections
            .fetch_sub(1, Ordering::SeqCst);
    }
}
