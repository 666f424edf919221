// crates/scavcore/tests/counters_test.rs

use scavcore::LivenessCounters;
use std::sync::Arc;

#[test]
fn test_guard_reverts_active_connections() {
    let counters = Arc::new(LivenessCounters::new());

    let a = counters.connect();
    let b = counters.connect();
    assert_eq!(counters.active_connections(), 2);

    drop(a);
    assert_eq!(counters.active_connections(), 1);
    drop(b);
    assert_eq!(counters.active_connections(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_updates_are_not_lost() {
    let counters = Arc::new(LivenessCounters::new());
    let sessions = 32;
    let docs_per_session = 250;

    let mut handles = Vec::new();
    for _ in 0..sessions {
        let counters = Arc::clone(&counters);
        handles.push(tokio::spawn(async move {
            let _guard = counters.connect();
            for _ in 0..docs_per_session {
                counters.record_document();
                tokio::task::yield_now().await;
            }
        }));
    }

    for handle in futures::future::join_all(handles).await {
        handle.unwrap();
    }

    let snapshot = counters.snapshot();
    assert_eq!(snapshot.documents_scraped, (sessions * docs_per_session) as u64);
    assert_eq!(snapshot.active_connections, 0);
}
