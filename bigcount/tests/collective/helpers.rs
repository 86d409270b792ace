use bigcount::{Count, LocalTransport, LocalWorld, Transport};
use std::sync::Arc;

/// Helper: run a collective operation across N in-process ranks whose
/// native count limit is `native_max`.
///
/// Keeps every rank alive until every task completes, then checks that no
/// datatype, operator, window or message was left behind.
pub async fn run_collective<F, Fut>(world_size: u32, native_max: Count, f: F)
where
    F: Fn(Arc<LocalTransport>) -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = ()> + Send + 'static,
{
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();

    let ranks = LocalWorld::new(world_size)
        .native_max(native_max)
        .bootstrap()
        .unwrap();
    let ranks: Vec<Arc<LocalTransport>> = ranks.into_iter().map(Arc::new).collect();

    let f = Arc::new(f);
    let mut handles = Vec::new();
    for t in &ranks {
        let t = Arc::clone(t);
        let f = Arc::clone(&f);
        handles.push(tokio::spawn(async move { f(t).await }));
    }
    for h in handles {
        h.await.unwrap();
    }

    for t in &ranks {
        assert_eq!(t.pending_messages(), 0, "rank {} has unread messages", t.rank());
        assert_eq!(t.live_windows(), 0, "rank {} leaked a window", t.rank());
    }
    assert_eq!(ranks[0].live_datatypes(), 0, "leaked derived datatypes");
    assert_eq!(ranks[0].live_ops(), 0, "leaked reduction operators");
}

/// Value stored at position `k` of the block `source` sends to `dest`.
pub fn tagged(source: u32, dest: u32, k: usize) -> i64 {
    i64::from(source) * 10_000 + i64::from(dest) * 100 + k as i64
}
