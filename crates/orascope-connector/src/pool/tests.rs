//! Tests for session pool functionality

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};

use crate::config::PoolConfig;
use crate::session::{BindValue, ColumnDesc, RowSet, RowValues, Session};
use orascope_core::Result;

use super::pool::{SessionFactory, SessionPool};

/// Mock session for testing
struct MockSession {
    #[allow(dead_code)]
    id: usize,
    closed: AtomicBool,
    pings: AtomicUsize,
}

impl MockSession {
    fn new(id: usize) -> Self {
        Self {
            id,
            closed: AtomicBool::new(false),
            pings: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl Session for MockSession {
    async fn query(&self, _sql: &str, _params: &[BindValue]) -> Result<RowSet> {
        Ok(RowSet::default())
    }

    async fn query_named(
        &self,
        _sql: &str,
        _params: &[(&'static str, BindValue)],
    ) -> Result<RowSet> {
        Ok(RowSet::default())
    }

    async fn execute(&self, _sql: &str, _params: &[BindValue], _autocommit: bool) -> Result<u64> {
        Ok(0)
    }

    fn stream_blocking(
        &self,
        _sql: &str,
        _params: &[BindValue],
        _chunk_size: usize,
        meta_tx: oneshot::Sender<Result<Vec<ColumnDesc>>>,
        _tx: mpsc::Sender<Result<Vec<RowValues>>>,
    ) {
        let _ = meta_tx.send(Ok(Vec::new()));
    }

    async fn ping(&self) -> Result<()> {
        self.pings.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// Mock factory that counts sessions created
struct MockSessionFactory {
    counter: AtomicUsize,
}

impl MockSessionFactory {
    fn new() -> Self {
        Self {
            counter: AtomicUsize::new(0),
        }
    }

    fn count(&self) -> usize {
        self.counter.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SessionFactory for MockSessionFactory {
    async fn create(&self) -> Result<Arc<dyn Session>> {
        let id = self.counter.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(MockSession::new(id)))
    }
}

#[tokio::test]
async fn acquire_creates_and_reuses_sessions() {
    let factory = Arc::new(MockSessionFactory::new());
    let pool = SessionPool::new(PoolConfig::new(4), Arc::clone(&factory));

    {
        let session = pool.acquire().await.unwrap();
        assert_eq!(pool.stats().active, 1);
        drop(session);
    }
    assert_eq!(pool.stats().idle, 1);

    // Second acquire reuses the idle session.
    let _session = pool.acquire().await.unwrap();
    assert_eq!(factory.count(), 1);
}

#[tokio::test]
async fn acquire_times_out_when_exhausted() {
    let factory = Arc::new(MockSessionFactory::new());
    let pool = SessionPool::new(
        PoolConfig::new(1).with_acquire_timeout_ms(50),
        Arc::clone(&factory),
    );

    let held = pool.acquire().await.unwrap();
    let err = pool.acquire().await.unwrap_err();
    assert_eq!(err.code(), "timeout");
    drop(held);

    // After release the pool recovers.
    assert!(pool.acquire().await.is_ok());
}

#[tokio::test]
async fn concurrent_acquires_respect_cap() {
    let factory = Arc::new(MockSessionFactory::new());
    let pool = SessionPool::new(PoolConfig::new(3), Arc::clone(&factory));

    let mut held = Vec::new();
    for _ in 0..3 {
        held.push(pool.acquire().await.unwrap());
    }
    assert_eq!(pool.stats().active, 3);

    let waiter = {
        let pool = Arc::clone(&pool);
        tokio::spawn(async move { pool.acquire().await.map(|_| ()) })
    };
    tokio::task::yield_now().await;

    held.pop();
    waiter.await.unwrap().unwrap();
    assert!(factory.count() <= 3);
}

#[tokio::test]
async fn closed_sessions_are_not_requeued() {
    let factory = Arc::new(MockSessionFactory::new());
    let pool = SessionPool::new(PoolConfig::new(2), Arc::clone(&factory));

    let session = pool.acquire().await.unwrap();
    session.close().await.unwrap();
    drop(session);

    assert_eq!(pool.stats().idle, 0);
    let _session = pool.acquire().await.unwrap();
    assert_eq!(factory.count(), 2);
}

#[tokio::test]
async fn discard_closes_instead_of_requeueing() {
    let factory = Arc::new(MockSessionFactory::new());
    let pool = SessionPool::new(PoolConfig::new(2), Arc::clone(&factory));

    let session = pool.acquire().await.unwrap();
    session.discard().await;
    assert_eq!(pool.stats().idle, 0);
    assert_eq!(pool.stats().active, 0);
}

#[tokio::test]
async fn validation_probe_runs_at_most_once_per_interval() {
    struct CountingFactory {
        session: Arc<MockSession>,
    }

    #[async_trait]
    impl SessionFactory for CountingFactory {
        async fn create(&self) -> Result<Arc<dyn Session>> {
            Ok(self.session.clone())
        }
    }

    let session = Arc::new(MockSession::new(0));
    let pool = SessionPool::new(
        // Long validate interval: the probe should never fire in this test.
        PoolConfig::new(1).with_validate_interval_ms(60_000),
        CountingFactory {
            session: session.clone(),
        },
    );

    for _ in 0..5 {
        let s = pool.acquire().await.unwrap();
        drop(s);
    }
    assert_eq!(session.pings.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn close_idle_drains_queue() {
    let factory = Arc::new(MockSessionFactory::new());
    let pool = SessionPool::new(PoolConfig::new(2), Arc::clone(&factory));

    let a = pool.acquire().await.unwrap();
    let b = pool.acquire().await.unwrap();
    drop(a);
    drop(b);
    assert_eq!(pool.stats().idle, 2);

    pool.close_idle().await;
    assert_eq!(pool.stats().idle, 0);
}
