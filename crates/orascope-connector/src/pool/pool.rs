//! Session pool implementation

use std::collections::VecDeque;
use std::ops::Deref;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::config::PoolConfig;
use crate::session::Session;
use orascope_core::{OrascopeError, Result};

use super::stats::PoolStats;

/// Factory trait for creating new sessions
#[async_trait]
pub trait SessionFactory: Send + Sync + 'static {
    /// Open a new session
    async fn create(&self) -> Result<Arc<dyn Session>>;
}

#[async_trait]
impl<T: SessionFactory> SessionFactory for Arc<T> {
    async fn create(&self) -> Result<Arc<dyn Session>> {
        (**self).create().await
    }
}

/// Internal wrapper for pooled sessions with metadata
struct PooledSessionInner {
    session: Arc<dyn Session>,
    last_used_at: Instant,
    last_validated_at: Instant,
}

impl PooledSessionInner {
    fn new(session: Arc<dyn Session>) -> Self {
        let now = Instant::now();
        Self {
            session,
            last_used_at: now,
            last_validated_at: now,
        }
    }
}

/// A fixed-size pool of Oracle sessions.
///
/// Acquire waits up to the configured timeout and fails with a recoverable
/// `Timeout`. Idle sessions past the grace period are recycled, and each
/// acquire validates the session with a probe at most once per validation
/// interval. Sessions return to the pool when the `PooledSession` wrapper
/// is dropped.
pub struct SessionPool {
    config: PoolConfig,
    factory: Arc<dyn SessionFactory>,
    idle: Mutex<VecDeque<PooledSessionInner>>,
    semaphore: Arc<Semaphore>,
    active_count: AtomicUsize,
    waiting_count: AtomicUsize,
}

impl SessionPool {
    pub fn new<F: SessionFactory>(config: PoolConfig, factory: F) -> Arc<Self> {
        let semaphore = Arc::new(Semaphore::new(config.max_size()));
        Arc::new(Self {
            config,
            factory: Arc::new(factory),
            idle: Mutex::new(VecDeque::new()),
            semaphore,
            active_count: AtomicUsize::new(0),
            waiting_count: AtomicUsize::new(0),
        })
    }

    /// Get a session from the pool.
    ///
    /// Tries the idle queue first, opens a new session while under the size
    /// cap, and otherwise waits for a return. Exceeding the acquire timeout
    /// is a recoverable `Timeout` error.
    pub async fn acquire(self: &Arc<Self>) -> Result<PooledSession> {
        self.waiting_count.fetch_add(1, Ordering::SeqCst);

        let result = tokio::time::timeout(self.config.acquire_timeout(), async {
            let permit = self
                .semaphore
                .clone()
                .acquire_owned()
                .await
                .map_err(|_| OrascopeError::Internal("pool semaphore closed".into()))?;

            let inner = match self.try_get_idle().await {
                Some(inner) => inner,
                None => PooledSessionInner::new(self.factory.create().await?),
            };

            self.active_count.fetch_add(1, Ordering::SeqCst);

            Ok(PooledSession {
                inner: Some(inner),
                pool: Arc::clone(self),
                _permit: permit,
            })
        })
        .await;
        self.waiting_count.fetch_sub(1, Ordering::SeqCst);

        match result {
            Ok(session) => session,
            Err(_) => Err(OrascopeError::Timeout(format!(
                "timed out waiting for a pool session (timeout: {:?})",
                self.config.acquire_timeout()
            ))),
        }
    }

    /// Pop an idle session, recycling stale ones and validating at most
    /// once per validation interval.
    async fn try_get_idle(&self) -> Option<PooledSessionInner> {
        loop {
            let pooled = { self.idle.lock().pop_front() };

            match pooled {
                Some(mut inner) => {
                    if inner.last_used_at.elapsed() > self.config.idle_timeout() {
                        tracing::debug!("recycling session idle past grace period");
                        let _ = inner.session.close().await;
                        continue;
                    }

                    if inner.last_validated_at.elapsed() > self.config.validate_interval() {
                        if inner.session.ping().await.is_err() {
                            tracing::debug!("recycling session that failed validation probe");
                            let _ = inner.session.close().await;
                            continue;
                        }
                        inner.last_validated_at = Instant::now();
                    }

                    inner.last_used_at = Instant::now();
                    return Some(inner);
                }
                None => return None,
            }
        }
    }

    /// Return a session to the idle queue.
    fn return_session(&self, mut inner: PooledSessionInner) {
        self.active_count.fetch_sub(1, Ordering::SeqCst);

        if inner.session.is_closed() {
            return;
        }

        inner.last_used_at = Instant::now();
        self.idle.lock().push_back(inner);
    }

    /// Current pool statistics.
    pub fn stats(&self) -> PoolStats {
        let idle = self.idle.lock().len();
        let active = self.active_count.load(Ordering::SeqCst);
        let waiting = self.waiting_count.load(Ordering::SeqCst);
        PoolStats::new(idle + active, idle, active, waiting)
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Close all idle sessions.
    pub async fn close_idle(&self) {
        let sessions: Vec<_> = {
            let mut idle = self.idle.lock();
            idle.drain(..).collect()
        };

        for inner in sessions {
            let _ = inner.session.close().await;
        }
    }
}

/// A session borrowed from the pool.
///
/// When dropped, the session is automatically returned to the pool. Callers
/// that abandon a session mid-query (deadline expiry) simply drop the
/// wrapper; a closed session is discarded rather than re-queued.
pub struct PooledSession {
    inner: Option<PooledSessionInner>,
    pool: Arc<SessionPool>,
    _permit: OwnedSemaphorePermit,
}

impl std::fmt::Debug for PooledSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledSession").finish_non_exhaustive()
    }
}

impl Deref for PooledSession {
    type Target = dyn Session;

    fn deref(&self) -> &Self::Target {
        self.inner.as_ref().expect("session taken").session.as_ref()
    }
}

impl Drop for PooledSession {
    fn drop(&mut self) {
        if let Some(inner) = self.inner.take() {
            self.pool.return_session(inner);
        }
    }
}

impl PooledSession {
    /// The underlying session as an `Arc`.
    pub fn session(&self) -> &Arc<dyn Session> {
        &self.inner.as_ref().expect("session taken").session
    }

    /// Mark the session as unusable so it is discarded instead of pooled.
    pub async fn discard(mut self) {
        if let Some(inner) = self.inner.take() {
            self.pool.active_count.fetch_sub(1, Ordering::SeqCst);
            let _ = inner.session.close().await;
        }
    }
}
