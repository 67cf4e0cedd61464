use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

/// A shareable connection pool handle the slot can probe and tear down.
#[async_trait]
pub(crate) trait ManagedPool: Clone + Send + Sync + 'static {
    fn is_usable(&self) -> bool;
    async fn shutdown(&self);
}

#[async_trait]
impl ManagedPool for sqlx::PgPool {
    fn is_usable(&self) -> bool {
        !self.is_closed()
    }

    async fn shutdown(&self) {
        self.close().await;
    }
}

pub(crate) struct PoolLease<P> {
    pub(crate) pool: P,
    pub(crate) generation: u64,
}

struct Generation<P> {
    id: u64,
    pool: P,
}

/// Holds at most one live pool. Creation happens under the write lock, so
/// concurrent first use yields a single pool; each replacement bumps the
/// generation so a stale failure report cannot evict a fresh pool.
pub(crate) struct PoolSlot<P> {
    current: RwLock<Option<Generation<P>>>,
    generations: AtomicU64,
}

impl<P: ManagedPool> PoolSlot<P> {
    pub(crate) fn new() -> Self {
        Self { current: RwLock::new(None), generations: AtomicU64::new(0) }
    }

    pub(crate) async fn get_or_connect<F, Fut, E>(&self, connect: F) -> Result<PoolLease<P>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<P, E>>,
    {
        {
            let guard = self.current.read().await;
            if let Some(live) = guard.as_ref().filter(|live| live.pool.is_usable()) {
                return Ok(PoolLease { pool: live.pool.clone(), generation: live.id });
            }
        }

        let mut guard = self.current.write().await;
        if let Some(live) = guard.as_ref().filter(|live| live.pool.is_usable()) {
            return Ok(PoolLease { pool: live.pool.clone(), generation: live.id });
        }

        if let Some(stale) = guard.take() {
            tracing::warn!(generation = stale.id, "Replacing unusable connection pool");
            retire(stale.pool);
        }

        let pool = connect().await?;
        let id = self.generations.fetch_add(1, Ordering::Relaxed) + 1;
        *guard = Some(Generation { id, pool: pool.clone() });
        tracing::info!(generation = id, "Connection pool established");

        Ok(PoolLease { pool, generation: id })
    }

    /// Drops the pool if it is still `generation`. Returns whether it did.
    pub(crate) async fn invalidate(&self, generation: u64) -> bool {
        let mut guard = self.current.write().await;
        match guard.as_ref() {
            Some(live) if live.id == generation => {}
            _ => return false,
        }

        if let Some(stale) = guard.take() {
            tracing::warn!(generation, "Connection pool invalidated after failure");
            retire(stale.pool);
        }
        true
    }

    /// Closes and forgets the current pool. Safe to call repeatedly.
    pub(crate) async fn close(&self) -> bool {
        let taken = self.current.write().await.take();
        match taken {
            Some(live) => {
                live.pool.shutdown().await;
                tracing::info!(generation = live.id, "Connection pool closed");
                true
            }
            None => false,
        }
    }
}

fn retire<P: ManagedPool>(pool: P) {
    tokio::spawn(async move { pool.shutdown().await });
}
