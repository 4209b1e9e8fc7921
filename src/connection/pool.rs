use super::Connection;
use super::config::EngineConfig;
use crate::core::{DbError, Result};
use crate::storage::InMemoryStorage;
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Pool of connections onto one storage endpoint.
///
/// Every session or transaction scope checks out exactly one connection and
/// returns it on exit; the RAII [`PoolGuard`] also returns it when the scope
/// is cancelled mid-flight.
pub struct ConnectionPool {
    config: EngineConfig,
    available: Arc<Mutex<VecDeque<Connection>>>,
    total: Arc<AtomicUsize>,
    next_id: AtomicU64,
    storage: Arc<InMemoryStorage>,
}

impl ConnectionPool {
    pub fn new(config: EngineConfig, storage: Arc<InMemoryStorage>) -> Result<Self> {
        config.validate()?;

        let mut initial = VecDeque::with_capacity(config.min_connections);
        for id in 0..config.min_connections as u64 {
            initial.push_back(Connection::new(id, storage.clone()));
        }
        let total = initial.len();

        Ok(Self {
            next_id: AtomicU64::new(total as u64),
            available: Arc::new(Mutex::new(initial)),
            total: Arc::new(AtomicUsize::new(total)),
            config,
            storage,
        })
    }

    /// Checks a connection out of the pool, creating one while under the
    /// limit, and failing with [`DbError::PoolTimeout`] once
    /// `acquire_timeout` elapses.
    pub async fn acquire(&self) -> Result<PoolGuard> {
        let start = Instant::now();

        loop {
            if let Some(connection) = self.available.lock().await.pop_front() {
                return Ok(self.guard(connection));
            }

            if self.total.fetch_add(1, Ordering::SeqCst) < self.config.max_connections {
                let id = self.next_id.fetch_add(1, Ordering::SeqCst);
                return Ok(self.guard(Connection::new(id, self.storage.clone())));
            }
            self.total.fetch_sub(1, Ordering::SeqCst);

            if start.elapsed() > self.config.acquire_timeout {
                return Err(DbError::PoolTimeout);
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    fn guard(&self, connection: Connection) -> PoolGuard {
        PoolGuard {
            connection: Some(connection),
            available: self.available.clone(),
            total: self.total.clone(),
        }
    }

    pub async fn stats(&self) -> PoolStats {
        let available = self.available.lock().await.len();
        let total = self.total.load(Ordering::SeqCst);
        PoolStats {
            total_connections: total,
            available_connections: available,
            active_connections: total.saturating_sub(available),
            max_connections: self.config.max_connections,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PoolStats {
    pub total_connections: usize,
    pub available_connections: usize,
    pub active_connections: usize,
    pub max_connections: usize,
}

impl fmt::Display for PoolStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "pool: {}/{} active, {} available, max {}",
            self.active_connections,
            self.total_connections,
            self.available_connections,
            self.max_connections
        )
    }
}

/// RAII guard for a pooled connection; returns it to the pool when dropped.
pub struct PoolGuard {
    connection: Option<Connection>,
    available: Arc<Mutex<VecDeque<Connection>>>,
    total: Arc<AtomicUsize>,
}

impl PoolGuard {
    pub fn connection(&mut self) -> &mut Connection {
        self.connection
            .as_mut()
            .expect("connection already returned to pool")
    }

    /// Explicitly returns the connection, rolling back any transaction left
    /// open on it.
    pub async fn close(mut self) -> Result<()> {
        if let Some(mut connection) = self.connection.take() {
            if connection.is_in_transaction() {
                connection.rollback()?;
            }
            if connection.is_active() {
                self.available.lock().await.push_back(connection);
            } else {
                self.total.fetch_sub(1, Ordering::SeqCst);
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for PoolGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PoolGuard")
            .field("has_connection", &self.connection.is_some())
            .finish()
    }
}

impl Drop for PoolGuard {
    fn drop(&mut self) {
        if let Some(mut connection) = self.connection.take() {
            if connection.is_in_transaction() {
                // staged changes are discarded with the overlay
                let _ = connection.rollback();
            }
            if connection.is_active() {
                if let Ok(mut available) = self.available.try_lock() {
                    available.push_back(connection);
                    return;
                }
                tracing::warn!("pool lock busy on drop, discarding connection");
            }
            self.total.fetch_sub(1, Ordering::SeqCst);
        }
    }
}
