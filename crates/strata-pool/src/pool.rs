//! Connection pool implementation.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use parking_lot::Mutex;
use strata_client::BorrowableConn;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::config::PoolConfig;
use crate::connection::PoolConnection;
use crate::connector::Connector;
use crate::error::PoolError;
use crate::health::Health;

/// A pooled, borrow-guarded connection.
pub type PooledConn<C> = BorrowableConn<<C as Connector>::Connection>;

/// A connection pool.
///
/// The pool caps concurrent checkouts at
/// [`max_connections`](PoolConfig::max_connections), reuses idle connections
/// and opens new ones through its [`Connector`] on demand. Cloning a pool
/// yields another handle to the same pool.
pub struct Pool<C: Connector> {
    inner: Arc<PoolInner<C>>,
}

struct PoolInner<C: Connector> {
    connector: C,
    config: PoolConfig,
    idle: Mutex<Vec<PooledConn<C>>>,
    permits: Arc<Semaphore>,
    total: AtomicU32,
    closed: AtomicBool,
}

impl<C: Connector> Clone for Pool<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<C: Connector> Pool<C> {
    /// Create a pool.
    ///
    /// No connections are opened until the first [`acquire`](Self::acquire).
    pub fn new(connector: C, config: PoolConfig) -> Result<Self, PoolError> {
        config.validate()?;
        let permits = Arc::new(Semaphore::new(config.max_connections as usize));

        tracing::debug!(max_connections = config.max_connections, "connection pool created");

        Ok(Self {
            inner: Arc::new(PoolInner {
                connector,
                config,
                idle: Mutex::new(Vec::new()),
                permits,
                total: AtomicU32::new(0),
                closed: AtomicBool::new(false),
            }),
        })
    }

    /// Check out a connection.
    ///
    /// Reuses an idle connection if one is open, otherwise creates a new
    /// one. If all connections are in use this waits until one is returned
    /// or [`connection_timeout`](PoolConfig::connection_timeout) elapses.
    pub async fn acquire(&self) -> Result<PoolConnection<C>, PoolError> {
        if self.is_closed() {
            return Err(PoolError::PoolClosed);
        }

        let timeout = self.inner.config.connection_timeout;
        match tokio::time::timeout(timeout, self.acquire_inner()).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(?timeout, "connection acquisition timed out");
                Err(PoolError::AcquisitionTimeout(timeout))
            }
        }
    }

    async fn acquire_inner(&self) -> Result<PoolConnection<C>, PoolError> {
        let permit: OwnedSemaphorePermit = Arc::clone(&self.inner.permits)
            .acquire_owned()
            .await
            .map_err(|_| PoolError::PoolClosed)?;

        loop {
            let candidate = self.inner.idle.lock().pop();
            match candidate {
                Some(conn) if conn.is_closed() => {
                    tracing::debug!("discarding idle connection closed by the server");
                    self.inner.total.fetch_sub(1, Ordering::AcqRel);
                }
                Some(conn) => {
                    tracing::debug!("reusing idle connection");
                    return Ok(PoolConnection::new(self.clone(), conn, permit));
                }
                None => break,
            }
        }

        let base = self
            .inner
            .connector
            .connect()
            .await
            .map_err(PoolError::ConnectionCreation)?;
        let total = self.inner.total.fetch_add(1, Ordering::AcqRel) + 1;
        tracing::debug!(total, "opened new connection");

        let conn = BorrowableConn::new(base)
            .with_retry_policy(self.inner.config.retry_policy.clone())
            .with_transaction_options(self.inner.config.transaction_options.clone());
        Ok(PoolConnection::new(self.clone(), conn, permit))
    }

    /// Take back a connection from a pool handle.
    ///
    /// The connection goes back to the idle list only if no poisoning error
    /// was observed on it, no operation on it was cancelled mid-flight, it is
    /// not left borrowed by an unfinished transaction, it is still open and
    /// the pool is still open. Otherwise it is dropped.
    pub(crate) fn release(&self, conn: PooledConn<C>, health: &Health) {
        let discard = if let Some(err) = health.error() {
            tracing::warn!(error = %err, "discarding connection after fatal error");
            true
        } else if health.is_interrupted() {
            tracing::warn!("discarding connection with an operation cancelled mid-flight");
            true
        } else if conn.is_borrowed() {
            tracing::warn!("discarding connection left borrowed by an unfinished transaction");
            true
        } else if conn.is_closed() {
            tracing::debug!("discarding closed connection");
            true
        } else {
            false
        };

        if !discard {
            let mut idle = self.inner.idle.lock();
            if !self.is_closed() {
                idle.push(conn);
                tracing::debug!(idle = idle.len(), "connection returned to pool");
                return;
            }
            tracing::debug!("pool closed, dropping returned connection");
        }

        self.inner.total.fetch_sub(1, Ordering::AcqRel);
    }

    /// Get the current pool status.
    #[must_use]
    pub fn status(&self) -> PoolStatus {
        let max = self.inner.config.max_connections;
        let available_permits = u32::try_from(self.inner.permits.available_permits()).unwrap_or(max);
        PoolStatus {
            available: u32::try_from(self.inner.idle.lock().len()).unwrap_or(u32::MAX),
            in_use: max.saturating_sub(available_permits),
            total: self.inner.total.load(Ordering::Acquire),
            max,
        }
    }

    /// Close the pool, dropping all idle connections.
    ///
    /// Pending and future acquisitions fail with [`PoolError::PoolClosed`].
    /// Connections still checked out are dropped when released.
    pub fn close(&self) {
        if self.inner.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.inner.permits.close();

        let drained = std::mem::take(&mut *self.inner.idle.lock());
        let dropped = u32::try_from(drained.len()).unwrap_or(u32::MAX);
        self.inner.total.fetch_sub(dropped, Ordering::AcqRel);
        tracing::info!(dropped, "connection pool closed");
    }

    /// Check if the pool is closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    /// Get the pool configuration.
    #[must_use]
    pub fn config(&self) -> &PoolConfig {
        &self.inner.config
    }
}

impl<C: Connector> std::fmt::Debug for Pool<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pool")
            .field("config", &self.inner.config)
            .field("status", &self.status())
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

/// Status information about the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStatus {
    /// Number of idle connections available.
    pub available: u32,
    /// Number of connections currently checked out.
    pub in_use: u32,
    /// Total number of open connections.
    pub total: u32,
    /// Maximum allowed checkouts.
    pub max: u32,
}
