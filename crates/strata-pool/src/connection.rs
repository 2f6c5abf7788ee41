//! Pool handles.
//!
//! A [`PoolConnection`] is the caller's exclusive view of a checked-out
//! connection. It forwards every operation to the wrapped connection,
//! watches the results for errors that poison the connection, and hands the
//! connection back to the pool exactly once.
//!
//! An operation whose future is dropped before it completes leaves the
//! handle marked as interrupted, and the pool discards the connection on
//! release instead of handing its unread reply to the next user.

use async_trait::async_trait;
use strata_client::{Action, Error, Executor, FromElement, Result, ToArgument};
use tokio::sync::OwnedSemaphorePermit;

use crate::connector::Connector;
use crate::health::Health;
use crate::pool::{Pool, PooledConn};

const RELEASED: &str = "connection has already been released";
const RELEASED_TWICE: &str = "connection released more than once";

/// A connection checked out of a [`Pool`].
///
/// Call [`release`](Self::release) when done. A handle dropped without
/// release is released automatically.
pub struct PoolConnection<C: Connector> {
    pool: Pool<C>,
    conn: Option<PooledConn<C>>,
    permit: Option<OwnedSemaphorePermit>,
    health: Health,
}

impl<C: Connector> PoolConnection<C> {
    pub(crate) fn new(pool: Pool<C>, conn: PooledConn<C>, permit: OwnedSemaphorePermit) -> Self {
        Self {
            pool,
            conn: Some(conn),
            permit: Some(permit),
            health: Health::new(),
        }
    }

    /// Return the connection to the pool.
    ///
    /// The pool decides from the observed health whether the connection is
    /// reused. Releasing a second time fails with an interface error and
    /// does not touch the pool.
    pub fn release(&mut self) -> Result<()> {
        match self.conn.take() {
            Some(conn) => {
                self.give_back(conn);
                Ok(())
            }
            None => Err(Error::interface(RELEASED_TWICE)),
        }
    }

    fn give_back(&mut self, conn: PooledConn<C>) {
        self.pool.release(conn, &self.health);
        self.permit.take();
    }

    /// Check if the handle has been released.
    #[must_use]
    pub fn is_released(&self) -> bool {
        self.conn.is_none()
    }

    /// The health observed so far.
    #[must_use]
    pub fn health(&self) -> &Health {
        &self.health
    }

    /// The wrapped connection, or an interface error after release.
    pub fn connection(&self) -> Result<&PooledConn<C>> {
        self.conn.as_ref().ok_or_else(|| Error::interface(RELEASED))
    }

    /// Run `action` inside a transaction.
    ///
    /// See [`BorrowableConn::try_tx`](strata_client::BorrowableConn::try_tx).
    pub async fn try_tx<A: Action + ?Sized>(&mut self, action: &A) -> Result<()> {
        let result = match self.conn.as_mut() {
            Some(conn) => {
                self.health.begin();
                conn.try_tx(action).await
            }
            None => Err(Error::interface(RELEASED)),
        };
        self.health.observe(result)
    }

    /// Run `action` inside a transaction, retrying transient failures.
    ///
    /// See [`BorrowableConn::retry`](strata_client::BorrowableConn::retry).
    pub async fn retry<A: Action + ?Sized>(&mut self, action: &A) -> Result<()> {
        let result = match self.conn.as_mut() {
            Some(conn) => {
                self.health.begin();
                conn.retry(action).await
            }
            None => Err(Error::interface(RELEASED)),
        };
        self.health.observe(result)
    }
}

#[async_trait]
impl<C: Connector> Executor for PoolConnection<C> {
    async fn execute(&mut self, command: &str) -> Result<()> {
        let result = match self.conn.as_mut() {
            Some(conn) => {
                self.health.begin();
                conn.execute(command).await
            }
            None => Err(Error::interface(RELEASED)),
        };
        self.health.observe(result)
    }

    async fn query<T: FromElement>(
        &mut self,
        command: &str,
        args: &[&(dyn ToArgument + Sync)],
    ) -> Result<Vec<T>> {
        let result = match self.conn.as_mut() {
            Some(conn) => {
                self.health.begin();
                conn.query(command, args).await
            }
            None => Err(Error::interface(RELEASED)),
        };
        self.health.observe(result)
    }

    async fn query_one<T: FromElement>(
        &mut self,
        command: &str,
        args: &[&(dyn ToArgument + Sync)],
    ) -> Result<T> {
        let result = match self.conn.as_mut() {
            Some(conn) => {
                self.health.begin();
                conn.query_one(command, args).await
            }
            None => Err(Error::interface(RELEASED)),
        };
        self.health.observe(result)
    }

    async fn query_json(
        &mut self,
        command: &str,
        args: &[&(dyn ToArgument + Sync)],
    ) -> Result<String> {
        let result = match self.conn.as_mut() {
            Some(conn) => {
                self.health.begin();
                conn.query_json(command, args).await
            }
            None => Err(Error::interface(RELEASED)),
        };
        self.health.observe(result)
    }

    async fn query_one_json(
        &mut self,
        command: &str,
        args: &[&(dyn ToArgument + Sync)],
    ) -> Result<String> {
        let result = match self.conn.as_mut() {
            Some(conn) => {
                self.health.begin();
                conn.query_one_json(command, args).await
            }
            None => Err(Error::interface(RELEASED)),
        };
        self.health.observe(result)
    }
}

impl<C: Connector> std::fmt::Debug for PoolConnection<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PoolConnection")
            .field("released", &self.is_released())
            .field("health", &self.health)
            .finish_non_exhaustive()
    }
}

impl<C: Connector> Drop for PoolConnection<C> {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            tracing::warn!("pool connection dropped without release");
            self.give_back(conn);
        }
    }
}
