//! Transaction support.
//!
//! A transaction borrows its connection for its whole lifetime: the
//! connection's own query methods are rejected until the transaction ends.
//! Savepoints are exposed as [`Subtransaction`]s, which borrow the
//! enclosing transaction the same way.
//!
//! User commands inside a transaction still carry the
//! "no transaction capabilities" header; only the driver's own control
//! statements may start, commit or roll back.

use async_trait::async_trait;
use strata_protocol::MessageHeaders;

use crate::borrow::{BorrowGuard, BorrowReason};
use crate::connection::{self, BaseConnection};
use crate::error::{Result, aggregate};
use crate::executor::Executor;
use crate::query::ScriptQuery;
use crate::value::{FromElement, ToArgument};

/// Transaction isolation level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IsolationLevel {
    /// Serializable (the server default).
    #[default]
    Serializable,
    /// Repeatable read.
    RepeatableRead,
}

impl IsolationLevel {
    /// The isolation level as it appears in `START TRANSACTION`.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Serializable => "SERIALIZABLE",
            Self::RepeatableRead => "REPEATABLE READ",
        }
    }
}

/// Options applied when a transaction starts.
#[derive(Debug, Clone, Default)]
#[non_exhaustive]
pub struct TransactionOptions {
    /// Isolation level.
    pub isolation: IsolationLevel,
    /// Whether the transaction may not write.
    pub read_only: bool,
    /// Whether a serializable read-only transaction may wait for a safe
    /// snapshot instead of failing.
    pub deferrable: bool,
}

impl TransactionOptions {
    /// Create options with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the isolation level.
    #[must_use]
    pub fn isolation(mut self, level: IsolationLevel) -> Self {
        self.isolation = level;
        self
    }

    /// Set read-only mode.
    #[must_use]
    pub fn read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    /// Set deferrable mode.
    #[must_use]
    pub fn deferrable(mut self, deferrable: bool) -> Self {
        self.deferrable = deferrable;
        self
    }

    /// The `START TRANSACTION` statement for these options.
    #[must_use]
    pub fn start_statement(&self) -> String {
        format!(
            "START TRANSACTION ISOLATION {}, {}, {}",
            self.isolation.name(),
            if self.read_only { "READ ONLY" } else { "READ WRITE" },
            if self.deferrable {
                "DEFERRABLE"
            } else {
                "NOT DEFERRABLE"
            },
        )
    }
}

/// The body of a transaction.
///
/// Returning an error rolls the transaction back; returning `Ok` commits
/// it.
#[async_trait]
pub trait Action: Send + Sync {
    /// Run the transaction body.
    async fn run(&self, tx: &mut Transaction<'_>) -> Result<()>;
}

async fn control(base: &mut dyn BaseConnection, command: String) -> Result<()> {
    tracing::debug!(command = %command, "transaction control");
    base.script_flow(&ScriptQuery::new(command, MessageHeaders::new()))
        .await
}

/// A transaction in progress.
///
/// Created by `try_tx`, never directly.
pub struct Transaction<'a> {
    base: &'a mut dyn BaseConnection,
    guard: BorrowGuard,
    savepoints: u32,
    finished: bool,
}

impl<'a> Transaction<'a> {
    pub(crate) async fn run<A: Action + ?Sized>(
        base: &'a mut dyn BaseConnection,
        options: &TransactionOptions,
        action: &A,
    ) -> Result<()> {
        control(base, options.start_statement()).await?;

        let mut tx = Transaction {
            base,
            guard: BorrowGuard::new(),
            savepoints: 0,
            finished: false,
        };

        let outcome = match action.run(&mut tx).await {
            Ok(()) => tx.guard.assert_unborrowed(),
            Err(err) => Err(err),
        };

        let result = match outcome {
            Ok(()) => control(&mut *tx.base, "COMMIT".into()).await,
            Err(err) => match control(&mut *tx.base, "ROLLBACK".into()).await {
                Ok(()) => Err(err),
                Err(rollback) => Err(err.merge([rollback])),
            },
        };
        tx.finished = true;
        result
    }

    /// Start a subtransaction backed by a savepoint.
    ///
    /// The transaction is borrowed until the subtransaction is committed or
    /// rolled back.
    pub async fn subtransaction(&mut self) -> Result<Subtransaction<'_>> {
        Subtransaction::declare(&mut *self.base, &mut self.guard, &mut self.savepoints).await
    }

    /// Check if the transaction is currently borrowed by a subtransaction.
    #[must_use]
    pub fn is_borrowed(&self) -> bool {
        self.guard.is_borrowed()
    }
}

impl std::fmt::Debug for Transaction<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transaction")
            .field("guard", &self.guard)
            .field("savepoints", &self.savepoints)
            .field("finished", &self.finished)
            .finish_non_exhaustive()
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        if !self.finished {
            tracing::warn!("transaction dropped before completion, connection stays borrowed");
        }
    }
}

/// A savepoint inside a transaction.
///
/// Must be finished with [`commit`](Self::commit) or
/// [`rollback`](Self::rollback). Dropping it unfinished leaves the enclosing
/// transaction borrowed, so the transaction cannot commit and is rolled
/// back as a whole.
pub struct Subtransaction<'s> {
    base: &'s mut dyn BaseConnection,
    parent: &'s mut BorrowGuard,
    savepoints: &'s mut u32,
    guard: BorrowGuard,
    name: String,
    finished: bool,
}

impl<'s> Subtransaction<'s> {
    async fn declare(
        base: &'s mut dyn BaseConnection,
        parent: &'s mut BorrowGuard,
        savepoints: &'s mut u32,
    ) -> Result<Self> {
        parent.borrow(BorrowReason::Subtransaction)?;
        *savepoints += 1;
        let name = format!("strata_sp_{savepoints}");

        if let Err(err) = control(base, format!("DECLARE SAVEPOINT {name}")).await {
            return Err(match parent.unborrow() {
                Ok(()) => err,
                Err(logic) => err.merge([logic]),
            });
        }

        Ok(Self {
            base,
            parent,
            savepoints,
            guard: BorrowGuard::new(),
            name,
            finished: false,
        })
    }

    /// The savepoint name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Start a nested subtransaction.
    pub async fn subtransaction(&mut self) -> Result<Subtransaction<'_>> {
        Subtransaction::declare(&mut *self.base, &mut self.guard, &mut *self.savepoints).await
    }

    /// Release the savepoint, keeping its changes.
    ///
    /// Fails without touching the server if a nested subtransaction is
    /// still unfinished.
    pub async fn commit(mut self) -> Result<()> {
        self.guard.assert_unborrowed()?;
        let command = format!("RELEASE SAVEPOINT {}", self.name);
        self.finish(command).await
    }

    /// Roll back to the savepoint, discarding its changes.
    pub async fn rollback(mut self) -> Result<()> {
        let command = format!("ROLLBACK TO SAVEPOINT {}", self.name);
        self.finish(command).await
    }

    async fn finish(&mut self, command: String) -> Result<()> {
        let result = control(&mut *self.base, command).await;
        self.finished = true;
        let released = self.parent.unborrow();

        match aggregate([result.err(), released.err()]) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl std::fmt::Debug for Subtransaction<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subtransaction")
            .field("name", &self.name)
            .field("guard", &self.guard)
            .field("finished", &self.finished)
            .finish_non_exhaustive()
    }
}

impl Drop for Subtransaction<'_> {
    fn drop(&mut self) {
        if !self.finished {
            tracing::warn!(
                savepoint = %self.name,
                "subtransaction dropped without commit or rollback"
            );
        }
    }
}

macro_rules! guarded_executor {
    ($ty:ident) => {
        #[async_trait]
        impl<'x> Executor for $ty<'x> {
            async fn execute(&mut self, command: &str) -> Result<()> {
                self.guard.assert_unborrowed()?;
                connection::execute(&mut *self.base, command).await
            }

            async fn query<T: FromElement>(
                &mut self,
                command: &str,
                args: &[&(dyn ToArgument + Sync)],
            ) -> Result<Vec<T>> {
                self.guard.assert_unborrowed()?;
                connection::query(&mut *self.base, command, args).await
            }

            async fn query_one<T: FromElement>(
                &mut self,
                command: &str,
                args: &[&(dyn ToArgument + Sync)],
            ) -> Result<T> {
                self.guard.assert_unborrowed()?;
                connection::query_one(&mut *self.base, command, args).await
            }

            async fn query_json(
                &mut self,
                command: &str,
                args: &[&(dyn ToArgument + Sync)],
            ) -> Result<String> {
                self.guard.assert_unborrowed()?;
                connection::query_json(&mut *self.base, command, args).await
            }

            async fn query_one_json(
                &mut self,
                command: &str,
                args: &[&(dyn ToArgument + Sync)],
            ) -> Result<String> {
                self.guard.assert_unborrowed()?;
                connection::query_one_json(&mut *self.base, command, args).await
            }
        }
    };
}

guarded_executor!(Transaction);
guarded_executor!(Subtransaction);

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_start_statement() {
        assert_eq!(
            TransactionOptions::new().start_statement(),
            "START TRANSACTION ISOLATION SERIALIZABLE, READ WRITE, NOT DEFERRABLE"
        );
        assert_eq!(
            TransactionOptions::new()
                .isolation(IsolationLevel::RepeatableRead)
                .read_only(true)
                .deferrable(true)
                .start_statement(),
            "START TRANSACTION ISOLATION REPEATABLE READ, READ ONLY, DEFERRABLE"
        );
    }
}
