//! Reusable transaction bodies for tests.

use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use strata_client::{Action, Error, Executor, Result, Transaction};

/// Runs each command in order inside the transaction.
#[derive(Debug, Default)]
pub struct ExecuteAll {
    commands: Vec<String>,
    attempts: AtomicU32,
}

impl ExecuteAll {
    /// Create an action running `commands`.
    #[must_use]
    pub fn new<I, S>(commands: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            commands: commands.into_iter().map(Into::into).collect(),
            attempts: AtomicU32::new(0),
        }
    }

    /// How many times the action has been run.
    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Action for ExecuteAll {
    async fn run(&self, tx: &mut Transaction<'_>) -> Result<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        for command in &self.commands {
            tx.execute(command).await?;
        }
        Ok(())
    }
}

/// Fails with a fixed error without touching the server.
#[derive(Debug)]
pub struct FailWith(pub Error);

#[async_trait]
impl Action for FailWith {
    async fn run(&self, _tx: &mut Transaction<'_>) -> Result<()> {
        Err(self.0.clone())
    }
}

/// Runs a command in a savepoint, then commits or rolls the savepoint back.
#[derive(Debug)]
pub struct InSavepoint {
    /// Command run inside the savepoint.
    pub command: String,
    /// Whether to release the savepoint rather than roll it back.
    pub commit: bool,
}

#[async_trait]
impl Action for InSavepoint {
    async fn run(&self, tx: &mut Transaction<'_>) -> Result<()> {
        let mut sub = tx.subtransaction().await?;
        let result = sub.execute(&self.command).await;
        if self.commit && result.is_ok() {
            sub.commit().await
        } else {
            sub.rollback().await?;
            result
        }
    }
}

/// Opens a savepoint and drops it without finishing.
#[derive(Debug, Default)]
pub struct AbandonSavepoint;

#[async_trait]
impl Action for AbandonSavepoint {
    async fn run(&self, tx: &mut Transaction<'_>) -> Result<()> {
        let sub = tx.subtransaction().await?;
        drop(sub);
        Ok(())
    }
}
