//! The query surface shared by connections, transactions and pool handles.

use async_trait::async_trait;

use crate::error::Result;
use crate::value::{FromElement, ToArgument};

/// Something queries can be run against.
///
/// Implemented by [`BorrowableConn`](crate::BorrowableConn),
/// [`Transaction`](crate::Transaction) and
/// [`Subtransaction`](crate::Subtransaction).
#[async_trait]
pub trait Executor: Send {
    /// Run a command that produces no results.
    async fn execute(&mut self, command: &str) -> Result<()>;

    /// Run a query and decode every result element.
    async fn query<T: FromElement>(
        &mut self,
        command: &str,
        args: &[&(dyn ToArgument + Sync)],
    ) -> Result<Vec<T>>;

    /// Run a query that must produce exactly one result.
    ///
    /// Zero results yields the "zero results" error.
    async fn query_one<T: FromElement>(
        &mut self,
        command: &str,
        args: &[&(dyn ToArgument + Sync)],
    ) -> Result<T>;

    /// Run a query and return its results as one JSON array.
    async fn query_json(
        &mut self,
        command: &str,
        args: &[&(dyn ToArgument + Sync)],
    ) -> Result<String>;

    /// Run a query that must produce exactly one result, as JSON.
    async fn query_one_json(
        &mut self,
        command: &str,
        args: &[&(dyn ToArgument + Sync)],
    ) -> Result<String>;
}
