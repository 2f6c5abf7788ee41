//! # strata-client
//!
//! Connection core of the strata database driver.
//!
//! This crate sits between a physical connection (anything implementing
//! [`BaseConnection`]) and application code. It provides:
//!
//! - **Error model**: one [`Error`] type whose coded variants answer
//!   category and tag queries, aggregation of multi-step failures, and a
//!   classifier that tells a pool whether a connection is still reusable
//! - **Borrow guard**: a connection held by a transaction rejects all other
//!   use until the transaction ends
//! - **Connection facade**: `execute`, `query`, `query_one`, `query_json` and
//!   `query_one_json` over the two protocol flows
//! - **Transactions**: commit/rollback around a user [`Action`], savepoints
//!   as subtransactions, and retry of transient failures
//!
//! ## Borrow States
//!
//! ```text
//! Unborrowed -> Borrowed(Transaction)    (via try_tx / retry)
//! Borrowed(Transaction) -> Unborrowed    (commit or rollback)
//! Transaction: Unborrowed -> Borrowed(Subtransaction) (via subtransaction())
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use async_trait::async_trait;
//! use strata_client::{Action, BorrowableConn, Executor, Result, Transaction};
//!
//! struct Transfer;
//!
//! #[async_trait]
//! impl Action for Transfer {
//!     async fn run(&self, tx: &mut Transaction<'_>) -> Result<()> {
//!         tx.execute("UPDATE Account FILTER .id = 1 SET { balance := .balance - 10 }").await?;
//!         tx.execute("UPDATE Account FILTER .id = 2 SET { balance := .balance + 10 }").await
//!     }
//! }
//!
//! let mut conn = BorrowableConn::new(physical);
//! let total: i64 = conn.query_one("SELECT sum(Account.balance)", &[]).await?;
//! conn.retry(&Transfer).await?;
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod borrow;
pub mod category;
pub mod config;
pub mod connection;
pub mod error;
pub mod executor;
pub mod query;
pub mod transaction;
pub mod value;

// Re-export commonly used types
pub use borrow::{BorrowGuard, BorrowReason, BorrowState};
pub use category::{ErrorCategory, ErrorTag};
pub use config::RetryPolicy;
pub use connection::{BaseConnection, BorrowableConn};
pub use error::{
    AggregateError, Classification, CodedError, Error, Result, aggregate, decode_error,
    is_permanent_network_error,
};
pub use executor::Executor;
pub use query::{GranularQuery, ScriptQuery};
pub use strata_protocol::{Capabilities, Cardinality, MessageHeaders, OutputFormat, Position};
pub use transaction::{Action, IsolationLevel, Subtransaction, Transaction, TransactionOptions};
pub use value::{FromElement, ToArgument};
