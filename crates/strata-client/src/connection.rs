//! Connection facade.
//!
//! [`BorrowableConn`] wraps a physical connection and refuses every
//! operation while a transaction holds it. Commands without results go
//! through the script flow; typed queries go through the granular flow.
//! Both carry the `ALLOW_CAPABILITIES` header with the transaction
//! capability removed, so a top-level command can never open or close a
//! transaction behind the driver's back.

use async_trait::async_trait;
use bytes::Bytes;
use strata_protocol::{Cardinality, MessageHeaders, OutputFormat};

use crate::borrow::{BorrowGuard, BorrowReason};
use crate::category::{ErrorCategory, ErrorTag};
use crate::config::RetryPolicy;
use crate::error::{CodedError, Error, Result};
use crate::executor::Executor;
use crate::query::{GranularQuery, ScriptQuery};
use crate::transaction::{Action, Transaction, TransactionOptions};
use crate::value::{FromElement, ToArgument, encode_args};

/// A physical connection to the server.
///
/// Implementations own the socket and the message codec. Each flow sends
/// one command and reads until the server is ready for the next one.
#[async_trait]
pub trait BaseConnection: Send {
    /// Run a command that produces no results.
    async fn script_flow(&mut self, query: &ScriptQuery) -> Result<()>;

    /// Run a command and collect its result elements.
    async fn granular_flow(&mut self, query: &GranularQuery) -> Result<Vec<Bytes>>;

    /// Check if the connection has been closed.
    fn is_closed(&self) -> bool;
}

#[async_trait]
impl<B: BaseConnection + ?Sized> BaseConnection for Box<B> {
    async fn script_flow(&mut self, query: &ScriptQuery) -> Result<()> {
        (**self).script_flow(query).await
    }

    async fn granular_flow(&mut self, query: &GranularQuery) -> Result<Vec<Bytes>> {
        (**self).granular_flow(query).await
    }

    fn is_closed(&self) -> bool {
        (**self).is_closed()
    }
}

pub(crate) async fn execute(base: &mut dyn BaseConnection, command: &str) -> Result<()> {
    tracing::debug!(command = %command, "executing script");
    let query = ScriptQuery::new(command, MessageHeaders::no_transaction());
    base.script_flow(&query).await
}

async fn fetch(
    base: &mut dyn BaseConnection,
    command: &str,
    format: OutputFormat,
    cardinality: Cardinality,
    args: &[&(dyn ToArgument + Sync)],
) -> Result<Vec<Bytes>> {
    tracing::debug!(command = %command, ?format, ?cardinality, args = args.len(), "running query");
    let query = GranularQuery::new(
        command,
        format,
        cardinality,
        encode_args(args),
        MessageHeaders::no_transaction(),
    );
    base.granular_flow(&query).await
}

pub(crate) async fn query<T: FromElement>(
    base: &mut dyn BaseConnection,
    command: &str,
    args: &[&(dyn ToArgument + Sync)],
) -> Result<Vec<T>> {
    let elements = fetch(base, command, OutputFormat::Binary, Cardinality::Many, args).await?;
    elements.into_iter().map(T::from_element).collect()
}

pub(crate) async fn query_one<T: FromElement>(
    base: &mut dyn BaseConnection,
    command: &str,
    args: &[&(dyn ToArgument + Sync)],
) -> Result<T> {
    let elements = fetch(base, command, OutputFormat::Binary, Cardinality::AtMostOne, args).await?;
    T::from_element(exactly_one(elements)?)
}

pub(crate) async fn query_json(
    base: &mut dyn BaseConnection,
    command: &str,
    args: &[&(dyn ToArgument + Sync)],
) -> Result<String> {
    let elements = fetch(base, command, OutputFormat::Json, Cardinality::Many, args).await?;

    let mut json = String::from("[");
    for (i, element) in elements.into_iter().enumerate() {
        if i > 0 {
            json.push(',');
        }
        json.push_str(&String::from_element(element)?);
    }
    json.push(']');
    Ok(json)
}

pub(crate) async fn query_one_json(
    base: &mut dyn BaseConnection,
    command: &str,
    args: &[&(dyn ToArgument + Sync)],
) -> Result<String> {
    let elements = fetch(base, command, OutputFormat::Json, Cardinality::AtMostOne, args).await?;
    String::from_element(exactly_one(elements)?)
}

fn exactly_one(elements: Vec<Bytes>) -> Result<Bytes> {
    let count = elements.len();
    let mut elements = elements.into_iter();
    match (elements.next(), count) {
        (Some(element), 1) => Ok(element),
        (None, _) => Err(Error::no_data()),
        (Some(_), n) => Err(Error::Coded(CodedError::from_category(
            ErrorCategory::ResultCardinalityMismatchError,
            format!("expected at most one result, got {n}"),
        ))),
    }
}

/// A physical connection guarded against use while a transaction holds it.
#[derive(Debug)]
pub struct BorrowableConn<B> {
    base: B,
    guard: BorrowGuard,
    retry_policy: RetryPolicy,
    tx_options: TransactionOptions,
}

impl<B: BaseConnection> BorrowableConn<B> {
    /// Wrap a physical connection.
    #[must_use]
    pub fn new(base: B) -> Self {
        Self {
            base,
            guard: BorrowGuard::new(),
            retry_policy: RetryPolicy::default(),
            tx_options: TransactionOptions::default(),
        }
    }

    /// Set the policy used by [`retry`](Self::retry).
    #[must_use]
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    /// Set the options used when starting transactions.
    #[must_use]
    pub fn with_transaction_options(mut self, options: TransactionOptions) -> Self {
        self.tx_options = options;
        self
    }

    /// The wrapped physical connection.
    #[must_use]
    pub fn base(&self) -> &B {
        &self.base
    }

    /// Unwrap the physical connection.
    pub fn into_inner(self) -> B {
        self.base
    }

    /// Check if the physical connection has been closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.base.is_closed()
    }

    /// Borrow the physical connection exclusively for `reason`.
    ///
    /// Until [`unborrow`](Self::unborrow) is called every facade operation
    /// fails with an interface error.
    pub fn borrow(&mut self, reason: BorrowReason) -> Result<&mut B> {
        self.guard.borrow(reason)?;
        Ok(&mut self.base)
    }

    /// Release a borrow taken with [`borrow`](Self::borrow).
    pub fn unborrow(&mut self) -> Result<()> {
        self.guard.unborrow()
    }

    /// Fail if the connection is currently borrowed.
    pub fn assert_unborrowed(&self) -> Result<()> {
        self.guard.assert_unborrowed()
    }

    /// Check if the connection is currently borrowed.
    #[must_use]
    pub fn is_borrowed(&self) -> bool {
        self.guard.is_borrowed()
    }

    /// Run `action` inside a transaction.
    ///
    /// The transaction is committed if the action succeeds and rolled back
    /// otherwise. If the returned future is dropped before completion the
    /// connection stays borrowed, and a pool will discard it on release.
    pub async fn try_tx<A: Action + ?Sized>(&mut self, action: &A) -> Result<()> {
        self.guard.borrow(BorrowReason::Transaction)?;
        let result = Transaction::run(&mut self.base, &self.tx_options, action).await;

        match (result, self.guard.unborrow()) {
            (Ok(()), released) => released,
            (Err(err), Ok(())) => Err(err),
            (Err(err), Err(logic)) => Err(err.merge([logic])),
        }
    }

    /// Run `action` inside a transaction, retrying transient failures.
    ///
    /// A failed attempt is retried while its error is tagged
    /// [`ShouldRetry`](ErrorTag::ShouldRetry), the retry policy allows
    /// another attempt, and the physical connection is still open.
    pub async fn retry<A: Action + ?Sized>(&mut self, action: &A) -> Result<()> {
        let mut attempt = 0;
        loop {
            let err = match self.try_tx(action).await {
                Ok(()) => return Ok(()),
                Err(err) => err,
            };

            if !err.has_tag(ErrorTag::ShouldRetry)
                || !self.retry_policy.should_retry(attempt)
                || self.base.is_closed()
            {
                return Err(err);
            }

            attempt += 1;
            let backoff = self.retry_policy.backoff_for_attempt(attempt);
            tracing::debug!(attempt, ?backoff, error = %err, "retrying transaction");
            tokio::time::sleep(backoff).await;
        }
    }
}

#[async_trait]
impl<B: BaseConnection> Executor for BorrowableConn<B> {
    async fn execute(&mut self, command: &str) -> Result<()> {
        self.guard.assert_unborrowed()?;
        execute(&mut self.base, command).await
    }

    async fn query<T: FromElement>(
        &mut self,
        command: &str,
        args: &[&(dyn ToArgument + Sync)],
    ) -> Result<Vec<T>> {
        self.guard.assert_unborrowed()?;
        query(&mut self.base, command, args).await
    }

    async fn query_one<T: FromElement>(
        &mut self,
        command: &str,
        args: &[&(dyn ToArgument + Sync)],
    ) -> Result<T> {
        self.guard.assert_unborrowed()?;
        query_one(&mut self.base, command, args).await
    }

    async fn query_json(
        &mut self,
        command: &str,
        args: &[&(dyn ToArgument + Sync)],
    ) -> Result<String> {
        self.guard.assert_unborrowed()?;
        query_json(&mut self.base, command, args).await
    }

    async fn query_one_json(
        &mut self,
        command: &str,
        args: &[&(dyn ToArgument + Sync)],
    ) -> Result<String> {
        self.guard.assert_unborrowed()?;
        query_one_json(&mut self.base, command, args).await
    }
}
