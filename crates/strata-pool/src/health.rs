//! Connection health tracking for pool handles.

use strata_client::{Error, Result};

/// Health of a checked-out connection.
///
/// Every operation issued through a pool handle calls
/// [`begin`](Self::begin) before it reaches the connection and folds its
/// result in with [`observe`](Self::observe). An operation that began but
/// never produced a result was cancelled part-way through a message
/// exchange, and the connection may still hold its unread reply.
///
/// The first error that poisons the connection is kept and handed to the
/// pool on release; later errors are ignored.
#[derive(Debug, Clone, Default)]
pub struct Health {
    poisoned: Option<Error>,
    in_flight: bool,
}

impl Health {
    /// Create a healthy record.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark an operation as sent to the connection.
    pub fn begin(&mut self) {
        self.in_flight = true;
    }

    /// Record the outcome of an operation and pass it through unchanged.
    pub fn observe<T>(&mut self, result: Result<T>) -> Result<T> {
        self.in_flight = false;
        if let Err(err) = &result {
            let classification = err.classify();
            if self.poisoned.is_none() && classification.poisons_connection() {
                tracing::debug!(error = %err, ?classification, "connection poisoned");
                self.poisoned = Some(err.clone());
            }
        }
        result
    }

    /// Check if the connection may be reused: no poisoning error was
    /// observed and no operation was abandoned mid-flight.
    #[must_use]
    pub fn is_healthy(&self) -> bool {
        self.poisoned.is_none() && !self.in_flight
    }

    /// Check if an operation began but never produced a result.
    #[must_use]
    pub fn is_interrupted(&self) -> bool {
        self.in_flight
    }

    /// The first poisoning error, if any.
    #[must_use]
    pub fn error(&self) -> Option<&Error> {
        self.poisoned.as_ref()
    }
}
