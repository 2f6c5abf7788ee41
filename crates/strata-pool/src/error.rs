//! Pool error types.

use std::time::Duration;

use strata_client::{CodedError, Error, ErrorCategory};
use thiserror::Error;

/// Errors that can occur during pool operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PoolError {
    /// Failed to acquire a connection within the timeout.
    #[error("connection acquisition timeout after {0:?}")]
    AcquisitionTimeout(Duration),

    /// Pool is closed.
    #[error("pool is closed")]
    PoolClosed,

    /// Connection creation failed.
    #[error("failed to create connection: {0}")]
    ConnectionCreation(#[source] Error),

    /// Pool configuration error.
    #[error("pool configuration error: {0}")]
    Configuration(String),
}

impl From<PoolError> for Error {
    fn from(err: PoolError) -> Self {
        match err {
            PoolError::ConnectionCreation(inner) => inner,
            PoolError::AcquisitionTimeout(_) => Error::Coded(CodedError::from_category(
                ErrorCategory::ClientConnectionTimeoutError,
                err.to_string(),
            )),
            PoolError::PoolClosed | PoolError::Configuration(_) => {
                Error::interface(err.to_string())
            }
        }
    }
}
