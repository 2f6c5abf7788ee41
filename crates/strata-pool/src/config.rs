//! Pool configuration.

use std::time::Duration;

use strata_client::{RetryPolicy, TransactionOptions};

use crate::error::PoolError;

/// Configuration for the connection pool.
///
/// This struct is marked `#[non_exhaustive]` to allow adding new fields
/// in future minor versions without breaking changes. Use the builder
/// pattern methods or [`Default::default()`] to construct instances.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct PoolConfig {
    /// Maximum number of connections checked out at once.
    pub max_connections: u32,

    /// Time to wait for a connection before timing out.
    pub connection_timeout: Duration,

    /// Retry policy given to every connection the pool creates.
    pub retry_policy: RetryPolicy,

    /// Transaction options given to every connection the pool creates.
    pub transaction_options: TransactionOptions,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: 10,
            connection_timeout: Duration::from_secs(30),
            retry_policy: RetryPolicy::default(),
            transaction_options: TransactionOptions::default(),
        }
    }
}

impl PoolConfig {
    /// Create a new pool configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum number of connections.
    #[must_use]
    pub fn max_connections(mut self, count: u32) -> Self {
        self.max_connections = count;
        self
    }

    /// Set the connection acquisition timeout.
    #[must_use]
    pub fn connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout = timeout;
        self
    }

    /// Set the retry policy for pooled connections.
    #[must_use]
    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    /// Set the transaction options for pooled connections.
    #[must_use]
    pub fn transaction_options(mut self, options: TransactionOptions) -> Self {
        self.transaction_options = options;
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), PoolError> {
        if self.max_connections == 0 {
            return Err(PoolError::Configuration(
                "max_connections must be greater than 0".into(),
            ));
        }
        if self.connection_timeout.is_zero() {
            return Err(PoolError::Configuration(
                "connection_timeout must be greater than 0".into(),
            ));
        }
        self.retry_policy
            .validate()
            .map_err(|err| PoolError::Configuration(format!("invalid retry policy: {err}")))
    }
}
