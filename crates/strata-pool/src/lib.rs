//! # strata-driver-pool
//!
//! Connection pool for the strata database driver.
//!
//! The pool hands out [`PoolConnection`] handles. A handle watches every
//! result that passes through it and remembers the first error that leaves
//! the physical connection unusable (a broken network link or a protocol
//! stream that is out of step). When the handle is released, the pool uses
//! that record to decide whether the connection goes back to the idle list
//! or is dropped.
//!
//! ## Features
//!
//! - Release-once handles: a second release is an error, a dropped handle
//!   releases itself
//! - Connections left borrowed by a cancelled transaction are never reused
//! - Concurrent checkouts capped by `max_connections`
//! - Acquisition timeout
//!
//! ## Example
//!
//! ```rust,ignore
//! use strata_client::Executor;
//! use strata_driver_pool::{Pool, PoolConfig};
//!
//! let config = PoolConfig::new()
//!     .max_connections(20)
//!     .connection_timeout(Duration::from_secs(5));
//!
//! let pool = Pool::new(connector, config)?;
//! let mut conn = pool.acquire().await?;
//! let names: Vec<String> = conn.query("SELECT User.name", &[]).await?;
//! conn.release()?;
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod config;
pub mod connection;
pub mod connector;
pub mod error;
pub mod health;
pub mod pool;

pub use config::PoolConfig;
pub use connection::PoolConnection;
pub use connector::Connector;
pub use error::PoolError;
pub use health::Health;
pub use pool::{Pool, PoolStatus, PooledConn};
