//! # strata-testing
//!
//! Test infrastructure for strata driver development.
//!
//! This crate provides a scripted physical connection and connector so the
//! connection core and the pool can be exercised without a server.
//!
//! ## Features
//!
//! - Scripted responses per command text, including encoded server errors
//! - Simulated disconnects and hung flows for cancellation tests
//! - A log of every flow invocation with its headers and arguments
//! - Ready-made transaction bodies
//!
//! ## Example
//!
//! ```rust,ignore
//! use strata_testing::mock::{MockConnector, MockResponse};
//!
//! #[tokio::test]
//! async fn test_with_mock_pool() {
//!     let connector = MockConnector::new()
//!         .with_response("SELECT 1", MockResponse::int64(1));
//!     let pool = Pool::new(connector.clone(), PoolConfig::new()).unwrap();
//!
//!     let mut conn = pool.acquire().await.unwrap();
//!     let one: i64 = conn.query_one("SELECT 1", &[]).await.unwrap();
//!     conn.release().unwrap();
//! }
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod fixtures;
pub mod mock;

pub use fixtures::{AbandonSavepoint, ExecuteAll, FailWith, InSavepoint};
pub use mock::{FlowKind, MockConnection, MockConnector, MockResponse, RecordedQuery};
