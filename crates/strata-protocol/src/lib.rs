//! # strata-protocol
//!
//! Wire-level building blocks of the strata binary session protocol.
//!
//! This crate covers the parts of the protocol the connection core depends
//! on: decoding `ErrorResponse` messages (including the caret diagnostic
//! that points into the query text), message header ids, and the
//! capability flags that keep top-level commands from opening
//! transactions.
//!
//! ## Design Philosophy
//!
//! This crate is intentionally IO-agnostic. It contains no networking logic and
//! makes no assumptions about the async runtime. Higher-level crates build upon
//! this foundation to provide async I/O capabilities.
//!
//! ## Example
//!
//! ```rust
//! use strata_protocol::{ErrorResponse, header::error_fields};
//!
//! let response = ErrorResponse::new(0x04_01_00_00, "unexpected 'x'")
//!     .with_header(error_fields::LINE_START, "1")
//!     .with_header(error_fields::POSITION_START, "7");
//!
//! let message = response.render_message("SELECT x").unwrap();
//! assert!(message.ends_with("query:1:8\n\nSELECT x\n       ^ error"));
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod codec;
pub mod error;
pub mod error_response;
pub mod header;
pub mod types;

pub use error::ProtocolError;
pub use error_response::{DEFAULT_HINT, ErrorResponse, Position};
pub use header::{ALLOW_CAPABILITIES, Capabilities, MessageHeaders};
pub use types::{Cardinality, OutputFormat};
