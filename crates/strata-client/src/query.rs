//! Query descriptors handed to the physical connection.
//!
//! The facade never writes wire messages itself. It describes each command
//! with one of these types and passes it to a
//! [`BaseConnection`](crate::BaseConnection) flow.

use bytes::Bytes;
use strata_protocol::{Cardinality, MessageHeaders, OutputFormat};

/// A result-less command sent through the script flow.
#[derive(Debug, Clone)]
pub struct ScriptQuery {
    /// Command text.
    pub command: String,
    /// Message headers.
    pub headers: MessageHeaders,
}

impl ScriptQuery {
    /// Create a script query.
    #[must_use]
    pub fn new(command: impl Into<String>, headers: MessageHeaders) -> Self {
        Self {
            command: command.into(),
            headers,
        }
    }
}

/// A command with typed output sent through the granular flow.
///
/// With [`OutputFormat::Json`] the flow yields one JSON document per
/// element.
#[derive(Debug, Clone)]
pub struct GranularQuery {
    /// Command text.
    pub command: String,
    /// Requested output format.
    pub format: OutputFormat,
    /// Expected result cardinality.
    pub cardinality: Cardinality,
    /// Encoded arguments, in parameter order.
    pub args: Vec<Bytes>,
    /// Message headers.
    pub headers: MessageHeaders,
}

impl GranularQuery {
    /// Create a granular query.
    #[must_use]
    pub fn new(
        command: impl Into<String>,
        format: OutputFormat,
        cardinality: Cardinality,
        args: Vec<Bytes>,
        headers: MessageHeaders,
    ) -> Self {
        Self {
            command: command.into(),
            format,
            cardinality,
            args,
            headers,
        }
    }
}
