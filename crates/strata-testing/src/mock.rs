//! Scripted physical connection for unit testing.
//!
//! [`MockConnection`] implements [`BaseConnection`] without a server. Each
//! command text is mapped to a queue of [`MockResponse`]s; every flow
//! invocation is recorded so tests can assert on exactly what the driver
//! sent.
//!
//! ## Example
//!
//! ```rust,ignore
//! use strata_testing::mock::{MockConnection, MockResponse};
//!
//! let conn = MockConnection::new()
//!     .with_response("SELECT 1", MockResponse::int64(1));
//! let probe = conn.clone();
//!
//! let mut conn = BorrowableConn::new(conn);
//! let one: i64 = conn.query_one("SELECT 1", &[]).await?;
//! assert_eq!(probe.commands(), vec!["SELECT 1"]);
//! ```

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::io;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use parking_lot::Mutex;
use strata_client::{BaseConnection, Error, GranularQuery, Result, ScriptQuery, decode_error};
use strata_driver_pool::Connector;
use strata_protocol::{Capabilities, Cardinality, ErrorResponse, OutputFormat};

/// Scripted outcome of one flow invocation.
#[derive(Debug, Clone)]
pub enum MockResponse {
    /// Return these result elements.
    Elements(Vec<Bytes>),

    /// Return one JSON document per element.
    Json(Vec<String>),

    /// Complete without results.
    Empty,

    /// Fail with this error.
    Error(Error),

    /// Fail with an encoded `ErrorResponse`, decoded against the command
    /// text like a real connection would.
    ErrorResponse(Bytes),

    /// Drop the link: fail with a connection reset and mark the connection
    /// closed.
    Disconnect,

    /// Never complete.
    Hang,
}

impl MockResponse {
    /// A single `int64` result.
    pub fn int64(value: i64) -> Self {
        Self::Elements(vec![Bytes::copy_from_slice(&value.to_be_bytes())])
    }

    /// A single string result.
    pub fn string(value: impl Into<String>) -> Self {
        Self::Elements(vec![Bytes::from(value.into())])
    }

    /// JSON results.
    pub fn json<I, S>(docs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Json(docs.into_iter().map(Into::into).collect())
    }

    /// An error with the given code.
    pub fn error(code: u32, message: impl Into<String>) -> Self {
        Self::Error(Error::from_code(code, message))
    }

    /// An encoded server error.
    pub fn error_response(response: &ErrorResponse) -> Self {
        let mut buf = BytesMut::new();
        response.encode(&mut buf);
        Self::ErrorResponse(buf.freeze())
    }
}

/// Which flow a command went through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowKind {
    /// Script flow.
    Script,
    /// Granular flow.
    Granular,
}

/// A flow invocation observed by a [`MockConnection`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedQuery {
    /// Command text.
    pub command: String,
    /// Flow used.
    pub kind: FlowKind,
    /// Output format, for granular flows.
    pub format: Option<OutputFormat>,
    /// Expected cardinality, for granular flows.
    pub cardinality: Option<Cardinality>,
    /// Encoded arguments, for granular flows.
    pub args: Vec<Bytes>,
    /// Value of the `ALLOW_CAPABILITIES` header, if sent.
    pub capabilities: Option<Capabilities>,
}

#[derive(Default)]
struct MockState {
    responses: HashMap<String, VecDeque<MockResponse>>,
    log: Vec<RecordedQuery>,
    closed: bool,
}

impl MockState {
    /// Queued responses are consumed in order; the last one is sticky.
    fn next_response(&mut self, command: &str) -> MockResponse {
        match self.responses.get_mut(command) {
            Some(queue) if queue.len() > 1 => queue.pop_front().unwrap_or(MockResponse::Empty),
            Some(queue) => queue.front().cloned().unwrap_or(MockResponse::Empty),
            None => MockResponse::Empty,
        }
    }
}

/// A scripted physical connection.
///
/// Clones share state, so a test can keep a clone as a probe after handing
/// the connection to the code under test.
#[derive(Clone, Default)]
pub struct MockConnection {
    state: Arc<Mutex<MockState>>,
}

impl MockConnection {
    /// Create a connection that answers every command with
    /// [`MockResponse::Empty`].
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn with_responses(responses: HashMap<String, VecDeque<MockResponse>>) -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState {
                responses,
                ..MockState::default()
            })),
        }
    }

    /// Queue a response for `command`.
    #[must_use]
    pub fn with_response(self, command: impl Into<String>, response: MockResponse) -> Self {
        self.push_response(command, response);
        self
    }

    /// Queue a response for `command` on a connection already in use.
    pub fn push_response(&self, command: impl Into<String>, response: MockResponse) {
        self.state
            .lock()
            .responses
            .entry(command.into())
            .or_default()
            .push_back(response);
    }

    /// Every flow invocation so far, oldest first.
    #[must_use]
    pub fn queries(&self) -> Vec<RecordedQuery> {
        self.state.lock().log.clone()
    }

    /// The command texts sent so far, oldest first.
    #[must_use]
    pub fn commands(&self) -> Vec<String> {
        self.state
            .lock()
            .log
            .iter()
            .map(|query| query.command.clone())
            .collect()
    }

    /// Mark the connection closed, as if the server hung up while idle.
    pub fn close(&self) {
        self.state.lock().closed = true;
    }

    async fn respond(&self, record: RecordedQuery) -> Result<Vec<Bytes>> {
        let response = {
            let mut state = self.state.lock();
            if state.closed {
                return Err(Error::ConnectionClosed);
            }
            let response = state.next_response(&record.command);
            if matches!(response, MockResponse::Disconnect) {
                state.closed = true;
            }
            state.log.push(record.clone());
            response
        };

        tracing::trace!(command = %record.command, ?response, "mock response");

        match response {
            MockResponse::Elements(elements) => Ok(elements),
            MockResponse::Json(docs) => Ok(docs.into_iter().map(Bytes::from).collect()),
            MockResponse::Empty => Ok(Vec::new()),
            MockResponse::Error(err) => Err(err),
            MockResponse::ErrorResponse(payload) => {
                Err(decode_error(&mut payload.clone(), &record.command))
            }
            MockResponse::Disconnect => Err(Error::from(io::Error::new(
                io::ErrorKind::ConnectionReset,
                "connection reset by peer",
            ))),
            MockResponse::Hang => std::future::pending().await,
        }
    }
}

impl fmt::Debug for MockConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("MockConnection")
            .field("queries", &state.log.len())
            .field("closed", &state.closed)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl BaseConnection for MockConnection {
    async fn script_flow(&mut self, query: &ScriptQuery) -> Result<()> {
        self.respond(RecordedQuery {
            command: query.command.clone(),
            kind: FlowKind::Script,
            format: None,
            cardinality: None,
            args: Vec::new(),
            capabilities: query.headers.capabilities(),
        })
        .await
        .map(drop)
    }

    async fn granular_flow(&mut self, query: &GranularQuery) -> Result<Vec<Bytes>> {
        self.respond(RecordedQuery {
            command: query.command.clone(),
            kind: FlowKind::Granular,
            format: Some(query.format),
            cardinality: Some(query.cardinality),
            args: query.args.clone(),
            capabilities: query.headers.capabilities(),
        })
        .await
    }

    fn is_closed(&self) -> bool {
        self.state.lock().closed
    }
}

#[derive(Default)]
struct ConnectorState {
    responses: HashMap<String, VecDeque<MockResponse>>,
    connect_errors: VecDeque<Error>,
    created: Vec<MockConnection>,
}

/// A connector producing [`MockConnection`]s.
///
/// Every new connection starts with a copy of the connector's scripted
/// responses.
#[derive(Clone, Default)]
pub struct MockConnector {
    state: Arc<Mutex<ConnectorState>>,
}

impl MockConnector {
    /// Create a connector.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a response for `command` on every future connection.
    #[must_use]
    pub fn with_response(self, command: impl Into<String>, response: MockResponse) -> Self {
        self.state
            .lock()
            .responses
            .entry(command.into())
            .or_default()
            .push_back(response);
        self
    }

    /// Make the next connection attempt fail with `err`.
    pub fn fail_next_connect(&self, err: Error) {
        self.state.lock().connect_errors.push_back(err);
    }

    /// Number of connections created.
    #[must_use]
    pub fn connect_count(&self) -> usize {
        self.state.lock().created.len()
    }

    /// A probe for the `index`-th connection created.
    #[must_use]
    pub fn connection(&self, index: usize) -> Option<MockConnection> {
        self.state.lock().created.get(index).cloned()
    }
}

impl fmt::Debug for MockConnector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockConnector")
            .field("connect_count", &self.connect_count())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Connector for MockConnector {
    type Connection = MockConnection;

    async fn connect(&self) -> Result<MockConnection> {
        let mut state = self.state.lock();
        if let Some(err) = state.connect_errors.pop_front() {
            return Err(err);
        }

        let conn = MockConnection::with_responses(state.responses.clone());
        state.created.push(conn.clone());
        tracing::debug!(count = state.created.len(), "mock connection created");
        Ok(conn)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use strata_protocol::MessageHeaders;

    #[tokio::test]
    async fn test_responses_are_consumed_in_order() {
        let mut conn = MockConnection::new()
            .with_response("SELECT 1", MockResponse::error(0x05_03_01_01, "conflict"))
            .with_response("SELECT 1", MockResponse::int64(1));

        let query = ScriptQuery::new("SELECT 1", MessageHeaders::new());
        assert!(conn.script_flow(&query).await.is_err());
        assert!(conn.script_flow(&query).await.is_ok());
        assert!(conn.script_flow(&query).await.is_ok());
        assert_eq!(conn.commands().len(), 3);
    }

    #[tokio::test]
    async fn test_disconnect_closes() {
        let mut conn = MockConnection::new().with_response("SELECT 1", MockResponse::Disconnect);
        let query = ScriptQuery::new("SELECT 1", MessageHeaders::new());

        let err = conn.script_flow(&query).await.unwrap_err();
        assert!(strata_client::is_permanent_network_error(&err));
        assert!(conn.is_closed());

        let err = conn.script_flow(&query).await.unwrap_err();
        assert!(matches!(err, Error::ConnectionClosed));
        assert_eq!(conn.queries().len(), 1);
    }

    #[tokio::test]
    async fn test_connector_fails_on_request() {
        let connector = MockConnector::new();
        connector.fail_next_connect(Error::ConnectionClosed);

        assert!(connector.connect().await.is_err());
        assert!(connector.connect().await.is_ok());
        assert_eq!(connector.connect_count(), 1);
    }
}
