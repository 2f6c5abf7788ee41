//! Client error types.
//!
//! Every failure surfaced by the driver is an [`Error`]. Errors that carry a
//! protocol error code ([`CodedError`]) answer category and tag queries from a
//! static table, so callers can branch on semantics (for example "is this
//! safe to retry?") without matching on message text.
//!
//! [`Error::classify`] tells the pool whether a failure left the physical
//! connection unusable.

use std::fmt;
use std::io;
use std::sync::Arc;

use bytes::Buf;
use strata_protocol::{ErrorResponse, Position, ProtocolError};
use thiserror::Error;

use crate::category::{ErrorCategory, ErrorTag};

/// Message returned when a query expecting one result produced none.
pub const ZERO_RESULTS: &str = "zero results";

/// Errors that can occur during client operations.
#[derive(Debug, Clone, Error)]
#[non_exhaustive]
pub enum Error {
    /// An error carrying a protocol error code, sent by the server or raised
    /// by the client.
    #[error(transparent)]
    Coded(CodedError),

    /// Several errors from one multi-step operation.
    #[error(transparent)]
    Aggregate(AggregateError),

    /// Network I/O failed.
    #[error("I/O error: {0}")]
    Io(Arc<io::Error>),

    /// The connection was closed.
    #[error("connection closed")]
    ConnectionClosed,

    /// The server violated the wire protocol.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// A driver invariant was violated. Indicates a bug in the driver or in
    /// code driving the borrow primitives directly, never a runtime condition.
    #[error("logic error: {0}")]
    Logic(String),
}

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Self::Io(Arc::new(err))
    }
}

impl From<CodedError> for Error {
    fn from(err: CodedError) -> Self {
        Self::Coded(err)
    }
}

/// How a failure affects the connection it happened on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Classification {
    /// The connection is still usable.
    Ordinary,
    /// The protocol stream is out of step; the connection must be discarded.
    UnexpectedMessage,
    /// The network link is gone; the connection must be discarded.
    PermanentNetwork,
}

impl Classification {
    /// Whether the connection must be discarded rather than reused.
    #[must_use]
    pub fn poisons_connection(self) -> bool {
        !matches!(self, Self::Ordinary)
    }
}

impl Error {
    /// Create an error for an error code.
    #[must_use]
    pub fn from_code(code: u32, message: impl Into<String>) -> Self {
        Self::Coded(CodedError::new(code, message))
    }

    /// Create a driver-misuse error.
    #[must_use]
    pub fn interface(message: impl Into<String>) -> Self {
        Self::Coded(CodedError::from_category(
            ErrorCategory::InterfaceError,
            message,
        ))
    }

    /// Create the error returned when a query expecting one result produced
    /// none.
    #[must_use]
    pub fn no_data() -> Self {
        Self::Coded(CodedError::from_category(
            ErrorCategory::NoDataError,
            ZERO_RESULTS,
        ))
    }

    /// Build an error from a decoded `ErrorResponse`.
    ///
    /// `query` is the text of the query that failed; it is used to render a
    /// caret diagnostic when the server reported a position.
    #[must_use]
    pub fn from_response(response: &ErrorResponse, query: &str) -> Self {
        let position = match response.position() {
            Ok(position) => position,
            Err(err) => return Self::Protocol(err),
        };
        let message = match response.render_message(query) {
            Ok(message) => message,
            Err(err) => return Self::Protocol(err),
        };

        let mut error = CodedError::new(response.code, message);
        error.position = position;
        Self::Coded(error)
    }

    /// Merge `others` into this error.
    ///
    /// Returns `self` unchanged when `others` is empty.
    #[must_use]
    pub fn merge(self, others: impl IntoIterator<Item = Error>) -> Self {
        let mut errors = vec![self];
        errors.extend(others);
        if errors.len() == 1 {
            return errors.remove(0);
        }
        Self::Aggregate(AggregateError { errors })
    }

    /// The error code, if this error has one.
    #[must_use]
    pub fn code(&self) -> Option<u32> {
        match self {
            Self::Coded(err) => Some(err.code()),
            _ => None,
        }
    }

    /// The category this error belongs to.
    ///
    /// Network failures and driver bugs map onto the client categories.
    /// Aggregates have no single category; query them with
    /// [`Error::category`] instead.
    #[must_use]
    pub fn kind(&self) -> Option<ErrorCategory> {
        match self {
            Self::Coded(err) => err.kind(),
            Self::Aggregate(_) => None,
            Self::Io(err) if is_timeout(err) => Some(ErrorCategory::ClientConnectionTimeoutError),
            Self::Io(_) | Self::ConnectionClosed => Some(ErrorCategory::ClientConnectionClosedError),
            Self::Protocol(_) => Some(ErrorCategory::BinaryProtocolError),
            Self::Logic(_) => Some(ErrorCategory::InternalClientError),
        }
    }

    /// Whether this error is in `category` or one of its descendants.
    #[must_use]
    pub fn category(&self, category: ErrorCategory) -> bool {
        match self {
            Self::Aggregate(agg) => agg.any(|err| err.category(category)),
            _ => self.kind().is_some_and(|kind| kind.is_a(category)),
        }
    }

    /// Whether this error is marked with `tag`.
    #[must_use]
    pub fn has_tag(&self, tag: ErrorTag) -> bool {
        match self {
            Self::Aggregate(agg) => agg.any(|err| err.has_tag(tag)),
            _ => self.kind().is_some_and(|kind| kind.has_tag(tag)),
        }
    }

    /// Where in the query text the error starts, if the server said.
    #[must_use]
    pub fn position(&self) -> Option<Position> {
        match self {
            Self::Coded(err) => err.position(),
            _ => None,
        }
    }

    /// Check if this is the "zero results" error.
    #[must_use]
    pub fn is_no_data(&self) -> bool {
        self.category(ErrorCategory::NoDataError)
    }

    /// Check if this error indicates a driver bug.
    #[must_use]
    pub fn is_logic_error(&self) -> bool {
        match self {
            Self::Logic(_) => true,
            Self::Aggregate(agg) => agg.any(Error::is_logic_error),
            _ => false,
        }
    }

    /// Decide whether the connection this error occurred on is reusable.
    ///
    /// Permanent network failures and out-of-step protocol streams poison
    /// the connection. Every other error, including server-side query
    /// failures, leaves it reusable. For an aggregate the most severe
    /// constituent wins.
    #[must_use]
    pub fn classify(&self) -> Classification {
        match self {
            Self::Aggregate(agg) => agg
                .errors()
                .iter()
                .map(Error::classify)
                .max()
                .unwrap_or(Classification::Ordinary),
            _ if is_permanent_network_error(self) => Classification::PermanentNetwork,
            Self::Protocol(_) => Classification::UnexpectedMessage,
            _ if self.category(ErrorCategory::UnexpectedMessageError) => {
                Classification::UnexpectedMessage
            }
            _ => Classification::Ordinary,
        }
    }
}

/// Decode an `ErrorResponse` body into an [`Error`].
///
/// A malformed body yields [`Error::Protocol`], which poisons the
/// connection like any other protocol violation.
pub fn decode_error(src: &mut impl Buf, query: &str) -> Error {
    match ErrorResponse::decode(src) {
        Ok(response) => Error::from_response(&response, query),
        Err(err) => Error::Protocol(err),
    }
}

/// Whether `err` is a network failure that cannot heal by itself.
///
/// Timeouts and interruptions are not permanent: the peer may still be
/// there. Aggregates are permanent if any constituent is.
#[must_use]
pub fn is_permanent_network_error(err: &Error) -> bool {
    match err {
        Error::ConnectionClosed => true,
        Error::Io(io_err) => !is_timeout(io_err) && io_err.kind() != io::ErrorKind::Interrupted,
        Error::Aggregate(agg) => agg.any(is_permanent_network_error),
        _ => false,
    }
}

fn is_timeout(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock
    )
}

/// Merge a batch of errors into one.
///
/// Absent entries are skipped. No errors yields `None`; a single error is
/// returned unchanged; two or more become an [`Error::Aggregate`].
pub fn aggregate<I>(errors: I) -> Option<Error>
where
    I: IntoIterator,
    I::Item: Into<Option<Error>>,
{
    let mut errors = errors.into_iter().filter_map(Into::into);
    let first = errors.next()?;
    Some(first.merge(errors))
}

/// An error carrying a protocol error code.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct CodedError {
    code: u32,
    kind: Option<ErrorCategory>,
    message: String,
    position: Option<Position>,
    #[source]
    source: Option<Box<Error>>,
}

impl CodedError {
    /// Create an error for `code`.
    ///
    /// The category is resolved here, once. An empty message is replaced by
    /// the category name so the error always has something to display.
    #[must_use]
    pub fn new(code: u32, message: impl Into<String>) -> Self {
        let kind = ErrorCategory::from_code(code);
        let mut message = message.into();
        if message.is_empty() {
            message = match kind {
                Some(kind) => kind.name().to_string(),
                None => format!("error 0x{code:08x}"),
            };
        }

        Self {
            code,
            kind,
            message,
            position: None,
            source: None,
        }
    }

    /// Create an error for a known category.
    #[must_use]
    pub fn from_category(category: ErrorCategory, message: impl Into<String>) -> Self {
        Self::new(category.code(), message)
    }

    /// Attach the error that caused this one.
    #[must_use]
    pub fn with_source(mut self, source: Error) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// The error code.
    #[must_use]
    pub fn code(&self) -> u32 {
        self.code
    }

    /// The resolved category, `None` for codes outside the known hierarchy.
    #[must_use]
    pub fn kind(&self) -> Option<ErrorCategory> {
        self.kind
    }

    /// The error message, including any caret diagnostic.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Where in the query text the error starts.
    #[must_use]
    pub fn position(&self) -> Option<Position> {
        self.position
    }

    /// Whether this error is in `category` or one of its descendants.
    #[must_use]
    pub fn category(&self, category: ErrorCategory) -> bool {
        self.kind.is_some_and(|kind| kind.is_a(category))
    }

    /// Whether this error is marked with `tag`.
    #[must_use]
    pub fn has_tag(&self, tag: ErrorTag) -> bool {
        self.kind.is_some_and(|kind| kind.has_tag(tag))
    }
}

/// Two or more errors from one multi-step operation.
///
/// Displays as the constituents' messages joined by `"; "`.
#[derive(Debug, Clone)]
pub struct AggregateError {
    errors: Vec<Error>,
}

impl AggregateError {
    /// The constituent errors, in the order they occurred.
    #[must_use]
    pub fn errors(&self) -> &[Error] {
        &self.errors
    }

    /// Whether any constituent satisfies `predicate`, checked in order.
    pub fn any(&self, predicate: impl FnMut(&Error) -> bool) -> bool {
        self.errors.iter().any(predicate)
    }

    /// The first constituent satisfying `predicate`.
    pub fn find(&self, mut predicate: impl FnMut(&Error) -> bool) -> Option<&Error> {
        self.errors.iter().find(|err| predicate(err))
    }
}

impl fmt::Display for AggregateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, err) in self.errors.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{err}")?;
        }
        Ok(())
    }
}

impl std::error::Error for AggregateError {}
