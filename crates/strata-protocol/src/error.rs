//! Protocol-level error types.

use thiserror::Error;

/// Errors raised while decoding protocol messages.
///
/// Every variant describes a violation of the wire contract by the peer.
/// A connection that produced one of these cannot be trusted to be
/// positioned at a message boundary any more.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ProtocolError {
    /// The message ended before a field could be read.
    #[error("unexpected end of message: needed {needed} more bytes, {remaining} remaining")]
    UnexpectedEof {
        /// Bytes required by the field being read.
        needed: usize,
        /// Bytes left in the buffer.
        remaining: usize,
    },

    /// A string field was not valid UTF-8.
    #[error("invalid UTF-8 in {0}")]
    InvalidUtf8(&'static str),

    /// A header carried a value that violates its documented format.
    #[error("malformed header 0x{id:04x} ({value:?}): {reason}")]
    MalformedHeader {
        /// Header identifier.
        id: u16,
        /// Raw header value as sent by the server.
        value: String,
        /// What was wrong with it.
        reason: &'static str,
    },
}
