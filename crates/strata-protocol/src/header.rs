//! Message and error-response header identifiers.
//!
//! Both client messages and server error responses carry a list of
//! `(u16 id, value)` pairs. The id spaces overlap, so the constants are
//! grouped by the message that uses them.

use bitflags::bitflags;
use bytes::{BufMut, Bytes};

use crate::codec::write_bytes;

/// Header ids found in an `ErrorResponse`.
pub mod error_fields {
    /// Human-readable hint shown after the caret.
    pub const HINT: u16 = 0x0001;
    /// Byte offset of the error start within the full query text.
    pub const POSITION_START: u16 = 0xfff1;
    /// 1-based line number of the error start.
    pub const LINE_START: u16 = 0xfff3;
}

/// Header id restricting what a client message may do on the server.
pub const ALLOW_CAPABILITIES: u16 = 0xff04;

bitflags! {
    /// Server capabilities a command may exercise.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Capabilities: u64 {
        /// Data modification.
        const MODIFICATIONS = 1 << 0;
        /// Session configuration changes.
        const SESSION_CONFIG = 1 << 1;
        /// Transaction control statements.
        const TRANSACTION = 1 << 2;
        /// Schema changes.
        const DDL = 1 << 3;
        /// Persistent (instance-level) configuration changes.
        const PERSISTENT_CONFIG = 1 << 4;
        /// Every capability, including ones this client does not know yet.
        const ALL = u64::MAX;
    }
}

impl Capabilities {
    /// Everything except transaction control.
    ///
    /// Sent with top-level commands so an unguarded script cannot open
    /// implicit transaction state on a pooled connection.
    pub const NO_TRANSACTION: Self = Self::ALL.difference(Self::TRANSACTION);
}

/// Headers attached to a client message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageHeaders {
    entries: Vec<(u16, Bytes)>,
}

impl MessageHeaders {
    /// Create an empty header set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Header set that forbids transaction control.
    #[must_use]
    pub fn no_transaction() -> Self {
        Self::new().allow_capabilities(Capabilities::NO_TRANSACTION)
    }

    /// Set the `ALLOW_CAPABILITIES` header.
    #[must_use]
    pub fn allow_capabilities(self, caps: Capabilities) -> Self {
        self.with(
            ALLOW_CAPABILITIES,
            Bytes::copy_from_slice(&caps.bits().to_be_bytes()),
        )
    }

    /// Set an arbitrary header, replacing any previous value for `id`.
    #[must_use]
    pub fn with(mut self, id: u16, value: Bytes) -> Self {
        self.entries.retain(|(existing, _)| *existing != id);
        self.entries.push((id, value));
        self
    }

    /// Look up a header value.
    #[must_use]
    pub fn get(&self, id: u16) -> Option<&Bytes> {
        self.entries
            .iter()
            .find(|(existing, _)| *existing == id)
            .map(|(_, value)| value)
    }

    /// The capabilities allowed by these headers, if restricted.
    #[must_use]
    pub fn capabilities(&self) -> Option<Capabilities> {
        let raw: [u8; 8] = self.get(ALLOW_CAPABILITIES)?.as_ref().try_into().ok()?;
        Some(Capabilities::from_bits_retain(u64::from_be_bytes(raw)))
    }

    /// Number of headers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no headers are set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Encode as `u16` count followed by `(u16 id, length-prefixed value)` pairs.
    pub fn encode(&self, dst: &mut impl BufMut) {
        dst.put_u16(self.entries.len() as u16);
        for (id, value) in &self.entries {
            dst.put_u16(*id);
            write_bytes(dst, value);
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use bytes::BytesMut;

    #[test]
    fn test_no_transaction_capabilities() {
        let caps = Capabilities::NO_TRANSACTION;
        assert!(!caps.contains(Capabilities::TRANSACTION));
        assert!(caps.contains(Capabilities::MODIFICATIONS));
        assert!(caps.contains(Capabilities::DDL));
        assert_eq!(caps.bits(), u64::MAX ^ 4);
    }

    #[test]
    fn test_headers_capabilities_roundtrip() {
        let headers = MessageHeaders::no_transaction();
        assert_eq!(headers.len(), 1);
        assert_eq!(headers.capabilities(), Some(Capabilities::NO_TRANSACTION));
    }

    #[test]
    fn test_with_replaces_existing() {
        let headers = MessageHeaders::new()
            .allow_capabilities(Capabilities::ALL)
            .allow_capabilities(Capabilities::MODIFICATIONS);
        assert_eq!(headers.len(), 1);
        assert_eq!(headers.capabilities(), Some(Capabilities::MODIFICATIONS));
    }

    #[test]
    fn test_encode_layout() {
        let headers = MessageHeaders::no_transaction();
        let mut buf = BytesMut::new();
        headers.encode(&mut buf);

        assert_eq!(&buf[..2], &[0x00, 0x01]);
        assert_eq!(&buf[2..4], &[0xff, 0x04]);
        assert_eq!(&buf[4..8], &[0x00, 0x00, 0x00, 0x08]);
        assert_eq!(&buf[8..], &(u64::MAX ^ 4).to_be_bytes());
    }
}
