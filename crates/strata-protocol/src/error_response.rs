//! `ErrorResponse` message decoding and query-position rendering.
//!
//! ## Wire layout
//!
//! ```text
//! severity      u8          (ignored by the client)
//! code          u32
//! message       string
//! header_count  u16
//! headers       header_count x (u16 id, string value)
//! ```
//!
//! When the server reports where in the query an error starts, the decoded
//! message is extended with a caret diagnostic:
//!
//! ```text
//! <message>
//! query:<line>:<column>
//!
//! <source line>
//!       ^ <hint>
//! ```
//!
//! Columns count Unicode scalar values, not bytes, because terminals
//! display characters. Lines are separated by `\n` only; a `\r` preceding
//! the newline is treated as an ordinary character of its line.

use std::collections::HashMap;

use bytes::{Buf, BufMut};

use crate::codec::{read_string, read_u8, read_u16, read_u32, write_string};
use crate::error::ProtocolError;
use crate::header::error_fields;

/// Severity byte written by [`ErrorResponse::encode`].
pub const SEVERITY_ERROR: u8 = 0x78;

/// Hint used when the server sent none.
pub const DEFAULT_HINT: &str = "error";

/// Zero-based location of an error within the query text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Position {
    /// Zero-based line index.
    pub line_no: usize,
    /// Byte offset within the full query text, not within the line.
    pub byte_no: usize,
}

/// A decoded `ErrorResponse` message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorResponse {
    /// Server-assigned error code.
    pub code: u32,
    /// Error message as sent by the server.
    pub message: String,
    /// Error headers keyed by header id.
    pub headers: HashMap<u16, String>,
}

impl ErrorResponse {
    /// Create a response without headers.
    #[must_use]
    pub fn new(code: u32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            headers: HashMap::new(),
        }
    }

    /// Add a header.
    #[must_use]
    pub fn with_header(mut self, id: u16, value: impl Into<String>) -> Self {
        self.headers.insert(id, value.into());
        self
    }

    /// Decode an `ErrorResponse` body.
    pub fn decode(src: &mut impl Buf) -> Result<Self, ProtocolError> {
        let _severity = read_u8(src)?;
        let code = read_u32(src)?;
        let message = read_string(src, "error message")?;

        let count = read_u16(src)? as usize;
        let mut headers = HashMap::with_capacity(count);
        for _ in 0..count {
            let id = read_u16(src)?;
            let value = read_string(src, "error header")?;
            headers.insert(id, value);
        }

        Ok(Self {
            code,
            message,
            headers,
        })
    }

    /// Encode the response.
    ///
    /// Headers are written in ascending id order so the output is stable.
    pub fn encode(&self, dst: &mut impl BufMut) {
        dst.put_u8(SEVERITY_ERROR);
        dst.put_u32(self.code);
        write_string(dst, &self.message);

        let mut ids: Vec<_> = self.headers.keys().copied().collect();
        ids.sort_unstable();
        dst.put_u16(ids.len() as u16);
        for id in ids {
            dst.put_u16(id);
            write_string(dst, &self.headers[&id]);
        }
    }

    /// Look up a header value.
    #[must_use]
    pub fn header(&self, id: u16) -> Option<&str> {
        self.headers.get(&id).map(String::as_str)
    }

    /// The hint header, if present.
    #[must_use]
    pub fn hint(&self) -> Option<&str> {
        self.header(error_fields::HINT)
    }

    /// Error start position.
    ///
    /// Returns `Ok(None)` unless both the line-start and position-start
    /// headers are present. A present but non-numeric value is a protocol
    /// violation.
    pub fn position(&self) -> Result<Option<Position>, ProtocolError> {
        let (Some(line), Some(byte)) = (
            self.header(error_fields::LINE_START),
            self.header(error_fields::POSITION_START),
        ) else {
            return Ok(None);
        };

        let line = parse_number(error_fields::LINE_START, line)?;
        let line_no = line.checked_sub(1).ok_or_else(|| ProtocolError::MalformedHeader {
            id: error_fields::LINE_START,
            value: line.to_string(),
            reason: "line numbers start at 1",
        })?;
        let byte_no = parse_number(error_fields::POSITION_START, byte)?;

        Ok(Some(Position { line_no, byte_no }))
    }

    /// Message with the caret diagnostic appended when a position is known.
    pub fn render_message(&self, query: &str) -> Result<String, ProtocolError> {
        let Some(position) = self.position()? else {
            return Ok(self.message.clone());
        };

        let hint = self.hint().unwrap_or(DEFAULT_HINT);
        render_caret(&self.message, query, position, hint)
    }
}

fn parse_number(id: u16, value: &str) -> Result<usize, ProtocolError> {
    value
        .parse()
        .map_err(|_| ProtocolError::MalformedHeader {
            id,
            value: value.to_string(),
            reason: "expected a non-negative integer",
        })
}

/// Append a caret diagnostic pointing at `position` in `query` to `message`.
pub fn render_caret(
    message: &str,
    query: &str,
    position: Position,
    hint: &str,
) -> Result<String, ProtocolError> {
    let target = query
        .split('\n')
        .nth(position.line_no)
        .ok_or_else(|| ProtocolError::MalformedHeader {
            id: error_fields::LINE_START,
            value: position.line_no.saturating_add(1).to_string(),
            reason: "line is past the end of the query",
        })?;

    let preceding: usize = query
        .split('\n')
        .take(position.line_no)
        .map(|line| line.len() + 1)
        .sum();

    let out_of_line = || ProtocolError::MalformedHeader {
        id: error_fields::POSITION_START,
        value: position.byte_no.to_string(),
        reason: "position lies outside the reported line",
    };
    let offset = position
        .byte_no
        .checked_sub(preceding)
        .filter(|offset| *offset <= target.len())
        .ok_or_else(out_of_line)?;
    let prefix = target
        .get(..offset)
        .ok_or_else(|| ProtocolError::MalformedHeader {
            id: error_fields::POSITION_START,
            value: position.byte_no.to_string(),
            reason: "position splits a multi-byte character",
        })?;

    let column = prefix.chars().count();
    let line = target.replace('\t', " ");
    let padding = " ".repeat(column);

    Ok(format!(
        "{message}\nquery:{}:{}\n\n{line}\n{padding}^ {hint}",
        position.line_no + 1,
        column + 1,
    ))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use bytes::BytesMut;
    use proptest::prelude::*;

    fn roundtrip(response: &ErrorResponse) -> ErrorResponse {
        let mut buf = BytesMut::new();
        response.encode(&mut buf);
        let mut cursor = buf.freeze();
        let decoded = ErrorResponse::decode(&mut cursor).unwrap();
        assert!(!cursor.has_remaining());
        decoded
    }

    #[test]
    fn test_decode_without_headers() {
        let response = ErrorResponse::new(0x04_01_00_00, "syntax error");
        let decoded = roundtrip(&response);

        assert_eq!(decoded, response);
        assert_eq!(decoded.position().unwrap(), None);
        assert_eq!(decoded.render_message("SELECT").unwrap(), "syntax error");
    }

    #[test]
    fn test_decode_ignores_severity() {
        let mut buf = BytesMut::new();
        buf.put_u8(0xff);
        buf.put_u32(7);
        write_string(&mut buf, "boom");
        buf.put_u16(0);

        let decoded = ErrorResponse::decode(&mut buf.freeze()).unwrap();
        assert_eq!(decoded.code, 7);
        assert_eq!(decoded.message, "boom");
    }

    #[test]
    fn test_truncated_headers() {
        let mut buf = BytesMut::new();
        buf.put_u8(SEVERITY_ERROR);
        buf.put_u32(1);
        write_string(&mut buf, "oops");
        buf.put_u16(2);
        buf.put_u16(error_fields::HINT);
        write_string(&mut buf, "only one");

        let err = ErrorResponse::decode(&mut buf.freeze()).unwrap_err();
        assert!(matches!(err, ProtocolError::UnexpectedEof { .. }));
    }

    #[test]
    fn test_position_requires_both_headers() {
        let line_only = ErrorResponse::new(1, "oops").with_header(error_fields::LINE_START, "1");
        assert_eq!(line_only.position().unwrap(), None);
        assert_eq!(line_only.render_message("SELECT x").unwrap(), "oops");

        let byte_only =
            ErrorResponse::new(1, "oops").with_header(error_fields::POSITION_START, "3");
        assert_eq!(byte_only.position().unwrap(), None);
        assert_eq!(byte_only.render_message("SELECT x").unwrap(), "oops");
    }

    #[test]
    fn test_position_is_zero_based_line() {
        let response = ErrorResponse::new(1, "oops")
            .with_header(error_fields::LINE_START, "2")
            .with_header(error_fields::POSITION_START, "16");
        assert_eq!(
            response.position().unwrap(),
            Some(Position {
                line_no: 1,
                byte_no: 16
            })
        );
    }

    #[test]
    fn test_render_second_line() {
        let response = ErrorResponse::new(1, "oops")
            .with_header(error_fields::LINE_START, "2")
            .with_header(error_fields::POSITION_START, "16");

        let msg = response.render_message("SELECT 1\nSELECT x").unwrap();
        assert_eq!(msg, "oops\nquery:2:8\n\nSELECT x\n       ^ error");
    }

    #[test]
    fn test_render_uses_hint() {
        let response = ErrorResponse::new(1, "unexpected 'x'")
            .with_header(error_fields::LINE_START, "1")
            .with_header(error_fields::POSITION_START, "7")
            .with_header(error_fields::HINT, "did you mean 1?");

        let msg = response.render_message("SELECT x;").unwrap();
        assert_eq!(
            msg,
            "unexpected 'x'\nquery:1:8\n\nSELECT x;\n       ^ did you mean 1?"
        );
    }

    #[test]
    fn test_render_counts_characters_not_bytes() {
        // "ä" and "ö" are two bytes each.
        let query = "SELECT 'äö' + x";
        let byte_no = query.find('x').unwrap();
        assert_eq!(byte_no, 16);

        let response = ErrorResponse::new(1, "bad operand")
            .with_header(error_fields::LINE_START, "1")
            .with_header(error_fields::POSITION_START, byte_no.to_string());

        let msg = response.render_message(query).unwrap();
        assert!(msg.ends_with("query:1:15\n\nSELECT 'äö' + x\n              ^ error"));
    }

    #[test]
    fn test_render_replaces_tabs() {
        let query = "SELECT\t1,\n\tfoo";
        let response = ErrorResponse::new(1, "unknown")
            .with_header(error_fields::LINE_START, "2")
            .with_header(error_fields::POSITION_START, "11");

        let msg = response.render_message(query).unwrap();
        assert!(msg.ends_with("query:2:2\n\n foo\n ^ error"));
    }

    #[test]
    fn test_render_keeps_carriage_return_in_line_length() {
        let query = "SELECT 1\r\nSELECT x";
        let response = ErrorResponse::new(1, "oops")
            .with_header(error_fields::LINE_START, "2")
            .with_header(error_fields::POSITION_START, "17");

        let msg = response.render_message(query).unwrap();
        assert!(msg.ends_with("query:2:8\n\nSELECT x\n       ^ error"));
    }

    #[test]
    fn test_non_numeric_header_is_protocol_error() {
        let response = ErrorResponse::new(1, "oops")
            .with_header(error_fields::LINE_START, "two")
            .with_header(error_fields::POSITION_START, "1");

        let err = response.position().unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::MalformedHeader {
                id: error_fields::LINE_START,
                ..
            }
        ));
    }

    #[test]
    fn test_zero_line_is_protocol_error() {
        let response = ErrorResponse::new(1, "oops")
            .with_header(error_fields::LINE_START, "0")
            .with_header(error_fields::POSITION_START, "1");
        assert!(response.position().is_err());
    }

    #[test]
    fn test_position_outside_line_is_protocol_error() {
        let response = ErrorResponse::new(1, "oops")
            .with_header(error_fields::LINE_START, "2")
            .with_header(error_fields::POSITION_START, "7");

        let err = response.render_message("SELECT 1\nSELECT x").unwrap_err();
        assert!(err.to_string().contains("outside the reported line"));
    }

    #[test]
    fn test_line_past_end_is_protocol_error() {
        let response = ErrorResponse::new(1, "oops")
            .with_header(error_fields::LINE_START, "3")
            .with_header(error_fields::POSITION_START, "0");
        assert!(response.render_message("SELECT 1").is_err());
    }

    #[test]
    fn test_largest_line_index_is_protocol_error() {
        let position = Position {
            line_no: usize::MAX,
            byte_no: 0,
        };
        let err = render_caret("oops", "SELECT 1", position, DEFAULT_HINT).unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::MalformedHeader {
                id: error_fields::LINE_START,
                ..
            }
        ));
        assert!(err.to_string().contains("past the end"));
    }

    #[test]
    fn test_padded_number_is_protocol_error() {
        let response = ErrorResponse::new(1, "oops")
            .with_header(error_fields::LINE_START, " 1")
            .with_header(error_fields::POSITION_START, "7");
        assert!(response.position().is_err());

        let response = ErrorResponse::new(1, "oops")
            .with_header(error_fields::LINE_START, "1")
            .with_header(error_fields::POSITION_START, "7\n");
        assert!(response.position().is_err());
    }

    #[test]
    fn test_position_inside_multibyte_char_is_protocol_error() {
        let response = ErrorResponse::new(1, "oops")
            .with_header(error_fields::LINE_START, "1")
            .with_header(error_fields::POSITION_START, "1");
        let err = response.render_message("äb").unwrap_err();
        assert!(err.to_string().contains("multi-byte"));
    }

    proptest! {
        #[test]
        fn prop_decode_never_panics(data in proptest::collection::vec(any::<u8>(), 0..256)) {
            let mut cursor = data.as_slice();
            let _ = ErrorResponse::decode(&mut cursor);
        }

        #[test]
        fn prop_column_counts_scalars(
            before in "[a-zäöü世 ]{0,12}",
            after in "[a-z]{1,6}",
        ) {
            let query = format!("SELECT 1\n{before}{after}");
            let byte_no = 9 + before.len();
            let response = ErrorResponse::new(1, "oops")
                .with_header(error_fields::LINE_START, "2")
                .with_header(error_fields::POSITION_START, byte_no.to_string());

            let msg = response.render_message(&query).unwrap();
            let expected = format!("query:2:{}", before.chars().count() + 1);
            prop_assert!(msg.contains(&expected));
        }
    }
}
