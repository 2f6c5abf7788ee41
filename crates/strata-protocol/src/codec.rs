//! Codec utilities for protocol encoding and decoding.
//!
//! All integers on the wire are big-endian. Strings are a `u32` byte length
//! followed by that many bytes of UTF-8.

use bytes::{Buf, BufMut, Bytes};

use crate::error::ProtocolError;

/// Fail with [`ProtocolError::UnexpectedEof`] unless `needed` bytes remain.
pub fn ensure_remaining(src: &impl Buf, needed: usize) -> Result<(), ProtocolError> {
    if src.remaining() < needed {
        return Err(ProtocolError::UnexpectedEof {
            needed,
            remaining: src.remaining(),
        });
    }
    Ok(())
}

/// Read a single byte.
pub fn read_u8(src: &mut impl Buf) -> Result<u8, ProtocolError> {
    ensure_remaining(src, 1)?;
    Ok(src.get_u8())
}

/// Read a big-endian `u16`.
pub fn read_u16(src: &mut impl Buf) -> Result<u16, ProtocolError> {
    ensure_remaining(src, 2)?;
    Ok(src.get_u16())
}

/// Read a big-endian `u32`.
pub fn read_u32(src: &mut impl Buf) -> Result<u32, ProtocolError> {
    ensure_remaining(src, 4)?;
    Ok(src.get_u32())
}

/// Read a length-prefixed byte string.
pub fn read_bytes(src: &mut impl Buf) -> Result<Bytes, ProtocolError> {
    let len = read_u32(src)? as usize;
    ensure_remaining(src, len)?;
    Ok(src.copy_to_bytes(len))
}

/// Read a length-prefixed UTF-8 string.
///
/// `field` names the string in the error raised for invalid UTF-8.
pub fn read_string(src: &mut impl Buf, field: &'static str) -> Result<String, ProtocolError> {
    let raw = read_bytes(src)?;
    String::from_utf8(raw.to_vec()).map_err(|_| ProtocolError::InvalidUtf8(field))
}

/// Write a length-prefixed byte string.
pub fn write_bytes(dst: &mut impl BufMut, data: &[u8]) {
    let len = u32::try_from(data.len()).unwrap_or(u32::MAX);
    dst.put_u32(len);
    dst.put_slice(&data[..len as usize]);
}

/// Write a length-prefixed UTF-8 string.
pub fn write_string(dst: &mut impl BufMut, s: &str) {
    write_bytes(dst, s.as_bytes());
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use bytes::BytesMut;

    #[test]
    fn test_string_roundtrip() {
        let original = "Hello, 世界!";
        let mut buf = BytesMut::new();
        write_string(&mut buf, original);

        assert_eq!(buf.len(), 4 + original.len());

        let mut cursor = buf.freeze();
        let decoded = read_string(&mut cursor, "test").unwrap();
        assert_eq!(decoded, original);
        assert!(!cursor.has_remaining());
    }

    #[test]
    fn test_truncated_string() {
        let mut buf = BytesMut::new();
        buf.put_u32(10);
        buf.put_slice(b"short");

        let mut cursor = buf.freeze();
        let err = read_string(&mut cursor, "test").unwrap_err();
        assert_eq!(
            err,
            ProtocolError::UnexpectedEof {
                needed: 10,
                remaining: 5
            }
        );
    }

    #[test]
    fn test_invalid_utf8() {
        let mut buf = BytesMut::new();
        write_bytes(&mut buf, &[0xff, 0xfe]);

        let mut cursor = buf.freeze();
        let err = read_string(&mut cursor, "message").unwrap_err();
        assert_eq!(err, ProtocolError::InvalidUtf8("message"));
    }

    #[test]
    fn test_integers_are_big_endian() {
        let mut cursor: &[u8] = &[0x00, 0x01, 0xff, 0xf1, 0x00, 0x00, 0x00];
        assert_eq!(read_u16(&mut cursor).unwrap(), 1);
        assert_eq!(read_u16(&mut cursor).unwrap(), 0xfff1);
        assert!(read_u32(&mut cursor).is_err());
    }
}
