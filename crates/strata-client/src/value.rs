//! Conversions between Rust values and wire elements.
//!
//! Each result element and each argument is an opaque byte string; scalar
//! values use big-endian network order. Richer codecs plug in by
//! implementing these traits for their own types.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::category::ErrorCategory;
use crate::error::{CodedError, Error, Result};

/// Types that can be decoded from one result element.
pub trait FromElement: Sized + Send {
    /// Decode an element.
    fn from_element(element: Bytes) -> Result<Self>;
}

/// Types that can be encoded as a query argument.
pub trait ToArgument {
    /// Encode the value.
    fn to_argument(&self) -> Bytes;
}

fn decode_error(expected: &'static str, detail: impl std::fmt::Display) -> Error {
    Error::Coded(CodedError::from_category(
        ErrorCategory::InternalClientError,
        format!("cannot decode {expected}: {detail}"),
    ))
}

fn fixed<const N: usize>(element: &Bytes, expected: &'static str) -> Result<()> {
    if element.len() == N {
        Ok(())
    } else {
        Err(decode_error(
            expected,
            format_args!("expected {N} bytes, got {}", element.len()),
        ))
    }
}

impl FromElement for Bytes {
    fn from_element(element: Bytes) -> Result<Self> {
        Ok(element)
    }
}

impl FromElement for Vec<u8> {
    fn from_element(element: Bytes) -> Result<Self> {
        Ok(element.to_vec())
    }
}

impl FromElement for String {
    fn from_element(element: Bytes) -> Result<Self> {
        String::from_utf8(element.to_vec()).map_err(|err| decode_error("str", err))
    }
}

impl FromElement for bool {
    fn from_element(element: Bytes) -> Result<Self> {
        fixed::<1>(&element, "bool")?;
        match element[0] {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(decode_error("bool", format_args!("invalid byte {other}"))),
        }
    }
}

macro_rules! scalar_element {
    ($ty:ty, $name:literal, $size:literal, $get:ident, $put:ident) => {
        impl FromElement for $ty {
            fn from_element(mut element: Bytes) -> Result<Self> {
                fixed::<$size>(&element, $name)?;
                Ok(element.$get())
            }
        }

        impl ToArgument for $ty {
            fn to_argument(&self) -> Bytes {
                let mut buf = BytesMut::with_capacity($size);
                buf.$put(*self);
                buf.freeze()
            }
        }
    };
}

scalar_element!(i16, "int16", 2, get_i16, put_i16);
scalar_element!(i32, "int32", 4, get_i32, put_i32);
scalar_element!(i64, "int64", 8, get_i64, put_i64);
scalar_element!(f64, "float64", 8, get_f64, put_f64);

impl ToArgument for bool {
    fn to_argument(&self) -> Bytes {
        Bytes::copy_from_slice(&[u8::from(*self)])
    }
}

impl ToArgument for str {
    fn to_argument(&self) -> Bytes {
        Bytes::copy_from_slice(self.as_bytes())
    }
}

impl ToArgument for String {
    fn to_argument(&self) -> Bytes {
        self.as_str().to_argument()
    }
}

impl ToArgument for Bytes {
    fn to_argument(&self) -> Bytes {
        self.clone()
    }
}

impl ToArgument for [u8] {
    fn to_argument(&self) -> Bytes {
        Bytes::copy_from_slice(self)
    }
}

impl ToArgument for Vec<u8> {
    fn to_argument(&self) -> Bytes {
        self.as_slice().to_argument()
    }
}

impl<T: ToArgument + ?Sized> ToArgument for &T {
    fn to_argument(&self) -> Bytes {
        (**self).to_argument()
    }
}

/// Encode a list of arguments.
pub(crate) fn encode_args(args: &[&(dyn ToArgument + Sync)]) -> Vec<Bytes> {
    args.iter().map(|arg| arg.to_argument()).collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_elements() {
        assert_eq!(i16::from_element(Bytes::from_static(&[0x01, 0x02])).unwrap(), 0x0102);
        assert_eq!(
            i32::from_element(Bytes::from_static(&[0xff, 0xff, 0xff, 0xfe])).unwrap(),
            -2
        );
        assert_eq!(i64::from_element(42i64.to_argument()).unwrap(), 42);
        assert!((f64::from_element(1.5f64.to_argument()).unwrap() - 1.5).abs() < f64::EPSILON);
        assert!(bool::from_element(Bytes::from_static(&[1])).unwrap());
        assert!(!bool::from_element(false.to_argument()).unwrap());
    }

    #[test]
    fn test_wrong_width_is_rejected() {
        let err = i32::from_element(Bytes::from_static(&[0x01, 0x02])).unwrap_err();
        assert_eq!(err.to_string(), "cannot decode int32: expected 4 bytes, got 2");
        assert!(err.category(ErrorCategory::InternalClientError));

        assert!(bool::from_element(Bytes::from_static(&[2])).is_err());
    }

    #[test]
    fn test_string_element() {
        assert_eq!(
            String::from_element(Bytes::from_static("héllo".as_bytes())).unwrap(),
            "héllo"
        );
        assert!(String::from_element(Bytes::from_static(&[0xff, 0xfe])).is_err());
    }

    #[test]
    fn test_encode_args() {
        let name = String::from("alice");
        let args = encode_args(&[&7i32, &name, &"x"]);
        assert_eq!(args.len(), 3);
        assert_eq!(&args[0][..], &[0, 0, 0, 7]);
        assert_eq!(&args[1][..], b"alice");
        assert_eq!(&args[2][..], b"x");
    }
}
