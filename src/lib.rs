//! # AMF Codec
//!
//! An encoder/decoder for the Action Message Format in both of its
//! generations, AMF0 and AMF3, with per-call reference tables and object
//! graphs that may contain cycles.
//!
//! ## Features
//! - Every AMF0 marker a conforming peer sends, including the AvmPlus
//!   switch into AMF3
//! - Every AMF3 marker: U29 integers, strings, dates, arrays with
//!   associative parts, traits, externalizable objects, XML and byte arrays
//! - Reference tables in both directions: repeated strings, dates, arrays
//!   and objects travel as indexes, and self-referential graphs decode to
//!   shared [`ArrayRef`]/[`ObjectRef`] handles
//! - A [`ClassMapper`] binding wire-visible class aliases to Rust types
//!   through the [`Reflectable`] trait; unmapped aliases fall back to a
//!   dynamic [`Object`] that keeps the alias
//! - Two interchangeable [`Codec`] backends selected from a
//!   serde-loadable [`CodecConfig`]
//! - A serde bridge ([`to_value`], [`from_value`], [`to_vec`],
//!   [`from_slice`]) for plain Rust types
//!
//! ## Byte arrays
//! Use `serde_bytes::ByteBuf` or `#[serde(with = "serde_bytes")]` so a
//! `Vec<u8>` travels as an AMF3 byte array (one length header plus the raw
//! bytes) rather than as an array of integers.
//!
//! ## Example
//! ```rust
//! use amf_codec::{from_slice, to_vec};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Debug, PartialEq, Serialize, Deserialize)]
//! struct Login {
//!     user: String,
//!     #[serde(with = "serde_bytes")]
//!     token: Vec<u8>,
//! }
//!
//! let login = Login { user: "ada".into(), token: vec![0xCA, 0xFE] };
//! let bytes = to_vec(&login).unwrap();
//! assert_eq!(bytes[0], 0x11); // AMF0 envelope switching to AMF3
//! assert_eq!(from_slice::<Login>(&bytes).unwrap(), login);
//! ```

mod class_mapper;
mod codec;
mod de;
mod equal;
mod error;
mod read;
mod reference;
mod ser;
mod serde_value;
mod value;
pub mod wire;

use serde::Serialize;
use serde::de::DeserializeOwned;

pub use class_mapper::{ClassMapper, Reflectable, TypeDescriptor};
pub use codec::{AcceleratedCodec, Backend, Codec, CodecConfig, ObjectEncoding, PortableCodec};
pub use de::Decoder;
pub use error::{
    DecodeError, DecodeErrorKind, EncodeError, EncodePath, Error, PathSegment, Result,
};
pub use read::{IoSource, SliceSource, Source};
pub use reference::RefKind;
pub use ser::Encoder;
pub use serde_value::{from_value, to_value};
pub use value::{Array, ArrayRef, Date, NativeRef, Object, ObjectRef, Trait, Value};

/// Decodes one AMF0 value with no class mappings and default limits.
/// Bytes after the value are ignored.
pub fn decode(bytes: &[u8]) -> std::result::Result<Value, DecodeError> {
    Decoder::from_slice(bytes).decode()
}

/// Decodes one raw AMF3 value.
pub fn decode_amf3(bytes: &[u8]) -> std::result::Result<Value, DecodeError> {
    Decoder::from_slice(bytes).decode_amf3()
}

/// Decodes consecutive AMF0 values, sharing one AMF0 reference cache,
/// until the input is exhausted.
pub fn decode_all(bytes: &[u8]) -> std::result::Result<Vec<Value>, DecodeError> {
    Decoder::from_slice(bytes).decode_all()
}

/// Encodes `value` as AMF0 switching to AMF3, which is how AMF3 values
/// travel in practice.
pub fn encode(value: &Value) -> std::result::Result<Vec<u8>, EncodeError> {
    let mut encoder = Encoder::new(Vec::new());
    encoder.encode(value)?;
    Ok(encoder.into_inner())
}

/// Encodes `value` as a raw AMF3 stream.
pub fn encode_amf3(value: &Value) -> std::result::Result<Vec<u8>, EncodeError> {
    let mut encoder = Encoder::new(Vec::new());
    encoder.encode_amf3(value)?;
    Ok(encoder.into_inner())
}

// Convenience functions
pub fn to_vec<T: ?Sized + Serialize>(value: &T) -> Result<Vec<u8>> {
    Ok(encode(&to_value(value)?)?)
}

pub fn from_slice<T: DeserializeOwned>(slice: &[u8]) -> Result<T> {
    from_value(&decode(slice)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use std::collections::HashMap;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Person {
        name: String,
        age: u32,
        emails: Vec<String>,
    }

    #[test]
    fn test_basic_types() {
        assert_eq!(from_slice::<u32>(&to_vec(&42u32).unwrap()).unwrap(), 42);
        assert_eq!(from_slice::<i32>(&to_vec(&-42i32).unwrap()).unwrap(), -42);
        assert!(from_slice::<bool>(&to_vec(&true).unwrap()).unwrap());
        assert_eq!(
            from_slice::<String>(&to_vec(&"hello".to_string()).unwrap()).unwrap(),
            "hello"
        );
        assert_eq!(from_slice::<f64>(&to_vec(&1.25f64).unwrap()).unwrap(), 1.25);
    }

    #[test]
    fn test_struct() {
        let person = Person {
            name: "Alice".to_string(),
            age: 30,
            emails: vec!["alice@example.com".to_string()],
        };
        let encoded = to_vec(&person).unwrap();
        // AvmPlus switch, then an anonymous dynamic object
        assert_eq!(&encoded[..3], &[0x11, 0x0A, 0x0B]);
        let decoded: Person = from_slice(&encoded).unwrap();
        assert_eq!(person, decoded);
    }

    #[test]
    fn test_map() {
        let mut map = HashMap::new();
        map.insert("key1".to_string(), 100);
        map.insert("key2".to_string(), 200);
        let decoded: HashMap<String, i32> = from_slice(&to_vec(&map).unwrap()).unwrap();
        assert_eq!(map, decoded);
    }

    #[test]
    fn test_option() {
        let some: Option<u8> = Some(3);
        let none: Option<u8> = None;
        assert_eq!(from_slice::<Option<u8>>(&to_vec(&some).unwrap()).unwrap(), some);
        assert_eq!(to_vec(&none).unwrap(), vec![0x11, 0x01]);
        assert_eq!(from_slice::<Option<u8>>(&to_vec(&none).unwrap()).unwrap(), none);
    }

    #[test]
    fn test_byte_buf() {
        let data = serde_bytes::ByteBuf::from(vec![1, 2, 3]);
        let encoded = to_vec(&data).unwrap();
        assert_eq!(encoded, vec![0x11, 0x0C, 0x07, 0x01, 0x02, 0x03]);
        let decoded: serde_bytes::ByteBuf = from_slice(&encoded).unwrap();
        assert_eq!(decoded, data);
    }

    #[test]
    fn test_amf0_numbers_into_integers() {
        // AMF0 has only doubles; integer targets still accept them.
        let mut bytes = vec![0x00];
        bytes.extend_from_slice(&7f64.to_be_bytes());
        assert_eq!(from_slice::<u64>(&bytes).unwrap(), 7);
    }

    #[test]
    fn test_top_level_helpers() {
        let value = Value::array(vec![Value::from(1), Value::from("a")]);
        assert_eq!(decode_amf3(&encode_amf3(&value).unwrap()).unwrap(), value);
        assert_eq!(decode(&encode(&value).unwrap()).unwrap(), value);

        let values = decode_all(&[0x05, 0x01, 0x01]).unwrap();
        assert_eq!(values, vec![Value::Null, Value::Bool(true)]);
    }

    #[test]
    fn test_decode_error_carries_offset() {
        let err = from_slice::<u8>(&[0x11, 0x04]).unwrap_err();
        match err {
            Error::Decode(e) => {
                assert!(matches!(e.kind(), DecodeErrorKind::TruncatedInput));
                assert_eq!(e.offset, 2);
            }
            other => panic!("unexpected error {:?}", other),
        }
    }
}
