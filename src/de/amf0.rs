use log::debug;

use super::{Decoder, Step};
use crate::error::DecodeErrorKind;
use crate::read::Source;
use crate::reference::{DecodeTables, RefKind};
use crate::value::{ArrayRef, Value};
use crate::wire::amf0 as marker;

impl<S: Source> Decoder<'_, S> {
    pub(super) fn amf0_value(&mut self, tables: &mut DecodeTables) -> Step<Value> {
        let m = self.source.read_u8()?;
        self.amf0_after_marker(m, tables)
    }

    fn amf0_after_marker(&mut self, m: u8, tables: &mut DecodeTables) -> Step<Value> {
        self.nested(|de| de.amf0_marker(m, tables))
    }

    fn amf0_marker(&mut self, m: u8, tables: &mut DecodeTables) -> Step<Value> {
        match m {
            marker::NUMBER => Ok(Value::Double(self.source.read_f64()?)),
            marker::BOOLEAN => Ok(Value::Bool(self.source.read_u8()? != 0)),
            marker::STRING => self.amf0_string().map(Value::String),
            marker::LONG_STRING => self.amf0_long_string().map(Value::String),
            marker::XML_DOCUMENT => self.amf0_long_string().map(Value::XmlDoc),
            marker::NULL | marker::UNDEFINED | marker::UNSUPPORTED => Ok(Value::Null),
            marker::OBJECT => self.amf0_object(tables, None),
            marker::TYPED_OBJECT => {
                let alias = self.amf0_string()?;
                self.amf0_object(tables, Some(alias))
            }
            marker::REFERENCE => {
                let id = self.source.read_u16()?;
                self.resolve(tables, RefKind::Object, id as u32)
            }
            marker::ECMA_ARRAY => self.amf0_ecma_array(tables),
            marker::STRICT_ARRAY => self.amf0_strict_array(tables),
            marker::DATE => {
                let millis = self.source.read_f64()?;
                // time zone, unused by every known writer
                self.source.read_i16()?;
                Ok(Value::date(millis))
            }
            marker::AVMPLUS => {
                debug!("switching to AMF3 at byte offset {}", self.source.offset());
                let mut amf3 = self.tables();
                self.amf3_value(&mut amf3)
            }
            other => Err(DecodeErrorKind::UnknownMarker(other)),
        }
    }

    fn amf0_string(&mut self) -> Step<String> {
        let len = self.source.read_u16()?;
        self.source.read_string(len as usize)
    }

    fn amf0_long_string(&mut self) -> Step<String> {
        let len = self.source.read_u32()?;
        self.source.read_string(len as usize)
    }

    /// Members of an anonymous object are dynamic, those of a typed
    /// object sealed.
    fn amf0_object(&mut self, tables: &mut DecodeTables, alias: Option<String>) -> Step<Value> {
        let id = tables.reserve(RefKind::Object)?;
        let typed = alias.is_some();
        let shell = self.shell(tables, id, alias.as_deref(), &[])?;
        loop {
            let key = self.amf0_string()?;
            let m = self.source.read_u8()?;
            if m == marker::OBJECT_END {
                break;
            }
            let value = self.amf0_after_marker(m, tables)?;
            if typed {
                shell.set_sealed(key, value);
            } else {
                shell.set_dynamic(key, value);
            }
        }
        Ok(shell.into_value())
    }

    fn amf0_strict_array(&mut self, tables: &mut DecodeTables) -> Step<Value> {
        let count = self.source.read_u32()?;
        let count = self.count(count)?;
        let id = tables.reserve(RefKind::Array)?;
        let array = ArrayRef::default();
        tables.fill(RefKind::Array, id, Value::Array(array.clone()))?;
        for _ in 0..count {
            let item = self.amf0_value(tables)?;
            array.borrow_mut().dense.push(item);
        }
        Ok(Value::Array(array))
    }

    fn amf0_ecma_array(&mut self, tables: &mut DecodeTables) -> Step<Value> {
        // the count is only a hint
        self.source.read_u32()?;
        let id = tables.reserve(RefKind::Array)?;
        let array = ArrayRef::default();
        tables.fill(RefKind::Array, id, Value::Array(array.clone()))?;
        loop {
            let key = self.amf0_string()?;
            let m = self.source.read_u8()?;
            if m == marker::OBJECT_END {
                break;
            }
            let item = self.amf0_after_marker(m, tables)?;
            let mut contents = array.borrow_mut();
            let len = contents.dense.len();
            match dense_index(&key) {
                Some(index) if index < len => contents.dense[index] = item,
                Some(index) if index == len => {
                    contents.dense.push(item);
                    // keys that arrived early join once the gap closes
                    loop {
                        let next = contents.dense.len().to_string();
                        match contents.associative.shift_remove(&next) {
                            Some(item) => contents.dense.push(item),
                            None => break,
                        }
                    }
                }
                _ => {
                    contents.associative.insert(key, item);
                }
            }
        }
        Ok(Value::Array(array))
    }
}

/// Index of a canonical non-negative integer key ("0", "17", not "017").
fn dense_index(key: &str) -> Option<usize> {
    let canonical = !key.is_empty()
        && key.bytes().all(|b| b.is_ascii_digit())
        && (key.len() == 1 || !key.starts_with('0'));
    if canonical { key.parse().ok() } else { None }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(bytes: &[u8]) -> Result<Value, crate::DecodeError> {
        Decoder::from_slice(bytes).decode()
    }

    #[test]
    fn test_dense_index() {
        assert_eq!(dense_index("0"), Some(0));
        assert_eq!(dense_index("17"), Some(17));
        assert_eq!(dense_index("017"), None);
        assert_eq!(dense_index("-1"), None);
        assert_eq!(dense_index("x"), None);
        assert_eq!(dense_index(""), None);
    }

    #[test]
    fn test_scalars() {
        assert_eq!(decode(&[0x05]).unwrap(), Value::Null);
        assert_eq!(decode(&[0x06]).unwrap(), Value::Null);
        assert_eq!(decode(&[0x0D]).unwrap(), Value::Null);
        assert_eq!(decode(&[0x01, 0x01]).unwrap(), Value::Bool(true));
        assert_eq!(
            decode(&[0x00, 0x40, 0x09, 0x21, 0xFB, 0x54, 0x44, 0x2D, 0x18]).unwrap(),
            Value::Double(std::f64::consts::PI)
        );
        assert_eq!(
            decode(&[0x0C, 0x00, 0x00, 0x00, 0x02, b'h', b'i']).unwrap(),
            Value::from("hi")
        );
    }

    #[test]
    fn test_date_ignores_time_zone() {
        let bytes = [0x0B, 0x40, 0x8F, 0x40, 0x00, 0x00, 0x00, 0x00, 0x00, 0xFF, 0xC4];
        assert_eq!(decode(&bytes).unwrap(), Value::date(1000.0));
    }

    #[test]
    fn test_reserved_markers_rejected() {
        for m in [0x04, 0x0E, 0x12] {
            let err = decode(&[m]).unwrap_err();
            assert!(matches!(err.kind(), DecodeErrorKind::UnknownMarker(x) if *x == m));
        }
    }

    #[test]
    fn test_ecma_array_splits_keys() {
        let bytes = [
            0x08, 0x00, 0x00, 0x00, 0x03, // hint
            0x00, 0x01, b'1', 0x02, 0x00, 0x01, b'b', //
            0x00, 0x01, b'0', 0x02, 0x00, 0x01, b'a', //
            0x00, 0x03, b'k', b'e', b'y', 0x05, //
            0x00, 0x00, 0x09,
        ];
        let value = decode(&bytes).unwrap();
        let array = value.as_array().unwrap().borrow();
        assert_eq!(array.dense, vec![Value::from("a"), Value::from("b")]);
        assert_eq!(array.associative.get("key"), Some(&Value::Null));
    }

    #[test]
    fn test_ecma_array_sparse_key_stays_associative() {
        let mut bytes = vec![0x08, 0x00, 0x00, 0x00, 0x01, 0x00, 0x07];
        bytes.extend_from_slice(b"1048575");
        bytes.extend_from_slice(&[0x05, 0x00, 0x00, 0x09]);
        let value = decode(&bytes).unwrap();
        let array = value.as_array().unwrap().borrow();
        assert!(array.dense.is_empty());
        assert_eq!(array.associative.get("1048575"), Some(&Value::Null));
    }

    #[test]
    fn test_ecma_array_gap_is_not_filled() {
        // "2" arrives with no "1" before it
        let bytes = [
            0x08, 0x00, 0x00, 0x00, 0x02, //
            0x00, 0x01, b'0', 0x01, 0x00, //
            0x00, 0x01, b'2', 0x01, 0x01, //
            0x00, 0x00, 0x09,
        ];
        let value = decode(&bytes).unwrap();
        let array = value.as_array().unwrap().borrow();
        assert_eq!(array.dense, vec![Value::Bool(false)]);
        assert_eq!(array.associative.get("2"), Some(&Value::Bool(true)));
    }

    #[test]
    fn test_xml_document() {
        let bytes = [0x0F, 0x00, 0x00, 0x00, 0x03, b'<', b'a', b'>'];
        assert_eq!(decode(&bytes).unwrap(), Value::XmlDoc("<a>".into()));
    }

    #[test]
    fn test_object_self_reference() {
        // {self: <ref 0>}
        let bytes = [
            0x03, 0x00, 0x04, b's', b'e', b'l', b'f', 0x07, 0x00, 0x00, 0x00, 0x00, 0x09,
        ];
        let value = decode(&bytes).unwrap();
        let inner = value.as_object().unwrap().borrow().get("self").cloned().unwrap();
        assert!(inner.same_instance(&value));
    }

    #[test]
    fn test_reference_out_of_range() {
        let err = decode(&[0x07, 0x00, 0x03]).unwrap_err();
        assert!(matches!(
            err.kind(),
            DecodeErrorKind::InvalidReferenceIndex {
                table: RefKind::Object,
                index: 3
            }
        ));
    }

    #[test]
    fn test_unmapped_typed_object_keeps_alias() {
        let bytes = [
            0x10, 0x00, 0x03, b'o', b'r', b'g', //
            0x00, 0x01, b'n', 0x00, 0x3F, 0xF0, 0, 0, 0, 0, 0, 0, //
            0x00, 0x00, 0x09,
        ];
        let value = decode(&bytes).unwrap();
        let object = value.as_object().unwrap().borrow();
        assert_eq!(object.alias.as_deref(), Some("org"));
        assert_eq!(object.sealed.get("n"), Some(&Value::Double(1.0)));
    }

    #[test]
    fn test_avmplus_switch() {
        // AMF3 integer 5 inside an AMF0 stream
        assert_eq!(decode(&[0x11, 0x04, 0x05]).unwrap(), Value::Integer(5));
    }
}
