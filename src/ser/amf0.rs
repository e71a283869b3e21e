use std::io::Write;

use log::debug;

use super::{Encoder, Step};
use crate::error::EncodeError;
use crate::reference::EncodeTables;
use crate::value::{ArrayRef, Value};
use crate::wire::amf0 as marker;

impl<W: Write> Encoder<'_, W> {
    pub(super) fn amf0_value(&mut self, value: &Value, tables: &mut EncodeTables) -> Step {
        self.nested(|en| en.amf0_marker(value, tables))
    }

    fn amf0_marker(&mut self, value: &Value, tables: &mut EncodeTables) -> Step {
        match value {
            Value::Null => self.write_u8(marker::NULL),
            Value::Bool(b) => self.write_all(&[marker::BOOLEAN, *b as u8]),
            Value::Integer(i) => {
                self.write_u8(marker::NUMBER)?;
                self.write_f64(*i as f64)
            }
            Value::Double(d) => {
                self.write_u8(marker::NUMBER)?;
                self.write_f64(*d)
            }
            Value::String(s) if s.len() <= u16::MAX as usize => {
                self.write_u8(marker::STRING)?;
                self.amf0_utf8(s)
            }
            Value::String(s) => {
                self.write_u8(marker::LONG_STRING)?;
                self.amf0_long_utf8(s)
            }
            Value::XmlDoc(text) => {
                self.write_u8(marker::XML_DOCUMENT)?;
                self.amf0_long_utf8(text)
            }
            Value::Date(date) => {
                self.write_u8(marker::DATE)?;
                self.write_f64(date.millis())?;
                self.write_all(&[0x00, 0x00])
            }
            Value::ByteArray(_) | Value::Xml(_) => self.amf3_switch(value),
            Value::Array(array) => {
                if self.amf0_reference(array.addr(), tables)? {
                    return Ok(());
                }
                self.amf0_array(array, tables)
            }
            Value::Object(object) => {
                if object.borrow().external.is_some() {
                    return self.amf3_switch(value);
                }
                if self.amf0_reference(object.addr(), tables)? {
                    return Ok(());
                }
                let object = object.borrow();
                match &object.alias {
                    Some(alias) => {
                        self.write_u8(marker::TYPED_OBJECT)?;
                        self.amf0_utf8(alias)?;
                    }
                    None => self.write_u8(marker::OBJECT)?,
                }
                self.amf0_members(object.members(), tables)
            }
            Value::Native(native) => {
                let descriptor = self.adapter(native)?;
                if descriptor.is_externalizable() {
                    return self.amf3_switch(value);
                }
                if self.amf0_reference(native.addr(), tables)? {
                    return Ok(());
                }
                match descriptor.alias() {
                    Some(alias) => {
                        self.write_u8(marker::TYPED_OBJECT)?;
                        self.amf0_utf8(alias)?;
                    }
                    None => self.write_u8(marker::OBJECT)?,
                }
                let members = descriptor.members(native);
                self.amf0_members(members.iter().map(|(name, value)| (name, value)), tables)?;
                tables.retain(members.into_iter().map(|(_, value)| value));
                Ok(())
            }
        }
    }

    /// AMF0 has no byte arrays, E4X XML or externalizable objects; those
    /// go out as AMF3 with their own tables and take no AMF0 id.
    fn amf3_switch(&mut self, value: &Value) -> Step {
        debug!("switching to AMF3 for a value AMF0 cannot express");
        self.write_u8(marker::AVMPLUS)?;
        let mut tables = EncodeTables::new();
        self.amf3_value(value, &mut tables)
    }

    /// Writes a back-reference if the instance was seen, otherwise gives it
    /// the next id. Returns true if the reference was written.
    fn amf0_reference(&mut self, addr: usize, tables: &mut EncodeTables) -> Result<bool, EncodeError> {
        match tables.lookup_identity(addr) {
            Some(id) if id <= u16::MAX as u32 => {
                self.write_u8(marker::REFERENCE)?;
                self.write_u16(id as u16)?;
                Ok(true)
            }
            Some(_) => {
                // beyond the 16-bit index; written inline again
                tables.assign_anonymous();
                Ok(false)
            }
            None => {
                tables.assign_identity(addr);
                Ok(false)
            }
        }
    }

    fn amf0_array(&mut self, array: &ArrayRef, tables: &mut EncodeTables) -> Step {
        let array = array.borrow();
        if array.associative.is_empty() {
            self.write_u8(marker::STRICT_ARRAY)?;
            self.write_u32(amf0_count(array.dense.len())?)?;
            for (i, item) in array.dense.iter().enumerate() {
                self.amf0_value(item, tables).map_err(|e| e.at_index(i))?;
            }
            return Ok(());
        }

        self.write_u8(marker::ECMA_ARRAY)?;
        self.write_u32(amf0_count(array.dense.len() + array.associative.len())?)?;
        for (i, item) in array.dense.iter().enumerate() {
            self.amf0_utf8(&i.to_string())?;
            self.amf0_value(item, tables).map_err(|e| e.at_index(i))?;
        }
        self.amf0_members(&array.associative, tables)
    }

    /// Key/value pairs closed by the empty key and the object-end marker.
    fn amf0_members<'v>(
        &mut self,
        members: impl IntoIterator<Item = (&'v String, &'v Value)>,
        tables: &mut EncodeTables,
    ) -> Step {
        for (name, value) in members {
            if name.is_empty() {
                debug!("skipping member with an empty name");
                continue;
            }
            self.amf0_utf8(name)?;
            self.amf0_value(value, tables).map_err(|e| e.at_member(name))?;
        }
        self.write_all(&[0x00, 0x00, marker::OBJECT_END])
    }

    fn amf0_utf8(&mut self, s: &str) -> Step {
        let len = u16::try_from(s.len())
            .map_err(|_| EncodeError::unencodable(format!("short string of {} bytes", s.len())))?;
        self.write_u16(len)?;
        self.write_all(s.as_bytes())
    }

    fn amf0_long_utf8(&mut self, s: &str) -> Step {
        self.write_u32(amf0_count(s.len())?)?;
        self.write_all(s.as_bytes())
    }
}

fn amf0_count(len: usize) -> Result<u32, EncodeError> {
    u32::try_from(len).map_err(|_| EncodeError::unencodable(format!("sequence of {} items", len)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::class_mapper::ClassMapper;
    use crate::codec::{CodecConfig, ObjectEncoding};

    fn encode(value: &Value) -> Vec<u8> {
        let config = CodecConfig {
            object_encoding: ObjectEncoding::Amf0,
            ..CodecConfig::default()
        };
        let mut encoder = Encoder::with_mapper(Vec::new(), ClassMapper::empty(), config);
        encoder.encode(value).unwrap();
        encoder.into_inner()
    }

    #[test]
    fn test_numbers_are_doubles() {
        let mut expected = vec![0x00];
        expected.extend_from_slice(&3f64.to_be_bytes());
        assert_eq!(encode(&Value::Integer(3)), expected);
    }

    #[test]
    fn test_strict_array() {
        assert_eq!(
            encode(&Value::array(vec![Value::Null])),
            vec![0x0A, 0x00, 0x00, 0x00, 0x01, 0x05]
        );
    }

    #[test]
    fn test_ecma_array() {
        let array = ArrayRef::from_values(vec![Value::Null]);
        array.borrow_mut().associative.insert("k".into(), Value::Bool(false));
        assert_eq!(
            encode(&Value::Array(array)),
            vec![
                0x08, 0x00, 0x00, 0x00, 0x02, //
                0x00, 0x01, b'0', 0x05, //
                0x00, 0x01, b'k', 0x01, 0x00, //
                0x00, 0x00, 0x09,
            ]
        );
    }

    #[test]
    fn test_repeated_object_is_referenced() {
        let child = Value::object(Vec::<(String, Value)>::new());
        let value = Value::array(vec![child.clone(), child]);
        assert_eq!(
            encode(&value),
            vec![
                0x0A, 0x00, 0x00, 0x00, 0x02, //
                0x03, 0x00, 0x00, 0x09, //
                0x07, 0x00, 0x01,
            ]
        );
    }

    #[test]
    fn test_typed_object() {
        let value = Value::typed_object("P", [("x", Value::Null)]);
        assert_eq!(
            encode(&value),
            vec![0x10, 0x00, 0x01, b'P', 0x00, 0x01, b'x', 0x05, 0x00, 0x00, 0x09]
        );
    }

    #[test]
    fn test_byte_array_switches_to_amf3() {
        let value = Value::array(vec![Value::ByteArray(vec![7]), Value::array(vec![])]);
        assert_eq!(
            encode(&value),
            vec![
                0x0A, 0x00, 0x00, 0x00, 0x02, //
                0x11, 0x0C, 0x03, 0x07, //
                0x0A, 0x00, 0x00, 0x00, 0x00,
            ]
        );
    }

    #[test]
    fn test_xml_kinds() {
        assert_eq!(
            encode(&Value::XmlDoc("<a/>".into())),
            vec![0x0F, 0x00, 0x00, 0x00, 0x04, b'<', b'a', b'/', b'>']
        );
        assert_eq!(
            encode(&Value::Xml("<a/>".into())),
            vec![0x11, 0x0B, 0x09, b'<', b'a', b'/', b'>']
        );
    }

    #[test]
    fn test_date_has_zero_time_zone() {
        let mut expected = vec![0x0B];
        expected.extend_from_slice(&1000f64.to_be_bytes());
        expected.extend_from_slice(&[0x00, 0x00]);
        assert_eq!(encode(&Value::date(1000.0)), expected);
    }
}
