use std::rc::Rc;

use super::{Decoder, Step, inline_trait};
use crate::error::DecodeErrorKind;
use crate::read::Source;
use crate::reference::{DecodeTables, RefKind};
use crate::value::{ArrayRef, Value};
use crate::wire::{amf3 as marker, u29_to_i29};

/// Splits a U29 header into (is_inline, payload).
fn header(raw: u32) -> (bool, u32) {
    (raw & 1 == 1, raw >> 1)
}

impl<S: Source> Decoder<'_, S> {
    pub(super) fn amf3_value(&mut self, tables: &mut DecodeTables) -> Step<Value> {
        let m = self.source.read_u8()?;
        self.nested(|de| de.amf3_marker(m, tables))
    }

    fn amf3_marker(&mut self, m: u8, tables: &mut DecodeTables) -> Step<Value> {
        match m {
            marker::UNDEFINED | marker::NULL => Ok(Value::Null),
            marker::FALSE => Ok(Value::Bool(false)),
            marker::TRUE => Ok(Value::Bool(true)),
            marker::INTEGER => {
                let raw = self.source.read_u29()?;
                Ok(Value::Integer(u29_to_i29(raw) as i64))
            }
            marker::DOUBLE => Ok(Value::Double(self.source.read_f64()?)),
            marker::STRING => self.amf3_string(tables).map(Value::String),
            marker::XML_DOC => self.amf3_xml(tables, Value::XmlDoc),
            marker::XML => self.amf3_xml(tables, Value::Xml),
            marker::DATE => self.amf3_date(tables),
            marker::ARRAY => self.amf3_array(tables),
            marker::OBJECT => self.amf3_object(tables),
            marker::BYTE_ARRAY => self.amf3_byte_array(tables),
            other => Err(DecodeErrorKind::UnknownMarker(other)),
        }
    }

    fn amf3_string(&mut self, tables: &mut DecodeTables) -> Step<String> {
        let (inline, payload) = header(self.source.read_u29()?);
        if !inline {
            let value = tables.resolve_string(payload)?;
            self.charge(value.len())?;
            return Ok(value);
        }
        let value = self.source.read_string(payload as usize)?;
        tables.assign_string(&value)?;
        Ok(value)
    }

    fn amf3_date(&mut self, tables: &mut DecodeTables) -> Step<Value> {
        let (inline, payload) = header(self.source.read_u29()?);
        if !inline {
            return self.resolve(tables, RefKind::Date, payload);
        }
        let value = Value::date(self.source.read_f64()?);
        tables.assign(RefKind::Date, value.clone())?;
        Ok(value)
    }

    /// XML text lives in the object table, not the string table.
    fn amf3_xml(&mut self, tables: &mut DecodeTables, kind: fn(String) -> Value) -> Step<Value> {
        let (inline, payload) = header(self.source.read_u29()?);
        if !inline {
            return self.resolve(tables, RefKind::Object, payload);
        }
        let value = kind(self.source.read_string(payload as usize)?);
        tables.assign(RefKind::Object, value.clone())?;
        Ok(value)
    }

    fn amf3_byte_array(&mut self, tables: &mut DecodeTables) -> Step<Value> {
        let (inline, payload) = header(self.source.read_u29()?);
        if !inline {
            return self.resolve(tables, RefKind::Object, payload);
        }
        let value = Value::ByteArray(self.source.read_vec(payload as usize)?);
        tables.assign(RefKind::Object, value.clone())?;
        Ok(value)
    }

    fn amf3_array(&mut self, tables: &mut DecodeTables) -> Step<Value> {
        let (inline, payload) = header(self.source.read_u29()?);
        if !inline {
            return self.resolve(tables, RefKind::Array, payload);
        }
        let count = self.count(payload)?;
        let id = tables.reserve(RefKind::Array)?;
        let array = ArrayRef::default();
        tables.fill(RefKind::Array, id, Value::Array(array.clone()))?;

        loop {
            let key = self.amf3_string(tables)?;
            if key.is_empty() {
                break;
            }
            let item = self.amf3_value(tables)?;
            array.borrow_mut().associative.insert(key, item);
        }
        for _ in 0..count {
            let item = self.amf3_value(tables)?;
            array.borrow_mut().dense.push(item);
        }
        Ok(Value::Array(array))
    }

    fn amf3_object(&mut self, tables: &mut DecodeTables) -> Step<Value> {
        let raw = self.source.read_u29()?;
        if raw & 1 == 0 {
            return self.resolve(tables, RefKind::Object, raw >> 1);
        }

        let class = if raw & 2 == 0 {
            let class = tables.resolve_trait(raw >> 2)?;
            // every object of the class copies its member names
            let names = class.sealed.iter().map(String::len).sum::<usize>();
            self.charge(names + class.alias.as_ref().map_or(0, String::len))?;
            class
        } else {
            let externalizable = raw & 4 != 0;
            let dynamic = raw & 8 != 0;
            let count = self.count(raw >> 4)?;
            let alias = self.amf3_string(tables)?;
            let mut sealed = Vec::with_capacity(count.min(64));
            for _ in 0..count {
                sealed.push(self.amf3_string(tables)?);
            }
            let class = Rc::new(inline_trait(alias, sealed, dynamic, externalizable));
            tables.assign_trait(class.clone())?;
            class
        };

        let id = tables.reserve(RefKind::Object)?;
        let shell = self.shell(tables, id, class.alias.as_deref(), &class.sealed)?;

        if class.externalizable {
            let payload = self.amf3_value(tables)?;
            shell.set_externalized(payload);
            return Ok(shell.into_value());
        }
        for name in &class.sealed {
            let value = self.amf3_value(tables)?;
            shell.set_sealed(name.clone(), value);
        }
        if class.dynamic {
            loop {
                let key = self.amf3_string(tables)?;
                if key.is_empty() {
                    break;
                }
                let value = self.amf3_value(tables)?;
                shell.set_dynamic(key, value);
            }
        }
        Ok(shell.into_value())
    }
}
