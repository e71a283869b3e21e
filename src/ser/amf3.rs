use std::io::Write;

use log::debug;

use super::{Encoder, Step};
use crate::error::EncodeError;
use crate::reference::{EncodeTables, RefKind};
use crate::value::{ArrayRef, NativeRef, ObjectRef, Trait, Value};
use crate::wire::{MAX_INTEGER, MAX_U29, amf3 as marker, fits_integer, i29_to_u29};

/// U29 header of an inline string, byte array or XML body.
fn inline_length(len: usize, what: &str) -> Result<u32, EncodeError> {
    if len as u64 > MAX_INTEGER as u64 {
        return Err(EncodeError::unencodable(format!("{} of {} bytes", what, len)));
    }
    Ok(((len as u32) << 1) | 1)
}

/// `id` shifted past `flag_bits` header flags, if the U29 has room for it.
fn reference(table: RefKind, id: u32, flag_bits: u32) -> Result<u32, EncodeError> {
    if id > MAX_U29 >> flag_bits {
        return Err(EncodeError::reference_overflow(table, id));
    }
    Ok(id << flag_bits)
}

fn no_members<'v>() -> std::iter::Empty<(&'v String, &'v Value)> {
    std::iter::empty()
}

impl<W: Write> Encoder<'_, W> {
    pub(super) fn amf3_value(&mut self, value: &Value, tables: &mut EncodeTables) -> Step {
        self.nested(|en| en.amf3_marker(value, tables))
    }

    fn amf3_marker(&mut self, value: &Value, tables: &mut EncodeTables) -> Step {
        match value {
            Value::Null => self.write_u8(marker::NULL),
            Value::Bool(false) => self.write_u8(marker::FALSE),
            Value::Bool(true) => self.write_u8(marker::TRUE),
            Value::Integer(i) if fits_integer(*i) => {
                self.write_u8(marker::INTEGER)?;
                self.write_u29(i29_to_u29(*i as i32))
            }
            Value::Integer(i) => {
                self.write_u8(marker::DOUBLE)?;
                self.write_f64(*i as f64)
            }
            Value::Double(d) => {
                self.write_u8(marker::DOUBLE)?;
                self.write_f64(*d)
            }
            Value::String(s) => {
                self.write_u8(marker::STRING)?;
                self.amf3_string(s, tables)
            }
            Value::Date(date) => {
                self.write_u8(marker::DATE)?;
                let millis = date.millis();
                if let Some(id) = tables.lookup_date(millis) {
                    return self.write_u29(reference(RefKind::Date, id, 1)?);
                }
                tables.assign_date(millis);
                self.write_u29(1)?;
                self.write_f64(millis)
            }
            Value::ByteArray(bytes) => {
                self.write_u8(marker::BYTE_ARRAY)?;
                tables.assign_anonymous();
                self.write_u29(inline_length(bytes.len(), "byte array")?)?;
                self.write_all(bytes)
            }
            Value::Xml(text) => {
                self.write_u8(marker::XML)?;
                self.amf3_xml(text, tables)
            }
            Value::XmlDoc(text) => {
                self.write_u8(marker::XML_DOC)?;
                self.amf3_xml(text, tables)
            }
            Value::Array(array) => self.amf3_array(array, tables),
            Value::Object(object) => self.amf3_object(object, tables),
            Value::Native(native) => self.amf3_native(native, tables),
        }
    }

    fn amf3_xml(&mut self, text: &str, tables: &mut EncodeTables) -> Step {
        tables.assign_anonymous();
        self.write_u29(inline_length(text.len(), "xml document")?)?;
        self.write_all(text.as_bytes())
    }

    /// String body without a marker; also used for keys and trait names.
    fn amf3_string(&mut self, s: &str, tables: &mut EncodeTables) -> Step {
        if s.is_empty() {
            return self.write_u8(marker::EMPTY_STRING);
        }
        if let Some(id) = tables.lookup_string(s) {
            return self.write_u29(reference(RefKind::String, id, 1)?);
        }
        tables.assign_string(s);
        self.write_u29(inline_length(s.len(), "string")?)?;
        self.write_all(s.as_bytes())
    }

    fn amf3_array(&mut self, array: &ArrayRef, tables: &mut EncodeTables) -> Step {
        self.write_u8(marker::ARRAY)?;
        if let Some(id) = tables.lookup_identity(array.addr()) {
            return self.write_u29(reference(RefKind::Array, id, 1)?);
        }
        tables.assign_identity(array.addr());

        let array = array.borrow();
        self.write_u29(inline_length(array.dense.len(), "array")?)?;
        for (key, item) in &array.associative {
            if key.is_empty() {
                debug!("skipping array member with an empty key");
                continue;
            }
            self.amf3_string(key, tables)?;
            self.amf3_value(item, tables).map_err(|e| e.at_member(key))?;
        }
        self.write_u8(marker::EMPTY_STRING)?;
        for (i, item) in array.dense.iter().enumerate() {
            self.amf3_value(item, tables).map_err(|e| e.at_index(i))?;
        }
        Ok(())
    }

    fn amf3_object(&mut self, object: &ObjectRef, tables: &mut EncodeTables) -> Step {
        self.write_u8(marker::OBJECT)?;
        if let Some(id) = tables.lookup_identity(object.addr()) {
            return self.write_u29(reference(RefKind::Object, id, 1)?);
        }
        tables.assign_identity(object.addr());

        let object = object.borrow();
        let class = Trait {
            alias: object.alias.clone(),
            sealed: object.sealed.keys().cloned().collect(),
            dynamic: object.alias.is_none() || !object.dynamic.is_empty(),
            externalizable: object.external.is_some(),
        };
        self.amf3_members(
            class,
            &object.sealed,
            &object.dynamic,
            object.external.as_ref(),
            tables,
        )
    }

    /// Mapped types become typed objects with sealed members, bare
    /// adapters anonymous dynamic ones.
    fn amf3_native(&mut self, native: &NativeRef, tables: &mut EncodeTables) -> Step {
        let descriptor = self.adapter(native)?;
        self.write_u8(marker::OBJECT)?;
        if let Some(id) = tables.lookup_identity(native.addr()) {
            return self.write_u29(reference(RefKind::Object, id, 1)?);
        }
        tables.assign_identity(native.addr());

        if descriptor.is_externalizable() {
            let class = Trait {
                alias: descriptor.alias().map(str::to_string),
                externalizable: true,
                ..Trait::default()
            };
            let payload = descriptor.externalized(native);
            self.amf3_members(class, no_members(), no_members(), Some(&payload), tables)?;
            tables.retain([payload]);
            return Ok(());
        }

        let members = descriptor.members(native);
        let pairs = members.iter().map(|(name, value)| (name, value));
        match descriptor.alias() {
            Some(alias) => {
                let class = Trait {
                    alias: Some(alias.to_string()),
                    sealed: members.iter().map(|(name, _)| name.clone()).collect(),
                    dynamic: false,
                    externalizable: false,
                };
                self.amf3_members(class, pairs, no_members(), None, tables)?;
            }
            None => {
                let class = Trait {
                    dynamic: true,
                    ..Trait::default()
                };
                self.amf3_members(class, no_members(), pairs, None, tables)?;
            }
        }
        tables.retain(members.into_iter().map(|(_, value)| value));
        Ok(())
    }

    fn amf3_members<'v>(
        &mut self,
        class: Trait,
        sealed: impl IntoIterator<Item = (&'v String, &'v Value)>,
        dynamic: impl IntoIterator<Item = (&'v String, &'v Value)>,
        external: Option<&Value>,
        tables: &mut EncodeTables,
    ) -> Step {
        let (is_dynamic, externalizable) = (class.dynamic, class.externalizable);
        self.amf3_trait(class, tables)?;

        if externalizable {
            return match external {
                Some(payload) => self.amf3_value(payload, tables),
                None => self.amf3_value(&Value::Null, tables),
            };
        }
        for (name, value) in sealed {
            self.amf3_value(value, tables).map_err(|e| e.at_member(name))?;
        }
        if is_dynamic {
            for (name, value) in dynamic {
                if name.is_empty() {
                    debug!("skipping dynamic member with an empty name");
                    continue;
                }
                self.amf3_string(name, tables)?;
                self.amf3_value(value, tables).map_err(|e| e.at_member(name))?;
            }
            self.write_u8(marker::EMPTY_STRING)?;
        }
        Ok(())
    }

    fn amf3_trait(&mut self, class: Trait, tables: &mut EncodeTables) -> Step {
        if let Some(id) = tables.lookup_trait(&class) {
            return self.write_u29(reference(RefKind::Trait, id, 2)? | 0b01);
        }
        if class.sealed.len() as u64 > (MAX_U29 >> 4) as u64 {
            return Err(EncodeError::unencodable(format!(
                "class with {} sealed members",
                class.sealed.len()
            )));
        }
        let header = ((class.sealed.len() as u32) << 4)
            | ((class.dynamic as u32) << 3)
            | ((class.externalizable as u32) << 2)
            | 0b11;
        self.write_u29(header)?;
        self.amf3_string(class.alias.as_deref().unwrap_or(""), tables)?;
        for name in &class.sealed {
            self.amf3_string(name, tables)?;
        }
        tables.assign_trait(class);
        Ok(())
    }
}
