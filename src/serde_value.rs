//! Conversion between any serde type and [`Value`].
//!
//! Structs and maps become anonymous objects, sequences dense arrays,
//! `serde_bytes` buffers byte arrays. Enums use the externally tagged
//! layout: a unit variant is its name, any other variant a one-member
//! object keyed by the name.

use serde::de::value::StringDeserializer;
use serde::de::{
    self, DeserializeOwned, DeserializeSeed, EnumAccess, IntoDeserializer, MapAccess, SeqAccess,
    VariantAccess, Visitor,
};
use serde::ser::{self, Serialize};

use crate::error::{Error, Result};
use crate::value::{ArrayRef, Object, ObjectRef, Value};

/// Deepest nesting `from_value` follows; deeper graphs are almost
/// certainly cyclic.
const MAX_DEPTH: usize = 256;

/// Converts any serializable value into a [`Value`] graph.
pub fn to_value<T: ?Sized + Serialize>(value: &T) -> Result<Value> {
    value.serialize(ValueSerializer)
}

/// Rebuilds a `T` from a [`Value`] graph.
///
/// ```
/// use amf_codec::{Value, from_value};
///
/// let value = Value::object([("id", Value::Double(7.0))]);
///
/// #[derive(serde::Deserialize)]
/// struct Row {
///     id: u32,
/// }
///
/// let row: Row = from_value(&value).unwrap();
/// assert_eq!(row.id, 7);
/// ```
pub fn from_value<T: DeserializeOwned>(value: &Value) -> Result<T> {
    T::deserialize(ValueDeserializer::new(value.clone(), 0))
}

fn object_value(members: impl IntoIterator<Item = (String, Value)>) -> Value {
    let mut object = Object::anonymous();
    object.dynamic.extend(members);
    Value::Object(ObjectRef::new(object))
}

pub struct ValueSerializer;

impl ser::Serializer for ValueSerializer {
    type Ok = Value;
    type Error = Error;
    type SerializeSeq = SerializeVec;
    type SerializeTuple = SerializeVec;
    type SerializeTupleStruct = SerializeVec;
    type SerializeTupleVariant = SerializeTupleVariant;
    type SerializeMap = SerializeMap;
    type SerializeStruct = SerializeMap;
    type SerializeStructVariant = SerializeStructVariant;

    fn serialize_bool(self, v: bool) -> Result<Value> {
        Ok(Value::Bool(v))
    }

    fn serialize_i8(self, v: i8) -> Result<Value> {
        self.serialize_i64(v as i64)
    }

    fn serialize_i16(self, v: i16) -> Result<Value> {
        self.serialize_i64(v as i64)
    }

    fn serialize_i32(self, v: i32) -> Result<Value> {
        self.serialize_i64(v as i64)
    }

    fn serialize_i64(self, v: i64) -> Result<Value> {
        Ok(Value::Integer(v))
    }

    fn serialize_u8(self, v: u8) -> Result<Value> {
        self.serialize_i64(v as i64)
    }

    fn serialize_u16(self, v: u16) -> Result<Value> {
        self.serialize_i64(v as i64)
    }

    fn serialize_u32(self, v: u32) -> Result<Value> {
        self.serialize_i64(v as i64)
    }

    fn serialize_u64(self, v: u64) -> Result<Value> {
        Ok(i64::try_from(v).map_or(Value::Double(v as f64), Value::Integer))
    }

    fn serialize_f32(self, v: f32) -> Result<Value> {
        self.serialize_f64(v as f64)
    }

    fn serialize_f64(self, v: f64) -> Result<Value> {
        Ok(Value::Double(v))
    }

    fn serialize_char(self, v: char) -> Result<Value> {
        Ok(Value::String(v.to_string()))
    }

    fn serialize_str(self, v: &str) -> Result<Value> {
        Ok(Value::String(v.to_string()))
    }

    fn serialize_bytes(self, v: &[u8]) -> Result<Value> {
        Ok(Value::ByteArray(v.to_vec()))
    }

    fn serialize_none(self) -> Result<Value> {
        Ok(Value::Null)
    }

    fn serialize_some<T: ?Sized + Serialize>(self, value: &T) -> Result<Value> {
        value.serialize(self)
    }

    fn serialize_unit(self) -> Result<Value> {
        Ok(Value::Null)
    }

    fn serialize_unit_struct(self, _name: &'static str) -> Result<Value> {
        self.serialize_unit()
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
    ) -> Result<Value> {
        self.serialize_str(variant)
    }

    fn serialize_newtype_struct<T: ?Sized + Serialize>(
        self,
        _name: &'static str,
        value: &T,
    ) -> Result<Value> {
        value.serialize(self)
    }

    fn serialize_newtype_variant<T: ?Sized + Serialize>(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        value: &T,
    ) -> Result<Value> {
        Ok(object_value([(variant.to_string(), to_value(value)?)]))
    }

    fn serialize_seq(self, len: Option<usize>) -> Result<SerializeVec> {
        Ok(SerializeVec {
            items: Vec::with_capacity(len.unwrap_or(0)),
        })
    }

    fn serialize_tuple(self, len: usize) -> Result<SerializeVec> {
        self.serialize_seq(Some(len))
    }

    fn serialize_tuple_struct(self, _name: &'static str, len: usize) -> Result<SerializeVec> {
        self.serialize_seq(Some(len))
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        len: usize,
    ) -> Result<SerializeTupleVariant> {
        Ok(SerializeTupleVariant {
            variant,
            items: Vec::with_capacity(len),
        })
    }

    fn serialize_map(self, _len: Option<usize>) -> Result<SerializeMap> {
        Ok(SerializeMap {
            members: Vec::new(),
            next_key: None,
        })
    }

    fn serialize_struct(self, _name: &'static str, len: usize) -> Result<SerializeMap> {
        Ok(SerializeMap {
            members: Vec::with_capacity(len),
            next_key: None,
        })
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        len: usize,
    ) -> Result<SerializeStructVariant> {
        Ok(SerializeStructVariant {
            variant,
            members: Vec::with_capacity(len),
        })
    }
}

pub struct SerializeVec {
    items: Vec<Value>,
}

impl ser::SerializeSeq for SerializeVec {
    type Ok = Value;
    type Error = Error;

    fn serialize_element<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<()> {
        self.items.push(to_value(value)?);
        Ok(())
    }

    fn end(self) -> Result<Value> {
        Ok(Value::array(self.items))
    }
}

impl ser::SerializeTuple for SerializeVec {
    type Ok = Value;
    type Error = Error;

    fn serialize_element<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<()> {
        ser::SerializeSeq::serialize_element(self, value)
    }

    fn end(self) -> Result<Value> {
        ser::SerializeSeq::end(self)
    }
}

impl ser::SerializeTupleStruct for SerializeVec {
    type Ok = Value;
    type Error = Error;

    fn serialize_field<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<()> {
        ser::SerializeSeq::serialize_element(self, value)
    }

    fn end(self) -> Result<Value> {
        ser::SerializeSeq::end(self)
    }
}

pub struct SerializeTupleVariant {
    variant: &'static str,
    items: Vec<Value>,
}

impl ser::SerializeTupleVariant for SerializeTupleVariant {
    type Ok = Value;
    type Error = Error;

    fn serialize_field<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<()> {
        self.items.push(to_value(value)?);
        Ok(())
    }

    fn end(self) -> Result<Value> {
        Ok(object_value([(
            self.variant.to_string(),
            Value::array(self.items),
        )]))
    }
}

pub struct SerializeMap {
    members: Vec<(String, Value)>,
    next_key: Option<String>,
}

/// Object member names are strings; integer and boolean keys are
/// rendered as text.
fn member_name(key: Value) -> Result<String> {
    match key {
        Value::String(s) => Ok(s),
        Value::Integer(i) => Ok(i.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        other => Err(Error::Serde(format!("map key must be a string, got {:?}", other))),
    }
}

impl ser::SerializeMap for SerializeMap {
    type Ok = Value;
    type Error = Error;

    fn serialize_key<T: ?Sized + Serialize>(&mut self, key: &T) -> Result<()> {
        self.next_key = Some(member_name(to_value(key)?)?);
        Ok(())
    }

    fn serialize_value<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<()> {
        let key = self
            .next_key
            .take()
            .ok_or_else(|| Error::Serde("map value without a key".to_string()))?;
        self.members.push((key, to_value(value)?));
        Ok(())
    }

    fn end(self) -> Result<Value> {
        Ok(object_value(self.members))
    }
}

impl ser::SerializeStruct for SerializeMap {
    type Ok = Value;
    type Error = Error;

    fn serialize_field<T: ?Sized + Serialize>(
        &mut self,
        key: &'static str,
        value: &T,
    ) -> Result<()> {
        self.members.push((key.to_string(), to_value(value)?));
        Ok(())
    }

    fn end(self) -> Result<Value> {
        Ok(object_value(self.members))
    }
}

pub struct SerializeStructVariant {
    variant: &'static str,
    members: Vec<(String, Value)>,
}

impl ser::SerializeStructVariant for SerializeStructVariant {
    type Ok = Value;
    type Error = Error;

    fn serialize_field<T: ?Sized + Serialize>(
        &mut self,
        key: &'static str,
        value: &T,
    ) -> Result<()> {
        self.members.push((key.to_string(), to_value(value)?));
        Ok(())
    }

    fn end(self) -> Result<Value> {
        Ok(object_value([(
            self.variant.to_string(),
            object_value(self.members),
        )]))
    }
}

pub struct ValueDeserializer {
    value: Value,
    depth: usize,
}

impl ValueDeserializer {
    fn new(value: Value, depth: usize) -> Self {
        ValueDeserializer { value, depth }
    }

    fn child(&self, value: Value) -> Result<ValueDeserializer> {
        ValueDeserializer::nested(value, self.depth)
    }

    fn nested(value: Value, depth: usize) -> Result<ValueDeserializer> {
        if depth >= MAX_DEPTH {
            return Err(Error::Serde("recursion limit exceeded".to_string()));
        }
        Ok(ValueDeserializer::new(value, depth + 1))
    }

    /// Integral doubles (AMF0 has no integers) are accepted for integer
    /// targets.
    fn deserialize_integer<'de, V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        match self.value {
            Value::Double(d) if d.fract() == 0.0 && d >= i64::MIN as f64 && d < i64::MAX as f64 => {
                visitor.visit_i64(d as i64)
            }
            Value::Double(d) if d.fract() == 0.0 && d >= 0.0 && d < u64::MAX as f64 => {
                visitor.visit_u64(d as u64)
            }
            _ => de::Deserializer::deserialize_any(self, visitor),
        }
    }
}

macro_rules! deserialize_integers {
    ($($method:ident)*) => {
        $(
            fn $method<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
                self.deserialize_integer(visitor)
            }
        )*
    };
}

impl<'de> de::Deserializer<'de> for ValueDeserializer {
    type Error = Error;

    fn deserialize_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        match self.value.clone() {
            Value::Null => visitor.visit_unit(),
            Value::Bool(b) => visitor.visit_bool(b),
            Value::Integer(i) => visitor.visit_i64(i),
            Value::Double(d) => visitor.visit_f64(d),
            Value::String(s) | Value::Xml(s) | Value::XmlDoc(s) => visitor.visit_string(s),
            Value::ByteArray(bytes) => visitor.visit_byte_buf(bytes),
            Value::Date(date) => visitor.visit_f64(date.millis()),
            Value::Array(array) => self.visit_array(&array, visitor),
            Value::Object(object) => {
                let members: Vec<(String, Value)> = object
                    .borrow()
                    .members()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect();
                visitor.visit_map(MapDeserializer::new(members, &self)?)
            }
            Value::Native(native) => Err(Error::Serde(format!(
                "cannot deserialize from a native value of type `{}`",
                native.type_name()
            ))),
        }
    }

    deserialize_integers! {
        deserialize_i8 deserialize_i16 deserialize_i32 deserialize_i64
        deserialize_u8 deserialize_u16 deserialize_u32 deserialize_u64
    }

    fn deserialize_option<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        match self.value {
            Value::Null => visitor.visit_none(),
            _ => visitor.visit_some(self),
        }
    }

    fn deserialize_newtype_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value> {
        visitor.visit_newtype_struct(self)
    }

    fn deserialize_enum<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _variants: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value> {
        match &self.value {
            Value::String(variant) => {
                let variant: StringDeserializer<Error> = variant.clone().into_deserializer();
                visitor.visit_enum(variant)
            }
            Value::Object(object) => {
                let members: Vec<(String, Value)> = object
                    .borrow()
                    .members()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect();
                let mut members = members.into_iter();
                match (members.next(), members.next()) {
                    (Some((variant, value)), None) => visitor.visit_enum(EnumDeserializer {
                        variant,
                        value: self.child(value)?,
                    }),
                    _ => Err(Error::Serde(
                        "enum must be an object with exactly one member".to_string(),
                    )),
                }
            }
            other => Err(Error::Serde(format!("expected an enum, got {:?}", other))),
        }
    }

    fn deserialize_ignored_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        visitor.visit_unit()
    }

    serde::forward_to_deserialize_any! {
        bool f32 f64 char str string bytes byte_buf unit unit_struct seq tuple
        tuple_struct map struct identifier i128 u128
    }
}

impl ValueDeserializer {
    fn visit_array<'de, V: Visitor<'de>>(&self, array: &ArrayRef, visitor: V) -> Result<V::Value> {
        let array = array.borrow();
        if array.associative.is_empty() {
            let items = array.dense.clone();
            drop(array);
            return visitor.visit_seq(SeqDeserializer {
                items: items.into_iter(),
                depth: self.depth,
            });
        }
        let members: Vec<(String, Value)> = array
            .dense
            .iter()
            .enumerate()
            .map(|(i, v)| (i.to_string(), v.clone()))
            .chain(array.associative.iter().map(|(k, v)| (k.clone(), v.clone())))
            .collect();
        drop(array);
        visitor.visit_map(MapDeserializer::new(members, self)?)
    }
}

struct SeqDeserializer {
    items: std::vec::IntoIter<Value>,
    depth: usize,
}

impl<'de> SeqAccess<'de> for SeqDeserializer {
    type Error = Error;

    fn next_element_seed<T: DeserializeSeed<'de>>(&mut self, seed: T) -> Result<Option<T::Value>> {
        match self.items.next() {
            Some(value) => seed
                .deserialize(ValueDeserializer::nested(value, self.depth)?)
                .map(Some),
            None => Ok(None),
        }
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.items.len())
    }
}

struct MapDeserializer {
    members: std::vec::IntoIter<(String, Value)>,
    pending: Option<Value>,
    depth: usize,
}

impl MapDeserializer {
    fn new(members: Vec<(String, Value)>, parent: &ValueDeserializer) -> Result<Self> {
        if parent.depth >= MAX_DEPTH {
            return Err(Error::Serde("recursion limit exceeded".to_string()));
        }
        Ok(MapDeserializer {
            members: members.into_iter(),
            pending: None,
            depth: parent.depth + 1,
        })
    }
}

impl<'de> MapAccess<'de> for MapDeserializer {
    type Error = Error;

    fn next_key_seed<K: DeserializeSeed<'de>>(&mut self, seed: K) -> Result<Option<K::Value>> {
        match self.members.next() {
            Some((key, value)) => {
                self.pending = Some(value);
                let key: StringDeserializer<Error> = key.into_deserializer();
                seed.deserialize(key).map(Some)
            }
            None => Ok(None),
        }
    }

    fn next_value_seed<V: DeserializeSeed<'de>>(&mut self, seed: V) -> Result<V::Value> {
        let value = self
            .pending
            .take()
            .ok_or_else(|| Error::Serde("map value without a key".to_string()))?;
        seed.deserialize(ValueDeserializer::new(value, self.depth))
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.members.len())
    }
}

struct EnumDeserializer {
    variant: String,
    value: ValueDeserializer,
}

impl<'de> EnumAccess<'de> for EnumDeserializer {
    type Error = Error;
    type Variant = ValueDeserializer;

    fn variant_seed<V: DeserializeSeed<'de>>(self, seed: V) -> Result<(V::Value, Self::Variant)> {
        let variant: StringDeserializer<Error> = self.variant.into_deserializer();
        let variant = seed.deserialize(variant)?;
        Ok((variant, self.value))
    }
}

impl<'de> VariantAccess<'de> for ValueDeserializer {
    type Error = Error;

    fn unit_variant(self) -> Result<()> {
        Ok(())
    }

    fn newtype_variant_seed<T: DeserializeSeed<'de>>(self, seed: T) -> Result<T::Value> {
        seed.deserialize(self)
    }

    fn tuple_variant<V: Visitor<'de>>(self, _len: usize, visitor: V) -> Result<V::Value> {
        de::Deserializer::deserialize_any(self, visitor)
    }

    fn struct_variant<V: Visitor<'de>>(
        self,
        _fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value> {
        de::Deserializer::deserialize_any(self, visitor)
    }
}
