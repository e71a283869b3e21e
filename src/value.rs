use indexmap::IndexMap;
use serde::{
    Deserialize, Deserializer, Serialize, Serializer,
    de::{self, Visitor},
    ser::{SerializeMap, SerializeSeq},
};
use std::any::{Any, TypeId};
use std::cell::{Ref, RefCell, RefMut};
use std::collections::HashSet;
use std::fmt;
use std::rc::Rc;

use crate::equal::deep_equal;

/// Dynamic AMF value graph.
///
/// Scalars are held inline. Arrays, objects and natives are shared handles
/// (`Rc<RefCell<_>>`), so the same instance can appear several times in a
/// graph, including as its own descendant. Cloning a `Value` clones the
/// handle, not the contents.
///
/// # Example
/// ```
/// use amf_codec::{Value, decode, encode};
///
/// let child = Value::object([("name", Value::from("leaf"))]);
/// let value = Value::array(vec![child.clone(), child]);
///
/// let bytes = encode(&value).unwrap();
/// let decoded = decode(&bytes).unwrap();
/// assert_eq!(value, decoded);
///
/// // the repeated child still points at one instance
/// let items = decoded.as_array().unwrap().borrow().dense.clone();
/// assert!(items[0].same_instance(&items[1]));
/// ```
#[derive(Clone, Default)]
pub enum Value {
    /// Null; AMF undefined also decodes to this
    #[default]
    Null,
    Bool(bool),
    /// Integer; only the 29-bit range goes out with the integer marker
    Integer(i64),
    Double(f64),
    String(String),
    ByteArray(Vec<u8>),
    Date(Date),
    /// E4X XML, AMF3 marker 0x0B
    Xml(String),
    /// Legacy XMLDocument, AMF0 marker 0x0F and AMF3 marker 0x07
    XmlDoc(String),
    Array(ArrayRef),
    Object(ObjectRef),
    /// A host value bound through the [`crate::ClassMapper`]
    Native(NativeRef),
}

/// Point in time as milliseconds since the Unix epoch, UTC.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Date(f64);

impl Date {
    pub fn from_millis(millis: f64) -> Self {
        Date(millis)
    }

    pub fn millis(&self) -> f64 {
        self.0
    }
}

/// Contents of an AMF array: the dense part plus string-keyed members.
#[derive(Debug, Clone, Default)]
pub struct Array {
    pub dense: Vec<Value>,
    pub associative: IndexMap<String, Value>,
}

/// Contents of an AMF object.
///
/// `alias` is the wire class name; `None` is an anonymous object. Sealed
/// members follow the class trait order, dynamic members follow them.
#[derive(Debug, Clone, Default)]
pub struct Object {
    pub alias: Option<String>,
    pub sealed: IndexMap<String, Value>,
    pub dynamic: IndexMap<String, Value>,
    /// Payload of an externalizable class
    pub external: Option<Value>,
}

impl Object {
    pub fn anonymous() -> Self {
        Object::default()
    }

    pub fn typed(alias: impl Into<String>) -> Self {
        Object {
            alias: Some(alias.into()),
            ..Object::default()
        }
    }

    /// Looks a member up, sealed members first.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.sealed.get(name).or_else(|| self.dynamic.get(name))
    }

    /// All members in wire order.
    pub fn members(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.sealed.iter().chain(self.dynamic.iter())
    }

    pub fn len(&self) -> usize {
        self.sealed.len() + self.dynamic.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Class trait: alias, sealed member names and flags.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Trait {
    pub alias: Option<String>,
    pub sealed: Vec<String>,
    pub dynamic: bool,
    pub externalizable: bool,
}

macro_rules! shared_handle {
    ($name:ident, $inner:ty, $label:literal) => {
        #[doc = concat!("Shared, mutable handle to ", $label, " contents.")]
        #[derive(Clone, Default)]
        pub struct $name(Rc<RefCell<$inner>>);

        impl $name {
            pub fn new(inner: $inner) -> Self {
                $name(Rc::new(RefCell::new(inner)))
            }

            pub fn borrow(&self) -> Ref<'_, $inner> {
                self.0.borrow()
            }

            pub fn borrow_mut(&self) -> RefMut<'_, $inner> {
                self.0.borrow_mut()
            }

            /// True if both handles point at the same instance.
            pub fn ptr_eq(&self, other: &Self) -> bool {
                Rc::ptr_eq(&self.0, &other.0)
            }

            /// Identity of the instance, stable while any handle lives.
            pub fn addr(&self) -> usize {
                Rc::as_ptr(&self.0) as *const () as usize
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                match VisitGuard::enter(self.addr()) {
                    Some(_guard) => fmt::Debug::fmt(&*self.0.borrow(), f),
                    None => write!(f, "<cycle {:#x}>", self.addr()),
                }
            }
        }
    };
}

shared_handle!(ArrayRef, Array, "an array's");
shared_handle!(ObjectRef, Object, "an object's");

impl ArrayRef {
    pub fn from_values(values: Vec<Value>) -> Self {
        ArrayRef::new(Array {
            dense: values,
            associative: IndexMap::new(),
        })
    }
}

/// Shared handle to a host value.
///
/// The codec only reaches inside through the adapter registered for the
/// value's type in the [`crate::ClassMapper`].
#[derive(Clone)]
pub struct NativeRef {
    inner: Rc<RefCell<dyn Any>>,
    type_id: TypeId,
    type_name: &'static str,
}

impl NativeRef {
    pub fn new<T: Any>(value: T) -> Self {
        NativeRef {
            inner: Rc::new(RefCell::new(value)),
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
        }
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn is<T: Any>(&self) -> bool {
        self.type_id == TypeId::of::<T>()
    }

    pub fn borrow<T: Any>(&self) -> Option<Ref<'_, T>> {
        Ref::filter_map(self.inner.borrow(), |v| v.downcast_ref::<T>()).ok()
    }

    pub fn borrow_mut<T: Any>(&self) -> Option<RefMut<'_, T>> {
        RefMut::filter_map(self.inner.borrow_mut(), |v| v.downcast_mut::<T>()).ok()
    }

    pub(crate) fn borrow_any(&self) -> Ref<'_, dyn Any> {
        self.inner.borrow()
    }

    pub(crate) fn borrow_any_mut(&self) -> RefMut<'_, dyn Any> {
        self.inner.borrow_mut()
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        self.addr() == other.addr()
    }

    pub fn addr(&self) -> usize {
        Rc::as_ptr(&self.inner) as *const () as usize
    }
}

impl fmt::Debug for NativeRef {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Native<{}>({:#x})", self.type_name, self.addr())
    }
}

thread_local! {
    static VISITING: RefCell<HashSet<usize>> = RefCell::new(HashSet::new());
}

/// Marks a shared instance as being walked by `Debug` or `Serialize`;
/// `enter` returns `None` when the instance is already on the stack.
struct VisitGuard(usize);

impl VisitGuard {
    fn enter(addr: usize) -> Option<Self> {
        VISITING
            .with(|v| v.borrow_mut().insert(addr))
            .then(|| VisitGuard(addr))
    }
}

impl Drop for VisitGuard {
    fn drop(&mut self) {
        VISITING.with(|v| {
            v.borrow_mut().remove(&self.0);
        });
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Value::Null => f.write_str("Null"),
            Value::Bool(b) => f.debug_tuple("Bool").field(b).finish(),
            Value::Integer(i) => f.debug_tuple("Integer").field(i).finish(),
            Value::Double(d) => f.debug_tuple("Double").field(d).finish(),
            Value::String(s) => f.debug_tuple("String").field(s).finish(),
            Value::ByteArray(b) => f.debug_tuple("ByteArray").field(b).finish(),
            Value::Date(d) => f.debug_tuple("Date").field(&d.millis()).finish(),
            Value::Xml(x) => f.debug_tuple("Xml").field(x).finish(),
            Value::XmlDoc(x) => f.debug_tuple("XmlDoc").field(x).finish(),
            Value::Array(a) => f.debug_tuple("Array").field(a).finish(),
            Value::Object(o) => f.debug_tuple("Object").field(o).finish(),
            Value::Native(n) => fmt::Debug::fmt(n, f),
        }
    }
}

/// Structural equality that terminates on cyclic graphs.
///
/// Two shared instances are equal if they are the same instance or their
/// contents are equal; a pair already under comparison is assumed equal.
/// Natives compare by identity only.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        deep_equal(self, other)
    }
}

impl Value {
    /// Builds an array value from dense elements.
    pub fn array(values: Vec<Value>) -> Self {
        Value::Array(ArrayRef::from_values(values))
    }

    /// Builds an anonymous object from dynamic members.
    pub fn object<K: Into<String>>(members: impl IntoIterator<Item = (K, Value)>) -> Self {
        let mut object = Object::anonymous();
        object
            .dynamic
            .extend(members.into_iter().map(|(k, v)| (k.into(), v)));
        Value::Object(ObjectRef::new(object))
    }

    /// Builds a typed object whose members are all sealed.
    pub fn typed_object<K: Into<String>>(
        alias: impl Into<String>,
        members: impl IntoIterator<Item = (K, Value)>,
    ) -> Self {
        let mut object = Object::typed(alias);
        object
            .sealed
            .extend(members.into_iter().map(|(k, v)| (k.into(), v)));
        Value::Object(ObjectRef::new(object))
    }

    pub fn native<T: Any>(value: T) -> Self {
        Value::Native(NativeRef::new(value))
    }

    pub fn date(millis: f64) -> Self {
        Value::Date(Date::from_millis(millis))
    }

    /// Returns true if the value is null
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn is_bool(&self) -> bool {
        matches!(self, Value::Bool(_))
    }

    pub fn is_integer(&self) -> bool {
        matches!(self, Value::Integer(_))
    }

    pub fn is_double(&self) -> bool {
        matches!(self, Value::Double(_))
    }

    pub fn is_string(&self) -> bool {
        matches!(self, Value::String(_))
    }

    pub fn is_array(&self) -> bool {
        matches!(self, Value::Array(_))
    }

    pub fn is_object(&self) -> bool {
        matches!(self, Value::Object(_))
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Numeric value of an integer or a double.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(i) => Some(*i as f64),
            Value::Double(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::ByteArray(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<Date> {
        match self {
            Value::Date(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&ArrayRef> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Value::Object(o) => Some(o),
            _ => None,
        }
    }

    pub fn as_native(&self) -> Option<&NativeRef> {
        match self {
            Value::Native(n) => Some(n),
            _ => None,
        }
    }

    /// True if both values are handles to the same shared instance.
    /// Scalars are never the same instance.
    pub fn same_instance(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Array(a), Value::Array(b)) => a.ptr_eq(b),
            (Value::Object(a), Value::Object(b)) => a.ptr_eq(b),
            (Value::Native(a), Value::Native(b)) => a.ptr_eq(b),
            _ => false,
        }
    }

    /// Compares a decoded object with the member view of a host value.
    ///
    /// This is the equality used when a class was not mapped on the
    /// receiving side: the object matches if it has exactly the given
    /// members with equal values, regardless of order or of the
    /// sealed/dynamic split.
    pub fn matches_members(&self, members: &[(String, Value)]) -> bool {
        let Some(object) = self.as_object() else {
            return false;
        };
        let object = object.borrow();
        object.len() == members.len()
            && members
                .iter()
                .all(|(name, value)| object.get(name).is_some_and(|v| v == value))
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Integer(v as i64)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<Date> for Value {
    fn from(v: Date) -> Self {
        Value::Date(v)
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Value::array(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

impl Serialize for Value {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        use serde::ser::Error;

        match self {
            Value::Null => serializer.serialize_none(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Integer(i) => serializer.serialize_i64(*i),
            Value::Double(d) => serializer.serialize_f64(*d),
            Value::String(s) | Value::Xml(s) | Value::XmlDoc(s) => serializer.serialize_str(s),
            Value::ByteArray(b) => serializer.serialize_bytes(b),
            Value::Date(d) => serializer.serialize_f64(d.millis()),
            Value::Array(a) => {
                let _guard = VisitGuard::enter(a.addr())
                    .ok_or_else(|| S::Error::custom("cannot serialize a cyclic array"))?;
                let array = a.borrow();
                if array.associative.is_empty() {
                    let mut seq = serializer.serialize_seq(Some(array.dense.len()))?;
                    for item in &array.dense {
                        seq.serialize_element(item)?;
                    }
                    seq.end()
                } else {
                    let len = array.dense.len() + array.associative.len();
                    let mut map = serializer.serialize_map(Some(len))?;
                    for (i, item) in array.dense.iter().enumerate() {
                        map.serialize_entry(&i.to_string(), item)?;
                    }
                    for (key, item) in &array.associative {
                        map.serialize_entry(key, item)?;
                    }
                    map.end()
                }
            }
            Value::Object(o) => {
                let _guard = VisitGuard::enter(o.addr())
                    .ok_or_else(|| S::Error::custom("cannot serialize a cyclic object"))?;
                let object = o.borrow();
                let mut map = serializer.serialize_map(Some(object.len()))?;
                for (key, item) in object.members() {
                    map.serialize_entry(key, item)?;
                }
                map.end()
            }
            Value::Native(n) => Err(S::Error::custom(format!(
                "native value of type `{}` needs the class mapper to be serialized",
                n.type_name()
            ))),
        }
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct ValueVisitor;

        impl<'de> Visitor<'de> for ValueVisitor {
            type Value = Value;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("any AMF-representable value")
            }

            fn visit_bool<E>(self, value: bool) -> Result<Value, E> {
                Ok(Value::Bool(value))
            }

            fn visit_i64<E>(self, value: i64) -> Result<Value, E> {
                Ok(Value::Integer(value))
            }

            fn visit_u64<E>(self, value: u64) -> Result<Value, E> {
                Ok(i64::try_from(value).map_or(Value::Double(value as f64), Value::Integer))
            }

            fn visit_f64<E>(self, value: f64) -> Result<Value, E> {
                Ok(Value::Double(value))
            }

            fn visit_str<E>(self, value: &str) -> Result<Value, E>
            where
                E: de::Error,
            {
                Ok(Value::String(value.to_owned()))
            }

            fn visit_string<E>(self, value: String) -> Result<Value, E> {
                Ok(Value::String(value))
            }

            fn visit_bytes<E>(self, value: &[u8]) -> Result<Value, E>
            where
                E: de::Error,
            {
                Ok(Value::ByteArray(value.to_vec()))
            }

            fn visit_byte_buf<E>(self, value: Vec<u8>) -> Result<Value, E> {
                Ok(Value::ByteArray(value))
            }

            fn visit_none<E>(self) -> Result<Value, E> {
                Ok(Value::Null)
            }

            fn visit_some<D>(self, deserializer: D) -> Result<Value, D::Error>
            where
                D: Deserializer<'de>,
            {
                Deserialize::deserialize(deserializer)
            }

            fn visit_unit<E>(self) -> Result<Value, E> {
                Ok(Value::Null)
            }

            fn visit_seq<V>(self, mut visitor: V) -> Result<Value, V::Error>
            where
                V: de::SeqAccess<'de>,
            {
                let mut vec = Vec::new();
                while let Some(elem) = visitor.next_element()? {
                    vec.push(elem);
                }
                Ok(Value::array(vec))
            }

            fn visit_map<V>(self, mut visitor: V) -> Result<Value, V::Error>
            where
                V: de::MapAccess<'de>,
            {
                let mut object = Object::anonymous();
                while let Some((key, value)) = visitor.next_entry::<String, Value>()? {
                    object.dynamic.insert(key, value);
                }
                Ok(Value::Object(ObjectRef::new(object)))
            }
        }

        deserializer.deserialize_any(ValueVisitor)
    }
}
