//! Association between wire class aliases and host types.
//!
//! The codec never inspects host values directly. A type takes part in
//! encoding and decoding by implementing [`Reflectable`] and being
//! registered here, either under an alias (it then travels as a typed
//! object and is rebuilt on the way back) or as a bare adapter (it is
//! written as an anonymous object and never rebuilt).

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::LazyLock;

use crate::value::{NativeRef, Value};

/// Member-level view of a host type.
///
/// `members` lists the sealed members in a stable order; that order is
/// the trait order on the wire. `set_member` receives every member read
/// back, sealed ones first, and may ignore names it does not know.
///
/// ```
/// use amf_codec::{ClassMapper, Reflectable, Value};
///
/// #[derive(Default)]
/// struct Point {
///     x: f64,
///     y: f64,
/// }
///
/// impl Reflectable for Point {
///     fn members(&self) -> Vec<(String, Value)> {
///         vec![("x".into(), self.x.into()), ("y".into(), self.y.into())]
///     }
///
///     fn set_member(&mut self, name: &str, value: Value) {
///         let v = value.as_f64().unwrap_or_default();
///         match name {
///             "x" => self.x = v,
///             "y" => self.y = v,
///             _ => {}
///         }
///     }
/// }
///
/// let mut mapper = ClassMapper::new();
/// mapper.register::<Point>("geom.Point");
/// assert_eq!(mapper.lookup_by_type(std::any::TypeId::of::<Point>()), Some("geom.Point"));
/// ```
pub trait Reflectable: Any {
    /// Externalizable types write one opaque payload instead of members.
    const EXTERNALIZABLE: bool = false;

    fn members(&self) -> Vec<(String, Value)>;

    fn set_member(&mut self, name: &str, value: Value);

    fn externalized(&self) -> Value {
        Value::Null
    }

    fn set_externalized(&mut self, _payload: Value) {}
}

/// Everything the codec knows about one registered type.
#[derive(Clone)]
pub struct TypeDescriptor {
    alias: Option<String>,
    type_id: TypeId,
    type_name: &'static str,
    externalizable: bool,
    construct: Option<fn() -> NativeRef>,
    members: fn(&dyn Any) -> Vec<(String, Value)>,
    set_member: fn(&mut dyn Any, &str, Value),
    externalized: fn(&dyn Any) -> Value,
    set_externalized: fn(&mut dyn Any, Value),
}

impl TypeDescriptor {
    fn of<T: Reflectable>(alias: Option<String>, construct: Option<fn() -> NativeRef>) -> Self {
        TypeDescriptor {
            alias,
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
            externalizable: T::EXTERNALIZABLE,
            construct,
            members: members_of::<T>,
            set_member: set_member_of::<T>,
            externalized: externalized_of::<T>,
            set_externalized: set_externalized_of::<T>,
        }
    }

    pub fn alias(&self) -> Option<&str> {
        self.alias.as_deref()
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn is_externalizable(&self) -> bool {
        self.externalizable
    }

    /// A fresh default instance, if the type was registered with an alias.
    pub fn construct(&self) -> Option<NativeRef> {
        self.construct.map(|construct| construct())
    }

    /// Reflected members of `native`, empty if it is not of this type.
    pub fn members(&self, native: &NativeRef) -> Vec<(String, Value)> {
        (self.members)(&*native.borrow_any())
    }

    pub fn set_member(&self, native: &NativeRef, name: &str, value: Value) {
        (self.set_member)(&mut *native.borrow_any_mut(), name, value)
    }

    pub fn externalized(&self, native: &NativeRef) -> Value {
        (self.externalized)(&*native.borrow_any())
    }

    pub fn set_externalized(&self, native: &NativeRef, payload: Value) {
        (self.set_externalized)(&mut *native.borrow_any_mut(), payload)
    }
}

impl fmt::Debug for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("TypeDescriptor")
            .field("alias", &self.alias)
            .field("type_name", &self.type_name)
            .field("externalizable", &self.externalizable)
            .finish()
    }
}

fn construct_default<T: Reflectable + Default>() -> NativeRef {
    NativeRef::new(T::default())
}

fn members_of<T: Reflectable>(any: &dyn Any) -> Vec<(String, Value)> {
    any.downcast_ref::<T>()
        .map(Reflectable::members)
        .unwrap_or_default()
}

fn set_member_of<T: Reflectable>(any: &mut dyn Any, name: &str, value: Value) {
    if let Some(target) = any.downcast_mut::<T>() {
        target.set_member(name, value);
    }
}

fn externalized_of<T: Reflectable>(any: &dyn Any) -> Value {
    any.downcast_ref::<T>()
        .map_or(Value::Null, Reflectable::externalized)
}

fn set_externalized_of<T: Reflectable>(any: &mut dyn Any, payload: Value) {
    if let Some(target) = any.downcast_mut::<T>() {
        target.set_externalized(payload);
    }
}

static EMPTY: LazyLock<ClassMapper> = LazyLock::new(ClassMapper::new);

/// Registry of alias <-> type bindings.
///
/// Mutation takes `&mut self`; once the mapper is shared behind an `Arc`
/// it is read-only for every in-flight call.
#[derive(Debug, Default, Clone)]
pub struct ClassMapper {
    by_alias: HashMap<String, TypeId>,
    by_type: HashMap<TypeId, TypeDescriptor>,
}

impl ClassMapper {
    pub fn new() -> Self {
        ClassMapper::default()
    }

    /// A shared mapper with no registrations.
    pub fn empty() -> &'static ClassMapper {
        &EMPTY
    }

    /// Binds `T` to `alias`. A previous binding of either side is replaced.
    pub fn register<T: Reflectable + Default>(&mut self, alias: impl Into<String>) -> &mut Self {
        let alias = alias.into();
        self.unregister(&alias);
        self.remove_type(TypeId::of::<T>());
        self.by_alias.insert(alias.clone(), TypeId::of::<T>());
        self.by_type.insert(
            TypeId::of::<T>(),
            TypeDescriptor::of::<T>(Some(alias), Some(construct_default::<T>)),
        );
        self
    }

    /// Makes `T` encodable as an anonymous object without giving it an alias.
    pub fn register_adapter<T: Reflectable>(&mut self) -> &mut Self {
        self.remove_type(TypeId::of::<T>());
        self.by_type
            .insert(TypeId::of::<T>(), TypeDescriptor::of::<T>(None, None));
        self
    }

    /// Drops the binding for `alias`, returning its descriptor.
    pub fn unregister(&mut self, alias: &str) -> Option<TypeDescriptor> {
        let type_id = self.by_alias.remove(alias)?;
        self.by_type.remove(&type_id)
    }

    pub fn lookup_by_alias(&self, alias: &str) -> Option<&TypeDescriptor> {
        self.by_alias
            .get(alias)
            .and_then(|type_id| self.by_type.get(type_id))
    }

    pub fn lookup_by_type(&self, type_id: TypeId) -> Option<&str> {
        self.by_type.get(&type_id).and_then(TypeDescriptor::alias)
    }

    /// Descriptor for `type_id`, with or without an alias.
    pub fn adapter_for(&self, type_id: TypeId) -> Option<&TypeDescriptor> {
        self.by_type.get(&type_id)
    }

    pub fn len(&self) -> usize {
        self.by_type.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_type.is_empty()
    }

    fn remove_type(&mut self, type_id: TypeId) {
        if let Some(old) = self.by_type.remove(&type_id) {
            if let Some(alias) = old.alias {
                self.by_alias.remove(&alias);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default, PartialEq)]
    struct Account {
        id: i64,
        owner: String,
    }

    impl Reflectable for Account {
        fn members(&self) -> Vec<(String, Value)> {
            vec![
                ("id".into(), Value::from(self.id)),
                ("owner".into(), Value::from(self.owner.as_str())),
            ]
        }

        fn set_member(&mut self, name: &str, value: Value) {
            match name {
                "id" => self.id = value.as_i64().unwrap_or_default(),
                "owner" => self.owner = value.as_str().unwrap_or_default().to_string(),
                _ => {}
            }
        }
    }

    #[derive(Default)]
    struct Other;

    impl Reflectable for Other {
        fn members(&self) -> Vec<(String, Value)> {
            Vec::new()
        }

        fn set_member(&mut self, _name: &str, _value: Value) {}
    }

    #[test]
    fn test_register_and_lookup() {
        let mut mapper = ClassMapper::new();
        mapper.register::<Account>("bank.Account");

        let descriptor = mapper.lookup_by_alias("bank.Account").unwrap();
        assert_eq!(descriptor.type_id(), TypeId::of::<Account>());
        assert_eq!(mapper.lookup_by_type(TypeId::of::<Account>()), Some("bank.Account"));
        assert!(mapper.lookup_by_alias("bank.Unknown").is_none());
    }

    #[test]
    fn test_descriptor_binds_members() {
        let mut mapper = ClassMapper::new();
        mapper.register::<Account>("bank.Account");
        let descriptor = mapper.lookup_by_alias("bank.Account").unwrap();

        let native = descriptor.construct().unwrap();
        descriptor.set_member(&native, "id", Value::from(7));
        descriptor.set_member(&native, "owner", Value::from("ann"));
        descriptor.set_member(&native, "ignored", Value::Null);

        assert_eq!(
            *native.borrow::<Account>().unwrap(),
            Account { id: 7, owner: "ann".into() }
        );
        let names: Vec<_> = descriptor
            .members(&native)
            .into_iter()
            .map(|(name, _)| name)
            .collect();
        assert_eq!(names, vec!["id", "owner"]);
    }

    #[test]
    fn test_reregister_replaces_both_sides() {
        let mut mapper = ClassMapper::new();
        mapper.register::<Account>("a");
        mapper.register::<Account>("b");
        assert!(mapper.lookup_by_alias("a").is_none());
        assert_eq!(mapper.lookup_by_type(TypeId::of::<Account>()), Some("b"));

        mapper.register::<Other>("b");
        assert!(mapper.lookup_by_type(TypeId::of::<Account>()).is_none());
        assert_eq!(mapper.len(), 1);
    }

    #[test]
    fn test_adapter_has_no_alias() {
        let mut mapper = ClassMapper::new();
        mapper.register_adapter::<Account>();
        assert!(mapper.lookup_by_type(TypeId::of::<Account>()).is_none());
        let descriptor = mapper.adapter_for(TypeId::of::<Account>()).unwrap();
        assert!(descriptor.construct().is_none());
    }

    #[test]
    fn test_unregister() {
        let mut mapper = ClassMapper::new();
        mapper.register::<Account>("bank.Account");
        assert!(mapper.unregister("bank.Account").is_some());
        assert!(mapper.unregister("bank.Account").is_none());
        assert!(mapper.is_empty());
        assert!(ClassMapper::empty().is_empty());
    }
}
