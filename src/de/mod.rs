//! Bytes to value graphs.
//!
//! Decoding starts in AMF0. An AvmPlus marker hands the rest of that value
//! to the AMF3 reader with a fresh set of AMF3 tables; the AMF0 cache
//! stays in place around it.

mod amf0;
mod amf3;

use std::io::Read;

use log::debug;

use crate::class_mapper::{ClassMapper, TypeDescriptor};
use crate::codec::CodecConfig;
use crate::error::{DecodeError, DecodeErrorKind};
use crate::read::{IoSource, SliceSource, Source};
use crate::reference::{DecodeTables, RefKind};
use crate::value::{NativeRef, Object, ObjectRef, Trait, Value};

type Step<T> = Result<T, DecodeErrorKind>;

pub struct Decoder<'m, S: Source> {
    source: S,
    mapper: &'m ClassMapper,
    config: CodecConfig,
    depth: usize,
    copied: usize,
}

impl<R: Read> Decoder<'static, IoSource<R>> {
    /// Decoder over a reader, with no class mappings and default limits.
    pub fn new(reader: R) -> Self {
        Decoder::with_source(IoSource::new(reader), ClassMapper::empty(), CodecConfig::default())
    }
}

impl<'a> Decoder<'static, SliceSource<'a>> {
    pub fn from_slice(bytes: &'a [u8]) -> Self {
        Decoder::with_source(SliceSource::new(bytes), ClassMapper::empty(), CodecConfig::default())
    }
}

impl<'m, S: Source> Decoder<'m, S> {
    pub fn with_source(source: S, mapper: &'m ClassMapper, config: CodecConfig) -> Self {
        Decoder {
            source,
            mapper,
            config,
            depth: 0,
            copied: 0,
        }
    }

    pub fn config(&self) -> &CodecConfig {
        &self.config
    }

    /// Bytes consumed so far.
    pub fn offset(&self) -> usize {
        self.source.offset()
    }

    /// Reads one AMF0 value with its own reference tables.
    pub fn decode(&mut self) -> Result<Value, DecodeError> {
        let mut tables = self.tables();
        let result = self.amf0_value(&mut tables);
        self.attach_offset(result)
    }

    /// Reads one raw AMF3 value with its own reference tables.
    pub fn decode_amf3(&mut self) -> Result<Value, DecodeError> {
        let mut tables = self.tables();
        let result = self.amf3_value(&mut tables);
        self.attach_offset(result)
    }

    /// Reads AMF0 values until the input ends. All of them share one
    /// AMF0 cache, so later values may point at earlier ones.
    pub fn decode_all(&mut self) -> Result<Vec<Value>, DecodeError> {
        let mut tables = self.tables();
        let mut values = Vec::new();
        loop {
            match self.source.at_end() {
                Ok(true) => return Ok(values),
                Ok(false) => {}
                Err(kind) => return Err(DecodeError::new(kind, self.offset())),
            }
            let result = self.amf0_value(&mut tables);
            values.push(self.attach_offset(result)?);
        }
    }

    /// Fails with `TrailingBytes` unless the input is exhausted.
    pub fn finish(mut self) -> Result<(), DecodeError> {
        let offset = self.offset();
        match self.source.at_end() {
            Ok(true) => Ok(()),
            Ok(false) => Err(DecodeError::new(DecodeErrorKind::TrailingBytes, offset)),
            Err(kind) => Err(DecodeError::new(kind, offset)),
        }
    }

    pub fn into_source(self) -> S {
        self.source
    }

    fn tables(&self) -> DecodeTables {
        DecodeTables::new(self.config.max_references)
    }

    fn attach_offset<T>(&self, result: Step<T>) -> Result<T, DecodeError> {
        result.map_err(|kind| DecodeError::new(kind, self.offset()))
    }

    /// Runs `f` one nesting level deeper.
    fn nested<T>(&mut self, f: impl FnOnce(&mut Self) -> Step<T>) -> Step<T> {
        if self.depth >= self.config.max_depth {
            return Err(DecodeErrorKind::RecursionLimitExceeded);
        }
        self.depth += 1;
        let result = f(self);
        self.depth -= 1;
        result
    }

    /// Resolves an object-table reference, charging any buffer it copies.
    fn resolve(&mut self, tables: &DecodeTables, kind: RefKind, id: u32) -> Step<Value> {
        let value = tables.resolve(kind, id)?;
        let len = match &value {
            Value::String(s) | Value::Xml(s) | Value::XmlDoc(s) => s.len(),
            Value::ByteArray(bytes) => bytes.len(),
            _ => 0,
        };
        self.charge(len)?;
        Ok(value)
    }

    /// Counts bytes materialized from a back-reference against
    /// `max_reference_bytes`. Inline data is bounded by the input, copies
    /// are not.
    fn charge(&mut self, len: usize) -> Step<()> {
        self.copied = self.copied.saturating_add(len);
        if self.copied > self.config.max_reference_bytes {
            Err(DecodeErrorKind::ReferenceTableOverflow)
        } else {
            Ok(())
        }
    }

    /// Validates a count read off the wire before anything is sized by it.
    fn count(&self, n: u32) -> Step<usize> {
        let n = n as usize;
        if n > self.config.max_references {
            Err(DecodeErrorKind::MalformedInteger)
        } else {
            Ok(n)
        }
    }

    /// Creates the shell for an object of class `alias` and puts it in the
    /// reserved slot `id`, so members can point back at it.
    fn shell(
        &self,
        tables: &mut DecodeTables,
        id: u32,
        alias: Option<&str>,
        sealed_names: &[String],
    ) -> Step<Shell<'m>> {
        let mapper: &'m ClassMapper = self.mapper;
        let descriptor = alias.and_then(|alias| mapper.lookup_by_alias(alias));
        let shell = match descriptor.and_then(|d| d.construct().map(|native| (d, native))) {
            Some((descriptor, native)) => {
                tables.fill(RefKind::Object, id, Value::Native(native.clone()))?;
                Shell::Native(descriptor, native)
            }
            None => {
                if let Some(alias) = alias {
                    debug!("class alias {:?} is not mapped, decoding as a dynamic object", alias);
                }
                let mut object = Object::anonymous();
                object.alias = alias.map(str::to_string);
                object.sealed.reserve(sealed_names.len());
                let handle = ObjectRef::new(object);
                tables.fill(RefKind::Object, id, Value::Object(handle.clone()))?;
                Shell::Object(handle)
            }
        };
        Ok(shell)
    }
}

/// An object under construction.
enum Shell<'m> {
    Native(&'m TypeDescriptor, NativeRef),
    Object(ObjectRef),
}

impl Shell<'_> {
    fn set_sealed(&self, name: String, value: Value) {
        match self {
            Shell::Native(descriptor, native) => descriptor.set_member(native, &name, value),
            Shell::Object(object) => {
                object.borrow_mut().sealed.insert(name, value);
            }
        }
    }

    fn set_dynamic(&self, name: String, value: Value) {
        match self {
            Shell::Native(descriptor, native) => descriptor.set_member(native, &name, value),
            Shell::Object(object) => {
                object.borrow_mut().dynamic.insert(name, value);
            }
        }
    }

    fn set_externalized(&self, payload: Value) {
        match self {
            Shell::Native(descriptor, native) => descriptor.set_externalized(native, payload),
            Shell::Object(object) => object.borrow_mut().external = Some(payload),
        }
    }

    fn into_value(self) -> Value {
        match self {
            Shell::Native(_, native) => Value::Native(native),
            Shell::Object(object) => Value::Object(object),
        }
    }
}

/// Trait read inline; an empty alias marks an anonymous class.
fn inline_trait(alias: String, sealed: Vec<String>, dynamic: bool, externalizable: bool) -> Trait {
    Trait {
        alias: (!alias.is_empty()).then_some(alias),
        sealed,
        dynamic,
        externalizable,
    }
}
