//! Per-call reference tables.
//!
//! A fresh pair of tables exists for every top-level AMF0 value and for
//! every AMF3 sub-stream. Ids are handed out in first-seen order, so the
//! encoder and the decoder stay in step as long as both walk the graph
//! depth-first in the same order.
//!
//! AMF3 indexes dates, arrays, objects, byte arrays and XML with one
//! counter; AMF0 does the same for its arrays and objects. The tables
//! therefore keep strings and traits apart and put every other kind into
//! the shared object space.

use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::error::DecodeErrorKind;
use crate::value::{Trait, Value};

/// Kind of a reference-eligible value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RefKind {
    String,
    Date,
    Array,
    Object,
    Trait,
}

impl fmt::Display for RefKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            RefKind::String => "string",
            RefKind::Date => "date",
            RefKind::Array => "array",
            RefKind::Object => "object",
            RefKind::Trait => "trait",
        })
    }
}

#[derive(Debug)]
enum Slot {
    Reserved,
    Filled(Value),
}

/// Decode-side tables.
#[derive(Debug)]
pub struct DecodeTables {
    strings: Vec<String>,
    objects: Vec<Slot>,
    traits: Vec<Rc<Trait>>,
    limit: usize,
}

impl DecodeTables {
    /// Creates empty tables that refuse to hold more than `limit` entries
    /// in total.
    pub fn new(limit: usize) -> Self {
        DecodeTables {
            strings: Vec::new(),
            objects: Vec::new(),
            traits: Vec::new(),
            limit,
        }
    }

    fn len(&self) -> usize {
        self.strings.len() + self.objects.len() + self.traits.len()
    }

    fn check_capacity(&self) -> Result<(), DecodeErrorKind> {
        if self.len() >= self.limit {
            Err(DecodeErrorKind::ReferenceTableOverflow)
        } else {
            Ok(())
        }
    }

    /// Remembers a non-empty string. The empty string is never assigned.
    pub fn assign_string(&mut self, value: &str) -> Result<Option<u32>, DecodeErrorKind> {
        if value.is_empty() {
            return Ok(None);
        }
        self.check_capacity()?;
        self.strings.push(value.to_string());
        Ok(Some(self.strings.len() as u32 - 1))
    }

    pub fn resolve_string(&self, id: u32) -> Result<String, DecodeErrorKind> {
        self.strings
            .get(id as usize)
            .cloned()
            .ok_or(DecodeErrorKind::InvalidReferenceIndex {
                table: RefKind::String,
                index: id,
            })
    }

    /// Appends a completed value of `kind` and returns its id.
    pub fn assign(&mut self, kind: RefKind, value: Value) -> Result<u32, DecodeErrorKind> {
        let id = self.reserve(kind)?;
        self.fill(kind, id, value)?;
        Ok(id)
    }

    /// Appends a placeholder before the value's contents are known.
    pub fn reserve(&mut self, _kind: RefKind) -> Result<u32, DecodeErrorKind> {
        self.check_capacity()?;
        self.objects.push(Slot::Reserved);
        Ok(self.objects.len() as u32 - 1)
    }

    pub fn fill(&mut self, kind: RefKind, id: u32, value: Value) -> Result<(), DecodeErrorKind> {
        match self.objects.get_mut(id as usize) {
            Some(slot) => {
                *slot = Slot::Filled(value);
                Ok(())
            }
            None => Err(DecodeErrorKind::InvalidReferenceIndex { table: kind, index: id }),
        }
    }

    /// Looks a back-reference up. Reserved but unfilled slots are invalid.
    pub fn resolve(&self, kind: RefKind, id: u32) -> Result<Value, DecodeErrorKind> {
        match self.objects.get(id as usize) {
            Some(Slot::Filled(value)) => Ok(value.clone()),
            _ => Err(DecodeErrorKind::InvalidReferenceIndex { table: kind, index: id }),
        }
    }

    pub fn assign_trait(&mut self, value: Rc<Trait>) -> Result<u32, DecodeErrorKind> {
        self.check_capacity()?;
        self.traits.push(value);
        Ok(self.traits.len() as u32 - 1)
    }

    pub fn resolve_trait(&self, id: u32) -> Result<Rc<Trait>, DecodeErrorKind> {
        self.traits
            .get(id as usize)
            .cloned()
            .ok_or(DecodeErrorKind::InvalidReferenceIndex {
                table: RefKind::Trait,
                index: id,
            })
    }
}

/// Encode-side tables.
///
/// Strings and dates are looked up by value, arrays, objects and natives
/// by the address of their shared instance. Addresses stay unique for the
/// whole call because the graph is borrowed for its duration; values
/// produced on the fly by a reflection adapter are kept in `retained`
/// until the tables are dropped, so their addresses are never reused.
#[derive(Debug, Default)]
pub struct EncodeTables {
    strings: HashMap<String, u32>,
    dates: HashMap<u64, u32>,
    identities: HashMap<usize, u32>,
    traits: HashMap<Trait, u32>,
    retained: Vec<Value>,
    next_string: u32,
    next_object: u32,
}

impl EncodeTables {
    pub fn new() -> Self {
        EncodeTables::default()
    }

    pub fn lookup_string(&self, value: &str) -> Option<u32> {
        self.strings.get(value).copied()
    }

    /// Assigns the next string id; the empty string is never assigned.
    pub fn assign_string(&mut self, value: &str) -> Option<u32> {
        if value.is_empty() {
            return None;
        }
        let id = self.next_string;
        self.next_string += 1;
        self.strings.insert(value.to_string(), id);
        Some(id)
    }

    pub fn lookup_date(&self, millis: f64) -> Option<u32> {
        self.dates.get(&millis.to_bits()).copied()
    }

    pub fn assign_date(&mut self, millis: f64) -> u32 {
        let id = self.next_object_id();
        self.dates.insert(millis.to_bits(), id);
        id
    }

    pub fn lookup_identity(&self, addr: usize) -> Option<u32> {
        self.identities.get(&addr).copied()
    }

    pub fn assign_identity(&mut self, addr: usize) -> u32 {
        let id = self.next_object_id();
        self.identities.insert(addr, id);
        id
    }

    /// Consumes an object id for a value that is never looked up again
    /// (byte arrays, XML) so later ids match the decoder's.
    pub fn assign_anonymous(&mut self) -> u32 {
        self.next_object_id()
    }

    /// Keeps reflected values alive until the end of the call.
    pub fn retain(&mut self, values: impl IntoIterator<Item = Value>) {
        self.retained.extend(values);
    }

    pub fn lookup_trait(&self, value: &Trait) -> Option<u32> {
        self.traits.get(value).copied()
    }

    pub fn assign_trait(&mut self, value: Trait) -> u32 {
        let id = self.traits.len() as u32;
        self.traits.insert(value, id);
        id
    }

    fn next_object_id(&mut self) -> u32 {
        let id = self.next_object;
        self.next_object += 1;
        id
    }
}
