//! Structural equality over possibly cyclic value graphs.

use std::collections::HashSet;

use crate::value::Value;

/// Deep equality between two value graphs.
///
/// Pairs of shared instances are remembered while they are compared; meeting
/// the same pair again counts as equal, which is what makes two isomorphic
/// cycles compare equal instead of recursing forever.
pub(crate) fn deep_equal(a: &Value, b: &Value) -> bool {
    let mut visiting = HashSet::new();
    equal(a, b, &mut visiting)
}

fn equal(a: &Value, b: &Value, visiting: &mut HashSet<(usize, usize)>) -> bool {
    match (a, b) {
        (Value::Null, Value::Null) => true,
        (Value::Bool(a), Value::Bool(b)) => a == b,
        (Value::Integer(a), Value::Integer(b)) => a == b,
        (Value::Double(a), Value::Double(b)) => a == b,
        (Value::String(a), Value::String(b)) => a == b,
        (Value::ByteArray(a), Value::ByteArray(b)) => a == b,
        (Value::Date(a), Value::Date(b)) => a == b,
        (Value::Xml(a), Value::Xml(b)) => a == b,
        (Value::XmlDoc(a), Value::XmlDoc(b)) => a == b,

        (Value::Array(x), Value::Array(y)) => {
            if x.ptr_eq(y) || !visiting.insert((x.addr(), y.addr())) {
                return true;
            }
            let (x, y) = (x.borrow(), y.borrow());
            x.dense.len() == y.dense.len()
                && x.associative.len() == y.associative.len()
                && x
                    .dense
                    .iter()
                    .zip(&y.dense)
                    .all(|(a, b)| equal(a, b, visiting))
                && x.associative.iter().all(|(key, a)| {
                    y.associative
                        .get(key)
                        .is_some_and(|b| equal(a, b, visiting))
                })
        }

        (Value::Object(x), Value::Object(y)) => {
            if x.ptr_eq(y) || !visiting.insert((x.addr(), y.addr())) {
                return true;
            }
            let (x, y) = (x.borrow(), y.borrow());
            if x.alias != y.alias
                || x.sealed.len() != y.sealed.len()
                || x.dynamic.len() != y.dynamic.len()
            {
                return false;
            }
            // sealed members are positional, dynamic ones are keyed
            let sealed = x
                .sealed
                .iter()
                .zip(&y.sealed)
                .all(|((ka, a), (kb, b))| ka == kb && equal(a, b, visiting));
            let dynamic = x.dynamic.iter().all(|(key, a)| {
                y.dynamic
                    .get(key)
                    .is_some_and(|b| equal(a, b, visiting))
            });
            let external = match (&x.external, &y.external) {
                (None, None) => true,
                (Some(a), Some(b)) => equal(a, b, visiting),
                _ => false,
            };
            sealed && dynamic && external
        }

        (Value::Native(x), Value::Native(y)) => x.ptr_eq(y),

        // Different types are never equal
        _ => false,
    }
}
