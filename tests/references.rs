// Copyright 2026 Adobe. All rights reserved.
// This file is licensed to you under the Apache License,
// Version 2.0 (http://www.apache.org/licenses/LICENSE-2.0)
// or the MIT license (http://opensource.org/licenses/MIT),
// at your option.

// Unless required by applicable law or agreed to in writing,
// this software is distributed on an "AS IS" BASIS, WITHOUT
// WARRANTIES OR REPRESENTATIONS OF ANY KIND, either express or
// implied. See the LICENSE-MIT and LICENSE-APACHE files for the
// specific language governing permissions and limitations under
// each license.

// Reference table semantics across both generations.

use amf_codec::wire::encode_u29;
use amf_codec::{
    Backend, ClassMapper, Codec, CodecConfig, DecodeErrorKind, Decoder, Encoder, ObjectEncoding,
    ObjectRef, RefKind, SliceSource, Value, decode, decode_all, encode,
};

fn amf0_config() -> CodecConfig {
    CodecConfig {
        object_encoding: ObjectEncoding::Amf0,
        ..CodecConfig::default()
    }
}

fn encode_with(config: CodecConfig, value: &Value) -> Vec<u8> {
    let mut encoder = Encoder::with_mapper(Vec::new(), ClassMapper::empty(), config);
    encoder.encode(value).unwrap();
    encoder.into_inner()
}

fn dense(value: &Value) -> Vec<Value> {
    value.as_array().unwrap().borrow().dense.clone()
}

#[test]
fn test_self_referencing_amf0_object() {
    // {me: <ref 0>}
    let bytes = [0x03, 0x00, 0x02, b'm', b'e', 0x07, 0x00, 0x00, 0x00, 0x00, 0x09];
    let value = decode(&bytes).unwrap();
    let me = value.as_object().unwrap().borrow().get("me").cloned().unwrap();
    assert!(me.same_instance(&value));
}

#[test]
fn test_self_referencing_array_round_trips_in_both_modes() {
    let array = amf_codec::ArrayRef::default();
    array.borrow_mut().dense.push(Value::from("x"));
    array.borrow_mut().dense.push(Value::Array(array.clone()));
    let value = Value::Array(array);

    for config in [CodecConfig::default(), amf0_config()] {
        let back = decode(&encode_with(config, &value)).unwrap();
        let items = dense(&back);
        assert_eq!(items[0], Value::from("x"));
        assert!(items[1].same_instance(&back), "{:?}", config.object_encoding);
    }
}

#[test]
fn test_shared_instances_survive_amf0() {
    let shared = Value::object([("n", Value::from(1))]);
    let value = Value::array(vec![shared.clone(), Value::Null, shared]);
    let back = decode(&encode_with(amf0_config(), &value)).unwrap();
    let items = dense(&back);
    assert!(items[0].same_instance(&items[2]));
    // AMF0 carries numbers as doubles
    assert_eq!(
        items[0].as_object().unwrap().borrow().get("n"),
        Some(&Value::Double(1.0))
    );
}

#[test]
fn test_amf3_switch_takes_no_amf0_id() {
    // [<avmplus bytes>, {}, <ref 1>]
    let bytes = [
        0x0A, 0x00, 0x00, 0x00, 0x03, //
        0x11, 0x0C, 0x03, 0x2A, //
        0x03, 0x00, 0x00, 0x09, //
        0x07, 0x00, 0x01,
    ];
    let items = dense(&decode(&bytes).unwrap());
    assert_eq!(items[0], Value::ByteArray(vec![0x2A]));
    assert!(items[1].same_instance(&items[2]));
}

#[test]
fn test_each_amf3_switch_gets_fresh_tables() {
    // two AvmPlus values, the second may not reference the first's string
    let bytes = [
        0x0A, 0x00, 0x00, 0x00, 0x02, //
        0x11, 0x06, 0x03, b'a', //
        0x11, 0x06, 0x00,
    ];
    let err = decode(&bytes).unwrap_err();
    assert!(matches!(
        err.kind(),
        DecodeErrorKind::InvalidReferenceIndex {
            table: RefKind::String,
            index: 0
        }
    ));
    assert_eq!(err.offset, bytes.len());
}

#[test]
fn test_decode_all_shares_the_amf0_cache() {
    let bytes = [0x03, 0x00, 0x00, 0x09, 0x07, 0x00, 0x00];
    let values = decode_all(&bytes).unwrap();
    assert_eq!(values.len(), 2);
    assert!(values[0].same_instance(&values[1]));
}

#[test]
fn test_out_of_range_amf0_reference() {
    let err = decode(&[0x07, 0x00, 0x03]).unwrap_err();
    assert!(matches!(
        err.kind(),
        DecodeErrorKind::InvalidReferenceIndex { index: 3, .. }
    ));
}

#[test]
fn test_reference_table_overflow() {
    let config = CodecConfig {
        max_references: 3,
        ..CodecConfig::default()
    };
    let value = Value::array(vec![
        Value::array(vec![]),
        Value::array(vec![]),
        Value::array(vec![]),
    ]);
    let bytes = encode(&value).unwrap();
    let mut decoder = Decoder::with_source(SliceSource::new(&bytes), ClassMapper::empty(), config);
    let err = decoder.decode().unwrap_err();
    assert!(matches!(err.kind(), DecodeErrorKind::ReferenceTableOverflow));
}

fn u29(value: u32) -> Vec<u8> {
    let mut buf = [0u8; 4];
    let len = encode_u29(value, &mut buf);
    buf[..len].to_vec()
}

#[test]
fn test_sparse_ecma_keys_allocate_nothing() {
    // 100 ECMA arrays, each with the single key "1048575"
    let mut bytes = vec![0x0A, 0x00, 0x00, 0x00, 100];
    for _ in 0..100 {
        bytes.extend_from_slice(&[0x08, 0x00, 0x00, 0x00, 0x01, 0x00, 0x07]);
        bytes.extend_from_slice(b"1048575");
        bytes.extend_from_slice(&[0x05, 0x00, 0x00, 0x09]);
    }
    let items = dense(&decode(&bytes).unwrap());
    assert_eq!(items.len(), 100);
    for item in &items {
        let array = item.as_array().unwrap().borrow();
        assert!(array.dense.is_empty());
        assert_eq!(array.associative.len(), 1);
    }
}

/// `[<64 KiB string>, <ref 0> x refs]` in an AvmPlus envelope.
fn repeated_string(refs: u32) -> Vec<u8> {
    let mut bytes = vec![0x11, 0x09];
    bytes.extend(u29(((refs + 1) << 1) | 1));
    bytes.extend_from_slice(&[0x01, 0x06]);
    bytes.extend(u29((65_536 << 1) | 1));
    bytes.extend(std::iter::repeat_n(b'a', 65_536));
    for _ in 0..refs {
        bytes.extend_from_slice(&[0x06, 0x00]);
    }
    bytes
}

#[test]
fn test_string_references_cannot_amplify_input() {
    assert_eq!(dense(&decode(&repeated_string(10)).unwrap()).len(), 11);

    // 1100 copies of 64 KiB run past the default 64 MiB
    let err = decode(&repeated_string(1100)).unwrap_err();
    assert!(matches!(err.kind(), DecodeErrorKind::ReferenceTableOverflow));
}

#[test]
fn test_distinct_but_equal_objects_are_not_merged() {
    let a = Value::Object(ObjectRef::default());
    let b = Value::Object(ObjectRef::default());
    assert_eq!(a, b);
    let value = Value::array(vec![a.clone(), b.clone(), a, b]);
    for config in [CodecConfig::default(), amf0_config()] {
        let items = dense(&decode(&encode_with(config, &value)).unwrap());
        assert!(items[0].same_instance(&items[2]));
        assert!(items[1].same_instance(&items[3]));
        assert!(!items[0].same_instance(&items[1]));
    }
}

#[test]
fn test_backends_agree_on_references() {
    let shared = Value::array(vec![Value::from("s")]);
    let value = Value::array(vec![shared.clone(), shared, Value::date(5.0), Value::date(5.0)]);
    let bytes = encode(&value).unwrap();
    for backend in [Backend::Portable, Backend::Accelerated] {
        let config = CodecConfig {
            backend,
            ..CodecConfig::default()
        };
        let codec = config.build(std::sync::Arc::new(ClassMapper::new()));
        let items = dense(&codec.decode(&bytes).unwrap());
        assert!(items[0].same_instance(&items[1]));
        assert_eq!(items[2], items[3]);
    }
}
