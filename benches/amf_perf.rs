//! Encode/decode throughput for byte arrays and object graphs.

use std::hint::black_box;
use std::sync::Arc;

use amf_codec::{
    AcceleratedCodec, ClassMapper, Codec, CodecConfig, PortableCodec, Value, decode, encode,
};
use codspeed_criterion_compat::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};

fn byte_arrays(c: &mut Criterion) {
    let mut group = c.benchmark_group("byte_array");
    for size in [1024usize, 100 * 1024, 1024 * 1024] {
        let value = Value::ByteArray(vec![0xAB; size]);
        let bytes = encode(&value).unwrap();
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::new("encode", size), &value, |b, value| {
            b.iter(|| encode(black_box(value)).unwrap())
        });
        group.bench_with_input(BenchmarkId::new("decode", size), &bytes, |b, bytes| {
            b.iter(|| decode(black_box(bytes)).unwrap())
        });
    }
    group.finish();
}

/// A list of records sharing keys, aliases and one nested object, so the
/// reference tables do real work.
fn records(n: usize) -> Value {
    let shared = Value::object([("region", Value::from("eu-west"))]);
    Value::array(
        (0..n)
            .map(|i| {
                Value::typed_object(
                    "app.Record",
                    [
                        ("id", Value::from(i as i64)),
                        ("name", Value::from(format!("record-{}", i % 16))),
                        ("score", Value::from(i as f64 * 0.5)),
                        ("created", Value::date(1_600_000_000_000.0)),
                        ("meta", shared.clone()),
                    ],
                )
            })
            .collect(),
    )
}

fn object_graphs(c: &mut Criterion) {
    let mut group = c.benchmark_group("records");
    for n in [10usize, 1000] {
        let value = records(n);
        let bytes = encode(&value).unwrap();
        group.throughput(Throughput::Elements(n as u64));
        group.bench_with_input(BenchmarkId::new("encode", n), &value, |b, value| {
            b.iter(|| encode(black_box(value)).unwrap())
        });
        group.bench_with_input(BenchmarkId::new("decode", n), &bytes, |b, bytes| {
            b.iter(|| decode(black_box(bytes)).unwrap())
        });
    }
    group.finish();
}

fn backends(c: &mut Criterion) {
    let bytes = encode(&records(1000)).unwrap();
    let mapper = Arc::new(ClassMapper::new());
    let portable = PortableCodec::new(CodecConfig::default(), mapper.clone());
    let accelerated = AcceleratedCodec::new(CodecConfig::default(), mapper);

    let mut group = c.benchmark_group("backend");
    group.throughput(Throughput::Bytes(bytes.len() as u64));
    group.bench_function("portable", |b| {
        b.iter(|| portable.decode(black_box(&bytes)).unwrap())
    });
    group.bench_function("accelerated", |b| {
        b.iter(|| accelerated.decode(black_box(&bytes)).unwrap())
    });
    group.finish();
}

criterion_group!(benches, byte_arrays, object_graphs, backends);
criterion_main!(benches);
