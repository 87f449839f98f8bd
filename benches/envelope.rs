//! Benchmarks for envelope and flattened-map coding.
//!
//! Run with: cargo bench --bench envelope

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use entity_marshal::{
    decode_byte_map, decode_envelope, decode_map, encode_byte_map, encode_envelope_with,
    encode_map, marshal_struct, Encoding,
};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
struct Profile {
    user_id: String,
    email: String,
    admin: bool,
    logins: u32,
    created_at: i64,
    rights: Vec<String>,
    scores: Vec<f64>,
}

marshal_struct!(Profile {
    user_id,
    email,
    admin,
    logins,
    created_at,
    rights,
    scores,
});

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
struct Sample {
    sensor: u16,
    value: f64,
    at: i64,
}

marshal_struct!(Sample { sensor, value, at });

fn profile() -> Profile {
    Profile {
        user_id: "bench-user".to_string(),
        email: "bench@example.com".to_string(),
        admin: true,
        logins: 42,
        created_at: 1_600_000_000,
        rights: vec!["read".to_string(), "write".to_string(), "admin".to_string()],
        scores: (0..32).map(|i| i as f64 * 0.5).collect(),
    }
}

fn bench_envelope(c: &mut Criterion) {
    let mut group = c.benchmark_group("envelope");
    let p = profile();
    let mut encodings = vec![Encoding::Json, Encoding::MsgPack];
    if cfg!(feature = "native") {
        encodings.push(Encoding::Native);
    }
    for enc in encodings {
        let buf = encode_envelope_with(&p, enc).unwrap();
        group.throughput(Throughput::Bytes(buf.len() as u64));
        group.bench_with_input(BenchmarkId::new("encode", enc), &p, |b, p| {
            b.iter(|| encode_envelope_with(black_box(p), enc).unwrap())
        });
        group.bench_with_input(BenchmarkId::new("decode", enc), &buf, |b, buf| {
            b.iter(|| decode_envelope::<Profile>(black_box(buf)).unwrap())
        });
    }
    group.finish();
}

fn bench_fixed_width(c: &mut Criterion) {
    let mut group = c.benchmark_group("fixed_width");
    let samples: Vec<Sample> = (0..256)
        .map(|i| Sample {
            sensor: i as u16,
            value: i as f64 / 3.0,
            at: 1_600_000_000 + i,
        })
        .collect();
    for enc in [Encoding::BigEndian, Encoding::LittleEndian] {
        let buf = encode_envelope_with(&samples, enc).unwrap();
        group.throughput(Throughput::Bytes(buf.len() as u64));
        group.bench_with_input(BenchmarkId::new("decode", enc), &buf, |b, buf| {
            b.iter(|| decode_envelope::<Vec<Sample>>(black_box(buf)).unwrap())
        });
    }
    group.finish();
}

fn bench_maps(c: &mut Criterion) {
    let mut group = c.benchmark_group("map");
    let p = profile();
    let map = encode_map(&p).unwrap();
    let bm = encode_byte_map(&p).unwrap();
    group.bench_function("encode_map", |b| b.iter(|| encode_map(black_box(&p)).unwrap()));
    group.bench_function("decode_map", |b| {
        b.iter(|| {
            let mut out = Profile::default();
            decode_map(black_box(&map), &mut out).unwrap();
            out
        })
    });
    group.bench_function("encode_byte_map", |b| {
        b.iter(|| encode_byte_map(black_box(&p)).unwrap())
    });
    group.bench_function("decode_byte_map", |b| {
        b.iter(|| {
            let mut out = Profile::default();
            decode_byte_map(black_box(&bm), &mut out).unwrap();
            out
        })
    });
    group.finish();
}

criterion_group!(benches, bench_envelope, bench_fixed_width, bench_maps);
criterion_main!(benches);
