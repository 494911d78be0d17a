use std::{collections::HashMap, hint::black_box};

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rand::{rngs::SmallRng, Rng, SeedableRng};
use zbin::{decode, decode_to_dynamic, encode, impl_record, Decoder, Value};

#[derive(Debug, Default, Clone, PartialEq)]
struct Order {
    id: u64,
    symbol: String,
    price: f64,
    quantity: isize,
    tags: Vec<String>,
}

impl_record!(Order {
    id => "Id",
    symbol => "Symbol",
    price => "Price",
    quantity => "Quantity",
    tags => "Tags",
});

// ============================================================================
// Helper functions для создания тестовых данных
// ============================================================================

fn create_string(size: usize) -> String {
    "a".repeat(size)
}

fn create_int_array(size: usize) -> Vec<isize> {
    let mut rng = SmallRng::seed_from_u64(42);
    (0..size).map(|_| rng.gen()).collect()
}

fn create_string_map(entries: usize) -> HashMap<String, f64> {
    (0..entries)
        .map(|i| (format!("key_{i}"), i as f64 * 0.5))
        .collect()
}

fn create_order(i: u64) -> Order {
    Order {
        id: i,
        symbol: format!("SYM{i}"),
        price: 100.0 + i as f64,
        quantity: i as isize * 10,
        tags: vec!["spot".into(), "limit".into()],
    }
}

fn create_dynamic_tree(width: usize) -> Value {
    let rows = (0..width)
        .map(|i| {
            Value::Record(vec![
                ("Id".into(), Value::U64(i as u64)),
                ("Name".into(), Value::Str(format!("row_{i}"))),
                ("Scores".into(), Value::F64Array(vec![1.0, 2.5, 3.75])),
            ])
        })
        .collect();
    Value::Array(rows)
}

// ============================================================================
// Benchmarks
// ============================================================================

fn bench_scalars(c: &mut Criterion) {
    let mut group = c.benchmark_group("codec/scalars");

    let int_buf = encode(&42i64).unwrap();
    group.bench_function("i64/encode", |b| {
        b.iter(|| black_box(encode(black_box(&42i64)).unwrap()))
    });
    group.bench_function("i64/decode", |b| {
        b.iter(|| {
            let mut out = 0i64;
            decode(black_box(&int_buf), &mut out).unwrap();
            black_box(out)
        })
    });

    for size in [10, 100, 1000, 10_000].iter() {
        let s = create_string(*size);
        group.throughput(Throughput::Bytes(*size as u64));

        group.bench_with_input(BenchmarkId::new("string/encode", size), &s, |b, v| {
            b.iter(|| black_box(encode(black_box(v)).unwrap()))
        });

        let encoded = encode(&s).unwrap();
        group.bench_with_input(
            BenchmarkId::new("string/decode", size),
            &encoded,
            |b, data| {
                b.iter(|| {
                    let mut out = String::new();
                    decode(black_box(data), &mut out).unwrap();
                    black_box(out)
                })
            },
        );
    }

    group.finish();
}

fn bench_collections(c: &mut Criterion) {
    let mut group = c.benchmark_group("codec/collections");

    for size in [10, 100, 1000, 10_000].iter() {
        group.throughput(Throughput::Elements(*size as u64));

        let ints = create_int_array(*size);
        group.bench_with_input(BenchmarkId::new("int_array/encode", size), &ints, |b, v| {
            b.iter(|| black_box(encode(black_box(v)).unwrap()))
        });

        let encoded = encode(&ints).unwrap();
        group.bench_with_input(
            BenchmarkId::new("int_array/decode", size),
            &encoded,
            |b, data| {
                b.iter(|| {
                    let mut out: Vec<isize> = Vec::new();
                    decode(black_box(data), &mut out).unwrap();
                    black_box(out)
                })
            },
        );

        let map = create_string_map(*size);
        group.bench_with_input(BenchmarkId::new("map/encode", size), &map, |b, v| {
            b.iter(|| black_box(encode(black_box(v)).unwrap()))
        });

        let encoded = encode(&map).unwrap();
        group.bench_with_input(BenchmarkId::new("map/decode", size), &encoded, |b, data| {
            b.iter(|| {
                let mut out: HashMap<String, f64> = HashMap::new();
                decode(black_box(data), &mut out).unwrap();
                black_box(out)
            })
        });
    }

    group.finish();
}

fn bench_records(c: &mut Criterion) {
    let mut group = c.benchmark_group("codec/records");

    let order = create_order(7);
    let encoded = encode(&order).unwrap();

    group.bench_function("order/encode", |b| {
        b.iter(|| black_box(encode(black_box(&order)).unwrap()))
    });
    group.bench_function("order/decode", |b| {
        b.iter(|| {
            let mut out = Order::default();
            decode(black_box(&encoded), &mut out).unwrap();
            black_box(out)
        })
    });
    group.bench_function("order/decode_dynamic", |b| {
        b.iter(|| black_box(decode_to_dynamic(black_box(&encoded)).unwrap()))
    });

    // Поток из 1000 записей подряд
    let stream: Vec<u8> = (0..1000)
        .flat_map(|i| encode(&create_order(i)).unwrap())
        .collect();
    let decoder = Decoder::new();
    group.throughput(Throughput::Elements(1000));
    group.bench_function("order/stream_1000", |b| {
        b.iter(|| {
            let mut offset = 0;
            while offset < stream.len() {
                let mut out = Order::default();
                offset += decoder.decode(black_box(&stream[offset..]), &mut out).unwrap();
                black_box(&out);
            }
        })
    });

    group.finish();
}

fn bench_dynamic(c: &mut Criterion) {
    let mut group = c.benchmark_group("codec/dynamic");

    for width in [10, 100, 1000].iter() {
        let tree = create_dynamic_tree(*width);
        group.throughput(Throughput::Elements(*width as u64));

        group.bench_with_input(BenchmarkId::new("tree/encode", width), &tree, |b, v| {
            b.iter(|| black_box(encode(black_box(v)).unwrap()))
        });

        let encoded = encode(&tree).unwrap();
        group.bench_with_input(
            BenchmarkId::new("tree/decode", width),
            &encoded,
            |b, data| b.iter(|| black_box(decode_to_dynamic(black_box(data)).unwrap())),
        );
    }

    group.finish();
}

// ============================================================================
// Criterion configuration
// ============================================================================

criterion_group!(
    benches,
    bench_scalars,
    bench_collections,
    bench_records,
    bench_dynamic,
);

criterion_main!(benches);
