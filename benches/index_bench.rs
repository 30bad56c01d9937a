//! Benchmarks for Timecube indexes and binning
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion, Throughput};
use timecube::histo::{DateBinMethod, DateBinType};
use timecube::index::{Count, FilterValue, Key, TimeIndex};
use timecube::time::{Interval, MS_PER_HOUR};

#[derive(Clone)]
struct Span {
    interval: Option<Interval>,
    kind: i64,
}

fn create_test_spans(count: usize) -> Vec<Span> {
    (0..count)
        .map(|i| {
            let start = i as i64 * 60_000;
            Span {
                // every 20th record is timeless
                interval: (i % 20 != 0).then(|| Interval::new(start, start + 3 * MS_PER_HOUR)),
                kind: (i % 7) as i64,
            }
        })
        .collect()
}

fn create_index(spans: Vec<Span>) -> TimeIndex<Span> {
    let mut index = TimeIndex::new(|s: &Span| s.interval);
    index.add_dimension("kind", |s: &Span| Key::Int(s.kind));
    index.add(spans);
    index
}

fn bench_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("insert");

    for size in [1000, 10000, 100000] {
        let spans = create_test_spans(size);
        group.throughput(Throughput::Elements(size as u64));

        group.bench_function(format!("time_index_{}", size), |b| {
            b.iter_batched(
                || spans.clone(),
                |spans| create_index(black_box(spans)),
                BatchSize::LargeInput,
            )
        });
    }

    group.finish();
}

fn bench_query(c: &mut Criterion) {
    let mut group = c.benchmark_group("query");
    let mut index = create_index(create_test_spans(100000));

    group.bench_function("intersection_1h", |b| {
        let range = Interval::new(50 * MS_PER_HOUR, 51 * MS_PER_HOUR);
        b.iter(|| index.intersection(black_box(range), true, false).len())
    });

    group.bench_function("filter_dimension", |b| {
        let mut kind = 0i64;
        b.iter(|| {
            kind = (kind + 1) % 7;
            index.filter_dimension("kind", Some(FilterValue::exact(kind)));
        })
    });

    index.filter_dimension("kind", None);
    group.bench_function("group_by_kind", |b| {
        b.iter(|| index.group_data("kind", |k| k.clone(), &Count).len())
    });

    group.finish();
}

fn bench_binning(c: &mut Criterion) {
    let mut group = c.benchmark_group("binning");
    let spans = create_test_spans(10000);

    for bin_type in [DateBinType::Hour, DateBinType::HourOfDay, DateBinType::Month] {
        let method = DateBinMethod::new(bin_type, |s: &Span| s.interval);
        group.throughput(Throughput::Elements(spans.len() as u64));

        group.bench_function(format!("get_value_{}", bin_type), |b| {
            b.iter(|| {
                spans
                    .iter()
                    .map(|s| method.get_value(black_box(s)).first())
                    .sum::<i64>()
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_insert, bench_query, bench_binning);
criterion_main!(benches);
