use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use oxrdf::{Literal, NamedNode, Term};
use quadstore::string_pool::FlatFile;
use quadstore::{StatementStore, StringPool, TypeCategory, NONE};
use std::sync::Arc;

fn iri(i: u64) -> Term {
    Term::NamedNode(NamedNode::new(format!("http://example.org/resource/{}", i)).unwrap())
}

/// Benchmark statement insertion into all six indexes
fn bench_statement_insertion(c: &mut Criterion) {
    let mut group = c.benchmark_group("statement_insertion");

    for size in [100u64, 1000, 10_000].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            b.iter(|| {
                let mut store = StatementStore::new();
                for i in 0..size {
                    store.add_triple(i + 1, (i % 7) + 1, (i * 31 % size) + 1, 1).unwrap();
                }
                criterion::black_box(store.len());
            });
        });
    }
    group.finish();
}

/// Benchmark pattern scans with one bound position
fn bench_pattern_scan(c: &mut Criterion) {
    let mut group = c.benchmark_group("pattern_scan");

    for size in [1000u64, 10_000].iter() {
        let mut store = StatementStore::new();
        for i in 0..*size {
            store.add_triple((i % 100) + 1, (i % 7) + 1, i + 1, 1).unwrap();
        }

        group.bench_with_input(BenchmarkId::new("by_predicate", size), size, |b, _| {
            b.iter(|| {
                let rows = store.find_tuples(NONE, 3, NONE, NONE).unwrap().count();
                criterion::black_box(rows);
            });
        });
        group.bench_with_input(BenchmarkId::new("by_subject", size), size, |b, _| {
            b.iter(|| {
                let rows = store.find_tuples(42, NONE, NONE, NONE).unwrap().count();
                criterion::black_box(rows);
            });
        });
    }
    group.finish();
}

/// Benchmark term localization and typed range lookups in the node pool
fn bench_string_pool(c: &mut Criterion) {
    let mut group = c.benchmark_group("string_pool");

    group.bench_function("localize_1000_iris", |b| {
        b.iter(|| {
            let mut pool = StringPool::new(Arc::new(FlatFile::temporary().unwrap()));
            for i in 0..1000 {
                pool.localize(&iri(i)).unwrap();
            }
            criterion::black_box(pool.len());
        });
    });

    let mut pool = StringPool::new(Arc::new(FlatFile::temporary().unwrap()));
    for i in 0..5000i64 {
        pool.localize(&Term::Literal(Literal::from(i))).unwrap();
    }
    group.bench_function("find_type_integer", |b| {
        b.iter(|| {
            let nodes = pool
                .find_type(TypeCategory::TypedLiteral, Some("http://www.w3.org/2001/XMLSchema#integer"))
                .unwrap();
            criterion::black_box(nodes.len());
        });
    });
    group.finish();
}

criterion_group!(
    benches,
    bench_statement_insertion,
    bench_pattern_scan,
    bench_string_pool,
);

criterion_main!(benches);
