//! Evaluator performance benchmarks: ground lookup, independent
//! decomposition, separator-variable enumeration, and inclusion-exclusion.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use std::time::Duration;
use tipd::ast::Term;
use tipd::config::EvaluatorConfig;
use tipd::{evaluator, Query, Store};

fn cst(s: &str) -> Term {
    Term::Const(s.to_string())
}

fn bench_ground_atom(c: &mut Criterion) {
    let mut store = Store::new();
    store.add("R", vec!["a".to_string()], 0.5).unwrap();
    let query = Query::atom("R", vec![cst("a")]);
    let config = EvaluatorConfig::default();

    c.bench_function("ground_atom", |b| {
        b.iter(|| evaluator::eval(&query, &store, &config).unwrap());
    });
}

fn bench_independent_conjunction(c: &mut Criterion) {
    let config = EvaluatorConfig::default();

    let mut group = c.benchmark_group("independent_conjunction");
    for size in [2usize, 8, 32] {
        let mut store = Store::new();
        let mut children = Vec::new();
        for i in 0..size {
            let relation = format!("R{i}");
            store.add(relation.clone(), vec!["a".to_string()], 0.5).unwrap();
            children.push(Query::atom(relation, vec![cst("a")]));
        }
        let query = Query::and(children);

        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| evaluator::eval(&query, &store, &config).unwrap());
        });
    }
    group.finish();
}

fn bench_separator_existential(c: &mut Criterion) {
    let config = EvaluatorConfig::default();

    let mut group = c.benchmark_group("separator_existential");
    for size in [10u32, 100, 1_000] {
        let mut store = Store::new();
        for i in 0..size {
            store
                .add("R", vec![i.to_string(), "a".to_string()], 0.4)
                .unwrap();
        }
        let query = Query::exists("x", Query::atom("R", vec![Term::Var("x".into()), cst("a")]));

        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| evaluator::eval(&query, &store, &config).unwrap());
        });
    }
    group.finish();
}

fn bench_inclusion_exclusion(c: &mut Criterion) {
    let mut group = c.benchmark_group("inclusion_exclusion");
    for size in [2usize, 4, 8] {
        let mut config = EvaluatorConfig::default();
        config.inclusion_exclusion_ceiling = 16;

        let mut store = Store::new();
        store.add("S", vec!["shared".to_string()], 0.5).unwrap();
        let shared = Query::atom("S", vec![cst("shared")]);

        let mut children = Vec::new();
        for i in 0..size {
            let relation = format!("R{i}");
            store.add(relation.clone(), vec!["a".to_string()], 0.3).unwrap();
            children.push(Query::and(vec![Query::atom(relation, vec![cst("a")]), shared.clone()]));
        }
        let query = Query::or(children);

        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| evaluator::eval(&query, &store, &config).unwrap());
        });
    }
    group.finish();
}

criterion_group! {
    name = benches;
    config = Criterion::default()
        .measurement_time(Duration::from_secs(5))
        .warm_up_time(Duration::from_secs(1));
    targets = bench_ground_atom, bench_independent_conjunction, bench_separator_existential, bench_inclusion_exclusion
}
criterion_main!(benches);
