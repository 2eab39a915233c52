//! Benchmarks for lazy simplification and its memo table.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use derivator::mapping::{Environment, Lookup};
use derivator::normalize::simplify;
use derivator::prelude::*;

/// Builds `v1 + (v2 + (... + vn))` and binds every variable to `1`.
fn bound_sum(ctx: &Context, n: usize) -> Value {
    let vars: Vec<MetaVar<Value>> = (0..n).map(|_| ctx.fresh()).collect();
    let sum = vars
        .iter()
        .rev()
        .fold(Value::Nat(0), |acc, var| Value::addition(Value::Var(*var), acc));
    for var in vars {
        ctx.bind(var, Value::Nat(1)).unwrap();
    }
    sum
}

/// First simplification of a 500-deep addition.
fn bench_addition_cold(c: &mut Criterion) {
    c.bench_function("addition_500_cold", |b| {
        b.iter_with_setup(
            || {
                let ctx = Context::new();
                let sum = bound_sum(&ctx, 500);
                (ctx, sum)
            },
            |(ctx, sum)| {
                assert_eq!(simplify(&ctx, black_box(&sum)), Value::Nat(500));
            },
        );
    });
}

/// Repeated simplification served from the memo table.
fn bench_addition_memoized(c: &mut Criterion) {
    let ctx = Context::new();
    let sum = bound_sum(&ctx, 500);
    simplify(&ctx, &sum);

    c.bench_function("addition_500_memoized", |b| {
        b.iter(|| {
            assert_eq!(simplify(&ctx, black_box(&sum)), Value::Nat(500));
        });
    });
}

/// Lookup through 100 environment layers of one entry each.
fn bench_layered_lookup(c: &mut Criterion) {
    let ctx = Context::new();
    let env = (0..100u64).fold(Environment::empty(), |env, i| {
        Mapping::comma(env, Environment::singleton(Identifier::new(&format!("x{}", i)), Value::Nat(i)))
    });
    let key = Identifier::new("x0");

    c.bench_function("layered_lookup_100", |b| {
        b.iter(|| {
            assert_eq!(env.lookup(&ctx, black_box(&key)), Lookup::Found(Value::Nat(0)));
        });
    });
}

criterion_group!(
    name = benches;
    config = Criterion::default().sample_size(10);
    targets = bench_addition_cold,
              bench_addition_memoized,
              bench_layered_lookup
);
criterion_main!(benches);
