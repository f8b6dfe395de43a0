//! Criterion benchmarks for `gsmp-math`.
//!
//! Fox-Glynn weights and Gauss-Legendre rules are rebuilt for every
//! uniformization evaluation the strategies make.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use gsmp_math::{fox_glynn, gauss_legendre, Polynomial, DEFAULT_FOX_GLYNN_MAX_ITERATIONS};

fn bench_fox_glynn(c: &mut Criterion) {
    let mut group = c.benchmark_group("fox_glynn");

    for (name, rate) in [
        ("small", 2.5),
        ("medium", 150.0),
        ("large", 10_000.0),
        ("stiff", 1.0e6),
    ] {
        group.bench_with_input(BenchmarkId::new("weights", name), &rate, |b, &rate| {
            b.iter(|| {
                black_box(fox_glynn(
                    black_box(rate),
                    black_box(1e-10),
                    DEFAULT_FOX_GLYNN_MAX_ITERATIONS,
                ))
            });
        });
    }

    group.finish();
}

fn bench_surrogate_kernels(c: &mut Criterion) {
    let mut group = c.benchmark_group("surrogate");

    for degree in [4usize, 8, 12] {
        group.bench_with_input(
            BenchmarkId::new("taylor_error_extremum", degree),
            &degree,
            |b, &degree| {
                let low = Polynomial::exp_neg_taylor(1.0, degree);
                let high = Polynomial::exp_neg_taylor(1.0, degree + 2);
                let diff = &high + &low.scale(-1.0);
                b.iter(|| black_box(diff.max_abs_on(-0.25, 0.25, 1e-12, 10_000)));
            },
        );
    }

    group.bench_function("gauss_legendre_10", |b| {
        b.iter(|| black_box(gauss_legendre(black_box(10), 1e-10)));
    });

    group.finish();
}

criterion_group!(benches, bench_fox_glynn, bench_surrogate_kernels);
criterion_main!(benches);
