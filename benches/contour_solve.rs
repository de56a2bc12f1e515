use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use feast::{
    DensePencil, FeastOptions, FeastProblem, QuadratureRule, Region, SerialExecutor,
    ThreadPoolExecutor,
};
use nalgebra::DMatrix;

struct Scenario {
    name: &'static str,
    n: usize,
    region: Region,
    m0: usize,
}

fn laplacian(n: usize) -> DMatrix<f64> {
    DMatrix::from_fn(n, n, |i, j| match i.abs_diff(j) {
        0 => 2.0,
        1 => -1.0,
        _ => 0.0,
    })
}

fn bench_contour_solve(c: &mut Criterion) {
    let scenarios = [
        Scenario {
            name: "laplacian_n64",
            n: 64,
            region: Region::interval(0.5, 1.0),
            m0: 12,
        },
        Scenario {
            name: "laplacian_n128",
            n: 128,
            region: Region::interval(1.05, 1.5),
            m0: 24,
        },
    ];
    let pool = ThreadPoolExecutor::new(4).unwrap_or_else(|err| panic!("thread pool: {err}"));

    let mut group = c.benchmark_group("contour_solve");
    group.sample_size(10);
    for scenario in &scenarios {
        let pencil = DensePencil::from_real(&laplacian(scenario.n))
            .unwrap_or_else(|err| panic!("failed to build pencil {}: {err}", scenario.name));
        let variants = [
            ("gauss", FeastOptions::default()),
            (
                "trapezoid",
                FeastOptions::default().with_rule(QuadratureRule::Trapezoidal),
            ),
            ("refactor", FeastOptions::default().with_factorization_reuse(false)),
        ];
        for (variant, options) in variants {
            let problem = FeastProblem::new(&pencil, scenario.region, scenario.m0)
                .unwrap_or_else(|err| panic!("invalid problem {}: {err}", scenario.name))
                .with_options(options.with_verbose(false));

            group.bench_function(BenchmarkId::new(scenario.name, format!("{variant}-serial")), |b| {
                b.iter(|| black_box(problem.solve_with(&SerialExecutor)))
            });
            group.bench_function(BenchmarkId::new(scenario.name, format!("{variant}-pool4")), |b| {
                b.iter(|| black_box(problem.solve_with(&pool)))
            });
        }
    }
    group.finish();
}

criterion_group!(contour_benches, bench_contour_solve);
criterion_main!(contour_benches);
