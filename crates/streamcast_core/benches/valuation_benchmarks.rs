use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};

use streamcast_core::{
    Calculator, Distribution, Model, ModelSettings, SensitivityAnalyzer, Stream, StreamType,
};

fn demo_model() -> Model {
    let mut model = Model::new("bench", ModelSettings::default());
    model.add_stream(Stream::new(
        "subs",
        "Subscriptions",
        StreamType::Revenue,
        0,
        Distribution::Normal {
            mean: 10_000.0,
            std: 1_500.0,
        },
    ));
    model.add_stream(Stream::new(
        "licenses",
        "Licenses",
        StreamType::Revenue,
        6,
        Distribution::Triangular {
            min: 2_000.0,
            likely: 5_000.0,
            max: 9_000.0,
        },
    ));
    model.add_stream(
        Stream::new(
            "support",
            "Support",
            StreamType::Cost,
            0,
            Distribution::Normal {
                mean: 0.3,
                std: 0.05,
            },
        )
        .with_parent("subs"),
    );
    model.add_stream(Stream::new(
        "ops",
        "Operations",
        StreamType::Cost,
        0,
        Distribution::Fixed { value: 4_000.0 },
    ));
    model
}

fn bench_deterministic(c: &mut Criterion) {
    let model = demo_model();
    c.bench_function("deterministic_run", |b| {
        b.iter(|| Calculator::new(&model).run_deterministic().unwrap());
    });
}

fn bench_monte_carlo(c: &mut Criterion) {
    let model = demo_model();
    let mut group = c.benchmark_group("monte_carlo");
    for iterations in [100, 1_000, 10_000] {
        group.bench_with_input(
            BenchmarkId::from_parameter(iterations),
            &iterations,
            |b, &n| {
                b.iter(|| Calculator::new(&model).run_monte_carlo(n, 42).unwrap());
            },
        );
    }
    group.finish();
}

fn bench_tornado(c: &mut Criterion) {
    let model = demo_model();
    c.bench_function("tornado_analysis", |b| {
        b.iter(|| SensitivityAnalyzer::new(&model).run_tornado_analysis(42).unwrap());
    });
}

criterion_group!(benches, bench_deterministic, bench_monte_carlo, bench_tornado);
criterion_main!(benches);
