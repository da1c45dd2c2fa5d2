use criterion::{black_box, criterion_group, AxisScale, BenchmarkId, Criterion, PlotConfiguration};
use pennylane::simulator::{simulate, McmMethod, SimulationConfig};

use super::generators::{make_cnot_layers, make_mcm_chain};

fn bench_final_state(c: &mut Criterion) {
    let mut g = c.benchmark_group("simulate without mid-circuit measurements");
    g.plot_config(PlotConfiguration::default().summary_scale(AxisScale::Logarithmic));

    for size in [10, 100, 1_000] {
        g.bench_with_input(BenchmarkId::new("cnot_layers", size), &size, |b, size| {
            let circ = make_cnot_layers(8, *size);
            let config = SimulationConfig::default();
            b.iter(|| black_box(simulate(&circ, &config)))
        });
    }
    g.finish();
}

fn bench_mcm_methods(c: &mut Criterion) {
    let mut g = c.benchmark_group("simulate mid-circuit measurements");

    for method in [McmMethod::Tree, McmMethod::OneShot] {
        g.bench_with_input(
            BenchmarkId::new("mcm_chain", method),
            &method,
            |b, &mcm_method| {
                let circ = make_mcm_chain(6, 1_000);
                let config = SimulationConfig {
                    mcm_method,
                    ..SimulationConfig::seeded(0)
                };
                b.iter(|| black_box(simulate(&circ, &config)))
            },
        );
    }
    g.finish();
}

criterion_group! {
    name = benches;
    config = Criterion::default();
    targets =
        bench_final_state,
        bench_mcm_methods,
}
