use criterion::{black_box, criterion_group, BenchmarkId, Criterion};
use pennylane::transforms::{decompose, DecomposeOptions};

use super::generators::make_cnot_layers;

fn bench_decompose(c: &mut Criterion) {
    let mut g = c.benchmark_group("decompose CNOT layers");

    for graph in [false, true] {
        let name = if graph { "graph" } else { "legacy" };
        g.bench_with_input(BenchmarkId::new(name, 100), &graph, |b, &graph| {
            let circ = make_cnot_layers(8, 100);
            let options = DecomposeOptions {
                graph,
                ..DecomposeOptions::with_gate_set(["RX", "RZ", "CZ", "GlobalPhase"])
            };
            b.iter(|| black_box(decompose(&circ, &options)))
        });
    }
    g.finish();
}

criterion_group! {
    name = benches;
    config = Criterion::default();
    targets =
        bench_decompose,
}
