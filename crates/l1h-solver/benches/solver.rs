//! Homotopy path benchmarks.

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use l1h_core::DictionaryBuilder;
use l1h_solver::{DenseOperator, DictionaryOperator, HomotopyConfig, HomotopySolver};

/// Synthesize a block measurement with a few emitters and background.
fn make_measurement(op: &DenseOperator, emitters: &[(usize, f64)]) -> Vec<f64> {
    let mut y = vec![0.0; op.nrows()];
    op.synthesize(emitters, &mut y);
    for v in &mut y {
        *v += 0.1;
    }
    y
}

fn bench_homotopy(c: &mut Criterion) {
    let dict = DictionaryBuilder::new()
        .block_size(7)
        .scale(4)
        .margin(4)
        .sigma(1.2)
        .build()
        .unwrap();
    let op = DenseOperator::new(dict.clone());
    let y = make_measurement(&op, &[(200, 5.0), (700, 3.0), (412, 1.5)]);

    c.bench_function("homotopy_7x7_scale4", |b| {
        b.iter(|| {
            let mut solver =
                HomotopySolver::from_dictionary(dict.clone(), HomotopyConfig::localization(20));
            solver.set_measurement(black_box(&y)).unwrap();
            black_box(solver.solve(1e-4).unwrap())
        })
    });
}

fn bench_correlate(c: &mut Criterion) {
    let dict = DictionaryBuilder::new()
        .block_size(7)
        .scale(8)
        .margin(8)
        .sigma(1.2)
        .build()
        .unwrap();
    let op = DenseOperator::new(dict);
    let r: Vec<f64> = (0..op.nrows()).map(|i| (i as f64).sin()).collect();
    let mut out = vec![0.0; op.ncols()];

    c.bench_function("correlate_7x7_scale8", |b| {
        b.iter(|| {
            op.correlate(black_box(&r), &mut out);
            black_box(out[0])
        })
    });
}

criterion_group!(benches, bench_homotopy, bench_correlate);
criterion_main!(benches);
