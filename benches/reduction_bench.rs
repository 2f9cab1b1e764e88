//! Benchmarks for LLL and BKZ on seeded random bases.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use lattice_engine::{bkz_reduction, BkzParams, LatticeBasis, LllReducer, MatGso};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Diagonally dominant random basis, guaranteed non-singular.
fn generate_random_basis(dim: usize, seed: u64) -> LatticeBasis {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut rows = Vec::with_capacity(dim);
    for i in 0..dim {
        let mut row: Vec<i64> = (0..dim).map(|_| rng.gen_range(0..50)).collect();
        row[i] += 100;
        rows.push(row);
    }
    LatticeBasis::from_i64(&rows)
}

fn bench_lll_synthetic(c: &mut Criterion) {
    let mut group = c.benchmark_group("LLL_Synthetic");
    for dim in [10usize, 20, 30] {
        group.bench_with_input(BenchmarkId::from_parameter(dim), &dim, |b, &dim| {
            let basis = generate_random_basis(dim, 42);
            b.iter(|| {
                let mut m: MatGso<f64> = MatGso::from_basis(basis.clone());
                let mut lll = LllReducer::new(0.99, 0.51);
                let d = m.d();
                assert!(lll.lll(&mut m, 0, 0, d));
                black_box(m.basis().row_norm_sq_f64(0))
            });
        });
    }
    group.finish();
}

fn bench_bkz_synthetic(c: &mut Criterion) {
    let mut group = c.benchmark_group("BKZ_Synthetic");
    group.sample_size(10);
    for dim in [10usize, 20] {
        group.bench_with_input(BenchmarkId::from_parameter(dim), &dim, |b, &dim| {
            let basis = generate_random_basis(dim, 42);
            let params = BkzParams::new(4).with_max_loops(8);
            b.iter(|| {
                let (out, status) = bkz_reduction(basis.clone(), &params);
                assert!(status.accepts_basis());
                black_box(out.row_norm_sq_f64(0))
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_lll_synthetic, bench_bkz_synthetic);
criterion_main!(benches);
