//! End-to-end tests for the BKZ driver: termination statuses, basis
//! invariants and the insertion paths.

use std::path::Path;

use num_bigint::BigInt;
use num_integer::Integer;
use num_traits::{Signed, Zero};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use lattice_engine::{
    bkz_reduction, BkzObserver, BkzParams, BkzReduction, LatticeBasis, LllReducer, MatGso,
    RedStatus, TourReport,
};

/// Observer that records the events of a run for assertions.
#[derive(Default)]
struct RecordingObserver {
    tour_count: usize,
    first_reduced: Vec<usize>,
    finished: Option<RedStatus>,
    dumps: usize,
}

impl BkzObserver for RecordingObserver {
    fn on_block_first_reduced(&mut self, kappa: usize, _block_size: usize) {
        self.first_reduced.push(kappa);
    }

    fn on_tour_end(&mut self, _report: &TourReport) {
        self.tour_count += 1;
    }

    fn on_dump(&mut self, _path: &Path, _prefix: &str) {
        self.dumps += 1;
    }

    fn on_finish(&mut self, status: RedStatus) {
        self.finished = Some(status);
    }
}

/// Run a reduction with a recording observer; returns the basis, the final
/// status, the driver's bool and the observer.
fn run_recorded(
    basis: LatticeBasis,
    params: &BkzParams,
) -> (LatticeBasis, RedStatus, bool, RecordingObserver) {
    let mut m: MatGso<f64> = MatGso::from_basis(basis);
    let mut lll = LllReducer::new(params.delta, 0.51);
    let (status, ok, observer) = {
        let mut red =
            BkzReduction::with_observer(&mut m, &mut lll, params, RecordingObserver::default());
        let ok = red.reduce();
        let status = red.status();
        let observer = std::mem::take(red.observer_mut());
        (status, ok, observer)
    };
    (m.into_basis(), status, ok, observer)
}

/// Row-style Hermite normal form with positive pivots and reduced
/// off-pivot entries; zero rows are dropped. Two generating sets span the
/// same lattice exactly when their forms agree.
fn hnf(basis: &LatticeBasis) -> Vec<Vec<BigInt>> {
    let mut rows: Vec<Vec<BigInt>> = basis.rows().to_vec();
    let nrows = rows.len();
    let ncols = basis.num_cols();
    let mut pivot_row = 0;

    for col in 0..ncols {
        if pivot_row >= nrows {
            break;
        }
        for r in (pivot_row + 1)..nrows {
            if rows[r][col].is_zero() {
                continue;
            }
            if rows[pivot_row][col].is_zero() {
                rows.swap(pivot_row, r);
                continue;
            }
            let a = rows[pivot_row][col].clone();
            let b = rows[r][col].clone();
            let ext = a.extended_gcd(&b);
            let a_g = &a / &ext.gcd;
            let b_g = &b / &ext.gcd;
            for c in 0..ncols {
                let p = rows[pivot_row][c].clone();
                let q = rows[r][c].clone();
                rows[pivot_row][c] = &ext.x * &p + &ext.y * &q;
                rows[r][c] = &a_g * &q - &b_g * &p;
            }
        }
        if rows[pivot_row][col].is_zero() {
            continue;
        }
        if rows[pivot_row][col].is_negative() {
            for c in 0..ncols {
                rows[pivot_row][c] = -rows[pivot_row][c].clone();
            }
        }
        for r in 0..pivot_row {
            let q = rows[r][col].div_floor(&rows[pivot_row][col]);
            if !q.is_zero() {
                for c in 0..ncols {
                    let sub = &q * &rows[pivot_row][c];
                    rows[r][c] -= sub;
                }
            }
        }
        pivot_row += 1;
    }

    rows.retain(|row| row.iter().any(|x| !x.is_zero()));
    rows
}

fn assert_same_lattice(a: &LatticeBasis, b: &LatticeBasis) {
    assert_eq!(hnf(a), hnf(b), "bases span different lattices");
}

fn shortest_row_norm_sq(basis: &LatticeBasis) -> BigInt {
    (0..basis.num_rows())
        .filter(|&i| !basis.is_row_zero(i))
        .map(|i| basis.row_norm_sq(i))
        .min()
        .expect("no nonzero rows")
}

/// Subset-sum style basis with a planted difference vector of squared
/// norm 3: unit rows carrying large weights, plus the target sum row.
fn knapsack_basis(rng: &mut ChaCha8Rng) -> LatticeBasis {
    let n = 10;
    let weights: Vec<i64> = (0..n - 1).map(|_| rng.gen_range(900_000..1_100_000)).collect();
    let target: i64 = weights[0] + weights[2] + weights[4];

    let mut rows = Vec::with_capacity(n);
    for (i, &w) in weights.iter().enumerate() {
        let mut row = vec![0i64; n];
        row[i] = 1;
        row[n - 1] = w;
        rows.push(row);
    }
    let mut last = vec![0i64; n];
    last[n - 1] = target;
    rows.push(last);
    LatticeBasis::from_i64(&rows)
}

#[test]
fn test_identity_is_one_clean_tour() {
    let basis = LatticeBasis::from_i64(&[vec![1, 0], vec![0, 1]]);
    let mut params = BkzParams::new(2);
    params.flags.verbose = true;

    let (out, status, ok, observer) = run_recorded(basis.clone(), &params);
    assert!(ok);
    assert_eq!(status, RedStatus::Success);
    assert_eq!(observer.finished, Some(RedStatus::Success));
    assert_eq!(observer.tour_count, 1);
    assert_eq!(out, basis);
}

#[test]
fn test_skewed_3d_basis_reduces_to_short_rows() {
    let basis = LatticeBasis::from_i64(&[vec![1, 0, 0], vec![0, 1, 0], vec![1000, 1000, 1]]);
    let (out, status) = bkz_reduction(basis.clone(), &BkzParams::new(2));

    assert_eq!(status, RedStatus::Success);
    assert_same_lattice(&basis, &out);
    for i in 0..3 {
        assert!(
            out.row_norm_sq(i) <= BigInt::from(3),
            "row {} too long: {}",
            i,
            out.row_norm_sq(i)
        );
    }
}

#[test]
fn test_knapsack_hidden_short_vector() {
    let mut rng = ChaCha8Rng::seed_from_u64(42);
    let basis = knapsack_basis(&mut rng);
    let initial_r0 = basis.row_norm_sq(0);

    let params = BkzParams::new(4).with_max_loops(5);
    let (out, status) = bkz_reduction(basis.clone(), &params);

    assert!(status.accepts_basis());
    assert_same_lattice(&basis, &out);
    assert!(
        shortest_row_norm_sq(&out) <= BigInt::from(9),
        "no short vector found: {}",
        shortest_row_norm_sq(&out)
    );
    // The leading Gram-Schmidt norm never grows under block reduction
    assert!(out.row_norm_sq(0) <= initial_r0);
}

#[test]
fn test_knapsack_with_preprocessing_chain() {
    let mut rng = ChaCha8Rng::seed_from_u64(7);
    let basis = knapsack_basis(&mut rng);

    let params = BkzParams::new(6).with_preprocessing(BkzParams::new(3));
    let (out, status) = bkz_reduction(basis.clone(), &params);

    assert!(status.accepts_basis());
    assert_same_lattice(&basis, &out);
    assert!(shortest_row_norm_sq(&out) <= BigInt::from(9));
}

#[test]
fn test_zero_loop_budget_leaves_basis_untouched() {
    let basis = LatticeBasis::from_i64(&[
        vec![12, 3, 0, 0, 1],
        vec![4, 9, 1, 0, 0],
        vec![0, 2, 7, 1, 0],
        vec![1, 0, 3, 8, 2],
        vec![5, 1, 0, 2, 9],
    ]);
    let params = BkzParams::new(3).with_max_loops(0);
    let (out, status, ok, _) = run_recorded(basis.clone(), &params);

    assert!(ok, "a loop budget is not an error");
    assert_eq!(status, RedStatus::BkzLoopsLimit);
    assert_eq!(out, basis);
}

#[test]
fn test_zero_time_budget_reports_time_limit() {
    let basis = LatticeBasis::from_i64(&[vec![4, 1], vec![1, 3]]);
    let params = BkzParams::new(2).with_max_time(0.0);
    let (out, status, ok, _) = run_recorded(basis.clone(), &params);

    assert!(ok);
    assert_eq!(status, RedStatus::BkzTimeLimit);
    assert_eq!(out, basis);
}

#[test]
fn test_unit_coordinate_insertion_is_a_single_row_move() {
    // Orthogonal rows whose Gram-Schmidt profile passes the Lovász test at
    // delta = 0.75 while the trailing row beats the delta-step bound
    let basis = LatticeBasis::from_i64(&[
        vec![10, 0, 0, 0, 0],
        vec![0, 9, 0, 0, 0],
        vec![0, 0, 9, 0, 0],
        vec![0, 0, 0, 9, 0],
        vec![0, 0, 0, 0, 8],
    ]);
    let mut params = BkzParams::new(5);
    params.delta = 0.75;

    let mut m: MatGso<f64> = MatGso::from_basis(basis.clone());
    let mut lll = LllReducer::new(params.delta, 0.51);
    let status = {
        let mut red =
            BkzReduction::with_observer(&mut m, &mut lll, &params, lattice_engine::NullObserver);
        assert!(red.reduce());
        red.status()
    };
    let gso_stats = m.stats().clone();
    let lll_stats = lll.stats().clone();

    assert_eq!(status, RedStatus::Success);
    assert_eq!(gso_stats.rows_moved, 1, "expected exactly one row move");
    assert_eq!(gso_stats.rows_created, 0, "no workspace row expected");
    assert_eq!(lll_stats.size_reduction_calls, 1);

    // The short row leads now
    assert_eq!(m.basis().row_norm_sq(0), BigInt::from(64));
    assert_same_lattice(&basis, m.basis());
}

#[test]
fn test_reduced_basis_gives_clean_first_tour() {
    let basis = LatticeBasis::from_i64(&[
        vec![1, 0, 0, 0, 0],
        vec![0, 1, 0, 0, 0],
        vec![0, 0, 1, 0, 0],
        vec![0, 0, 0, 1, 0],
        vec![0, 0, 0, 0, 1],
    ]);
    let mut params = BkzParams::new(10);
    params.flags.verbose = true;

    let (out, status, ok, observer) = run_recorded(basis.clone(), &params);
    assert!(ok);
    assert_eq!(status, RedStatus::Success);
    assert_eq!(observer.tour_count, 1);
    assert_eq!(out, basis);
}

#[test]
fn test_second_run_is_idempotent() {
    let basis = LatticeBasis::from_i64(&[vec![1, 0, 0], vec![0, 1, 0], vec![1000, 1000, 1]]);
    let (reduced, status) = bkz_reduction(basis, &BkzParams::new(2));
    assert_eq!(status, RedStatus::Success);

    let mut params = BkzParams::new(2);
    params.flags.verbose = true;
    let (again, status, ok, observer) = run_recorded(reduced.clone(), &params);
    assert!(ok);
    assert_eq!(status, RedStatus::Success);
    assert_eq!(observer.tour_count, 1);
    assert_eq!(again, reduced);
}

#[test]
fn test_trailing_zero_rows_are_preserved() {
    let basis = LatticeBasis::from_i64(&[vec![4, 1], vec![1, 3], vec![0, 0]]);
    let (out, status) = bkz_reduction(basis.clone(), &BkzParams::new(2));

    assert_eq!(status, RedStatus::Success);
    assert_eq!(out.num_rows(), 3, "rank changed");
    assert!(out.is_row_zero(2), "workspace row was consumed");
    assert_same_lattice(&basis, &out);
}

#[test]
fn test_bounded_lll_flag_preserves_lattice() {
    let basis = LatticeBasis::from_i64(&[vec![1, 0, 0], vec![0, 1, 0], vec![1000, 1000, 1]]);
    let mut params = BkzParams::new(2);
    params.flags.bounded_lll = true;

    let (out, status) = bkz_reduction(basis.clone(), &params);
    assert_eq!(status, RedStatus::Success);
    assert_same_lattice(&basis, &out);
}

#[test]
fn test_auto_abort_run_terminates() {
    let mut rng = ChaCha8Rng::seed_from_u64(3);
    let basis = knapsack_basis(&mut rng);
    let params = BkzParams::new(4).with_auto_abort();

    let (out, status) = bkz_reduction(basis.clone(), &params);
    assert!(status.accepts_basis());
    assert_same_lattice(&basis, &out);
}

#[test]
fn test_gso_dump_lifecycle() {
    let path = std::env::temp_dir().join("lattice_engine_bkz_dump_test.txt");
    let basis = LatticeBasis::from_i64(&[vec![1, 0, 0], vec![0, 1, 0], vec![1000, 1000, 1]]);
    let params = BkzParams::new(2).with_dump_gso(path.clone());

    let (_, status) = bkz_reduction(basis.clone(), &params);
    assert_eq!(status, RedStatus::Success);

    let content = std::fs::read_to_string(&path).unwrap();
    let lines: Vec<&str> = content.lines().collect();
    assert!(lines.len() >= 2);
    assert!(lines[0].starts_with("Input:"));
    assert!(lines.last().unwrap().starts_with("Output"));
    // Each dump carries one value per basis row
    assert_eq!(lines[0].split_whitespace().count(), 1 + 3);

    // A second run truncates the previous profile
    let (_, status) = bkz_reduction(basis, &params);
    assert_eq!(status, RedStatus::Success);
    let content2 = std::fs::read_to_string(&path).unwrap();
    assert_eq!(content2.lines().count(), content.lines().count());
    assert!(content2.lines().next().unwrap().starts_with("Input:"));

    let _ = std::fs::remove_file(&path);
}

#[test]
fn test_hnf_helper_detects_different_lattices() {
    let a = LatticeBasis::from_i64(&[vec![1, 0], vec![0, 1]]);
    let b = LatticeBasis::from_i64(&[vec![2, 0], vec![0, 1]]);
    assert_ne!(hnf(&a), hnf(&b));

    // Unimodular transforms keep the form
    let c = LatticeBasis::from_i64(&[vec![1, 1], vec![0, 1]]);
    assert_eq!(hnf(&a), hnf(&c));
}
