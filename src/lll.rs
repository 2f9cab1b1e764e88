//! LLL (Lenstra-Lenstra-Lovász) reduction over a row range.
//!
//! The reducer operates on a [`MatGso`] context passed in per call, so it
//! never holds its own reference to the basis. Two entry points:
//!
//! - [`LllReducer::lll`] restores LLL-reducedness on `[kappa_min, kappa_end)`
//!   starting work at `kappa_start`; swaps never reach below `kappa_min`.
//! - [`LllReducer::size_reduction`] only size-reduces the rows of a range.
//!
//! Rows that become the exact zero vector during reduction are moved behind
//! `kappa_end - 1` and excluded from the remaining work. Running `lll` over
//! `d + 1` rows that span a rank-`d` lattice therefore ends with the
//! dependency materialized as a single trailing zero row.
//!
//! Failure is reported through the returned bool plus the `status` field:
//! `BabaiFailure` when size reduction stops making progress, `LllFailure`
//! when the swap budget runs out, `GsoFailure` when the factor degenerates.

use num_bigint::BigInt;
use num_traits::FromPrimitive;

use crate::defs::{RedStatus, SIZE_RED_FAILURE_THRESH};
use crate::float::FloatLike;
use crate::gso::MatGso;

/// Swap budget per `lll` call; exceeding it means the float precision can no
/// longer certify progress.
const MAX_SWAPS: usize = 100_000;

/// Counters accumulated across the lifetime of the reducer.
#[derive(Debug, Clone, Default)]
pub struct LllStats {
    /// Integer row reductions applied by Babai sweeps
    pub size_reductions: usize,
    /// Calls to the `size_reduction` entry point
    pub size_reduction_calls: usize,
    /// Calls to the `lll` entry point
    pub lll_calls: usize,
    /// Row swaps, cumulative over all calls
    pub swaps: usize,
}

/// LLL reducer with quality parameters `delta` and `eta`.
pub struct LllReducer<F: FloatLike> {
    delta: F,
    eta: F,
    /// Failure code of the most recent call
    pub status: RedStatus,
    /// Row swaps performed by the most recent call
    pub n_swaps: usize,
    stats: LllStats,
}

impl<F: FloatLike> LllReducer<F> {
    /// # Panics
    ///
    /// Panics unless `delta` is in `(0.25, 1.0]` and `eta` in `[0.5, sqrt(delta))`.
    pub fn new(delta: f64, eta: f64) -> Self {
        assert!(delta > 0.25 && delta <= 1.0, "delta must be in (0.25, 1.0]");
        assert!(eta >= 0.5 && eta * eta < delta, "eta must be in [0.5, sqrt(delta))");
        Self {
            delta: F::from_f64(delta),
            eta: F::from_f64(eta),
            status: RedStatus::Success,
            n_swaps: 0,
            stats: LllStats::default(),
        }
    }

    pub fn stats(&self) -> &LllStats {
        &self.stats
    }

    /// LLL-reduce rows `[kappa_min, kappa_end)`, starting at `kappa_start`.
    ///
    /// Rows below `kappa_min` are read as reduction targets but never
    /// modified. Returns false on failure, with the reason in `status`.
    pub fn lll(
        &mut self,
        m: &mut MatGso<F>,
        kappa_min: usize,
        kappa_start: usize,
        kappa_end: usize,
    ) -> bool {
        assert!(kappa_min <= kappa_start && kappa_start <= kappa_end);
        assert!(kappa_end <= m.d());
        self.stats.lll_calls += 1;
        self.n_swaps = 0;

        let mut end = kappa_end;
        let mut k = kappa_start.max(kappa_min + 1);
        let mut remaining_swaps = MAX_SWAPS;

        while k < end {
            if !self.babai(m, k) {
                return false;
            }
            if m.is_row_zero(k) {
                // A dependency collapsed to the zero vector; park it behind
                // the working range
                m.move_row(k, end - 1);
                end -= 1;
                continue;
            }

            let (r_prev, expo_prev) = m.get_r_exp(k - 1, k - 1);
            let (r_curr, expo_curr) = m.get_r_exp(k, k);
            let (mu_hat, mu_expo) = m.get_mu_exp(k, k - 1);
            let mu = mu_hat.mul_2si(mu_expo);

            let lhs = r_curr.mul_2si(expo_curr - expo_prev);
            let rhs = (self.delta - mu * mu) * r_prev;
            if lhs >= rhs {
                k += 1;
            } else {
                if remaining_swaps == 0 {
                    self.status = RedStatus::LllFailure;
                    return false;
                }
                remaining_swaps -= 1;
                m.swap_rows(k - 1, k);
                self.n_swaps += 1;
                self.stats.swaps += 1;
                k = (k - 1).max(kappa_min + 1);
            }
        }

        self.status = RedStatus::Success;
        true
    }

    /// Size-reduce rows `[kappa_min, kappa_end)` without any swaps.
    pub fn size_reduction(
        &mut self,
        m: &mut MatGso<F>,
        kappa_min: usize,
        kappa_end: usize,
    ) -> bool {
        assert!(kappa_min <= kappa_end && kappa_end <= m.d());
        self.stats.size_reduction_calls += 1;
        self.n_swaps = 0;
        for k in kappa_min..kappa_end {
            if !self.babai(m, k) {
                return false;
            }
        }
        self.status = RedStatus::Success;
        true
    }

    /// Iterated nearest-plane reduction of row `kappa` against all earlier
    /// rows. Repeats batched sweeps until every |mu| is at most `eta`; a
    /// dependent row ends up as the exact zero vector.
    fn babai(&mut self, m: &mut MatGso<F>, kappa: usize) -> bool {
        let mut stalls = 0usize;
        let mut last_norm: Option<BigInt> = None;

        loop {
            if !m.update_gso_row(kappa) {
                self.status = RedStatus::GsoFailure;
                return false;
            }

            let mut ops: Vec<(usize, BigInt)> = Vec::new();
            for j in (0..kappa).rev() {
                let (mu_hat, mu_expo) = m.get_mu_exp(kappa, j);
                let mu = mu_hat.mul_2si(mu_expo);
                if mu.abs() > self.eta {
                    let q = mu.round();
                    if let Some(q) = BigInt::from_f64(q.to_f64()) {
                        ops.push((j, -q));
                    }
                }
            }
            if ops.is_empty() {
                return true;
            }

            let norm = m.basis().row_norm_sq(kappa);
            if let Some(prev) = &last_norm {
                if norm >= *prev {
                    stalls += 1;
                    if stalls >= SIZE_RED_FAILURE_THRESH {
                        self.status = RedStatus::BabaiFailure;
                        return false;
                    }
                } else {
                    stalls = 0;
                }
            }
            last_norm = Some(norm);

            m.row_op_begin(kappa, kappa + 1);
            for (j, q) in &ops {
                m.row_addmul(kappa, *j, q);
            }
            m.row_op_end(kappa, kappa + 1);
            self.stats.size_reductions += ops.len();
        }
    }
}
