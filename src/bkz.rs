//! BKZ (Block Korkine-Zolotarev) reduction driver.
//!
//! BKZ interleaves exact shortest-vector searches over blocks of
//! `block_size` consecutive rows with LLL re-reduction, sweeping the basis
//! in tours until a tour changes nothing or a budget runs out.
//!
//! The driver borrows a [`MatGso`] context and an [`LllReducer`] for the
//! duration of [`BkzReduction::reduce`] and coordinates them with the
//! enumeration engine. Per block it
//!
//! 1. LLL-reduces the block (from row 0, or from the block start when
//!    `bounded_lll` is set),
//! 2. optionally runs a nested BKZ tour sequence at a smaller block size,
//! 3. enumerates the block lattice under the radius `r_kk`, and
//! 4. inserts the winner: skipped entirely when the leading vector is
//!    already within a `delta` factor, a cyclic row move when the winner is
//!    another basis row, and otherwise append-combination / collapse the
//!    dependency with LLL / drop the zero row.
//!
//! Progress is tracked by the least-squares slope of the log Gram-Schmidt
//! profile; the auto-abort heuristic stops tours once the slope stalls.
//!
//! # References
//!
//! - Schnorr, Euchner (1994): "Lattice Basis Reduction"
//! - Chen, Nguyen (2011): "BKZ 2.0: Better Lattice Security Estimates"

use std::path::{Path, PathBuf};
use std::time::Instant;

use num_bigint::BigInt;
use serde::{Deserialize, Serialize};

use crate::basis::LatticeBasis;
use crate::defs::{
    RedStatus, BKZ_DEF_AUTO_ABORT_MAX_NO_DEC, BKZ_DEF_AUTO_ABORT_SCALE, LLL_DEF_DELTA,
    LLL_DEF_ETA,
};
use crate::enumeration::{enumerate, Evaluator};
use crate::float::FloatLike;
use crate::gso::MatGso;
use crate::lattice_io;
use crate::lll::LllReducer;

/// Behavior switches. The `Option`-valued budget knobs live directly on
/// [`BkzParams`]; a switch marked reserved is carried for configuration
/// compatibility and currently ignored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BkzFlags {
    /// Report parameters, per-tour summaries and the final status through
    /// the observer
    pub verbose: bool,
    /// Reserved
    pub no_lll: bool,
    /// Start the per-block LLL at the block instead of row 0
    pub bounded_lll: bool,
    /// Stop when the profile slope stops improving
    pub auto_abort: bool,
    /// Reserved
    pub gh_bound: bool,
    /// Reserved
    pub sd_variant: bool,
    /// Reserved
    pub sld_reduction: bool,
}

/// Parameters of one reduction level.
///
/// `preprocessing` chains a nested parameter set with a strictly smaller
/// block size; blocks are then BKZ-preprocessed at that size before
/// enumeration. The chain may recurse.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BkzParams {
    pub block_size: usize,
    /// Lovász and insertion quality factor
    pub delta: f64,
    pub flags: BkzFlags,
    /// Tour cap; `Some(0)` stops before the first tour
    pub max_loops: Option<u64>,
    /// Wall-clock cap in seconds, checked at tour boundaries
    pub max_time: Option<f64>,
    pub auto_abort_scale: f64,
    pub auto_abort_max_no_dec: i64,
    /// Per-level radius factors handed through to the enumeration engine
    pub pruning: Vec<f64>,
    pub preprocessing: Option<Box<BkzParams>>,
    /// Write the log Gram-Schmidt profile to this file before, during and
    /// after the reduction
    pub dump_gso_filename: Option<PathBuf>,
}

impl BkzParams {
    pub fn new(block_size: usize) -> Self {
        Self {
            block_size,
            delta: LLL_DEF_DELTA,
            flags: BkzFlags::default(),
            max_loops: None,
            max_time: None,
            auto_abort_scale: BKZ_DEF_AUTO_ABORT_SCALE,
            auto_abort_max_no_dec: BKZ_DEF_AUTO_ABORT_MAX_NO_DEC,
            pruning: Vec::new(),
            preprocessing: None,
            dump_gso_filename: None,
        }
    }

    pub fn with_max_loops(mut self, max_loops: u64) -> Self {
        self.max_loops = Some(max_loops);
        self
    }

    pub fn with_max_time(mut self, seconds: f64) -> Self {
        self.max_time = Some(seconds);
        self
    }

    pub fn with_auto_abort(mut self) -> Self {
        self.flags.auto_abort = true;
        self
    }

    pub fn with_preprocessing(mut self, nested: BkzParams) -> Self {
        self.preprocessing = Some(Box::new(nested));
        self
    }

    pub fn with_dump_gso(mut self, path: impl Into<PathBuf>) -> Self {
        self.dump_gso_filename = Some(path.into());
        self
    }

    /// One-line parameter echo, nested levels in brackets.
    pub fn summary(&self) -> String {
        let mut s = format!("blocksize = {}, delta = {:.2}", self.block_size, self.delta);
        if let Some(n) = self.max_loops {
            s.push_str(&format!(", maxLoops = {}", n));
        }
        if let Some(t) = self.max_time {
            s.push_str(&format!(", maxTime = {:.1}", t));
        }
        if self.flags.auto_abort {
            s.push_str(&format!(
                ", autoAbort scale = {:.6}, autoAbort maxWait = {}",
                self.auto_abort_scale, self.auto_abort_max_no_dec
            ));
        }
        if let Some(p) = &self.preprocessing {
            s.push_str(&format!(", preprocessing = [{}]", p.summary()));
        }
        s
    }
}

impl Default for BkzParams {
    fn default() -> Self {
        Self::new(20)
    }
}

/// Summary handed to the observer after every tour.
#[derive(Debug, Clone)]
pub struct TourReport {
    pub loop_idx: u64,
    pub min_row: usize,
    /// Seconds since the reduction started
    pub elapsed: f64,
    /// Squared Gram-Schmidt norm of the leading row, in natural units
    pub r0: f64,
    pub slope: f64,
}

/// Injected sink for progress and diagnostics, so callers and tests can
/// observe a run without scraping text output.
pub trait BkzObserver {
    fn on_params(&mut self, _params: &BkzParams) {}
    fn on_block_first_reduced(&mut self, _kappa: usize, _block_size: usize) {}
    fn on_tour_end(&mut self, _report: &TourReport) {}
    fn on_dump(&mut self, _path: &Path, _prefix: &str) {}
    fn on_finish(&mut self, _status: RedStatus) {}
}

/// Observer that drops every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullObserver;

impl BkzObserver for NullObserver {}

/// Observer that renders the classic diagnostic lines through the `log`
/// crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogObserver;

impl BkzObserver for LogObserver {
    fn on_params(&mut self, params: &BkzParams) {
        log::info!("entering BKZ: {}", params.summary());
    }

    fn on_block_first_reduced(&mut self, kappa: usize, block_size: usize) {
        log::info!(
            "block [1-{:4}] BKZ-{} reduced for the first time",
            kappa + 1,
            block_size
        );
    }

    fn on_tour_end(&mut self, report: &TourReport) {
        log::info!(
            "end of BKZ loop {:4}, time = {:9.3}s, r_{} = {:.6e}, slope = {:9.6}",
            report.loop_idx,
            report.elapsed,
            report.min_row,
            report.r0,
            report.slope
        );
    }

    fn on_dump(&mut self, path: &Path, prefix: &str) {
        log::debug!("GSO profile '{}' appended to {}", prefix, path.display());
    }

    fn on_finish(&mut self, status: RedStatus) {
        if status.accepts_basis() {
            log::info!("end of BKZ: {}", status);
        } else {
            log::warn!("end of BKZ: failure: {}", status);
        }
    }
}

/// Least-squares slope of `ln r_ii` against `i` over `[start_row, stop_row)`.
///
/// Negative for well-reduced bases; ranges with fewer than two rows have no
/// defined trend and yield 0.
pub fn current_slope<F: FloatLike>(m: &mut MatGso<F>, start_row: usize, stop_row: usize) -> f64 {
    let n = stop_row.saturating_sub(start_row);
    if n < 2 {
        return 0.0;
    }
    let mut x = Vec::with_capacity(n);
    for i in start_row..stop_row {
        if !m.update_gso_row(i) {
            return 0.0;
        }
        let (f, expo) = m.get_r_exp(i, i);
        x.push(f.ln().to_f64() + expo as f64 * std::f64::consts::LN_2);
    }
    let i_mean = (n - 1) as f64 * 0.5;
    let x_mean = x.iter().sum::<f64>() / n as f64;
    let mut v1 = 0.0;
    let mut v2 = 0.0;
    for (i, xi) in x.iter().enumerate() {
        let di = i as f64 - i_mean;
        v1 += di * (xi - x_mean);
        v2 += di * di;
    }
    v1 / v2
}

/// Detects convergence of a tour sequence from the profile slope.
///
/// The first call always resets the stall counter, so a single tour can
/// never trigger an abort on its own. With `scale = 1` any non-improvement
/// counts as a stall; smaller scales demand strict improvement by that
/// factor.
#[derive(Debug, Clone)]
pub struct AutoAbort {
    start_row: usize,
    stop_row: usize,
    old_slope: f64,
    no_dec: i64,
}

impl AutoAbort {
    pub fn new(start_row: usize, stop_row: usize) -> Self {
        Self {
            start_row,
            stop_row,
            old_slope: f64::INFINITY,
            no_dec: -1,
        }
    }

    pub fn test_abort<F: FloatLike>(
        &mut self,
        m: &mut MatGso<F>,
        scale: f64,
        max_no_dec: i64,
    ) -> bool {
        let new_slope = -current_slope(m, self.start_row, self.stop_row);
        if self.no_dec == -1 || new_slope < scale * self.old_slope {
            self.no_dec = 0;
        } else {
            self.no_dec += 1;
        }
        self.old_slope = self.old_slope.min(new_slope);
        self.no_dec >= max_no_dec
    }
}

/// The reduction driver. Borrows the GSO context and the LLL reducer for
/// one [`reduce`](Self::reduce) call; it never owns the basis.
pub struct BkzReduction<'a, F: FloatLike, O: BkzObserver = LogObserver> {
    m: &'a mut MatGso<F>,
    lll: &'a mut LllReducer<F>,
    params: &'a BkzParams,
    observer: O,
    status: RedStatus,
    num_rows: usize,
    delta: F,
    clock: Instant,
}

impl<'a, F: FloatLike> BkzReduction<'a, F, LogObserver> {
    pub fn new(m: &'a mut MatGso<F>, lll: &'a mut LllReducer<F>, params: &'a BkzParams) -> Self {
        Self::with_observer(m, lll, params, LogObserver)
    }
}

impl<'a, F: FloatLike, O: BkzObserver> BkzReduction<'a, F, O> {
    pub fn with_observer(
        m: &'a mut MatGso<F>,
        lll: &'a mut LllReducer<F>,
        params: &'a BkzParams,
        observer: O,
    ) -> Self {
        let num_rows = trailing_nonzero_rows(m);
        let delta = F::from_f64(params.delta);
        Self {
            m,
            lll,
            params,
            observer,
            status: RedStatus::Success,
            num_rows,
            delta,
            clock: Instant::now(),
        }
    }

    pub fn status(&self) -> RedStatus {
        self.status
    }

    pub fn observer(&self) -> &O {
        &self.observer
    }

    pub fn observer_mut(&mut self) -> &mut O {
        &mut self.observer
    }

    /// Run the reduction to completion.
    ///
    /// Returns true when the basis is usable afterwards: full success, or a
    /// loop/time budget ran out with partial progress. Subsystem failures
    /// return false with the adopted code in [`status`](Self::status).
    pub fn reduce(&mut self) -> bool {
        let params = self.params;
        self.num_rows = trailing_nonzero_rows(self.m);

        if let Some(path) = &params.dump_gso_filename {
            self.dump_gso(path, "Input", false);
        }

        if params.block_size < 2 || self.num_rows == 0 {
            return self.set_status(RedStatus::Success);
        }

        let mut final_status = RedStatus::Success;
        let mut kappa_max: usize = 0;
        let mut auto_abort = AutoAbort::new(0, self.num_rows);

        if params.flags.verbose {
            self.observer.on_params(params);
        }
        self.clock = Instant::now();
        self.m.discover_all_rows();

        let mut i_loop: u64 = 0;
        loop {
            if let Some(max_loops) = params.max_loops {
                if i_loop >= max_loops {
                    final_status = RedStatus::BkzLoopsLimit;
                    break;
                }
            }
            if let Some(max_time) = params.max_time {
                if self.elapsed_seconds() >= max_time {
                    final_status = RedStatus::BkzTimeLimit;
                    break;
                }
            }
            if params.flags.auto_abort
                && auto_abort.test_abort(
                    self.m,
                    params.auto_abort_scale,
                    params.auto_abort_max_no_dec,
                )
            {
                break;
            }

            let mut clean = true;
            if !self.tour(i_loop, &mut kappa_max, params, 0, self.num_rows, &mut clean) {
                return false;
            }
            if clean || params.block_size >= self.num_rows {
                break;
            }
            i_loop += 1;
        }

        if let Some(path) = &params.dump_gso_filename {
            let prefix = format!("Output ({:9.3}s)", self.elapsed_seconds());
            self.dump_gso(path, &prefix, true);
        }
        self.set_status(final_status)
    }

    /// One sweep of block reductions over `[min_row, max_row)`; the last
    /// block starts at `max_row - 2`.
    fn tour(
        &mut self,
        loop_idx: u64,
        kappa_max: &mut usize,
        params: &BkzParams,
        min_row: usize,
        max_row: usize,
        clean: &mut bool,
    ) -> bool {
        for kappa in min_row..max_row.saturating_sub(1) {
            let block_size = params.block_size.min(max_row - kappa);
            if !self.reduce_block(kappa, block_size, params, clean) {
                return false;
            }
            if params.flags.verbose && *kappa_max < kappa && *clean {
                self.observer.on_block_first_reduced(kappa, params.block_size);
                *kappa_max = kappa;
            }
        }

        if params.flags.verbose {
            if !self.m.update_gso_row(min_row) {
                return self.set_status(RedStatus::GsoFailure);
            }
            let (r0, expo) = self.m.get_r_exp(min_row, min_row);
            let report = TourReport {
                loop_idx,
                min_row,
                elapsed: self.elapsed_seconds(),
                r0: r0.mul_2si(expo).to_f64(),
                slope: current_slope(self.m, min_row, max_row),
            };
            self.observer.on_tour_end(&report);
        }
        if let Some(path) = &params.dump_gso_filename {
            let prefix = format!(
                "End of BKZ loop {:4} ({:9.3}s)",
                loop_idx,
                self.elapsed_seconds()
            );
            self.dump_gso(path, &prefix, true);
        }
        true
    }

    /// SVP-reduce the block `[kappa, kappa + block_size)`.
    fn reduce_block(
        &mut self,
        kappa: usize,
        block_size: usize,
        params: &BkzParams,
        clean: &mut bool,
    ) -> bool {
        let lll_start = if params.flags.bounded_lll { kappa } else { 0 };

        if !self.lll.lll(self.m, lll_start, kappa, kappa + block_size) {
            return self.set_status(self.lll.status);
        }
        if self.lll.n_swaps > 0 {
            *clean = false;
        }

        if let Some(preproc) = params.preprocessing.as_deref() {
            if preproc.block_size > 2 && preproc.block_size < block_size {
                let preproc_clock = Instant::now();
                let mut dummy_kappa_max = self.num_rows;
                let mut auto_abort = AutoAbort::new(kappa, kappa + block_size);
                let mut i: u64 = 0;
                loop {
                    if let Some(max_loops) = preproc.max_loops {
                        if i >= max_loops {
                            break;
                        }
                    }
                    if let Some(max_time) = preproc.max_time {
                        if preproc_clock.elapsed().as_millis() as f64 * 0.001 >= max_time {
                            break;
                        }
                    }
                    if auto_abort.test_abort(
                        self.m,
                        preproc.auto_abort_scale,
                        preproc.auto_abort_max_no_dec,
                    ) {
                        break;
                    }

                    let mut inner_clean = true;
                    if !self.tour(
                        i,
                        &mut dummy_kappa_max,
                        preproc,
                        kappa,
                        kappa + block_size,
                        &mut inner_clean,
                    ) {
                        return false;
                    }
                    if inner_clean {
                        break;
                    }
                    *clean = false;
                    i += 1;
                }
            }
        }

        if !self.m.update_gso_row(kappa) {
            return self.set_status(RedStatus::GsoFailure);
        }
        let (mut max_dist, max_dist_expo) = self.m.get_r_exp(kappa, kappa);
        let delta_max_dist = self.delta * max_dist;

        let mut evaluator = Evaluator::new();
        if !enumerate(
            self.m,
            &mut max_dist,
            max_dist_expo,
            &mut evaluator,
            kappa,
            kappa + block_size,
            &params.pruning,
        ) {
            return self.set_status(RedStatus::GsoFailure);
        }
        if evaluator.sol_coord.is_empty() {
            return self.set_status(RedStatus::EnumFailure);
        }

        let sol = &evaluator.sol_coord;
        let mut nz = 0usize;
        let mut i_vector: Option<usize> = None;
        for (i, &c) in sol.iter().enumerate() {
            if c != 0 {
                nz += 1;
                if i_vector.is_none() && (c == 1 || c == -1) {
                    i_vector = Some(i);
                }
            }
        }
        debug_assert!(nz > 0);

        if max_dist >= delta_max_dist {
            // The leading vector is already within a delta factor of the
            // block optimum
            return true;
        }

        match i_vector {
            Some(i_vec) if nz == 1 && i_vec != 0 => {
                // The winner is another basis row; pull it to the front of
                // the block
                self.m.move_row(kappa + i_vec, kappa);
                if !self.lll.size_reduction(self.m, kappa, kappa + 1) {
                    return self.set_status(self.lll.status);
                }
            }
            _ => {
                // Append the integer combination, let LLL collapse the rank
                // deficit into a zero row at the block end, then drop it
                let d = self.m.d();
                self.m.create_row();
                self.m.row_op_begin(d, d + 1);
                for (i, &c) in sol.iter().enumerate() {
                    if c != 0 {
                        self.m.row_addmul(d, kappa + i, &BigInt::from(c));
                    }
                }
                self.m.row_op_end(d, d + 1);
                self.m.move_row(d, kappa);
                if !self.lll.lll(self.m, kappa, kappa, kappa + block_size + 1) {
                    return self.set_status(self.lll.status);
                }
                assert!(
                    self.m.is_row_zero(kappa + block_size),
                    "inserted block combination left no dependency row"
                );
                self.m.move_row(kappa + block_size, d);
                self.m.remove_last_row();
            }
        }
        *clean = false;
        true
    }

    fn dump_gso(&mut self, path: &Path, prefix: &str, append: bool) {
        let mut xs = Vec::with_capacity(self.num_rows);
        for i in 0..self.num_rows {
            if !self.m.update_gso_row(i) {
                break;
            }
            let (f, expo) = self.m.get_r_exp(i, i);
            xs.push(f.ln().to_f64() + expo as f64 * std::f64::consts::LN_2);
        }
        if let Err(e) = lattice_io::write_profile_line(path, prefix, &xs, append) {
            log::warn!("cannot write GSO profile to {}: {}", path.display(), e);
        }
        self.observer.on_dump(path, prefix);
    }

    fn elapsed_seconds(&self) -> f64 {
        self.clock.elapsed().as_millis() as f64 * 0.001
    }

    fn set_status(&mut self, status: RedStatus) -> bool {
        self.status = status;
        if self.params.flags.verbose {
            self.observer.on_finish(status);
        }
        status.accepts_basis()
    }
}

fn trailing_nonzero_rows<F: FloatLike>(m: &MatGso<F>) -> usize {
    let mut n = m.d();
    while n > 0 && m.is_row_zero(n - 1) {
        n -= 1;
    }
    n
}

/// Reduce an owned basis with the default `f64` instantiation and a fresh
/// LLL reducer, returning the basis together with the final status.
pub fn bkz_reduction(basis: LatticeBasis, params: &BkzParams) -> (LatticeBasis, RedStatus) {
    let mut m: MatGso<f64> = MatGso::from_basis(basis);
    let mut lll = LllReducer::new(params.delta, LLL_DEF_ETA);
    let status = {
        let mut reduction = BkzReduction::new(&mut m, &mut lll, params);
        reduction.reduce();
        reduction.status()
    };
    (m.into_basis(), status)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gso_from_i64(rows: &[Vec<i64>]) -> MatGso<f64> {
        MatGso::from_basis(LatticeBasis::from_i64(rows))
    }

    #[test]
    fn test_slope_of_geometric_profile() {
        // r_ii = 64, 16, 4, 1 so ln r drops by ln 4 per row
        let mut m = gso_from_i64(&[
            vec![8, 0, 0, 0],
            vec![0, 4, 0, 0],
            vec![0, 0, 2, 0],
            vec![0, 0, 0, 1],
        ]);
        let slope = current_slope(&mut m, 0, 4);
        assert!((slope + 4.0f64.ln()).abs() < 1e-9);
    }

    #[test]
    fn test_slope_degenerate_range() {
        let mut m = gso_from_i64(&[vec![3, 0], vec![0, 3]]);
        assert_eq!(current_slope(&mut m, 0, 1), 0.0);
        assert_eq!(current_slope(&mut m, 1, 1), 0.0);
    }

    #[test]
    fn test_auto_abort_sentinel_resets_first_call() {
        let mut m = gso_from_i64(&[vec![1, 0, 0], vec![0, 1, 0], vec![0, 0, 1]]);
        let mut aa = AutoAbort::new(0, 3);
        assert!(!aa.test_abort(&mut m, 1.0, 5));
    }

    #[test]
    fn test_auto_abort_counts_stalls() {
        // A static basis never improves its slope
        let mut m = gso_from_i64(&[vec![4, 0, 0], vec![0, 2, 0], vec![0, 0, 1]]);
        let mut aa = AutoAbort::new(0, 3);
        let max_no_dec = 3;
        assert!(!aa.test_abort(&mut m, 1.0, max_no_dec)); // sentinel reset
        assert!(!aa.test_abort(&mut m, 1.0, max_no_dec)); // no_dec = 1
        assert!(!aa.test_abort(&mut m, 1.0, max_no_dec)); // no_dec = 2
        assert!(aa.test_abort(&mut m, 1.0, max_no_dec)); // no_dec = 3
    }

    #[test]
    fn test_auto_abort_improvement_resets_counter() {
        let mut m = gso_from_i64(&[vec![4, 0, 0], vec![0, 2, 0], vec![0, 0, 1]]);
        let mut aa = AutoAbort::new(0, 3);
        assert!(!aa.test_abort(&mut m, 1.0, 2));
        assert!(!aa.test_abort(&mut m, 1.0, 2)); // no_dec = 1

        // A flatter profile has a better (smaller) negated slope
        let mut flatter = gso_from_i64(&[vec![2, 0, 0], vec![0, 2, 0], vec![0, 0, 1]]);
        assert!(!aa.test_abort(&mut flatter, 1.0, 2)); // reset to 0
        assert!(!aa.test_abort(&mut m, 1.0, 2)); // no_dec = 1 again
    }

    #[test]
    fn test_params_defaults_and_summary() {
        let params = BkzParams::new(12)
            .with_max_loops(7)
            .with_auto_abort()
            .with_preprocessing(BkzParams::new(4));
        assert_eq!(params.block_size, 12);
        assert_eq!(params.delta, LLL_DEF_DELTA);
        assert_eq!(params.max_loops, Some(7));
        let s = params.summary();
        assert!(s.contains("blocksize = 12"));
        assert!(s.contains("maxLoops = 7"));
        assert!(s.contains("preprocessing = [blocksize = 4"));
    }

    #[test]
    fn test_trivial_block_size_returns_success() {
        let basis = LatticeBasis::from_i64(&[vec![2, 1], vec![1, 2]]);
        let (out, status) = bkz_reduction(basis.clone(), &BkzParams::new(1));
        assert_eq!(status, RedStatus::Success);
        assert_eq!(out, basis);
    }

    #[test]
    fn test_empty_basis_returns_success() {
        let basis = LatticeBasis::from_rows(Vec::new());
        let (out, status) = bkz_reduction(basis, &BkzParams::new(4));
        assert_eq!(status, RedStatus::Success);
        assert_eq!(out.num_rows(), 0);
    }
}
