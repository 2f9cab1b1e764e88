//! Gram-Schmidt orthogonalization maintainer.
//!
//! [`MatGso`] owns the integer basis and keeps the R-factor of its QR
//! decomposition up to date under row mutations. The factor is computed
//! from exact `BigInt` Gram entries with the recurrence
//!
//! ```text
//! r_ij = g_ij - Σ_{l<j} μ_jl r_il        (j <= i)
//! μ_ij = r_ij / r_jj                     (j < i)
//! ```
//!
//! so `r_ii` is the squared norm of the i-th Gram-Schmidt vector.
//!
//! # Scaled representation
//!
//! Entries of the basis may be far larger than the exponent range of the
//! mantissa type. Every row carries an exponent `row_expo[i]` and the stored
//! values satisfy
//!
//! ```text
//! r_ij  =  r̂_ij · 2^(row_expo[i] + row_expo[j])
//! μ_ij  =  μ̂_ij · 2^(row_expo[i] - row_expo[j])
//! ```
//!
//! [`MatGso::get_r_exp`] hands out `(mantissa, expo)` pairs in this form.
//!
//! # Laziness
//!
//! Rows are updated on demand: a validity watermark tracks the largest
//! prefix of rows whose `μ/r` data matches the basis, and every row
//! mutation lowers the watermark to the first affected row.

use num_bigint::BigInt;
use num_traits::Zero;

use crate::basis::LatticeBasis;
use crate::float::FloatLike;

/// Bits of headroom kept between a row's entries and the mantissa type's
/// exponent range when choosing `row_expo`.
const MANTISSA_HEADROOM: i64 = 450;

/// Counters for row surgery, collected across the lifetime of the object.
#[derive(Debug, Clone, Default)]
pub struct GsoStats {
    /// Workspace rows appended
    pub rows_created: usize,
    /// Workspace rows removed
    pub rows_removed: usize,
    /// Cyclic row moves
    pub rows_moved: usize,
    /// Adjacent row swaps
    pub rows_swapped: usize,
    /// Integer row operations applied inside brackets
    pub row_ops: usize,
    /// Gram-Schmidt row recomputations
    pub row_updates: usize,
}

/// Basis plus lazily maintained Gram-Schmidt data.
#[derive(Debug)]
pub struct MatGso<F: FloatLike> {
    b: LatticeBasis,
    /// Rows `[0, n_valid)` have current `mu`/`r` data
    n_valid: usize,
    row_expo: Vec<i64>,
    /// `mu[i]` has length `i`
    mu: Vec<Vec<F>>,
    /// `r[i]` has length `i + 1`
    r: Vec<Vec<F>>,
    /// Active `row_op_begin` bracket, if any
    row_op: Option<(usize, usize)>,
    stats: GsoStats,
}

impl<F: FloatLike> MatGso<F> {
    pub fn from_basis(b: LatticeBasis) -> Self {
        Self {
            b,
            n_valid: 0,
            row_expo: Vec::new(),
            mu: Vec::new(),
            r: Vec::new(),
            row_op: None,
            stats: GsoStats::default(),
        }
    }

    /// Current number of rows, including zero workspace rows.
    pub fn d(&self) -> usize {
        self.b.num_rows()
    }

    pub fn basis(&self) -> &LatticeBasis {
        &self.b
    }

    /// Give the basis back to the caller.
    pub fn into_basis(self) -> LatticeBasis {
        self.b
    }

    pub fn stats(&self) -> &GsoStats {
        &self.stats
    }

    pub fn is_row_zero(&self, i: usize) -> bool {
        self.b.is_row_zero(i)
    }

    /// Extend the internal arrays to cover every current row.
    pub fn discover_all_rows(&mut self) {
        let d = self.d();
        if d > 0 {
            self.ensure_arrays(d - 1);
        }
    }

    /// Bring row `i` (and every row before it) up to date. Idempotent.
    ///
    /// Returns false if a non-finite value appeared in the factor.
    pub fn update_gso_row(&mut self, i: usize) -> bool {
        assert!(self.row_op.is_none(), "GSO update inside a row operation bracket");
        assert!(i < self.d(), "row index out of range");
        while self.n_valid <= i {
            let k = self.n_valid;
            if !self.compute_row(k) {
                return false;
            }
            self.n_valid += 1;
            self.stats.row_updates += 1;
        }
        true
    }

    /// Mantissa of `r_ij`, with the binary exponent written to the second
    /// slot of the pair. Row `i` must be up to date.
    pub fn get_r_exp(&self, i: usize, j: usize) -> (F, i64) {
        assert!(j <= i && i < self.n_valid, "GSO row {} not updated", i);
        (self.r[i][j], self.row_expo[i] + self.row_expo[j])
    }

    /// Mantissa of `μ_ij` with its binary exponent, for `j < i`.
    pub fn get_mu_exp(&self, i: usize, j: usize) -> (F, i64) {
        assert!(j < i && i < self.n_valid, "GSO row {} not updated", i);
        (self.mu[i][j], self.row_expo[i] - self.row_expo[j])
    }

    /// Append a zero row at index `d`.
    pub fn create_row(&mut self) {
        self.b.create_row();
        self.discover_all_rows();
        self.stats.rows_created += 1;
    }

    /// Drop the trailing row, which must be zero.
    pub fn remove_last_row(&mut self) {
        self.b.remove_last_row();
        let d = self.d();
        self.row_expo.truncate(d);
        self.mu.truncate(d);
        self.r.truncate(d);
        self.n_valid = self.n_valid.min(d);
        self.stats.rows_removed += 1;
    }

    /// Cyclically shift the row at `src` to index `dst` (either direction).
    pub fn move_row(&mut self, src: usize, dst: usize) {
        assert!(src < self.d() && dst < self.d());
        self.b.move_row(src, dst);
        self.n_valid = self.n_valid.min(src.min(dst));
        self.stats.rows_moved += 1;
    }

    /// Swap two adjacent rows.
    pub fn swap_rows(&mut self, i: usize, j: usize) {
        assert!(i < self.d() && j < self.d());
        self.b.swap_rows(i, j);
        self.n_valid = self.n_valid.min(i.min(j));
        self.stats.rows_swapped += 1;
    }

    /// Open a bracket for hand-made integer row operations on `[lo, hi)`.
    pub fn row_op_begin(&mut self, lo: usize, hi: usize) {
        assert!(self.row_op.is_none(), "nested row operation bracket");
        assert!(lo < hi && hi <= self.d());
        self.row_op = Some((lo, hi));
    }

    /// Close the bracket opened with the same range; invalidates the rows.
    pub fn row_op_end(&mut self, lo: usize, hi: usize) {
        assert_eq!(self.row_op, Some((lo, hi)), "mismatched row operation bracket");
        self.row_op = None;
        self.n_valid = self.n_valid.min(lo);
    }

    /// Integer row operation `b[dst] += coeff * b[src]`. The destination row
    /// must be covered by the active bracket.
    pub fn row_addmul(&mut self, dst: usize, src: usize, coeff: &BigInt) {
        match self.row_op {
            Some((lo, hi)) => assert!(lo <= dst && dst < hi, "row {} outside bracket", dst),
            None => panic!("row_addmul outside a row operation bracket"),
        }
        self.b.row_addmul(dst, src, coeff);
        self.stats.row_ops += 1;
    }

    fn ensure_arrays(&mut self, up_to: usize) {
        while self.row_expo.len() <= up_to {
            let k = self.row_expo.len();
            self.row_expo.push(0);
            self.mu.push(vec![F::zero(); k]);
            self.r.push(vec![F::zero(); k + 1]);
        }
    }

    fn compute_row(&mut self, k: usize) -> bool {
        self.ensure_arrays(k);
        self.row_expo[k] = (self.b.max_row_bits(k) as i64 - MANTISSA_HEADROOM).max(0);

        for j in 0..=k {
            let g = self.b.inner_product(k, j);
            let shift = self.row_expo[k] + self.row_expo[j];
            let mut rkj: F = scaled_from_bigint(&g, shift);
            for l in 0..j {
                rkj = rkj - self.mu[j][l] * self.r[k][l];
            }
            if !rkj.is_finite() {
                log::warn!("non-finite Gram-Schmidt value at ({}, {})", k, j);
                return false;
            }
            if j < k {
                self.r[k][j] = rkj;
                let rjj = self.r[j][j];
                self.mu[k][j] = if rjj.is_zero() { F::zero() } else { rkj / rjj };
            } else {
                // A dependent row has an exact zero squared norm; clamp the
                // rounding residue
                self.r[k][k] = if rkj < F::zero() { F::zero() } else { rkj };
            }
        }
        true
    }
}

/// Convert `x / 2^shift` to the mantissa type, keeping 64 guard bits below
/// the shift point.
fn scaled_from_bigint<F: FloatLike>(x: &BigInt, shift: i64) -> F {
    debug_assert!(shift >= 0);
    if x.is_zero() {
        return F::zero();
    }
    let guard = shift.min(64);
    let pre = (shift - guard) as usize;
    let shifted: BigInt = x >> pre;
    let approx = num_traits::ToPrimitive::to_f64(&shifted).unwrap_or(f64::INFINITY);
    F::from_f64(approx).mul_2si(-guard)
}
