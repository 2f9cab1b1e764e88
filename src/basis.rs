//! Integer lattice basis storage.
//!
//! A basis is an ordered list of row vectors with arbitrary-precision
//! integer entries. All mutating operations are exact integer row
//! operations, so the spanned lattice only changes in the ways the caller
//! asks for (unimodular transforms, plus explicit append/remove of zero
//! workspace rows).

use num_bigint::BigInt;
use num_traits::{Signed, ToPrimitive, Zero};

/// Ordered rows of `BigInt` entries, all of the same length.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LatticeBasis {
    rows: Vec<Vec<BigInt>>,
    num_cols: usize,
}

impl LatticeBasis {
    /// Build a basis from ready-made rows.
    ///
    /// # Panics
    ///
    /// Panics if rows have inconsistent lengths.
    pub fn from_rows(rows: Vec<Vec<BigInt>>) -> Self {
        let num_cols = rows.first().map_or(0, |r| r.len());
        for (i, row) in rows.iter().enumerate() {
            assert_eq!(row.len(), num_cols, "row {} has wrong length", i);
        }
        Self { rows, num_cols }
    }

    /// Convenience constructor from machine integers, used heavily in tests.
    pub fn from_i64(rows: &[Vec<i64>]) -> Self {
        Self::from_rows(
            rows.iter()
                .map(|r| r.iter().map(|&x| BigInt::from(x)).collect())
                .collect(),
        )
    }

    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn num_cols(&self) -> usize {
        self.num_cols
    }

    pub fn row(&self, i: usize) -> &[BigInt] {
        &self.rows[i]
    }

    pub fn rows(&self) -> &[Vec<BigInt>] {
        &self.rows
    }

    pub fn is_row_zero(&self, i: usize) -> bool {
        self.rows[i].iter().all(|x| x.is_zero())
    }

    /// Exact inner product of rows `i` and `j`.
    pub fn inner_product(&self, i: usize, j: usize) -> BigInt {
        inner_product(&self.rows[i], &self.rows[j])
    }

    /// Exact squared Euclidean norm of row `i`.
    pub fn row_norm_sq(&self, i: usize) -> BigInt {
        self.inner_product(i, i)
    }

    /// Bit length of the largest entry magnitude in row `i` (0 for a zero row).
    pub fn max_row_bits(&self, i: usize) -> u64 {
        self.rows[i].iter().map(|x| x.bits()).max().unwrap_or(0)
    }

    /// Squared norm of row `i` as `f64`, for reporting only.
    pub fn row_norm_sq_f64(&self, i: usize) -> f64 {
        self.row_norm_sq(i).to_f64().unwrap_or(f64::INFINITY)
    }

    pub fn swap_rows(&mut self, i: usize, j: usize) {
        self.rows.swap(i, j);
    }

    /// Cyclically shift the row at `src` to position `dst`; rows in between
    /// move by one towards the vacated slot. Works in either direction.
    pub fn move_row(&mut self, src: usize, dst: usize) {
        if src < dst {
            self.rows[src..=dst].rotate_left(1);
        } else if src > dst {
            self.rows[dst..=src].rotate_right(1);
        }
    }

    /// Integer row operation `row[dst] += coeff * row[src]`.
    ///
    /// # Panics
    ///
    /// Panics if `dst == src`.
    pub fn row_addmul(&mut self, dst: usize, src: usize, coeff: &BigInt) {
        assert_ne!(dst, src, "row_addmul requires distinct rows");
        if coeff.is_zero() {
            return;
        }
        let (dst_row, src_row) = if dst < src {
            let (lo, hi) = self.rows.split_at_mut(src);
            (&mut lo[dst], &hi[0])
        } else {
            let (lo, hi) = self.rows.split_at_mut(dst);
            (&mut hi[0], &lo[src])
        };
        for (d, s) in dst_row.iter_mut().zip(src_row.iter()) {
            *d += coeff * s;
        }
    }

    /// Append a zero workspace row.
    pub fn create_row(&mut self) {
        self.rows.push(vec![BigInt::zero(); self.num_cols]);
    }

    /// Drop the last row.
    ///
    /// # Panics
    ///
    /// Panics if the basis is empty or the last row is not zero.
    pub fn remove_last_row(&mut self) {
        let last = self.rows.len() - 1;
        assert!(self.is_row_zero(last), "last row must be zero before removal");
        self.rows.pop();
    }
}

/// Exact inner product of two integer vectors.
pub fn inner_product(a: &[BigInt], b: &[BigInt]) -> BigInt {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// Squared Euclidean norm of an integer vector.
pub fn norm_sq(v: &[BigInt]) -> BigInt {
    inner_product(v, v)
}

/// Largest entry magnitude of a vector, in bits.
pub fn max_bits(v: &[BigInt]) -> u64 {
    v.iter().map(|x| x.abs().bits()).max().unwrap_or(0)
}
