//! Schnorr-Euchner enumeration for the shortest vector of a block.
//!
//! Given Gram-Schmidt data for rows `[kappa, kappa_end)`, the search walks a
//! depth-first tree over integer coefficient vectors, visiting candidates in
//! order of increasing distance from the projected center at every level.
//! The radius bound is lowered to each improvement, so the best solution
//! found so far prunes the rest of the tree.
//!
//! The bound is inclusive: a vector whose squared norm equals the initial
//! radius is reported. Callers that only care about strict improvements
//! compare the returned distance against their own threshold.

use crate::float::FloatLike;
use crate::gso::MatGso;

/// Collects the best solution of an enumeration run.
///
/// `sol_coord` holds the coefficients of the shortest vector found, in the
/// block basis; it stays empty when no vector satisfied the bound.
#[derive(Debug, Clone, Default)]
pub struct Evaluator {
    pub sol_coord: Vec<i64>,
}

impl Evaluator {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Search the block `[kappa, kappa_end)` for a vector of squared norm at
/// most `max_dist * 2^max_dist_expo`.
///
/// On return, `max_dist` holds the squared norm of the best vector found
/// (still at scale `2^max_dist_expo`) and `evaluator.sol_coord` its
/// coefficients. `pruning` gives per-level radius factors indexed from the
/// outermost level; missing entries count as 1.
///
/// Returns false only if the Gram-Schmidt data could not be brought up to
/// date.
pub fn enumerate<F: FloatLike>(
    m: &mut MatGso<F>,
    max_dist: &mut F,
    max_dist_expo: i64,
    evaluator: &mut Evaluator,
    kappa: usize,
    kappa_end: usize,
    pruning: &[f64],
) -> bool {
    evaluator.sol_coord.clear();
    let n = kappa_end - kappa;
    if n == 0 {
        return true;
    }
    for i in kappa..kappa_end {
        if !m.update_gso_row(i) {
            return false;
        }
    }

    // Block-local data, rebased to the common scale 2^max_dist_expo
    let mut rdiag = Vec::with_capacity(n);
    for l in 0..n {
        let (r, expo) = m.get_r_exp(kappa + l, kappa + l);
        rdiag.push(r.mul_2si(expo - max_dist_expo));
    }
    if rdiag.iter().any(|r| !(*r > F::zero())) {
        log::warn!("degenerate block at {}, enumeration skipped", kappa);
        return true;
    }
    let mut mu = vec![vec![F::zero(); n]; n];
    for l in 1..n {
        for t in 0..l {
            let (mh, me) = m.get_mu_exp(kappa + l, kappa + t);
            mu[l][t] = mh.mul_2si(me);
        }
    }

    let mut coeffs = vec![0i64; n];
    search_level(
        n - 1,
        F::zero(),
        &mut coeffs,
        &rdiag,
        &mu,
        pruning,
        max_dist,
        &mut evaluator.sol_coord,
    );
    true
}

/// Radius factor applied to partial distances that involve the levels from
/// `l` upwards (`depth` levels consumed so far).
fn prune_factor<F: FloatLike>(pruning: &[f64], n: usize, l: usize) -> F {
    let depth = n - 1 - l;
    F::from_f64(pruning.get(depth).copied().unwrap_or(1.0))
}

#[allow(clippy::too_many_arguments)]
fn search_level<F: FloatLike>(
    l: usize,
    partial: F,
    coeffs: &mut Vec<i64>,
    rdiag: &[F],
    mu: &[Vec<F>],
    pruning: &[f64],
    max_dist: &mut F,
    sol: &mut Vec<i64>,
) {
    let n = coeffs.len();
    let allowed = *max_dist * prune_factor::<F>(pruning, n, l);
    let remaining = allowed - partial;
    if remaining < F::zero() {
        return;
    }

    let mut center = F::zero();
    for t in (l + 1)..n {
        center = center - mu[t][l] * F::from_f64(coeffs[t] as f64);
    }

    let width = (remaining / rdiag[l]).sqrt();
    let x_center = center.round().to_f64() as i64;
    let max_offset = width.to_f64().ceil() as i64 + 1;

    for offset in 0..=max_offset {
        let candidates: [Option<i64>; 2] = if offset == 0 {
            [Some(x_center), None]
        } else {
            [Some(x_center + offset), Some(x_center - offset)]
        };
        for x in candidates.into_iter().flatten() {
            let dist = F::from_f64(x as f64) - center;
            let dist_sq = dist * dist * rdiag[l];
            if dist_sq > remaining {
                continue;
            }
            coeffs[l] = x;
            if l == 0 {
                let total = partial + dist_sq;
                if total <= *max_dist && coeffs.iter().any(|&c| c != 0) {
                    *max_dist = total;
                    sol.clear();
                    sol.extend_from_slice(coeffs);
                }
            } else {
                search_level(
                    l - 1,
                    partial + dist_sq,
                    coeffs,
                    rdiag,
                    mu,
                    pruning,
                    max_dist,
                    sol,
                );
            }
        }
    }
    coeffs[l] = 0;
}
