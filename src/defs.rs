//! Shared status codes and numeric defaults for the reduction algorithms.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Default Lovász constant for LLL and BKZ
pub const LLL_DEF_DELTA: f64 = 0.99;

/// Default size-reduction threshold (must be in (1/2, sqrt(delta)))
pub const LLL_DEF_ETA: f64 = 0.51;

/// Consecutive non-decreasing Babai sweeps tolerated before giving up
pub const SIZE_RED_FAILURE_THRESH: usize = 5;

/// Default auto-abort improvement factor
pub const BKZ_DEF_AUTO_ABORT_SCALE: f64 = 1.0;

/// Default number of stalled tours before auto-abort fires
pub const BKZ_DEF_AUTO_ABORT_MAX_NO_DEC: i64 = 5;

/// Outcome of a reduction call.
///
/// `BkzTimeLimit` and `BkzLoopsLimit` are not errors: the basis is consistent
/// and spans the input lattice, it is merely under-reduced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RedStatus {
    Success,
    GsoFailure,
    BabaiFailure,
    LllFailure,
    EnumFailure,
    BkzFailure,
    BkzTimeLimit,
    BkzLoopsLimit,
}

impl RedStatus {
    /// True only for a fully successful reduction.
    pub fn is_success(self) -> bool {
        matches!(self, RedStatus::Success)
    }

    /// True when the caller may keep using the basis: full success, or a
    /// loop/time budget ran out with partial progress.
    pub fn accepts_basis(self) -> bool {
        matches!(
            self,
            RedStatus::Success | RedStatus::BkzTimeLimit | RedStatus::BkzLoopsLimit
        )
    }
}

impl fmt::Display for RedStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            RedStatus::Success => "success",
            RedStatus::GsoFailure => "infinite number in GSO",
            RedStatus::BabaiFailure => "infinite loop in babai",
            RedStatus::LllFailure => "infinite loop in LLL",
            RedStatus::EnumFailure => "error in SVP solver",
            RedStatus::BkzFailure => "error in BKZ",
            RedStatus::BkzTimeLimit => "time limit exceeded in BKZ",
            RedStatus::BkzLoopsLimit => "loops limit exceeded in BKZ",
        };
        f.write_str(msg)
    }
}
