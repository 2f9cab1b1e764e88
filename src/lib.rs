//! Block lattice basis reduction over multi-precision integer bases.
//!
//! This crate implements BKZ reduction together with the subsystems it
//! coordinates:
//!
//! - `basis`: exact `BigInt` row matrices
//! - `gso`: a lazily maintained Gram-Schmidt factor with a scaled-exponent
//!   representation for very large entries
//! - `lll`: LLL reduction over row ranges
//! - `enumeration`: Schnorr-Euchner search for the shortest vector of a block
//! - `bkz`: the tour driver with auto-abort, loop/time budgets and an
//!   injectable progress observer
//! - `lattice_io`: SVP Challenge basis files and Gram-Schmidt profile dumps
//!
//! # Examples
//!
//! ```
//! use lattice_engine::{bkz_reduction, BkzParams, LatticeBasis, RedStatus};
//!
//! let basis = LatticeBasis::from_i64(&[
//!     vec![1, 0, 0],
//!     vec![0, 1, 0],
//!     vec![1000, 1000, 1],
//! ]);
//! let (reduced, status) = bkz_reduction(basis, &BkzParams::new(2));
//! assert_eq!(status, RedStatus::Success);
//! assert!(reduced.row_norm_sq(0) <= reduced.row_norm_sq(2));
//! ```

pub mod basis;
pub mod bkz;
pub mod defs;
pub mod enumeration;
pub mod float;
pub mod gso;
pub mod lattice_io;
pub mod lll;

pub use basis::LatticeBasis;
pub use bkz::{
    bkz_reduction, current_slope, AutoAbort, BkzFlags, BkzObserver, BkzParams, BkzReduction,
    LogObserver, NullObserver, TourReport,
};
pub use defs::RedStatus;
pub use enumeration::{enumerate, Evaluator};
pub use float::FloatLike;
pub use gso::MatGso;
pub use lll::LllReducer;
