//! Floating-point abstraction used by the reduction algorithms.
//!
//! Gram-Schmidt data is kept in a scaled representation `mantissa * 2^expo`
//! so that bases with very large integer entries stay inside the exponent
//! range of the underlying float type. The algorithms only need a small set
//! of operations on the mantissa type, captured by [`FloatLike`] and
//! monomorphised at compile time.

use std::fmt;
use std::ops::{Add, Div, Mul, Neg, Sub};

/// Capabilities required of the mantissa type.
///
/// `f64` is the provided implementation; a higher-precision type can be
/// plugged in without touching the algorithms.
pub trait FloatLike:
    Copy
    + PartialOrd
    + Add<Output = Self>
    + Sub<Output = Self>
    + Mul<Output = Self>
    + Div<Output = Self>
    + Neg<Output = Self>
    + fmt::Debug
    + fmt::Display
{
    fn zero() -> Self;
    fn one() -> Self;
    fn from_f64(x: f64) -> Self;
    fn to_f64(self) -> f64;

    /// Natural logarithm. Arguments at or below zero are clamped to the
    /// smallest positive value first so the result stays finite.
    fn ln(self) -> Self;

    /// Multiply by `2^e` without going through a large intermediate power.
    fn mul_2si(self, e: i64) -> Self;

    /// Round to the nearest integer value.
    fn round(self) -> Self;

    /// Square root; negative arguments are clamped to zero first.
    fn sqrt(self) -> Self;

    fn abs(self) -> Self;
    fn is_finite(self) -> bool;

    fn is_zero(self) -> bool {
        self == Self::zero()
    }
}

impl FloatLike for f64 {
    fn zero() -> Self {
        0.0
    }

    fn one() -> Self {
        1.0
    }

    fn from_f64(x: f64) -> Self {
        x
    }

    fn to_f64(self) -> f64 {
        self
    }

    fn ln(self) -> Self {
        self.max(f64::MIN_POSITIVE).ln()
    }

    fn mul_2si(self, e: i64) -> Self {
        let mut x = self;
        let mut e = e;
        // Stay within the representable exponent range at every step
        while e > 1000 {
            x *= f64::powi(2.0, 1000);
            e -= 1000;
        }
        while e < -1000 {
            x *= f64::powi(2.0, -1000);
            e += 1000;
        }
        x * f64::powi(2.0, e as i32)
    }

    fn round(self) -> Self {
        f64::round(self)
    }

    fn sqrt(self) -> Self {
        f64::sqrt(self.max(0.0))
    }

    fn abs(self) -> Self {
        f64::abs(self)
    }

    fn is_finite(self) -> bool {
        f64::is_finite(self)
    }
}
