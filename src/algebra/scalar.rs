//! Numeric payload of sparse elements.

use std::fmt::Debug;
use std::ops::{Add, AddAssign, Div, Mul, MulAssign, Neg, Sub, SubAssign};

use num_complex::Complex64;

/// A value that can live in a sparse vector or matrix.
///
/// Implemented for `f64` (biasing and transient analysis) and
/// [`Complex64`] (small-signal analysis).
pub trait Scalar:
    Copy
    + Debug
    + Default
    + PartialEq
    + Send
    + Sync
    + Add<Output = Self>
    + Sub<Output = Self>
    + Mul<Output = Self>
    + Div<Output = Self>
    + Neg<Output = Self>
    + AddAssign
    + SubAssign
    + MulAssign
    + 'static
{
    /// Additive identity.
    fn zero() -> Self;

    /// Multiplicative identity.
    fn one() -> Self;

    /// Magnitude used when comparing pivot candidates.
    fn magnitude(&self) -> f64;

    /// Whether this is exactly the additive identity.
    fn is_zero(&self) -> bool {
        *self == Self::zero()
    }

    /// Multiplicative inverse.
    fn recip(self) -> Self {
        Self::one() / self
    }
}

impl Scalar for f64 {
    fn zero() -> Self {
        0.0
    }

    fn one() -> Self {
        1.0
    }

    fn magnitude(&self) -> f64 {
        self.abs()
    }
}

impl Scalar for Complex64 {
    fn zero() -> Self {
        Complex64::new(0.0, 0.0)
    }

    fn one() -> Self {
        Complex64::new(1.0, 0.0)
    }

    // Manhattan norm, as sparse-matrix packages traditionally do for pivoting
    fn magnitude(&self) -> f64 {
        self.re.abs() + self.im.abs()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_complex_magnitude() {
        let z = Complex64::new(3.0, -4.0);
        assert_eq!(z.magnitude(), 7.0);
        assert!(Complex64::zero().is_zero());
    }

    #[test]
    fn test_recip() {
        assert_eq!(4.0f64.recip(), 0.25);
        let z = Complex64::new(0.0, 2.0).recip();
        assert!((z - Complex64::new(0.0, -0.5)).norm() < 1e-15);
    }
}
