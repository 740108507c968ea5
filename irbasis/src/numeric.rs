//! Working-precision scalar abstraction
//!
//! The SVE can run in plain `f64` or in double-double (`TwoFloat`). Every
//! routine that participates in the expansion (quadrature, kernel
//! evaluation, the truncated SVD) is generic over [`CustomNumeric`].

use std::fmt::{Debug, Display};
use twofloat::TwoFloat;

/// Scalar operations needed by the quadrature, kernel and SVD code
pub trait CustomNumeric:
    Copy
    + Debug
    + Display
    + PartialOrd
    + Send
    + Sync
    + 'static
    + std::ops::Add<Output = Self>
    + std::ops::Sub<Output = Self>
    + std::ops::Mul<Output = Self>
    + std::ops::Div<Output = Self>
    + std::ops::Neg<Output = Self>
{
    fn from_f64(x: f64) -> Self;

    fn to_f64(self) -> f64;

    /// Unit roundoff of the type
    fn epsilon() -> Self;

    fn zero() -> Self {
        Self::from_f64(0.0)
    }

    fn one() -> Self {
        Self::from_f64(1.0)
    }

    fn pi() -> Self;

    fn abs(self) -> Self;

    fn sqrt(self) -> Self;

    fn exp(self) -> Self;

    /// `exp(x) - 1` without cancellation near zero
    fn exp_m1(self) -> Self;

    fn cos(self) -> Self;

    fn is_finite(self) -> bool;

    fn max(self, other: Self) -> Self {
        if self > other {
            self
        } else {
            other
        }
    }

    fn min(self, other: Self) -> Self {
        if self < other {
            self
        } else {
            other
        }
    }

    /// Change precision through `f64` (lossy when narrowing)
    fn convert_from<U: CustomNumeric>(value: U) -> Self {
        Self::from_f64(value.to_f64())
    }
}

impl CustomNumeric for f64 {
    fn from_f64(x: f64) -> Self {
        x
    }

    fn to_f64(self) -> f64 {
        self
    }

    fn epsilon() -> Self {
        f64::EPSILON
    }

    fn pi() -> Self {
        std::f64::consts::PI
    }

    fn abs(self) -> Self {
        f64::abs(self)
    }

    fn sqrt(self) -> Self {
        f64::sqrt(self)
    }

    fn exp(self) -> Self {
        f64::exp(self)
    }

    fn exp_m1(self) -> Self {
        f64::exp_m1(self)
    }

    fn cos(self) -> Self {
        f64::cos(self)
    }

    fn is_finite(self) -> bool {
        f64::is_finite(self)
    }
}

impl CustomNumeric for TwoFloat {
    fn from_f64(x: f64) -> Self {
        TwoFloat::from(x)
    }

    fn to_f64(self) -> f64 {
        self.hi() + self.lo()
    }

    fn epsilon() -> Self {
        TwoFloat::from(f64::EPSILON * f64::EPSILON)
    }

    fn pi() -> Self {
        TwoFloat::new_add(3.141592653589793, 1.2246467991473532e-16)
    }

    fn abs(self) -> Self {
        (&self).abs()
    }

    fn sqrt(self) -> Self {
        (&self).sqrt()
    }

    fn exp(self) -> Self {
        (&self).exp()
    }

    fn exp_m1(self) -> Self {
        if self.hi().abs() >= 0.5 {
            return (&self).exp() - TwoFloat::from(1.0);
        }
        // Taylor series; |x| < 1/2 converges to double-double accuracy in
        // well under 40 terms
        let mut term = self;
        let mut sum = self;
        for k in 2..40 {
            term = term * self / TwoFloat::from(k as f64);
            sum = sum + term;
            if term.hi().abs() <= 1e-33 * sum.hi().abs() {
                break;
            }
        }
        sum
    }

    fn cos(self) -> Self {
        (&self).cos()
    }

    fn is_finite(self) -> bool {
        self.hi().is_finite() && self.lo().is_finite()
    }
}

#[cfg(test)]
#[path = "numeric_tests.rs"]
mod tests;
