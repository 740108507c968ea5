//! Matsubara frequencies with statistics checked at the type level
//!
//! A frequency is stored as its integer index `n`; the physical value is
//! `n π / β`. Fermionic indices are odd, bosonic indices are even.

use num_complex::Complex64;
use std::cmp::Ordering;
use std::fmt;
use std::marker::PhantomData;
use std::ops::{Add, Neg, Sub};

use crate::error::{IrError, Result};
use crate::traits::{Bosonic, Fermionic, Statistics, StatisticsType};

/// Matsubara frequency `iν_n = i n π / β` for statistics `S`
#[derive(Debug, Clone, Copy)]
pub struct MatsubaraFreq<S: StatisticsType> {
    n: i64,
    _statistics: PhantomData<S>,
}

pub type FermionicFreq = MatsubaraFreq<Fermionic>;
pub type BosonicFreq = MatsubaraFreq<Bosonic>;

/// Check that `n` has the parity required by `statistics`
pub fn check_parity(n: i64, statistics: Statistics) -> Result<()> {
    let ok = match statistics {
        Statistics::Fermionic => n.rem_euclid(2) == 1,
        Statistics::Bosonic => n.rem_euclid(2) == 0,
    };
    if ok {
        Ok(())
    } else {
        Err(IrError::InvalidFrequency { n, statistics })
    }
}

impl<S: StatisticsType> MatsubaraFreq<S> {
    /// Create a frequency, rejecting indices of the wrong parity
    ///
    /// ```
    /// use irbasis::freq::{BosonicFreq, FermionicFreq};
    ///
    /// assert!(FermionicFreq::new(1).is_ok());
    /// assert!(FermionicFreq::new(2).is_err());
    /// assert!(BosonicFreq::new(0).is_ok());
    /// ```
    pub fn new(n: i64) -> Result<Self> {
        check_parity(n, S::STATISTICS)?;
        Ok(Self::from_index(n))
    }

    // No parity check; arithmetic results are not revalidated (see `Add`).
    fn from_index(n: i64) -> Self {
        Self {
            n,
            _statistics: PhantomData,
        }
    }

    /// Matsubara index `n`
    pub fn n(&self) -> i64 {
        self.n
    }

    /// Real frequency `n π / β`
    pub fn value(&self, beta: f64) -> f64 {
        self.n as f64 * std::f64::consts::PI / beta
    }

    /// Imaginary frequency `i n π / β`
    pub fn value_imaginary(&self, beta: f64) -> Complex64 {
        Complex64::new(0.0, self.value(beta))
    }

    pub fn statistics(&self) -> Statistics {
        S::STATISTICS
    }

    /// Reduced index `m` with `n = 2m + ζ`
    pub fn reduced_index(&self) -> i64 {
        (self.n - S::STATISTICS.zeta()).div_euclid(2)
    }
}

impl Default for FermionicFreq {
    fn default() -> Self {
        Self::from_index(1)
    }
}

impl Default for BosonicFreq {
    fn default() -> Self {
        Self::from_index(0)
    }
}

impl<S: StatisticsType> From<MatsubaraFreq<S>> for i64 {
    fn from(freq: MatsubaraFreq<S>) -> Self {
        freq.n
    }
}

/// Index sum. The sum of two fermionic indices is even, so the caller is
/// responsible for the statistics of the result when it matters.
impl<S: StatisticsType> Add for MatsubaraFreq<S> {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Self::from_index(self.n + other.n)
    }
}

impl<S: StatisticsType> Sub for MatsubaraFreq<S> {
    type Output = Self;

    fn sub(self, other: Self) -> Self {
        Self::from_index(self.n - other.n)
    }
}

impl<S: StatisticsType> Neg for MatsubaraFreq<S> {
    type Output = Self;

    fn neg(self) -> Self {
        Self::from_index(-self.n)
    }
}

impl<S: StatisticsType> PartialEq for MatsubaraFreq<S> {
    fn eq(&self, other: &Self) -> bool {
        self.n == other.n
    }
}

impl<S: StatisticsType> Eq for MatsubaraFreq<S> {}

impl<S: StatisticsType> PartialOrd for MatsubaraFreq<S> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<S: StatisticsType> Ord for MatsubaraFreq<S> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.n.cmp(&other.n)
    }
}

impl<S: StatisticsType> std::hash::Hash for MatsubaraFreq<S> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.n.hash(state);
    }
}

impl<S: StatisticsType> fmt::Display for MatsubaraFreq<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.n {
            0 => write!(f, "0"),
            1 => write!(f, "π/β"),
            -1 => write!(f, "-π/β"),
            n => write!(f, "{}π/β", n),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parity_checks() {
        assert_eq!(FermionicFreq::new(-1).unwrap().n(), -1);
        assert_eq!(FermionicFreq::new(3).unwrap().n(), 3);
        assert!(FermionicFreq::new(0).is_err());
        assert!(FermionicFreq::new(-2).is_err());

        assert_eq!(BosonicFreq::new(0).unwrap().n(), 0);
        assert_eq!(BosonicFreq::new(-2).unwrap().n(), -2);
        assert!(BosonicFreq::new(1).is_err());
        assert!(BosonicFreq::new(-3).is_err());
    }

    #[test]
    fn test_invalid_frequency_error() {
        match FermionicFreq::new(4) {
            Err(IrError::InvalidFrequency { n, statistics }) => {
                assert_eq!(n, 4);
                assert_eq!(statistics, Statistics::Fermionic);
            }
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn test_values() {
        let beta = 2.0;
        let pi = std::f64::consts::PI;
        assert!((FermionicFreq::new(1).unwrap().value(beta) - pi / 2.0).abs() < 1e-14);
        assert_eq!(BosonicFreq::new(0).unwrap().value(beta), 0.0);

        let iv = BosonicFreq::new(2).unwrap().value_imaginary(beta);
        assert_eq!(iv.re, 0.0);
        assert!((iv.im - pi).abs() < 1e-14);
    }

    #[test]
    fn test_reduced_index() {
        assert_eq!(FermionicFreq::new(1).unwrap().reduced_index(), 0);
        assert_eq!(FermionicFreq::new(-1).unwrap().reduced_index(), -1);
        assert_eq!(FermionicFreq::new(7).unwrap().reduced_index(), 3);
        assert_eq!(BosonicFreq::new(-4).unwrap().reduced_index(), -2);
    }

    #[test]
    fn test_ordering_and_arithmetic() {
        let a = FermionicFreq::new(1).unwrap();
        let b = FermionicFreq::new(3).unwrap();
        assert!(a < b);
        assert_eq!((-a).n(), -1);
        assert_eq!((b - a).n(), 2);
        assert_eq!((a + b).n(), 4);

        let mut freqs = vec![b, -b, a, -a];
        freqs.sort();
        let ns: Vec<i64> = freqs.iter().map(|f| f.n()).collect();
        assert_eq!(ns, vec![-3, -1, 1, 3]);
    }

    #[test]
    fn test_display() {
        assert_eq!(FermionicFreq::new(1).unwrap().to_string(), "π/β");
        assert_eq!(FermionicFreq::new(-1).unwrap().to_string(), "-π/β");
        assert_eq!(BosonicFreq::new(0).unwrap().to_string(), "0");
        assert_eq!(BosonicFreq::new(-6).unwrap().to_string(), "-6π/β");
    }

    #[test]
    fn test_defaults() {
        assert_eq!(FermionicFreq::default().n(), 1);
        assert_eq!(BosonicFreq::default().n(), 0);
        let n: i64 = FermionicFreq::new(5).unwrap().into();
        assert_eq!(n, 5);
    }
}
