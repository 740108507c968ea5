//! Analytic Green's functions of a single pole
//!
//! Reference data for checking sampling transforms: a pole at real
//! frequency `ω` has
//!
//! ```text
//! G(iν) = 1 / (iν - ω)
//! G(τ)  = -e^{-ωτ} / (1 + e^{-βω})   fermions
//! G(τ)  = -e^{-ωτ} / (1 - e^{-βω})   bosons
//! ```
//!
//! for `0 ≤ τ ≤ β`. The IR coefficients of the same pole are given by
//! [`FiniteTempBasis::single_pole_coefficients`](crate::FiniteTempBasis::single_pole_coefficients).

use num_complex::Complex64;

use crate::error::{IrError, Result};
use crate::freq::MatsubaraFreq;
use crate::traits::{Statistics, StatisticsType};

/// `G(τ)` of a pole at `omega`, for `-β ≤ τ ≤ β`
///
/// Negative times use `G(τ - β) = ∓G(τ)` (fermions flip sign). The
/// bosonic function diverges for a pole at `ω = 0`, which is rejected.
///
/// ```
/// use irbasis::greens::gtau_single_pole;
/// use irbasis::Statistics;
///
/// let g0 = gtau_single_pole(0.0, 1.0, 10.0, Statistics::Fermionic).unwrap();
/// let gb = gtau_single_pole(10.0, 1.0, 10.0, Statistics::Fermionic).unwrap();
/// assert!((g0 + gb + 1.0).abs() < 1e-14);
/// ```
pub fn gtau_single_pole(tau: f64, omega: f64, beta: f64, statistics: Statistics) -> Result<f64> {
    if !(beta > 0.0) || !beta.is_finite() {
        return Err(IrError::invalid("beta", beta, "inverse temperature must be positive and finite"));
    }
    if !omega.is_finite() {
        return Err(IrError::invalid("omega", omega, "pole must be finite"));
    }
    if !(-beta..=beta).contains(&tau) {
        return Err(IrError::invalid("tau", tau, format!("must lie in [-{beta}, {beta}]")));
    }
    if statistics.is_bosonic() && omega == 0.0 {
        return Err(IrError::invalid("omega", omega, "bosonic pole at zero frequency diverges"));
    }

    let (tau, sign) = if tau < 0.0 {
        let sign = match statistics {
            Statistics::Fermionic => -1.0,
            Statistics::Bosonic => 1.0,
        };
        (tau + beta, sign)
    } else {
        (tau, 1.0)
    };

    // Exponents stay non-positive for either sign of ω
    let g = match (statistics, omega >= 0.0) {
        (Statistics::Fermionic, true) => -(-omega * tau).exp() / (1.0 + (-beta * omega).exp()),
        (Statistics::Fermionic, false) => -(omega * (beta - tau)).exp() / (1.0 + (beta * omega).exp()),
        (Statistics::Bosonic, true) => (-omega * tau).exp() / (-beta * omega).exp_m1(),
        (Statistics::Bosonic, false) => -(omega * (beta - tau)).exp() / (beta * omega).exp_m1(),
    };
    Ok(sign * g)
}

/// `G(iν) = 1 / (iν - ω)` of a pole at `omega`
pub fn giwn_single_pole<S: StatisticsType>(freq: &MatsubaraFreq<S>, omega: f64, beta: f64) -> Complex64 {
    (freq.value_imaginary(beta) - omega).inv()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::{Bosonic, Fermionic};
    use approx::assert_abs_diff_eq;

    /// `∫₀^β e^{iντ} G(τ) dτ` by composite Simpson
    fn transform(statistics: Statistics, n: i64, omega: f64, beta: f64) -> Complex64 {
        let steps = 4000;
        let h = beta / steps as f64;
        let wn = n as f64 * std::f64::consts::PI / beta;
        (0..=steps)
            .map(|k| {
                let tau = k as f64 * h;
                let weight = match k {
                    0 => 1.0,
                    k if k == steps => 1.0,
                    k if k % 2 == 1 => 4.0,
                    _ => 2.0,
                };
                let g = gtau_single_pole(tau, omega, beta, statistics).unwrap();
                weight * g * Complex64::from_polar(1.0, wn * tau)
            })
            .sum::<Complex64>()
            * (h / 3.0)
    }

    #[test]
    fn test_fourier_pair_fermionic() {
        let (beta, omega) = (2.0, 1.5);
        for n in [-3, 1, 5] {
            let freq = MatsubaraFreq::<Fermionic>::new(n).unwrap();
            let expected = giwn_single_pole(&freq, omega, beta);
            let numeric = transform(Statistics::Fermionic, n, omega, beta);
            assert!((numeric - expected).norm() < 1e-9, "n = {n}: {numeric} vs {expected}");
        }
    }

    #[test]
    fn test_fourier_pair_bosonic() {
        let (beta, omega) = (2.0, -0.7);
        for n in [-2, 0, 4] {
            let freq = MatsubaraFreq::<Bosonic>::new(n).unwrap();
            let expected = giwn_single_pole(&freq, omega, beta);
            let numeric = transform(Statistics::Bosonic, n, omega, beta);
            assert!((numeric - expected).norm() < 1e-9, "n = {n}: {numeric} vs {expected}");
        }
    }

    #[test]
    fn test_periodicity() {
        let (beta, omega) = (3.0, 0.8);
        let g = gtau_single_pole(1.0, omega, beta, Statistics::Fermionic).unwrap();
        let g_shifted = gtau_single_pole(1.0 - beta, omega, beta, Statistics::Fermionic).unwrap();
        assert_abs_diff_eq!(g, -g_shifted, epsilon = 1e-15);

        let g = gtau_single_pole(1.0, omega, beta, Statistics::Bosonic).unwrap();
        let g_shifted = gtau_single_pole(1.0 - beta, omega, beta, Statistics::Bosonic).unwrap();
        assert_abs_diff_eq!(g, g_shifted, epsilon = 1e-15);
    }

    #[test]
    fn test_large_negative_pole_is_finite() {
        let g = gtau_single_pole(0.0, -500.0, 10.0, Statistics::Fermionic).unwrap();
        assert!(g.is_finite() && g.abs() < 1e-300);
        let g = gtau_single_pole(10.0, -500.0, 10.0, Statistics::Fermionic).unwrap();
        assert_abs_diff_eq!(g, -1.0, epsilon = 1e-15);
        let g = gtau_single_pole(10.0, -500.0, 10.0, Statistics::Bosonic).unwrap();
        assert_abs_diff_eq!(g, 1.0, epsilon = 1e-15);
    }

    #[test]
    fn test_invalid_arguments() {
        assert!(gtau_single_pole(0.5, 1.0, -1.0, Statistics::Fermionic).is_err());
        assert!(gtau_single_pole(2.5, 1.0, 2.0, Statistics::Fermionic).is_err());
        assert!(gtau_single_pole(0.5, 0.0, 2.0, Statistics::Bosonic).is_err());
        assert!(gtau_single_pole(0.5, 0.0, 2.0, Statistics::Fermionic).is_ok());
    }
}
