//! Interface shared by basis representations
//!
//! Sampling transforms only need the axis functions and the default
//! sampling points of a basis, so they are written against this trait
//! rather than a concrete basis type.

use mdarray::DTensor;
use num_complex::Complex64;

use crate::error::Result;
use crate::freq::MatsubaraFreq;
use crate::kernel::KernelProperties;
use crate::traits::{Statistics, StatisticsType};
use crate::FiniteTempBasis;

/// Common trait for basis representations in imaginary time and frequency
pub trait Basis<S: StatisticsType> {
    /// Number of basis functions
    fn size(&self) -> usize;

    fn statistics(&self) -> Statistics {
        S::STATISTICS
    }

    /// Inverse temperature β
    fn beta(&self) -> f64;

    /// Frequency cutoff ωmax
    fn wmax(&self) -> f64;

    /// Dimensionless cutoff `Λ = β ωmax`
    fn lambda(&self) -> f64 {
        self.beta() * self.wmax()
    }

    /// Matrix of shape `[tau.len(), size]` with entries `u_l(τ_i)`
    fn evaluate_tau(&self, tau: &[f64]) -> Result<DTensor<f64, 2>>;

    /// Matrix of shape `[freqs.len(), size]` with entries `û_l(iν_i)`
    fn evaluate_matsubara(&self, freqs: &[MatsubaraFreq<S>]) -> DTensor<Complex64, 2>;

    /// Imaginary times giving a well-conditioned sampling matrix
    fn default_tau_sampling_points(&self) -> Result<Vec<f64>>;

    /// Matsubara frequencies giving a well-conditioned sampling matrix
    fn default_matsubara_sampling_points(&self, positive_only: bool, mitigate: bool) -> Result<Vec<MatsubaraFreq<S>>>;
}

impl<S: StatisticsType, K: KernelProperties> Basis<S> for FiniteTempBasis<S, K> {
    fn size(&self) -> usize {
        FiniteTempBasis::size(self)
    }

    fn beta(&self) -> f64 {
        FiniteTempBasis::beta(self)
    }

    fn wmax(&self) -> f64 {
        FiniteTempBasis::wmax(self)
    }

    fn lambda(&self) -> f64 {
        FiniteTempBasis::lambda(self)
    }

    fn evaluate_tau(&self, tau: &[f64]) -> Result<DTensor<f64, 2>> {
        FiniteTempBasis::evaluate_tau(self, tau)
    }

    fn evaluate_matsubara(&self, freqs: &[MatsubaraFreq<S>]) -> DTensor<Complex64, 2> {
        FiniteTempBasis::evaluate_matsubara(self, freqs)
    }

    fn default_tau_sampling_points(&self) -> Result<Vec<f64>> {
        FiniteTempBasis::default_tau_sampling_points(self)
    }

    fn default_matsubara_sampling_points(&self, positive_only: bool, mitigate: bool) -> Result<Vec<MatsubaraFreq<S>>> {
        FiniteTempBasis::default_matsubara_sampling_points(self, positive_only, mitigate)
    }
}

#[cfg(test)]
#[path = "basis_trait_tests.rs"]
mod tests;
