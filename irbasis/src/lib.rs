//! # irbasis: intermediate representation of imaginary-time propagators
//!
//! The IR basis is the truncated singular value expansion of the analytic
//! continuation kernel. Its left singular functions give a compact basis for
//! Green's functions in imaginary time, their Fourier transforms a basis on
//! the Matsubara axis. Sparse sampling transforms move between IR
//! coefficients and values at a few well-chosen times or frequencies.
//!
//! ```no_run
//! use irbasis::{FermionicBasis, MatsubaraSampling, MatsubaraSamplingOptions, TauSampling};
//!
//! # fn main() -> irbasis::Result<()> {
//! let basis = FermionicBasis::new(10.0, 4.0, Some(1e-6), None)?;
//! let tau = TauSampling::new(&basis)?;
//! let matsubara = MatsubaraSampling::new(&basis, MatsubaraSamplingOptions::default())?;
//!
//! let gl = basis.single_pole_coefficients(1.0)?;
//! let gtau = tau.evaluate(&gl)?;
//! let gl_fit = tau.fit(&gtau)?;
//! # let _ = (matsubara, gl_fit);
//! # Ok(())
//! # }
//! ```

pub mod basis;
pub mod basis_trait; // Common trait for basis representations
pub mod error;
mod fitter; // SVD-based least squares shared by the samplers
pub mod freq;
pub mod gauss;
mod gemm; // Row-major matrix products (faer backend)
pub mod greens;
pub mod kernel;
pub mod kernelmatrix;
pub mod matsubara_sampling; // Sparse sampling in Matsubara frequencies
pub mod numeric;
pub mod poly;
pub mod polyfourier;
pub mod sampling; // Sparse sampling in imaginary time
pub mod special_functions;
pub mod sve;
pub mod traits;
pub mod tsvd;

// Re-export commonly used types and traits
pub use basis::{
    BosonicBasis, FermionicBasis, FiniteTempBasis, MITIGATION_MIN_SIZE_INNER, MITIGATION_MIN_SIZE_OUTER,
    MITIGATION_OFFSET,
};
pub use basis_trait::Basis;
pub use error::{IrError, Result};
pub use fitter::COND_WARN_THRESHOLD;
pub use freq::{BosonicFreq, FermionicFreq, MatsubaraFreq};
pub use gauss::{legendre, Rule};
pub use greens::{giwn_single_pole, gtau_single_pole};
pub use kernel::{KernelProperties, LogisticKernel, RegularizedBoseKernel, SVEHints, SymmetryType};
pub use matsubara_sampling::{MatsubaraSampling, MatsubaraSamplingOptions};
pub use numeric::CustomNumeric;
pub use poly::{PiecewiseLegendrePoly, PiecewiseLegendrePolyVector};
pub use polyfourier::{PiecewiseLegendreFT, PiecewiseLegendreFTVector, PowerModel};
pub use sampling::TauSampling;
pub use sve::{compute_sve, SVEResult, SveOptions, SvdStrategy, TworkType};
pub use traits::{Bosonic, Fermionic, Statistics, StatisticsType};

// Re-export external dependencies for convenience
pub use mdarray::{DTensor, DynRank, Tensor};
pub use twofloat::TwoFloat;
