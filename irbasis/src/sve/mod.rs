//! Singular value expansion of the kernels
//!
//! The kernel is discretized on composite Gauss-Legendre rules, split into
//! its even and odd blocks, decomposed with a rank-revealing truncated SVD
//! in the requested working precision, and turned back into piecewise
//! Legendre polynomials on `[-1, 1]`.

mod compute;
mod result;
mod strategy;
mod types;
pub mod utils;

pub use compute::{compute_svd, compute_sve, truncate};
pub use result::SVEResult;
pub use strategy::{CentrosymmSve, SamplingSve, SveStrategy};
pub use types::{safe_epsilon, SveOptions, SvdStrategy, TworkType, F64_EPSILON_THRESHOLD, TWO_PASS_LAMBDA_THRESHOLD};

#[cfg(test)]
#[path = "../sve_tests.rs"]
mod tests;
