//! Common test utilities

#![allow(dead_code)]

use irbasis::{FiniteTempBasis, StatisticsType};
use num_complex::Complex64;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Random coefficients decaying like the singular values of `basis`
pub fn random_coefficients<S: StatisticsType>(basis: &FiniteTempBasis<S>, seed: u64) -> Vec<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    let s0 = basis.s()[0];
    basis.s().iter().map(|&s| rng.gen_range(-1.0..1.0) * s / s0).collect()
}

/// Random values in `[-1, 1)`
pub fn random_values(n: usize, seed: u64) -> Vec<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n).map(|_| rng.gen_range(-1.0..1.0)).collect()
}

pub fn max_abs(x: &[f64]) -> f64 {
    x.iter().fold(0.0, |m, v| m.max(v.abs()))
}

pub fn max_abs_diff(a: &[f64], b: &[f64]) -> f64 {
    assert_eq!(a.len(), b.len());
    a.iter().zip(b).fold(0.0, |m, (x, y)| m.max((x - y).abs()))
}

pub fn max_abs_diff_complex(a: &[Complex64], b: &[Complex64]) -> f64 {
    assert_eq!(a.len(), b.len());
    a.iter().zip(b).fold(0.0, |m, (x, y)| m.max((x - y).norm()))
}
