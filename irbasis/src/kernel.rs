//! Analytic kernels of the imaginary-time/real-frequency transform
//!
//! A kernel is the integral operator of a Fredholm equation of the first kind
//!
//! ```text
//! u(x) = ∫ K(x, y) v(y) dy,    x, y ∈ [-1, 1]
//! ```
//!
//! in reduced variables `x = 2τ/β - 1` and `y = ω/ωmax`. The kernel acts on a
//! scaled spectral function `ρ'(ω) = w(ω) ρ(ω)`, where the weight `w` depends
//! on kernel and statistics.
//!
//! Both supported kernels are centrosymmetric, `K(x, y) = K(-x, -y)`, so the
//! expansion splits into an even and an odd block on `[0, 1] × [0, 1]`
//! ([`ReducedKernel`]).

use std::fmt::Debug;

use crate::numeric::CustomNumeric;
use crate::traits::Statistics;

/// Parity of a reduced kernel block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SymmetryType {
    /// `K(x, y) + K(x, -y)`
    Even,
    /// `K(x, y) - K(x, -y)`
    Odd,
}

impl SymmetryType {
    pub fn sign(self) -> i32 {
        match self {
            SymmetryType::Even => 1,
            SymmetryType::Odd => -1,
        }
    }
}

/// Discretization hints for the singular value expansion of a kernel
///
/// Segment knots are sorted and cover the domain of the kernel they were
/// produced for (`[-1, 1]` for a full kernel, `[0, 1]` for a reduced one).
#[derive(Debug, Clone, PartialEq)]
pub struct SVEHints {
    pub segments_x: Vec<f64>,
    pub segments_y: Vec<f64>,
    /// Rough upper estimate of the number of significant singular values
    pub nsvals: usize,
    /// Gauss-Legendre points per segment
    pub ngauss: usize,
}

impl SVEHints {
    /// Hints for a reduced (even or odd) block: keep the non-negative knots
    pub fn reduced(&self) -> SVEHints {
        SVEHints {
            segments_x: symm_segments(&self.segments_x),
            segments_y: symm_segments(&self.segments_y),
            nsvals: (self.nsvals + 1) / 2,
            ngauss: self.ngauss,
        }
    }
}

fn symm_segments(knots: &[f64]) -> Vec<f64> {
    let mut positive: Vec<f64> = knots.iter().copied().filter(|&k| k >= 0.0).collect();
    if positive.first().map_or(true, |&k| k != 0.0) {
        positive.insert(0, 0.0);
    }
    positive
}

/// Gauss order for a target accuracy: 10 points down to `√ε_f64`
pub(crate) fn ngauss_for(epsilon: f64) -> usize {
    if epsilon >= f64::EPSILON.sqrt() {
        10
    } else {
        16
    }
}

/// Interface shared by the two centrosymmetric kernel families
pub trait KernelProperties: Debug + Clone + Send + Sync + 'static {
    /// Cutoff `Λ = β ωmax`
    fn lambda(&self) -> f64;

    /// `K(x, y)` on `[-1, 1]²`
    fn compute<T: CustomNumeric>(&self, x: T, y: T) -> T;

    /// `K(x, y) ± K(x, -y)` on `[0, 1]²`, evaluated without cancellation
    fn compute_reduced<T: CustomNumeric>(&self, x: T, y: T, symmetry: SymmetryType) -> T;

    /// Power of `y` carried by the kernel (enters the rescaling of `s`)
    fn ypower(&self) -> i32;

    /// Reduced Matsubara index beyond which `uhat` uses its asymptotic model
    fn conv_radius(&self) -> f64 {
        40.0 * self.lambda()
    }

    fn xrange(&self) -> (f64, f64) {
        (-1.0, 1.0)
    }

    fn yrange(&self) -> (f64, f64) {
        (-1.0, 1.0)
    }

    fn supports(&self, statistics: Statistics) -> bool;

    /// Weight `w(β, ω)` relating `ρ'` to `ρ`
    fn weight(&self, statistics: Statistics, beta: f64, omega: f64) -> f64;

    /// `1 / w(β, ω)`, finite where `w` is singular
    fn inv_weight(&self, statistics: Statistics, beta: f64, omega: f64) -> f64;

    /// Discretization hints on the full domain
    fn sve_hints(&self, epsilon: f64) -> SVEHints;
}

// Cancellation-free ingredients: u₊ = (1+x)/2, u₋ = (1-x)/2, v = Λy
fn compute_uv<T: CustomNumeric>(lambda: f64, x: T, y: T) -> (T, T, T) {
    let half = T::from_f64(0.5);
    let u_plus = half * (T::one() + x);
    let u_minus = half * (T::one() - x);
    let v = T::from_f64(lambda) * y;
    (u_plus, u_minus, v)
}

/// Fermionic logistic kernel
///
/// `K(x, y) = exp(-Λy(x + 1)/2) / (1 + exp(-Λy))`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LogisticKernel {
    lambda: f64,
}

impl LogisticKernel {
    /// `lambda` must be non-negative; this is checked by the basis constructors.
    pub fn new(lambda: f64) -> Self {
        Self { lambda }
    }
}

impl KernelProperties for LogisticKernel {
    fn lambda(&self) -> f64 {
        self.lambda
    }

    fn compute<T: CustomNumeric>(&self, x: T, y: T) -> T {
        let (u_plus, u_minus, v) = compute_uv(self.lambda, x, y);
        let abs_v = v.abs();
        let numerator = if v >= T::zero() {
            (-abs_v * u_plus).exp()
        } else {
            (-abs_v * u_minus).exp()
        };
        numerator / (T::one() + (-abs_v).exp())
    }

    fn compute_reduced<T: CustomNumeric>(&self, x: T, y: T, symmetry: SymmetryType) -> T {
        // y >= 0 and x >= 0 on the reduced domain, hence u₊ >= u₋
        let (u_plus, u_minus, v) = compute_uv(self.lambda, x, y);
        let denom = T::one() + (-v).exp();
        match symmetry {
            SymmetryType::Even => ((-v * u_plus).exp() + (-v * u_minus).exp()) / denom,
            SymmetryType::Odd => (-v * u_minus).exp() * (-v * x).exp_m1() / denom,
        }
    }

    fn ypower(&self) -> i32 {
        0
    }

    fn supports(&self, _statistics: Statistics) -> bool {
        true
    }

    fn weight(&self, statistics: Statistics, beta: f64, omega: f64) -> f64 {
        match statistics {
            Statistics::Fermionic => 1.0,
            Statistics::Bosonic => 1.0 / (0.5 * beta * omega).tanh(),
        }
    }

    fn inv_weight(&self, statistics: Statistics, beta: f64, omega: f64) -> f64 {
        match statistics {
            Statistics::Fermionic => 1.0,
            Statistics::Bosonic => (0.5 * beta * omega).tanh(),
        }
    }

    fn sve_hints(&self, epsilon: f64) -> SVEHints {
        let log10_lambda = self.lambda.log10();

        let nzeros_x = ((15.0 * log10_lambda).round() as i64).max(1) as usize;
        let diffs_x: Vec<f64> = (0..nzeros_x)
            .map(|i| 1.0 / (0.143 * i as f64).cosh())
            .collect();

        let nzeros_y = ((20.0 * log10_lambda).round() as i64).max(2) as usize;
        let mut diffs_y: Vec<f64> = LOGISTIC_Y_DIFFS[..nzeros_y.min(LOGISTIC_Y_DIFFS.len())].to_vec();
        diffs_y.extend((LOGISTIC_Y_DIFFS.len()..nzeros_y).map(|i| 0.25 / (0.141 * i as f64).exp()));

        let l = log10_lambda.max(1.0);
        SVEHints {
            segments_x: symmetric_knots_from_diffs(&diffs_x),
            segments_y: endpoint_clustered_knots_from_diffs(&diffs_y),
            nsvals: ((25.0 + l) * l).round() as usize,
            ngauss: ngauss_for(epsilon),
        }
    }
}

/// Empirical spacings of the `y` knots of the logistic kernel
const LOGISTIC_Y_DIFFS: [f64; 20] = [
    0.01523, 0.03314, 0.04848, 0.05987, 0.06703, 0.07028, 0.07030, 0.06791, 0.06391, 0.05896,
    0.05358, 0.04814, 0.04288, 0.03795, 0.03342, 0.02932, 0.02565, 0.02239, 0.01951, 0.01699,
];

/// Knots `[-z..., 0, z...]` where `z` is the normalized cumulative sum of `diffs`
fn symmetric_knots_from_diffs(diffs: &[f64]) -> Vec<f64> {
    let zeros = cumsum(diffs);
    let last = zeros.last().copied().unwrap_or(1.0);
    let zeros: Vec<f64> = zeros.iter().map(|z| z / last).collect();

    let mut knots: Vec<f64> = zeros.iter().rev().map(|z| -z).collect();
    knots.push(0.0);
    knots.extend_from_slice(&zeros);
    knots
}

/// Knots clustered toward `±1`: `[-1, z..., 0, -z..., 1]` with `z ∈ (-1, 0)`
fn endpoint_clustered_knots_from_diffs(diffs: &[f64]) -> Vec<f64> {
    let mut zeros = cumsum(diffs);
    let last = zeros.pop().unwrap_or(1.0);
    let zeros: Vec<f64> = zeros.iter().map(|z| z / last - 1.0).collect();

    let mut knots = Vec::with_capacity(2 * zeros.len() + 3);
    knots.push(-1.0);
    knots.extend_from_slice(&zeros);
    knots.push(0.0);
    knots.extend(zeros.iter().rev().map(|z| -z));
    knots.push(1.0);
    knots
}

fn cumsum(values: &[f64]) -> Vec<f64> {
    values
        .iter()
        .scan(0.0, |acc, &d| {
            *acc += d;
            Some(*acc)
        })
        .collect()
}

/// Regularized bosonic kernel
///
/// `K(x, y) = y exp(-Λy(x + 1)/2) / (exp(-Λy) - 1)`, with the removable
/// singularity at `y = 0` replaced by its limit `-1/Λ`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegularizedBoseKernel {
    lambda: f64,
}

impl RegularizedBoseKernel {
    pub fn new(lambda: f64) -> Self {
        Self { lambda }
    }

    // |v| / expm1(-|v|), tending to -1 as v -> 0
    fn denominator<T: CustomNumeric>(abs_v: T) -> T {
        if abs_v.to_f64() >= 1e-200 {
            abs_v / (-abs_v).exp_m1()
        } else {
            -T::one()
        }
    }
}

impl KernelProperties for RegularizedBoseKernel {
    fn lambda(&self) -> f64 {
        self.lambda
    }

    fn compute<T: CustomNumeric>(&self, x: T, y: T) -> T {
        let (u_plus, u_minus, v) = compute_uv(self.lambda, x, y);
        let abs_v = v.abs();
        let numerator = if v >= T::zero() {
            (-abs_v * u_plus).exp()
        } else {
            (-abs_v * u_minus).exp()
        };
        numerator * Self::denominator(abs_v) / T::from_f64(self.lambda)
    }

    fn compute_reduced<T: CustomNumeric>(&self, x: T, y: T, symmetry: SymmetryType) -> T {
        let (u_plus, u_minus, v) = compute_uv(self.lambda, x, y);
        let prefactor = Self::denominator(v) / T::from_f64(self.lambda);
        match symmetry {
            SymmetryType::Even => prefactor * ((-v * u_plus).exp() + (-v * u_minus).exp()),
            SymmetryType::Odd => prefactor * (-v * u_minus).exp() * (-v * x).exp_m1(),
        }
    }

    fn ypower(&self) -> i32 {
        1
    }

    fn supports(&self, statistics: Statistics) -> bool {
        statistics.is_bosonic()
    }

    /// `1/ω`; only defined for bosons (NaN otherwise)
    fn weight(&self, statistics: Statistics, _beta: f64, omega: f64) -> f64 {
        match statistics {
            Statistics::Bosonic => 1.0 / omega,
            Statistics::Fermionic => f64::NAN,
        }
    }

    fn inv_weight(&self, statistics: Statistics, _beta: f64, omega: f64) -> f64 {
        match statistics {
            Statistics::Bosonic => omega,
            Statistics::Fermionic => f64::NAN,
        }
    }

    fn sve_hints(&self, epsilon: f64) -> SVEHints {
        let log10_lambda = self.lambda.log10();

        let nzeros_x = ((15.0 * log10_lambda).round() as i64).max(15) as usize;
        let diffs_x: Vec<f64> = (0..nzeros_x)
            .map(|i| 1.0 / (0.18 * i as f64).cosh())
            .collect();

        let nzeros_y = ((20.0 * log10_lambda).round() as i64).max(20) as usize;
        let diffs_y: Vec<f64> = (0..nzeros_y)
            .map(|i| {
                let i = i as f64;
                0.12 / (0.0337 * i * (i + 1.0).ln()).exp()
            })
            .collect();

        let l = log10_lambda.max(1.0);
        SVEHints {
            segments_x: symmetric_knots_from_diffs(&diffs_x),
            segments_y: endpoint_clustered_knots_from_diffs(&diffs_y),
            nsvals: (28.0 * l).round() as usize,
            ngauss: ngauss_for(epsilon),
        }
    }
}

/// Even or odd block of a centrosymmetric kernel on `[0, 1]²`
///
/// Singular functions of the block are continued to `[-1, 1]` with the
/// block's parity.
#[derive(Debug, Clone)]
pub struct ReducedKernel<K: KernelProperties> {
    inner: K,
    symmetry: SymmetryType,
}

impl<K: KernelProperties> ReducedKernel<K> {
    pub fn new(inner: K, symmetry: SymmetryType) -> Self {
        Self { inner, symmetry }
    }

    pub fn inner(&self) -> &K {
        &self.inner
    }

    pub fn symmetry(&self) -> SymmetryType {
        self.symmetry
    }

    pub fn compute<T: CustomNumeric>(&self, x: T, y: T) -> T {
        self.inner.compute_reduced(x, y, self.symmetry)
    }

    pub fn xrange(&self) -> (f64, f64) {
        (0.0, self.inner.xrange().1)
    }

    pub fn yrange(&self) -> (f64, f64) {
        (0.0, self.inner.yrange().1)
    }

    pub fn sve_hints(&self, epsilon: f64) -> SVEHints {
        self.inner.sve_hints(epsilon).reduced()
    }
}

#[cfg(test)]
#[path = "kernel_tests.rs"]
mod tests;
