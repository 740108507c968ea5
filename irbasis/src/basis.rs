//! Finite temperature IR basis
//!
//! This module provides the `FiniteTempBasis` type which represents the
//! intermediate representation (IR) basis for a given temperature.

use std::ops::Range;
use std::sync::Arc;

use mdarray::DTensor;
use num_complex::Complex64;

use crate::error::{IrError, Result};
use crate::freq::MatsubaraFreq;
use crate::kernel::{KernelProperties, LogisticKernel};
use crate::poly::PiecewiseLegendrePolyVector;
use crate::polyfourier::PiecewiseLegendreFTVector;
use crate::sve::{compute_sve, SVEResult, SveOptions};
use crate::traits::{Bosonic, Fermionic, Statistics, StatisticsType};

/// Basis size from which one extra Matsubara point is placed inside the
/// outermost sampling frequencies
pub const MITIGATION_MIN_SIZE_INNER: usize = 20;

/// Basis size from which one extra Matsubara point is also placed outside
/// the outermost sampling frequencies
pub const MITIGATION_MIN_SIZE_OUTER: usize = 42;

/// Offset of the mitigation points, as a fraction of the outermost
/// reduced frequency
pub const MITIGATION_OFFSET: f64 = 0.025;

/// Finite temperature basis for imaginary time/frequency Green's functions
///
/// For a continuation kernel `K` from real frequencies `ω ∈ [-ωmax, ωmax]` to
/// imaginary time `τ ∈ [0, β]`, this type stores the truncated singular
/// value expansion or IR basis:
///
/// ```text
/// K(τ, ω) ≈ sum(u[l](τ) * s[l] * v[l](ω) for l in 0..L)
/// ```
///
/// The basis is obtained from the expansion of the kernel in reduced
/// variables `x = 2τ/β - 1`, `y = ω/ωmax` by rescaling. The expansion is
/// held behind an [`Arc`] and never modified, so fermionic and bosonic
/// bases may share one.
#[derive(Debug, Clone)]
pub struct FiniteTempBasis<S: StatisticsType, K: KernelProperties = LogisticKernel> {
    kernel: K,
    sve_result: Arc<SVEResult>,
    accuracy: f64,
    beta: f64,
    wmax: f64,
    /// Left singular functions on `τ ∈ [0, β]`
    u: PiecewiseLegendrePolyVector,
    /// Right singular functions on `ω ∈ [-ωmax, ωmax]`
    v: PiecewiseLegendrePolyVector,
    s: Vec<f64>,
    /// Fourier transforms of the retained `u`
    uhat: PiecewiseLegendreFTVector<S>,
    /// Fourier transforms of every `u` of the expansion
    uhat_full: PiecewiseLegendreFTVector<S>,
}

pub type FermionicBasis = FiniteTempBasis<Fermionic>;
pub type BosonicBasis = FiniteTempBasis<Bosonic>;

impl<S: StatisticsType> FiniteTempBasis<S, LogisticKernel> {
    /// IR basis of the logistic kernel with `Λ = β ωmax`
    ///
    /// # Arguments
    ///
    /// * `beta` - Inverse temperature (β > 0)
    /// * `wmax` - Frequency cutoff (ωmax ≥ 0)
    /// * `epsilon` - Relative accuracy; defaults to the best the working
    ///   precision can resolve
    /// * `max_size` - Maximum number of basis functions
    pub fn new(beta: f64, wmax: f64, epsilon: Option<f64>, max_size: Option<usize>) -> Result<Self> {
        check_beta(beta)?;
        if wmax.is_nan() || wmax < 0.0 {
            return Err(IrError::invalid("wmax", wmax, "frequency cutoff must be non-negative"));
        }
        Self::with_kernel(LogisticKernel::new(beta * wmax), beta, epsilon, max_size)
    }

    /// Exact expansion coefficients of a single pole at `omega`
    ///
    /// `G(τ) = -K(τ, ω) w(ω)` has `g_l = -s_l v_l(ω) w(ω)`, with `w = 1` for
    /// fermions and `w = 1/tanh(βω/2)` for bosons.
    pub fn single_pole_coefficients(&self, omega: f64) -> Result<Vec<f64>> {
        let weight = self.kernel.weight(S::STATISTICS, self.beta, omega);
        let v = self.v.evaluate_at(omega)?;
        Ok(self.s.iter().zip(&v).map(|(&s, &v)| -s * v * weight).collect())
    }
}

impl<S: StatisticsType, K: KernelProperties> FiniteTempBasis<S, K> {
    /// IR basis of an arbitrary kernel; `ωmax = Λ/β`
    pub fn with_kernel(kernel: K, beta: f64, epsilon: Option<f64>, max_size: Option<usize>) -> Result<Self> {
        check_beta(beta)?;
        check_kernel::<S, K>(&kernel)?;
        let options = SveOptions {
            epsilon,
            max_num_svals: max_size,
            ..SveOptions::default()
        };
        let sve_result = compute_sve(kernel.clone(), &options)?;
        Self::with_sve(kernel, beta, Arc::new(sve_result), epsilon, max_size)
    }

    /// Basis from a precomputed expansion of `kernel`
    ///
    /// Keeps the singular values with `s_l / s_0 > epsilon` (default: the
    /// accuracy of the expansion), at most `max_size` of them.
    pub fn with_sve(
        kernel: K,
        beta: f64,
        sve_result: Arc<SVEResult>,
        epsilon: Option<f64>,
        max_size: Option<usize>,
    ) -> Result<Self> {
        check_beta(beta)?;
        check_kernel::<S, K>(&kernel)?;
        if sve_result.is_empty() {
            return Err(IrError::invalid("sve_result", 0, "expansion has no singular values"));
        }
        if max_size == Some(0) {
            return Err(IrError::invalid("max_size", 0, "must be positive"));
        }
        let size = sve_result.cut(epsilon, max_size);
        Self::from_parts(kernel, beta, sve_result, size)
    }

    /// Rescale the leading `size` triples of `sve_result` to `(τ, ω)`
    fn from_parts(kernel: K, beta: f64, sve_result: Arc<SVEResult>, size: usize) -> Result<Self> {
        let lambda = kernel.lambda();
        let wmax = lambda / beta;
        let (u_sve, s_sve, v_sve) = sve_result.part(Some(0.0), Some(size))?;

        let s0 = sve_result.s[0];
        let accuracy = match sve_result.s.get(s_sve.len()) {
            Some(&next) => next / s0,
            None => s_sve[s_sve.len() - 1] / s0,
        };

        // τ = β/2 (x + 1), ω = ωmax y
        let u = u_sve.rescale_domain(0.0, beta)?;
        let v = if wmax > 0.0 {
            v_sve.rescale_domain(-wmax, wmax)?
        } else {
            // Degenerate frequency axis: v stays in the reduced variable
            v_sve
        };

        let ypower = kernel.ypower();
        let scale = (0.5 * beta * wmax).sqrt() * wmax.powi(-ypower);
        let s: Vec<f64> = s_sve.iter().map(|&x| scale * x).collect();

        // Fourier transforms are taken on [-1, 1]; sqrt(β) restores the
        // normalization of u(τ)
        let uhat_full = PiecewiseLegendreFTVector::<S>::new(&sve_result.u.scale_data(beta.sqrt()), kernel.conv_radius())?;
        let uhat = uhat_full.slice(0..s.len())?;

        log::debug!(
            "{} basis: β = {beta}, ωmax = {wmax}, {} functions, accuracy {accuracy:e}",
            S::STATISTICS.as_str(),
            s.len()
        );

        Ok(Self {
            kernel,
            sve_result,
            accuracy,
            beta,
            wmax,
            u,
            v,
            s,
            uhat,
            uhat_full,
        })
    }

    pub fn kernel(&self) -> &K {
        &self.kernel
    }

    pub fn sve_result(&self) -> &Arc<SVEResult> {
        &self.sve_result
    }

    pub fn beta(&self) -> f64 {
        self.beta
    }

    pub fn wmax(&self) -> f64 {
        self.wmax
    }

    /// Cutoff `Λ = β ωmax`
    pub fn lambda(&self) -> f64 {
        self.kernel.lambda()
    }

    pub fn statistics(&self) -> Statistics {
        S::STATISTICS
    }

    pub fn size(&self) -> usize {
        self.s.len()
    }

    /// Relative error of the expansion truncated to this basis
    pub fn accuracy(&self) -> f64 {
        self.accuracy
    }

    pub fn s(&self) -> &[f64] {
        &self.s
    }

    pub fn u(&self) -> &PiecewiseLegendrePolyVector {
        &self.u
    }

    pub fn v(&self) -> &PiecewiseLegendrePolyVector {
        &self.v
    }

    pub fn uhat(&self) -> &PiecewiseLegendreFTVector<S> {
        &self.uhat
    }

    /// `s_l / s_0` for every basis function
    pub fn significance(&self) -> Vec<f64> {
        let s0 = self.sve_result.s[0];
        self.sve_result.s[..self.size()].iter().map(|&s| s / s0).collect()
    }

    /// Basis restricted to the functions in `range`
    ///
    /// A leading range reuses the shared expansion; any other range builds
    /// a sliced copy of it. The SVE is never recomputed.
    pub fn truncate(&self, range: Range<usize>) -> Result<Self> {
        if range.start >= range.end || range.end > self.size() {
            return Err(IrError::invalid(
                "range",
                format!("{range:?}"),
                format!("must be a non-empty subrange of 0..{}", self.size()),
            ));
        }
        if range.start == 0 {
            return Self::from_parts(self.kernel.clone(), self.beta, Arc::clone(&self.sve_result), range.end);
        }
        let sve = &self.sve_result;
        let sliced = SVEResult::new(
            sve.u.slice(range.clone())?,
            sve.s[range.clone()].to_vec(),
            sve.v.slice(range.clone())?,
            sve.epsilon,
        )?;
        let size = sliced.len();
        Self::from_parts(self.kernel.clone(), self.beta, Arc::new(sliced), size)
    }

    /// `[τ.len(), size]` matrix of `u_l(τ_i)`
    pub fn evaluate_tau(&self, tau: &[f64]) -> Result<DTensor<f64, 2>> {
        let table = self.u.evaluate_at_many(tau)?;
        Ok(DTensor::<f64, 2>::from_fn([tau.len(), self.size()], |idx| table[[idx[1], idx[0]]]))
    }

    /// `[freqs.len(), size]` matrix of `û_l(iν_n)`
    pub fn evaluate_matsubara(&self, freqs: &[MatsubaraFreq<S>]) -> DTensor<Complex64, 2> {
        let table = self.uhat.evaluate_at_many(freqs);
        DTensor::<Complex64, 2>::from_fn([freqs.len(), self.size()], |idx| table[[idx[1], idx[0]]])
    }

    /// `[omega.len(), size]` matrix of `v_l(ω_i)`
    pub fn evaluate_omega(&self, omega: &[f64]) -> Result<DTensor<f64, 2>> {
        let table = self.v.evaluate_at_many(omega)?;
        Ok(DTensor::<f64, 2>::from_fn([omega.len(), self.size()], |idx| table[[idx[1], idx[0]]]))
    }

    /// Imaginary times at which `u_{L}` vanishes, or around the extrema of
    /// `u_{L-1}` when the expansion holds no further function
    pub fn default_tau_sampling_points(&self) -> Result<Vec<f64>> {
        let x = default_sampling_points(&self.sve_result.u, self.size())?;
        Ok(x.into_iter().map(|x| 0.5 * self.beta * (x + 1.0)).collect())
    }

    /// Real frequencies chosen like the `τ` points, from `v`
    pub fn default_omega_sampling_points(&self) -> Result<Vec<f64>> {
        let y = default_sampling_points(&self.sve_result.v, self.size())?;
        Ok(y.into_iter().map(|y| self.wmax * y).collect())
    }

    /// Sign changes of `û_L` (or extrema of `û_{L-1}`) on the Matsubara axis
    ///
    /// `L` is rounded up so that the selection has the parity of the
    /// statistics. With `mitigate`, large bases get extra points next to
    /// the outermost frequencies, see [`MITIGATION_MIN_SIZE_INNER`].
    pub fn default_matsubara_sampling_points(
        &self,
        positive_only: bool,
        mitigate: bool,
    ) -> Result<Vec<MatsubaraFreq<S>>> {
        let size = self.size();
        let mut l_requested = size;
        let statistics = S::STATISTICS;
        if (statistics.is_fermionic() && l_requested % 2 == 1) || (statistics.is_bosonic() && l_requested % 2 == 0) {
            l_requested += 1;
        }

        let mut freqs = if l_requested < self.uhat_full.size() {
            self.uhat_full[l_requested].sign_changes(positive_only)?
        } else {
            self.uhat_full[size - 1].find_extrema(positive_only)?
        };

        if statistics.is_bosonic() {
            freqs.push(MatsubaraFreq::new(0)?);
            freqs.sort();
            freqs.dedup();
        }

        let expected = if positive_only { l_requested.div_ceil(2) } else { l_requested };
        if freqs.len() != expected {
            log::warn!(
                "expected {expected} Matsubara sampling points for a basis of size {size}, found {}; \
                 sampling may be ill-conditioned",
                freqs.len()
            );
        }

        if mitigate {
            freqs = mitigate_matsubara_points(freqs, positive_only)?;
        }
        Ok(freqs)
    }
}

fn check_beta(beta: f64) -> Result<()> {
    if !(beta > 0.0) || !beta.is_finite() {
        return Err(IrError::invalid("beta", beta, "inverse temperature must be positive and finite"));
    }
    Ok(())
}

fn check_kernel<S: StatisticsType, K: KernelProperties>(kernel: &K) -> Result<()> {
    let lambda = kernel.lambda();
    if !lambda.is_finite() || lambda < 0.0 {
        return Err(IrError::invalid("lambda", lambda, "must be finite and non-negative"));
    }
    if kernel.ypower() != 0 && lambda == 0.0 {
        return Err(IrError::invalid("lambda", lambda, "kernel needs a positive cutoff"));
    }
    if !kernel.supports(S::STATISTICS) {
        return Err(IrError::invalid(
            "statistics",
            S::STATISTICS.as_str(),
            format!("not supported by {kernel:?}"),
        ));
    }
    Ok(())
}

/// Sampling points on `[-1, 1]` for the first `l` functions of `u`
fn default_sampling_points(u: &PiecewiseLegendrePolyVector, l: usize) -> Result<Vec<f64>> {
    let (Some(xmin), Some(xmax)) = (u.xmin(), u.xmax()) else {
        return Err(IrError::invalid("u", 0, "no functions to sample"));
    };
    if l == 0 || l > u.size() {
        return Err(IrError::invalid("l", l, format!("must lie in 1..={}", u.size())));
    }

    let points = if l < u.size() {
        u[l].roots()
    } else {
        // Extrema of the last function, plus one point between each
        // outermost extremum and the boundary
        let maxima = u[l - 1].deriv(1).roots();
        match (maxima.first(), maxima.last()) {
            (Some(&first), Some(&last)) => {
                let mut points = Vec::with_capacity(maxima.len() + 2);
                points.push(0.5 * (first + xmin));
                points.extend_from_slice(&maxima);
                points.push(0.5 * (last + xmax));
                points
            }
            _ => vec![0.5 * (xmin + xmax)],
        }
    };

    if points.len() != l {
        log::warn!(
            "expected {l} sampling points, found {}; sampling may be ill-conditioned",
            points.len()
        );
    }
    Ok(points)
}

/// Add points just inside (and for large sets, just outside) the
/// outermost frequencies
fn mitigate_matsubara_points<S: StatisticsType>(
    freqs: Vec<MatsubaraFreq<S>>,
    positive_only: bool,
) -> Result<Vec<MatsubaraFreq<S>>> {
    let ns: Vec<i64> = freqs.iter().map(|f| f.n()).collect();
    let outer: Vec<i64> = match (ns.first(), ns.last()) {
        (Some(&first), Some(&last)) if !positive_only => vec![first, last],
        (_, Some(&last)) => vec![last],
        _ => return Ok(freqs),
    };

    let mut out = ns;
    for &n in &outer {
        let diff = 2 * (MITIGATION_OFFSET * n.abs() as f64).round_ties_even() as i64;
        if out.len() >= MITIGATION_MIN_SIZE_INNER {
            out.push(n - n.signum() * diff);
        }
        if out.len() >= MITIGATION_MIN_SIZE_OUTER {
            out.push(n + n.signum() * diff);
        }
    }
    out.sort_unstable();
    out.dedup();
    out.into_iter().map(MatsubaraFreq::new).collect()
}

#[cfg(test)]
#[path = "basis_tests.rs"]
mod tests;
