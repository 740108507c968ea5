//! Sparse sampling in Matsubara frequencies
//!
//! The design matrix `A[i, l] = û_l(iν_i)` is complex. Fits go through the
//! real embedding of `A`, so one real SVD serves both the unconstrained
//! problem and the positive-only problem, where the coefficients are real
//! and only `n ≥ 0` is sampled.

use std::marker::PhantomData;

use faer::Mat;
use mdarray::{DTensor, DynRank, Tensor};
use num_complex::Complex64;

use crate::basis_trait::Basis;
use crate::error::{IrError, Result};
use crate::fitter::RealFitter;
use crate::freq::MatsubaraFreq;
use crate::gemm::{to_faer, zgemm_into};
use crate::sampling::{axis_shape, batch_len, batch_of, check_exact, gather_axis, scatter_axis};
use crate::traits::StatisticsType;

/// How the default Matsubara sampling points are chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatsubaraSamplingOptions {
    /// Sample only `n ≥ 0`; coefficients are then constrained real
    pub positive_only: bool,
    /// Add oversampling points next to the outermost frequencies
    pub mitigate: bool,
}

impl Default for MatsubaraSamplingOptions {
    fn default() -> Self {
        Self {
            positive_only: false,
            mitigate: true,
        }
    }
}

impl MatsubaraSamplingOptions {
    pub fn positive_only(mut self, positive_only: bool) -> Self {
        self.positive_only = positive_only;
        self
    }

    pub fn mitigate(mut self, mitigate: bool) -> Self {
        self.mitigate = mitigate;
        self
    }
}

/// Sparse sampling in Matsubara frequencies
#[derive(Debug, Clone)]
pub struct MatsubaraSampling<S: StatisticsType> {
    sampling_points: Vec<MatsubaraFreq<S>>,
    positive_only: bool,
    /// `A[i, l] = û_l(iν_i)`, shape `(n_sampling_points, basis_size)`
    matrix: DTensor<Complex64, 2>,
    matrix_faer: Mat<Complex64>,
    /// Fitter over the real embedding of `matrix`
    fitter: RealFitter,
    _statistics: PhantomData<S>,
}

impl<S: StatisticsType> MatsubaraSampling<S> {
    /// Sampling at the default Matsubara frequencies of `basis`
    pub fn new<B: Basis<S>>(basis: &B, options: MatsubaraSamplingOptions) -> Result<Self> {
        let points = basis.default_matsubara_sampling_points(options.positive_only, options.mitigate)?;
        Self::with_sampling_points(basis, points, options.positive_only)
    }

    /// Sampling at caller-chosen frequencies
    ///
    /// With `positive_only`, every frequency must satisfy `n ≥ 0`.
    pub fn with_sampling_points<B: Basis<S>>(
        basis: &B,
        sampling_points: Vec<MatsubaraFreq<S>>,
        positive_only: bool,
    ) -> Result<Self> {
        if sampling_points.is_empty() {
            return Err(IrError::invalid("sampling_points", "[]", "at least one frequency is required"));
        }
        if positive_only {
            if let Some(freq) = sampling_points.iter().find(|f| f.n() < 0) {
                return Err(IrError::invalid("n", freq.n(), "positive-only sampling needs n >= 0"));
            }
        }

        let matrix = basis.evaluate_matsubara(&sampling_points);
        let fitter = RealFitter::new(&RealFitter::complex_embedding(&matrix, positive_only))?;
        log::debug!(
            "Matsubara sampling: {} frequencies (positive_only = {positive_only}), basis size {}, cond = {:.3e}",
            sampling_points.len(),
            basis.size(),
            fitter.cond()
        );
        Ok(Self {
            sampling_points,
            positive_only,
            matrix_faer: to_faer(&matrix),
            matrix,
            fitter,
            _statistics: PhantomData,
        })
    }

    pub fn sampling_points(&self) -> &[MatsubaraFreq<S>] {
        &self.sampling_points
    }

    pub fn n_sampling_points(&self) -> usize {
        self.sampling_points.len()
    }

    pub fn basis_size(&self) -> usize {
        self.matrix_faer.ncols()
    }

    pub fn positive_only(&self) -> bool {
        self.positive_only
    }

    pub fn matrix(&self) -> &DTensor<Complex64, 2> {
        &self.matrix
    }

    /// Condition number of the real least-squares problem solved by `fit`
    pub fn cond(&self) -> f64 {
        self.fitter.cond()
    }

    /// Length of the `workspace` slice [`fit_into`](Self::fit_into) needs
    /// for `batch` right-hand sides
    pub fn workspace_len(&self, batch: usize) -> usize {
        (2 * self.n_sampling_points() + self.fitter.n_cols()) * batch + self.fitter.workspace_len(batch)
    }

    /// Values `G(iν_i) = Σ_l A[i, l] g_l` at the sampling frequencies
    pub fn evaluate(&self, coeffs: &[Complex64]) -> Result<Vec<Complex64>> {
        check_exact("coefficients", self.basis_size(), coeffs.len())?;
        let mut out = vec![Complex64::new(0.0, 0.0); self.n_sampling_points()];
        self.evaluate_into(coeffs, &mut out)?;
        Ok(out)
    }

    /// Least-squares coefficients for values at the sampling frequencies
    ///
    /// For positive-only sampling the imaginary parts of the result are zero.
    pub fn fit(&self, values: &[Complex64]) -> Result<Vec<Complex64>> {
        check_exact("values", self.n_sampling_points(), values.len())?;
        let mut out = vec![Complex64::new(0.0, 0.0); self.basis_size()];
        let mut workspace = vec![0.0; self.workspace_len(1)];
        self.fit_into(values, &mut out, &mut workspace)?;
        Ok(out)
    }

    /// Evaluates row-major `(basis_size, batch)` coefficients into a
    /// row-major `(n_sampling_points, batch)` buffer
    pub fn evaluate_into(&self, coeffs: &[Complex64], out: &mut [Complex64]) -> Result<()> {
        let batch = batch_len("coefficients", self.basis_size(), coeffs.len())?;
        check_exact("output", self.n_sampling_points() * batch, out.len())?;
        zgemm_into(self.matrix_faer.as_ref(), coeffs, batch, out)
    }

    /// Fits row-major `(n_sampling_points, batch)` values into a row-major
    /// `(basis_size, batch)` buffer
    pub fn fit_into(&self, values: &[Complex64], out: &mut [Complex64], workspace: &mut [f64]) -> Result<()> {
        let n = self.n_sampling_points();
        let m = self.basis_size();
        let batch = batch_len("values", n, values.len())?;
        check_exact("output", m * batch, out.len())?;
        let required = self.workspace_len(batch);
        if workspace.len() < required {
            return Err(IrError::WorkspaceTooSmall {
                required,
                got: workspace.len(),
            });
        }

        let (y, rest) = workspace.split_at_mut(2 * n * batch);
        let (x, work) = rest.split_at_mut(self.fitter.n_cols() * batch);
        let (y_re, y_im) = y.split_at_mut(n * batch);
        for ((re, im), z) in y_re.iter_mut().zip(y_im.iter_mut()).zip(values) {
            *re = z.re;
            *im = z.im;
        }

        self.fitter.fit_into(y, x, work, batch)?;

        let (x_re, x_im) = x.split_at(m * batch);
        for (k, c) in out.iter_mut().enumerate() {
            let im = if self.positive_only { 0.0 } else { x_im[k] };
            *c = Complex64::new(x_re[k], im);
        }
        Ok(())
    }

    /// Evaluates along axis `dim` of `coeffs`; other axes are kept
    pub fn evaluate_nd(&self, coeffs: &Tensor<Complex64, DynRank>, dim: usize) -> Result<Tensor<Complex64, DynRank>> {
        let shape = axis_shape(coeffs, dim, self.basis_size())?;
        let x = gather_axis(coeffs, &shape, dim);
        let mut y = vec![Complex64::new(0.0, 0.0); self.n_sampling_points() * batch_of(&shape, dim)];
        self.evaluate_into(&x, &mut y)?;
        Ok(scatter_axis(&y, &shape, dim, self.n_sampling_points()))
    }

    /// Fits along axis `dim` of `values`; other axes are kept
    pub fn fit_nd(&self, values: &Tensor<Complex64, DynRank>, dim: usize) -> Result<Tensor<Complex64, DynRank>> {
        let shape = axis_shape(values, dim, self.n_sampling_points())?;
        let batch = batch_of(&shape, dim);
        let y = gather_axis(values, &shape, dim);
        let mut x = vec![Complex64::new(0.0, 0.0); self.basis_size() * batch];
        let mut workspace = vec![0.0; self.workspace_len(batch)];
        self.fit_into(&y, &mut x, &mut workspace)?;
        Ok(scatter_axis(&x, &shape, dim, self.basis_size()))
    }
}

#[cfg(test)]
#[path = "matsubara_sampling_tests.rs"]
mod tests;
