//! Sparse sampling in imaginary time
//!
//! [`TauSampling`] maps IR coefficients to values at a small set of
//! imaginary times and back. The sampling matrix `A[i, l] = u_l(τ_i)` is
//! factorized once at construction; every fit reuses that factorization.
//!
//! Batched data is handled as a row-major `(axis, batch)` layout: the
//! in-place variants take such slices directly, the `_nd` variants move
//! the chosen axis of a [`Tensor`] into that layout and back.

use std::marker::PhantomData;

use mdarray::{DTensor, DynRank, Shape, Tensor};
use num_complex::Complex64;

use crate::basis_trait::Basis;
use crate::error::{IrError, Result};
use crate::fitter::RealFitter;
use crate::traits::StatisticsType;

/// Sparse sampling in imaginary time
#[derive(Debug, Clone)]
pub struct TauSampling<S: StatisticsType> {
    sampling_points: Vec<f64>,
    /// `A[i, l] = u_l(τ_i)`, shape `(n_sampling_points, basis_size)`
    matrix: DTensor<f64, 2>,
    fitter: RealFitter,
    _statistics: PhantomData<S>,
}

impl<S: StatisticsType> TauSampling<S> {
    /// Sampling at the default imaginary times of `basis`
    pub fn new<B: Basis<S>>(basis: &B) -> Result<Self> {
        let points = basis.default_tau_sampling_points()?;
        Self::with_sampling_points(basis, points)
    }

    /// Sampling at caller-chosen imaginary times in `[0, β]`
    pub fn with_sampling_points<B: Basis<S>>(basis: &B, sampling_points: Vec<f64>) -> Result<Self> {
        if sampling_points.is_empty() {
            return Err(IrError::invalid("sampling_points", "[]", "at least one point is required"));
        }
        let beta = basis.beta();
        if let Some(&tau) = sampling_points.iter().find(|&&t| !(0.0..=beta).contains(&t)) {
            return Err(IrError::invalid("tau", tau, format!("must lie in [0, {beta}]")));
        }

        let matrix = basis.evaluate_tau(&sampling_points)?;
        let fitter = RealFitter::new(&matrix)?;
        log::debug!(
            "tau sampling: {} points, basis size {}, cond = {:.3e}",
            sampling_points.len(),
            basis.size(),
            fitter.cond()
        );
        Ok(Self {
            sampling_points,
            matrix,
            fitter,
            _statistics: PhantomData,
        })
    }

    pub fn sampling_points(&self) -> &[f64] {
        &self.sampling_points
    }

    pub fn n_sampling_points(&self) -> usize {
        self.sampling_points.len()
    }

    pub fn basis_size(&self) -> usize {
        self.fitter.n_cols()
    }

    pub fn matrix(&self) -> &DTensor<f64, 2> {
        &self.matrix
    }

    /// Condition number of the sampling matrix
    pub fn cond(&self) -> f64 {
        self.fitter.cond()
    }

    /// Length of the `workspace` slice [`fit_into`](Self::fit_into) needs
    /// for `batch` right-hand sides
    pub fn workspace_len(&self, batch: usize) -> usize {
        self.fitter.workspace_len(batch)
    }

    /// Values `G(τ_i) = Σ_l A[i, l] g_l` at the sampling points
    pub fn evaluate(&self, coeffs: &[f64]) -> Result<Vec<f64>> {
        check_exact("coefficients", self.basis_size(), coeffs.len())?;
        let mut out = vec![0.0; self.n_sampling_points()];
        self.evaluate_into(coeffs, &mut out)?;
        Ok(out)
    }

    /// Least-squares coefficients for values at the sampling points
    pub fn fit(&self, values: &[f64]) -> Result<Vec<f64>> {
        check_exact("values", self.n_sampling_points(), values.len())?;
        let mut out = vec![0.0; self.basis_size()];
        let mut workspace = vec![0.0; self.workspace_len(1)];
        self.fit_into(values, &mut out, &mut workspace)?;
        Ok(out)
    }

    pub fn evaluate_complex(&self, coeffs: &[Complex64]) -> Result<Vec<Complex64>> {
        check_exact("coefficients", self.basis_size(), coeffs.len())?;
        let x = interleave(coeffs);
        let mut y = vec![0.0; 2 * self.n_sampling_points()];
        self.fitter.evaluate_into(&x, &mut y, 2)?;
        Ok(deinterleave(&y))
    }

    pub fn fit_complex(&self, values: &[Complex64]) -> Result<Vec<Complex64>> {
        check_exact("values", self.n_sampling_points(), values.len())?;
        let y = interleave(values);
        let mut x = vec![0.0; 2 * self.basis_size()];
        let mut workspace = vec![0.0; self.workspace_len(2)];
        self.fitter.fit_into(&y, &mut x, &mut workspace, 2)?;
        Ok(deinterleave(&x))
    }

    /// Evaluates row-major `(basis_size, batch)` coefficients into a
    /// row-major `(n_sampling_points, batch)` buffer
    pub fn evaluate_into(&self, coeffs: &[f64], out: &mut [f64]) -> Result<()> {
        let batch = batch_len("coefficients", self.basis_size(), coeffs.len())?;
        check_exact("output", self.n_sampling_points() * batch, out.len())?;
        self.fitter.evaluate_into(coeffs, out, batch)
    }

    /// Fits row-major `(n_sampling_points, batch)` values into a row-major
    /// `(basis_size, batch)` buffer
    pub fn fit_into(&self, values: &[f64], out: &mut [f64], workspace: &mut [f64]) -> Result<()> {
        let batch = batch_len("values", self.n_sampling_points(), values.len())?;
        check_exact("output", self.basis_size() * batch, out.len())?;
        self.fitter.fit_into(values, out, workspace, batch)
    }

    /// Evaluates along axis `dim` of `coeffs`; other axes are kept
    pub fn evaluate_nd(&self, coeffs: &Tensor<f64, DynRank>, dim: usize) -> Result<Tensor<f64, DynRank>> {
        let shape = axis_shape(coeffs, dim, self.basis_size())?;
        let x = gather_axis(coeffs, &shape, dim);
        let mut y = vec![0.0; self.n_sampling_points() * batch_of(&shape, dim)];
        self.evaluate_into(&x, &mut y)?;
        Ok(scatter_axis(&y, &shape, dim, self.n_sampling_points()))
    }

    /// Fits along axis `dim` of `values`; other axes are kept
    pub fn fit_nd(&self, values: &Tensor<f64, DynRank>, dim: usize) -> Result<Tensor<f64, DynRank>> {
        let shape = axis_shape(values, dim, self.n_sampling_points())?;
        let batch = batch_of(&shape, dim);
        let y = gather_axis(values, &shape, dim);
        let mut x = vec![0.0; self.basis_size() * batch];
        let mut workspace = vec![0.0; self.workspace_len(batch)];
        self.fit_into(&y, &mut x, &mut workspace)?;
        Ok(scatter_axis(&x, &shape, dim, self.basis_size()))
    }
}

fn interleave(z: &[Complex64]) -> Vec<f64> {
    z.iter().flat_map(|z| [z.re, z.im]).collect()
}

fn deinterleave(x: &[f64]) -> Vec<Complex64> {
    x.chunks_exact(2).map(|p| Complex64::new(p[0], p[1])).collect()
}

pub(crate) fn check_exact(what: &'static str, expected: usize, got: usize) -> Result<()> {
    if expected != got {
        return Err(IrError::shape(what, expected, got));
    }
    Ok(())
}

/// Number of columns of a row-major `(axis, batch)` buffer of length `len`
pub(crate) fn batch_len(what: &'static str, axis: usize, len: usize) -> Result<usize> {
    if len == 0 || len % axis != 0 {
        let batch = len.div_ceil(axis).max(1);
        return Err(IrError::shape(what, axis * batch, len));
    }
    Ok(len / axis)
}

/// Shape of `t` after checking that axis `dim` exists and has length `expected`
pub(crate) fn axis_shape<T>(t: &Tensor<T, DynRank>, dim: usize, expected: usize) -> Result<Vec<usize>> {
    let shape: Vec<usize> = t.shape().with_dims(|d| d.to_vec());
    if dim >= shape.len() {
        return Err(IrError::invalid("dim", dim, format!("tensor has rank {}", shape.len())));
    }
    check_exact("sampling axis", expected, shape[dim])?;
    Ok(shape)
}

/// Product of all extents except `shape[dim]`
pub(crate) fn batch_of(shape: &[usize], dim: usize) -> usize {
    shape.iter().enumerate().filter(|&(d, _)| d != dim).map(|(_, &n)| n).product()
}

/// Multi-index of element `(a, b)` of the `(axis, batch)` layout
fn multi_index(shape: &[usize], dim: usize, a: usize, mut b: usize, idx: &mut [usize]) {
    for d in (0..shape.len()).rev() {
        if d == dim {
            idx[d] = a;
        } else {
            idx[d] = b % shape[d];
            b /= shape[d];
        }
    }
}

/// Row-major `(shape[dim], batch)` copy of `t`
pub(crate) fn gather_axis<T: Copy>(t: &Tensor<T, DynRank>, shape: &[usize], dim: usize) -> Vec<T> {
    let batch = batch_of(shape, dim);
    let mut idx = vec![0; shape.len()];
    let mut buf = Vec::with_capacity(shape[dim] * batch);
    for a in 0..shape[dim] {
        for b in 0..batch {
            multi_index(shape, dim, a, b, &mut idx);
            buf.push(t[&idx[..]]);
        }
    }
    buf
}

/// Inverse of [`gather_axis`], with axis `dim` resized to `n`
pub(crate) fn scatter_axis<T: Copy + Default>(buf: &[T], shape: &[usize], dim: usize, n: usize) -> Tensor<T, DynRank> {
    let mut shape = shape.to_vec();
    shape[dim] = n;
    let batch = batch_of(&shape, dim);
    let mut out = Tensor::<T, DynRank>::from_elem(shape.as_slice(), T::default());
    let mut idx = vec![0; shape.len()];
    for a in 0..n {
        for b in 0..batch {
            multi_index(&shape, dim, a, b, &mut idx);
            out[&idx[..]] = buf[a * batch + b];
        }
    }
    out
}

#[cfg(test)]
#[path = "sampling_tests.rs"]
mod tests;
