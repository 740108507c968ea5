//! Least-squares fitter over a fixed real design matrix
//!
//! Solves `min ||A x - y||²` for many right-hand sides through the thin SVD
//! `A = U diag(s) Vᵀ`, computed once at construction. Complex problems are
//! handed to the fitter as their real embedding, see
//! [`RealFitter::complex_embedding`].

use std::sync::atomic::{AtomicBool, Ordering};

use faer::Mat;
use mdarray::DTensor;
use num_complex::Complex64;

use crate::error::{IrError, Result};
use crate::gemm::{gemm_into, to_faer};

/// Condition number above which fitting logs a warning
pub const COND_WARN_THRESHOLD: f64 = 1e8;

/// Real design matrix `A` (`n_rows × n_cols`) with its thin SVD
#[derive(Debug)]
pub(crate) struct RealFitter {
    matrix: Mat<f64>,
    /// `n_rows × rank`
    u: Mat<f64>,
    s: Vec<f64>,
    /// `n_cols × rank`
    v: Mat<f64>,
    warned: AtomicBool,
}

impl Clone for RealFitter {
    fn clone(&self) -> Self {
        Self {
            matrix: self.matrix.clone(),
            u: self.u.clone(),
            s: self.s.clone(),
            v: self.v.clone(),
            warned: AtomicBool::new(self.warned.load(Ordering::Relaxed)),
        }
    }
}

impl RealFitter {
    pub fn new(matrix: &DTensor<f64, 2>) -> Result<Self> {
        let (n_rows, n_cols) = *matrix.shape();
        if n_rows == 0 || n_cols == 0 {
            return Err(IrError::invalid(
                "matrix",
                format!("{n_rows}x{n_cols}"),
                "design matrix must not be empty",
            ));
        }
        if let Some(bad) = matrix.iter().find(|x| !x.is_finite()) {
            return Err(IrError::invalid("matrix", bad, "design matrix must be finite"));
        }

        let matrix = to_faer(matrix);
        let svd = matrix.thin_svd().map_err(|e| IrError::Svd(format!("{e:?}")))?;
        let s: Vec<f64> = svd.S().column_vector().iter().copied().collect();
        let u = svd.U().to_owned();
        let v = svd.V().to_owned();
        Ok(Self {
            matrix,
            u,
            s,
            v,
            warned: AtomicBool::new(false),
        })
    }

    /// `[[Re A, -Im A], [Im A, Re A]]`, acting on `[Re x; Im x]`
    ///
    /// With `real_coefficients` only the left block column `[Re A; Im A]`
    /// is kept, which constrains `x` to be real.
    pub fn complex_embedding(matrix: &DTensor<Complex64, 2>, real_coefficients: bool) -> DTensor<f64, 2> {
        let (n, m) = *matrix.shape();
        let cols = if real_coefficients { m } else { 2 * m };
        DTensor::<f64, 2>::from_fn([2 * n, cols], |idx| {
            let (i, j) = (idx[0] % n, idx[1] % m);
            let z = matrix[[i, j]];
            match (idx[0] < n, idx[1] < m) {
                (true, true) => z.re,
                (true, false) => -z.im,
                (false, true) => z.im,
                (false, false) => z.re,
            }
        })
    }

    pub fn n_rows(&self) -> usize {
        self.matrix.nrows()
    }

    pub fn n_cols(&self) -> usize {
        self.matrix.ncols()
    }

    /// Number of singular triples
    pub fn rank(&self) -> usize {
        self.s.len()
    }

    /// `s_max / s_min`; infinite for a rank-deficient matrix
    pub fn cond(&self) -> f64 {
        let smax = self.s.iter().copied().fold(0.0, f64::max);
        let smin = self.s.iter().copied().fold(f64::INFINITY, f64::min);
        if smin > 0.0 {
            smax / smin
        } else {
            f64::INFINITY
        }
    }

    /// Scratch length needed by [`fit_into`](Self::fit_into)
    pub fn workspace_len(&self, batch: usize) -> usize {
        self.rank() * batch
    }

    /// `out = A x` for `batch` right-hand sides stored row-major
    pub fn evaluate_into(&self, x: &[f64], out: &mut [f64], batch: usize) -> Result<()> {
        gemm_into(self.matrix.as_ref(), x, batch, out)
    }

    /// `out = V diag(1/s) Uᵀ y`, using `workspace` for `Uᵀ y`
    ///
    /// Directions with a singular value at the rounding level of `s_max`
    /// are dropped.
    pub fn fit_into(&self, y: &[f64], out: &mut [f64], workspace: &mut [f64], batch: usize) -> Result<()> {
        let required = self.workspace_len(batch);
        if workspace.len() < required {
            return Err(IrError::WorkspaceTooSmall {
                required,
                got: workspace.len(),
            });
        }
        self.warn_if_ill_conditioned();

        let cutoff = self.pinv_cutoff();
        let work = &mut workspace[..required];
        gemm_into(self.u.transpose(), y, batch, work)?;
        for (k, row) in work.chunks_exact_mut(batch.max(1)).enumerate() {
            let inv = if self.s[k] > cutoff { 1.0 / self.s[k] } else { 0.0 };
            row.iter_mut().for_each(|w| *w *= inv);
        }
        gemm_into(self.v.as_ref(), work, batch, out)
    }

    fn pinv_cutoff(&self) -> f64 {
        let smax = self.s.iter().copied().fold(0.0, f64::max);
        smax * f64::EPSILON * self.n_rows().max(self.n_cols()) as f64
    }

    fn warn_if_ill_conditioned(&self) {
        let cond = self.cond();
        if cond > COND_WARN_THRESHOLD && !self.warned.swap(true, Ordering::Relaxed) {
            log::warn!(
                "sampling matrix is ill-conditioned (cond = {cond:.3e} > {COND_WARN_THRESHOLD:e}); \
                 fitted coefficients may carry amplified errors"
            );
        }
    }
}

#[cfg(test)]
#[path = "fitter_tests.rs"]
mod tests;
