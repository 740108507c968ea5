//! Matrix multiplication on row-major buffers, backed by faer
//!
//! Sampling transforms keep their data as row-major `(axis, batch)` slices
//! so that caller-owned buffers can be used directly as faer views.

use faer::linalg::matmul::matmul;
use faer::{Accum, Mat, MatMut, MatRef, Par};
use mdarray::DTensor;
use num_complex::Complex64;

use crate::error::{IrError, Result};

/// Products with fewer multiply-adds than this run on the calling thread
const PARALLEL_THRESHOLD: usize = 1 << 18;

fn parallelism(m: usize, n: usize, k: usize) -> Par {
    if m.saturating_mul(n).saturating_mul(k) >= PARALLEL_THRESHOLD {
        Par::rayon(0)
    } else {
        Par::Seq
    }
}

fn check_len(what: &'static str, expected: usize, got: usize) -> Result<()> {
    if expected != got {
        return Err(IrError::shape(what, expected, got));
    }
    Ok(())
}

/// `out = a · b`, with `b` a row-major `k × n` slice and `out` a row-major
/// `m × n` slice
pub(crate) fn gemm_into(a: MatRef<'_, f64>, b: &[f64], n: usize, out: &mut [f64]) -> Result<()> {
    let (m, k) = (a.nrows(), a.ncols());
    check_len("right-hand side", k * n, b.len())?;
    check_len("product", m * n, out.len())?;
    let b = MatRef::from_row_major_slice(b, k, n);
    let c = MatMut::from_row_major_slice_mut(out, m, n);
    matmul(c, Accum::Replace, a, b, 1.0, parallelism(m, n, k));
    Ok(())
}

/// Complex counterpart of [`gemm_into`]
pub(crate) fn zgemm_into(a: MatRef<'_, Complex64>, b: &[Complex64], n: usize, out: &mut [Complex64]) -> Result<()> {
    let (m, k) = (a.nrows(), a.ncols());
    check_len("right-hand side", k * n, b.len())?;
    check_len("product", m * n, out.len())?;
    let b = MatRef::from_row_major_slice(b, k, n);
    let c = MatMut::from_row_major_slice_mut(out, m, n);
    matmul(c, Accum::Replace, a, b, Complex64::new(1.0, 0.0), parallelism(m, n, k));
    Ok(())
}

/// Copy of an mdarray matrix as a faer matrix
pub(crate) fn to_faer<T: Copy>(a: &DTensor<T, 2>) -> Mat<T> {
    let (m, n) = *a.shape();
    Mat::from_fn(m, n, |i, j| a[[i, j]])
}
