//! Discretization strategies for the SVE

use mdarray::DTensor;

use crate::error::{IrError, Result};
use crate::gauss::{legendre, refine_knots, Rule};
use crate::kernel::{KernelProperties, ReducedKernel, SVEHints, SymmetryType};
use crate::kernelmatrix::matrix_from_gauss;
use crate::numeric::CustomNumeric;
use crate::tsvd::SVDResult;

use super::result::SVEResult;
use super::utils::{extend_to_full_domain, merge_results, remove_weights, svd_to_polynomials, SveBlock};

/// Maximum number of bisections applied to a hinted panel
const REFINE_MAX_DEPTH: usize = 4;

/// Turns a kernel into matrices to decompose, and the decomposition back
/// into singular functions
pub trait SveStrategy<T: CustomNumeric> {
    /// Weighted discretizations, one per independent block
    fn matrices(&self) -> Vec<DTensor<T, 2>>;

    /// Build the expansion from the (truncated) SVD of every matrix, in the
    /// order returned by [`matrices`](Self::matrices)
    fn postprocess(&self, svds: Vec<SVDResult<T>>, epsilon: f64) -> Result<SVEResult>;
}

/// Gauss-Legendre sampling of one reduced kernel block on `[0, 1]²`
#[derive(Debug, Clone)]
pub struct SamplingSve<T, K: KernelProperties> {
    kernel: ReducedKernel<K>,
    knots_x: Vec<T>,
    knots_y: Vec<T>,
    gauss_x: Rule<T>,
    gauss_y: Rule<T>,
    rule: Rule<f64>,
}

impl<T: CustomNumeric, K: KernelProperties> SamplingSve<T, K> {
    /// `hints` are reduced hints (knots on `[0, 1]`)
    ///
    /// Panels on which the kernel is under-resolved at `epsilon` are
    /// bisected before the quadrature is built.
    pub fn new(kernel: ReducedKernel<K>, hints: &SVEHints, epsilon: f64) -> Result<Self> {
        if hints.ngauss == 0 {
            return Err(IrError::invalid("ngauss", hints.ngauss, "must be positive"));
        }
        let tol = epsilon.max(1e-14);
        let ymid = midpoints(&hints.segments_y);
        let xmid = midpoints(&hints.segments_x);
        let knots_x = refine_knots(&hints.segments_x, hints.ngauss, tol, REFINE_MAX_DEPTH, |x| {
            ymid.iter().map(|&y| kernel.compute(x, y)).sum()
        });
        let knots_y = refine_knots(&hints.segments_y, hints.ngauss, tol, REFINE_MAX_DEPTH, |y| {
            xmid.iter().map(|&x| kernel.compute(x, y)).sum()
        });

        let knots_x: Vec<T> = knots_x.into_iter().map(T::from_f64).collect();
        let knots_y: Vec<T> = knots_y.into_iter().map(T::from_f64).collect();
        let rule_t = legendre::<T>(hints.ngauss);
        let gauss_x = rule_t.piecewise(&knots_x)?;
        let gauss_y = rule_t.piecewise(&knots_y)?;

        Ok(Self {
            kernel,
            knots_x,
            knots_y,
            gauss_x,
            gauss_y,
            rule: legendre::<f64>(hints.ngauss),
        })
    }

    pub fn kernel(&self) -> &ReducedKernel<K> {
        &self.kernel
    }

    pub fn gauss_x(&self) -> &Rule<T> {
        &self.gauss_x
    }

    pub fn gauss_y(&self) -> &Rule<T> {
        &self.gauss_y
    }

    /// `sqrt(w_x) K sqrt(w_y)` on the composite rules
    pub fn matrix(&self) -> DTensor<T, 2> {
        matrix_from_gauss(&self.kernel, &self.gauss_x, &self.gauss_y).apply_weights_for_sve()
    }

    /// Singular functions of this block, continued to `[-1, 1]`
    pub fn postprocess_block(&self, svd: &SVDResult<T>) -> Result<SveBlock> {
        let symmetry = self.kernel.symmetry();
        let u = remove_weights(&svd.u, &self.gauss_x.w);
        let v = remove_weights(&svd.v, &self.gauss_y.w);
        let u = svd_to_polynomials(&u, &self.knots_x, &self.rule)?;
        let v = svd_to_polynomials(&v, &self.knots_y, &self.rule)?;
        Ok((
            extend_to_full_domain(u, symmetry)?,
            svd.s.iter().map(|s| s.to_f64()).collect(),
            extend_to_full_domain(v, symmetry)?,
        ))
    }
}

fn midpoints(knots: &[f64]) -> Vec<f64> {
    knots.windows(2).map(|w| 0.5 * (w[0] + w[1])).collect()
}

/// Even/odd decomposition of a centrosymmetric kernel
///
/// `K(x, y) = K(-x, -y)` makes the even and odd blocks on `[0, 1]²`
/// independent, halving the size of each SVD.
#[derive(Debug, Clone)]
pub struct CentrosymmSve<T, K: KernelProperties> {
    even: SamplingSve<T, K>,
    odd: SamplingSve<T, K>,
}

impl<T: CustomNumeric, K: KernelProperties> CentrosymmSve<T, K> {
    /// `hints_override` replaces the kernel's own full-domain hints
    pub fn new(kernel: K, epsilon: f64, hints_override: Option<&SVEHints>) -> Result<Self> {
        let hints = match hints_override {
            Some(hints) => hints.reduced(),
            None => kernel.sve_hints(epsilon).reduced(),
        };
        log::debug!(
            "SVE discretization: {} x-knots, {} y-knots, {} Gauss points, about {} singular values",
            hints.segments_x.len(),
            hints.segments_y.len(),
            hints.ngauss,
            hints.nsvals
        );
        let even = SamplingSve::new(ReducedKernel::new(kernel.clone(), SymmetryType::Even), &hints, epsilon)?;
        let odd = SamplingSve::new(ReducedKernel::new(kernel, SymmetryType::Odd), &hints, epsilon)?;
        Ok(Self { even, odd })
    }

    pub fn even(&self) -> &SamplingSve<T, K> {
        &self.even
    }

    pub fn odd(&self) -> &SamplingSve<T, K> {
        &self.odd
    }
}

impl<T: CustomNumeric, K: KernelProperties> SveStrategy<T> for CentrosymmSve<T, K> {
    fn matrices(&self) -> Vec<DTensor<T, 2>> {
        vec![self.even.matrix(), self.odd.matrix()]
    }

    fn postprocess(&self, svds: Vec<SVDResult<T>>, epsilon: f64) -> Result<SVEResult> {
        if svds.len() != 2 {
            return Err(IrError::shape("centrosymmetric SVD blocks", 2, svds.len()));
        }
        let blocks = vec![self.even.postprocess_block(&svds[0])?, self.odd.postprocess_block(&svds[1])?];
        merge_results(blocks, epsilon)
    }
}
