//! Discretization of a reduced kernel on a pair of composite Gauss rules

use mdarray::DTensor;
use rayon::prelude::*;

use crate::gauss::Rule;
use crate::kernel::{KernelProperties, ReducedKernel};
use crate::numeric::CustomNumeric;

/// Kernel values on the product of two quadrature grids, together with
/// the rules that produced them
#[derive(Debug, Clone)]
pub struct DiscretizedKernel<T> {
    /// `matrix[[i, j]] = K(x_i, y_j)`
    pub matrix: DTensor<T, 2>,
    pub gauss_x: Rule<T>,
    pub gauss_y: Rule<T>,
}

impl<T: CustomNumeric> DiscretizedKernel<T> {
    pub fn nrows(&self) -> usize {
        self.gauss_x.len()
    }

    pub fn ncols(&self) -> usize {
        self.gauss_y.len()
    }

    /// `sqrt(w_x[i]) K(x_i, y_j) sqrt(w_y[j])`
    ///
    /// The singular vectors of this matrix are the quadrature-weighted
    /// samples of the singular functions.
    pub fn apply_weights_for_sve(&self) -> DTensor<T, 2> {
        let sqrt_wx: Vec<T> = self.gauss_x.w.iter().map(|&w| w.sqrt()).collect();
        let sqrt_wy: Vec<T> = self.gauss_y.w.iter().map(|&w| w.sqrt()).collect();
        DTensor::<T, 2>::from_fn([self.nrows(), self.ncols()], |idx| {
            sqrt_wx[idx[0]] * self.matrix[[idx[0], idx[1]]] * sqrt_wy[idx[1]]
        })
    }
}

/// Evaluate a reduced kernel on all pairs of quadrature nodes
///
/// Rows are filled in parallel.
pub fn matrix_from_gauss<T: CustomNumeric, K: KernelProperties>(
    kernel: &ReducedKernel<K>,
    gauss_x: &Rule<T>,
    gauss_y: &Rule<T>,
) -> DiscretizedKernel<T> {
    let rows: Vec<Vec<T>> = gauss_x
        .x
        .par_iter()
        .map(|&x| gauss_y.x.iter().map(|&y| kernel.compute(x, y)).collect())
        .collect();

    let matrix = DTensor::<T, 2>::from_fn([gauss_x.len(), gauss_y.len()], |idx| rows[idx[0]][idx[1]]);
    DiscretizedKernel {
        matrix,
        gauss_x: gauss_x.clone(),
        gauss_y: gauss_y.clone(),
    }
}

#[cfg(test)]
#[path = "kernelmatrix_tests.rs"]
mod tests;
