//! SVE driver: discretize, decompose, truncate, post-process

use mdarray::DTensor;
use rayon::prelude::*;
use twofloat::TwoFloat;

use crate::error::{IrError, Result};
use crate::kernel::KernelProperties;
use crate::numeric::CustomNumeric;
use crate::tsvd::{tsvd_native, tsvd_two_pass, SVDResult};

use super::result::SVEResult;
use super::strategy::{CentrosymmSve, SveStrategy};
use super::types::{safe_epsilon, SveOptions, SvdStrategy, TworkType};

/// Singular value expansion of a kernel
///
/// Works in the precision selected by `options.twork` and returns an
/// expansion whose singular values satisfy `s_l / s_0 > ε`, where `ε` is
/// the requested accuracy saturated at the safe epsilon of the working
/// precision.
///
/// ```
/// use irbasis::kernel::LogisticKernel;
/// use irbasis::sve::{compute_sve, SveOptions};
///
/// let sve = compute_sve(LogisticKernel::new(10.0), &SveOptions::default().epsilon(1e-6)).unwrap();
/// assert!(sve.s.len() > 5);
/// assert!(sve.s.iter().all(|&s| s / sve.s[0] > 1e-6));
/// ```
pub fn compute_sve<K: KernelProperties>(kernel: K, options: &SveOptions) -> Result<SVEResult> {
    let lambda = kernel.lambda();
    if !lambda.is_finite() || lambda < 0.0 {
        return Err(IrError::invalid("lambda", lambda, "must be finite and non-negative"));
    }
    let (epsilon, twork) = safe_epsilon(options.epsilon, options.twork)?;
    let strategy = options.svd_strategy.resolve(lambda);
    log::debug!("computing SVE for Λ = {lambda}, ε = {epsilon:e}, {twork:?}, {strategy:?}");

    match twork {
        TworkType::Float64X2 => compute_sve_in::<TwoFloat, K>(kernel, epsilon, strategy, options),
        _ => compute_sve_in::<f64, K>(kernel, epsilon, strategy, options),
    }
}

fn compute_sve_in<T: CustomNumeric, K: KernelProperties>(
    kernel: K,
    epsilon: f64,
    strategy: SvdStrategy,
    options: &SveOptions,
) -> Result<SVEResult> {
    let sve = CentrosymmSve::<T, K>::new(kernel, epsilon, options.segments_override.as_ref())?;
    let matrices = sve.matrices();
    let rtol = svd_rtol::<T>(epsilon);
    let svds = matrices
        .par_iter()
        .map(|a| compute_svd(a, rtol, strategy))
        .collect::<Result<Vec<_>>>()?;
    for (a, svd) in matrices.iter().zip(&svds) {
        log::debug!("SVE block {:?}: rank {}", a.shape(), svd.rank);
    }

    check_resolved(&matrices, &svds, epsilon)?;
    let svds = truncate(svds, epsilon, options.max_num_svals)?;
    let result = sve.postprocess(svds, epsilon)?;
    log::debug!("SVE kept {} singular values", result.len());
    Ok(result)
}

/// Cutoff of the rank-revealing QR in the block SVDs
///
/// `ε²/100` relative to the largest column, floored at 64 units of
/// roundoff of the working precision. Triples near `ε` are then resolved to about `ε` relative
/// accuracy while the factorization stops long before full rank.
pub fn svd_rtol<T: CustomNumeric>(epsilon: f64) -> T {
    T::from_f64((0.01 * epsilon * epsilon).max(64.0 * T::epsilon().to_f64()))
}

/// Truncated SVD of one block
///
/// `Auto` is expected to be resolved by the caller and is treated as
/// `Direct`. `f64` blocks are decomposed by faer.
pub fn compute_svd<T: CustomNumeric>(a: &DTensor<T, 2>, rtol: T, strategy: SvdStrategy) -> Result<SVDResult<T>> {
    let svd = match strategy {
        SvdStrategy::Direct | SvdStrategy::Auto => tsvd_native(a, rtol)?,
        SvdStrategy::TwoPass => tsvd_two_pass(a, rtol)?,
    };
    Ok(svd)
}

/// Reject decompositions that did not resolve the spectrum down to `ε`
///
/// A block whose numerical rank equals its full size, and whose smallest
/// singular value still lies above the cutoff, has been discretized too
/// coarsely to decide how many values are significant.
fn check_resolved<T: CustomNumeric>(matrices: &[DTensor<T, 2>], svds: &[SVDResult<T>], epsilon: f64) -> Result<()> {
    if let Some(bad) = svds.iter().flat_map(|svd| &svd.s).find(|s| !s.is_finite()) {
        return Err(IrError::NonConvergence {
            what: "SVE singular values",
            target: epsilon,
            achieved: bad.to_f64(),
        });
    }
    let smax = global_max(svds);
    for (a, svd) in matrices.iter().zip(svds) {
        let (m, n) = *a.shape();
        let Some(last) = svd.s.last().map(|s| s.to_f64()) else {
            continue;
        };
        if svd.rank == m.min(n) && last > epsilon * smax {
            return Err(IrError::NonConvergence {
                what: "SVE discretization",
                target: epsilon,
                achieved: last / smax,
            });
        }
    }
    Ok(())
}

fn global_max<T: CustomNumeric>(svds: &[SVDResult<T>]) -> f64 {
    svds.iter()
        .flat_map(|svd| svd.s.iter())
        .map(|s| s.to_f64())
        .fold(0.0, f64::max)
}

/// Drop singular triples with `s <= rtol * max(s)` across all blocks
///
/// With `max_num_svals`, at most that many triples survive overall.
pub fn truncate<T: CustomNumeric>(
    svds: Vec<SVDResult<T>>,
    rtol: f64,
    max_num_svals: Option<usize>,
) -> Result<Vec<SVDResult<T>>> {
    if !(0.0..=1.0).contains(&rtol) {
        return Err(IrError::invalid("rtol", rtol, "must lie in [0, 1]"));
    }
    if max_num_svals == Some(0) {
        return Err(IrError::invalid("max_num_svals", 0, "must be positive"));
    }

    let mut cutoff = rtol * global_max(&svds);
    if let Some(lmax) = max_num_svals {
        let mut all: Vec<f64> = svds.iter().flat_map(|svd| svd.s.iter().map(|s| s.to_f64())).collect();
        if lmax < all.len() {
            all.sort_by(|a, b| b.total_cmp(a));
            cutoff = cutoff.max(all[lmax]);
        }
    }

    Ok(svds
        .into_iter()
        .map(|svd| {
            let keep = svd.s.iter().take_while(|s| s.to_f64() > cutoff).count();
            keep_leading(svd, keep)
        })
        .collect())
}

fn keep_leading<T: CustomNumeric>(svd: SVDResult<T>, k: usize) -> SVDResult<T> {
    if k == svd.s.len() {
        return svd;
    }
    let (m, _) = *svd.u.shape();
    let (n, _) = *svd.v.shape();
    SVDResult {
        u: DTensor::<T, 2>::from_fn([m, k], |idx| svd.u[[idx[0], idx[1]]]),
        s: svd.s[..k].to_vec(),
        v: DTensor::<T, 2>::from_fn([n, k], |idx| svd.v[[idx[0], idx[1]]]),
        rank: k,
    }
}
