//! Post-processing of the discretized SVD into singular functions

use mdarray::DTensor;

use crate::error::{IrError, Result};
use crate::gauss::Rule;
use crate::kernel::SymmetryType;
use crate::numeric::CustomNumeric;
use crate::poly::{PiecewiseLegendrePoly, PiecewiseLegendrePolyVector};

use super::result::SVEResult;

/// Undo the `sqrt(w)` row scaling applied before the SVD
///
/// Row `i` of `matrix` is divided by `sqrt(weights[i])`, turning weighted
/// singular vectors into samples of the singular functions.
pub fn remove_weights<T: CustomNumeric>(matrix: &DTensor<T, 2>, weights: &[T]) -> DTensor<T, 2> {
    let (m, n) = *matrix.shape();
    debug_assert_eq!(m, weights.len());
    let inv_sqrt: Vec<T> = weights.iter().map(|&w| T::one() / w.sqrt()).collect();
    DTensor::<T, 2>::from_fn([m, n], |idx| matrix[[idx[0], idx[1]]] * inv_sqrt[idx[0]])
}

/// One piecewise Legendre polynomial per column of `samples`
///
/// `samples` holds function values at the nodes of `rule` mapped into the
/// segments of `knots`, segment-major, one column per singular function.
pub fn svd_to_polynomials<T: CustomNumeric>(
    samples: &DTensor<T, 2>,
    knots: &[T],
    rule: &Rule<f64>,
) -> Result<Vec<PiecewiseLegendrePoly>> {
    let (nrows, ncols) = *samples.shape();
    let nseg = knots.len().saturating_sub(1);
    if nrows != nseg * rule.len() {
        return Err(IrError::shape("SVD rows", nseg * rule.len(), nrows));
    }
    let knots_f64: Vec<f64> = knots.iter().map(|&k| k.to_f64()).collect();

    (0..ncols)
        .map(|col| {
            let values: Vec<f64> = (0..nrows).map(|row| samples[[row, col]].to_f64()).collect();
            PiecewiseLegendrePoly::from_gauss_values(knots_f64.clone(), rule, &values, 0)
        })
        .collect()
}

/// Continue polynomials on `[0, 1]` to `[-1, 1]` with the given parity
///
/// The result is normalized on the full domain: both halves carry a factor
/// `1/sqrt(2)`. The mirrored segments reverse the local coordinate, which
/// multiplies the degree-`l` coefficient by `(-1)^l`.
pub fn extend_to_full_domain(
    polys: Vec<PiecewiseLegendrePoly>,
    symmetry: SymmetryType,
) -> Result<Vec<PiecewiseLegendrePoly>> {
    let sign = symmetry.sign() as f64;
    let norm = std::f64::consts::FRAC_1_SQRT_2;

    polys
        .into_iter()
        .map(|poly| {
            if poly.xmin() != 0.0 {
                return Err(IrError::invalid("xmin", poly.xmin(), "reduced functions must start at 0"));
            }
            let pos_knots = poly.knots();
            let nseg = poly.nsegments();
            let knots: Vec<f64> = pos_knots
                .iter()
                .rev()
                .map(|&k| -k)
                .chain(pos_knots[1..].iter().copied())
                .collect();

            let data = poly.data();
            let polyorder = poly.polyorder();
            let full = DTensor::<f64, 2>::from_fn([polyorder, 2 * nseg], |idx| {
                let (l, s) = (idx[0], idx[1]);
                if s < nseg {
                    let parity = if l % 2 == 0 { 1.0 } else { -1.0 };
                    sign * parity * norm * data[[l, nseg - 1 - s]]
                } else {
                    norm * data[[l, s - nseg]]
                }
            });
            PiecewiseLegendrePoly::new(full, knots, symmetry.sign())
        })
        .collect()
}

/// Flip `u_l` and `v_l` together so that `u_l(1) > 0`
pub fn canonicalize_signs(
    u: Vec<PiecewiseLegendrePoly>,
    v: Vec<PiecewiseLegendrePoly>,
) -> Result<(Vec<PiecewiseLegendrePoly>, Vec<PiecewiseLegendrePoly>)> {
    let mut u_out = Vec::with_capacity(u.len());
    let mut v_out = Vec::with_capacity(v.len());
    for (ul, vl) in u.into_iter().zip(v) {
        if ul.evaluate(ul.xmax())? < 0.0 {
            u_out.push(ul.scale_data(-1.0));
            v_out.push(vl.scale_data(-1.0));
        } else {
            u_out.push(ul);
            v_out.push(vl);
        }
    }
    Ok((u_out, v_out))
}

/// Singular triples of one symmetry block, already on the full domain
pub type SveBlock = (Vec<PiecewiseLegendrePoly>, Vec<f64>, Vec<PiecewiseLegendrePoly>);

/// Merge blocks into one expansion sorted by decreasing singular value
pub fn merge_results(blocks: Vec<SveBlock>, epsilon: f64) -> Result<SVEResult> {
    let mut triples: Vec<(f64, PiecewiseLegendrePoly, PiecewiseLegendrePoly)> = blocks
        .into_iter()
        .flat_map(|(u, s, v)| {
            s.into_iter()
                .zip(u)
                .zip(v)
                .map(|((sl, ul), vl)| (sl, ul, vl))
                .collect::<Vec<_>>()
        })
        .collect();
    // Stable, so ties keep the even block first
    triples.sort_by(|a, b| b.0.total_cmp(&a.0));

    let mut s = Vec::with_capacity(triples.len());
    let mut u = Vec::with_capacity(triples.len());
    let mut v = Vec::with_capacity(triples.len());
    for (sl, ul, vl) in triples {
        s.push(sl);
        u.push(ul);
        v.push(vl);
    }
    let (u, v) = canonicalize_signs(u, v)?;
    SVEResult::new(
        PiecewiseLegendrePolyVector::new(u)?,
        s,
        PiecewiseLegendrePolyVector::new(v)?,
        epsilon,
    )
}
