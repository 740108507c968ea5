//! Piecewise Legendre polynomials
//!
//! A function on `[xmin, xmax]` is stored segment by segment as a Legendre
//! series in the local variable `x̃ = 2(x - xm_i)/Δx_i ∈ [-1, 1]`, normalized
//! so that the value is `sqrt(2/Δx_i) Σ_l data[[l, i]] P_l(x̃)`. With this
//! normalization an orthonormal set of functions on the segments has
//! orthonormal coefficient columns.

use std::ops::{Index, Range};

use mdarray::DTensor;

use crate::error::{IrError, Result};
use crate::gauss::{legendre, legendre_collocation, Rule};

/// A single piecewise Legendre polynomial
#[derive(Debug, Clone)]
pub struct PiecewiseLegendrePoly {
    /// Number of Legendre coefficients per segment
    polyorder: usize,
    xmin: f64,
    xmax: f64,
    knots: Vec<f64>,
    delta_x: Vec<f64>,
    /// Coefficients, `[degree, segment]`
    data: DTensor<f64, 2>,
    /// Parity about the domain midpoint: `1` even, `-1` odd, `0` none
    symm: i32,
    xm: Vec<f64>,
    inv_xs: Vec<f64>,
    norms: Vec<f64>,
}

impl PiecewiseLegendrePoly {
    /// Create a polynomial from `[polyorder, nsegments]` coefficients and
    /// `nsegments + 1` strictly increasing knots
    pub fn new(data: DTensor<f64, 2>, knots: Vec<f64>, symm: i32) -> Result<Self> {
        let (polyorder, nsegments) = *data.shape();
        if knots.len() != nsegments + 1 {
            return Err(IrError::shape("knots", nsegments + 1, knots.len()));
        }
        if polyorder == 0 || nsegments == 0 {
            return Err(IrError::invalid(
                "data",
                format!("{polyorder}x{nsegments}"),
                "need at least one segment and one coefficient",
            ));
        }
        if !knots.windows(2).all(|w| w[0] < w[1]) {
            return Err(IrError::invalid("knots", format!("{knots:?}"), "must be strictly increasing"));
        }
        if !matches!(symm, -1..=1) {
            return Err(IrError::invalid("symm", symm, "must be -1, 0 or 1"));
        }

        let delta_x: Vec<f64> = knots.windows(2).map(|w| w[1] - w[0]).collect();
        let xm: Vec<f64> = knots.windows(2).map(|w| 0.5 * (w[0] + w[1])).collect();
        let inv_xs: Vec<f64> = delta_x.iter().map(|&dx| 2.0 / dx).collect();
        let norms: Vec<f64> = inv_xs.iter().map(|&ix| ix.sqrt()).collect();

        Ok(Self {
            polyorder,
            xmin: knots[0],
            xmax: knots[nsegments],
            knots,
            delta_x,
            data,
            symm,
            xm,
            inv_xs,
            norms,
        })
    }

    /// Interpolate values sampled at the nodes of `rule` (a rule on
    /// `[-1, 1]`) mapped into every segment
    ///
    /// `values` is segment-major: `values[s * rule.len() + i]` belongs to
    /// node `i` of segment `s`.
    pub fn from_gauss_values(knots: Vec<f64>, rule: &Rule<f64>, values: &[f64], symm: i32) -> Result<Self> {
        let n = rule.len();
        let nseg = knots.len().saturating_sub(1);
        if values.len() != n * nseg {
            return Err(IrError::shape("gauss values", n * nseg, values.len()));
        }
        let cmat = legendre_collocation(rule);
        let data = DTensor::<f64, 2>::from_fn([n, nseg], |idx| {
            let (l, s) = (idx[0], idx[1]);
            let half_width = 0.5 * (knots[s + 1] - knots[s]);
            let c: f64 = (0..n).map(|i| cmat[[l, i]] * values[s * n + i]).sum();
            c * half_width.abs().sqrt()
        });
        Self::new(data, knots, symm)
    }

    /// Interpolate `f` with `polyorder` coefficients per segment
    pub fn interpolate(knots: Vec<f64>, polyorder: usize, f: impl Fn(f64) -> f64) -> Result<Self> {
        let rule = legendre::<f64>(polyorder);
        let values: Vec<f64> = knots
            .windows(2)
            .flat_map(|w| rule.reseat(w[0], w[1]).x)
            .map(&f)
            .collect();
        Self::from_gauss_values(knots, &rule, &values, 0)
    }

    /// Same knots and symmetry, new coefficients
    pub fn with_data(&self, data: DTensor<f64, 2>) -> Result<Self> {
        Self::new(data, self.knots.clone(), self.symm)
    }

    pub fn polyorder(&self) -> usize {
        self.polyorder
    }

    pub fn xmin(&self) -> f64 {
        self.xmin
    }

    pub fn xmax(&self) -> f64 {
        self.xmax
    }

    pub fn domain(&self) -> (f64, f64) {
        (self.xmin, self.xmax)
    }

    pub fn knots(&self) -> &[f64] {
        &self.knots
    }

    pub fn delta_x(&self) -> &[f64] {
        &self.delta_x
    }

    pub fn nsegments(&self) -> usize {
        self.delta_x.len()
    }

    pub fn data(&self) -> &DTensor<f64, 2> {
        &self.data
    }

    pub fn symm(&self) -> i32 {
        self.symm
    }

    pub fn norms(&self) -> &[f64] {
        &self.norms
    }

    pub(crate) fn segment_midpoints(&self) -> &[f64] {
        &self.xm
    }

    /// Segment index and local coordinate of `x`
    ///
    /// Points on an interior knot belong to the segment on their right.
    pub fn split(&self, x: f64) -> Result<(usize, f64)> {
        if !(self.xmin..=self.xmax).contains(&x) {
            return Err(IrError::invalid(
                "x",
                x,
                format!("outside domain [{}, {}]", self.xmin, self.xmax),
            ));
        }
        let i = self.knots[1..self.knots.len() - 1]
            .partition_point(|&k| k <= x)
            .min(self.nsegments() - 1);
        let x_tilde = ((x - self.xm[i]) * self.inv_xs[i]).clamp(-1.0, 1.0);
        Ok((i, x_tilde))
    }

    pub fn evaluate(&self, x: f64) -> Result<f64> {
        let (i, x_tilde) = self.split(x)?;
        Ok(self.evaluate_local(i, x_tilde))
    }

    pub fn evaluate_many(&self, xs: &[f64]) -> Result<Vec<f64>> {
        xs.iter().map(|&x| self.evaluate(x)).collect()
    }

    fn evaluate_local(&self, segment: usize, x_tilde: f64) -> f64 {
        let coeffs = (0..self.polyorder).map(|l| self.data[[l, segment]]);
        legendre_series(coeffs, x_tilde) * self.norms[segment]
    }

    /// `n`-th derivative
    ///
    /// Each derivative lowers the order of the local series by one and
    /// flips the parity.
    pub fn deriv(&self, n: usize) -> Self {
        let nseg = self.nsegments();
        let mut ddata = self.data.clone();
        for _ in 0..n {
            ddata = legder(&ddata);
        }
        for i in 0..nseg {
            let scale = self.inv_xs[i].powi(n as i32);
            for l in 0..ddata.shape().0 {
                ddata[[l, i]] *= scale;
            }
        }
        let symm = if n % 2 == 0 { self.symm } else { -self.symm };
        Self {
            polyorder: ddata.shape().0,
            data: ddata,
            symm,
            ..self.clone()
        }
    }

    /// Value and all non-vanishing derivatives at `x`
    pub fn derivatives_at(&self, x: f64) -> Result<Vec<f64>> {
        let (i, x_tilde) = self.split(x)?;
        let mut out = Vec::with_capacity(self.polyorder);
        let mut poly = self.clone();
        for _ in 0..self.polyorder {
            out.push(poly.evaluate_local(i, x_tilde));
            poly = poly.deriv(1);
        }
        Ok(out)
    }

    /// `∫ p(x) f(x) dx` over the domain, by composite Gauss quadrature on
    /// the knots
    pub fn overlap(&self, f: impl Fn(f64) -> f64) -> f64 {
        let rule = legendre::<f64>(self.polyorder + 16);
        let mut total = 0.0;
        for i in 0..self.nsegments() {
            let seg = rule.reseat(self.knots[i], self.knots[i + 1]);
            for (j, (&x, &w)) in seg.x.iter().zip(&seg.w).enumerate() {
                let x_tilde = rule.x[j];
                total += w * self.evaluate_local(i, x_tilde) * f(x);
            }
        }
        total
    }

    /// Multiply all coefficients by `factor`
    pub fn scale_data(&self, factor: f64) -> Self {
        let (m, n) = *self.data.shape();
        let data = DTensor::<f64, 2>::from_fn([m, n], |idx| factor * self.data[[idx[0], idx[1]]]);
        Self { data, ..self.clone() }
    }

    /// Affine map of the domain onto `[a, b]`, keeping the coefficients
    ///
    /// Because of the per-segment normalization the mapped function is
    /// `sqrt((xmax - xmin)/(b - a))` times the original composed with the
    /// inverse map, so its L2 norm is preserved.
    pub fn rescale_domain(&self, a: f64, b: f64) -> Result<Self> {
        if !(a < b) {
            return Err(IrError::invalid("domain", format!("[{a}, {b}]"), "need a < b"));
        }
        let scale = (b - a) / (self.xmax - self.xmin);
        let nseg = self.nsegments();
        let knots: Vec<f64> = self
            .knots
            .iter()
            .enumerate()
            .map(|(i, &k)| match i {
                0 => a,
                i if i == nseg => b,
                _ => a + (k - self.xmin) * scale,
            })
            .collect();
        Self::new(self.data.clone(), knots, self.symm)
    }

    /// Roots inside the domain, ascending
    pub fn roots(&self) -> Vec<f64> {
        // Each segment is subdivided so that every subinterval holds at most
        // one root of a well-resolved function
        let per_segment = self.polyorder.max(2);
        let mut grid = Vec::with_capacity(self.nsegments() * per_segment + 1);
        for i in 0..self.nsegments() {
            for k in 0..per_segment {
                grid.push(self.knots[i] + self.delta_x[i] * k as f64 / per_segment as f64);
            }
        }
        grid.push(self.xmax);

        let f = |x: f64| {
            self.split(x)
                .map(|(i, xt)| self.evaluate_local(i, xt))
                .unwrap_or(f64::NAN)
        };
        find_all(f, &grid)
    }
}

/// `Σ_l c_l P_l(x)` via the three-term recurrence
pub(crate) fn legendre_series(coeffs: impl IntoIterator<Item = f64>, x: f64) -> f64 {
    let mut result = 0.0;
    let mut p_prev = 0.0;
    let mut p_curr = 1.0;
    for (l, c) in coeffs.into_iter().enumerate() {
        if l > 0 {
            let lf = l as f64;
            let p_next = ((2.0 * lf - 1.0) * x * p_curr - (lf - 1.0) * p_prev) / lf;
            p_prev = p_curr;
            p_curr = p_next;
        }
        result += c * p_curr;
    }
    result
}

/// Coefficients of the derivative of a Legendre series, column by column
fn legder(c: &DTensor<f64, 2>) -> DTensor<f64, 2> {
    let (n, ncols) = *c.shape();
    if n <= 1 {
        return DTensor::<f64, 2>::from_elem([1, ncols], 0.0);
    }
    let mut c = c.clone();
    let n = n - 1;
    let mut der = DTensor::<f64, 2>::from_elem([n, ncols], 0.0);
    for j in (2..=n).rev() {
        for col in 0..ncols {
            der[[j - 1, col]] = (2 * j - 1) as f64 * c[[j, col]];
            c[[j - 2, col]] += c[[j, col]];
        }
    }
    for col in 0..ncols {
        der[[0, col]] = c[[1, col]];
    }
    der
}

/// All roots of `f` on a grid: exact hits plus one bisected root per
/// sign change between neighbouring grid points
pub(crate) fn find_all(f: impl Fn(f64) -> f64, grid: &[f64]) -> Vec<f64> {
    let fx: Vec<f64> = grid.iter().map(|&x| f(x)).collect();
    let mut roots: Vec<f64> = grid
        .iter()
        .zip(&fx)
        .filter(|(_, &v)| v == 0.0)
        .map(|(&x, _)| x)
        .collect();

    for i in 0..grid.len().saturating_sub(1) {
        let (fa, fb) = (fx[i], fx[i + 1]);
        if fa == 0.0 || fb == 0.0 || fa.is_nan() || fb.is_nan() {
            continue;
        }
        if fa.is_sign_negative() != fb.is_sign_negative() {
            roots.push(bisect(&f, grid[i], grid[i + 1], fa));
        }
    }
    roots.sort_by(f64::total_cmp);
    roots
}

fn bisect(f: &impl Fn(f64) -> f64, mut a: f64, mut b: f64, mut fa: f64) -> f64 {
    loop {
        let mid = 0.5 * (a + b);
        if mid <= a || mid >= b {
            return mid;
        }
        let fm = f(mid);
        if fm == 0.0 {
            return mid;
        }
        if fa.is_sign_negative() != fm.is_sign_negative() {
            b = mid;
        } else {
            a = mid;
            fa = fm;
        }
    }
}

/// Family of piecewise Legendre polynomials on shared knots
#[derive(Debug, Clone)]
pub struct PiecewiseLegendrePolyVector {
    polyvec: Vec<PiecewiseLegendrePoly>,
}

impl PiecewiseLegendrePolyVector {
    /// All members must share the same knots
    pub fn new(polyvec: Vec<PiecewiseLegendrePoly>) -> Result<Self> {
        if let Some(first) = polyvec.first() {
            for p in &polyvec[1..] {
                if p.knots != first.knots {
                    return Err(IrError::invalid(
                        "polyvec",
                        format!("{} polynomials", polyvec.len()),
                        "members have different knots",
                    ));
                }
            }
        }
        Ok(Self { polyvec })
    }

    pub fn size(&self) -> usize {
        self.polyvec.len()
    }

    pub fn is_empty(&self) -> bool {
        self.polyvec.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&PiecewiseLegendrePoly> {
        self.polyvec.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PiecewiseLegendrePoly> {
        self.polyvec.iter()
    }

    pub fn last(&self) -> Option<&PiecewiseLegendrePoly> {
        self.polyvec.last()
    }

    /// Contiguous subset of the family
    pub fn slice(&self, range: Range<usize>) -> Result<Self> {
        if range.start > range.end || range.end > self.size() {
            return Err(IrError::invalid(
                "range",
                format!("{range:?}"),
                format!("out of bounds for {} functions", self.size()),
            ));
        }
        Ok(Self {
            polyvec: self.polyvec[range].to_vec(),
        })
    }

    /// `[p_0(x), p_1(x), ...]`
    pub fn evaluate_at(&self, x: f64) -> Result<Vec<f64>> {
        self.polyvec.iter().map(|p| p.evaluate(x)).collect()
    }

    /// `[size, xs.len()]` table of values
    pub fn evaluate_at_many(&self, xs: &[f64]) -> Result<DTensor<f64, 2>> {
        let columns = xs
            .iter()
            .map(|&x| self.evaluate_at(x))
            .collect::<Result<Vec<_>>>()?;
        Ok(DTensor::<f64, 2>::from_fn([self.size(), xs.len()], |idx| columns[idx[1]][idx[0]]))
    }

    pub fn map(&self, f: impl Fn(&PiecewiseLegendrePoly) -> Result<PiecewiseLegendrePoly>) -> Result<Self> {
        Self::new(self.polyvec.iter().map(f).collect::<Result<Vec<_>>>()?)
    }

    pub fn scale_data(&self, factor: f64) -> Self {
        Self {
            polyvec: self.polyvec.iter().map(|p| p.scale_data(factor)).collect(),
        }
    }

    pub fn rescale_domain(&self, a: f64, b: f64) -> Result<Self> {
        self.map(|p| p.rescale_domain(a, b))
    }

    pub fn xmin(&self) -> Option<f64> {
        self.polyvec.first().map(|p| p.xmin)
    }

    pub fn xmax(&self) -> Option<f64> {
        self.polyvec.first().map(|p| p.xmax)
    }

    pub fn knots(&self) -> &[f64] {
        self.polyvec.first().map_or(&[], |p| p.knots())
    }

    pub fn symm(&self) -> Vec<i32> {
        self.polyvec.iter().map(|p| p.symm).collect()
    }

    /// Ascending roots of every member, merged with duplicates closer than
    /// `tolerance` removed
    pub fn roots(&self, tolerance: f64) -> Vec<f64> {
        let mut all: Vec<f64> = self.polyvec.iter().flat_map(|p| p.roots()).collect();
        all.sort_by(f64::total_cmp);
        all.dedup_by(|a, b| (*a - *b).abs() < tolerance);
        all
    }

    pub fn into_vec(self) -> Vec<PiecewiseLegendrePoly> {
        self.polyvec
    }
}

impl Index<usize> for PiecewiseLegendrePolyVector {
    type Output = PiecewiseLegendrePoly;

    fn index(&self, index: usize) -> &Self::Output {
        &self.polyvec[index]
    }
}

impl<'a> IntoIterator for &'a PiecewiseLegendrePolyVector {
    type Item = &'a PiecewiseLegendrePoly;
    type IntoIter = std::slice::Iter<'a, PiecewiseLegendrePoly>;

    fn into_iter(self) -> Self::IntoIter {
        self.polyvec.iter()
    }
}

#[cfg(test)]
#[path = "poly_tests.rs"]
mod tests;
