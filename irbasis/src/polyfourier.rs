//! Fourier transform of piecewise Legendre polynomials to Matsubara
//! frequencies
//!
//! For a polynomial `u` on `[-1, 1]` the transform is
//!
//! ```text
//! û(n) = 1/√2 ∫ exp(iπn(x + 1)/2) u(x) dx
//! ```
//!
//! Below `n_asymp` it is computed exactly from the Legendre moments
//! `∫ P_l(x) exp(iwx) dx = 2 i^l j_l(w)`. Above it, repeated integration
//! by parts gives an expansion in `1/(iπn/2)` whose coefficients are the
//! derivatives of `u` at the endpoints.

use std::f64::consts::{FRAC_1_SQRT_2, PI};
use std::marker::PhantomData;
use std::ops::Index;

use mdarray::DTensor;
use num_complex::Complex64;

use crate::error::{IrError, Result};
use crate::freq::MatsubaraFreq;
use crate::poly::{PiecewiseLegendrePoly, PiecewiseLegendrePolyVector};
use crate::special_functions::spherical_bessel_j;
use crate::traits::{Bosonic, Fermionic, Statistics, StatisticsType};

/// Reduced indices `0..GRID_LINEAR_LEN` are all searched
pub const GRID_LINEAR_LEN: i64 = 64;

/// Largest reduced index searched is `2^GRID_MAX_LOG2`
pub const GRID_MAX_LOG2: i32 = 25;

/// Density of the logarithmic part of the search grid
pub const GRID_POINTS_PER_OCTAVE: usize = 32;

/// Reduced-index grid on which sign changes and extrema are searched
///
/// All indices below 64, then a logarithmic grid up to `2^25`.
pub fn default_matsubara_grid() -> Vec<i64> {
    let lo = (GRID_LINEAR_LEN as f64).log2();
    let hi = GRID_MAX_LOG2 as f64;
    let count = GRID_POINTS_PER_OCTAVE * (GRID_MAX_LOG2 as usize - lo as usize) + 1;
    let mut grid: Vec<i64> = (0..GRID_LINEAR_LEN).collect();
    grid.extend((0..count).map(|k| {
        let e = lo + (hi - lo) * k as f64 / (count - 1) as f64;
        e.exp2().trunc() as i64
    }));
    grid.dedup();
    grid
}

/// Asymptotic model `û(n) ≈ Σ_m moments[m] / (iπn/2)^(m+1)`
#[derive(Debug, Clone)]
pub struct PowerModel {
    pub moments: Vec<f64>,
}

impl PowerModel {
    pub fn new(moments: Vec<f64>) -> Self {
        Self { moments }
    }

    /// Moments of `u` for statistics with `exp(iπn) = statsign`
    fn from_poly(poly: &PiecewiseLegendrePoly, statistics: Statistics) -> Result<Self> {
        let statsign = match statistics {
            Statistics::Fermionic => -1.0,
            Statistics::Bosonic => 1.0,
        };
        let right = poly.derivatives_at(poly.xmax())?;
        let left = poly.derivatives_at(poly.xmin())?;
        let moments = right
            .iter()
            .zip(&left)
            .enumerate()
            .map(|(m, (&r, &l))| {
                let sign = if m % 2 == 0 { 1.0 } else { -1.0 };
                sign * (statsign * r - l) * FRAC_1_SQRT_2
            })
            .collect();
        Ok(Self::new(moments))
    }

    pub fn evaluate(&self, n: i64) -> Complex64 {
        if n == 0 {
            return Complex64::new(0.0, 0.0);
        }
        let inv_iw = 1.0 / Complex64::new(0.0, PI / 2.0 * n as f64);
        // Horner
        let poly = self
            .moments
            .iter()
            .rev()
            .fold(Complex64::new(0.0, 0.0), |acc, &c| acc * inv_iw + c);
        inv_iw * poly
    }
}

/// Matsubara transform of one piecewise Legendre polynomial on `[-1, 1]`
#[derive(Debug, Clone)]
pub struct PiecewiseLegendreFT<S: StatisticsType> {
    poly: PiecewiseLegendrePoly,
    n_asymp: f64,
    model: PowerModel,
    _statistics: PhantomData<S>,
}

pub type FermionicPiecewiseLegendreFT = PiecewiseLegendreFT<Fermionic>;
pub type BosonicPiecewiseLegendreFT = PiecewiseLegendreFT<Bosonic>;

impl<S: StatisticsType> PiecewiseLegendreFT<S> {
    /// `|n| >= n_asymp` uses the asymptotic model; pass `f64::INFINITY` to
    /// always use the exact transform
    pub fn new(poly: PiecewiseLegendrePoly, n_asymp: f64) -> Result<Self> {
        if poly.domain() != (-1.0, 1.0) {
            return Err(IrError::invalid(
                "poly",
                format!("[{}, {}]", poly.xmin(), poly.xmax()),
                "Fourier transform needs a polynomial on [-1, 1]",
            ));
        }
        if n_asymp.is_nan() || n_asymp < 0.0 {
            return Err(IrError::invalid("n_asymp", n_asymp, "must be non-negative"));
        }
        let model = PowerModel::from_poly(&poly, S::STATISTICS)?;
        Ok(Self {
            poly,
            n_asymp,
            model,
            _statistics: PhantomData,
        })
    }

    pub fn poly(&self) -> &PiecewiseLegendrePoly {
        &self.poly
    }

    pub fn n_asymp(&self) -> f64 {
        self.n_asymp
    }

    pub fn model(&self) -> &PowerModel {
        &self.model
    }

    pub fn statistics(&self) -> Statistics {
        S::STATISTICS
    }

    pub fn evaluate(&self, freq: &MatsubaraFreq<S>) -> Complex64 {
        self.value_at(freq.n())
    }

    /// Evaluate at a raw index, checking its parity
    pub fn evaluate_n(&self, n: i64) -> Result<Complex64> {
        let freq = MatsubaraFreq::<S>::new(n)?;
        Ok(self.evaluate(&freq))
    }

    fn value_at(&self, n: i64) -> Complex64 {
        if n == 0 || (n as f64).abs() < self.n_asymp {
            self.exact(n)
        } else {
            self.model.evaluate(n)
        }
    }

    fn exact(&self, n: i64) -> Complex64 {
        let poly = &self.poly;
        let data = poly.data();
        let wred = PI / 4.0 * n as f64;
        let mut res = Complex64::new(0.0, 0.0);
        for (j, ((&xm, &dx), &norm)) in poly
            .segment_midpoints()
            .iter()
            .zip(poly.delta_x())
            .zip(poly.norms())
            .enumerate()
        {
            let w = wred * dx;
            let segment: Complex64 = (0..poly.polyorder()).map(|l| data[[l, j]] * legendre_moment(l, w)).sum();
            res += segment * phase(xm, n) / norm;
        }
        res * FRAC_1_SQRT_2
    }

    /// Real or imaginary part of `û(2m + ζ)`, whichever is not identically
    /// zero for the parity of `u`
    fn part_function(&self) -> Result<impl Fn(i64) -> f64 + '_> {
        let take_imag = match (self.poly.symm(), S::STATISTICS) {
            (1, Statistics::Fermionic) | (-1, Statistics::Bosonic) => true,
            (1, Statistics::Bosonic) | (-1, Statistics::Fermionic) => false,
            (symm, _) => {
                return Err(IrError::invalid("symm", symm, "sign changes need an even or odd function"));
            }
        };
        let zeta = S::STATISTICS.zeta();
        Ok(move |m: i64| {
            let value = self.value_at(2 * m + zeta);
            if take_imag {
                value.im
            } else {
                value.re
            }
        })
    }

    /// Frequencies at which `û` changes sign
    pub fn sign_changes(&self, positive_only: bool) -> Result<Vec<MatsubaraFreq<S>>> {
        let f = self.part_function()?;
        let reduced = find_all_discrete(&f, &default_matsubara_grid());
        self.to_frequencies(reduced, positive_only)
    }

    /// Frequencies at which `|û|` has a discrete local maximum
    pub fn find_extrema(&self, positive_only: bool) -> Result<Vec<MatsubaraFreq<S>>> {
        let f = self.part_function()?;
        let reduced = discrete_extrema(&f, &default_matsubara_grid());
        self.to_frequencies(reduced, positive_only)
    }

    fn to_frequencies(&self, reduced: Vec<i64>, positive_only: bool) -> Result<Vec<MatsubaraFreq<S>>> {
        let zeta = S::STATISTICS.zeta();
        let mut ns: Vec<i64> = reduced.into_iter().map(|m| 2 * m + zeta).collect();
        if !positive_only {
            ns = symmetrize_matsubara(&ns);
        }
        ns.into_iter().map(MatsubaraFreq::new).collect()
    }
}

/// `∫ P_l(x) exp(iwx) dx` over `[-1, 1]`
fn legendre_moment(l: usize, w: f64) -> Complex64 {
    let i_pow = match l % 4 {
        0 => Complex64::new(1.0, 0.0),
        1 => Complex64::new(0.0, 1.0),
        2 => Complex64::new(-1.0, 0.0),
        _ => Complex64::new(0.0, -1.0),
    };
    let value = 2.0 * i_pow * spherical_bessel_j(l, w.abs());
    if w < 0.0 {
        value.conj()
    } else {
        value
    }
}

/// `exp(iπn(xm + 1)/2)` with the integer part of `xm` reduced to a power
/// of `i`, so that large `n` does not lose the phase
fn phase(xm: f64, n: i64) -> Complex64 {
    let k = xm.round();
    let frac = xm - k;
    let quarter = (n.rem_euclid(4) * (k as i64 + 1).rem_euclid(4)).rem_euclid(4);
    let base = match quarter {
        0 => Complex64::new(1.0, 0.0),
        1 => Complex64::new(0.0, 1.0),
        2 => Complex64::new(-1.0, 0.0),
        _ => Complex64::new(0.0, -1.0),
    };
    base * Complex64::from_polar(1.0, PI / 2.0 * n as f64 * frac)
}

/// Mirror non-negative sorted indices to negative ones; a leading zero is
/// kept once
pub(crate) fn symmetrize_matsubara(ns: &[i64]) -> Vec<i64> {
    let mut out: Vec<i64> = ns.iter().rev().filter(|&&n| n != 0).map(|&n| -n).collect();
    out.extend_from_slice(ns);
    out
}

/// Grid points after which `f` changes sign, plus exact zeros
pub(crate) fn find_all_discrete(f: impl Fn(i64) -> f64, grid: &[i64]) -> Vec<i64> {
    let fx: Vec<f64> = grid.iter().map(|&x| f(x)).collect();
    let mut found: Vec<i64> = grid
        .iter()
        .zip(&fx)
        .filter(|(_, v)| **v == 0.0)
        .map(|(&x, _)| x)
        .collect();
    for i in 0..grid.len().saturating_sub(1) {
        let (fa, fb) = (fx[i], fx[i + 1]);
        if fa != 0.0 && fb != 0.0 && fa.is_sign_negative() != fb.is_sign_negative() {
            found.push(bisect_discrete(&f, grid[i], grid[i + 1], fa));
        }
    }
    found.sort_unstable();
    found
}

fn bisect_discrete(f: impl Fn(i64) -> f64, mut a: i64, mut b: i64, mut fa: f64) -> i64 {
    while b - a > 1 {
        let mid = a + (b - a) / 2;
        let fmid = f(mid);
        if fa.is_sign_negative() != fmid.is_sign_negative() {
            b = mid;
        } else {
            a = mid;
            fa = fmid;
        }
    }
    a
}

/// Discrete local maxima of `|f|` on an integer grid
///
/// A secant sign change between grid points brackets an extremum, which is
/// then located by bisection on the integers. The grid ends count when
/// `|f|` decreases inward or `f` changes sign there.
pub(crate) fn discrete_extrema(f: impl Fn(i64) -> f64, grid: &[i64]) -> Vec<i64> {
    let n = grid.len();
    if n < 2 {
        return grid.to_vec();
    }
    let fx: Vec<f64> = grid.iter().map(|&x| f(x)).collect();
    let absfx: Vec<f64> = fx.iter().map(|v| v.abs()).collect();
    let slope_negative: Vec<bool> = fx.windows(2).map(|w| (w[1] - w[0]).is_sign_negative()).collect();

    let mut res = Vec::new();
    let first_is_extremum = absfx[0] > absfx[1] || fx[0].is_sign_negative() != fx[1].is_sign_negative();
    if first_is_extremum {
        res.push(grid[0]);
    }
    for i in 0..slope_negative.len().saturating_sub(1) {
        if slope_negative[i] != slope_negative[i + 1] {
            res.push(bisect_discrete_extremum(&f, grid[i], grid[i + 2], absfx[i], absfx[i + 2]));
        }
    }
    let last_is_extremum =
        absfx[n - 1] > absfx[n - 2] || fx[n - 1].is_sign_negative() != fx[n - 2].is_sign_negative();
    if last_is_extremum {
        res.push(grid[n - 1]);
    }
    res.dedup();
    res
}

fn bisect_discrete_extremum(f: impl Fn(i64) -> f64, mut a: i64, mut b: i64, mut absf_a: f64, mut absf_b: f64) -> i64 {
    loop {
        let d = b - a;
        if d <= 1 {
            return if absf_a > absf_b { a } else { b };
        }
        if d == 2 {
            return a + 1;
        }
        let m = a + d / 2;
        let next = m + 1;
        let absf_m = f(m).abs();
        let absf_next = f(next).abs();
        if absf_m > absf_next {
            b = next;
            absf_b = absf_next;
        } else {
            a = m;
            absf_a = absf_m;
        }
    }
}

/// Matsubara transforms of a family of polynomials
#[derive(Debug, Clone)]
pub struct PiecewiseLegendreFTVector<S: StatisticsType> {
    polyvec: Vec<PiecewiseLegendreFT<S>>,
}

pub type FermionicPiecewiseLegendreFTVector = PiecewiseLegendreFTVector<Fermionic>;
pub type BosonicPiecewiseLegendreFTVector = PiecewiseLegendreFTVector<Bosonic>;

impl<S: StatisticsType> PiecewiseLegendreFTVector<S> {
    pub fn new(polys: &PiecewiseLegendrePolyVector, n_asymp: f64) -> Result<Self> {
        let polyvec = polys
            .iter()
            .map(|p| PiecewiseLegendreFT::new(p.clone(), n_asymp))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { polyvec })
    }

    pub fn size(&self) -> usize {
        self.polyvec.len()
    }

    pub fn is_empty(&self) -> bool {
        self.polyvec.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&PiecewiseLegendreFT<S>> {
        self.polyvec.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PiecewiseLegendreFT<S>> {
        self.polyvec.iter()
    }

    pub fn n_asymp(&self) -> f64 {
        self.polyvec.first().map_or(f64::INFINITY, |p| p.n_asymp)
    }

    pub fn slice(&self, range: std::ops::Range<usize>) -> Result<Self> {
        let polyvec = self
            .polyvec
            .get(range.clone())
            .ok_or_else(|| IrError::invalid("range", format!("{range:?}"), format!("size is {}", self.size())))?
            .to_vec();
        Ok(Self { polyvec })
    }

    pub fn evaluate_at(&self, freq: &MatsubaraFreq<S>) -> Vec<Complex64> {
        self.polyvec.iter().map(|p| p.evaluate(freq)).collect()
    }

    /// `[size, freqs.len()]` table of transforms
    pub fn evaluate_at_many(&self, freqs: &[MatsubaraFreq<S>]) -> DTensor<Complex64, 2> {
        DTensor::<Complex64, 2>::from_fn([self.size(), freqs.len()], |idx| {
            self.polyvec[idx[0]].evaluate(&freqs[idx[1]])
        })
    }
}

impl<S: StatisticsType> Index<usize> for PiecewiseLegendreFTVector<S> {
    type Output = PiecewiseLegendreFT<S>;

    fn index(&self, index: usize) -> &Self::Output {
        &self.polyvec[index]
    }
}

#[cfg(test)]
#[path = "polyfourier_tests.rs"]
mod tests;
