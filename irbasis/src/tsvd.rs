//! Truncated SVD in arbitrary working precision
//!
//! 1. Rank-revealing QR with column pivoting, `A P = Q R`, stopped once
//!    `|R_ii| < rtol |R_00|`.
//! 2. Unpivoted QR of the `n × k` factor `Rᵀ P₂ = Q₂ R₂`.
//! 3. One-sided (Hestenes) Jacobi SVD of the `k × k` triangle `R₂`.
//! 4. `A = (Q P₂ V₂) Σ (P Q₂ U₂)ᵀ`.
//!
//! Everything is generic over [`CustomNumeric`] so that the SVE can run in
//! double-double precision, which no dense linear-algebra backend offers.
//! Plain `f64` matrices go through faer instead, see [`tsvd_f64`].

use std::any::TypeId;

use faer::Mat;
use mdarray::DTensor;

use crate::numeric::CustomNumeric;

/// Errors of the truncated SVD
#[derive(Debug, thiserror::Error)]
pub enum TsvdError {
    #[error("cannot decompose an empty {rows}x{cols} matrix")]
    EmptyMatrix { rows: usize, cols: usize },

    #[error("relative tolerance must lie in [0, 1), got {rtol}")]
    InvalidTolerance { rtol: f64 },

    #[error("Jacobi SVD did not converge after {sweeps} sweeps (off-diagonal {off:e})")]
    NoConvergence { sweeps: usize, off: f64 },

    #[error("dense SVD failed: {0}")]
    Backend(String),
}

/// Thin SVD `A ≈ U diag(s) Vᵀ` with singular values in descending order
#[derive(Debug, Clone)]
pub struct SVDResult<T> {
    /// `m × rank`
    pub u: DTensor<T, 2>,
    pub s: Vec<T>,
    /// `n × rank`
    pub v: DTensor<T, 2>,
    pub rank: usize,
}

impl<T: CustomNumeric> SVDResult<T> {
    fn empty(m: usize, n: usize) -> Self {
        Self {
            u: DTensor::<T, 2>::from_elem([m, 0], T::zero()),
            s: Vec::new(),
            v: DTensor::<T, 2>::from_elem([n, 0], T::zero()),
            rank: 0,
        }
    }

    fn from_columns(u: &[Vec<T>], s: Vec<T>, v: &[Vec<T>], m: usize, n: usize) -> Self {
        Self {
            u: tensor_from_columns(u, m),
            rank: s.len(),
            s,
            v: tensor_from_columns(v, n),
        }
    }
}

impl SVDResult<f64> {
    /// The same triples in another working precision
    pub fn cast<T: CustomNumeric>(&self) -> SVDResult<T> {
        let (m, k) = *self.u.shape();
        let (n, _) = *self.v.shape();
        SVDResult {
            u: DTensor::<T, 2>::from_fn([m, k], |idx| T::from_f64(self.u[[idx[0], idx[1]]])),
            s: self.s.iter().map(|&s| T::from_f64(s)).collect(),
            v: DTensor::<T, 2>::from_fn([n, k], |idx| T::from_f64(self.v[[idx[0], idx[1]]])),
            rank: self.rank,
        }
    }
}

const MAX_SWEEPS: usize = 60;

/// Column-pivoted Householder QR in compact form
#[derive(Debug, Clone)]
pub struct QRPivoted<T> {
    /// Columns of the packed factorization: `R` on and above the diagonal,
    /// Householder vectors below it
    pub factors: Vec<Vec<T>>,
    pub taus: Vec<T>,
    /// Column `i` of `A P` is column `jpvt[i]` of `A`
    pub jpvt: Vec<usize>,
    pub nrows: usize,
}

fn dot<T: CustomNumeric>(a: &[T], b: &[T]) -> T {
    a.iter().zip(b).fold(T::zero(), |acc, (&x, &y)| acc + x * y)
}

fn norm<T: CustomNumeric>(a: &[T]) -> T {
    dot(a, a).sqrt()
}

fn max_norm<T: CustomNumeric>(cols: &[Vec<T>]) -> T {
    cols.iter().map(|c| norm(c)).fold(T::zero(), |acc, x| acc.max(x))
}

/// `Σ_l coef[l] basis[l]`, a vector of length `len`
fn combine<T: CustomNumeric>(basis: &[Vec<T>], coef: &[T], len: usize) -> Vec<T> {
    let mut out = vec![T::zero(); len];
    for (bcol, &c) in basis.iter().zip(coef) {
        for (o, &b) in out.iter_mut().zip(bcol) {
            *o = *o + c * b;
        }
    }
    out
}

/// `P x` for the permutation stored as `jpvt`
fn unpivot<T: CustomNumeric>(x: &[T], jpvt: &[usize]) -> Vec<T> {
    let mut out = vec![T::zero(); x.len()];
    for (&xi, &p) in x.iter().zip(jpvt) {
        out[p] = xi;
    }
    out
}

/// Generate a Householder reflector `H = I - τ v vᵀ` with `H x = β e₁`
///
/// On return `x[0] = β` and `x[1..]` holds `v[1..]` (`v[0] = 1` implicit).
fn reflector<T: CustomNumeric>(x: &mut [T]) -> T {
    let Some((&alpha, tail)) = x.split_first() else {
        return T::zero();
    };
    let xnorm = norm(tail);
    if xnorm == T::zero() {
        return T::zero();
    }
    let r = (alpha * alpha + xnorm * xnorm).sqrt();
    let beta = if alpha >= T::zero() { -r } else { r };
    let tau = (beta - alpha) / beta;
    let scale = T::one() / (alpha - beta);
    for e in x.iter_mut().skip(1) {
        *e = *e * scale;
    }
    x[0] = beta;
    tau
}

/// Apply `H = I - τ v vᵀ` (reflector stored in `v[1..]`) to `y`
fn apply_reflector<T: CustomNumeric>(v: &[T], tau: T, y: &mut [T]) {
    if tau == T::zero() {
        return;
    }
    let w = y[0] + dot(&v[1..], &y[1..]);
    let tw = tau * w;
    y[0] = y[0] - tw;
    for (yi, &vi) in y.iter_mut().skip(1).zip(&v[1..]) {
        *yi = *yi - tw * vi;
    }
}

/// Rank-revealing QR of the columns of an `m × n` matrix
///
/// Stops at the first step `i` where the largest remaining column norm is
/// below `rtol |R_00|`, and returns `i` as the numerical rank.
pub fn rrqr<T: CustomNumeric>(cols: Vec<Vec<T>>, nrows: usize, rtol: T) -> (QRPivoted<T>, usize) {
    let atol = rtol * max_norm(&cols);
    rrqr_abs(cols, nrows, atol)
}

/// [`rrqr`] with an absolute stopping threshold
///
/// Trailing column norms are downdated after every step and recomputed
/// once cancellation has eaten half of their digits.
fn rrqr_abs<T: CustomNumeric>(mut cols: Vec<Vec<T>>, nrows: usize, atol: T) -> (QRPivoted<T>, usize) {
    let n = cols.len();
    let kmax = nrows.min(n);
    let mut jpvt: Vec<usize> = (0..n).collect();
    let mut taus = vec![T::zero(); kmax];
    let mut pnorms: Vec<T> = cols.iter().map(|c| norm(c)).collect();
    let mut xnorms = pnorms.clone();
    let tol3z = T::epsilon().sqrt();
    let mut rank = kmax;

    for i in 0..kmax {
        let pvt = (i..n).fold(i, |best, j| if pnorms[j] > pnorms[best] { j } else { best });
        let best = pnorms[pvt];
        if best == T::zero() || best < atol {
            rank = i;
            break;
        }
        cols.swap(i, pvt);
        jpvt.swap(i, pvt);
        pnorms.swap(i, pvt);
        xnorms.swap(i, pvt);

        let (done, rest) = cols.split_at_mut(i + 1);
        let head = &mut done[i][i..];
        let tau = reflector(head);
        taus[i] = tau;
        for (j, col) in (i + 1..n).zip(rest.iter_mut()) {
            apply_reflector(head, tau, &mut col[i..]);
            if pnorms[j] == T::zero() {
                continue;
            }
            let ratio = col[i].abs() / pnorms[j];
            let temp = (T::one() - ratio * ratio).max(T::zero());
            let drift = pnorms[j] / xnorms[j];
            if temp * drift * drift <= tol3z {
                pnorms[j] = norm(&col[i + 1..]);
                xnorms[j] = pnorms[j];
            } else {
                pnorms[j] = pnorms[j] * temp.sqrt();
            }
        }
    }

    (
        QRPivoted {
            factors: cols,
            taus,
            jpvt,
            nrows,
        },
        rank,
    )
}

impl<T: CustomNumeric> QRPivoted<T> {
    /// First `k` columns of `Q`
    pub fn thin_q(&self, k: usize) -> Vec<Vec<T>> {
        let m = self.nrows;
        let mut q: Vec<Vec<T>> = (0..k)
            .map(|j| {
                let mut e = vec![T::zero(); m];
                e[j] = T::one();
                e
            })
            .collect();
        for i in (0..k).rev() {
            let v = &self.factors[i][i..];
            for col in q.iter_mut() {
                apply_reflector(v, self.taus[i], &mut col[i..]);
            }
        }
        q
    }

    /// Row `i` of the leading `k × n` block of `R`
    fn r_row(&self, i: usize) -> Vec<T> {
        self.factors
            .iter()
            .enumerate()
            .map(|(j, col)| if j >= i { col[i] } else { T::zero() })
            .collect()
    }

    /// Column `j` of the leading `k × n` block of `R`
    fn r_col(&self, j: usize, k: usize) -> Vec<T> {
        (0..k)
            .map(|i| if i <= j { self.factors[j][i] } else { T::zero() })
            .collect()
    }
}

/// One-sided Jacobi SVD of the columns `b` (each of length `nrows`)
///
/// Returns `(U, s, V)` with `U`, `V` as column lists, sorted by descending
/// `s`.
fn jacobi_svd<T: CustomNumeric>(
    mut b: Vec<Vec<T>>,
    nrows: usize,
) -> Result<(Vec<Vec<T>>, Vec<T>, Vec<Vec<T>>), TsvdError> {
    let k = b.len();
    let mut v: Vec<Vec<T>> = (0..k)
        .map(|j| {
            let mut e = vec![T::zero(); k];
            e[j] = T::one();
            e
        })
        .collect();
    let tol = T::epsilon() * T::from_f64((nrows.max(1) as f64).sqrt());
    let half = T::from_f64(0.5);

    let mut converged = k < 2;
    let mut off = 0.0_f64;
    for _sweep in 0..MAX_SWEEPS {
        if converged {
            break;
        }
        let mut rotated = false;
        off = 0.0;
        for p in 0..k {
            for q in (p + 1)..k {
                let alpha = dot(&b[p], &b[p]);
                let beta = dot(&b[q], &b[q]);
                let gamma = dot(&b[p], &b[q]);
                if gamma == T::zero() {
                    continue;
                }
                let scale = (alpha * beta).sqrt();
                let rel = (gamma.abs() / scale).to_f64();
                off = off.max(rel);
                if gamma.abs() <= tol * scale {
                    continue;
                }
                rotated = true;

                let zeta = (beta - alpha) * half / gamma;
                let root = (T::one() + zeta * zeta).sqrt();
                let t = if zeta >= T::zero() {
                    T::one() / (zeta + root)
                } else {
                    -T::one() / (-zeta + root)
                };
                let c = T::one() / (T::one() + t * t).sqrt();
                let s = c * t;
                rotate(&mut b, p, q, c, s);
                rotate(&mut v, p, q, c, s);
            }
        }
        converged = !rotated;
    }
    if !converged {
        return Err(TsvdError::NoConvergence {
            sweeps: MAX_SWEEPS,
            off,
        });
    }

    let sv: Vec<T> = b.iter().map(|col| norm(col)).collect();
    let mut order: Vec<usize> = (0..k).collect();
    order.sort_by(|&i, &j| sv[j].partial_cmp(&sv[i]).unwrap_or(std::cmp::Ordering::Equal));

    let mut u_out = Vec::with_capacity(k);
    let mut s_out = Vec::with_capacity(k);
    let mut v_out = Vec::with_capacity(k);
    for &j in &order {
        let s = sv[j];
        let inv = if s > T::zero() { T::one() / s } else { T::zero() };
        u_out.push(b[j].iter().map(|&e| e * inv).collect());
        s_out.push(s);
        v_out.push(v[j].clone());
    }
    Ok((u_out, s_out, v_out))
}

fn rotate<T: CustomNumeric>(cols: &mut [Vec<T>], p: usize, q: usize, c: T, s: T) {
    let (left, right) = cols.split_at_mut(q);
    let bp = &mut left[p];
    let bq = &mut right[0];
    for (x, y) in bp.iter_mut().zip(bq.iter_mut()) {
        let (xp, xq) = (*x, *y);
        *x = c * xp - s * xq;
        *y = s * xp + c * xq;
    }
}

fn columns_of<T: CustomNumeric>(a: &DTensor<T, 2>) -> Vec<Vec<T>> {
    let (m, n) = *a.shape();
    (0..n).map(|j| (0..m).map(|i| a[[i, j]]).collect()).collect()
}

fn tensor_from_columns<T: CustomNumeric>(cols: &[Vec<T>], nrows: usize) -> DTensor<T, 2> {
    DTensor::<T, 2>::from_fn([nrows, cols.len()], |idx| cols[idx[1]][idx[0]])
}

fn check_input<T: CustomNumeric>(a: &DTensor<T, 2>, rtol: T) -> Result<(), TsvdError> {
    let (m, n) = *a.shape();
    if m == 0 || n == 0 {
        return Err(TsvdError::EmptyMatrix { rows: m, cols: n });
    }
    let r = rtol.to_f64();
    if !(0.0..1.0).contains(&r) {
        return Err(TsvdError::InvalidTolerance { rtol: r });
    }
    Ok(())
}

/// Truncated SVD keeping the numerical rank revealed by QR at `rtol`
pub fn tsvd<T: CustomNumeric>(a: &DTensor<T, 2>, rtol: T) -> Result<SVDResult<T>, TsvdError> {
    check_input(a, rtol)?;
    let (m, _) = *a.shape();
    let cols = columns_of(a);
    let atol = rtol * max_norm(&cols);
    truncated_svd(cols, m, atol)
}

/// SVD of the matrix with columns `cols`, dropping the part of the pivoted
/// QR below `atol`
fn truncated_svd<T: CustomNumeric>(cols: Vec<Vec<T>>, m: usize, atol: T) -> Result<SVDResult<T>, TsvdError> {
    let n = cols.len();
    let (qr, k) = rrqr_abs(cols, m, atol);
    if k == 0 {
        return Ok(SVDResult::empty(m, n));
    }
    let q = qr.thin_q(k);

    let rt: Vec<Vec<T>> = (0..k).map(|i| qr.r_row(i)).collect();
    let (qr2, k2) = rrqr_abs(rt, n, T::zero());
    let q2 = qr2.thin_q(k2);
    let r2: Vec<Vec<T>> = (0..k).map(|j| qr2.r_col(j, k2)).collect();
    let (u2, s, v2) = jacobi_svd(r2, k2)?;

    let keep = s.iter().take_while(|&&x| x > T::zero()).count();
    let mut u = Vec::with_capacity(keep);
    let mut v = Vec::with_capacity(keep);
    for (u2col, v2col) in u2.iter().zip(&v2).take(keep) {
        // U = Q P₂ V₂
        u.push(combine(&q, &unpivot(v2col, &qr2.jpvt), m));
        // V = P Q₂ U₂
        v.push(unpivot(&combine(&q2, u2col, n), &qr.jpvt));
    }
    let s = s[..keep].to_vec();
    Ok(SVDResult::from_columns(&u, s, &v, m, n))
}

/// Truncated SVD of a double-precision matrix through faer
///
/// Keeps the singular triples with `s >= rtol s_0`.
pub fn tsvd_f64(a: &DTensor<f64, 2>, rtol: f64) -> Result<SVDResult<f64>, TsvdError> {
    check_input(a, rtol)?;
    let (m, n) = *a.shape();
    let svd = Mat::<f64>::from_fn(m, n, |i, j| a[[i, j]])
        .thin_svd()
        .map_err(|e| TsvdError::Backend(format!("{e:?}")))?;
    let s: Vec<f64> = svd.S().column_vector().iter().copied().collect();
    let smax = s.first().copied().unwrap_or(0.0);
    let rank = s.iter().take_while(|&&x| x > 0.0 && x >= rtol * smax).count();
    if rank == 0 {
        return Ok(SVDResult::empty(m, n));
    }
    let u = svd.U().to_owned();
    let v = svd.V().to_owned();
    Ok(SVDResult {
        u: DTensor::<f64, 2>::from_fn([m, rank], |idx| u[(idx[0], idx[1])]),
        s: s[..rank].to_vec(),
        v: DTensor::<f64, 2>::from_fn([n, rank], |idx| v[(idx[0], idx[1])]),
        rank,
    })
}

/// [`tsvd_f64`] when `T` is `f64`, [`tsvd`] otherwise
pub fn tsvd_native<T: CustomNumeric>(a: &DTensor<T, 2>, rtol: T) -> Result<SVDResult<T>, TsvdError> {
    if TypeId::of::<T>() == TypeId::of::<f64>() {
        let (m, n) = *a.shape();
        let a64 = DTensor::<f64, 2>::from_fn([m, n], |idx| a[[idx[0], idx[1]]].to_f64());
        return Ok(tsvd_f64(&a64, rtol.to_f64())?.cast());
    }
    tsvd(a, rtol)
}

/// Orthonormal basis of the span of `cols` (dependent columns dropped)
fn orthonormalize<T: CustomNumeric>(cols: Vec<Vec<T>>, nrows: usize) -> Vec<Vec<T>> {
    let (qr, k) = rrqr(cols, nrows, T::epsilon());
    qr.thin_q(k)
}

/// `Pᵀ A` for a column list `P`
fn project_left<T: CustomNumeric>(p: &[Vec<T>], a_cols: &[Vec<T>]) -> Vec<Vec<T>> {
    a_cols
        .iter()
        .map(|acol| p.iter().map(|pcol| dot(pcol, acol)).collect())
        .collect()
}

/// `(I - U Uᵀ) A (I - V Vᵀ)` for orthonormal column lists `U`, `V`
fn deflate<T: CustomNumeric>(a_cols: &[Vec<T>], u: &[Vec<T>], v: &[Vec<T>], m: usize) -> Vec<Vec<T>> {
    let coeffs = project_left(u, a_cols);
    let mut x_cols: Vec<Vec<T>> = a_cols
        .iter()
        .zip(&coeffs)
        .map(|(acol, c)| {
            let mut col = acol.clone();
            for (ucol, &cl) in u.iter().zip(c) {
                for (e, &ue) in col.iter_mut().zip(ucol) {
                    *e = *e - cl * ue;
                }
            }
            col
        })
        .collect();
    for vcol in v {
        let xv = combine(&x_cols, vcol, m);
        for (xc, &ve) in x_cols.iter_mut().zip(vcol) {
            for (e, &w) in xc.iter_mut().zip(&xv) {
                *e = *e - w * ve;
            }
        }
    }
    x_cols
}

/// Two-pass truncated SVD
///
/// A first [`tsvd_native`] captures the dominant subspace. The matrix is
/// then projected onto the orthogonal complement of the captured left and
/// right subspaces and decomposed again, so that the small singular triples
/// come from a deflated matrix instead of from the rounding tail of the
/// first factorization. The final triples are the SVD of `A` restricted to
/// the union of both subspaces, computed in the working precision.
pub fn tsvd_two_pass<T: CustomNumeric>(a: &DTensor<T, 2>, rtol: T) -> Result<SVDResult<T>, TsvdError> {
    check_input(a, rtol)?;
    let (m, n) = *a.shape();
    let a_cols = columns_of(a);
    let atol = rtol * max_norm(&a_cols);

    let first = tsvd_native(a, rtol)?;
    let u1 = orthonormalize(columns_of(&first.u), m);
    let v1 = orthonormalize(columns_of(&first.v), n);

    let second = truncated_svd(deflate(&a_cols, &u1, &v1, m), m, atol)?;
    log::trace!("two-pass SVD: first rank {}, second rank {}", first.rank, second.rank);

    let mut left = u1;
    left.extend(columns_of(&second.u));
    let mut right = v1;
    right.extend(columns_of(&second.v));
    let w = orthonormalize(left, m);
    let z = orthonormalize(right, n);
    if w.is_empty() || z.is_empty() {
        return Ok(SVDResult::empty(m, n));
    }

    // B = Wᵀ A Z, small and dense
    let wa = project_left(&w, &a_cols);
    let b_cols: Vec<Vec<T>> = z.iter().map(|zcol| combine(&wa, zcol, w.len())).collect();
    let inner = truncated_svd(b_cols, w.len(), atol)?;

    let u: Vec<Vec<T>> = columns_of(&inner.u).iter().map(|c| combine(&w, c, m)).collect();
    let v: Vec<Vec<T>> = columns_of(&inner.v).iter().map(|c| combine(&z, c, n)).collect();
    Ok(SVDResult::from_columns(&u, inner.s, &v, m, n))
}

#[cfg(test)]
#[path = "tsvd_tests.rs"]
mod tests;
