//! Gauss-Legendre quadrature rules
//!
//! The integral of `f(x)` over `[a, b]` is approximated by
//! `sum(f(x_i) * w_i)`, which converges superexponentially for smooth `f`.
//! Composite rules (one Gauss rule per panel) are what the SVE uses to
//! discretize the kernel.

use mdarray::DTensor;

use crate::error::{IrError, Result};
use crate::numeric::CustomNumeric;

/// Quadrature rule on `[a, b]`
///
/// `x_forward[i] = x[i] - a` and `x_backward[i] = b - x[i]` are kept
/// separately so that distances to the endpoints do not lose precision.
#[derive(Debug, Clone)]
pub struct Rule<T> {
    pub x: Vec<T>,
    pub w: Vec<T>,
    pub x_forward: Vec<T>,
    pub x_backward: Vec<T>,
    pub a: T,
    pub b: T,
}

impl<T: CustomNumeric> Rule<T> {
    pub fn new(x: Vec<T>, w: Vec<T>, a: T, b: T) -> Self {
        debug_assert_eq!(x.len(), w.len());
        let x_forward = x.iter().map(|&xi| xi - a).collect();
        let x_backward = x.iter().map(|&xi| b - xi).collect();
        Self {
            x,
            w,
            x_forward,
            x_backward,
            a,
            b,
        }
    }

    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    /// Affinely map the rule onto `[a, b]`
    pub fn reseat(&self, a: T, b: T) -> Self {
        let half = T::from_f64(0.5);
        let scaling = (b - a) / (self.b - self.a);
        let mid_old = (self.b + self.a) * half;
        let mid_new = (b + a) * half;
        Self {
            x: self
                .x
                .iter()
                .map(|&xi| scaling * (xi - mid_old) + mid_new)
                .collect(),
            w: self.w.iter().map(|&wi| wi * scaling).collect(),
            x_forward: self.x_forward.iter().map(|&xi| xi * scaling).collect(),
            x_backward: self.x_backward.iter().map(|&xi| xi * scaling).collect(),
            a,
            b,
        }
    }

    /// Multiply the weights by `factor`
    pub fn scale(&self, factor: T) -> Self {
        Self {
            w: self.w.iter().map(|&wi| wi * factor).collect(),
            ..self.clone()
        }
    }

    /// Composite rule: one copy of `self` per panel `[edges[i], edges[i+1]]`
    pub fn piecewise(&self, edges: &[T]) -> Result<Self> {
        if edges.len() < 2 {
            return Err(IrError::shape("quadrature edges", 2, edges.len()));
        }
        if edges.windows(2).any(|w| w[0] >= w[1]) {
            return Err(IrError::invalid(
                "edges",
                format!("{:?}", edges.iter().map(|e| e.to_f64()).collect::<Vec<_>>()),
                "panel edges must be strictly increasing",
            ));
        }
        let panels: Vec<Self> = edges
            .windows(2)
            .map(|w| self.reseat(w[0], w[1]))
            .collect();
        Ok(Self::join(&panels))
    }

    /// Concatenate contiguous rules, given in increasing order
    pub fn join(rules: &[Self]) -> Self {
        let (Some(first), Some(last)) = (rules.first(), rules.last()) else {
            return Self::new(Vec::new(), Vec::new(), -T::one(), T::one());
        };
        let a = first.a;
        let b = last.b;

        let n: usize = rules.iter().map(|r| r.len()).sum();
        let mut joined = Self {
            x: Vec::with_capacity(n),
            w: Vec::with_capacity(n),
            x_forward: Vec::with_capacity(n),
            x_backward: Vec::with_capacity(n),
            a,
            b,
        };
        for rule in rules {
            let shift_forward = rule.a - a;
            let shift_backward = b - rule.b;
            joined.x.extend_from_slice(&rule.x);
            joined.w.extend_from_slice(&rule.w);
            joined
                .x_forward
                .extend(rule.x_forward.iter().map(|&d| d + shift_forward));
            joined
                .x_backward
                .extend(rule.x_backward.iter().map(|&d| d + shift_backward));
        }
        joined
    }

    /// Change working precision
    pub fn convert<U: CustomNumeric>(&self) -> Rule<U> {
        let conv = |v: &[T]| v.iter().map(|&e| U::convert_from(e)).collect::<Vec<U>>();
        Rule {
            x: conv(&self.x),
            w: conv(&self.w),
            x_forward: conv(&self.x_forward),
            x_backward: conv(&self.x_backward),
            a: U::convert_from(self.a),
            b: U::convert_from(self.b),
        }
    }

    /// Approximate `∫ f` over `[a, b]`
    pub fn integrate(&self, f: impl Fn(T) -> T) -> T {
        self.x
            .iter()
            .zip(&self.w)
            .fold(T::zero(), |acc, (&xi, &wi)| acc + wi * f(xi))
    }
}

/// `P_n(x)` and `P_n'(x)` by the three-term recurrence
fn legendre_and_derivative<T: CustomNumeric>(n: usize, x: T) -> (T, T) {
    let mut p_prev = T::one();
    let mut p = x;
    if n == 0 {
        return (T::one(), T::zero());
    }
    for k in 2..=n {
        let kf = T::from_f64(k as f64);
        let p_next = (T::from_f64((2 * k - 1) as f64) * x * p - T::from_f64((k - 1) as f64) * p_prev) / kf;
        p_prev = p;
        p = p_next;
    }
    // (1 - x²) P_n' = n (P_{n-1} - x P_n)
    let dp = T::from_f64(n as f64) * (p_prev - x * p) / (T::one() - x * x);
    (p, dp)
}

/// `n`-point Gauss-Legendre rule on `[-1, 1]`
///
/// Nodes start from the asymptotic estimate `cos(π(i + 3/4)/(n + 1/2))` in
/// `f64` and are polished by Newton steps in the working precision.
pub fn legendre<T: CustomNumeric>(n: usize) -> Rule<T> {
    let mut x = vec![T::zero(); n];
    let mut w = vec![T::zero(); n];
    let eps = T::epsilon();

    for i in 0..n.div_ceil(2) {
        let guess = (std::f64::consts::PI * (i as f64 + 0.75) / (n as f64 + 0.5)).cos();
        let mut z = T::from_f64(guess);
        for _ in 0..20 {
            let (p, dp) = legendre_and_derivative(n, z);
            let step = p / dp;
            z = z - step;
            if step.abs() <= eps {
                break;
            }
        }
        let (_, dp) = legendre_and_derivative(n, z);
        let weight = T::from_f64(2.0) / ((T::one() - z * z) * dp * dp);

        // Nodes from the guess come out in decreasing order
        x[i] = -z;
        x[n - 1 - i] = z;
        w[i] = weight;
        w[n - 1 - i] = weight;
    }
    if n % 2 == 1 {
        x[n / 2] = T::zero();
    }

    Rule::new(x, w, -T::one(), T::one())
}

/// Matrix `V[i, l] = P_l(x_i)` for `l = 0..=degree`
pub fn legendre_vandermonde<T: CustomNumeric>(x: &[T], degree: usize) -> DTensor<T, 2> {
    let mut v = DTensor::<T, 2>::from_elem([x.len(), degree + 1], T::zero());
    for (i, &xi) in x.iter().enumerate() {
        v[[i, 0]] = T::one();
        if degree > 0 {
            v[[i, 1]] = xi;
        }
        for l in 2..=degree {
            let lf = l as f64;
            v[[i, l]] = (T::from_f64(2.0 * lf - 1.0) * xi * v[[i, l - 1]]
                - T::from_f64(lf - 1.0) * v[[i, l - 2]])
                / T::from_f64(lf);
        }
    }
    v
}

/// Map from values at the `n` Gauss nodes on `[-1, 1]` to Legendre coefficients
///
/// `C[l, i] = (l + 1/2) w_i P_l(x_i)`; exact for polynomials of degree `< n`.
pub fn legendre_collocation<T: CustomNumeric>(rule: &Rule<T>) -> DTensor<T, 2> {
    let n = rule.len();
    let vander = legendre_vandermonde(&rule.x, n.saturating_sub(1));
    DTensor::<T, 2>::from_fn([n, n], |idx| {
        let (l, i) = (idx[0], idx[1]);
        T::from_f64(l as f64 + 0.5) * rule.w[i] * vander[[i, l]]
    })
}

/// Bisect panels on which `f` is under-resolved
///
/// A panel is split when its `n`-point and `2n`-point integrals of `f`
/// differ by more than `tol` times the integral of `|f|` over the whole
/// domain. Splitting stops after `max_depth` levels.
pub fn refine_knots(knots: &[f64], n: usize, tol: f64, max_depth: usize, f: impl Fn(f64) -> f64) -> Vec<f64> {
    let coarse = legendre::<f64>(n);
    let fine = legendre::<f64>(2 * n);

    let scale: f64 = knots
        .windows(2)
        .map(|w| fine.reseat(w[0], w[1]).integrate(|x| f(x).abs()))
        .sum();
    let threshold = tol * scale.max(f64::MIN_POSITIVE);

    let mut refined = vec![knots[0]];
    let mut stack: Vec<(f64, f64, usize)> = knots.windows(2).rev().map(|w| (w[0], w[1], 0)).collect();
    while let Some((a, b, depth)) = stack.pop() {
        let i_coarse = coarse.reseat(a, b).integrate(&f);
        let i_fine = fine.reseat(a, b).integrate(&f);
        let mid = 0.5 * (a + b);
        if (i_coarse - i_fine).abs() > threshold && depth < max_depth && a < mid && mid < b {
            stack.push((mid, b, depth + 1));
            stack.push((a, mid, depth + 1));
        } else {
            refined.push(b);
        }
    }
    refined
}

#[cfg(test)]
#[path = "gauss_tests.rs"]
mod tests;
