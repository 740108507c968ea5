//! SVE result container

use crate::error::{IrError, Result};
use crate::poly::PiecewiseLegendrePolyVector;

/// Truncated singular value expansion `K(x, y) ≈ Σ_l u_l(x) s_l v_l(y)`
///
/// Singular values are strictly positive and non-increasing; `u` and `v`
/// live on `[-1, 1]`.
#[derive(Debug, Clone)]
pub struct SVEResult {
    pub u: PiecewiseLegendrePolyVector,
    pub s: Vec<f64>,
    pub v: PiecewiseLegendrePolyVector,
    /// Relative accuracy the expansion was computed for
    pub epsilon: f64,
}

impl SVEResult {
    pub fn new(
        u: PiecewiseLegendrePolyVector,
        s: Vec<f64>,
        v: PiecewiseLegendrePolyVector,
        epsilon: f64,
    ) -> Result<Self> {
        if u.size() != s.len() {
            return Err(IrError::shape("SVE u functions", s.len(), u.size()));
        }
        if v.size() != s.len() {
            return Err(IrError::shape("SVE v functions", s.len(), v.size()));
        }
        if s.iter().any(|&x| !(x > 0.0) || !x.is_finite()) {
            return Err(IrError::invalid("s", format!("{s:?}"), "singular values must be positive and finite"));
        }
        if s.windows(2).any(|w| w[0] < w[1]) {
            return Err(IrError::invalid("s", format!("{s:?}"), "singular values must be non-increasing"));
        }
        Ok(Self { u, s, v, epsilon })
    }

    pub fn len(&self) -> usize {
        self.s.len()
    }

    pub fn is_empty(&self) -> bool {
        self.s.is_empty()
    }

    /// Number of singular values with `s_l / s_0 > eps`, capped at `max_size`
    pub fn cut(&self, eps: Option<f64>, max_size: Option<usize>) -> usize {
        let eps = eps.unwrap_or(self.epsilon);
        let threshold = match self.s.first() {
            Some(&s0) => eps * s0,
            None => return 0,
        };
        let cut = self.s.iter().take_while(|&&x| x > threshold).count().max(1);
        max_size.map_or(cut, |m| cut.min(m))
    }

    /// Leading part of the expansion
    ///
    /// `eps` defaults to the accuracy the expansion was computed for.
    pub fn part(
        &self,
        eps: Option<f64>,
        max_size: Option<usize>,
    ) -> Result<(PiecewiseLegendrePolyVector, Vec<f64>, PiecewiseLegendrePolyVector)> {
        let cut = self.cut(eps, max_size);
        Ok((self.u.slice(0..cut)?, self.s[..cut].to_vec(), self.v.slice(0..cut)?))
    }
}
