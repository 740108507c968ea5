//! Working precision, SVD strategy and options for the SVE

use twofloat::TwoFloat;

use crate::error::{IrError, Result};
use crate::kernel::SVEHints;
use crate::numeric::CustomNumeric;

/// Below this `ε` the automatic choice switches to double-double
pub const F64_EPSILON_THRESHOLD: f64 = 1e-8;

/// Below this `Λ` a single truncated SVD is accurate enough
pub const TWO_PASS_LAMBDA_THRESHOLD: f64 = 10.0;

/// Working precision of the discretized kernel and its SVD
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TworkType {
    Float64,
    /// Double-double (`TwoFloat`)
    Float64X2,
    /// `Float64X2` if `ε < 1e-8`, else `Float64`
    #[default]
    Auto,
}

impl TworkType {
    pub fn resolve(self, epsilon: f64) -> TworkType {
        match self {
            TworkType::Auto if epsilon < F64_EPSILON_THRESHOLD => TworkType::Float64X2,
            TworkType::Auto => TworkType::Float64,
            other => other,
        }
    }

    /// Smallest `ε` this precision can deliver: about the square root of
    /// its machine epsilon
    pub fn safe_epsilon(self) -> f64 {
        match self {
            // The true value is about 1.5e-8; 1e-8 is easier to remember
            TworkType::Float64 | TworkType::Auto => 1e-8,
            TworkType::Float64X2 => CustomNumeric::sqrt(<TwoFloat as CustomNumeric>::epsilon()).to_f64(),
        }
    }
}

/// How the discretized kernel is decomposed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SvdStrategy {
    /// One rank-revealing truncated SVD
    Direct,
    /// Truncated SVD followed by a second pass on the deflated residual
    TwoPass,
    /// `TwoPass` for `Λ >= 10`, else `Direct`
    #[default]
    Auto,
}

impl SvdStrategy {
    pub fn resolve(self, lambda: f64) -> SvdStrategy {
        match self {
            SvdStrategy::Auto if lambda >= TWO_PASS_LAMBDA_THRESHOLD => SvdStrategy::TwoPass,
            SvdStrategy::Auto => SvdStrategy::Direct,
            other => other,
        }
    }
}

/// Options for [`compute_sve`](super::compute_sve)
///
/// ```
/// use irbasis::sve::{SveOptions, TworkType};
///
/// let opts = SveOptions::default().epsilon(1e-10).twork(TworkType::Float64X2);
/// assert_eq!(opts.epsilon, Some(1e-10));
/// ```
#[derive(Debug, Clone, Default)]
pub struct SveOptions {
    /// Relative accuracy; `None` means the best the working precision allows
    pub epsilon: Option<f64>,
    pub twork: TworkType,
    pub svd_strategy: SvdStrategy,
    /// Keep at most this many singular values
    pub max_num_svals: Option<usize>,
    /// Use these full-domain hints instead of the kernel's own
    pub segments_override: Option<SVEHints>,
}

impl SveOptions {
    pub fn epsilon(mut self, epsilon: f64) -> Self {
        self.epsilon = Some(epsilon);
        self
    }

    pub fn twork(mut self, twork: TworkType) -> Self {
        self.twork = twork;
        self
    }

    pub fn svd_strategy(mut self, strategy: SvdStrategy) -> Self {
        self.svd_strategy = strategy;
        self
    }

    pub fn max_num_svals(mut self, n: usize) -> Self {
        self.max_num_svals = Some(n);
        self
    }

    pub fn segments_override(mut self, hints: SVEHints) -> Self {
        self.segments_override = Some(hints);
        self
    }
}

/// Effective accuracy and working precision for a requested `ε`
///
/// A missing `ε` resolves to the safe epsilon of the working precision.
/// Requests below it are raised to it and logged.
pub fn safe_epsilon(epsilon: Option<f64>, twork: TworkType) -> Result<(f64, TworkType)> {
    let requested = match epsilon {
        Some(eps) if eps.is_nan() || eps <= 0.0 => {
            return Err(IrError::invalid("epsilon", eps, "must be positive"));
        }
        Some(eps) => eps,
        None => 0.0,
    };
    let twork = twork.resolve(requested);
    let safe = twork.safe_epsilon();

    if epsilon.is_some() && requested < safe {
        log::warn!(
            "requested epsilon {requested:e} is below the safe epsilon {safe:e} of {twork:?}; \
             the expansion saturates at {safe:e}"
        );
    }
    Ok((requested.max(safe), twork))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auto_precision() {
        assert_eq!(TworkType::Auto.resolve(1e-7), TworkType::Float64);
        assert_eq!(TworkType::Auto.resolve(1e-10), TworkType::Float64X2);
        assert_eq!(TworkType::Float64.resolve(1e-12), TworkType::Float64);
    }

    #[test]
    fn test_safe_epsilon_values() {
        let (eps, twork) = safe_epsilon(Some(1e-7), TworkType::Auto).unwrap();
        assert_eq!(twork, TworkType::Float64);
        assert_eq!(eps, 1e-7);

        let (eps, twork) = safe_epsilon(Some(1e-10), TworkType::Auto).unwrap();
        assert_eq!(twork, TworkType::Float64X2);
        assert_eq!(eps, 1e-10);

        // sqrt of the double-double epsilon
        let safe = TworkType::Float64X2.safe_epsilon();
        assert!((safe - f64::EPSILON).abs() < 1e-20);
    }

    #[test]
    fn test_saturation() {
        let (eps, twork) = safe_epsilon(Some(1e-20), TworkType::Auto).unwrap();
        assert_eq!(twork, TworkType::Float64X2);
        assert_eq!(eps, TworkType::Float64X2.safe_epsilon());

        let (eps, _) = safe_epsilon(Some(1e-12), TworkType::Float64).unwrap();
        assert_eq!(eps, 1e-8);

        let (eps, twork) = safe_epsilon(None, TworkType::Auto).unwrap();
        assert_eq!(twork, TworkType::Float64X2);
        assert_eq!(eps, TworkType::Float64X2.safe_epsilon());
    }

    #[test]
    fn test_invalid_epsilon() {
        assert!(safe_epsilon(Some(-1.0), TworkType::Auto).is_err());
        assert!(safe_epsilon(Some(0.0), TworkType::Auto).is_err());
        assert!(safe_epsilon(Some(f64::NAN), TworkType::Auto).is_err());
    }

    #[test]
    fn test_svd_strategy() {
        assert_eq!(SvdStrategy::Auto.resolve(1.0), SvdStrategy::Direct);
        assert_eq!(SvdStrategy::Auto.resolve(10.0), SvdStrategy::TwoPass);
        assert_eq!(SvdStrategy::Direct.resolve(1e4), SvdStrategy::Direct);
    }

    #[test]
    fn test_options_builder() {
        let opts = SveOptions::default()
            .epsilon(1e-6)
            .twork(TworkType::Float64)
            .svd_strategy(SvdStrategy::TwoPass)
            .max_num_svals(12);
        assert_eq!(opts.epsilon, Some(1e-6));
        assert_eq!(opts.twork, TworkType::Float64);
        assert_eq!(opts.svd_strategy, SvdStrategy::TwoPass);
        assert_eq!(opts.max_num_svals, Some(12));
        assert!(opts.segments_override.is_none());
    }
}
