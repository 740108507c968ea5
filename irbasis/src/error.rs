//! Error type shared by every fallible operation in the crate

use crate::traits::Statistics;
use crate::tsvd::TsvdError;

/// Errors reported by basis construction, the SVE and the sampling transforms
#[derive(Debug, thiserror::Error)]
pub enum IrError {
    /// A parameter is outside its mathematical domain
    #[error("invalid parameter {name} = {value}: {reason}")]
    InvalidParameter {
        name: &'static str,
        value: String,
        reason: String,
    },

    /// Array sizes disagree with what the operation needs
    #[error("shape mismatch in {what}: expected {expected}, got {got}")]
    ShapeMismatch {
        what: &'static str,
        expected: usize,
        got: usize,
    },

    /// Caller-provided buffer is too short
    #[error("workspace too small: {required} elements required, {got} provided")]
    WorkspaceTooSmall { required: usize, got: usize },

    /// Matsubara index with the wrong parity for the statistics
    #[error("frequency n={n} is not allowed for {} statistics", .statistics.as_str())]
    InvalidFrequency { n: i64, statistics: Statistics },

    /// A numerical algorithm did not reach its target
    #[error("{what} did not converge: target {target:e}, achieved {achieved:e}")]
    NonConvergence {
        what: &'static str,
        target: f64,
        achieved: f64,
    },

    /// Failure inside the truncated SVD engine
    #[error(transparent)]
    Tsvd(#[from] TsvdError),

    /// Failure reported by the dense SVD backend
    #[error("dense SVD failed: {0}")]
    Svd(String),
}

pub type Result<T> = std::result::Result<T, IrError>;

impl IrError {
    pub(crate) fn invalid(name: &'static str, value: impl ToString, reason: impl Into<String>) -> Self {
        IrError::InvalidParameter {
            name,
            value: value.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn shape(what: &'static str, expected: usize, got: usize) -> Self {
        IrError::ShapeMismatch {
            what,
            expected,
            got,
        }
    }
}
