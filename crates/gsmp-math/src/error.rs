//! Error type for the numeric kernels.

use thiserror::Error;

/// Result alias for numeric kernel operations.
pub type NumericResult<T> = Result<T, NumericError>;

/// Failures reported by the numeric kernels.
///
/// Every iterative routine carries an iteration budget; running out of it is
/// reported here instead of looping forever.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum NumericError {
    /// Fox-Glynn weights cannot be computed for this Poisson rate.
    #[error("uniformization failed for rate {rate}: {reason}")]
    Uniformization { rate: f64, reason: String },

    /// Real root isolation could not separate or refine a root.
    #[error("root isolation failed on [{lower}, {upper}]: {reason}")]
    RootIsolation {
        lower: f64,
        upper: f64,
        reason: String,
    },

    /// A linear system has no unique solution.
    #[error("singular matrix at pivot column {column}")]
    Singular { column: usize },

    /// Matrix/vector dimensions do not agree.
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    Dimension { expected: usize, actual: usize },

    /// An argument is outside the routine's domain.
    #[error("invalid argument `{name}`: {reason}")]
    InvalidArgument { name: &'static str, reason: String },
}

impl NumericError {
    pub(crate) fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        NumericError::InvalidArgument {
            name,
            reason: reason.into(),
        }
    }
}
