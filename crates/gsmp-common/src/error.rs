//! Error types for GSMP reduction.
//!
//! This module provides structured error handling with:
//! - Stable error codes for machine parsing
//! - Category classification for error grouping
//! - Remediation suggestions for humans
//! - Suggested actions for callers driving the reduction programmatically
//!
//! # Structured Output
//!
//! Errors serialize to structured JSON:
//! ```json
//! {
//!   "code": 32,
//!   "category": "numeric",
//!   "message": "approximation tolerance not reached: weibull(0.5, 1) bound 3.1e-5 > 1e-6 at degree 24",
//!   "recoverable": true,
//!   "suggested_action": "adjust_tolerance",
//!   "context": { "state": 4, "event": 1 }
//! }
//! ```
//!
//! Failures of a single (state, event) reduction are wrapped in
//! [`Error::Reduction`]; code, category and hints are those of the wrapped
//! cause.

use gsmp_math::NumericError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

use crate::id::{EventId, StateId};

/// Result type alias for GSMP reduction operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error categories for grouping related errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Reduction configuration errors.
    Config,
    /// Model, parameter and potato structure errors.
    Model,
    /// Numerical kernel failures (uniformization, roots, approximation).
    Numeric,
    /// Downstream solver errors.
    Solver,
    /// File I/O and serialization errors.
    Io,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorCategory::Config => write!(f, "config"),
            ErrorCategory::Model => write!(f, "model"),
            ErrorCategory::Numeric => write!(f, "numeric"),
            ErrorCategory::Solver => write!(f, "solver"),
            ErrorCategory::Io => write!(f, "io"),
        }
    }
}

/// Suggested actions in response to errors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestedAction {
    /// Fix the model or its parameters.
    FixModel,
    /// Loosen epsilon or raise the degree budget.
    AdjustTolerance,
    /// Raise an iteration budget in the configuration.
    RaiseBudget,
    /// Reset configuration to defaults.
    ResetConfig,
    /// Retry the operation.
    Retry,
    /// Abort the operation.
    Abort,
    /// Manual intervention required.
    ManualIntervention,
}

impl std::fmt::Display for SuggestedAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SuggestedAction::FixModel => write!(f, "fix_model"),
            SuggestedAction::AdjustTolerance => write!(f, "adjust_tolerance"),
            SuggestedAction::RaiseBudget => write!(f, "raise_budget"),
            SuggestedAction::ResetConfig => write!(f, "reset_config"),
            SuggestedAction::Retry => write!(f, "retry"),
            SuggestedAction::Abort => write!(f, "abort"),
            SuggestedAction::ManualIntervention => write!(f, "manual_intervention"),
        }
    }
}

/// Unified error type for GSMP reduction.
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors (10-19)
    #[error("configuration error: {0}")]
    Config(String),

    // Model errors (20-29)
    #[error("invalid parameter for {context}: {reason}")]
    InvalidParameter { context: String, reason: String },

    #[error("unsupported distribution: {0}")]
    UnsupportedDistribution(String),

    #[error("unknown event: {0}")]
    UnknownEvent(String),

    #[error("unknown state {state} (model has {num_states} states)")]
    UnknownState { state: usize, num_states: usize },

    #[error("reward evaluation failed: {0}")]
    RewardEvaluation(String),

    #[error("reduction inconsistency: {0}")]
    ReductionInconsistency(String),

    // Numeric errors (30-39)
    #[error("uniformization failed: {0}")]
    Uniformization(String),

    #[error("root isolation failed: {0}")]
    RootIsolation(String),

    #[error("approximation tolerance not reached: {0}")]
    ApproximationTolerance(String),

    #[error("numerical instability detected: {0}")]
    NumericalInstability(String),

    // Solver errors (40-49)
    #[error("solver failed: {0}")]
    Solver(String),

    #[error("reduction of event {event} at state {state} failed: {source}")]
    Reduction {
        state: StateId,
        event: EventId,
        #[source]
        source: Box<Error>,
    },

    // I/O errors (60-69)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Shorthand for [`Error::InvalidParameter`].
    pub fn invalid_parameter(context: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::InvalidParameter {
            context: context.into(),
            reason: reason.into(),
        }
    }

    /// Wrap `self` with the identity of the (state, event) pair that failed.
    pub fn at_pair(self, state: StateId, event: EventId) -> Self {
        Error::Reduction {
            state,
            event,
            source: Box::new(self),
        }
    }

    /// The innermost error, looking through [`Error::Reduction`] wrappers.
    pub fn root_cause(&self) -> &Error {
        match self {
            Error::Reduction { source, .. } => source.root_cause(),
            other => other,
        }
    }

    /// Returns the error code for this error type.
    ///
    /// Error codes are stable and grouped by category:
    /// - 10-19: Configuration errors
    /// - 20-29: Model errors
    /// - 30-39: Numeric errors
    /// - 40-49: Solver errors
    /// - 60-69: I/O errors
    pub fn code(&self) -> u32 {
        match self {
            Error::Config(_) => 10,
            Error::InvalidParameter { .. } => 20,
            Error::UnsupportedDistribution(_) => 21,
            Error::UnknownEvent(_) => 22,
            Error::UnknownState { .. } => 23,
            Error::RewardEvaluation(_) => 24,
            Error::ReductionInconsistency(_) => 25,
            Error::Uniformization(_) => 30,
            Error::RootIsolation(_) => 31,
            Error::ApproximationTolerance(_) => 32,
            Error::NumericalInstability(_) => 33,
            Error::Solver(_) => 40,
            Error::Reduction { source, .. } => source.code(),
            Error::Io(_) => 60,
            Error::Json(_) => 61,
        }
    }

    /// Returns the error category for grouping and filtering.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Config(_) => ErrorCategory::Config,

            Error::InvalidParameter { .. }
            | Error::UnsupportedDistribution(_)
            | Error::UnknownEvent(_)
            | Error::UnknownState { .. }
            | Error::RewardEvaluation(_)
            | Error::ReductionInconsistency(_) => ErrorCategory::Model,

            Error::Uniformization(_)
            | Error::RootIsolation(_)
            | Error::ApproximationTolerance(_)
            | Error::NumericalInstability(_) => ErrorCategory::Numeric,

            Error::Solver(_) => ErrorCategory::Solver,
            Error::Reduction { source, .. } => source.category(),

            Error::Io(_) | Error::Json(_) => ErrorCategory::Io,
        }
    }

    /// Returns whether a changed configuration or model may make the
    /// operation succeed. Nothing is retried automatically.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Error::Config(_) => true,

            // Model errors need a different model, not a different run.
            Error::InvalidParameter { .. } => false,
            Error::UnsupportedDistribution(_) => false,
            Error::UnknownEvent(_) => false,
            Error::UnknownState { .. } => false,
            Error::RewardEvaluation(_) => false,
            Error::ReductionInconsistency(_) => false,

            // Numeric: budgets and tolerances are configurable
            Error::Uniformization(_) => true,
            Error::RootIsolation(_) => true,
            Error::ApproximationTolerance(_) => true,
            Error::NumericalInstability(_) => false,

            Error::Solver(_) => true,
            Error::Reduction { source, .. } => source.is_recoverable(),

            Error::Io(_) => true,
            Error::Json(_) => true,
        }
    }

    /// Returns the suggested action.
    pub fn suggested_action(&self) -> SuggestedAction {
        match self {
            Error::Config(_) => SuggestedAction::ResetConfig,

            Error::InvalidParameter { .. }
            | Error::UnsupportedDistribution(_)
            | Error::UnknownEvent(_)
            | Error::UnknownState { .. }
            | Error::RewardEvaluation(_)
            | Error::ReductionInconsistency(_) => SuggestedAction::FixModel,

            Error::Uniformization(_) | Error::RootIsolation(_) => SuggestedAction::RaiseBudget,
            Error::ApproximationTolerance(_) => SuggestedAction::AdjustTolerance,
            Error::NumericalInstability(_) => SuggestedAction::ManualIntervention,

            Error::Solver(_) => SuggestedAction::Retry,
            Error::Reduction { source, .. } => source.suggested_action(),

            Error::Io(_) => SuggestedAction::Retry,
            Error::Json(_) => SuggestedAction::ManualIntervention,
        }
    }

    /// Returns a human-readable remediation hint.
    pub fn remediation(&self) -> &'static str {
        match self {
            Error::Config(_) => {
                "Check reduction.json against the expected schema, or remove it to fall back to defaults."
            }

            Error::InvalidParameter { .. } => {
                "Check the distribution parameters and constants against each family's domain."
            }
            Error::UnsupportedDistribution(_) => {
                "Use one of: exponential, dirac, erlang, uniform, weibull."
            }
            Error::UnknownEvent(_) => "Check the event name against the model's declarations.",
            Error::UnknownState { .. } => "State indices must lie in 0..num_states.",
            Error::RewardEvaluation(_) => {
                "Reward rates must be finite and non-negative for every state."
            }
            Error::ReductionInconsistency(_) => {
                "The model violates a structural assumption of the reduction. Check competing non-exponential events and firing distributions."
            }

            Error::Uniformization(_) => {
                "Raise fox_glynn.max_iterations, or rescale time units so rate * time is smaller."
            }
            Error::RootIsolation(_) => "Raise roots.max_iterations in the configuration.",
            Error::ApproximationTolerance(_) => {
                "Loosen epsilon, or raise weibull.max_degree / quadrature.max_refinements."
            }
            Error::NumericalInstability(_) => {
                "The local linear system is singular or ill-conditioned. Check for zero-rate cycles."
            }

            Error::Solver(_) => "The downstream solver failed; see its message for details.",
            Error::Reduction { source, .. } => source.remediation(),

            Error::Io(_) => "Check that the configuration path exists and is readable.",
            Error::Json(_) => "Invalid JSON. Check syntax with 'jq . <file>'.",
        }
    }

    /// Returns a short headline for human-readable output.
    pub fn headline(&self) -> &'static str {
        match self {
            Error::Config(_) => "Configuration Error",
            Error::InvalidParameter { .. } => "Invalid Parameter",
            Error::UnsupportedDistribution(_) => "Unsupported Distribution",
            Error::UnknownEvent(_) => "Unknown Event",
            Error::UnknownState { .. } => "Unknown State",
            Error::RewardEvaluation(_) => "Reward Evaluation Failed",
            Error::ReductionInconsistency(_) => "Reduction Inconsistency",
            Error::Uniformization(_) => "Uniformization Failed",
            Error::RootIsolation(_) => "Root Isolation Failed",
            Error::ApproximationTolerance(_) => "Approximation Tolerance Not Reached",
            Error::NumericalInstability(_) => "Numerical Instability",
            Error::Solver(_) => "Solver Error",
            Error::Reduction { source, .. } => source.headline(),
            Error::Io(_) => "I/O Error",
            Error::Json(_) => "JSON Parse Error",
        }
    }
}

impl From<NumericError> for Error {
    fn from(err: NumericError) -> Self {
        match err {
            NumericError::Uniformization { .. } => Error::Uniformization(err.to_string()),
            NumericError::RootIsolation { .. } => Error::RootIsolation(err.to_string()),
            NumericError::Singular { .. } | NumericError::Dimension { .. } => {
                Error::NumericalInstability(err.to_string())
            }
            NumericError::InvalidArgument { name, reason } => Error::InvalidParameter {
                context: name.to_string(),
                reason,
            },
        }
    }
}

/// Structured error response for JSON output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructuredError {
    /// Stable error code.
    pub code: u32,

    /// Error category for grouping.
    pub category: ErrorCategory,

    /// Human-readable error message.
    pub message: String,

    /// Whether the error is potentially recoverable.
    pub recoverable: bool,

    /// Suggested action.
    pub suggested_action: SuggestedAction,

    /// Additional structured context (e.g., state, event).
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub context: HashMap<String, serde_json::Value>,
}

impl From<&Error> for StructuredError {
    fn from(err: &Error) -> Self {
        let mut context = HashMap::new();

        match err {
            Error::Reduction { state, event, .. } => {
                context.insert("state".to_string(), serde_json::json!(state));
                context.insert("event".to_string(), serde_json::json!(event));
            }
            Error::UnknownState { state, num_states } => {
                context.insert("state".to_string(), serde_json::json!(state));
                context.insert("num_states".to_string(), serde_json::json!(num_states));
            }
            Error::InvalidParameter { context: what, .. } => {
                context.insert("parameter".to_string(), serde_json::json!(what));
            }
            _ => {}
        }

        StructuredError {
            code: err.code(),
            category: err.category(),
            message: err.to_string(),
            recoverable: err.is_recoverable(),
            suggested_action: err.suggested_action(),
            context,
        }
    }
}

impl StructuredError {
    /// Add additional context to the error.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        if let Ok(v) = serde_json::to_value(value) {
            self.context.insert(key.into(), v);
        }
        self
    }

    /// Serialize to JSON string.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            format!(r#"{{"code":{},"error":"serialization_failed"}}"#, self.code)
        })
    }
}

/// Format an error for human-readable stderr output.
///
/// Output format:
/// ```text
/// ✗ [Headline]
///   Reason: [Error message]
///   Fix: [Remediation hint]
/// ```
pub fn format_error_human(err: &Error, use_color: bool) -> String {
    let (red, cyan, reset) = if use_color {
        ("\x1b[31m", "\x1b[36m", "\x1b[0m")
    } else {
        ("", "", "")
    };

    format!(
        "{red}✗{reset} {headline}\n  Reason: {message}\n  {cyan}Fix:{reset} {remediation}",
        headline = err.headline(),
        message = err,
        remediation = err.remediation()
    )
}
