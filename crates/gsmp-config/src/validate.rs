//! Configuration validation errors and semantic validation.

use thiserror::Error;

use crate::reduction::ReductionConfig;

/// Validation result type.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Largest quadrature refinement depth (panels double each level).
pub const MAX_QUADRATURE_REFINEMENTS: u32 = 30;

/// Largest Taylor degree accepted for the Weibull surrogate.
pub const MAX_WEIBULL_DEGREE: usize = 60;

/// Configuration validation errors.
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("I/O error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Semantic validation failed: {0}")]
    SemanticError(String),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },

    #[error("Version mismatch: expected {expected}, got {actual}")]
    VersionMismatch { expected: String, actual: String },
}

impl ValidationError {
    /// Error code for structured error reporting.
    pub fn code(&self) -> u32 {
        match self {
            ValidationError::IoError(_) => 60,
            ValidationError::ParseError(_) => 61,
            ValidationError::SemanticError(_) => 13,
            ValidationError::InvalidValue { .. } => 12,
            ValidationError::VersionMismatch { .. } => 11,
        }
    }
}

fn invalid(field: &str, message: String) -> ValidationError {
    ValidationError::InvalidValue {
        field: field.to_string(),
        message,
    }
}

/// Validate a reduction configuration semantically.
pub fn validate_config(config: &ReductionConfig) -> ValidationResult<()> {
    if config.schema_version != crate::CONFIG_SCHEMA_VERSION {
        return Err(ValidationError::VersionMismatch {
            expected: crate::CONFIG_SCHEMA_VERSION.to_string(),
            actual: config.schema_version.clone(),
        });
    }

    if !(config.epsilon > 0.0 && config.epsilon < 0.5) {
        return Err(invalid(
            "epsilon",
            format!("Must be in (0, 0.5), got {}", config.epsilon),
        ));
    }

    if config.fox_glynn.max_iterations == 0 {
        return Err(invalid("fox_glynn.max_iterations", "Must be > 0".to_string()));
    }

    let factor = config.uniformization.rate_factor;
    if !factor.is_finite() || factor < 1.0 {
        return Err(invalid(
            "uniformization.rate_factor",
            format!("Must be finite and >= 1, got {}", factor),
        ));
    }

    validate_quadrature(config)?;
    validate_weibull(config)?;

    if config.roots.max_iterations == 0 {
        return Err(invalid("roots.max_iterations", "Must be > 0".to_string()));
    }

    if config.execution.workers == Some(0) {
        return Err(invalid(
            "execution.workers",
            "Must be > 0 when set (omit for the global pool)".to_string(),
        ));
    }

    if config.cache.max_chains == 0 {
        return Err(invalid("cache.max_chains", "Must be > 0".to_string()));
    }
    if config.cache.max_approximations == 0 {
        return Err(invalid("cache.max_approximations", "Must be > 0".to_string()));
    }

    Ok(())
}

fn validate_quadrature(config: &ReductionConfig) -> ValidationResult<()> {
    let q = &config.quadrature;
    if q.initial_panels == 0 {
        return Err(invalid("quadrature.initial_panels", "Must be > 0".to_string()));
    }
    if q.max_refinements == 0 || q.max_refinements > MAX_QUADRATURE_REFINEMENTS {
        return Err(invalid(
            "quadrature.max_refinements",
            format!(
                "Must be in [1, {}], got {}",
                MAX_QUADRATURE_REFINEMENTS, q.max_refinements
            ),
        ));
    }
    Ok(())
}

fn validate_weibull(config: &ReductionConfig) -> ValidationResult<()> {
    let w = &config.weibull;
    if w.min_degree == 0 {
        return Err(invalid("weibull.min_degree", "Must be > 0".to_string()));
    }
    if w.max_degree < w.min_degree {
        return Err(ValidationError::SemanticError(format!(
            "weibull.max_degree ({}) must be >= weibull.min_degree ({})",
            w.max_degree, w.min_degree
        )));
    }
    if w.max_degree > MAX_WEIBULL_DEGREE {
        return Err(invalid(
            "weibull.max_degree",
            format!("Must be <= {}, got {}", MAX_WEIBULL_DEGREE, w.max_degree),
        ));
    }
    if !(w.expansion_width > 0.0 && w.expansion_width <= 2.0) {
        return Err(invalid(
            "weibull.expansion_width",
            format!("Must be in (0, 2], got {}", w.expansion_width),
        ));
    }
    if w.gauss_nodes == 0 || w.gauss_nodes > gsmp_math::MAX_GAUSS_LEGENDRE_NODES
    {
        return Err(invalid(
            "weibull.gauss_nodes",
            format!(
                "Must be in [1, {}], got {}",
                gsmp_math::MAX_GAUSS_LEGENDRE_NODES,
                w.gauss_nodes
            ),
        ));
    }
    if w.max_cells == 0 {
        return Err(invalid("weibull.max_cells", "Must be > 0".to_string()));
    }
    Ok(())
}
