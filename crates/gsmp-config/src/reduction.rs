//! Reduction configuration types.
//!
//! Every section has defaults, so `{"schema_version": "1.0.0"}` is a complete
//! configuration file.

use gsmp_math::{DEFAULT_FOX_GLYNN_MAX_ITERATIONS, DEFAULT_ROOT_MAX_ITERATIONS};
use serde::{Deserialize, Serialize};

use crate::validate::ValidationError;

/// Complete reduction configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReductionConfig {
    pub schema_version: String,

    #[serde(default)]
    pub description: Option<String>,

    /// Accuracy target for every approximate strategy.
    #[serde(default = "default_epsilon")]
    pub epsilon: f64,

    #[serde(default)]
    pub fox_glynn: FoxGlynnConfig,

    #[serde(default)]
    pub uniformization: UniformizationConfig,

    #[serde(default)]
    pub quadrature: QuadratureConfig,

    #[serde(default)]
    pub weibull: WeibullConfig,

    #[serde(default)]
    pub roots: RootsConfig,

    #[serde(default)]
    pub composition: CompositionConfig,

    #[serde(default)]
    pub execution: ExecutionConfig,

    #[serde(default)]
    pub cache: CacheConfig,
}

fn default_epsilon() -> f64 {
    1e-6
}

impl Default for ReductionConfig {
    fn default() -> Self {
        Self {
            schema_version: crate::CONFIG_SCHEMA_VERSION.to_string(),
            description: None,
            epsilon: default_epsilon(),
            fox_glynn: FoxGlynnConfig::default(),
            uniformization: UniformizationConfig::default(),
            quadrature: QuadratureConfig::default(),
            weibull: WeibullConfig::default(),
            roots: RootsConfig::default(),
            composition: CompositionConfig::default(),
            execution: ExecutionConfig::default(),
            cache: CacheConfig::default(),
        }
    }
}

impl ReductionConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &std::path::Path) -> Result<Self, ValidationError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ValidationError::IoError(format!("Failed to read {}: {}", path.display(), e))
        })?;

        Self::from_str(&content)
    }

    /// Parse configuration from a JSON string.
    pub fn from_str(json: &str) -> Result<Self, ValidationError> {
        serde_json::from_str(json)
            .map_err(|e| ValidationError::ParseError(format!("Invalid JSON: {}", e)))
    }

    /// Builder-style override of epsilon.
    pub fn with_epsilon(mut self, epsilon: f64) -> Self {
        self.epsilon = epsilon;
        self
    }

    /// Builder-style override of the composition policy.
    pub fn with_policy(mut self, policy: CompositionPolicy) -> Self {
        self.composition.policy = policy;
        self
    }

    /// Builder-style override of the worker count.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.execution.workers = Some(workers);
        self
    }
}

/// Poisson weight truncation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FoxGlynnConfig {
    /// Recurrence steps before uniformization gives up.
    #[serde(default = "default_fox_glynn_iterations")]
    pub max_iterations: usize,
}

fn default_fox_glynn_iterations() -> usize {
    DEFAULT_FOX_GLYNN_MAX_ITERATIONS
}

impl Default for FoxGlynnConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_fox_glynn_iterations(),
        }
    }
}

/// Choice of the uniformization rate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UniformizationConfig {
    /// `q = rate_factor * max exit rate`; must be at least 1.
    #[serde(default = "default_rate_factor")]
    pub rate_factor: f64,
}

fn default_rate_factor() -> f64 {
    1.02
}

impl Default for UniformizationConfig {
    fn default() -> Self {
        Self {
            rate_factor: default_rate_factor(),
        }
    }
}

/// Adaptive quadrature for the uniform strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuadratureConfig {
    #[serde(default = "default_initial_panels")]
    pub initial_panels: usize,

    /// Panel doublings allowed before `ApproximationTolerance`.
    #[serde(default = "default_max_refinements")]
    pub max_refinements: u32,
}

fn default_initial_panels() -> usize {
    4
}

fn default_max_refinements() -> u32 {
    16
}

impl Default for QuadratureConfig {
    fn default() -> Self {
        Self {
            initial_panels: default_initial_panels(),
            max_refinements: default_max_refinements(),
        }
    }
}

/// Piecewise Taylor surrogate for the Weibull strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeibullConfig {
    #[serde(default = "default_min_degree")]
    pub min_degree: usize,

    #[serde(default = "default_max_degree")]
    pub max_degree: usize,

    /// Width of one expansion piece in the unit-exponential variable.
    #[serde(default = "default_expansion_width")]
    pub expansion_width: f64,

    /// Gauss-Legendre nodes per integration cell.
    #[serde(default = "default_gauss_nodes")]
    pub gauss_nodes: usize,

    /// Integration cells across the whole surrogate, one per expected
    /// uniformization step.
    #[serde(default = "default_max_cells")]
    pub max_cells: usize,
}

fn default_min_degree() -> usize {
    4
}

fn default_max_degree() -> usize {
    24
}

fn default_expansion_width() -> f64 {
    0.5
}

fn default_gauss_nodes() -> usize {
    8
}

fn default_max_cells() -> usize {
    20_000
}

impl Default for WeibullConfig {
    fn default() -> Self {
        Self {
            min_degree: default_min_degree(),
            max_degree: default_max_degree(),
            expansion_width: default_expansion_width(),
            gauss_nodes: default_gauss_nodes(),
            max_cells: default_max_cells(),
        }
    }
}

/// Root isolation budget.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RootsConfig {
    #[serde(default = "default_root_iterations")]
    pub max_iterations: usize,
}

fn default_root_iterations() -> usize {
    DEFAULT_ROOT_MAX_ITERATIONS
}

impl Default for RootsConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_root_iterations(),
        }
    }
}

/// How simultaneously enabled events are combined at one state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompositionPolicy {
    /// At most one non-exponential event per state.
    #[default]
    Exclusive,
    /// Competing non-exponential events race with rate `1/mean`.
    RateWeighted,
}

impl std::fmt::Display for CompositionPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CompositionPolicy::Exclusive => write!(f, "exclusive"),
            CompositionPolicy::RateWeighted => write!(f, "rate_weighted"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompositionConfig {
    #[serde(default)]
    pub policy: CompositionPolicy,
}

/// Worker threads for per-pair reductions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionConfig {
    /// Dedicated pool size; `None` uses the global pool.
    #[serde(default)]
    pub workers: Option<usize>,
}

/// Memoization bounds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Reduced chains kept by the orchestrator.
    #[serde(default = "default_max_chains")]
    pub max_chains: usize,

    /// Surrogates and Poisson mixtures kept before the cache is cleared.
    #[serde(default = "default_max_approximations")]
    pub max_approximations: usize,
}

fn default_max_chains() -> usize {
    16
}

fn default_max_approximations() -> usize {
    4096
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_chains: default_max_chains(),
            max_approximations: default_max_approximations(),
        }
    }
}
