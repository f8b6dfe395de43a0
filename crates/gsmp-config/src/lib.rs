//! GSMP reduction configuration loading and validation.
//!
//! This crate provides:
//! - Typed Rust structs for reduction.json
//! - Config resolution (explicit path → env → XDG → defaults)
//! - Semantic validation
//! - Config snapshots for reproducibility

pub mod reduction;
pub mod resolve;
pub mod snapshot;
pub mod validate;

pub use reduction::{
    CacheConfig, CompositionConfig, CompositionPolicy, ExecutionConfig, FoxGlynnConfig,
    QuadratureConfig, ReductionConfig, RootsConfig, UniformizationConfig, WeibullConfig,
};
pub use resolve::{load_config, resolve_config, ConfigPath, ConfigSource, LoadedConfig};
pub use snapshot::ConfigSnapshot;
pub use validate::{validate_config, ValidationError, ValidationResult};

/// Schema version for configuration files.
pub const CONFIG_SCHEMA_VERSION: &str = "1.0.0";
