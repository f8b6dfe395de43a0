//! Configuration snapshots for reproducibility.
//!
//! A snapshot captures the exact configuration a reduction ran with, so a
//! reduced chain can be traced back to its epsilon and budgets.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::reduction::{CompositionPolicy, ReductionConfig};
use crate::resolve::ConfigPath;

/// A frozen snapshot of configuration state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigSnapshot {
    /// When this snapshot was taken.
    pub timestamp: DateTime<Utc>,

    /// Schema version of the configuration.
    pub schema_version: String,

    /// Path the configuration was loaded from.
    #[serde(default)]
    pub config_path: Option<String>,

    /// Source of the configuration.
    pub config_source: String,

    /// SHA-256 of the canonical JSON form of the effective configuration.
    pub config_hash: String,

    /// Key configuration values for quick reference.
    pub summary: ConfigSummary,
}

/// Summary of key configuration values.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigSummary {
    pub epsilon: f64,
    pub policy: CompositionPolicy,
    pub workers: Option<usize>,
    pub max_degree: usize,
}

impl ConfigSnapshot {
    /// Create a new snapshot from a loaded configuration.
    pub fn new(config: &ReductionConfig, path: &ConfigPath) -> Self {
        ConfigSnapshot {
            timestamp: Utc::now(),
            schema_version: config.schema_version.clone(),
            config_path: path.path.as_ref().map(|p| p.display().to_string()),
            config_source: path.source.to_string(),
            config_hash: config_hash(config),
            summary: ConfigSummary {
                epsilon: config.epsilon,
                policy: config.composition.policy,
                workers: config.execution.workers,
                max_degree: config.weibull.max_degree,
            },
        }
    }

    /// Create a snapshot of the built-in defaults.
    pub fn defaults_only() -> Self {
        Self::new(&ReductionConfig::default(), &ConfigPath::default())
    }

    /// Serialize snapshot to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Deserialize snapshot from JSON.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Check if this snapshot matches another (same effective config).
    pub fn matches(&self, other: &ConfigSnapshot) -> bool {
        self.config_hash == other.config_hash
    }

    /// Get a short identifier for this snapshot (first 12 chars of hash).
    pub fn short_id(&self) -> &str {
        &self.config_hash[..12.min(self.config_hash.len())]
    }
}

/// SHA-256 of the configuration's canonical JSON.
pub fn config_hash(config: &ReductionConfig) -> String {
    let canonical = serde_json::to_string(config).unwrap_or_default();
    hash_content(&canonical)
}

/// Compute SHA-256 hash of content.
pub fn hash_content(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}
