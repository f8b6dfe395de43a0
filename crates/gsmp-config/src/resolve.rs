//! Configuration resolution and path discovery.
//!
//! Resolution order: explicit path → environment variables → XDG paths → defaults.

use std::path::{Path, PathBuf};

use crate::reduction::ReductionConfig;
use crate::snapshot::ConfigSnapshot;
use crate::validate::{validate_config, ValidationError, ValidationResult};

/// Discovered configuration file path.
#[derive(Debug, Clone, Default)]
pub struct ConfigPath {
    /// Path to reduction.json (or None if not found).
    pub path: Option<PathBuf>,

    /// Source of the config (for diagnostics).
    pub source: ConfigSource,
}

/// Where a configuration file was found.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ConfigSource {
    /// Explicitly provided by the caller.
    Explicit,

    /// Set via environment variable.
    Environment,

    /// Found in XDG config directory.
    XdgConfig,

    /// Using built-in defaults.
    #[default]
    BuiltinDefault,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigSource::Explicit => write!(f, "explicit path"),
            ConfigSource::Environment => write!(f, "environment variable"),
            ConfigSource::XdgConfig => write!(f, "XDG config"),
            ConfigSource::BuiltinDefault => write!(f, "builtin default"),
        }
    }
}

/// Environment variable names.
pub const ENV_CONFIG_PATH: &str = "GSMP_REDUCTION_CONFIG";
pub const ENV_CONFIG_DIR: &str = "GSMP_CONFIG_DIR";

/// Standard config file name.
pub const CONFIG_FILENAME: &str = "reduction.json";

/// Application name for XDG directories.
const APP_NAME: &str = "gsmp";

/// Resolve the configuration path using the standard resolution order.
///
/// 1. Explicit path (if provided and present)
/// 2. `GSMP_REDUCTION_CONFIG`
/// 3. `GSMP_CONFIG_DIR` + `reduction.json`
/// 4. XDG config directory (`~/.config/gsmp/reduction.json`)
/// 5. Built-in defaults (None)
pub fn resolve_config(explicit: Option<&Path>) -> ConfigPath {
    if let Some(path) = explicit {
        if path.exists() {
            return ConfigPath {
                path: Some(path.to_path_buf()),
                source: ConfigSource::Explicit,
            };
        }
    }

    if let Ok(env_path) = std::env::var(ENV_CONFIG_PATH) {
        let path = PathBuf::from(env_path);
        if path.exists() {
            return ConfigPath {
                path: Some(path),
                source: ConfigSource::Environment,
            };
        }
    }

    if let Ok(config_dir) = std::env::var(ENV_CONFIG_DIR) {
        let path = PathBuf::from(config_dir).join(CONFIG_FILENAME);
        if path.exists() {
            return ConfigPath {
                path: Some(path),
                source: ConfigSource::Environment,
            };
        }
    }

    if let Some(dir) = xdg_config_dir() {
        let path = dir.join(CONFIG_FILENAME);
        if path.exists() {
            return ConfigPath {
                path: Some(path),
                source: ConfigSource::XdgConfig,
            };
        }
    }

    ConfigPath::default()
}

/// Get the XDG config directory for gsmp.
pub fn xdg_config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join(APP_NAME))
}

/// A validated configuration together with its snapshot.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: ReductionConfig,
    pub snapshot: ConfigSnapshot,
}

/// Resolve, read, parse and validate the configuration.
///
/// An explicit path that does not exist is an error rather than a silent
/// fall-through to defaults.
pub fn load_config(explicit: Option<&Path>) -> ValidationResult<LoadedConfig> {
    if let Some(path) = explicit {
        if !path.exists() {
            return Err(ValidationError::IoError(format!(
                "Config file {} does not exist",
                path.display()
            )));
        }
    }

    let resolved = resolve_config(explicit);
    let config = match &resolved.path {
        Some(path) => ReductionConfig::from_file(path)?,
        None => ReductionConfig::default(),
    };
    validate_config(&config)?;
    let snapshot = ConfigSnapshot::new(&config, &resolved);
    Ok(LoadedConfig { config, snapshot })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_source_display() {
        assert_eq!(format!("{}", ConfigSource::Explicit), "explicit path");
        assert_eq!(
            format!("{}", ConfigSource::Environment),
            "environment variable"
        );
        assert_eq!(format!("{}", ConfigSource::XdgConfig), "XDG config");
        assert_eq!(
            format!("{}", ConfigSource::BuiltinDefault),
            "builtin default"
        );
    }

    #[test]
    fn test_xdg_config_dir() {
        if let Some(path) = xdg_config_dir() {
            assert!(path.ends_with(APP_NAME));
        }
    }

    #[test]
    fn test_missing_explicit_path_is_error() {
        let err = load_config(Some(Path::new("/nonexistent/gsmp/reduction.json"))).unwrap_err();
        assert!(matches!(err, ValidationError::IoError(_)));
    }
}
