//! Logging configuration for hosts embedding the reduction pipeline.
//!
//! Levels are set per [`Stage`]: every event name a stage emits shares a
//! leading segment, so a stage level becomes one `EnvFilter` directive per
//! segment. Per-pair stages default to `warn` so that reducing a large
//! chain at `info` prints one summary line instead of one per pair.
//!
//! `GSMP_LOG` takes the same syntax as [`LogConfig::with_directives`]
//! (`info,reduce=debug`); `GSMP_LOG_FORMAT` selects the output format.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing_subscriber::filter::LevelFilter;

use super::events::Stage;

/// Level and per-stage overrides, e.g. `info,reduce=debug`.
pub const LEVEL_ENV: &str = "GSMP_LOG";
/// `human` or `jsonl`.
pub const FORMAT_ENV: &str = "GSMP_LOG_FORMAT";

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Human,
    /// One JSON object per line, fields flattened.
    Jsonl,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "human" => Ok(LogFormat::Human),
            "jsonl" | "json" => Ok(LogFormat::Jsonl),
            _ => Err(format!("unknown log format: {}", s)),
        }
    }
}

impl std::fmt::Display for LogFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogFormat::Human => write!(f, "human"),
            LogFormat::Jsonl => write!(f, "jsonl"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LogConfig {
    pub format: LogFormat,
    /// Level for targets outside any stage and for stages without an override.
    pub level: LevelFilter,
    pub stages: BTreeMap<Stage, LevelFilter>,
    /// Reductions run on a rayon pool; thread names tell workers apart.
    pub thread_names: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        LogConfig {
            format: LogFormat::Human,
            level: LevelFilter::INFO,
            stages: BTreeMap::from([
                (Stage::Build, LevelFilter::WARN),
                (Stage::Reduce, LevelFilter::WARN),
            ]),
            thread_names: false,
        }
    }
}

impl LogConfig {
    /// Defaults overlaid with `GSMP_LOG` and `GSMP_LOG_FORMAT`.
    ///
    /// A malformed variable leaves the defaults in place.
    pub fn from_env() -> Self {
        let mut config = LogConfig::default();
        if let Ok(spec) = std::env::var(LEVEL_ENV) {
            if let Ok(parsed) = config.clone().with_directives(&spec) {
                config = parsed;
            }
        }
        if let Some(format) = std::env::var(FORMAT_ENV)
            .ok()
            .and_then(|val| val.parse().ok())
        {
            config.format = format;
        }
        config
    }

    /// Apply comma-separated `level` and `stage=level` entries in order.
    pub fn with_directives(mut self, spec: &str) -> Result<Self, String> {
        for entry in spec.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            match entry.split_once('=') {
                Some((stage, level)) => {
                    let stage = stage.trim().parse::<Stage>()?;
                    self.stages.insert(stage, parse_level(level)?);
                }
                None => self.level = parse_level(entry)?,
            }
        }
        Ok(self)
    }

    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    /// Set the base level and drop every stage override.
    pub fn with_level(mut self, level: LevelFilter) -> Self {
        self.level = level;
        self.stages.clear();
        self
    }

    pub fn with_stage(mut self, stage: Stage, level: LevelFilter) -> Self {
        self.stages.insert(stage, level);
        self
    }

    pub fn with_thread_names(mut self, enabled: bool) -> Self {
        self.thread_names = enabled;
        self
    }

    /// Effective level for events of `stage`.
    pub fn stage_level(&self, stage: Stage) -> LevelFilter {
        self.stages.get(&stage).copied().unwrap_or(self.level)
    }

    /// `EnvFilter` directive string for this configuration.
    pub fn directive(&self) -> String {
        let mut parts = vec![self.level.to_string()];
        for (stage, level) in &self.stages {
            for prefix in stage.target_prefixes() {
                parts.push(format!("{}={}", prefix, level));
            }
        }
        parts.join(",")
    }
}

fn parse_level(s: &str) -> Result<LevelFilter, String> {
    s.trim()
        .parse::<LevelFilter>()
        .map_err(|_| format!("unknown log level: {}", s.trim()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn per_pair_stages_are_quiet_by_default() {
        let config = LogConfig::default();
        assert_eq!(config.stage_level(Stage::Reduce), LevelFilter::WARN);
        assert_eq!(config.stage_level(Stage::Build), LevelFilter::WARN);
        assert_eq!(config.stage_level(Stage::Compose), LevelFilter::INFO);
        assert_eq!(config.directive(), "info,potato=warn,reduce=warn");
    }

    #[test]
    fn directives_override_in_order() {
        let config = LogConfig::default()
            .with_directives("debug, reduce=trace,compose=error")
            .unwrap();
        assert_eq!(config.level, LevelFilter::DEBUG);
        assert_eq!(config.stage_level(Stage::Reduce), LevelFilter::TRACE);
        assert_eq!(config.stage_level(Stage::Build), LevelFilter::WARN);
        assert_eq!(config.stage_level(Stage::Solve), LevelFilter::DEBUG);
        assert_eq!(
            config.directive(),
            "debug,potato=warn,reduce=trace,chain=error,approx_cache=error"
        );
    }

    #[test]
    fn bad_directives_are_reported() {
        let err = LogConfig::default().with_directives("potato=debug").unwrap_err();
        assert!(err.contains("unknown stage"), "{err}");
        let err = LogConfig::default().with_directives("reduce=loud").unwrap_err();
        assert!(err.contains("unknown log level"), "{err}");
    }

    #[test]
    fn with_level_clears_stage_overrides() {
        let config = LogConfig::default()
            .with_level(LevelFilter::DEBUG)
            .with_stage(Stage::Synthesize, LevelFilter::OFF);
        assert_eq!(config.directive(), "debug,synthesis=off");
    }

    #[test]
    fn log_format_parse() {
        assert_eq!("json".parse::<LogFormat>().unwrap(), LogFormat::Jsonl);
        assert_eq!("Human".parse::<LogFormat>().unwrap(), LogFormat::Human);
        assert!("pretty".parse::<LogFormat>().is_err());
        assert_eq!(LogFormat::Jsonl.to_string(), "jsonl");
    }
}
