//! Structured logging foundation for gsmp-core.
//!
//! Provides dual-mode logging:
//! - Human-readable console output for interactive use
//! - Machine-parseable JSONL for batch runs
//!
//! # Usage
//!
//! ```ignore
//! use gsmp_core::logging::{init_logging, LogConfig, Stage, event_names};
//!
//! let config = LogConfig::from_env().with_stage(Stage::Reduce, LevelFilter::DEBUG);
//! init_logging(&config);
//!
//! tracing::info!(target: event_names::CHAIN_FINISHED, stage = %Stage::Compose, states = 12);
//! ```
//!
//! # Design Notes
//!
//! - stderr receives all log output (human or JSONL)
//! - The numeric kernels in gsmp-math never log; only the pipeline does
//! - `RUST_LOG`, when set, replaces the stage directives wholesale

pub mod config;
pub mod events;

pub use config::{LogConfig, LogFormat};
pub use events::{event_names, Stage};
pub use tracing_subscriber::filter::LevelFilter;

use std::io::IsTerminal;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

fn env_filter(config: &LogConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(config.directive()))
}

/// Install a global subscriber for `config`.
///
/// Returns `false` if a global subscriber was already installed (e.g. by the
/// embedding application), in which case the existing one is kept.
pub fn init_logging(config: &LogConfig) -> bool {
    let filter = env_filter(config);

    match config.format {
        LogFormat::Human => {
            let fmt_layer = fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_thread_names(config.thread_names)
                .with_ansi(std::io::stderr().is_terminal());
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt_layer)
                .try_init()
                .is_ok()
        }
        LogFormat::Jsonl => {
            let json_layer = fmt::layer()
                .json()
                .flatten_event(true)
                .with_current_span(false)
                .with_span_list(false)
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_thread_names(config.thread_names);
            tracing_subscriber::registry()
                .with(filter)
                .with(json_layer)
                .try_init()
                .is_ok()
        }
    }
}

/// [`init_logging`] with [`LogConfig::from_env`].
pub fn init_default_logging() -> bool {
    init_logging(&LogConfig::from_env())
}
