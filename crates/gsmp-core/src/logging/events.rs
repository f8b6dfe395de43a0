//! Stage and event name vocabulary for reduction logs.
//!
//! Every log line emitted by the reduction pipeline carries a `stage` field
//! and uses one of the [`event_names`] constants as its tracing target, so
//! JSONL output can be filtered without parsing messages.

use serde::{Deserialize, Serialize};

/// Processing stages in the reduction pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Orchestrator construction and configuration.
    Init,
    /// Distribution and constant resolution.
    Resolve,
    /// Potato construction for one (state, event) pair.
    Build,
    /// Strategy dispatch for one pair.
    Reduce,
    /// Folding per-pair results into the reduced chain.
    Compose,
    /// Hand-off to the downstream solver.
    Solve,
    /// Parameter synthesis re-derivation.
    Synthesize,
}

impl Stage {
    pub const ALL: [Stage; 7] = [
        Stage::Init,
        Stage::Resolve,
        Stage::Build,
        Stage::Reduce,
        Stage::Compose,
        Stage::Solve,
        Stage::Synthesize,
    ];

    /// Leading segments of the [`event_names`] emitted during this stage.
    pub fn target_prefixes(self) -> &'static [&'static str] {
        match self {
            Stage::Init => &["orchestrator", "config"],
            Stage::Resolve => &["model"],
            Stage::Build => &["potato"],
            Stage::Reduce => &["reduce"],
            Stage::Compose => &["chain", "approx_cache"],
            Stage::Solve => &["solve"],
            Stage::Synthesize => &["synthesis"],
        }
    }
}

impl std::str::FromStr for Stage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Stage::ALL
            .into_iter()
            .find(|stage| stage.to_string() == s)
            .ok_or_else(|| format!("unknown stage: {}", s))
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Stage::Init => "init",
            Stage::Resolve => "resolve",
            Stage::Build => "build",
            Stage::Reduce => "reduce",
            Stage::Compose => "compose",
            Stage::Solve => "solve",
            Stage::Synthesize => "synthesize",
        };
        write!(f, "{}", s)
    }
}

/// Standard event names used in logging.
pub mod event_names {
    // Orchestrator lifecycle
    pub const ORCHESTRATOR_READY: &str = "orchestrator.ready";
    pub const CONFIG_LOADED: &str = "config.loaded";

    // Resolution
    pub const MODEL_RESOLVED: &str = "model.resolved";

    // Per-pair reduction
    pub const POTATO_BUILT: &str = "potato.built";
    pub const PAIR_REDUCED: &str = "reduce.pair_done";
    pub const PAIR_FAILED: &str = "reduce.pair_failed";
    pub const DEGENERATE_RATE: &str = "reduce.degenerate_rate";

    // Chain assembly
    pub const CHAIN_STARTED: &str = "chain.started";
    pub const CHAIN_FINISHED: &str = "chain.finished";
    pub const CHAIN_CACHE_HIT: &str = "chain.cache_hit";
    pub const CHAIN_CACHE_EVICTED: &str = "chain.cache_evicted";

    // Approximation cache
    pub const APPROX_CACHE_EVICTED: &str = "approx_cache.evicted";

    // Solver hand-off
    pub const SOLVE_STARTED: &str = "solve.started";
    pub const SOLVE_FINISHED: &str = "solve.finished";

    // Synthesis
    pub const SYNTHESIS_REDUCED: &str = "synthesis.reduced";
}
