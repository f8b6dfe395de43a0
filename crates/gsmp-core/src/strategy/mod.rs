//! Potato strategies, one per distribution family.
//!
//! Exponential and Erlang firing times have closed forms through the
//! potato's local linear system. Dirac, uniform and Weibull firing times are
//! turned into a [`PoissonMixture`](crate::transient::PoissonMixture) and
//! handed to the transient solver.

pub mod dirac;
pub mod erlang;
pub mod exponential;
pub mod uniform;
pub mod weibull;

use gsmp_config::ReductionConfig;
use gsmp_common::Result;
use tracing::{debug, warn};

use crate::cache::ApproximationCache;
use crate::distribution::DistributionParams;
use crate::logging::{event_names, Stage};
use crate::potato::Potato;
use crate::transient::{uniformization_rate, PotatoResult};

/// `q·mean` above which the uniformization is reported as stiff.
const STIFF_RATE_RATIO: f64 = 1e6;

/// Everything a strategy needs besides the potato.
#[derive(Debug, Clone, Copy)]
pub struct StrategyContext<'a> {
    pub config: &'a ReductionConfig,
    pub cache: &'a ApproximationCache,
}

impl<'a> StrategyContext<'a> {
    pub fn new(config: &'a ReductionConfig, cache: &'a ApproximationCache) -> Self {
        Self { config, cache }
    }

    pub fn epsilon(&self) -> f64 {
        self.config.epsilon
    }

    /// Uniformization rate for `potato`, logging degenerate choices.
    pub fn uniformization_rate(&self, potato: &Potato, mean: f64) -> Result<f64> {
        let (q, degenerate) =
            uniformization_rate(potato, mean, self.config.uniformization.rate_factor)?;
        if degenerate {
            debug!(
                target: event_names::DEGENERATE_RATE,
                stage = %Stage::Reduce,
                entry = %potato.entry(),
                q,
                "potato has no memoryless exits, uniformizing at 1/mean"
            );
        } else if q * mean > STIFF_RATE_RATIO {
            warn!(
                target: event_names::DEGENERATE_RATE,
                stage = %Stage::Reduce,
                entry = %potato.entry(),
                q,
                mean,
                "stiff uniformization, expect long power iteration"
            );
        }
        Ok(q)
    }
}

/// Reduction of one potato against one firing-time family.
pub trait PotatoStrategy {
    fn reduce(&self, potato: &Potato, ctx: &StrategyContext<'_>) -> Result<PotatoResult>;
}

/// Dispatch to the strategy of `params`' family.
pub fn reduce(
    potato: &Potato,
    params: &DistributionParams,
    ctx: &StrategyContext<'_>,
) -> Result<PotatoResult> {
    match params {
        DistributionParams::Exponential(d) => d.reduce(potato, ctx),
        DistributionParams::Dirac(d) => d.reduce(potato, ctx),
        DistributionParams::Erlang(d) => d.reduce(potato, ctx),
        DistributionParams::Uniform(d) => d.reduce(potato, ctx),
        DistributionParams::Weibull(d) => d.reduce(potato, ctx),
    }
}
