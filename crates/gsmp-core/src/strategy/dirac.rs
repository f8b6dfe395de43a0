//! Deterministic firing time: uniformization at `t = d`.

use gsmp_common::Result;
use gsmp_math::distributions::Dirac;
use gsmp_math::FoxGlynnWeights;

use super::{PotatoStrategy, StrategyContext};
use crate::cache::ApproximationKey;
use crate::distribution::DistributionParams;
use crate::potato::Potato;
use crate::transient::{solve_mixture, PoissonMixture, PotatoResult};

impl PotatoStrategy for Dirac {
    fn reduce(&self, potato: &Potato, ctx: &StrategyContext<'_>) -> Result<PotatoResult> {
        let q = ctx.uniformization_rate(potato, self.delay)?;
        let key = ApproximationKey::new(&DistributionParams::Dirac(*self), ctx.epsilon()).with_rate(q);
        let mixture = ctx.cache.mixture(key, || {
            let fg = FoxGlynnWeights::for_time(
                q,
                self.delay,
                ctx.epsilon(),
                ctx.config.fox_glynn.max_iterations,
            )?;
            Ok(PoissonMixture::from_fox_glynn(q, &fg))
        })?;
        solve_mixture(potato, &mixture)
    }
}
