//! Uniform firing time: the Dirac result averaged over `[a, b]`.
//!
//! The average is taken on the Poisson weights rather than on potato
//! results: composite Simpson over Fox-Glynn vectors, doubling the panel
//! count until two successive estimates differ by less than `ε/2` in L1.
//! Old midpoints become breakpoints on each doubling, so every Fox-Glynn
//! evaluation is done once.

use gsmp_common::{Error, Result};
use gsmp_config::ReductionConfig;
use gsmp_math::distributions::Uniform;
use gsmp_math::FoxGlynnWeights;

use super::{PotatoStrategy, StrategyContext};
use crate::cache::ApproximationKey;
use crate::distribution::DistributionParams;
use crate::potato::Potato;
use crate::transient::{add_scaled, solve_mixture, PoissonMixture, PotatoResult};

impl PotatoStrategy for Uniform {
    fn reduce(&self, potato: &Potato, ctx: &StrategyContext<'_>) -> Result<PotatoResult> {
        let q = ctx.uniformization_rate(potato, self.mean())?;
        let key =
            ApproximationKey::new(&DistributionParams::Uniform(*self), ctx.epsilon()).with_rate(q);
        let mixture = ctx.cache.mixture(key, || uniform_mixture(self, q, ctx.config))?;
        solve_mixture(potato, &mixture)
    }
}

/// `w_k = (1/(b-a)) ∫ₐᵇ Poisson(k; qt) dt` by adaptive Simpson.
pub fn uniform_mixture(dist: &Uniform, q: f64, config: &ReductionConfig) -> Result<PoissonMixture> {
    let epsilon = config.epsilon;
    let (a, b) = (dist.lower, dist.upper);
    let weights_at = |t: f64| {
        FoxGlynnWeights::for_time(q, t, 0.5 * epsilon, config.fox_glynn.max_iterations)
    };

    let mut panels = config.quadrature.initial_panels.max(1);
    let mut ends = Vec::new();
    add_scaled(&mut ends, &weights_at(a)?, 1.0);
    add_scaled(&mut ends, &weights_at(b)?, 1.0);
    let mut breaks = Vec::new();
    let h = (b - a) / panels as f64;
    for i in 1..panels {
        add_scaled(&mut breaks, &weights_at(a + i as f64 * h)?, 1.0);
    }
    let mut mids = midpoint_sum(a, b, panels, &weights_at)?;
    let mut estimate = simpson(&ends, &breaks, &mids, panels);

    for _ in 0..config.quadrature.max_refinements {
        accumulate(&mut breaks, &mids);
        panels *= 2;
        mids = midpoint_sum(a, b, panels, &weights_at)?;
        let refined = simpson(&ends, &breaks, &mids, panels);
        let change = l1_distance(&refined, &estimate);
        estimate = refined;
        if change < 0.5 * epsilon {
            return Ok(PoissonMixture::from_weights(q, estimate));
        }
    }

    Err(Error::ApproximationTolerance(format!(
        "uniform[{a}, {b}] quadrature did not settle below {} after {} panels",
        0.5 * epsilon,
        panels
    )))
}

fn midpoint_sum(
    a: f64,
    b: f64,
    panels: usize,
    weights_at: &impl Fn(f64) -> gsmp_math::NumericResult<FoxGlynnWeights>,
) -> Result<Vec<f64>> {
    let h = (b - a) / panels as f64;
    let mut sum = Vec::new();
    for i in 0..panels {
        add_scaled(&mut sum, &weights_at(a + (i as f64 + 0.5) * h)?, 1.0);
    }
    Ok(sum)
}

fn accumulate(acc: &mut Vec<f64>, values: &[f64]) {
    if acc.len() < values.len() {
        acc.resize(values.len(), 0.0);
    }
    for (a, v) in acc.iter_mut().zip(values) {
        *a += v;
    }
}

/// `(ends + 2·breaks + 4·mids) / (6·panels)`: the interval average.
fn simpson(ends: &[f64], breaks: &[f64], mids: &[f64], panels: usize) -> Vec<f64> {
    let len = ends.len().max(breaks.len()).max(mids.len());
    let at = |v: &[f64], k: usize| v.get(k).copied().unwrap_or(0.0);
    let scale = 1.0 / (6.0 * panels as f64);
    (0..len)
        .map(|k| scale * (at(ends, k) + 2.0 * at(breaks, k) + 4.0 * at(mids, k)))
        .collect()
}

fn l1_distance(x: &[f64], y: &[f64]) -> f64 {
    let len = x.len().max(y.len());
    (0..len)
        .map(|k| (x.get(k).unwrap_or(&0.0) - y.get(k).unwrap_or(&0.0)).abs())
        .sum()
}
