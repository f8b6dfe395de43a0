//! Erlang firing time: `k` chained exponential phases.
//!
//! Phase `j` starts from the occupancy `y_{j-1}` the previous phase fired in
//! and solves `x_j (λI - Q) = y_{j-1}`, `y_j = λ x_j`. Cumulative occupancy
//! is `Σ x_j`, firing occupancy is `y_k`. One factorisation serves all phases.

use gsmp_common::Result;
use gsmp_math::distributions::Erlang;

use super::exponential::{entry_vector, shifted_lu};
use super::{PotatoStrategy, StrategyContext};
use crate::potato::Potato;
use crate::transient::PotatoResult;

impl PotatoStrategy for Erlang {
    fn reduce(&self, potato: &Potato, _ctx: &StrategyContext<'_>) -> Result<PotatoResult> {
        let lu = shifted_lu(potato, self.rate)?;
        let mut occupancy = entry_vector(potato);
        let mut cumulative = vec![0.0; potato.len()];
        for _ in 0..self.phases {
            let x = lu.solve_transposed(&occupancy)?;
            for (acc, xi) in cumulative.iter_mut().zip(&x) {
                *acc += xi;
            }
            occupancy = x.into_iter().map(|xi| self.rate * xi).collect();
        }
        PotatoResult::from_occupancy(potato, &occupancy, &cumulative)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ApproximationCache;
    use crate::strategy::test_support::{single_state, two_state};
    use gsmp_common::StateId;
    use gsmp_config::ReductionConfig;
    use gsmp_math::distributions::Exponential;

    fn approx_eq(a: f64, b: f64, tol: f64) -> bool {
        (a - b).abs() <= tol
    }

    #[test]
    fn single_phase_is_exponential() {
        let config = ReductionConfig::default();
        let cache = ApproximationCache::default();
        let ctx = StrategyContext::new(&config, &cache);
        let potato = two_state(1.5, 0.25);
        let erlang = Erlang { phases: 1, rate: 0.8 }.reduce(&potato, &ctx).unwrap();
        let exp = Exponential { rate: 0.8 }.reduce(&potato, &ctx).unwrap();
        for (target, p) in &exp.exits {
            assert!(approx_eq(erlang.probability(*target), *p, 1e-14));
        }
        assert!(approx_eq(erlang.rewards[0], exp.rewards[0], 1e-14));
    }

    #[test]
    fn race_survival_is_phase_product() {
        // Exp(mu) competitor beats Erlang(k, λ) unless all k phases finish
        // first: P(fire) = (λ/(λ+μ))^k.
        let config = ReductionConfig::default();
        let cache = ApproximationCache::default();
        let ctx = StrategyContext::new(&config, &cache);
        let (k, lambda, mu) = (3u32, 2.0, 1.0);
        let result = Erlang { phases: k, rate: lambda }
            .reduce(&single_state(mu, 1.0), &ctx)
            .unwrap();
        let fire = (lambda / (lambda + mu)).powi(k as i32);
        assert!(approx_eq(result.probability(StateId(1)), fire, 1e-12));
        assert!(approx_eq(result.total_probability(), 1.0, 1e-12));
        // Mean of min(T, Exp(mu)) = (1 - P(fire)) / mu.
        assert!(approx_eq(result.expected_sojourn, (1.0 - fire) / mu, 1e-12));
    }
}
