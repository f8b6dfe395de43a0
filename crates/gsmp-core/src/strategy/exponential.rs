//! Exponential firing time: one linear solve.
//!
//! With `T ~ Exp(λ)`, `E[∫₀ᵀ π(t) dt] = e_entry (λI - Q)⁻¹` and the firing
//! occupancy is `λ` times that.

use gsmp_common::Result;
use gsmp_math::distributions::Exponential;
use gsmp_math::LuDecomposition;

use super::{PotatoStrategy, StrategyContext};
use crate::potato::Potato;
use crate::transient::PotatoResult;

/// LU factors of `λI - Q` for the potato's generator `Q`.
pub(crate) fn shifted_lu(potato: &Potato, rate: f64) -> Result<LuDecomposition> {
    let rows = potato
        .generator()
        .iter()
        .enumerate()
        .map(|(i, row)| {
            row.iter()
                .enumerate()
                .map(|(j, &q)| if i == j { rate - q } else { -q })
                .collect()
        })
        .collect();
    Ok(LuDecomposition::new(rows)?)
}

pub(crate) fn entry_vector(potato: &Potato) -> Vec<f64> {
    let mut e = vec![0.0; potato.len()];
    e[0] = 1.0;
    e
}

impl PotatoStrategy for Exponential {
    fn reduce(&self, potato: &Potato, _ctx: &StrategyContext<'_>) -> Result<PotatoResult> {
        let lu = shifted_lu(potato, self.rate)?;
        let cumulative = lu.solve_transposed(&entry_vector(potato))?;
        let firing: Vec<f64> = cumulative.iter().map(|x| self.rate * x).collect();
        PotatoResult::from_occupancy(potato, &firing, &cumulative)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ApproximationCache;
    use crate::strategy::test_support::{single_state, two_state};
    use gsmp_common::StateId;
    use gsmp_config::ReductionConfig;

    fn approx_eq(a: f64, b: f64, tol: f64) -> bool {
        (a - b).abs() <= tol
    }

    #[test]
    fn race_against_competitor() {
        let config = ReductionConfig::default();
        let cache = ApproximationCache::default();
        let ctx = StrategyContext::new(&config, &cache);
        let (lambda, mu, r) = (2.0, 3.0, 4.0);
        let result = Exponential { rate: lambda }
            .reduce(&single_state(mu, r), &ctx)
            .unwrap();
        assert!(approx_eq(result.probability(StateId(1)), lambda / (lambda + mu), 1e-12));
        assert!(approx_eq(result.probability(StateId(2)), mu / (lambda + mu), 1e-12));
        assert!(approx_eq(result.rewards[0], r / (lambda + mu), 1e-12));
        assert!(approx_eq(result.expected_sojourn, 1.0 / (lambda + mu), 1e-12));
    }

    #[test]
    fn two_state_chain() {
        let config = ReductionConfig::default();
        let cache = ApproximationCache::default();
        let ctx = StrategyContext::new(&config, &cache);
        let (lambda, a, b) = (1.0, 2.0, 0.5);
        let result = Exponential { rate: lambda }
            .reduce(&two_state(a, b), &ctx)
            .unwrap();

        // Time in 0: 1/(λ+a); reach 1 with a/(λ+a), then time 1/(λ+b).
        let reach = a / (lambda + a);
        let t0 = 1.0 / (lambda + a);
        let t1 = reach / (lambda + b);
        assert!(approx_eq(result.probability(StateId(2)), lambda * t0, 1e-12));
        assert!(approx_eq(result.probability(StateId(4)), lambda * t1, 1e-12));
        assert!(approx_eq(result.probability(StateId(3)), b * t1, 1e-12));
        assert!(approx_eq(result.total_probability(), 1.0, 1e-12));
        assert!(approx_eq(result.rewards[0], t0 + 3.0 * t1, 1e-12));
    }
}
