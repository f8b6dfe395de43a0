//! Transient solution of a potato against a random firing time.
//!
//! With uniformization rate `q` and `P = I + Q/q`, the occupancy of the
//! potato at time `t` (before any exit) is `π(t) = Σ_k Poisson(k; qt) v_k`
//! where `v_k = e_entry Pᵏ`. Averaging over the firing time `T` gives
//!
//! - firing occupancy `E[π(T)] = Σ_k w_k v_k` with `w_k = E[Poisson(k; qT)]`
//! - cumulative occupancy `E[∫₀ᵀ π(t) dt] = (1/q) Σ_k P[N_T > k] v_k`
//!
//! so every strategy only has to produce the mixture weights `w_k`.
//! [`PotatoResult::from_occupancy`] turns the two occupancy vectors into exit
//! probabilities and rewards; the closed-form strategies feed it directly.

use std::collections::BTreeMap;

use gsmp_common::{Error, Result, StateId};
use gsmp_math::{compensated_sum, FoxGlynnWeights};
use serde::{Deserialize, Serialize};

use crate::potato::Potato;

/// Negative rounding noise tolerated (and clamped) in results.
const NEGATIVE_TOLERANCE: f64 = 1e-9;

/// Occupancy mass below which power iteration stops early.
const NEGLIGIBLE_MASS: f64 = 1e-300;

/// Expected Poisson weights `w_k = E[Poisson(k; qT)]` over `k = 0..len()`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoissonMixture {
    rate: f64,
    weights: Vec<f64>,
    tails: Vec<f64>,
}

impl PoissonMixture {
    /// Mixture from dense weights; tails are `1 - Σ_{j<=k} w_j`, clamped at 0.
    pub fn from_weights(rate: f64, weights: Vec<f64>) -> Self {
        let mut tails = Vec::with_capacity(weights.len());
        let mut collected = 0.0;
        let mut compensation = 0.0;
        for &w in &weights {
            let y = w - compensation;
            let t = collected + y;
            compensation = (t - collected) - y;
            collected = t;
            tails.push((1.0 - collected).max(0.0));
        }
        Self {
            rate,
            weights,
            tails,
        }
    }

    /// The degenerate mixture of a single Poisson law, `fg` computed for
    /// `q` times a fixed time.
    pub fn from_fox_glynn(q: f64, fg: &FoxGlynnWeights) -> Self {
        let mut dense = vec![0.0; fg.right() + 1];
        for (k, w) in fg.iter() {
            dense[k] = w;
        }
        Self::from_weights(q, dense)
    }

    /// The Poisson rate `q` the weights were computed for, per unit time.
    pub fn rate(&self) -> f64 {
        self.rate
    }

    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    /// `P[N_T > k]` for `k = 0..len()`.
    pub fn tails(&self) -> &[f64] {
        &self.tails
    }

    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    pub fn mass(&self) -> f64 {
        compensated_sum(self.weights.iter().copied())
    }
}

/// Accumulate `scale * fg` into a dense weight vector.
pub(crate) fn add_scaled(acc: &mut Vec<f64>, fg: &FoxGlynnWeights, scale: f64) {
    if acc.len() <= fg.right() {
        acc.resize(fg.right() + 1, 0.0);
    }
    for (k, w) in fg.iter() {
        acc[k] += scale * w;
    }
}

/// What leaving one potato looks like from its entry state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PotatoResult {
    /// Probability of leaving to each target (firing or boundary).
    pub exits: BTreeMap<StateId, f64>,
    /// Mean time until the potato is left.
    pub expected_sojourn: f64,
    /// Expected reward accumulated before leaving, per reward structure.
    pub rewards: Vec<f64>,
}

impl PotatoResult {
    /// Exit distribution and rewards from the two occupancy vectors.
    pub fn from_occupancy(potato: &Potato, firing: &[f64], cumulative: &[f64]) -> Result<Self> {
        let mut exits: BTreeMap<StateId, f64> = BTreeMap::new();
        for (local, &occupancy) in firing.iter().enumerate() {
            for &(target, p) in potato.firing(local) {
                *exits.entry(target).or_insert(0.0) += occupancy * p;
            }
        }
        for b in potato.boundary() {
            *exits.entry(b.target).or_insert(0.0) += cumulative[b.from] * b.rate;
        }
        for value in exits.values_mut() {
            *value = clamp_non_negative(*value, "exit probability")?;
        }

        let expected_sojourn = clamp_non_negative(
            compensated_sum(cumulative.iter().copied()),
            "expected sojourn",
        )?;
        let rewards = (0..potato.num_rewards())
            .map(|r| {
                let total = compensated_sum(
                    potato
                        .reward_rates(r)
                        .iter()
                        .zip(cumulative)
                        .map(|(rate, time)| rate * time),
                );
                clamp_non_negative(total, "expected reward").map_err(|e| match e {
                    Error::NumericalInstability(msg) => Error::RewardEvaluation(msg),
                    other => other,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            exits,
            expected_sojourn,
            rewards,
        })
    }

    /// Total exit probability.
    pub fn total_probability(&self) -> f64 {
        compensated_sum(self.exits.values().copied())
    }

    pub fn probability(&self, target: StateId) -> f64 {
        self.exits.get(&target).copied().unwrap_or(0.0)
    }
}

fn clamp_non_negative(value: f64, what: &str) -> Result<f64> {
    if !value.is_finite() {
        return Err(Error::NumericalInstability(format!("{what} is {value}")));
    }
    if value < -NEGATIVE_TOLERANCE {
        return Err(Error::NumericalInstability(format!("{what} is {value}")));
    }
    Ok(value.max(0.0))
}

/// Uniformization rate for `potato` when the firing time has mean `mean`.
///
/// Returns `(q, degenerate)`; `degenerate` is set when the potato has no
/// memoryless exits at all and `1/mean` stands in.
pub fn uniformization_rate(potato: &Potato, mean: f64, rate_factor: f64) -> Result<(f64, bool)> {
    let max_exit = potato.max_exit_rate();
    let (q, degenerate) = if max_exit > 0.0 {
        (rate_factor * max_exit, false)
    } else {
        (1.0 / mean, true)
    };
    if !q.is_finite() || q <= 0.0 {
        return Err(Error::Uniformization(format!(
            "uniformization rate {q} from exit rate {max_exit} and mean {mean}"
        )));
    }
    Ok((q, degenerate))
}

/// Solve `potato` against the firing-time mixture.
///
/// Requires the mixture's rate to be at least the potato's largest exit rate.
pub fn solve_mixture(potato: &Potato, mixture: &PoissonMixture) -> Result<PotatoResult> {
    let q = mixture.rate();
    if !(q.is_finite() && q > 0.0) || q < potato.max_exit_rate() {
        return Err(Error::Uniformization(format!(
            "mixture rate {q} below potato exit rate {}",
            potato.max_exit_rate()
        )));
    }

    let n = potato.len();
    let generator = potato.generator();
    let mut v = vec![0.0; n];
    v[0] = 1.0;
    let mut next = vec![0.0; n];
    let mut firing = vec![0.0; n];
    let mut cumulative = vec![0.0; n];

    for (&w, &tail) in mixture.weights().iter().zip(mixture.tails()) {
        for i in 0..n {
            firing[i] += w * v[i];
            cumulative[i] += tail * v[i] / q;
        }
        if tail == 0.0 {
            break;
        }
        // next = v P = v + v Q / q
        next.copy_from_slice(&v);
        for (i, row) in generator.iter().enumerate() {
            if v[i] == 0.0 {
                continue;
            }
            let scaled = v[i] / q;
            for (j, &rate) in row.iter().enumerate() {
                next[j] += scaled * rate;
            }
        }
        std::mem::swap(&mut v, &mut next);
        if v.iter().sum::<f64>() < NEGLIGIBLE_MASS {
            break;
        }
    }

    PotatoResult::from_occupancy(potato, &firing, &cumulative)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::potato::BoundaryTransition;
    use gsmp_common::EventId;
    use gsmp_math::fox_glynn;

    fn approx_eq(a: f64, b: f64, tol: f64) -> bool {
        (a - b).abs() <= tol
    }

    fn single_state(competing: f64) -> Potato {
        let boundary = if competing > 0.0 {
            vec![BoundaryTransition {
                from: 0,
                target: StateId(2),
                rate: competing,
            }]
        } else {
            vec![]
        };
        Potato::from_parts(
            EventId(0),
            3,
            vec![StateId(0)],
            vec![vec![0.0]],
            boundary,
            vec![vec![(StateId(1), 1.0)]],
            vec![vec![2.0]],
        )
        .unwrap()
    }

    #[test]
    fn tails_complement_weights() {
        let mixture = PoissonMixture::from_weights(1.0, vec![0.5, 0.25, 0.25]);
        assert_eq!(mixture.tails(), &[0.5, 0.25, 0.0]);
        assert!(approx_eq(mixture.mass(), 1.0, 1e-15));
    }

    #[test]
    fn deterministic_race_matches_closed_form() {
        // Fire at d = 1 unless the rate-0.7 competitor wins first.
        let potato = single_state(0.7);
        let q = 0.7 * 1.02;
        let fg = fox_glynn(q * 1.0, 1e-10, 1_000_000).unwrap();
        let mixture = PoissonMixture::from_fox_glynn(q, &fg);
        let result = solve_mixture(&potato, &mixture).unwrap();

        let survive = (-0.7f64).exp();
        assert!(approx_eq(result.probability(StateId(1)), survive, 1e-8));
        assert!(approx_eq(result.probability(StateId(2)), 1.0 - survive, 1e-8));
        let sojourn = (1.0 - survive) / 0.7;
        assert!(approx_eq(result.expected_sojourn, sojourn, 1e-8));
        assert!(approx_eq(result.rewards[0], 2.0 * sojourn, 1e-8));
    }

    #[test]
    fn rate_below_exit_rate_is_rejected() {
        let potato = single_state(2.0);
        let mixture = PoissonMixture::from_weights(1.0, vec![1.0]);
        assert!(matches!(
            solve_mixture(&potato, &mixture),
            Err(Error::Uniformization(_))
        ));
    }

    #[test]
    fn degenerate_rate_uses_mean() {
        let potato = single_state(0.0);
        let (q, degenerate) = uniformization_rate(&potato, 4.0, 1.02).unwrap();
        assert!(degenerate);
        assert!(approx_eq(q, 0.25, 1e-15));

        let potato = single_state(3.0);
        let (q, degenerate) = uniformization_rate(&potato, 4.0, 1.5).unwrap();
        assert!(!degenerate);
        assert!(approx_eq(q, 4.5, 1e-12));
    }

    #[test]
    fn negative_noise_is_clamped_but_real_negatives_fail() {
        assert_eq!(clamp_non_negative(-1e-15, "x").unwrap(), 0.0);
        assert!(clamp_non_negative(-1e-3, "x").is_err());
        assert!(clamp_non_negative(f64::NAN, "x").is_err());
    }
}
