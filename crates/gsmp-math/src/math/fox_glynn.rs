//! Fox-Glynn truncated Poisson weights for uniformization.
//!
//! For `N ~ Poisson(μ)` with `μ = q·t`, transient probabilities of a CTMC
//! with uniformization rate `q` are `π(t) = Σ_k P[N = k] · v₀ Pᵏ`. Only a
//! window `[L, R]` around the mode carries non-negligible mass, so the weights
//! are computed there and nowhere else.
//!
//! The weights start at `1` on the mode and follow the ratio recurrence
//! `w_{k+1} = w_k · μ/(k+1)` outwards, so nothing overflows however large `μ`
//! is, and expansion stops before terms underflow. After each step the
//! remaining tail is bounded by a geometric series (ratios shrink monotonically
//! away from the mode); a side stops once its bound falls below `ε/2` of the
//! mass collected so far.
//!
//! Normalisation divides by `W + T` (collected mass plus both tail bounds),
//! so every stored weight is a lower bound on the true probability and their
//! sum lies in `[1 - ε, 1]`.

use serde::{Deserialize, Serialize};

use crate::error::{NumericError, NumericResult};

/// Default cap on recurrence steps (both sides together).
pub const DEFAULT_FOX_GLYNN_MAX_ITERATIONS: usize = 10_000_000;

/// Truncated Poisson weights over `[left, right]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FoxGlynnWeights {
    left: usize,
    right: usize,
    weights: Vec<f64>,
    total_weight: f64,
    rate: f64,
    epsilon: f64,
}

impl FoxGlynnWeights {
    /// Weights for uniformization rate `q` and mission time `t`.
    pub fn for_time(q: f64, t: f64, epsilon: f64, max_iterations: usize) -> NumericResult<Self> {
        let rate = q * t;
        if !q.is_finite() || !t.is_finite() {
            return Err(NumericError::Uniformization {
                rate,
                reason: format!("non-finite rate {q} or time {t}"),
            });
        }
        fox_glynn(rate, epsilon, max_iterations)
    }

    /// Left truncation index L.
    pub fn left(&self) -> usize {
        self.left
    }

    /// Right truncation index R.
    pub fn right(&self) -> usize {
        self.right
    }

    /// Weights for `k = L..=R`.
    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    /// Sum of the stored weights (`≥ 1 - ε`).
    pub fn total_weight(&self) -> f64 {
        self.total_weight
    }

    /// Poisson parameter `μ = q·t`.
    pub fn rate(&self) -> f64 {
        self.rate
    }

    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    /// Weight of `k`, zero outside the window.
    pub fn weight(&self, k: usize) -> f64 {
        if k < self.left || k > self.right {
            return 0.0;
        }
        self.weights[k - self.left]
    }

    /// `(k, weight)` pairs over the window.
    pub fn iter(&self) -> impl Iterator<Item = (usize, f64)> + '_ {
        self.weights
            .iter()
            .enumerate()
            .map(move |(i, &w)| (self.left + i, w))
    }
}

/// Compute Fox-Glynn weights for `Poisson(rate)` with total truncation error
/// at most `epsilon`.
pub fn fox_glynn(rate: f64, epsilon: f64, max_iterations: usize) -> NumericResult<FoxGlynnWeights> {
    if !rate.is_finite() || rate < 0.0 {
        return Err(NumericError::Uniformization {
            rate,
            reason: "Poisson rate must be finite and non-negative".to_string(),
        });
    }
    if !(epsilon > 0.0 && epsilon < 1.0) {
        return Err(NumericError::invalid(
            "epsilon",
            format!("must lie in (0, 1), got {epsilon}"),
        ));
    }
    if rate == 0.0 {
        return Ok(FoxGlynnWeights {
            left: 0,
            right: 0,
            weights: vec![1.0],
            total_weight: 1.0,
            rate,
            epsilon,
        });
    }

    let mode = rate.floor();
    if mode >= usize::MAX as f64 {
        return Err(NumericError::Uniformization {
            rate,
            reason: "Poisson mode exceeds addressable range".to_string(),
        });
    }
    let mode = mode as usize;
    let half_eps = epsilon / 2.0;
    let mut iterations = 0usize;

    // Right side, starting with the mode itself.
    let mut right_weights = vec![1.0f64];
    let mut collected = 1.0f64;
    let mut k = mode;
    let right_tail = loop {
        let w = *right_weights.last().unwrap_or(&0.0);
        let ratio = rate / (k as f64 + 1.0);
        if w == 0.0 {
            break 0.0;
        }
        if ratio < 1.0 {
            let bound = w * ratio / (1.0 - ratio);
            if bound <= half_eps * collected {
                break bound;
            }
        }
        iterations += 1;
        if iterations > max_iterations {
            return Err(NumericError::Uniformization {
                rate,
                reason: format!("right truncation did not settle within {max_iterations} steps"),
            });
        }
        let next = w * ratio;
        right_weights.push(next);
        collected += next;
        k += 1;
    };
    let right = k;

    // Left side, walking down from the mode.
    let mut left_weights: Vec<f64> = Vec::new();
    let mut k = mode;
    let mut w = 1.0f64;
    let left_tail = loop {
        if k == 0 || w == 0.0 {
            break 0.0;
        }
        let ratio = k as f64 / rate;
        if ratio < 1.0 {
            let bound = w * ratio / (1.0 - ratio);
            if bound <= half_eps * collected {
                break bound;
            }
        }
        iterations += 1;
        if iterations > max_iterations {
            return Err(NumericError::Uniformization {
                rate,
                reason: format!("left truncation did not settle within {max_iterations} steps"),
            });
        }
        w *= ratio;
        left_weights.push(w);
        collected += w;
        k -= 1;
    };
    let left = k;

    left_weights.reverse();
    left_weights.extend(right_weights);
    let raw = left_weights;

    let norm = collected + left_tail + right_tail;
    let weights: Vec<f64> = raw.iter().map(|w| w / norm).collect();
    let total_weight = weights.iter().sum();

    Ok(FoxGlynnWeights {
        left,
        right,
        weights,
        total_weight,
        rate,
        epsilon,
    })
}
