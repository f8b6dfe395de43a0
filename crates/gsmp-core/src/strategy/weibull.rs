//! Weibull firing time: certified polynomial surrogate plus uniformization
//! at representative times.
//!
//! Under `u = (t/λ)^k` a Weibull time is a unit exponential, so the density
//! to approximate is `e^{-u}` whatever the shape and scale. `[0, u_max]`
//! with `u_max = ln(8/ε)` is cut into pieces (a tiny first cell, widths
//! doubling up to `expansion_width`, then constant), and `e^{-u}` is replaced
//! on each piece by its Taylor polynomial about the piece centre.
//!
//! The degree is raised until the certified L1 error is at most `ε/4`. On a
//! piece of width `w` starting at `u₀`, degree `n` is certified by
//!
//! `max |p_{n+2} - p_n| + e^{-u₀} (w/2)^{n+3} / (n+3)!`
//!
//! times `w`. The first term is found with [`Polynomial::max_abs_on`]
//! (critical points through root isolation). The second is the Lagrange
//! remainder of `p_{n+2}`. Mass beyond `u_max` (`ε/8`) is placed at
//! `t_max`.
//!
//! The mixture weights then integrate `Poisson(k; q·t(u))` against the
//! surrogate with Gauss-Legendre nodes in `u`, each piece split so that no
//! cell spans more than one expected uniformization step (`q·Δt <= 1`).

use gsmp_common::{Error, Result};
use gsmp_config::ReductionConfig;
use gsmp_math::distributions::Weibull;
use gsmp_math::{gauss_legendre, FoxGlynnWeights, Polynomial};

use super::{PotatoStrategy, StrategyContext};
use crate::cache::ApproximationKey;
use crate::distribution::DistributionParams;
use crate::potato::Potato;
use crate::transient::{add_scaled, solve_mixture, PoissonMixture, PotatoResult};

/// Tolerance for Gauss-Legendre node isolation before Newton polishing.
const NODE_TOLERANCE: f64 = 1e-10;

/// One piece of the surrogate, a polynomial in `s = u - centre`.
#[derive(Debug, Clone, PartialEq)]
pub struct SurrogatePiece {
    pub start: f64,
    pub end: f64,
    pub centre: f64,
    pub polynomial: Polynomial,
}

impl SurrogatePiece {
    pub fn width(&self) -> f64 {
        self.end - self.start
    }

    pub fn evaluate(&self, u: f64) -> f64 {
        self.polynomial.evaluate(u - self.centre)
    }
}

/// Piecewise Taylor surrogate of the unit-exponential density.
#[derive(Debug, Clone, PartialEq)]
pub struct WeibullSurrogate {
    pieces: Vec<SurrogatePiece>,
    degree: usize,
    error_bound: f64,
    truncation: f64,
}

impl WeibullSurrogate {
    /// Build the lowest-degree surrogate certified to `ε/4`.
    pub fn build(epsilon: f64, config: &ReductionConfig) -> Result<Self> {
        let weibull = &config.weibull;
        let truncation = (8.0 / epsilon).ln();
        let cells = piece_bounds(epsilon, weibull.expansion_width, truncation);
        let target = 0.25 * epsilon;

        let mut best = f64::INFINITY;
        for degree in weibull.min_degree..=weibull.max_degree {
            let bound = certified_bound(&cells, degree, target, config.roots.max_iterations)?;
            best = best.min(bound);
            if bound <= target {
                let pieces = cells
                    .iter()
                    .map(|&(start, end)| {
                        let centre = 0.5 * (start + end);
                        SurrogatePiece {
                            start,
                            end,
                            centre,
                            polynomial: Polynomial::exp_neg_taylor(centre, degree),
                        }
                    })
                    .collect();
                return Ok(Self {
                    pieces,
                    degree,
                    error_bound: bound,
                    truncation,
                });
            }
        }

        Err(Error::ApproximationTolerance(format!(
            "surrogate error bound {best:e} above {target:e} at degree {}",
            weibull.max_degree
        )))
    }

    pub fn pieces(&self) -> &[SurrogatePiece] {
        &self.pieces
    }

    pub fn degree(&self) -> usize {
        self.degree
    }

    /// Certified L1 distance to `e^{-u}` on `[0, truncation]`.
    pub fn error_bound(&self) -> f64 {
        self.error_bound
    }

    /// `u_max`; the surrogate is zero beyond it.
    pub fn truncation(&self) -> f64 {
        self.truncation
    }

    /// Mass of `e^{-u}` beyond the truncation point.
    pub fn tail_mass(&self) -> f64 {
        (-self.truncation).exp()
    }

    /// Surrogate density at `u`.
    pub fn density(&self, u: f64) -> f64 {
        if !(0.0..=self.truncation).contains(&u) {
            return 0.0;
        }
        let index = self
            .pieces
            .partition_point(|p| p.end < u)
            .min(self.pieces.len() - 1);
        self.pieces[index].evaluate(u)
    }
}

/// `[0, u_max]` cut into a tiny first cell, doubling cells, then `width`.
fn piece_bounds(epsilon: f64, width: f64, truncation: f64) -> Vec<(f64, f64)> {
    let mut cells = Vec::new();
    let mut step = (0.125 * epsilon).min(width);
    let mut u = 0.0;
    while u < truncation {
        let next = (u + step).min(truncation);
        cells.push((u, next));
        u = next;
        step = (2.0 * step).min(width);
    }
    cells
}

/// Certified L1 error of the degree-`degree` surrogate, stopping once it
/// passes `target`.
fn certified_bound(
    cells: &[(f64, f64)],
    degree: usize,
    target: f64,
    max_iterations: usize,
) -> Result<f64> {
    let mut total = 0.0;
    let mut remainder_factorial = (1..=degree + 3).fold(1.0, |acc, i| acc * i as f64);
    if !remainder_factorial.is_finite() {
        remainder_factorial = f64::MAX;
    }
    for &(start, end) in cells {
        let width = end - start;
        let half = 0.5 * width;
        let centre = 0.5 * (start + end);
        let low = Polynomial::exp_neg_taylor(centre, degree);
        let high = Polynomial::exp_neg_taylor(centre, degree + 2);
        let difference = &high + &low.scale(-1.0);
        let tolerance = (half * 1e-9).max(f64::EPSILON);
        let (_, truncation) = difference.max_abs_on(-half, half, tolerance, max_iterations)?;
        let remainder = (-start).exp() * half.powi(degree as i32 + 3) / remainder_factorial;
        total += (truncation + remainder) * width;
        if total > target {
            break;
        }
    }
    Ok(total)
}

impl PotatoStrategy for Weibull {
    fn reduce(&self, potato: &Potato, ctx: &StrategyContext<'_>) -> Result<PotatoResult> {
        let q = ctx.uniformization_rate(potato, self.mean())?;
        let key = ApproximationKey::new(&DistributionParams::Weibull(*self), ctx.epsilon());
        let surrogate = ctx
            .cache
            .surrogate(key, || WeibullSurrogate::build(ctx.epsilon(), ctx.config))?;
        let mixture = ctx
            .cache
            .mixture(key.with_rate(q), || weibull_mixture(self, &surrogate, q, ctx.config))?;
        solve_mixture(potato, &mixture)
    }
}

/// `w_k = ∫ e^{-u} Poisson(k; q·t(u)) du` with the surrogate for `e^{-u}`.
pub fn weibull_mixture(
    dist: &Weibull,
    surrogate: &WeibullSurrogate,
    q: f64,
    config: &ReductionConfig,
) -> Result<PoissonMixture> {
    let rule = gauss_legendre(config.weibull.gauss_nodes, NODE_TOLERANCE)?;
    let node_epsilon = 0.25 * config.epsilon;
    let max_iterations = config.fox_glynn.max_iterations;
    let budget = config.weibull.max_cells;
    let mut weights = Vec::new();
    let mut used = 0usize;

    for piece in surrogate.pieces() {
        let t0 = dist.from_unit(piece.start);
        let t1 = dist.from_unit(piece.end);
        let steps = (q * (t1 - t0)).ceil().max(1.0);
        if !steps.is_finite() || steps > (budget - used) as f64 {
            return Err(Error::ApproximationTolerance(format!(
                "Weibull(k={}, λ={}) at q={q} needs more than {budget} integration cells",
                dist.shape, dist.scale
            )));
        }
        let cells = steps as usize;
        used += cells;
        let dt = (t1 - t0) / cells as f64;
        for cell in 0..cells {
            let ua = if cell == 0 {
                piece.start
            } else {
                dist.to_unit(t0 + cell as f64 * dt)
            };
            let ub = if cell + 1 == cells {
                piece.end
            } else {
                dist.to_unit(t0 + (cell + 1) as f64 * dt)
            };
            for (u, g) in rule.mapped(ua, ub) {
                let mass = g * piece.evaluate(u);
                let fg = FoxGlynnWeights::for_time(q, dist.from_unit(u), node_epsilon, max_iterations)?;
                add_scaled(&mut weights, &fg, mass);
            }
        }
    }

    let t_max = dist.from_unit(surrogate.truncation());
    let fg = FoxGlynnWeights::for_time(q, t_max, node_epsilon, max_iterations)?;
    add_scaled(&mut weights, &fg, surrogate.tail_mass());

    Ok(PoissonMixture::from_weights(q, weights))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ApproximationCache;
    use crate::strategy::test_support::single_state;
    use gsmp_common::StateId;

    fn approx_eq(a: f64, b: f64, tol: f64) -> bool {
        (a - b).abs() <= tol
    }

    /// Composite Simpson of `f` on `[a, b]`.
    fn simpson(f: impl Fn(f64) -> f64, a: f64, b: f64, panels: usize) -> f64 {
        let h = (b - a) / panels as f64;
        let mut sum = f(a) + f(b);
        for i in 1..panels {
            let x = a + i as f64 * h;
            sum += if i % 2 == 1 { 4.0 * f(x) } else { 2.0 * f(x) };
        }
        sum * h / 3.0
    }

    #[test]
    fn pieces_cover_truncated_range() {
        let cells = piece_bounds(1e-6, 0.5, (8e6f64).ln());
        assert_eq!(cells[0].0, 0.0);
        assert!(approx_eq(cells[0].1, 1.25e-7, 1e-20));
        for pair in cells.windows(2) {
            assert_eq!(pair[0].1, pair[1].0);
            assert!(pair[1].1 - pair[1].0 <= 0.5 + 1e-15);
        }
        assert_eq!(cells.last().unwrap().1, (8e6f64).ln());
    }

    #[test]
    fn surrogate_is_certified() {
        let config = ReductionConfig::default();
        let surrogate = WeibullSurrogate::build(1e-6, &config).unwrap();
        assert!(surrogate.error_bound() <= 0.25e-6);
        assert!(surrogate.degree() >= config.weibull.min_degree);
        assert!(approx_eq(surrogate.tail_mass(), 1.25e-7, 1e-15));

        // Pointwise error integrates to below the certified bound.
        let integrated_error = simpson(
            |u| (surrogate.density(u) - (-u).exp()).abs(),
            0.0,
            surrogate.truncation(),
            20_000,
        );
        assert!(integrated_error <= surrogate.error_bound() * 1.01 + 1e-12);
        assert_eq!(surrogate.density(surrogate.truncation() + 1.0), 0.0);
    }

    #[test]
    fn degree_budget_is_enforced() {
        let mut config = ReductionConfig::default();
        config.weibull.min_degree = 1;
        config.weibull.max_degree = 1;
        let err = WeibullSurrogate::build(1e-10, &config).unwrap_err();
        assert!(matches!(err, Error::ApproximationTolerance(_)));
    }

    #[test]
    fn race_matches_reference_integral() {
        let epsilon = 1e-6;
        let config = ReductionConfig::default().with_epsilon(epsilon);
        let cache = ApproximationCache::default();
        let ctx = StrategyContext::new(&config, &cache);

        for (shape, scale, mu) in [(2.0, 1.5, 0.8), (3.0, 0.7, 2.0), (1.0, 2.0, 0.5)] {
            let dist = Weibull { shape, scale };
            let result = dist.reduce(&single_state(mu, 1.0), &ctx).unwrap();

            // P(T < X) = E[e^{-μT}], E[min(T, X)] = ∫ S(t) e^{-μt} dt.
            let horizon = dist.survival_quantile(1e-18);
            let fire = simpson(|t| dist.pdf(t) * (-mu * t).exp(), 0.0, horizon, 200_000);
            let sojourn = simpson(|t| dist.survival(t) * (-mu * t).exp(), 0.0, horizon, 200_000);

            let p = result.probability(StateId(1));
            assert!(approx_eq(p, fire, epsilon), "shape {shape}: {p} vs {fire}");
            assert!(approx_eq(result.total_probability(), 1.0, epsilon));
            assert!(approx_eq(result.expected_sojourn, sojourn, 10.0 * epsilon));
        }
    }

    #[test]
    fn exponential_special_case() {
        // Weibull(1, λ) is Exp(1/λ): P(fire) = (1/λ) / (1/λ + μ).
        let config = ReductionConfig::default();
        let cache = ApproximationCache::default();
        let ctx = StrategyContext::new(&config, &cache);
        let (scale, mu) = (0.5, 1.0);
        let result = Weibull { shape: 1.0, scale }
            .reduce(&single_state(mu, 1.0), &ctx)
            .unwrap();
        let rate = 1.0 / scale;
        assert!(approx_eq(result.probability(StateId(1)), rate / (rate + mu), 1e-6));
    }

    #[test]
    fn cell_budget_is_enforced() {
        let mut config = ReductionConfig::default();
        config.weibull.max_cells = 64;
        let cache = ApproximationCache::default();
        let ctx = StrategyContext::new(&config, &cache);
        // Heavy tail at a fast competing rate: q·t_max runs into the thousands.
        let err = Weibull { shape: 0.5, scale: 10.0 }
            .reduce(&single_state(50.0, 1.0), &ctx)
            .unwrap_err();
        assert!(matches!(err, Error::ApproximationTolerance(_)));
    }

    #[test]
    fn surrogate_is_shared_across_potatoes() {
        let config = ReductionConfig::default();
        let cache = ApproximationCache::default();
        let ctx = StrategyContext::new(&config, &cache);
        let dist = Weibull { shape: 2.0, scale: 1.0 };
        dist.reduce(&single_state(1.0, 1.0), &ctx).unwrap();
        dist.reduce(&single_state(3.0, 1.0), &ctx).unwrap();
        let stats = cache.stats();
        assert_eq!(stats.surrogates, 1);
        assert_eq!(stats.mixtures, 2);
        assert_eq!(stats.hits, 1);
    }
}
