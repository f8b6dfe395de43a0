//! Gauss-Legendre quadrature rules.
//!
//! Nodes are the roots of the Legendre polynomial `P_n`, located with the
//! polynomial root isolator and then polished by Newton steps on the
//! three-term recurrence (the monomial form loses digits near `±1`).

use serde::{Deserialize, Serialize};

use super::polynomial::Polynomial;
use crate::error::{NumericError, NumericResult};

/// Largest supported rule; beyond this the monomial Legendre form is too
/// ill-conditioned for isolation.
pub const MAX_GAUSS_LEGENDRE_NODES: usize = 48;

const NEWTON_STEPS: usize = 8;

/// Bisection budget for `P_n` and its derivative chain (about `n²/2` roots).
const LEGENDRE_ROOT_BUDGET: usize = 1_000_000;

/// Nodes and weights on `[-1, 1]`, nodes ascending.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GaussLegendreRule {
    nodes: Vec<f64>,
    weights: Vec<f64>,
}

impl GaussLegendreRule {
    pub fn nodes(&self) -> &[f64] {
        &self.nodes
    }

    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Nodes and weights affinely mapped onto `[a, b]`.
    pub fn mapped(&self, a: f64, b: f64) -> impl Iterator<Item = (f64, f64)> + '_ {
        let half = 0.5 * (b - a);
        let mid = 0.5 * (a + b);
        self.nodes
            .iter()
            .zip(&self.weights)
            .map(move |(&x, &w)| (mid + half * x, half * w))
    }

    /// `∫_a^b f`, exact for polynomials of degree `< 2n`.
    pub fn integrate(&self, a: f64, b: f64, f: impl Fn(f64) -> f64) -> f64 {
        self.mapped(a, b).map(|(x, w)| w * f(x)).sum()
    }
}

/// Legendre polynomial `P_n` in monomial form.
pub fn legendre(n: usize) -> Polynomial {
    let mut prev = Polynomial::constant(1.0);
    if n == 0 {
        return prev;
    }
    let x = Polynomial::new(vec![0.0, 1.0]);
    let mut curr = x.clone();
    for k in 1..n {
        // (k+1) P_{k+1} = (2k+1) x P_k - k P_{k-1}
        let kf = k as f64;
        let lead = (&x * &curr).scale((2.0 * kf + 1.0) / (kf + 1.0));
        let next = &lead + &prev.scale(-kf / (kf + 1.0));
        prev = curr;
        curr = next;
    }
    curr
}

/// `(P_n(x), P_n'(x))` by the three-term recurrence.
fn legendre_with_derivative(n: usize, x: f64) -> (f64, f64) {
    let mut p0 = 1.0;
    let mut p1 = x;
    for k in 1..n {
        let kf = k as f64;
        let p2 = ((2.0 * kf + 1.0) * x * p1 - kf * p0) / (kf + 1.0);
        p0 = p1;
        p1 = p2;
    }
    let nf = n as f64;
    let dp = nf * (x * p1 - p0) / (x * x - 1.0);
    (p1, dp)
}

/// Build the `n`-point Gauss-Legendre rule.
///
/// `epsilon` is the isolation width before Newton polishing.
pub fn gauss_legendre(n: usize, epsilon: f64) -> NumericResult<GaussLegendreRule> {
    if n == 0 || n > MAX_GAUSS_LEGENDRE_NODES {
        return Err(NumericError::invalid(
            "n",
            format!("node count must lie in 1..={MAX_GAUSS_LEGENDRE_NODES}, got {n}"),
        ));
    }
    if n == 1 {
        return Ok(GaussLegendreRule {
            nodes: vec![0.0],
            weights: vec![2.0],
        });
    }

    let roots =
        legendre(n).isolate_real_roots_with_budget(-1.0, 1.0, epsilon, LEGENDRE_ROOT_BUDGET)?;
    if roots.len() != n {
        return Err(NumericError::RootIsolation {
            lower: -1.0,
            upper: 1.0,
            reason: format!("expected {n} Legendre roots, isolated {}", roots.len()),
        });
    }

    let mut nodes = Vec::with_capacity(n);
    let mut weights = Vec::with_capacity(n);
    for mut x in roots {
        for _ in 0..NEWTON_STEPS {
            let (p, dp) = legendre_with_derivative(n, x);
            let step = p / dp;
            x -= step;
            if step.abs() < 1e-16 {
                break;
            }
        }
        let (_, dp) = legendre_with_derivative(n, x);
        nodes.push(x);
        weights.push(2.0 / ((1.0 - x * x) * dp * dp));
    }

    Ok(GaussLegendreRule { nodes, weights })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq(a: f64, b: f64, tol: f64) -> bool {
        (a - b).abs() <= tol
    }

    #[test]
    fn two_point_rule() {
        let rule = gauss_legendre(2, 1e-10).unwrap();
        let r = 1.0 / 3.0f64.sqrt();
        assert!(approx_eq(rule.nodes()[0], -r, 1e-14));
        assert!(approx_eq(rule.nodes()[1], r, 1e-14));
        assert!(approx_eq(rule.weights()[0], 1.0, 1e-13));
    }

    #[test]
    fn weights_sum_to_interval_length() {
        for n in [1, 3, 5, 8, 12, 20] {
            let rule = gauss_legendre(n, 1e-10).unwrap();
            let sum: f64 = rule.weights().iter().sum();
            assert!(approx_eq(sum, 2.0, 1e-12), "n={n} sum={sum}");
            assert!(rule.weights().iter().all(|w| *w > 0.0));
        }
    }

    #[test]
    fn exact_for_high_degree_monomials() {
        let n = 6;
        let rule = gauss_legendre(n, 1e-10).unwrap();
        // ∫_0^2 x^11 dx = 2^12 / 12
        let got = rule.integrate(0.0, 2.0, |x| x.powi(11));
        let expected = 4096.0 / 12.0;
        assert!(approx_eq(got, expected, 1e-9 * expected));
    }

    #[test]
    fn integrates_exponential_accurately() {
        let rule = gauss_legendre(10, 1e-10).unwrap();
        let got = rule.integrate(0.0, 1.0, |u| (-u).exp());
        assert!(approx_eq(got, 1.0 - (-1.0f64).exp(), 1e-14));
    }

    #[test]
    fn legendre_three() {
        // P_3 = (5x^3 - 3x) / 2
        let p = legendre(3);
        let c = p.coefficients();
        assert!(approx_eq(c[0], 0.0, 1e-15));
        assert!(approx_eq(c[1], -1.5, 1e-15));
        assert!(approx_eq(c[3], 2.5, 1e-15));
    }

    #[test]
    fn rejects_bad_sizes() {
        assert!(gauss_legendre(0, 1e-10).is_err());
        assert!(gauss_legendre(MAX_GAUSS_LEGENDRE_NODES + 1, 1e-10).is_err());
    }
}
