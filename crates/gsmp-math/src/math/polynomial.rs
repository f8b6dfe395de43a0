//! Real polynomials and real root isolation.
//!
//! Coefficients are stored in ascending order: `coeffs[i]` multiplies `x^i`.
//! Root isolation works recursively through the derivative: the real roots
//! of `p'` split the interval into monotone segments, each of which holds at
//! most one root of `p`, found by bisection on a sign change. Roots where `p`
//! only touches zero (even multiplicity) are picked up at the critical points.
//! A segment whose two ends are both within rounding of zero cannot be
//! resolved in floating point and is reported as a root isolation failure.

use serde::{Deserialize, Serialize};
use std::ops::{Add, Mul};

use crate::error::{NumericError, NumericResult};

/// Default bisection budget shared by all segments of one isolation call.
pub const DEFAULT_ROOT_MAX_ITERATIONS: usize = 10_000;

/// Relative size under which a value at a critical point counts as a root.
const TOUCH_TOLERANCE: f64 = 1e-12;

/// How `p(x)` compares with zero once rounding is accounted for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Vanishing {
    /// Clearly nonzero.
    No,
    /// Every term is zero or below the normal range.
    Terms,
    /// Nonzero terms cancel to within rounding.
    Cancellation,
}

impl Vanishing {
    fn is_zero(self) -> bool {
        self != Vanishing::No
    }
}

/// A polynomial with real coefficients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Polynomial {
    coeffs: Vec<f64>,
}

impl Polynomial {
    /// Build from ascending coefficients. Trailing zeros are dropped.
    pub fn new(coeffs: Vec<f64>) -> Self {
        let mut p = Self { coeffs };
        p.trim();
        p
    }

    /// The zero polynomial.
    pub fn zero() -> Self {
        Self { coeffs: vec![0.0] }
    }

    /// A constant polynomial.
    pub fn constant(c: f64) -> Self {
        Self::new(vec![c])
    }

    /// Monic polynomial with the given roots: ∏ (x - rᵢ).
    pub fn from_roots(roots: &[f64]) -> Self {
        roots.iter().fold(Self::constant(1.0), |acc, &r| {
            &acc * &Self::new(vec![-r, 1.0])
        })
    }

    /// Ascending coefficients.
    pub fn coefficients(&self) -> &[f64] {
        &self.coeffs
    }

    /// Degree (the zero polynomial has degree 0).
    pub fn degree(&self) -> usize {
        self.coeffs.len().saturating_sub(1)
    }

    pub fn is_zero(&self) -> bool {
        self.coeffs.iter().all(|&c| c == 0.0)
    }

    /// Horner evaluation.
    pub fn evaluate(&self, x: f64) -> f64 {
        self.coeffs.iter().rev().fold(0.0, |acc, &c| acc * x + c)
    }

    /// Term-wise derivative.
    pub fn differentiate(&self) -> Self {
        if self.coeffs.len() <= 1 {
            return Self::zero();
        }
        Self::new(
            self.coeffs
                .iter()
                .enumerate()
                .skip(1)
                .map(|(i, &c)| c * i as f64)
                .collect(),
        )
    }

    /// Multiply every coefficient by `factor`.
    pub fn scale(&self, factor: f64) -> Self {
        Self::new(self.coeffs.iter().map(|c| c * factor).collect())
    }

    /// `sum |c_i| |x|^i`, the scale of the rounding error in [`Self::evaluate`].
    fn magnitude_at(&self, x: f64) -> f64 {
        let ax = x.abs();
        self.coeffs
            .iter()
            .rev()
            .fold(0.0, |acc, &c| acc * ax + c.abs())
    }

    fn vanishing_at(&self, x: f64, fx: f64) -> Vanishing {
        let magnitude = self.magnitude_at(x);
        if magnitude < f64::MIN_POSITIVE {
            Vanishing::Terms
        } else if fx.abs() <= TOUCH_TOLERANCE * magnitude {
            Vanishing::Cancellation
        } else {
            Vanishing::No
        }
    }

    fn trim(&mut self) {
        while self.coeffs.len() > 1 && self.coeffs.last() == Some(&0.0) {
            self.coeffs.pop();
        }
        if self.coeffs.is_empty() {
            self.coeffs.push(0.0);
        }
    }

    /// Real roots in `[lower, upper]`, each refined to width below `epsilon`.
    pub fn isolate_real_roots(
        &self,
        lower: f64,
        upper: f64,
        epsilon: f64,
    ) -> NumericResult<Vec<f64>> {
        self.isolate_real_roots_with_budget(lower, upper, epsilon, DEFAULT_ROOT_MAX_ITERATIONS)
    }

    /// [`Self::isolate_real_roots`] with an explicit bisection budget.
    pub fn isolate_real_roots_with_budget(
        &self,
        lower: f64,
        upper: f64,
        epsilon: f64,
        max_iterations: usize,
    ) -> NumericResult<Vec<f64>> {
        if !lower.is_finite() || !upper.is_finite() || lower > upper {
            return Err(NumericError::invalid(
                "interval",
                format!("[{lower}, {upper}] is not a finite ordered interval"),
            ));
        }
        if !(epsilon > 0.0) || !epsilon.is_finite() {
            return Err(NumericError::invalid(
                "epsilon",
                format!("must be positive and finite, got {epsilon}"),
            ));
        }
        if self.coeffs.iter().any(|c| !c.is_finite()) {
            return Err(NumericError::RootIsolation {
                lower,
                upper,
                reason: "non-finite coefficient".to_string(),
            });
        }
        let mut budget = max_iterations;
        self.roots_in(lower, upper, epsilon, &mut budget)
    }

    fn roots_in(
        &self,
        lower: f64,
        upper: f64,
        epsilon: f64,
        budget: &mut usize,
    ) -> NumericResult<Vec<f64>> {
        if self.is_zero() {
            return Err(NumericError::RootIsolation {
                lower,
                upper,
                reason: "zero polynomial vanishes on the whole interval".to_string(),
            });
        }
        match self.degree() {
            0 => return Ok(Vec::new()),
            1 => {
                let root = -self.coeffs[0] / self.coeffs[1];
                return Ok(if root >= lower && root <= upper {
                    vec![root]
                } else {
                    Vec::new()
                });
            }
            _ => {}
        }

        // Critical points are located more tightly than the requested roots
        // so the monotone segments are split in the right place.
        let critical_eps = (epsilon * 1e-3).max((upper - lower).abs() * 1e-15);
        let critical = self
            .differentiate()
            .roots_in(lower, upper, critical_eps.max(f64::MIN_POSITIVE), budget)?;

        let mut breakpoints = Vec::with_capacity(critical.len() + 2);
        breakpoints.push(lower);
        breakpoints.extend(critical.iter().copied().filter(|&c| c > lower && c < upper));
        breakpoints.push(upper);

        let mut roots: Vec<f64> = Vec::new();
        let push_root = |roots: &mut Vec<f64>, r: f64| {
            if roots.last().is_none_or(|&last| (r - last).abs() >= epsilon) {
                roots.push(r);
            }
        };

        for window in breakpoints.windows(2) {
            let (x0, x1) = (window[0], window[1]);
            let f0 = self.evaluate(x0);
            let f1 = self.evaluate(x1);
            if !f0.is_finite() || !f1.is_finite() {
                return Err(NumericError::RootIsolation {
                    lower: x0,
                    upper: x1,
                    reason: "non-finite polynomial value".to_string(),
                });
            }
            let v0 = self.vanishing_at(x0, f0);
            let v1 = self.vanishing_at(x1, f1);
            if v0.is_zero() && v1.is_zero() && (v0, v1) != (Vanishing::Terms, Vanishing::Terms) {
                return Err(NumericError::RootIsolation {
                    lower: x0,
                    upper: x1,
                    reason: "polynomial within rounding of zero across a monotone segment"
                        .to_string(),
                });
            }
            if v0.is_zero() {
                push_root(&mut roots, x0);
                continue;
            }
            if f0.signum() != f1.signum() && f1 != 0.0 {
                let r = self.bisect(x0, x1, f0, epsilon, budget)?;
                push_root(&mut roots, r);
            }
        }
        if self.vanishing_at(upper, self.evaluate(upper)).is_zero() {
            push_root(&mut roots, upper);
        }
        Ok(roots)
    }

    fn bisect(
        &self,
        mut x0: f64,
        mut x1: f64,
        mut f0: f64,
        epsilon: f64,
        budget: &mut usize,
    ) -> NumericResult<f64> {
        while x1 - x0 >= epsilon {
            if *budget == 0 {
                return Err(NumericError::RootIsolation {
                    lower: x0,
                    upper: x1,
                    reason: "iteration budget exhausted before reaching tolerance".to_string(),
                });
            }
            *budget -= 1;
            let mid = 0.5 * (x0 + x1);
            if mid <= x0 || mid >= x1 {
                // Bracket is at floating-point resolution.
                break;
            }
            let fm = self.evaluate(mid);
            if fm.is_nan() {
                return Err(NumericError::RootIsolation {
                    lower: x0,
                    upper: x1,
                    reason: "lost sign change inside bracket".to_string(),
                });
            }
            if fm == 0.0 {
                return Ok(mid);
            }
            if fm.signum() == f0.signum() {
                x0 = mid;
                f0 = fm;
            } else {
                x1 = mid;
            }
        }
        Ok(0.5 * (x0 + x1))
    }

    /// Degree-`degree` Taylor polynomial of `exp(-u)` about `centre`, in the
    /// shifted variable `s = u - centre`.
    pub fn exp_neg_taylor(centre: f64, degree: usize) -> Self {
        let mut coeffs = Vec::with_capacity(degree + 1);
        let mut term = (-centre).exp();
        for n in 0..=degree {
            if n > 0 {
                term *= -1.0 / n as f64;
            }
            coeffs.push(term);
        }
        Self::new(coeffs)
    }

    /// Maximum of `|p|` on `[lower, upper]` and where it is attained.
    ///
    /// Candidates are the endpoints and the real roots of `p'`.
    pub fn max_abs_on(
        &self,
        lower: f64,
        upper: f64,
        epsilon: f64,
        max_iterations: usize,
    ) -> NumericResult<(f64, f64)> {
        let derivative = self.differentiate();
        let mut candidates = vec![lower, upper];
        if !derivative.is_zero() {
            candidates.extend(derivative.isolate_real_roots_with_budget(
                lower,
                upper,
                epsilon,
                max_iterations,
            )?);
        }
        let mut best = (lower, self.evaluate(lower).abs());
        for x in candidates {
            let v = self.evaluate(x).abs();
            if v > best.1 {
                best = (x, v);
            }
        }
        Ok(best)
    }
}

impl Add for &Polynomial {
    type Output = Polynomial;

    fn add(self, rhs: &Polynomial) -> Polynomial {
        let n = self.coeffs.len().max(rhs.coeffs.len());
        let coeffs = (0..n)
            .map(|i| self.coeffs.get(i).unwrap_or(&0.0) + rhs.coeffs.get(i).unwrap_or(&0.0))
            .collect();
        Polynomial::new(coeffs)
    }
}

impl Mul for &Polynomial {
    type Output = Polynomial;

    fn mul(self, rhs: &Polynomial) -> Polynomial {
        let mut coeffs = vec![0.0; self.coeffs.len() + rhs.coeffs.len() - 1];
        for (i, a) in self.coeffs.iter().enumerate() {
            for (j, b) in rhs.coeffs.iter().enumerate() {
                coeffs[i + j] += a * b;
            }
        }
        Polynomial::new(coeffs)
    }
}
