//! Firing-time distributions of the closed family.
//!
//! Each family is a small validated parameter struct in the style of the
//! conjugate-model types: `new` returns `None` outside the domain, and the
//! methods assume valid parameters.

use serde::{Deserialize, Serialize};

use super::gamma::gamma_p;
use super::stable::{gamma_fn, log_gamma};

fn positive(x: f64) -> bool {
    x.is_finite() && x > 0.0
}

/// `Exp(rate)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Exponential {
    pub rate: f64,
}

impl Exponential {
    pub fn new(rate: f64) -> Option<Self> {
        positive(rate).then_some(Self { rate })
    }

    pub fn pdf(&self, t: f64) -> f64 {
        if t < 0.0 {
            0.0
        } else {
            self.rate * (-self.rate * t).exp()
        }
    }

    pub fn cdf(&self, t: f64) -> f64 {
        if t <= 0.0 {
            0.0
        } else {
            -(-self.rate * t).exp_m1()
        }
    }

    pub fn survival(&self, t: f64) -> f64 {
        if t <= 0.0 {
            1.0
        } else {
            (-self.rate * t).exp()
        }
    }

    pub fn mean(&self) -> f64 {
        1.0 / self.rate
    }
}

/// Deterministic delay.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Dirac {
    pub delay: f64,
}

impl Dirac {
    pub fn new(delay: f64) -> Option<Self> {
        positive(delay).then_some(Self { delay })
    }

    pub fn cdf(&self, t: f64) -> f64 {
        if t >= self.delay {
            1.0
        } else {
            0.0
        }
    }

    pub fn survival(&self, t: f64) -> f64 {
        1.0 - self.cdf(t)
    }

    pub fn mean(&self) -> f64 {
        self.delay
    }
}

/// Sum of `phases` independent `Exp(rate)` delays.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Erlang {
    pub phases: u32,
    pub rate: f64,
}

impl Erlang {
    pub fn new(phases: u32, rate: f64) -> Option<Self> {
        (phases >= 1 && positive(rate)).then_some(Self { phases, rate })
    }

    pub fn pdf(&self, t: f64) -> f64 {
        if t < 0.0 {
            return 0.0;
        }
        if t == 0.0 {
            return if self.phases == 1 { self.rate } else { 0.0 };
        }
        let k = self.phases as f64;
        let log_pdf = k * self.rate.ln() + (k - 1.0) * t.ln() - self.rate * t - log_gamma(k);
        log_pdf.exp()
    }

    /// `P(k, λt)`.
    pub fn cdf(&self, t: f64) -> f64 {
        if t <= 0.0 {
            0.0
        } else {
            gamma_p(self.phases as f64, self.rate * t)
        }
    }

    pub fn survival(&self, t: f64) -> f64 {
        1.0 - self.cdf(t)
    }

    pub fn mean(&self) -> f64 {
        self.phases as f64 / self.rate
    }
}

/// `U[lower, upper]` with `0 <= lower < upper`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Uniform {
    pub lower: f64,
    pub upper: f64,
}

impl Uniform {
    pub fn new(lower: f64, upper: f64) -> Option<Self> {
        (lower.is_finite() && upper.is_finite() && lower >= 0.0 && upper > lower)
            .then_some(Self { lower, upper })
    }

    pub fn pdf(&self, t: f64) -> f64 {
        if t < self.lower || t > self.upper {
            0.0
        } else {
            1.0 / (self.upper - self.lower)
        }
    }

    pub fn cdf(&self, t: f64) -> f64 {
        ((t - self.lower) / (self.upper - self.lower)).clamp(0.0, 1.0)
    }

    pub fn survival(&self, t: f64) -> f64 {
        1.0 - self.cdf(t)
    }

    pub fn mean(&self) -> f64 {
        0.5 * (self.lower + self.upper)
    }
}

/// `Weibull(shape k, scale λ)`: survival `exp(-(t/λ)^k)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Weibull {
    pub shape: f64,
    pub scale: f64,
}

impl Weibull {
    pub fn new(shape: f64, scale: f64) -> Option<Self> {
        (positive(shape) && positive(scale)).then_some(Self { shape, scale })
    }

    pub fn pdf(&self, t: f64) -> f64 {
        if t < 0.0 {
            return 0.0;
        }
        let z = t / self.scale;
        if t == 0.0 {
            return match self.shape {
                k if k < 1.0 => f64::INFINITY,
                k if k == 1.0 => 1.0 / self.scale,
                _ => 0.0,
            };
        }
        (self.shape / self.scale) * z.powf(self.shape - 1.0) * (-z.powf(self.shape)).exp()
    }

    pub fn cdf(&self, t: f64) -> f64 {
        if t <= 0.0 {
            0.0
        } else {
            -(-(t / self.scale).powf(self.shape)).exp_m1()
        }
    }

    pub fn survival(&self, t: f64) -> f64 {
        if t <= 0.0 {
            1.0
        } else {
            (-(t / self.scale).powf(self.shape)).exp()
        }
    }

    /// `λ Γ(1 + 1/k)`.
    pub fn mean(&self) -> f64 {
        self.scale * gamma_fn(1.0 + 1.0 / self.shape)
    }

    /// Time `t` with `cdf(t) = p`, for `p` in `[0, 1)`.
    pub fn quantile(&self, p: f64) -> f64 {
        if !(0.0..1.0).contains(&p) {
            return f64::NAN;
        }
        self.scale * (-(-p).ln_1p()).powf(1.0 / self.shape)
    }

    /// Time `t` with `survival(t) = tail`, for `tail` in `(0, 1]`.
    pub fn survival_quantile(&self, tail: f64) -> f64 {
        if !(tail > 0.0 && tail <= 1.0) {
            return f64::NAN;
        }
        self.scale * (-tail.ln()).powf(1.0 / self.shape)
    }

    /// Map a time to the unit-exponential variable `u = (t/λ)^k`.
    pub fn to_unit(&self, t: f64) -> f64 {
        (t / self.scale).powf(self.shape)
    }

    /// Inverse of [`Self::to_unit`].
    pub fn from_unit(&self, u: f64) -> f64 {
        self.scale * u.powf(1.0 / self.shape)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq(a: f64, b: f64, tol: f64) -> bool {
        (a - b).abs() <= tol
    }

    #[test]
    fn domains_enforced() {
        assert!(Exponential::new(0.0).is_none());
        assert!(Exponential::new(f64::NAN).is_none());
        assert!(Dirac::new(-1.0).is_none());
        assert!(Erlang::new(0, 1.0).is_none());
        assert!(Uniform::new(2.0, 2.0).is_none());
        assert!(Uniform::new(-1.0, 2.0).is_none());
        assert!(Weibull::new(1.0, 0.0).is_none());
        assert!(Uniform::new(0.0, 1.0).is_some());
    }

    #[test]
    fn erlang_one_is_exponential() {
        let e = Exponential::new(2.0).unwrap();
        let k = Erlang::new(1, 2.0).unwrap();
        for t in [0.1, 0.5, 1.0, 3.0] {
            assert!(approx_eq(e.cdf(t), k.cdf(t), 1e-12));
            assert!(approx_eq(e.pdf(t), k.pdf(t), 1e-12));
        }
        assert_eq!(e.mean(), k.mean());
    }

    #[test]
    fn weibull_shape_one_is_exponential() {
        let w = Weibull::new(1.0, 0.5).unwrap();
        let e = Exponential::new(2.0).unwrap();
        for t in [0.0, 0.2, 1.0, 4.0] {
            assert!(approx_eq(w.survival(t), e.survival(t), 1e-14));
        }
        assert!(approx_eq(w.mean(), 0.5, 1e-10));
    }

    #[test]
    fn weibull_quantile_inverts_cdf() {
        let w = Weibull::new(2.5, 3.0).unwrap();
        for p in [0.01, 0.3, 0.5, 0.9, 0.999] {
            let t = w.quantile(p);
            assert!(approx_eq(w.cdf(t), p, 1e-12), "p={p}");
        }
        let t = w.survival_quantile(1e-9);
        assert!(approx_eq(w.survival(t), 1e-9, 1e-18));
        assert!(approx_eq(w.from_unit(w.to_unit(1.7)), 1.7, 1e-12));
    }

    #[test]
    fn weibull_rayleigh_mean() {
        // shape 2: mean = λ √π / 2
        let w = Weibull::new(2.0, 1.0).unwrap();
        assert!(approx_eq(w.mean(), std::f64::consts::PI.sqrt() / 2.0, 1e-10));
    }

    #[test]
    fn uniform_moments() {
        let u = Uniform::new(1.0, 3.0).unwrap();
        assert_eq!(u.mean(), 2.0);
        assert_eq!(u.cdf(2.0), 0.5);
        assert_eq!(u.pdf(2.0), 0.5);
        assert_eq!(u.survival(5.0), 0.0);
    }

    #[test]
    fn dirac_step() {
        let d = Dirac::new(1.5).unwrap();
        assert_eq!(d.cdf(1.4), 0.0);
        assert_eq!(d.cdf(1.5), 1.0);
        assert_eq!(d.mean(), 1.5);
    }
}
