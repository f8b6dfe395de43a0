//! Gamma-family and Poisson primitives evaluated in log space.

use std::f64::consts::PI;

const LOG_SQRT_2PI: f64 = 0.918_938_533_204_672_8; // 0.5 * ln(2*pi)
const LANCZOS_G: f64 = 7.0;
#[allow(clippy::excessive_precision)] // These are published numerical constants
const LANCZOS_COEFFS: [f64; 9] = [
    0.999_999_999_999_809_93,
    676.520_368_121_885_1,
    -1_259.139_216_722_402_8,
    771.323_428_777_653_1,
    -176.615_029_162_140_59,
    12.507_343_278_686_905,
    -0.138_571_095_265_720_12,
    9.984_369_578_019_571_6e-6,
    1.505_632_735_149_311_6e-7,
];

/// Natural log of the Gamma function (log |Gamma(z)|).
///
/// Uses a Lanczos approximation with reflection for z < 0.5.
pub fn log_gamma(z: f64) -> f64 {
    if z.is_nan() || z == f64::NEG_INFINITY {
        return f64::NAN;
    }
    if z == f64::INFINITY {
        return f64::INFINITY;
    }
    if z <= 0.0 && (z - z.round()).abs() < 1e-15 {
        return f64::NAN;
    }
    if z < 0.5 {
        let sin_pi = (PI * z).sin();
        if sin_pi == 0.0 {
            return f64::NAN;
        }
        return PI.ln() - sin_pi.abs().ln() - log_gamma(1.0 - z);
    }

    let z_minus = z - 1.0;
    let mut x = LANCZOS_COEFFS[0];
    for (i, coeff) in LANCZOS_COEFFS.iter().enumerate().skip(1) {
        x += coeff / (z_minus + i as f64);
    }
    let t = z_minus + LANCZOS_G + 0.5;
    LOG_SQRT_2PI + (z_minus + 0.5) * t.ln() - t + x.ln()
}

/// Gamma function for positive arguments, via [`log_gamma`].
pub fn gamma_fn(z: f64) -> f64 {
    if z.is_nan() || z <= 0.0 {
        return f64::NAN;
    }
    log_gamma(z).exp()
}

/// log(n!) using the Gamma function.
pub fn log_factorial(n: u64) -> f64 {
    if n <= 1 {
        return 0.0;
    }
    log_gamma((n as f64) + 1.0)
}

/// Log of the Poisson(rate) probability mass at `k`.
///
/// `rate = 0` puts all mass on `k = 0`.
pub fn poisson_log_pmf(k: u64, rate: f64) -> f64 {
    if rate.is_nan() || rate < 0.0 {
        return f64::NAN;
    }
    if rate == 0.0 {
        return if k == 0 { 0.0 } else { f64::NEG_INFINITY };
    }
    -rate + (k as f64) * rate.ln() - log_factorial(k)
}

/// Sum of `values` in a fixed (index) order with Kahan compensation.
///
/// Used where many small probabilities are accumulated and the result must
/// not depend on how callers happened to chunk the work.
pub fn compensated_sum(values: impl IntoIterator<Item = f64>) -> f64 {
    let mut sum = 0.0;
    let mut carry = 0.0;
    for v in values {
        let y = v - carry;
        let t = sum + y;
        carry = (t - sum) - y;
        sum = t;
    }
    sum
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq(a: f64, b: f64, tol: f64) -> bool {
        if a.is_nan() || b.is_nan() {
            return false;
        }
        (a - b).abs() <= tol
    }

    #[test]
    fn log_gamma_known_values() {
        assert!(approx_eq(log_gamma(1.0), 0.0, 1e-12));
        assert!(approx_eq(log_gamma(0.5), 0.5 * PI.ln(), 1e-10));
        assert!(approx_eq(log_gamma(5.0), 24.0f64.ln(), 1e-10));
    }

    #[test]
    fn gamma_fn_matches_factorial() {
        assert!(approx_eq(gamma_fn(4.0), 6.0, 1e-9));
        assert!(approx_eq(gamma_fn(1.5), 0.5 * PI.sqrt(), 1e-10));
        assert!(gamma_fn(-1.0).is_nan());
    }

    #[test]
    fn log_factorial_small() {
        assert!(approx_eq(log_factorial(0), 0.0, 1e-15));
        assert!(approx_eq(log_factorial(5), 120.0f64.ln(), 1e-12));
    }

    #[test]
    fn poisson_log_pmf_matches_direct() {
        let rate: f64 = 3.5;
        for k in 0..10u64 {
            let direct = (-rate).exp() * rate.powi(k as i32) / log_factorial(k).exp();
            assert!(approx_eq(poisson_log_pmf(k, rate).exp(), direct, 1e-12));
        }
    }

    #[test]
    fn poisson_log_pmf_zero_rate() {
        assert_eq!(poisson_log_pmf(0, 0.0), 0.0);
        assert_eq!(poisson_log_pmf(3, 0.0), f64::NEG_INFINITY);
        assert!(poisson_log_pmf(1, -1.0).is_nan());
    }

    #[test]
    fn compensated_sum_recovers_small_terms() {
        let mut values = vec![1.0];
        values.extend(std::iter::repeat(1e-16).take(10_000));
        let sum = compensated_sum(values);
        assert!(approx_eq(sum, 1.0 + 1e-12, 1e-15));
    }

    #[test]
    fn log_gamma_negative_integer_is_nan() {
        assert!(log_gamma(-2.0).is_nan());
    }
}
