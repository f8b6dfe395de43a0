//! Resolved holding-time distributions.
//!
//! The family is closed: every strategy dispatch is an exhaustive `match` on
//! [`DistributionParams`], so adding a family is a compile error everywhere
//! it is not yet handled.

use std::fmt;
use std::str::FromStr;

use gsmp_common::{Error, Result};
use gsmp_math::distributions::{Dirac, Erlang, Exponential, Uniform, Weibull};
use serde::{Deserialize, Serialize};

use crate::model::{DistributionDecl, ModelContext};

/// Distribution family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistributionKind {
    Exponential,
    Dirac,
    Erlang,
    Uniform,
    Weibull,
}

impl DistributionKind {
    /// Number of numeric parameters.
    pub fn arity(self) -> usize {
        match self {
            DistributionKind::Exponential | DistributionKind::Dirac => 1,
            DistributionKind::Erlang | DistributionKind::Uniform | DistributionKind::Weibull => 2,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            DistributionKind::Exponential => "exponential",
            DistributionKind::Dirac => "dirac",
            DistributionKind::Erlang => "erlang",
            DistributionKind::Uniform => "uniform",
            DistributionKind::Weibull => "weibull",
        }
    }
}

impl fmt::Display for DistributionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DistributionKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "exponential" | "exp" => Ok(DistributionKind::Exponential),
            "dirac" | "deterministic" => Ok(DistributionKind::Dirac),
            "erlang" => Ok(DistributionKind::Erlang),
            "uniform" => Ok(DistributionKind::Uniform),
            "weibull" => Ok(DistributionKind::Weibull),
            _ => Err(Error::UnsupportedDistribution(s.to_string())),
        }
    }
}

/// A distribution with evaluated, domain-checked parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DistributionParams {
    Exponential(Exponential),
    Dirac(Dirac),
    Erlang(Erlang),
    Uniform(Uniform),
    Weibull(Weibull),
}

impl DistributionParams {
    /// Build from raw values, re-asserting the parameter domain.
    pub fn from_values(kind: DistributionKind, first: f64, second: Option<f64>) -> Result<Self> {
        let context = kind.name();
        let second_required = || {
            second.ok_or_else(|| Error::invalid_parameter(context, "missing second parameter"))
        };
        if kind.arity() == 1 && second.is_some() {
            return Err(Error::invalid_parameter(
                context,
                "takes exactly one parameter",
            ));
        }

        let params = match kind {
            DistributionKind::Exponential => Exponential::new(first)
                .map(Self::Exponential)
                .ok_or_else(|| Error::invalid_parameter(context, format!("rate {first} must be > 0"))),
            DistributionKind::Dirac => Dirac::new(first)
                .map(Self::Dirac)
                .ok_or_else(|| Error::invalid_parameter(context, format!("delay {first} must be > 0"))),
            DistributionKind::Erlang => {
                let rate = second_required()?;
                let phases = phase_count(first)?;
                Erlang::new(phases, rate).map(Self::Erlang).ok_or_else(|| {
                    Error::invalid_parameter(context, format!("rate {rate} must be > 0"))
                })
            }
            DistributionKind::Uniform => {
                let upper = second_required()?;
                Uniform::new(first, upper).map(Self::Uniform).ok_or_else(|| {
                    Error::invalid_parameter(
                        context,
                        format!("bounds [{first}, {upper}] need 0 <= lower < upper"),
                    )
                })
            }
            DistributionKind::Weibull => {
                let scale = second_required()?;
                Weibull::new(first, scale).map(Self::Weibull).ok_or_else(|| {
                    Error::invalid_parameter(
                        context,
                        format!("shape {first} and scale {scale} must be > 0"),
                    )
                })
            }
        }?;
        Ok(params)
    }

    /// Evaluate a declaration against the constant environment.
    pub fn resolve(decl: &DistributionDecl, ctx: &ModelContext) -> Result<Self> {
        let kind: DistributionKind = decl.kind.parse()?;
        let first = decl.first.evaluate(ctx).ok_or_else(|| {
            Error::invalid_parameter(kind.name(), format!("undefined constant in {:?}", decl.first))
        })?;
        let second = match &decl.second {
            Some(expr) => Some(expr.evaluate(ctx).ok_or_else(|| {
                Error::invalid_parameter(kind.name(), format!("undefined constant in {:?}", expr))
            })?),
            None => None,
        };
        Self::from_values(kind, first, second)
    }

    pub fn kind(&self) -> DistributionKind {
        match self {
            DistributionParams::Exponential(_) => DistributionKind::Exponential,
            DistributionParams::Dirac(_) => DistributionKind::Dirac,
            DistributionParams::Erlang(_) => DistributionKind::Erlang,
            DistributionParams::Uniform(_) => DistributionKind::Uniform,
            DistributionParams::Weibull(_) => DistributionKind::Weibull,
        }
    }

    pub fn is_exponential(&self) -> bool {
        matches!(self, DistributionParams::Exponential(_))
    }

    /// Parameters in declaration order.
    pub fn values(&self) -> Vec<f64> {
        match self {
            DistributionParams::Exponential(d) => vec![d.rate],
            DistributionParams::Dirac(d) => vec![d.delay],
            DistributionParams::Erlang(d) => vec![d.phases as f64, d.rate],
            DistributionParams::Uniform(d) => vec![d.lower, d.upper],
            DistributionParams::Weibull(d) => vec![d.shape, d.scale],
        }
    }

    pub fn mean(&self) -> f64 {
        match self {
            DistributionParams::Exponential(d) => d.mean(),
            DistributionParams::Dirac(d) => d.mean(),
            DistributionParams::Erlang(d) => d.mean(),
            DistributionParams::Uniform(d) => d.mean(),
            DistributionParams::Weibull(d) => d.mean(),
        }
    }

    pub fn survival(&self, t: f64) -> f64 {
        match self {
            DistributionParams::Exponential(d) => d.survival(t),
            DistributionParams::Dirac(d) => d.survival(t),
            DistributionParams::Erlang(d) => d.survival(t),
            DistributionParams::Uniform(d) => d.survival(t),
            DistributionParams::Weibull(d) => d.survival(t),
        }
    }

    /// Rate used when the event races as a memoryless competitor: the
    /// exponential rate itself, `1/mean` otherwise.
    pub fn race_rate(&self) -> f64 {
        match self {
            DistributionParams::Exponential(d) => d.rate,
            other => 1.0 / other.mean(),
        }
    }

    /// Copy with the 1-based parameter `index` replaced by `value`.
    pub fn with_parameter(&self, index: usize, value: f64) -> Result<Self> {
        let kind = self.kind();
        if index == 0 || index > kind.arity() {
            return Err(Error::invalid_parameter(
                kind.name(),
                format!("parameter index {index} outside 1..={}", kind.arity()),
            ));
        }
        let mut values = self.values();
        values[index - 1] = value;
        Self::from_values(kind, values[0], values.get(1).copied())
    }

    /// Bit pattern of the parameters, for exact-match cache keys.
    pub(crate) fn key_bits(&self) -> [u64; 2] {
        let values = self.values();
        [
            values[0].to_bits(),
            values.get(1).map_or(0, |v| v.to_bits()),
        ]
    }
}

impl fmt::Display for DistributionParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let values = self
            .values()
            .iter()
            .map(|v| v.to_string())
            .collect::<Vec<_>>()
            .join(", ");
        write!(f, "{}({})", self.kind(), values)
    }
}

fn phase_count(value: f64) -> Result<u32> {
    if value.is_finite() && value >= 1.0 && value.fract() == 0.0 && value <= u32::MAX as f64 {
        Ok(value as u32)
    } else {
        Err(Error::invalid_parameter(
            "erlang",
            format!("phase count {value} must be an integer >= 1"),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ParamExpr;

    fn approx_eq(a: f64, b: f64, tol: f64) -> bool {
        (a - b).abs() <= tol
    }

    #[test]
    fn kind_parsing() {
        assert_eq!("Weibull".parse::<DistributionKind>().unwrap(), DistributionKind::Weibull);
        assert_eq!("exp".parse::<DistributionKind>().unwrap(), DistributionKind::Exponential);
        let err = "lognormal".parse::<DistributionKind>().unwrap_err();
        assert!(matches!(err, Error::UnsupportedDistribution(_)));
    }

    #[test]
    fn domains_are_enforced() {
        use DistributionKind::*;
        assert!(DistributionParams::from_values(Exponential, 0.0, None).is_err());
        assert!(DistributionParams::from_values(Exponential, 1.0, Some(1.0)).is_err());
        assert!(DistributionParams::from_values(Dirac, -1.0, None).is_err());
        assert!(DistributionParams::from_values(Erlang, 2.5, Some(1.0)).is_err());
        assert!(DistributionParams::from_values(Erlang, 0.0, Some(1.0)).is_err());
        assert!(DistributionParams::from_values(Erlang, 3.0, None).is_err());
        assert!(DistributionParams::from_values(Uniform, 2.0, Some(2.0)).is_err());
        assert!(DistributionParams::from_values(Uniform, -1.0, Some(2.0)).is_err());
        assert!(DistributionParams::from_values(Weibull, 1.5, Some(0.0)).is_err());
        assert!(DistributionParams::from_values(Weibull, 1.5, Some(f64::NAN)).is_err());

        let erlang = DistributionParams::from_values(Erlang, 3.0, Some(2.0)).unwrap();
        assert!(approx_eq(erlang.mean(), 1.5, 1e-12));
        let uniform = DistributionParams::from_values(Uniform, 1.0, Some(3.0)).unwrap();
        assert!(approx_eq(uniform.mean(), 2.0, 1e-12));
    }

    #[test]
    fn resolve_uses_constants() {
        let ctx = ModelContext::new().with_constant("k", 2.0);
        let decl = DistributionDecl::new("weibull", "k").with_second(3.0);
        let params = DistributionParams::resolve(&decl, &ctx).unwrap();
        assert_eq!(params.values(), vec![2.0, 3.0]);

        let missing = DistributionDecl::new("dirac", ParamExpr::Constant("d".into()));
        let err = DistributionParams::resolve(&missing, &ctx).unwrap_err();
        assert!(matches!(err, Error::InvalidParameter { .. }));
    }

    #[test]
    fn race_rate_is_inverse_mean() {
        let exp = DistributionParams::from_values(DistributionKind::Exponential, 4.0, None).unwrap();
        assert_eq!(exp.race_rate(), 4.0);
        let dirac = DistributionParams::from_values(DistributionKind::Dirac, 0.5, None).unwrap();
        assert!(approx_eq(dirac.race_rate(), 2.0, 1e-12));
    }

    #[test]
    fn with_parameter_replaces_one_value() {
        let uniform =
            DistributionParams::from_values(DistributionKind::Uniform, 1.0, Some(3.0)).unwrap();
        let moved = uniform.with_parameter(2, 5.0).unwrap();
        assert_eq!(moved.values(), vec![1.0, 5.0]);
        assert!(uniform.with_parameter(1, 4.0).is_err());
        assert!(uniform.with_parameter(3, 4.0).is_err());
        assert!(uniform.with_parameter(0, 4.0).is_err());
    }

    #[test]
    fn display_lists_values() {
        let w = DistributionParams::from_values(DistributionKind::Weibull, 2.0, Some(1.5)).unwrap();
        assert_eq!(w.to_string(), "weibull(2, 1.5)");
    }
}
