//! Parameter synthesis: one distribution parameter left free over a range.

use gsmp_common::{Error, EventId, Result};
use serde::{Deserialize, Serialize};

use crate::distribution::{DistributionKind, DistributionParams};
use crate::resolve::ResolvedModel;

/// The parameter to synthesize, as named in the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterToSynthesize {
    pub event: String,
    /// 1-based position in the distribution's parameter list.
    pub index: usize,
    pub lower: f64,
    pub upper: f64,
}

impl ParameterToSynthesize {
    pub fn new(event: impl Into<String>, index: usize, lower: f64, upper: f64) -> Self {
        Self {
            event: event.into(),
            index,
            lower,
            upper,
        }
    }
}

/// A validated synthesis request against one resolved model.
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesisQuery {
    parameter: ParameterToSynthesize,
    event: EventId,
    base: DistributionParams,
}

impl SynthesisQuery {
    /// Validate that every value in `[lower, upper]` yields a valid
    /// distribution for the event.
    pub fn new(model: &ResolvedModel, parameter: ParameterToSynthesize) -> Result<Self> {
        let event = model.event_id(&parameter.event)?;
        let base = *model.params(event);
        let kind = base.kind();
        let context = format!("{} parameter {}", parameter.event, parameter.index);

        if parameter.index == 0 || parameter.index > kind.arity() {
            return Err(Error::invalid_parameter(
                context,
                format!("{kind} has {} parameter(s)", kind.arity()),
            ));
        }
        if kind == DistributionKind::Erlang && parameter.index == 1 {
            return Err(Error::invalid_parameter(
                context,
                "the Erlang phase count is not real-valued",
            ));
        }
        let (lower, upper) = (parameter.lower, parameter.upper);
        if !(lower.is_finite() && upper.is_finite()) || lower < 0.0 || lower >= upper {
            return Err(Error::invalid_parameter(
                context,
                format!("range [{lower}, {upper}] needs 0 <= lower < upper"),
            ));
        }
        // Every domain is an interval in each coordinate, so the endpoints
        // decide. Exclusive lower bounds (rate > 0) admit lower = 0 only as
        // an open end, which the interior sweep never touches.
        check_endpoint(&base, parameter.index, upper, &context)?;
        if lower > 0.0 {
            check_endpoint(&base, parameter.index, lower, &context)?;
        } else {
            let probe = lower + (upper - lower) * f64::EPSILON;
            check_endpoint(&base, parameter.index, probe, &context)?;
        }

        Ok(Self {
            parameter,
            event,
            base,
        })
    }

    pub fn parameter(&self) -> &ParameterToSynthesize {
        &self.parameter
    }

    pub fn event(&self) -> EventId {
        self.event
    }

    pub fn lower(&self) -> f64 {
        self.parameter.lower
    }

    pub fn upper(&self) -> f64 {
        self.parameter.upper
    }

    /// The event's distribution with the parameter set to `value`.
    pub fn reparameterize(&self, value: f64) -> Result<DistributionParams> {
        let context = format!("{} parameter {}", self.parameter.event, self.parameter.index);
        if !(value >= self.lower() && value <= self.upper()) {
            return Err(Error::invalid_parameter(
                context,
                format!("{value} outside [{}, {}]", self.lower(), self.upper()),
            ));
        }
        self.base
            .with_parameter(self.parameter.index, value)
            .map_err(|e| match e {
                Error::InvalidParameter { reason, .. } => Error::invalid_parameter(context, reason),
                other => other,
            })
    }

    /// `model` with the parameter set to `value`.
    pub fn apply(&self, model: &ResolvedModel, value: f64) -> Result<ResolvedModel> {
        let params = self.reparameterize(value)?;
        model.with_event_params(self.event, params)
    }

    /// `samples` evenly spaced points strictly inside the range.
    pub fn interior_points(&self, samples: usize) -> Vec<f64> {
        let step = (self.upper() - self.lower()) / (samples + 1) as f64;
        (1..=samples)
            .map(|i| self.lower() + step * i as f64)
            .collect()
    }
}

fn check_endpoint(
    base: &DistributionParams,
    index: usize,
    value: f64,
    context: &str,
) -> Result<()> {
    base.with_parameter(index, value)
        .map(|_| ())
        .map_err(|e| match e {
            Error::InvalidParameter { reason, .. } => Error::invalid_parameter(
                context.to_string(),
                format!("range leaves the distribution's domain: {reason}"),
            ),
            other => other,
        })
}
