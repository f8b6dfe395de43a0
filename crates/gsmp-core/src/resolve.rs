//! Model resolution: constants evaluated, structure checked, fingerprinted.

use std::sync::Arc;

use gsmp_common::{Error, EventId, Result, StateId};
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::distribution::DistributionParams;
use crate::model::{GsmpModel, ModelContext};

/// Tolerance on firing probabilities summing to one.
pub const PROBABILITY_TOLERANCE: f64 = 1e-9;

/// A model whose events all carry evaluated, domain-checked parameters.
///
/// Immutable; parameter substitution produces a new value sharing the
/// underlying [`GsmpModel`].
#[derive(Debug, Clone)]
pub struct ResolvedModel {
    model: Arc<GsmpModel>,
    params: Vec<DistributionParams>,
    enabled: Vec<Vec<EventId>>,
    fingerprint: String,
}

impl ResolvedModel {
    /// Resolve every event's distribution and validate the structure.
    pub fn new(model: &GsmpModel, ctx: &ModelContext) -> Result<Self> {
        validate_structure(model)?;

        let mut params = Vec::with_capacity(model.events.len());
        for event in &model.events {
            let decl = model.distributions.get(&event.distribution).ok_or_else(|| {
                Error::invalid_parameter(
                    event.name.clone(),
                    format!("distribution '{}' is not declared", event.distribution),
                )
            })?;
            let resolved = DistributionParams::resolve(decl, ctx).map_err(|e| match e {
                Error::InvalidParameter { reason, .. } => Error::invalid_parameter(
                    format!("{} ({})", event.name, event.distribution),
                    reason,
                ),
                other => other,
            })?;
            params.push(resolved);
        }

        let mut enabled = vec![Vec::new(); model.num_states];
        for (index, event) in model.events.iter().enumerate() {
            for state in event.enabled.keys() {
                enabled[state.index()].push(EventId(index));
            }
        }

        let fingerprint = fingerprint(model, &params)?;
        Ok(Self {
            model: Arc::new(model.clone()),
            params,
            enabled,
            fingerprint,
        })
    }

    pub fn model(&self) -> &GsmpModel {
        &self.model
    }

    pub fn num_states(&self) -> usize {
        self.model.num_states
    }

    pub fn num_events(&self) -> usize {
        self.params.len()
    }

    pub fn initial_state(&self) -> StateId {
        self.model.initial_state
    }

    /// Hex SHA-256 over the structure and every resolved parameter.
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    pub fn params(&self, event: EventId) -> &DistributionParams {
        &self.params[event.index()]
    }

    pub fn event_name(&self, event: EventId) -> &str {
        &self.model.events[event.index()].name
    }

    pub fn event_id(&self, name: &str) -> Result<EventId> {
        self.model
            .event_id(name)
            .ok_or_else(|| Error::UnknownEvent(name.to_string()))
    }

    pub fn check_state(&self, state: StateId) -> Result<()> {
        if state.index() < self.num_states() {
            Ok(())
        } else {
            Err(Error::UnknownState {
                state: state.index(),
                num_states: self.num_states(),
            })
        }
    }

    /// Events enabled at `state`, in declaration order.
    pub fn enabled_events(&self, state: StateId) -> &[EventId] {
        &self.enabled[state.index()]
    }

    pub fn is_enabled(&self, state: StateId, event: EventId) -> bool {
        self.enabled[state.index()].contains(&event)
    }

    /// Firing targets of `event` at `state`, if enabled there.
    pub fn targets(&self, state: StateId, event: EventId) -> Option<&[(StateId, f64)]> {
        self.model.events[event.index()]
            .enabled
            .get(&state)
            .map(Vec::as_slice)
    }

    pub fn num_rewards(&self) -> usize {
        self.model.rewards.len()
    }

    pub fn reward_names(&self) -> Vec<String> {
        self.model.rewards.iter().map(|r| r.name.clone()).collect()
    }

    pub fn reward_rate(&self, reward: usize, state: StateId) -> f64 {
        self.model.rewards[reward].state_rewards[state.index()]
    }

    /// Copy with `event`'s parameters replaced; the fingerprint is recomputed.
    pub fn with_event_params(&self, event: EventId, params: DistributionParams) -> Result<Self> {
        let mut next = self.clone();
        next.params[event.index()] = params;
        next.fingerprint = fingerprint(&next.model, &next.params)?;
        Ok(next)
    }
}

fn validate_structure(model: &GsmpModel) -> Result<()> {
    let n = model.num_states;
    if n == 0 {
        return Err(Error::invalid_parameter("model", "no states"));
    }
    if model.initial_state.index() >= n {
        return Err(Error::UnknownState {
            state: model.initial_state.index(),
            num_states: n,
        });
    }

    for event in &model.events {
        for (state, targets) in &event.enabled {
            if state.index() >= n {
                return Err(Error::UnknownState {
                    state: state.index(),
                    num_states: n,
                });
            }
            if targets.is_empty() {
                return Err(Error::invalid_parameter(
                    event.name.clone(),
                    format!("no targets at {state}"),
                ));
            }
            let mut total = 0.0;
            for &(target, p) in targets {
                if target.index() >= n {
                    return Err(Error::UnknownState {
                        state: target.index(),
                        num_states: n,
                    });
                }
                if !p.is_finite() || p < 0.0 {
                    return Err(Error::invalid_parameter(
                        event.name.clone(),
                        format!("probability {p} at {state} is not a probability"),
                    ));
                }
                total += p;
            }
            if (total - 1.0).abs() > PROBABILITY_TOLERANCE {
                return Err(Error::invalid_parameter(
                    event.name.clone(),
                    format!("targets at {state} sum to {total}"),
                ));
            }
        }
    }

    for reward in &model.rewards {
        if reward.state_rewards.len() != n {
            return Err(Error::RewardEvaluation(format!(
                "reward '{}' has {} rates for {} states",
                reward.name,
                reward.state_rewards.len(),
                n
            )));
        }
        if let Some((state, rate)) = reward
            .state_rewards
            .iter()
            .enumerate()
            .find(|(_, r)| !r.is_finite() || **r < 0.0)
        {
            return Err(Error::RewardEvaluation(format!(
                "reward '{}' has rate {} at s{}",
                reward.name, rate, state
            )));
        }
    }
    Ok(())
}

#[derive(Serialize)]
struct FingerprintInput<'a> {
    model: &'a GsmpModel,
    params: Vec<[u64; 2]>,
}

fn fingerprint(model: &GsmpModel, params: &[DistributionParams]) -> Result<String> {
    let input = FingerprintInput {
        model,
        params: params.iter().map(DistributionParams::key_bits).collect(),
    };
    let canonical = serde_json::to_vec(&input)?;
    let mut hasher = Sha256::new();
    hasher.update(&canonical);
    Ok(hex::encode(hasher.finalize()))
}
