//! GSMP model description consumed by the reduction.
//!
//! The model arrives already explored: a finite state space, events with
//! per-state firing distributions, named holding-time distributions whose
//! parameters may refer to constants, and dense reward structures. Nothing
//! here is resolved; see [`crate::resolve::ResolvedModel`] for that.

use std::collections::BTreeMap;

use gsmp_common::{EventId, StateId};
use serde::{Deserialize, Serialize};

/// A distribution parameter as written in the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamExpr {
    /// A numeric literal.
    Literal(f64),
    /// A reference to a constant in the [`ModelContext`].
    Constant(String),
}

impl ParamExpr {
    /// Evaluate against the constant environment.
    pub fn evaluate(&self, ctx: &ModelContext) -> Option<f64> {
        match self {
            ParamExpr::Literal(value) => Some(*value),
            ParamExpr::Constant(name) => ctx.get(name),
        }
    }
}

impl From<f64> for ParamExpr {
    fn from(value: f64) -> Self {
        ParamExpr::Literal(value)
    }
}

impl From<&str> for ParamExpr {
    fn from(name: &str) -> Self {
        ParamExpr::Constant(name.to_string())
    }
}

/// One named entry of the distribution list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistributionDecl {
    /// Family name (`exponential`, `dirac`, `erlang`, `uniform`, `weibull`).
    pub kind: String,
    pub first: ParamExpr,
    #[serde(default)]
    pub second: Option<ParamExpr>,
}

impl DistributionDecl {
    pub fn new(kind: impl Into<String>, first: impl Into<ParamExpr>) -> Self {
        Self {
            kind: kind.into(),
            first: first.into(),
            second: None,
        }
    }

    pub fn with_second(mut self, second: impl Into<ParamExpr>) -> Self {
        self.second = Some(second.into());
        self
    }
}

/// Named distributions referenced by events.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DistributionList {
    entries: BTreeMap<String, DistributionDecl>,
}

impl DistributionList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, decl: DistributionDecl) {
        self.entries.insert(name.into(), decl);
    }

    pub fn get(&self, name: &str) -> Option<&DistributionDecl> {
        self.entries.get(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &DistributionDecl)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// An event: its distribution and, for every state enabling it, where it
/// leads when it fires.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventDecl {
    pub name: String,
    /// Key into the model's [`DistributionList`].
    pub distribution: String,
    /// Enabling state -> `[(target, probability)]`.
    #[serde(default)]
    pub enabled: BTreeMap<StateId, Vec<(StateId, f64)>>,
}

impl EventDecl {
    pub fn new(name: impl Into<String>, distribution: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            distribution: distribution.into(),
            enabled: BTreeMap::new(),
        }
    }

    /// Enable the event at `state` with the given target distribution.
    pub fn enabled_at(mut self, state: usize, targets: &[(usize, f64)]) -> Self {
        self.enabled.insert(
            StateId(state),
            targets.iter().map(|&(t, p)| (StateId(t), p)).collect(),
        );
        self
    }
}

/// Dense per-state reward rates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RewardStructure {
    pub name: String,
    pub state_rewards: Vec<f64>,
}

impl RewardStructure {
    pub fn new(name: impl Into<String>, state_rewards: Vec<f64>) -> Self {
        Self {
            name: name.into(),
            state_rewards,
        }
    }
}

/// An explored GSMP.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GsmpModel {
    pub num_states: usize,
    #[serde(default)]
    pub initial_state: StateId,
    pub events: Vec<EventDecl>,
    pub distributions: DistributionList,
    #[serde(default)]
    pub rewards: Vec<RewardStructure>,
}

impl GsmpModel {
    pub fn new(num_states: usize) -> Self {
        Self {
            num_states,
            initial_state: StateId(0),
            events: Vec::new(),
            distributions: DistributionList::new(),
            rewards: Vec::new(),
        }
    }

    pub fn with_initial_state(mut self, state: usize) -> Self {
        self.initial_state = StateId(state);
        self
    }

    pub fn with_distribution(mut self, name: impl Into<String>, decl: DistributionDecl) -> Self {
        self.distributions.insert(name, decl);
        self
    }

    pub fn with_event(mut self, event: EventDecl) -> Self {
        self.events.push(event);
        self
    }

    pub fn with_reward(mut self, reward: RewardStructure) -> Self {
        self.rewards.push(reward);
        self
    }

    /// Look up an event by name.
    pub fn event_id(&self, name: &str) -> Option<EventId> {
        self.events
            .iter()
            .position(|e| e.name == name)
            .map(EventId)
    }

    /// Parse a model from JSON.
    pub fn from_json(json: &str) -> gsmp_common::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Constant environment threaded through resolution.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModelContext {
    constants: BTreeMap<String, f64>,
}

impl ModelContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_constant(mut self, name: impl Into<String>, value: f64) -> Self {
        self.constants.insert(name.into(), value);
        self
    }

    pub fn set(&mut self, name: impl Into<String>, value: f64) {
        self.constants.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.constants.get(name).copied()
    }
}
