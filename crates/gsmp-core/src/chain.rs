//! The reduced chain: what the downstream Markov-chain solver consumes.
//!
//! Each state carries one embedded jump distribution, its mean sojourn and
//! the expected reward earned per visit. The per-pair reductions the states
//! were composed from are kept alongside so that parameter synthesis can
//! re-derive only what a parameter change touches.

use std::collections::{BTreeMap, BTreeSet};

use gsmp_common::{EventId, Result, StateId};
use gsmp_config::CompositionPolicy;
use serde::{Deserialize, Serialize};

use crate::transient::PotatoResult;

/// Reduction of one (state, event) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReducedTransition {
    pub state: StateId,
    pub event: EventId,
    pub result: PotatoResult,
    /// Events whose parameters the potato was built from.
    pub dependencies: BTreeSet<EventId>,
    /// Internal states of the potato.
    pub potato_size: usize,
}

impl ReducedTransition {
    pub fn depends_on(&self, event: EventId) -> bool {
        self.dependencies.contains(&event)
    }
}

/// One state of the reduced chain.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReducedState {
    /// Jump distribution on leaving the state.
    pub transitions: BTreeMap<StateId, f64>,
    /// Mean time before the jump; zero when absorbing.
    pub expected_sojourn: f64,
    /// Expected reward per visit, per reward structure.
    pub rewards: Vec<f64>,
    /// No event is enabled.
    pub absorbing: bool,
}

impl ReducedState {
    pub fn absorbing(num_rewards: usize) -> Self {
        Self {
            transitions: BTreeMap::new(),
            expected_sojourn: 0.0,
            rewards: vec![0.0; num_rewards],
            absorbing: true,
        }
    }

    pub fn probability(&self, target: StateId) -> f64 {
        self.transitions.get(&target).copied().unwrap_or(0.0)
    }
}

/// A GSMP reduced to a semi-Markov chain over its original states.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReducedChain {
    fingerprint: String,
    policy: CompositionPolicy,
    initial_state: StateId,
    reward_names: Vec<String>,
    states: Vec<ReducedState>,
    pairs: BTreeMap<StateId, BTreeMap<EventId, ReducedTransition>>,
}

impl ReducedChain {
    pub(crate) fn new(
        fingerprint: String,
        policy: CompositionPolicy,
        initial_state: StateId,
        reward_names: Vec<String>,
        states: Vec<ReducedState>,
        pairs: BTreeMap<StateId, BTreeMap<EventId, ReducedTransition>>,
    ) -> Self {
        Self {
            fingerprint,
            policy,
            initial_state,
            reward_names,
            states,
            pairs,
        }
    }

    /// Fingerprint of the resolved model this chain was reduced from.
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    pub fn policy(&self) -> CompositionPolicy {
        self.policy
    }

    pub fn initial_state(&self) -> StateId {
        self.initial_state
    }

    pub fn num_states(&self) -> usize {
        self.states.len()
    }

    pub fn states(&self) -> &[ReducedState] {
        &self.states
    }

    pub fn state(&self, state: StateId) -> Option<&ReducedState> {
        self.states.get(state.index())
    }

    /// `P(from -> to)` in the embedded jump chain.
    pub fn probability(&self, from: StateId, to: StateId) -> f64 {
        self.state(from).map_or(0.0, |s| s.probability(to))
    }

    pub fn reward_names(&self) -> &[String] {
        &self.reward_names
    }

    pub fn reward_index(&self, name: &str) -> Option<usize> {
        self.reward_names.iter().position(|n| n == name)
    }

    /// Per-event reductions at `state`.
    pub fn transitions_from(&self, state: StateId) -> Option<&BTreeMap<EventId, ReducedTransition>> {
        self.pairs.get(&state)
    }

    pub fn transition(&self, state: StateId, event: EventId) -> Option<&ReducedTransition> {
        self.pairs.get(&state).and_then(|m| m.get(&event))
    }

    /// Every per-pair reduction, ordered by (state, event).
    pub fn pairs(&self) -> impl Iterator<Item = &ReducedTransition> {
        self.pairs.values().flat_map(|m| m.values())
    }

    pub fn num_pairs(&self) -> usize {
        self.pairs.values().map(BTreeMap::len).sum()
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}
