//! Potato container: the Markovian sub-chain explored while one event's
//! clock keeps running.
//!
//! Internal states are local indices `0..len()`; index 0 is the entry state.
//! The generator holds internal-to-internal rates off the diagonal and the
//! negated total exit rate (internal plus boundary) on it. The reduced
//! event's own firing is not part of the generator: it is the time-dependent
//! exit every strategy integrates against.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use gsmp_common::{Error, EventId, Result, StateId};
use gsmp_config::CompositionPolicy;
use serde::{Deserialize, Serialize};

use crate::resolve::{ResolvedModel, PROBABILITY_TOLERANCE};

/// Relative tolerance on generator row sums.
const ROW_SUM_TOLERANCE: f64 = 1e-9;

/// A memoryless exit from an internal state.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundaryTransition {
    /// Local index of the internal state.
    pub from: usize,
    pub target: StateId,
    pub rate: f64,
}

/// The sub-chain rooted at one (state, event) pair.
#[derive(Debug, Clone, PartialEq)]
pub struct Potato {
    event: EventId,
    num_states: usize,
    states: Vec<StateId>,
    generator: Vec<Vec<f64>>,
    boundary: Vec<BoundaryTransition>,
    firing: Vec<Vec<(StateId, f64)>>,
    reward_rates: Vec<Vec<f64>>,
    dependencies: BTreeSet<EventId>,
}

impl Potato {
    /// Assemble a potato from raw parts and validate it.
    ///
    /// The generator diagonal is filled in from the off-diagonal internal
    /// rates and the boundary rates. `reward_rates[r][i]` is reward `r` at
    /// internal state `i`.
    pub fn from_parts(
        event: EventId,
        num_states: usize,
        states: Vec<StateId>,
        internal: Vec<Vec<f64>>,
        boundary: Vec<BoundaryTransition>,
        firing: Vec<Vec<(StateId, f64)>>,
        reward_rates: Vec<Vec<f64>>,
    ) -> Result<Self> {
        let n = states.len();
        if internal.len() != n || internal.iter().any(|row| row.len() != n) {
            return Err(Error::ReductionInconsistency(format!(
                "generator is not {n}x{n}"
            )));
        }
        let mut generator = internal;
        for (i, row) in generator.iter_mut().enumerate() {
            row[i] = 0.0;
            let internal_out: f64 = row.iter().sum();
            let boundary_out: f64 = boundary.iter().filter(|b| b.from == i).map(|b| b.rate).sum();
            row[i] = -(internal_out + boundary_out);
        }
        let potato = Self {
            event,
            num_states,
            states,
            generator,
            boundary,
            firing,
            reward_rates,
            dependencies: BTreeSet::from([event]),
        };
        potato.validate()?;
        Ok(potato)
    }

    /// Build the potato for `event` rooted at `root`.
    ///
    /// Exponential reduced events get the trivial single-state potato whose
    /// competitors are all boundary exits. Otherwise the root is closed under
    /// exponential competitors whose targets keep `event` enabled.
    pub fn build(
        model: &ResolvedModel,
        root: StateId,
        event: EventId,
        policy: CompositionPolicy,
    ) -> Result<Self> {
        model.check_state(root)?;
        if !model.is_enabled(root, event) {
            return Err(Error::ReductionInconsistency(format!(
                "{} is not enabled at {root}",
                model.event_name(event)
            )));
        }
        let trivial = model.params(event).is_exponential();

        let mut builder = Builder::new(model, event, root);
        while let Some(local) = builder.queue.pop_front() {
            let state = builder.states[local];
            for &competitor in model.enabled_events(state) {
                if competitor == event {
                    continue;
                }
                let params = model.params(competitor);
                let Some(targets) = model.targets(state, competitor) else {
                    continue;
                };
                if !params.is_exponential() && policy == CompositionPolicy::Exclusive {
                    return Err(Error::ReductionInconsistency(format!(
                        "{} and {} are both non-exponential at {state} under the exclusive policy",
                        model.event_name(event),
                        model.event_name(competitor)
                    )));
                }
                let rate = params.race_rate();
                builder.dependencies.insert(competitor);
                for &(target, p) in targets {
                    if target == state || p == 0.0 {
                        continue;
                    }
                    let keeps_clock = !trivial
                        && params.is_exponential()
                        && model.is_enabled(target, event);
                    if keeps_clock {
                        let to = builder.internal_index(target);
                        *builder.internal.entry((local, to)).or_insert(0.0) += rate * p;
                    } else {
                        *builder.boundary.entry((local, target)).or_insert(0.0) += rate * p;
                    }
                }
            }
        }
        builder.finish()
    }

    pub fn event(&self) -> EventId {
        self.event
    }

    pub fn entry(&self) -> StateId {
        self.states[0]
    }

    /// Number of internal states.
    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn is_trivial(&self) -> bool {
        self.states.len() == 1
    }

    pub fn states(&self) -> &[StateId] {
        &self.states
    }

    pub fn generator(&self) -> &[Vec<f64>] {
        &self.generator
    }

    pub fn boundary(&self) -> &[BoundaryTransition] {
        &self.boundary
    }

    /// Firing distribution of the reduced event at internal state `local`.
    pub fn firing(&self, local: usize) -> &[(StateId, f64)] {
        &self.firing[local]
    }

    pub fn num_rewards(&self) -> usize {
        self.reward_rates.len()
    }

    pub fn reward_rates(&self, reward: usize) -> &[f64] {
        &self.reward_rates[reward]
    }

    /// Events whose parameters this potato was built from.
    pub fn dependencies(&self) -> &BTreeSet<EventId> {
        &self.dependencies
    }

    /// Total memoryless exit rate of internal state `local`.
    pub fn exit_rate(&self, local: usize) -> f64 {
        -self.generator[local][local]
    }

    pub fn max_exit_rate(&self) -> f64 {
        (0..self.len()).map(|i| self.exit_rate(i)).fold(0.0, f64::max)
    }

    /// Check the structural invariants.
    pub fn validate(&self) -> Result<()> {
        let n = self.states.len();
        if n == 0 {
            return Err(Error::ReductionInconsistency("potato has no entry state".into()));
        }
        if self.firing.len() != n {
            return Err(Error::ReductionInconsistency(format!(
                "{} firing distributions for {n} internal states",
                self.firing.len()
            )));
        }

        for (i, row) in self.generator.iter().enumerate() {
            let mut off_diagonal = 0.0;
            for (j, &rate) in row.iter().enumerate() {
                if !rate.is_finite() {
                    return Err(Error::ReductionInconsistency(format!(
                        "non-finite rate {rate} at ({i}, {j})"
                    )));
                }
                if i != j {
                    if rate < 0.0 {
                        return Err(Error::ReductionInconsistency(format!(
                            "negative rate {rate} at ({i}, {j})"
                        )));
                    }
                    off_diagonal += rate;
                }
            }
            let boundary_out: f64 = self
                .boundary
                .iter()
                .filter(|b| b.from == i)
                .map(|b| b.rate)
                .sum();
            let expected = off_diagonal + boundary_out;
            if (row[i] + expected).abs() > ROW_SUM_TOLERANCE * expected.max(1.0) {
                return Err(Error::ReductionInconsistency(format!(
                    "row {i} diagonal {} does not match exit rate {expected}",
                    row[i]
                )));
            }
        }

        for b in &self.boundary {
            if b.from >= n || b.target.index() >= self.num_states {
                return Err(Error::ReductionInconsistency(format!(
                    "boundary transition {} -> {} out of range",
                    b.from, b.target
                )));
            }
            if !b.rate.is_finite() || b.rate < 0.0 {
                return Err(Error::ReductionInconsistency(format!(
                    "boundary rate {} is not a rate",
                    b.rate
                )));
            }
        }

        for (i, dist) in self.firing.iter().enumerate() {
            let total: f64 = dist.iter().map(|&(_, p)| p).sum();
            if dist.is_empty() || (total - 1.0).abs() > PROBABILITY_TOLERANCE {
                return Err(Error::ReductionInconsistency(format!(
                    "firing distribution at {} sums to {total}",
                    self.states[i]
                )));
            }
            if let Some(&(target, _)) = dist.iter().find(|(t, _)| t.index() >= self.num_states) {
                return Err(Error::ReductionInconsistency(format!(
                    "firing target {target} out of range"
                )));
            }
        }

        for rates in &self.reward_rates {
            if rates.len() != n {
                return Err(Error::RewardEvaluation(format!(
                    "{} reward rates for {n} internal states",
                    rates.len()
                )));
            }
        }
        Ok(())
    }
}

struct Builder<'a> {
    model: &'a ResolvedModel,
    event: EventId,
    states: Vec<StateId>,
    index: BTreeMap<StateId, usize>,
    queue: VecDeque<usize>,
    internal: BTreeMap<(usize, usize), f64>,
    boundary: BTreeMap<(usize, StateId), f64>,
    dependencies: BTreeSet<EventId>,
}

impl<'a> Builder<'a> {
    fn new(model: &'a ResolvedModel, event: EventId, root: StateId) -> Self {
        let mut builder = Self {
            model,
            event,
            states: Vec::new(),
            index: BTreeMap::new(),
            queue: VecDeque::new(),
            internal: BTreeMap::new(),
            boundary: BTreeMap::new(),
            dependencies: BTreeSet::from([event]),
        };
        builder.internal_index(root);
        builder
    }

    fn internal_index(&mut self, state: StateId) -> usize {
        if let Some(&local) = self.index.get(&state) {
            return local;
        }
        let local = self.states.len();
        self.states.push(state);
        self.index.insert(state, local);
        self.queue.push_back(local);
        local
    }

    fn finish(self) -> Result<Potato> {
        let n = self.states.len();
        let mut internal = vec![vec![0.0; n]; n];
        for ((from, to), rate) in self.internal {
            internal[from][to] += rate;
        }
        let boundary = self
            .boundary
            .into_iter()
            .map(|((from, target), rate)| BoundaryTransition { from, target, rate })
            .collect();

        let mut firing = Vec::with_capacity(n);
        for &state in &self.states {
            let targets = self.model.targets(state, self.event).ok_or_else(|| {
                Error::ReductionInconsistency(format!(
                    "{} has no firing distribution at {state}",
                    self.model.event_name(self.event)
                ))
            })?;
            firing.push(targets.to_vec());
        }

        let reward_rates = (0..self.model.num_rewards())
            .map(|r| {
                self.states
                    .iter()
                    .map(|&s| self.model.reward_rate(r, s))
                    .collect()
            })
            .collect();

        let mut potato = Potato::from_parts(
            self.event,
            self.model.num_states(),
            self.states,
            internal,
            boundary,
            firing,
            reward_rates,
        )?;
        potato.dependencies = self.dependencies;
        Ok(potato)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DistributionDecl, EventDecl, GsmpModel, ModelContext};

    /// Queue with a deterministic service `serve` and exponential arrivals:
    /// 0 -arrive-> 1 -arrive-> 2, serve enabled at 1 and 2, plus an
    /// exponential failure from 2 to 3 where serve is disabled.
    fn queue_model() -> ResolvedModel {
        let model = GsmpModel::new(4)
            .with_distribution("arr", DistributionDecl::new("exponential", 2.0))
            .with_distribution("srv", DistributionDecl::new("dirac", 1.0))
            .with_distribution("brk", DistributionDecl::new("exponential", 0.5))
            .with_event(
                EventDecl::new("arrive", "arr")
                    .enabled_at(0, &[(1, 1.0)])
                    .enabled_at(1, &[(2, 1.0)]),
            )
            .with_event(
                EventDecl::new("serve", "srv")
                    .enabled_at(1, &[(0, 1.0)])
                    .enabled_at(2, &[(1, 1.0)]),
            )
            .with_event(EventDecl::new("break", "brk").enabled_at(2, &[(3, 1.0)]));
        ResolvedModel::new(&model, &ModelContext::new()).unwrap()
    }

    #[test]
    fn closure_follows_clock_preserving_transitions() {
        let model = queue_model();
        let potato = Potato::build(&model, StateId(1), EventId(1), CompositionPolicy::Exclusive)
            .unwrap();
        assert_eq!(potato.states(), &[StateId(1), StateId(2)]);
        assert_eq!(potato.generator()[0][1], 2.0);
        assert_eq!(potato.exit_rate(0), 2.0);
        assert_eq!(potato.exit_rate(1), 0.5);
        assert_eq!(
            potato.boundary(),
            &[BoundaryTransition {
                from: 1,
                target: StateId(3),
                rate: 0.5
            }]
        );
        assert_eq!(potato.firing(1), &[(StateId(1), 1.0)]);
        assert_eq!(
            potato.dependencies().iter().copied().collect::<Vec<_>>(),
            vec![EventId(0), EventId(1), EventId(2)]
        );
    }

    #[test]
    fn exponential_event_gets_trivial_potato() {
        let model = queue_model();
        let potato = Potato::build(&model, StateId(2), EventId(2), CompositionPolicy::Exclusive);
        // serve is non-exponential at state 2, so the exponential break event
        // cannot be reduced there in isolation under the exclusive policy.
        assert!(matches!(potato, Err(Error::ReductionInconsistency(_))));

        let potato =
            Potato::build(&model, StateId(0), EventId(0), CompositionPolicy::Exclusive).unwrap();
        assert!(potato.is_trivial());
        assert!(potato.boundary().is_empty());
        assert_eq!(potato.max_exit_rate(), 0.0);
    }

    #[test]
    fn rate_weighted_turns_general_competitors_into_exits() {
        let model = queue_model();
        let potato =
            Potato::build(&model, StateId(2), EventId(2), CompositionPolicy::RateWeighted)
                .unwrap();
        assert!(potato.is_trivial());
        // serve races at 1/mean = 1 alongside nothing else.
        assert_eq!(
            potato.boundary(),
            &[BoundaryTransition {
                from: 0,
                target: StateId(1),
                rate: 1.0
            }]
        );
    }

    #[test]
    fn disabled_event_is_rejected() {
        let model = queue_model();
        let err = Potato::build(&model, StateId(0), EventId(1), CompositionPolicy::Exclusive)
            .unwrap_err();
        assert!(matches!(err, Error::ReductionInconsistency(_)));
        let err = Potato::build(&model, StateId(9), EventId(1), CompositionPolicy::Exclusive)
            .unwrap_err();
        assert!(matches!(err, Error::UnknownState { .. }));
    }

    #[test]
    fn from_parts_validates_firing() {
        let err = Potato::from_parts(
            EventId(0),
            2,
            vec![StateId(0)],
            vec![vec![0.0]],
            vec![],
            vec![vec![(StateId(1), 0.7)]],
            vec![],
        )
        .unwrap_err();
        assert!(matches!(err, Error::ReductionInconsistency(_)));

        let err = Potato::from_parts(
            EventId(0),
            2,
            vec![StateId(0)],
            vec![vec![0.0]],
            vec![BoundaryTransition {
                from: 0,
                target: StateId(1),
                rate: -1.0,
            }],
            vec![vec![(StateId(1), 1.0)]],
            vec![],
        )
        .unwrap_err();
        assert!(matches!(err, Error::ReductionInconsistency(_)));
    }

    #[test]
    fn from_parts_fills_diagonal() {
        let potato = Potato::from_parts(
            EventId(0),
            3,
            vec![StateId(0), StateId(1)],
            vec![vec![0.0, 1.5], vec![0.25, 0.0]],
            vec![BoundaryTransition {
                from: 1,
                target: StateId(2),
                rate: 0.75,
            }],
            vec![vec![(StateId(2), 1.0)], vec![(StateId(2), 1.0)]],
            vec![vec![1.0, 2.0]],
        )
        .unwrap();
        assert_eq!(potato.generator()[0][0], -1.5);
        assert_eq!(potato.generator()[1][1], -1.0);
        assert_eq!(potato.reward_rates(0), &[1.0, 2.0]);
    }
}
