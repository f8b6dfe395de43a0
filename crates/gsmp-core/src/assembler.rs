//! Reduction assembler: every (state, event) pair to a reduced chain.
//!
//! Pairs are planned per the composition policy, reduced independently in
//! parallel (each builds its own potato; only the approximation cache is
//! shared), collected into ordered maps, and composed per state. The first
//! failing pair aborts the whole chain.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use gsmp_common::{Error, EventId, Result, StateId};
use gsmp_config::{CompositionPolicy, ReductionConfig};
use rayon::prelude::*;
use tracing::{debug, info};

use crate::cache::ApproximationCache;
use crate::chain::{ReducedChain, ReducedState, ReducedTransition};
use crate::logging::{event_names, Stage};
use crate::potato::Potato;
use crate::resolve::ResolvedModel;
use crate::strategy::{self, StrategyContext};

type PairMap = BTreeMap<StateId, BTreeMap<EventId, ReducedTransition>>;

/// Builds reduced chains under one immutable configuration.
#[derive(Debug)]
pub struct Assembler {
    config: Arc<ReductionConfig>,
    cache: ApproximationCache,
    pool: Option<rayon::ThreadPool>,
}

impl Assembler {
    /// A dedicated worker pool is created when `execution.workers` is set.
    pub fn new(config: Arc<ReductionConfig>) -> Result<Self> {
        let pool = match config.execution.workers {
            Some(workers) => Some(
                rayon::ThreadPoolBuilder::new()
                    .num_threads(workers)
                    .thread_name(|i| format!("gsmp-reduce-{i}"))
                    .build()
                    .map_err(|e| Error::Config(format!("cannot start worker pool: {e}")))?,
            ),
            None => None,
        };
        let cache = ApproximationCache::new(config.cache.max_approximations);
        Ok(Self {
            config,
            cache,
            pool,
        })
    }

    pub fn config(&self) -> &ReductionConfig {
        &self.config
    }

    pub fn policy(&self) -> CompositionPolicy {
        self.config.composition.policy
    }

    pub fn cache(&self) -> &ApproximationCache {
        &self.cache
    }

    /// Reduce one pair. Errors carry the pair's identity.
    pub fn reduce_pair(
        &self,
        model: &ResolvedModel,
        state: StateId,
        event: EventId,
    ) -> Result<ReducedTransition> {
        self.reduce_pair_inner(model, state, event).map_err(|e| {
            debug!(
                target: event_names::PAIR_FAILED,
                stage = %Stage::Reduce,
                state = %state,
                event = model.event_name(event),
                error = %e,
                "pair reduction failed"
            );
            e.at_pair(state, event)
        })
    }

    fn reduce_pair_inner(
        &self,
        model: &ResolvedModel,
        state: StateId,
        event: EventId,
    ) -> Result<ReducedTransition> {
        let potato = Potato::build(model, state, event, self.policy())?;
        debug!(
            target: event_names::POTATO_BUILT,
            stage = %Stage::Build,
            state = %state,
            event = model.event_name(event),
            internal = potato.len(),
            boundary = potato.boundary().len(),
        );

        let params = model.params(event);
        let ctx = StrategyContext::new(&self.config, &self.cache);
        let result = strategy::reduce(&potato, params, &ctx)?;
        debug!(
            target: event_names::PAIR_REDUCED,
            stage = %Stage::Reduce,
            state = %state,
            event = model.event_name(event),
            distribution = %params,
            exits = result.exits.len(),
            sojourn = result.expected_sojourn,
        );

        Ok(ReducedTransition {
            state,
            event,
            result,
            dependencies: potato.dependencies().clone(),
            potato_size: potato.len(),
        })
    }

    /// Reductions of every event the policy reduces at `state`.
    pub fn reduce_state(
        &self,
        model: &ResolvedModel,
        state: StateId,
    ) -> Result<BTreeMap<EventId, ReducedTransition>> {
        model.check_state(state)?;
        let pairs = events_to_reduce(model, state, self.policy())?
            .into_iter()
            .map(|event| (state, event))
            .collect::<Vec<_>>();
        let reduced = self.run_pairs(model, &pairs)?;
        Ok(reduced.into_iter().map(|t| (t.event, t)).collect())
    }

    /// Reduce the whole model.
    pub fn reduce_all(&self, model: &ResolvedModel) -> Result<ReducedChain> {
        let started = Instant::now();
        let plan = plan(model, self.policy())?;
        info!(
            target: event_names::CHAIN_STARTED,
            stage = %Stage::Reduce,
            fingerprint = &model.fingerprint()[..12],
            states = model.num_states(),
            pairs = plan.len(),
            policy = %self.policy(),
        );
        let reduced = self.run_pairs(model, &plan)?;
        let chain = self.compose(model, into_pair_map(reduced))?;
        self.log_finished(&chain, plan.len(), started);
        Ok(chain)
    }

    /// Re-derive `base` for `model`, recomputing only pairs that depend on
    /// `changed`. `model` must share `base`'s structure.
    pub fn rebuild(
        &self,
        model: &ResolvedModel,
        base: &ReducedChain,
        changed: EventId,
    ) -> Result<ReducedChain> {
        let started = Instant::now();
        let plan = plan(model, self.policy())?;
        let mut pairs: PairMap = BTreeMap::new();
        let mut stale = Vec::new();
        for &(state, event) in &plan {
            match base.transition(state, event) {
                Some(t) if !t.depends_on(changed) => {
                    pairs.entry(state).or_default().insert(event, t.clone());
                }
                _ => stale.push((state, event)),
            }
        }
        let recomputed = stale.len();
        for t in self.run_pairs(model, &stale)? {
            pairs.entry(t.state).or_default().insert(t.event, t);
        }
        let chain = self.compose(model, pairs)?;
        info!(
            target: event_names::SYNTHESIS_REDUCED,
            stage = %Stage::Synthesize,
            event = model.event_name(changed),
            recomputed,
            reused = plan.len() - recomputed,
            elapsed_ms = started.elapsed().as_millis() as u64,
        );
        Ok(chain)
    }

    fn run_pairs(
        &self,
        model: &ResolvedModel,
        pairs: &[(StateId, EventId)],
    ) -> Result<Vec<ReducedTransition>> {
        let work = || {
            pairs
                .par_iter()
                .map(|&(state, event)| self.reduce_pair(model, state, event))
                .collect::<Result<Vec<_>>>()
        };
        match &self.pool {
            Some(pool) => pool.install(work),
            None => work(),
        }
    }

    fn compose(&self, model: &ResolvedModel, pairs: PairMap) -> Result<ReducedChain> {
        let policy = self.policy();
        let states = (0..model.num_states())
            .map(|i| {
                let state = StateId(i);
                match pairs.get(&state) {
                    Some(reduced) if !reduced.is_empty() => {
                        compose_state(model, state, reduced, policy)
                    }
                    _ => Ok(ReducedState::absorbing(model.num_rewards())),
                }
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(ReducedChain::new(
            model.fingerprint().to_string(),
            policy,
            model.initial_state(),
            model.reward_names(),
            states,
            pairs,
        ))
    }

    fn log_finished(&self, chain: &ReducedChain, pairs: usize, started: Instant) {
        let stats = self.cache.stats();
        info!(
            target: event_names::CHAIN_FINISHED,
            stage = %Stage::Compose,
            fingerprint = &chain.fingerprint()[..12],
            states = chain.num_states(),
            pairs,
            cache_hits = stats.hits,
            cache_misses = stats.misses,
            elapsed_ms = started.elapsed().as_millis() as u64,
        );
    }
}

fn into_pair_map(reduced: Vec<ReducedTransition>) -> PairMap {
    let mut pairs: PairMap = BTreeMap::new();
    for t in reduced {
        pairs.entry(t.state).or_default().insert(t.event, t);
    }
    pairs
}

/// All pairs the policy reduces, ordered by state then event.
pub fn plan(model: &ResolvedModel, policy: CompositionPolicy) -> Result<Vec<(StateId, EventId)>> {
    let mut pairs = Vec::new();
    for i in 0..model.num_states() {
        let state = StateId(i);
        for event in events_to_reduce(model, state, policy)? {
            pairs.push((state, event));
        }
    }
    Ok(pairs)
}

/// Events reduced at `state`: under the exclusive policy a non-exponential
/// event alone defines its state.
fn events_to_reduce(
    model: &ResolvedModel,
    state: StateId,
    policy: CompositionPolicy,
) -> Result<Vec<EventId>> {
    let enabled = model.enabled_events(state);
    match policy {
        CompositionPolicy::RateWeighted => Ok(enabled.to_vec()),
        CompositionPolicy::Exclusive => {
            let general: Vec<EventId> = enabled
                .iter()
                .copied()
                .filter(|&e| !model.params(e).is_exponential())
                .collect();
            match general.as_slice() {
                [] => Ok(enabled.to_vec()),
                [only] => Ok(vec![*only]),
                [first, second, ..] => Err(Error::ReductionInconsistency(format!(
                    "{} and {} are both non-exponential at {state} under the exclusive policy",
                    model.event_name(*first),
                    model.event_name(*second)
                ))),
            }
        }
    }
}

/// Mix the per-event reductions at `state` into one reduced state.
fn compose_state(
    model: &ResolvedModel,
    state: StateId,
    reduced: &BTreeMap<EventId, ReducedTransition>,
    policy: CompositionPolicy,
) -> Result<ReducedState> {
    // Exclusive: a lone non-exponential event has weight 1, exponential
    // events mix by rate. Rate-weighted: everything mixes by 1/mean.
    let raw: Vec<(f64, &ReducedTransition)> = reduced
        .values()
        .map(|t| (model.params(t.event).race_rate(), t))
        .collect();
    let total: f64 = raw.iter().map(|(w, _)| w).sum();
    if !(total.is_finite() && total > 0.0) {
        return Err(Error::ReductionInconsistency(format!(
            "composition weights at {state} sum to {total} under {policy}"
        )));
    }

    let mut composed = ReducedState {
        rewards: vec![0.0; model.num_rewards()],
        ..ReducedState::default()
    };
    for (weight, t) in raw {
        let w = weight / total;
        for (&target, &p) in &t.result.exits {
            *composed.transitions.entry(target).or_insert(0.0) += w * p;
        }
        composed.expected_sojourn += w * t.result.expected_sojourn;
        for (acc, r) in composed.rewards.iter_mut().zip(&t.result.rewards) {
            *acc += w * r;
        }
    }
    Ok(composed)
}
