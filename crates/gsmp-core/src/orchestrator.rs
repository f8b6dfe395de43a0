//! Model-checking orchestrator.
//!
//! Owns the immutable configuration and the assembler, memoizes reduced
//! chains by model fingerprint, and hands chains to an external solver.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use gsmp_common::{Error, EventId, Result, StateId};
use gsmp_config::{validate_config, LoadedConfig, ReductionConfig};
use tracing::{debug, info, warn};

use crate::assembler::Assembler;
use crate::cache::ApproximationCache;
use crate::chain::{ReducedChain, ReducedTransition};
use crate::logging::{event_names, Stage};
use crate::model::{GsmpModel, ModelContext};
use crate::resolve::ResolvedModel;
use crate::synthesis::SynthesisQuery;

/// A conventional Markov-chain solver consuming reduced chains.
pub trait ChainSolver {
    type Query;
    type Output;

    fn solve(&self, chain: &ReducedChain, query: &Self::Query) -> Result<Self::Output>;
}

/// Fingerprint-keyed chains, oldest evicted first.
#[derive(Debug, Default)]
struct ChainCache {
    chains: HashMap<String, Arc<ReducedChain>>,
    order: VecDeque<String>,
}

/// Entry point for reductions and checks.
#[derive(Debug)]
pub struct Orchestrator {
    config: Arc<ReductionConfig>,
    assembler: Assembler,
    chains: Mutex<ChainCache>,
}

impl Orchestrator {
    /// Validate `config` and start an orchestrator.
    pub fn new(config: ReductionConfig) -> Result<Self> {
        validate_config(&config).map_err(|e| Error::Config(e.to_string()))?;
        let config = Arc::new(config);
        let assembler = Assembler::new(Arc::clone(&config))?;
        info!(
            target: event_names::ORCHESTRATOR_READY,
            stage = %Stage::Init,
            epsilon = config.epsilon,
            policy = %config.composition.policy,
            workers = ?config.execution.workers,
        );
        Ok(Self {
            config,
            assembler,
            chains: Mutex::new(ChainCache::default()),
        })
    }

    /// Start from a configuration produced by [`gsmp_config::load_config`].
    pub fn from_loaded(loaded: LoadedConfig) -> Result<Self> {
        info!(
            target: event_names::CONFIG_LOADED,
            stage = %Stage::Init,
            source = %loaded.snapshot.config_source,
            path = ?loaded.snapshot.config_path,
            hash = loaded.snapshot.short_id(),
        );
        Self::new(loaded.config)
    }

    pub fn config(&self) -> &ReductionConfig {
        &self.config
    }

    pub fn approximation_cache(&self) -> &ApproximationCache {
        self.assembler.cache()
    }

    /// Resolve `model` against `ctx`.
    pub fn resolve(&self, model: &GsmpModel, ctx: &ModelContext) -> Result<ResolvedModel> {
        let resolved = ResolvedModel::new(model, ctx)?;
        debug!(
            target: event_names::MODEL_RESOLVED,
            stage = %Stage::Resolve,
            states = resolved.num_states(),
            events = resolved.num_events(),
            fingerprint = &resolved.fingerprint()[..12],
        );
        Ok(resolved)
    }

    /// Per-event reductions at one state.
    pub fn reduce(
        &self,
        model: &ResolvedModel,
        state: StateId,
    ) -> Result<std::collections::BTreeMap<EventId, ReducedTransition>> {
        if let Some(chain) = self.cached(model.fingerprint()) {
            model.check_state(state)?;
            return Ok(chain.transitions_from(state).cloned().unwrap_or_default());
        }
        self.assembler.reduce_state(model, state)
    }

    /// The reduced chain of `model`, memoized by fingerprint.
    pub fn reduce_all(&self, model: &ResolvedModel) -> Result<Arc<ReducedChain>> {
        if let Some(chain) = self.cached(model.fingerprint()) {
            debug!(
                target: event_names::CHAIN_CACHE_HIT,
                stage = %Stage::Reduce,
                fingerprint = &model.fingerprint()[..12],
            );
            return Ok(chain);
        }
        let chain = Arc::new(self.assembler.reduce_all(model)?);
        self.remember(Arc::clone(&chain));
        Ok(chain)
    }

    /// Resolve, reduce and solve in one go.
    pub fn check<S: ChainSolver>(
        &self,
        model: &GsmpModel,
        ctx: &ModelContext,
        solver: &S,
        query: &S::Query,
    ) -> Result<S::Output> {
        let resolved = self.resolve(model, ctx)?;
        let chain = self.reduce_all(&resolved)?;
        self.solve(&chain, solver, query)
    }

    /// Hand `chain` to `solver`; the answer is returned unchanged.
    pub fn solve<S: ChainSolver>(
        &self,
        chain: &ReducedChain,
        solver: &S,
        query: &S::Query,
    ) -> Result<S::Output> {
        let started = Instant::now();
        debug!(
            target: event_names::SOLVE_STARTED,
            stage = %Stage::Solve,
            states = chain.num_states(),
        );
        let output = solver.solve(chain, query)?;
        debug!(
            target: event_names::SOLVE_FINISHED,
            stage = %Stage::Solve,
            elapsed_ms = started.elapsed().as_millis() as u64,
        );
        Ok(output)
    }

    /// The chain of `model` with the synthesized parameter set to `value`.
    ///
    /// Only pairs depending on the parameter's event are re-derived; the rest
    /// come from `model`'s own (cached) chain.
    pub fn reduce_with(
        &self,
        model: &ResolvedModel,
        query: &SynthesisQuery,
        value: f64,
    ) -> Result<Arc<ReducedChain>> {
        let next = query.apply(model, value)?;
        if let Some(chain) = self.cached(next.fingerprint()) {
            return Ok(chain);
        }
        let base = self.reduce_all(model)?;
        let chain = Arc::new(self.assembler.rebuild(&next, &base, query.event())?);
        self.remember(Arc::clone(&chain));
        Ok(chain)
    }

    /// Chains at `samples` evenly spaced interior points of the range.
    pub fn sweep(
        &self,
        model: &ResolvedModel,
        query: &SynthesisQuery,
        samples: usize,
    ) -> Result<Vec<(f64, Arc<ReducedChain>)>> {
        query
            .interior_points(samples)
            .into_iter()
            .map(|value| Ok((value, self.reduce_with(model, query, value)?)))
            .collect()
    }

    /// Number of memoized chains.
    pub fn cached_chains(&self) -> usize {
        self.chains.lock().map(|c| c.chains.len()).unwrap_or(0)
    }

    /// Forget every memoized chain and approximation.
    pub fn clear_caches(&self) {
        if let Ok(mut cache) = self.chains.lock() {
            cache.chains.clear();
            cache.order.clear();
        }
        self.assembler.cache().clear();
    }

    fn cached(&self, fingerprint: &str) -> Option<Arc<ReducedChain>> {
        self.chains
            .lock()
            .ok()
            .and_then(|c| c.chains.get(fingerprint).cloned())
    }

    fn remember(&self, chain: Arc<ReducedChain>) {
        let Ok(mut cache) = self.chains.lock() else {
            return;
        };
        let key = chain.fingerprint().to_string();
        if cache.chains.contains_key(&key) {
            return;
        }
        while cache.chains.len() >= self.config.cache.max_chains {
            let Some(oldest) = cache.order.pop_front() else {
                break;
            };
            cache.chains.remove(&oldest);
            warn!(
                target: event_names::CHAIN_CACHE_EVICTED,
                stage = %Stage::Compose,
                fingerprint = &oldest[..12.min(oldest.len())],
                "reduced chain evicted"
            );
        }
        cache.order.push_back(key.clone());
        cache.chains.insert(key, chain);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DistributionDecl, EventDecl};
    use crate::synthesis::ParameterToSynthesize;

    fn timeout_model() -> GsmpModel {
        GsmpModel::new(3)
            .with_distribution("arr", DistributionDecl::new("exponential", "lambda"))
            .with_distribution("tmo", DistributionDecl::new("dirac", "d"))
            .with_event(EventDecl::new("arrive", "arr").enabled_at(0, &[(1, 1.0)]))
            .with_event(EventDecl::new("timeout", "tmo").enabled_at(1, &[(2, 1.0)]))
            .with_event(EventDecl::new("reset", "arr").enabled_at(1, &[(0, 1.0)]))
    }

    fn ctx(d: f64) -> ModelContext {
        ModelContext::new()
            .with_constant("lambda", 1.0)
            .with_constant("d", d)
    }

    struct NextState;

    impl ChainSolver for NextState {
        type Query = (StateId, StateId);
        type Output = f64;

        fn solve(&self, chain: &ReducedChain, query: &Self::Query) -> Result<f64> {
            Ok(chain.probability(query.0, query.1))
        }
    }

    #[test]
    fn invalid_config_is_rejected() {
        let err = Orchestrator::new(ReductionConfig::default().with_epsilon(0.0)).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn chains_are_memoized_by_fingerprint() {
        let orchestrator = Orchestrator::new(ReductionConfig::default()).unwrap();
        let resolved = orchestrator.resolve(&timeout_model(), &ctx(1.0)).unwrap();
        let a = orchestrator.reduce_all(&resolved).unwrap();
        let b = orchestrator.reduce_all(&resolved).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(orchestrator.cached_chains(), 1);

        let other = orchestrator.resolve(&timeout_model(), &ctx(2.0)).unwrap();
        orchestrator.reduce_all(&other).unwrap();
        assert_eq!(orchestrator.cached_chains(), 2);

        orchestrator.clear_caches();
        assert_eq!(orchestrator.cached_chains(), 0);
    }

    #[test]
    fn chain_cache_is_bounded() {
        let mut config = ReductionConfig::default();
        config.cache.max_chains = 2;
        let orchestrator = Orchestrator::new(config).unwrap();
        for d in [1.0, 2.0, 3.0] {
            let resolved = orchestrator.resolve(&timeout_model(), &ctx(d)).unwrap();
            orchestrator.reduce_all(&resolved).unwrap();
        }
        assert_eq!(orchestrator.cached_chains(), 2);
    }

    #[test]
    fn check_returns_solver_answer() {
        let orchestrator = Orchestrator::new(ReductionConfig::default()).unwrap();
        let p = orchestrator
            .check(&timeout_model(), &ctx(1.0), &NextState, &(StateId(1), StateId(2)))
            .unwrap();
        // Timeout at d = 1 racing reset at rate 1.
        assert!((p - (-1.0f64).exp()).abs() < 1e-5);
    }

    #[test]
    fn reduce_matches_reduce_all() {
        let orchestrator = Orchestrator::new(ReductionConfig::default()).unwrap();
        let resolved = orchestrator.resolve(&timeout_model(), &ctx(1.0)).unwrap();
        let fresh = orchestrator.reduce(&resolved, StateId(1)).unwrap();
        let chain = orchestrator.reduce_all(&resolved).unwrap();
        let cached = orchestrator.reduce(&resolved, StateId(1)).unwrap();
        assert_eq!(&fresh, chain.transitions_from(StateId(1)).unwrap());
        assert_eq!(fresh, cached);
        assert!(orchestrator.reduce(&resolved, StateId(2)).unwrap().is_empty());
        assert!(orchestrator.reduce(&resolved, StateId(5)).is_err());
    }

    #[test]
    fn sweep_reduces_each_point() {
        let orchestrator = Orchestrator::new(ReductionConfig::default()).unwrap();
        let resolved = orchestrator.resolve(&timeout_model(), &ctx(1.0)).unwrap();
        let query = SynthesisQuery::new(
            &resolved,
            ParameterToSynthesize::new("timeout", 1, 0.5, 3.5),
        )
        .unwrap();
        let points = orchestrator.sweep(&resolved, &query, 3).unwrap();
        assert_eq!(points.len(), 3);
        for (d, chain) in &points {
            let p = chain.probability(StateId(1), StateId(2));
            assert!((p - (-d).exp()).abs() < 1e-5, "d={d}: {p}");
        }
        // Base chain plus one per sample point.
        assert_eq!(orchestrator.cached_chains(), 4);
        assert!(orchestrator.reduce_with(&resolved, &query, 4.0).is_err());
    }
}
