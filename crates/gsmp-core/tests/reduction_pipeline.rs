//! End-to-end reductions checked against closed forms.
//!
//! Each model is small enough that the embedded jump probabilities and mean
//! sojourns of the reduced chain are known analytically.

use gsmp_core::{
    ChainSolver, CompositionPolicy, DistributionDecl, Error, EventDecl, GsmpModel, ModelContext,
    Orchestrator, ReducedChain, ReductionConfig, Result, RewardStructure, StateId,
};

/// Probability of eventually reaching `target`, by value iteration on the
/// embedded jump chain.
struct Reachability {
    iterations: usize,
}

impl ChainSolver for Reachability {
    type Query = StateId;
    type Output = f64;

    fn solve(&self, chain: &ReducedChain, target: &StateId) -> Result<f64> {
        let n = chain.num_states();
        let mut x = vec![0.0; n];
        x[target.index()] = 1.0;
        for _ in 0..self.iterations {
            let next: Vec<f64> = (0..n)
                .map(|i| {
                    if i == target.index() {
                        return 1.0;
                    }
                    chain.states()[i]
                        .transitions
                        .iter()
                        .map(|(to, p)| p * x[to.index()])
                        .sum()
                })
                .collect();
            x = next;
        }
        Ok(x[chain.initial_state().index()])
    }
}

/// Expected accumulated reward until absorption.
struct AccumulatedReward {
    iterations: usize,
}

impl ChainSolver for AccumulatedReward {
    type Query = String;
    type Output = f64;

    fn solve(&self, chain: &ReducedChain, reward: &String) -> Result<f64> {
        let r = chain
            .reward_index(reward)
            .ok_or_else(|| Error::RewardEvaluation(format!("no reward named {reward}")))?;
        let n = chain.num_states();
        let mut x = vec![0.0; n];
        for _ in 0..self.iterations {
            let next: Vec<f64> = chain
                .states()
                .iter()
                .map(|s| {
                    s.rewards[r]
                        + s.transitions
                            .iter()
                            .map(|(to, p)| p * x[to.index()])
                            .sum::<f64>()
                })
                .collect();
            x = next;
        }
        Ok(x[chain.initial_state().index()])
    }
}

/// A message is delivered at rate `lambda` unless its deterministic timeout
/// `d` elapses first. States: sending, delivered, failed.
fn timeout_model() -> GsmpModel {
    GsmpModel::new(3)
        .with_distribution("deliver", DistributionDecl::new("exponential", "lambda"))
        .with_distribution("timer", DistributionDecl::new("dirac", "d"))
        .with_event(EventDecl::new("deliver", "deliver").enabled_at(0, &[(1, 1.0)]))
        .with_event(EventDecl::new("timeout", "timer").enabled_at(0, &[(2, 1.0)]))
        .with_reward(RewardStructure::new("waiting", vec![1.0, 0.0, 0.0]))
}

fn ctx(lambda: f64, d: f64) -> ModelContext {
    ModelContext::new()
        .with_constant("lambda", lambda)
        .with_constant("d", d)
}

fn orchestrator() -> Orchestrator {
    Orchestrator::new(ReductionConfig::default()).unwrap()
}

#[test]
fn timeout_race_matches_closed_form() {
    let orchestrator = orchestrator();
    let (lambda, d) = (0.8, 1.5);
    let model = orchestrator.resolve(&timeout_model(), &ctx(lambda, d)).unwrap();
    let chain = orchestrator.reduce_all(&model).unwrap();

    let p_fail = (-lambda * d).exp();
    assert!((chain.probability(StateId(0), StateId(2)) - p_fail).abs() < 1e-5);
    assert!((chain.probability(StateId(0), StateId(1)) - (1.0 - p_fail)).abs() < 1e-5);

    // E[min(Exp(lambda), d)]
    let sojourn = (1.0 - p_fail) / lambda;
    let state = chain.state(StateId(0)).unwrap();
    assert!((state.expected_sojourn - sojourn).abs() < 1e-4);
    assert!((state.rewards[0] - sojourn).abs() < 1e-4);

    assert!(chain.state(StateId(1)).unwrap().absorbing);
    assert!(chain.state(StateId(2)).unwrap().absorbing);
}

#[test]
fn solvers_consume_reduced_chain() {
    let orchestrator = orchestrator();
    let (lambda, d) = (2.0, 0.5);
    let p = orchestrator
        .check(
            &timeout_model(),
            &ctx(lambda, d),
            &Reachability { iterations: 8 },
            &StateId(2),
        )
        .unwrap();
    assert!((p - (-lambda * d).exp()).abs() < 1e-5);

    let waiting = orchestrator
        .check(
            &timeout_model(),
            &ctx(lambda, d),
            &AccumulatedReward { iterations: 8 },
            &"waiting".to_string(),
        )
        .unwrap();
    assert!((waiting - (1.0 - (-lambda * d).exp()) / lambda).abs() < 1e-4);

    // Second check hits the chain cache.
    assert_eq!(orchestrator.cached_chains(), 1);
}

#[test]
fn unknown_reward_is_reported_by_solver() {
    let orchestrator = orchestrator();
    let err = orchestrator
        .check(
            &timeout_model(),
            &ctx(1.0, 1.0),
            &AccumulatedReward { iterations: 1 },
            &"energy".to_string(),
        )
        .unwrap_err();
    assert!(matches!(err, Error::RewardEvaluation(_)));
}

#[test]
fn deterministic_service_potato_spans_arrivals() {
    // Capacity-two queue: arrivals at rate lambda while not full,
    // deterministic service of length d while busy. Arrivals do not disable
    // the running service, so the potato of (1, service) covers {1, 2}.
    let model = GsmpModel::new(3)
        .with_distribution("arr", DistributionDecl::new("exponential", "lambda"))
        .with_distribution("srv", DistributionDecl::new("dirac", "d"))
        .with_event(
            EventDecl::new("arrive", "arr")
                .enabled_at(0, &[(1, 1.0)])
                .enabled_at(1, &[(2, 1.0)]),
        )
        .with_event(
            EventDecl::new("serve", "srv")
                .enabled_at(1, &[(0, 1.0)])
                .enabled_at(2, &[(1, 1.0)]),
        );
    let orchestrator = orchestrator();
    let (lambda, d) = (1.2, 0.7);
    let resolved = orchestrator.resolve(&model, &ctx(lambda, d)).unwrap();
    let chain = orchestrator.reduce_all(&resolved).unwrap();

    let serve = resolved.event_id("serve").unwrap();
    let pair = chain.transition(StateId(1), serve).unwrap();
    assert_eq!(pair.potato_size, 2);

    let idle = (-lambda * d).exp();
    assert!((chain.probability(StateId(1), StateId(0)) - idle).abs() < 1e-5);
    assert!((chain.probability(StateId(1), StateId(1)) - (1.0 - idle)).abs() < 1e-5);
    assert!((chain.state(StateId(1)).unwrap().expected_sojourn - d).abs() < 1e-4);

    assert!((chain.probability(StateId(2), StateId(1)) - 1.0).abs() < 1e-5);
    assert!((chain.probability(StateId(0), StateId(1)) - 1.0).abs() < 1e-12);
    assert!((chain.state(StateId(0)).unwrap().expected_sojourn - 1.0 / lambda).abs() < 1e-9);
}

#[test]
fn uniform_and_erlang_timeouts() {
    let (lambda, a, b) = (1.0, 0.5, 2.0);
    let uniform = GsmpModel::new(3)
        .with_distribution("deliver", DistributionDecl::new("exponential", lambda))
        .with_distribution("timer", DistributionDecl::new("uniform", a).with_second(b))
        .with_event(EventDecl::new("deliver", "deliver").enabled_at(0, &[(1, 1.0)]))
        .with_event(EventDecl::new("timeout", "timer").enabled_at(0, &[(2, 1.0)]));
    let orchestrator = orchestrator();
    let model = orchestrator.resolve(&uniform, &ModelContext::new()).unwrap();
    let chain = orchestrator.reduce_all(&model).unwrap();
    // E[exp(-lambda T)] for T ~ U(a, b)
    let expected = ((-lambda * a).exp() - (-lambda * b).exp()) / (lambda * (b - a));
    assert!((chain.probability(StateId(0), StateId(2)) - expected).abs() < 1e-5);

    let (k, mu) = (3.0, 2.0);
    let erlang = GsmpModel::new(3)
        .with_distribution("deliver", DistributionDecl::new("exponential", lambda))
        .with_distribution("timer", DistributionDecl::new("erlang", k).with_second(mu))
        .with_event(EventDecl::new("deliver", "deliver").enabled_at(0, &[(1, 1.0)]))
        .with_event(EventDecl::new("timeout", "timer").enabled_at(0, &[(2, 1.0)]));
    let model = orchestrator.resolve(&erlang, &ModelContext::new()).unwrap();
    let chain = orchestrator.reduce_all(&model).unwrap();
    let expected = (mu / (lambda + mu)).powi(k as i32);
    assert!((chain.probability(StateId(0), StateId(2)) - expected).abs() < 1e-9);
}

#[test]
fn weibull_shape_one_is_exponential() {
    let (lambda, scale) = (0.5, 2.0);
    let model = GsmpModel::new(3)
        .with_distribution("deliver", DistributionDecl::new("exponential", lambda))
        .with_distribution("timer", DistributionDecl::new("weibull", 1.0).with_second(scale))
        .with_event(EventDecl::new("deliver", "deliver").enabled_at(0, &[(1, 1.0)]))
        .with_event(EventDecl::new("timeout", "timer").enabled_at(0, &[(2, 1.0)]));
    let orchestrator = orchestrator();
    let resolved = orchestrator.resolve(&model, &ModelContext::new()).unwrap();
    let chain = orchestrator.reduce_all(&resolved).unwrap();
    let expected = (1.0 / scale) / (lambda + 1.0 / scale);
    assert!((chain.probability(StateId(0), StateId(2)) - expected).abs() < 1e-5);
}

#[test]
fn composition_policies_diverge_only_on_general_conflicts() {
    // Two deterministic timers racing in state 0.
    let model = GsmpModel::new(3)
        .with_distribution("short", DistributionDecl::new("dirac", 1.0))
        .with_distribution("long", DistributionDecl::new("dirac", 3.0))
        .with_event(EventDecl::new("a", "short").enabled_at(0, &[(1, 1.0)]))
        .with_event(EventDecl::new("b", "long").enabled_at(0, &[(2, 1.0)]));

    let exclusive = orchestrator();
    let resolved = exclusive.resolve(&model, &ModelContext::new()).unwrap();
    assert!(matches!(
        exclusive.reduce_all(&resolved),
        Err(Error::ReductionInconsistency(_))
    ));

    let weighted = Orchestrator::new(
        ReductionConfig::default().with_policy(CompositionPolicy::RateWeighted),
    )
    .unwrap();
    let chain = weighted.reduce_all(&resolved).unwrap();
    let total: f64 = chain.state(StateId(0)).unwrap().transitions.values().sum();
    assert!((total - 1.0).abs() < 1e-6);
    assert!(chain.probability(StateId(0), StateId(1)) > chain.probability(StateId(0), StateId(2)));
}

#[test]
fn model_json_roundtrip_reduces_identically() {
    let json = r#"{
        "num_states": 3,
        "events": [
            {"name": "deliver", "distribution": "deliver", "enabled": {"0": [[1, 1.0]]}},
            {"name": "timeout", "distribution": "timer", "enabled": {"0": [[2, 1.0]]}}
        ],
        "distributions": {
            "deliver": {"kind": "exponential", "first": "lambda"},
            "timer": {"kind": "dirac", "first": "d"}
        },
        "rewards": [{"name": "waiting", "state_rewards": [1.0, 0.0, 0.0]}]
    }"#;
    let parsed = GsmpModel::from_json(json).unwrap();
    assert_eq!(parsed, timeout_model());

    let orchestrator = orchestrator();
    let a = orchestrator.resolve(&parsed, &ctx(1.0, 1.0)).unwrap();
    let b = orchestrator.resolve(&timeout_model(), &ctx(1.0, 1.0)).unwrap();
    assert_eq!(a.fingerprint(), b.fingerprint());

    let chain = orchestrator.reduce_all(&a).unwrap();
    let restored = ReducedChain::from_json(&chain.to_json().unwrap()).unwrap();
    assert_eq!(&restored, chain.as_ref());
}

#[test]
fn undefined_constant_fails_resolution() {
    let err = orchestrator()
        .resolve(&timeout_model(), &ModelContext::new().with_constant("lambda", 1.0))
        .unwrap_err();
    assert!(matches!(err, Error::InvalidParameter { .. }));
}
