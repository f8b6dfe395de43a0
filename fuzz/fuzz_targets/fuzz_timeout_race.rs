//! Fuzz target for the reduction pipeline.
//!
//! Races a general timeout against an exponential delivery with arbitrary
//! parameters. Reduction may fail with an error, but every successful
//! result must be a probability distribution.

#![no_main]

use arbitrary::Arbitrary;
use gsmp_core::{
    DistributionDecl, EventDecl, GsmpModel, ModelContext, Orchestrator, ReductionConfig, StateId,
};
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Arbitrary)]
struct Race {
    family: u8,
    rate: f64,
    first: f64,
    second: f64,
}

fuzz_target!(|race: Race| {
    let timer = match race.family % 5 {
        0 => DistributionDecl::new("exponential", race.first),
        1 => DistributionDecl::new("dirac", race.first),
        2 => DistributionDecl::new("erlang", (race.first.abs() % 32.0).ceil())
            .with_second(race.second),
        3 => DistributionDecl::new("uniform", race.first).with_second(race.second),
        _ => DistributionDecl::new("weibull", race.first).with_second(race.second),
    };
    let model = GsmpModel::new(3)
        .with_distribution("deliver", DistributionDecl::new("exponential", race.rate))
        .with_distribution("timer", timer)
        .with_event(EventDecl::new("deliver", "deliver").enabled_at(0, &[(1, 1.0)]))
        .with_event(EventDecl::new("timeout", "timer").enabled_at(0, &[(2, 1.0)]));

    let Ok(orchestrator) = Orchestrator::new(ReductionConfig::default()) else {
        return;
    };
    let Ok(resolved) = orchestrator.resolve(&model, &ModelContext::new()) else {
        return;
    };
    if let Ok(chain) = orchestrator.reduce_all(&resolved) {
        let total: f64 = chain
            .state(StateId(0))
            .map_or(1.0, |s| s.transitions.values().sum());
        assert!((total - 1.0).abs() < 1e-3, "exit mass {total}");
    }
});
