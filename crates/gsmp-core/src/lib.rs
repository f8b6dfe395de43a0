//! GSMP Reduction Core Library
//!
//! Reduces a generalized semi-Markov process to a semi-Markov chain over its
//! original states by "potato" construction:
//! - Model declaration and constant resolution
//! - Potato construction for each (state, event) pair
//! - Per-family strategies (exponential, Erlang, Dirac, uniform, Weibull)
//! - Chain assembly with a bounded approximation cache
//! - Parameter synthesis with incremental re-derivation
//!
//! [`Orchestrator`] is the entry point; the reduced chain is handed to any
//! [`ChainSolver`].

pub mod assembler;
pub mod cache;
pub mod chain;
pub mod distribution;
pub mod logging;
pub mod model;
pub mod orchestrator;
pub mod potato;
pub mod resolve;
pub mod strategy;
pub mod synthesis;
pub mod transient;

pub use assembler::Assembler;
pub use cache::{ApproximationCache, CacheStats};
pub use chain::{ReducedChain, ReducedState, ReducedTransition};
pub use distribution::{DistributionKind, DistributionParams};
pub use model::{DistributionDecl, EventDecl, GsmpModel, ModelContext, ParamExpr, RewardStructure};
pub use orchestrator::{ChainSolver, Orchestrator};
pub use potato::Potato;
pub use resolve::ResolvedModel;
pub use synthesis::{ParameterToSynthesize, SynthesisQuery};
pub use transient::PotatoResult;

pub use gsmp_common::{Error, EventId, Result, StateId};
pub use gsmp_config::{CompositionPolicy, ReductionConfig};
