//! Evolutionary Strategy optimization engine: generational (mu+lambda),
//! (mu,lambda) and SMS-EMOA search over mixed genomes of binary and integer
//! representations, with composable genetic operators, an optional variable
//! neighborhood search and resumable, ARFF-shaped run logs.
//!
//! The expensive part of a run, fitness computation, is delegated to a
//! [`evaluator::FitnessEvaluator`] collaborator; the engine itself stays
//! single-threaded and fully deterministic under a fixed seed.

pub mod config;
pub mod engine;
pub mod error;
pub mod evaluator;
pub mod individual;
pub mod operators;
pub mod representation;
pub mod runlog;

pub use config::{EngineSettings, ParameterStore, StrategyDescriptor};
pub use engine::{EvolutionaryStrategyEngine, RunState, RunSummary};
pub use error::{EvostratError, Result};
pub use evaluator::{FitnessEvaluator, FitnessVector, Measure};
pub use individual::Individual;
pub use operators::OperatorRegistry;
pub use representation::RepresentationRegistry;
