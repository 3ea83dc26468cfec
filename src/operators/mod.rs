pub mod crossover;
pub mod mutation;
pub mod pareto;
pub mod registry;
pub mod selection;

pub use crossover::{Crossover, UniformBitstringCrossover};
pub use mutation::{IntegerMutation, Mutation, MutationContext, RandomBitFlip};
pub use registry::OperatorRegistry;
pub use selection::{CommaSelection, HypervolumeSelection, PlusSelection, Selection};
