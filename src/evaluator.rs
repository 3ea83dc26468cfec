use crate::individual::Individual;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One named objective value. `minimize` records the optimization direction
/// declared for this measure; the first measure of the vector is the primary
/// one and steers single-objective selection and VNS acceptance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Measure {
    pub name: String,
    pub value: f64,
    pub minimize: bool,
}

impl Measure {
    pub fn minimizing(name: &str, value: f64) -> Self {
        Self {
            name: name.to_string(),
            value,
            minimize: true,
        }
    }

    pub fn maximizing(name: &str, value: f64) -> Self {
        Self {
            name: name.to_string(),
            value,
            minimize: false,
        }
    }
}

pub type FitnessVector = Vec<Measure>;

/// Failure reported by the evaluator collaborator. The engine wraps it into
/// an [`crate::error::EvaluationError`] carrying the current generation and
/// evaluation number before aborting the run.
#[derive(Error, Debug)]
#[error("{0}")]
pub struct EvaluatorFailure(pub String);

impl EvaluatorFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// External collaborator that trains/validates a candidate configuration and
/// returns its objective values. Assumed synchronous, deterministic and
/// expensive; failures abort the run, there is no retry.
pub trait FitnessEvaluator {
    /// Called once before the generation loop.
    fn initialize(&mut self, use_independent_test_set: bool) -> Result<(), EvaluatorFailure>;

    /// Computes the fitness vector of one individual, on the training data or
    /// on the independent test set.
    fn evaluate(
        &mut self,
        individual: &Individual,
        on_test_set: bool,
    ) -> Result<FitnessVector, EvaluatorFailure>;

    /// Called once after the loop, also on graceful early termination.
    fn close(&mut self) -> Result<(), EvaluatorFailure>;
}
