use crate::config::ParameterNode;
use crate::error::{ConfigError, EvostratError};
use crate::representation::{BinaryVector, Representation};
use rand::rngs::StdRng;
use rand::Rng;

/// Recombination over representations of one declared type. A crossover is a
/// pure function of its parents; inputs are never mutated.
pub trait Crossover: Send {
    fn parent_count(&self) -> usize;

    fn offspring_count(&self) -> usize;

    /// Produces `offspring_count()` new representations from exactly
    /// `parent_count()` parents.
    fn crossover(
        &self,
        parents: &[&dyn Representation],
        rng: &mut StdRng,
    ) -> Result<Vec<Box<dyn Representation>>, EvostratError>;
}

/// Uniform bit-string crossover: every offspring inherits each bit from a
/// uniformly drawn parent. Offspring that come out all-zero get one random
/// bit set.
pub struct UniformBitstringCrossover {
    parent_count: usize,
    offspring_count: usize,
}

impl UniformBitstringCrossover {
    pub const TYPE_TAG: &'static str = "UniformBitstringCrossover";

    pub fn new(parent_count: usize, offspring_count: usize) -> Self {
        Self {
            parent_count,
            offspring_count,
        }
    }

    pub fn from_node(node: &ParameterNode) -> Result<Box<dyn Crossover>, ConfigError> {
        let parent_count = node.int_param("parentNumber")?;
        let offspring_count = node.int_param("offspringNumber")?;
        if parent_count < 2 || offspring_count < 1 {
            return Err(ConfigError::Invalid(format!(
                "Uniform bitstring crossover needs at least 2 parents and 1 offspring \
                 (got {} and {})",
                parent_count, offspring_count
            )));
        }
        Ok(Box::new(Self::new(
            parent_count as usize,
            offspring_count as usize,
        )))
    }
}

impl Crossover for UniformBitstringCrossover {
    fn parent_count(&self) -> usize {
        self.parent_count
    }

    fn offspring_count(&self) -> usize {
        self.offspring_count
    }

    fn crossover(
        &self,
        parents: &[&dyn Representation],
        rng: &mut StdRng,
    ) -> Result<Vec<Box<dyn Representation>>, EvostratError> {
        if parents.len() != self.parent_count {
            return Err(EvostratError::Engine(format!(
                "Uniform bitstring crossover expects {} parents, got {}",
                self.parent_count,
                parents.len()
            )));
        }
        let parents: Vec<&BinaryVector> = parents
            .iter()
            .map(|p| {
                p.as_any().downcast_ref::<BinaryVector>().ok_or_else(|| {
                    EvostratError::Engine(format!(
                        "Uniform bitstring crossover bound to representation type '{}'",
                        p.type_tag()
                    ))
                })
            })
            .collect::<Result<_, _>>()?;
        let length = parents[0].bits().len();

        let mut children = Vec::with_capacity(self.offspring_count);
        for _ in 0..self.offspring_count {
            let bits = (0..length)
                .map(|bit| {
                    let parent = rng.gen_range(0..self.parent_count);
                    parents[parent].bits()[bit]
                })
                .collect();
            let mut child = BinaryVector::new(bits);
            child.repair_all_zero(rng);
            log::debug!("Uniform bitstring crossover child: {}", child.encode());
            children.push(Box::new(child) as Box<dyn Representation>);
        }
        Ok(children)
    }
}
