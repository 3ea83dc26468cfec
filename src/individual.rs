use crate::config::ParameterNode;
use crate::error::{ConfigError, ResumeError};
use crate::evaluator::FitnessVector;
use crate::representation::{Representation, RepresentationRegistry};
use crate::runlog::LastRow;
use rand::rngs::StdRng;

/// One optimization parameter as declared under `problemParametersToOptimize`:
/// its name, the representation type tag from the `classValue` attribute and
/// the declaring node (bounds, lengths and other representation settings).
#[derive(Debug, Clone)]
pub struct DeclaredParameter {
    pub name: String,
    pub type_tag: String,
    pub declaration: ParameterNode,
}

impl DeclaredParameter {
    /// Collects the declared optimization parameters in declaration order:
    /// every node in the subtree carrying a `classValue`.
    pub fn collect(subtree: &ParameterNode) -> Vec<DeclaredParameter> {
        let mut declared = Vec::new();
        collect_into(subtree, &mut declared);
        declared
    }
}

fn collect_into(node: &ParameterNode, declared: &mut Vec<DeclaredParameter>) {
    for child in &node.children {
        if let Some(tag) = &child.class_value {
            declared.push(DeclaredParameter {
                name: child.name.clone(),
                type_tag: tag.clone(),
                declaration: child.clone(),
            });
        } else {
            collect_into(child, declared);
        }
    }
}

/// One candidate solution: an ordered list of representations (1:1 with the
/// declared optimization parameters) plus memoized fitness vectors. The
/// caches live until the individual is discarded or explicitly invalidated.
#[derive(Debug)]
pub struct Individual {
    representations: Vec<Box<dyn Representation>>,
    fitness: Option<FitnessVector>,
    fitness_on_test_set: Option<FitnessVector>,
}

impl Clone for Individual {
    /// Deep-clones every representation. The fitness caches are not copied:
    /// a clone is logically a new, unevaluated individual.
    fn clone(&self) -> Self {
        Self {
            representations: self.representations.clone(),
            fitness: None,
            fitness_on_test_set: None,
        }
    }
}

impl Individual {
    /// Creates a fresh individual with randomly initialized representations,
    /// one per declared parameter in declaration order.
    pub fn fresh(
        declared: &[DeclaredParameter],
        registry: &RepresentationRegistry,
        rng: &mut StdRng,
    ) -> Result<Self, ConfigError> {
        let mut representations = Vec::with_capacity(declared.len());
        for parameter in declared {
            representations.push(registry.fresh(
                &parameter.type_tag,
                &parameter.declaration,
                rng,
            )?);
        }
        Ok(Self {
            representations,
            fitness: None,
            fitness_on_test_set: None,
        })
    }

    /// Reconstructs individual `index` from the last row of a previous run's
    /// log, reading the attribute `"Representation <Tag> of individual <index>"`
    /// for each declared parameter.
    pub fn from_log(
        declared: &[DeclaredParameter],
        registry: &RepresentationRegistry,
        row: &LastRow,
        index: usize,
    ) -> Result<Self, crate::error::EvostratError> {
        let mut representations = Vec::with_capacity(declared.len());
        for parameter in declared {
            let attribute = format!(
                "Representation {} of individual {}",
                parameter.type_tag, index
            );
            let encoded = row.get(&attribute).ok_or_else(|| ResumeError::AttributeMissing {
                attribute: attribute.clone(),
                path: row.path().to_path_buf(),
            })?;
            representations.push(registry.decode(
                &parameter.type_tag,
                &parameter.declaration,
                encoded,
            )?);
        }
        Ok(Self {
            representations,
            fitness: None,
            fitness_on_test_set: None,
        })
    }

    pub fn representations(&self) -> &[Box<dyn Representation>] {
        &self.representations
    }

    pub fn representation_mut(&mut self, slot: usize) -> &mut dyn Representation {
        self.representations[slot].as_mut()
    }

    /// Replaces one representation slot, invalidating the fitness caches.
    pub fn replace_representation(&mut self, slot: usize, representation: Box<dyn Representation>) {
        self.representations[slot] = representation;
        self.invalidate_fitness();
    }

    pub fn from_representations(representations: Vec<Box<dyn Representation>>) -> Self {
        Self {
            representations,
            fitness: None,
            fitness_on_test_set: None,
        }
    }

    pub fn fitness(&self) -> Option<&FitnessVector> {
        self.fitness.as_ref()
    }

    pub fn fitness_on_test_set(&self) -> Option<&FitnessVector> {
        self.fitness_on_test_set.as_ref()
    }

    /// Value of the primary (first) fitness measure, if evaluated.
    pub fn primary_fitness(&self) -> Option<f64> {
        self.fitness.as_ref().and_then(|f| f.first()).map(|m| m.value)
    }

    pub fn set_fitness(&mut self, fitness: FitnessVector) {
        self.fitness = Some(fitness);
    }

    pub fn set_fitness_on_test_set(&mut self, fitness: FitnessVector) {
        self.fitness_on_test_set = Some(fitness);
    }

    pub fn invalidate_fitness(&mut self) {
        self.fitness = None;
        self.fitness_on_test_set = None;
    }

    /// Deep clone that carries the fitness caches over, used by the local
    /// search for its bookkeeping.
    pub fn clone_with_fitness(&self) -> Self {
        Self {
            representations: self.representations.clone(),
            fitness: self.fitness.clone(),
            fitness_on_test_set: self.fitness_on_test_set.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ParamValue, ParameterNode};
    use rand::SeedableRng;

    fn declared() -> Vec<DeclaredParameter> {
        let subtree = ParameterNode::group(
            "problemParametersToOptimize",
            vec![ParameterNode::group(
                "Processing",
                vec![
                    ParameterNode::group(
                        "Selected features",
                        vec![ParameterNode::leaf("Length", ParamValue::Int(8))],
                    )
                    .with_class("BinaryVector"),
                    ParameterNode::group(
                        "Window size",
                        vec![
                            ParameterNode::leaf("Min", ParamValue::Int(1)),
                            ParameterNode::leaf("Max", ParamValue::Int(10)),
                        ],
                    )
                    .with_class("IntegerValue"),
                ],
            )],
        );
        DeclaredParameter::collect(&subtree)
    }

    #[test]
    fn collect_preserves_declaration_order() {
        let declared = declared();
        assert_eq!(declared.len(), 2);
        assert_eq!(declared[0].type_tag, "BinaryVector");
        assert_eq!(declared[1].type_tag, "IntegerValue");
    }

    #[test]
    fn fresh_builds_one_representation_per_declared_parameter() {
        let registry = RepresentationRegistry::with_builtins();
        let mut rng = StdRng::seed_from_u64(11);
        let individual = Individual::fresh(&declared(), &registry, &mut rng).unwrap();
        assert_eq!(individual.representations().len(), 2);
        assert_eq!(individual.representations()[0].type_tag(), "BinaryVector");
    }

    #[test]
    fn clone_drops_fitness_cache() {
        let registry = RepresentationRegistry::with_builtins();
        let mut rng = StdRng::seed_from_u64(11);
        let mut individual = Individual::fresh(&declared(), &registry, &mut rng).unwrap();
        individual.set_fitness(vec![crate::evaluator::Measure::minimizing("error", 0.25)]);
        let copy = individual.clone();
        assert!(copy.fitness().is_none());
        assert!(individual.fitness().is_some());
        assert!(individual.clone_with_fitness().fitness().is_some());
    }
}
