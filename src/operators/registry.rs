use crate::config::ParameterNode;
use crate::error::ConfigError;
use crate::operators::crossover::{Crossover, UniformBitstringCrossover};
use crate::operators::mutation::{IntegerMutation, Mutation, RandomBitFlip};
use std::collections::HashMap;

type CrossoverFactory = fn(&ParameterNode) -> Result<Box<dyn Crossover>, ConfigError>;
type MutationFactory = fn(&ParameterNode) -> Result<Box<dyn Mutation>, ConfigError>;

/// Explicit registry mapping operator type tags to constructors, replacing
/// dynamic class loading by name. VNS local-search operators are ordinary
/// mutation operators and share the mutation factories.
pub struct OperatorRegistry {
    crossover_factories: HashMap<&'static str, CrossoverFactory>,
    mutation_factories: HashMap<&'static str, MutationFactory>,
}

impl OperatorRegistry {
    pub fn empty() -> Self {
        Self {
            crossover_factories: HashMap::new(),
            mutation_factories: HashMap::new(),
        }
    }

    pub fn with_builtins() -> Self {
        let mut registry = Self::empty();
        registry.register_crossover(
            UniformBitstringCrossover::TYPE_TAG,
            UniformBitstringCrossover::from_node,
        );
        registry.register_mutation(RandomBitFlip::TYPE_TAG, RandomBitFlip::from_node);
        registry.register_mutation(IntegerMutation::TYPE_TAG, IntegerMutation::from_node);
        registry
    }

    pub fn register_crossover(&mut self, tag: &'static str, factory: CrossoverFactory) {
        self.crossover_factories.insert(tag, factory);
    }

    pub fn register_mutation(&mut self, tag: &'static str, factory: MutationFactory) {
        self.mutation_factories.insert(tag, factory);
    }

    pub fn build_crossover(
        &self,
        tag: &str,
        node: &ParameterNode,
    ) -> Result<Box<dyn Crossover>, ConfigError> {
        let factory = self
            .crossover_factories
            .get(tag)
            .ok_or_else(|| ConfigError::UnknownOperator(tag.to_string()))?;
        factory(node)
    }

    pub fn build_mutation(
        &self,
        tag: &str,
        node: &ParameterNode,
    ) -> Result<Box<dyn Mutation>, ConfigError> {
        let factory = self
            .mutation_factories
            .get(tag)
            .ok_or_else(|| ConfigError::UnknownOperator(tag.to_string()))?;
        factory(node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ParamValue;

    #[test]
    fn unknown_operator_fails_fast() {
        let registry = OperatorRegistry::with_builtins();
        let node = ParameterNode::group("op", vec![]);
        let err = registry.build_mutation("NoSuchOperator", &node).err().unwrap();
        assert!(matches!(err, ConfigError::UnknownOperator(tag) if tag == "NoSuchOperator"));
    }

    #[test]
    fn builtin_operators_are_constructible() {
        let registry = OperatorRegistry::with_builtins();
        let crossover_node = ParameterNode::group(
            "op",
            vec![
                ParameterNode::leaf("parentNumber", ParamValue::Int(2)),
                ParameterNode::leaf("offspringNumber", ParamValue::Int(2)),
            ],
        );
        let crossover = registry
            .build_crossover("UniformBitstringCrossover", &crossover_node)
            .unwrap();
        assert_eq!(crossover.parent_count(), 2);

        let mutation_node = ParameterNode::group(
            "op",
            vec![ParameterNode::leaf("gamma", ParamValue::Double(1.0))],
        );
        assert!(registry.build_mutation("RandomBitFlip", &mutation_node).is_ok());
    }
}
