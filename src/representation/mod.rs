pub mod binary_vector;
pub mod integer_value;
pub mod integer_vector;

pub use binary_vector::BinaryVector;
pub use integer_value::IntegerValue;
pub use integer_vector::IntegerVector;

use crate::config::ParameterNode;
use crate::error::ConfigError;
use rand::rngs::StdRng;
use std::any::Any;
use std::collections::HashMap;
use std::fmt;

/// A cloneable, stringifiable value encoding one optimization parameter.
///
/// The string form returned by [`Representation::encode`] is written to the
/// run log and must reconstruct an equal value through the registry's decode
/// factory (round-trip law). The type tag keys the operator binding maps.
pub trait Representation: fmt::Debug + Send {
    /// Type tag used as lookup key in the operator maps.
    fn type_tag(&self) -> &'static str;

    /// Value-independent deep copy.
    fn clone_box(&self) -> Box<dyn Representation>;

    /// String form for logging and resume.
    fn encode(&self) -> String;

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl Clone for Box<dyn Representation> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

type FreshFn =
    fn(&ParameterNode, &mut StdRng) -> Result<Box<dyn Representation>, ConfigError>;
type DecodeFn = fn(&ParameterNode, &str) -> Result<Box<dyn Representation>, ConfigError>;

struct RepresentationFactory {
    fresh: FreshFn,
    decode: DecodeFn,
}

/// Explicit registry mapping a representation type tag to its constructors,
/// replacing dynamic class loading by name. The `fresh` factory draws a new
/// random value for the declared parameter; `decode` rebuilds one from its
/// logged string form.
pub struct RepresentationRegistry {
    factories: HashMap<&'static str, RepresentationFactory>,
}

impl RepresentationRegistry {
    pub fn empty() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Registry with all built-in representation types.
    pub fn with_builtins() -> Self {
        let mut registry = Self::empty();
        registry.register(BinaryVector::TYPE_TAG, BinaryVector::fresh, BinaryVector::decode);
        registry.register(IntegerValue::TYPE_TAG, IntegerValue::fresh, IntegerValue::decode);
        registry.register(
            IntegerVector::TYPE_TAG,
            IntegerVector::fresh,
            IntegerVector::decode,
        );
        registry
    }

    pub fn register(&mut self, tag: &'static str, fresh: FreshFn, decode: DecodeFn) {
        self.factories
            .insert(tag, RepresentationFactory { fresh, decode });
    }

    pub fn fresh(
        &self,
        tag: &str,
        declaration: &ParameterNode,
        rng: &mut StdRng,
    ) -> Result<Box<dyn Representation>, ConfigError> {
        let factory = self
            .factories
            .get(tag)
            .ok_or_else(|| ConfigError::UnknownRepresentationType(tag.to_string()))?;
        (factory.fresh)(declaration, rng)
    }

    pub fn decode(
        &self,
        tag: &str,
        declaration: &ParameterNode,
        encoded: &str,
    ) -> Result<Box<dyn Representation>, ConfigError> {
        let factory = self
            .factories
            .get(tag)
            .ok_or_else(|| ConfigError::UnknownRepresentationType(tag.to_string()))?;
        (factory.decode)(declaration, encoded)
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.factories.contains_key(tag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ParamValue;
    use rand::SeedableRng;

    #[test]
    fn unknown_tag_fails_fast() {
        let registry = RepresentationRegistry::with_builtins();
        let declaration = ParameterNode::leaf("Some parameter", ParamValue::Int(1));
        let mut rng = StdRng::seed_from_u64(1);
        let err = registry.fresh("NoSuchType", &declaration, &mut rng).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownRepresentationType(tag) if tag == "NoSuchType"));
    }

    #[test]
    fn builtins_are_registered() {
        let registry = RepresentationRegistry::with_builtins();
        assert!(registry.contains("BinaryVector"));
        assert!(registry.contains("IntegerValue"));
        assert!(registry.contains("IntegerVector"));
    }
}
