use super::Representation;
use crate::config::ParameterNode;
use crate::error::ConfigError;
use rand::rngs::StdRng;
use rand::Rng;
use std::any::Any;

/// A single bounded integer, e.g. a window size or a partition count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntegerValue {
    value: i64,
    min: i64,
    max: i64,
}

impl IntegerValue {
    pub const TYPE_TAG: &'static str = "IntegerValue";

    pub fn new(value: i64, min: i64, max: i64) -> Self {
        Self { value, min, max }
    }

    pub fn value(&self) -> i64 {
        self.value
    }

    pub fn min(&self) -> i64 {
        self.min
    }

    pub fn max(&self) -> i64 {
        self.max
    }

    /// Sets the value, clamped to the allowed bounds.
    pub fn set_value(&mut self, value: i64) {
        self.value = value.clamp(self.min, self.max);
    }

    fn bounds(declaration: &ParameterNode) -> Result<(i64, i64), ConfigError> {
        let min = declaration.int_param("Min")?;
        let max = declaration.int_param("Max")?;
        if min > max {
            return Err(ConfigError::Invalid(format!(
                "Bounds for '{}' are inverted: min {} > max {}",
                declaration.name, min, max
            )));
        }
        Ok((min, max))
    }

    pub fn fresh(
        declaration: &ParameterNode,
        rng: &mut StdRng,
    ) -> Result<Box<dyn Representation>, ConfigError> {
        let (min, max) = Self::bounds(declaration)?;
        Ok(Box::new(Self {
            value: rng.gen_range(min..=max),
            min,
            max,
        }))
    }

    pub fn decode(
        declaration: &ParameterNode,
        encoded: &str,
    ) -> Result<Box<dyn Representation>, ConfigError> {
        let (min, max) = Self::bounds(declaration)?;
        let value: i64 = encoded.trim().parse().map_err(|_| {
            ConfigError::Invalid(format!(
                "Invalid integer value '{}' for '{}'",
                encoded, declaration.name
            ))
        })?;
        Ok(Box::new(Self { value, min, max }))
    }
}

impl Representation for IntegerValue {
    fn type_tag(&self) -> &'static str {
        Self::TYPE_TAG
    }

    fn clone_box(&self) -> Box<dyn Representation> {
        Box::new(self.clone())
    }

    fn encode(&self) -> String {
        self.value.to_string()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ParamValue;
    use rand::SeedableRng;

    fn declaration() -> ParameterNode {
        ParameterNode::group(
            "Window size",
            vec![
                ParameterNode::leaf("Min", ParamValue::Int(10)),
                ParameterNode::leaf("Max", ParamValue::Int(100)),
            ],
        )
    }

    #[test]
    fn fresh_stays_inside_bounds() {
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..100 {
            let v = IntegerValue::fresh(&declaration(), &mut rng).unwrap();
            let value: i64 = v.encode().parse().unwrap();
            assert!((10..=100).contains(&value));
        }
    }

    #[test]
    fn set_value_clamps() {
        let mut v = IntegerValue::new(50, 10, 100);
        v.set_value(1000);
        assert_eq!(v.value(), 100);
        v.set_value(-5);
        assert_eq!(v.value(), 10);
    }

    #[test]
    fn encode_decode_round_trip() {
        let v = IntegerValue::new(42, 10, 100);
        let decoded = IntegerValue::decode(&declaration(), &v.encode()).unwrap();
        assert_eq!(decoded.encode(), "42");
    }
}
