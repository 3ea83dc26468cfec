use super::Representation;
use crate::config::ParameterNode;
use crate::error::ConfigError;
use rand::rngs::StdRng;
use rand::Rng;
use std::any::Any;

/// A vector of bounded integers sharing one min/max range. The encoded form
/// joins the components with ';' so it stays safe inside comma-separated log
/// rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntegerVector {
    values: Vec<i64>,
    min: i64,
    max: i64,
}

impl IntegerVector {
    pub const TYPE_TAG: &'static str = "IntegerVector";

    pub fn new(values: Vec<i64>, min: i64, max: i64) -> Self {
        Self { values, min, max }
    }

    pub fn values(&self) -> &[i64] {
        &self.values
    }

    pub fn min(&self) -> i64 {
        self.min
    }

    pub fn max(&self) -> i64 {
        self.max
    }

    pub fn set_component(&mut self, index: usize, value: i64) {
        self.values[index] = value.clamp(self.min, self.max);
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
        let length = declaration.int_param("Length")?;
        if length <= 0 {
            return Err(ConfigError::Invalid(format!(
                "Integer vector length for '{}' must be greater than zero",
                declaration.name
            )));
        }
        let (min, max) = Self::bounds(declaration)?;
        Ok(Box::new(Self {
            values: (0..length).map(|_| rng.gen_range(min..=max)).collect(),
            min,
            max,
        }))
    }

    pub fn decode(
        declaration: &ParameterNode,
        encoded: &str,
    ) -> Result<Box<dyn Representation>, ConfigError> {
        let (min, max) = Self::bounds(declaration)?;
        let values = encoded
            .split(';')
            .map(|part| {
                part.trim().parse::<i64>().map_err(|_| {
                    ConfigError::Invalid(format!(
                        "Invalid integer component '{}' for '{}'",
                        part, declaration.name
                    ))
                })
            })
            .collect::<Result<Vec<i64>, ConfigError>>()?;
        Ok(Box::new(Self { values, min, max }))
    }
}

impl Representation for IntegerVector {
    fn type_tag(&self) -> &'static str {
        Self::TYPE_TAG
    }

    fn clone_box(&self) -> Box<dyn Representation> {
        Box::new(self.clone())
    }

    fn encode(&self) -> String {
        self.values
            .iter()
            .map(|v| v.to_string())
            .collect::<Vec<String>>()
            .join(";")
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

    fn declaration() -> ParameterNode {
        ParameterNode::group(
            "Band edges",
            vec![
                ParameterNode::leaf("Length", ParamValue::Int(4)),
                ParameterNode::leaf("Min", ParamValue::Int(0)),
                ParameterNode::leaf("Max", ParamValue::Int(22050)),
            ],
        )
    }

    #[test]
    fn encode_decode_round_trip() {
        let v = IntegerVector::new(vec![100, 2000, 8000, 16000], 0, 22050);
        let decoded = IntegerVector::decode(&declaration(), &v.encode()).unwrap();
        assert_eq!(decoded.encode(), "100;2000;8000;16000");
    }

    #[test]
    fn decode_rejects_garbage() {
        assert!(IntegerVector::decode(&declaration(), "1;x;3").is_err());
    }
}
