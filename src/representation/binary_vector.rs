use super::Representation;
use crate::config::ParameterNode;
use crate::error::ConfigError;
use rand::rngs::StdRng;
use rand::Rng;
use std::any::Any;

/// Bit-string representation, e.g. for feature selection. The encoded form is
/// one character per bit ("0"/"1"). A vector of only zeros is never produced:
/// initialization and the bit-flip operators repair it by setting one random
/// bit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryVector {
    bits: Vec<bool>,
}

impl BinaryVector {
    pub const TYPE_TAG: &'static str = "BinaryVector";

    pub fn new(bits: Vec<bool>) -> Self {
        Self { bits }
    }

    pub fn bits(&self) -> &[bool] {
        &self.bits
    }

    pub fn bits_mut(&mut self) -> &mut [bool] {
        &mut self.bits
    }

    /// Sets a random bit if none is set.
    pub fn repair_all_zero(&mut self, rng: &mut StdRng) {
        if !self.bits.iter().any(|b| *b) && !self.bits.is_empty() {
            let index = rng.gen_range(0..self.bits.len());
            self.bits[index] = true;
        }
    }

    pub fn fresh(
        declaration: &ParameterNode,
        rng: &mut StdRng,
    ) -> Result<Box<dyn Representation>, ConfigError> {
        let length = declaration.int_param("Length")?;
        if length <= 0 {
            return Err(ConfigError::Invalid(format!(
                "Binary vector length for '{}' must be greater than zero",
                declaration.name
            )));
        }
        let mut vector = Self {
            bits: (0..length).map(|_| rng.gen_bool(0.5)).collect(),
        };
        vector.repair_all_zero(rng);
        Ok(Box::new(vector))
    }

    pub fn decode(
        declaration: &ParameterNode,
        encoded: &str,
    ) -> Result<Box<dyn Representation>, ConfigError> {
        let bits = encoded
            .chars()
            .map(|c| match c {
                '1' => Ok(true),
                '0' => Ok(false),
                other => Err(ConfigError::Invalid(format!(
                    "Invalid bit '{}' in binary vector for '{}'",
                    other, declaration.name
                ))),
            })
            .collect::<Result<Vec<bool>, ConfigError>>()?;
        Ok(Box::new(Self { bits }))
    }
}

impl Representation for BinaryVector {
    fn type_tag(&self) -> &'static str {
        Self::TYPE_TAG
    }

    fn clone_box(&self) -> Box<dyn Representation> {
        Box::new(self.clone())
    }

    fn encode(&self) -> String {
        self.bits.iter().map(|b| if *b { '1' } else { '0' }).collect()
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
            "Selected features",
            vec![ParameterNode::leaf("Length", ParamValue::Int(16))],
        )
    }

    #[test]
    fn fresh_respects_length_and_is_never_all_zero() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..50 {
            let v = BinaryVector::fresh(&declaration(), &mut rng).unwrap();
            let encoded = v.encode();
            assert_eq!(encoded.len(), 16);
            assert!(encoded.contains('1'));
        }
    }

    #[test]
    fn encode_decode_round_trip() {
        let original = BinaryVector::new(vec![true, false, false, true, true]);
        let decoded = BinaryVector::decode(&declaration(), &original.encode()).unwrap();
        assert_eq!(decoded.encode(), original.encode());
    }

    #[test]
    fn decode_rejects_garbage() {
        assert!(BinaryVector::decode(&declaration(), "01x1").is_err());
    }
}
